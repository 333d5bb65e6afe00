use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// CommitWatermark is the in-memory mirror of the durable `commit_index`,
/// shared between the replica event loop (which advances it) and the RPC
/// read paths (which bound message visibility by it: a message is readable
/// only once its id is at or below the watermark).
#[derive(Clone)]
pub struct CommitWatermark {
    inner: Arc<AtomicU64>,
}

impl CommitWatermark {
    pub fn new(initial: u64) -> Self {
        CommitWatermark {
            inner: Arc::new(AtomicU64::new(initial)),
        }
    }

    pub fn get(&self) -> u64 {
        self.inner.load(Ordering::Acquire)
    }

    /// Ratchets forward; lower values are ignored.
    pub fn advance_to(&self, new_commit_index: u64) {
        self.inner.fetch_max(new_commit_index, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_moves_forward() {
        let watermark = CommitWatermark::new(5);
        watermark.advance_to(3);
        assert_eq!(watermark.get(), 5);
        watermark.advance_to(9);
        assert_eq!(watermark.get(), 9);
    }
}
