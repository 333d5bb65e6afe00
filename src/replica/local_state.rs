use crate::replica::peers::ServerId;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Term is the monotonically increasing election epoch. Every peer envelope
/// carries the sender's term.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Term(u64);

impl Term {
    pub fn new(term: u64) -> Self {
        Term(term)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn plus_one(self) -> Term {
        Term(self.0 + 1)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// PersistentLocalState holds the tuple the protocol requires to survive a
/// crash: `current_term`, `voted_for` (scoped to the current term) and
/// `commit_index`. Mutations must be durable before the caller acts on them;
/// in particular a vote is persisted before the reply leaves the server.
pub trait PersistentLocalState {
    /// Adopts `new_term` if it is strictly greater than the current term,
    /// clearing the vote. Returns whether the term changed.
    fn store_term_if_increased(&mut self, new_term: Term) -> io::Result<bool>;

    /// Election entry: bump the term by one and vote for ourselves, in one
    /// durable step. Returns the new term.
    fn increment_term_and_vote_for_self(&mut self, me: ServerId) -> io::Result<Term>;

    /// Records a vote for `candidate` in `expected_term` if we have not voted
    /// in that term. Returns whether the vote was recorded.
    fn store_vote_if_unvoted(&mut self, expected_term: Term, candidate: ServerId)
        -> io::Result<bool>;

    fn current_term(&self) -> Term;

    /// Term and vote read as one atomic observation.
    fn voted_for_current_term(&self) -> (Term, Option<&ServerId>);

    fn commit_index(&self) -> u64;

    /// Ratchets the commit index forward. A value at or below the current one
    /// is ignored. Returns whether it advanced.
    fn store_commit_index_if_increased(&mut self, new_commit_index: u64) -> io::Result<bool>;
}

#[derive(Debug, thiserror::Error)]
pub enum LocalStateError {
    #[error("failed to access durable state: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt durable state file '{file}': {detail}")]
    Corrupt { file: String, detail: String },
}

const TERM_FILE: &str = "term.dat";
const VOTED_FOR_FILE: &str = "voted_for.dat";
const COMMIT_INDEX_FILE: &str = "commit_index.dat";

/// File-backed local state: one small file per field under the server's data
/// directory, written atomically (tmp + rename + fsync). Unparseable content
/// at load is corrupt state and aborts startup.
pub struct DurableLocalState {
    dir: PathBuf,
    current_term: Term,
    voted_for: Option<ServerId>,
    commit_index: u64,
}

impl DurableLocalState {
    pub fn load(dir: &Path) -> Result<Self, LocalStateError> {
        fs::create_dir_all(dir)?;
        let current_term = Term::new(read_u64_file(&dir.join(TERM_FILE))?);
        let commit_index = read_u64_file(&dir.join(COMMIT_INDEX_FILE))?;
        let voted_for = read_optional_string_file(&dir.join(VOTED_FOR_FILE))?.map(ServerId::new);

        Ok(DurableLocalState {
            dir: dir.to_path_buf(),
            current_term,
            voted_for,
            commit_index,
        })
    }

    fn persist_term_and_vote(&self) -> io::Result<()> {
        write_file_atomic(
            &self.dir.join(TERM_FILE),
            self.current_term.as_u64().to_string().as_bytes(),
        )?;
        let vote = self
            .voted_for
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or_default();
        write_file_atomic(&self.dir.join(VOTED_FOR_FILE), vote.as_bytes())
    }
}

impl PersistentLocalState for DurableLocalState {
    fn store_term_if_increased(&mut self, new_term: Term) -> io::Result<bool> {
        if new_term <= self.current_term {
            return Ok(false);
        }
        let (previous_term, previous_vote) = (self.current_term, self.voted_for.take());
        self.current_term = new_term;
        if let Err(e) = self.persist_term_and_vote() {
            self.current_term = previous_term;
            self.voted_for = previous_vote;
            return Err(e);
        }
        Ok(true)
    }

    fn increment_term_and_vote_for_self(&mut self, me: ServerId) -> io::Result<Term> {
        let (previous_term, previous_vote) = (self.current_term, self.voted_for.clone());
        self.current_term = self.current_term.plus_one();
        self.voted_for = Some(me);
        if let Err(e) = self.persist_term_and_vote() {
            self.current_term = previous_term;
            self.voted_for = previous_vote;
            return Err(e);
        }
        Ok(self.current_term)
    }

    fn store_vote_if_unvoted(
        &mut self,
        expected_term: Term,
        candidate: ServerId,
    ) -> io::Result<bool> {
        if expected_term != self.current_term || self.voted_for.is_some() {
            return Ok(false);
        }
        self.voted_for = Some(candidate);
        if let Err(e) = self.persist_term_and_vote() {
            self.voted_for = None;
            return Err(e);
        }
        Ok(true)
    }

    fn current_term(&self) -> Term {
        self.current_term
    }

    fn voted_for_current_term(&self) -> (Term, Option<&ServerId>) {
        (self.current_term, self.voted_for.as_ref())
    }

    fn commit_index(&self) -> u64 {
        self.commit_index
    }

    fn store_commit_index_if_increased(&mut self, new_commit_index: u64) -> io::Result<bool> {
        if new_commit_index <= self.commit_index {
            return Ok(false);
        }
        let previous = self.commit_index;
        self.commit_index = new_commit_index;
        if let Err(e) = write_file_atomic(
            &self.dir.join(COMMIT_INDEX_FILE),
            new_commit_index.to_string().as_bytes(),
        ) {
            self.commit_index = previous;
            return Err(e);
        }
        Ok(true)
    }
}

/// In-memory variant for tests that don't exercise crash recovery.
#[derive(Default)]
pub struct VolatileLocalState {
    current_term: Term,
    voted_for: Option<ServerId>,
    commit_index: u64,
}

impl VolatileLocalState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentLocalState for VolatileLocalState {
    fn store_term_if_increased(&mut self, new_term: Term) -> io::Result<bool> {
        if new_term <= self.current_term {
            return Ok(false);
        }
        self.current_term = new_term;
        self.voted_for = None;
        Ok(true)
    }

    fn increment_term_and_vote_for_self(&mut self, me: ServerId) -> io::Result<Term> {
        self.current_term = self.current_term.plus_one();
        self.voted_for = Some(me);
        Ok(self.current_term)
    }

    fn store_vote_if_unvoted(
        &mut self,
        expected_term: Term,
        candidate: ServerId,
    ) -> io::Result<bool> {
        if expected_term != self.current_term || self.voted_for.is_some() {
            return Ok(false);
        }
        self.voted_for = Some(candidate);
        Ok(true)
    }

    fn current_term(&self) -> Term {
        self.current_term
    }

    fn voted_for_current_term(&self) -> (Term, Option<&ServerId>) {
        (self.current_term, self.voted_for.as_ref())
    }

    fn commit_index(&self) -> u64 {
        self.commit_index
    }

    fn store_commit_index_if_increased(&mut self, new_commit_index: u64) -> io::Result<bool> {
        if new_commit_index <= self.commit_index {
            return Ok(false);
        }
        self.commit_index = new_commit_index;
        Ok(true)
    }
}

fn read_u64_file(path: &Path) -> Result<u64, LocalStateError> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Ok(0);
            }
            trimmed
                .parse::<u64>()
                .map_err(|e| LocalStateError::Corrupt {
                    file: path.display().to_string(),
                    detail: e.to_string(),
                })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn read_optional_string_file(path: &Path) -> Result<Option<String>, LocalStateError> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_file_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        io::Write::write_all(&mut file, content)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str) -> ServerId {
        ServerId::new(format!("{}:50051", id))
    }

    #[test]
    fn fresh_directory_starts_at_term_zero() {
        let dir = tempfile::tempdir().unwrap();
        let state = DurableLocalState::load(dir.path()).unwrap();
        assert_eq!(state.current_term(), Term::new(0));
        assert_eq!(state.commit_index(), 0);
        assert!(state.voted_for_current_term().1.is_none());
    }

    #[test]
    fn term_vote_and_commit_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut state = DurableLocalState::load(dir.path()).unwrap();
            let term = state.increment_term_and_vote_for_self(server("a")).unwrap();
            assert_eq!(term, Term::new(1));
            assert!(state.store_commit_index_if_increased(42).unwrap());
        }

        let state = DurableLocalState::load(dir.path()).unwrap();
        assert_eq!(state.current_term(), Term::new(1));
        assert_eq!(state.commit_index(), 42);
        assert_eq!(state.voted_for_current_term().1, Some(&server("a")));
    }

    #[test]
    fn at_most_one_vote_per_term() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = DurableLocalState::load(dir.path()).unwrap();
        assert!(state.store_term_if_increased(Term::new(3)).unwrap());

        assert!(state
            .store_vote_if_unvoted(Term::new(3), server("a"))
            .unwrap());
        assert!(!state
            .store_vote_if_unvoted(Term::new(3), server("b"))
            .unwrap());
        // Vote for a term we're not in is refused.
        assert!(!state
            .store_vote_if_unvoted(Term::new(2), server("b"))
            .unwrap());
    }

    #[test]
    fn adopting_a_higher_term_clears_the_vote() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = DurableLocalState::load(dir.path()).unwrap();
        state.increment_term_and_vote_for_self(server("a")).unwrap();
        assert!(state.voted_for_current_term().1.is_some());

        assert!(state.store_term_if_increased(Term::new(5)).unwrap());
        assert!(state.voted_for_current_term().1.is_none());
        // Terms never decrease.
        assert!(!state.store_term_if_increased(Term::new(4)).unwrap());
        assert_eq!(state.current_term(), Term::new(5));
    }

    #[test]
    fn commit_index_only_ratchets_forward() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = DurableLocalState::load(dir.path()).unwrap();
        assert!(state.store_commit_index_if_increased(10).unwrap());
        assert!(!state.store_commit_index_if_increased(10).unwrap());
        assert!(!state.store_commit_index_if_increased(7).unwrap());
        assert_eq!(state.commit_index(), 10);
    }

    #[test]
    fn unparseable_term_file_is_corrupt_state() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TERM_FILE), "not-a-number").unwrap();
        match DurableLocalState::load(dir.path()) {
            Err(LocalStateError::Corrupt { .. }) => {}
            other => panic!("expected corrupt-state error, got {:?}", other.map(|_| ())),
        }
    }
}
