use crate::actor::ActorClient;
use crate::replica::replica_api::LeaderTimerTick;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::{Arc, Weak};
use tokio::time::{Duration, Instant};

/// LeaderTimerHandle keeps the leader's periodic heartbeat broadcast alive.
/// The first tick fires immediately, so a freshly elected leader announces
/// itself without waiting a full interval. Dropping the handle (losing
/// leadership) stops the task at its next wake-up.
pub struct LeaderTimerHandle {
    _keepalive: Arc<()>,
}

impl LeaderTimerHandle {
    pub fn spawn_background_task(
        heartbeat_duration: Duration,
        actor_client: ActorClient,
        tick: LeaderTimerTick,
    ) -> Self {
        let keepalive = Arc::new(());
        tokio::task::spawn(Self::leader_timer_task(
            Arc::downgrade(&keepalive),
            heartbeat_duration,
            actor_client,
            tick,
        ));
        LeaderTimerHandle {
            _keepalive: keepalive,
        }
    }

    async fn leader_timer_task(
        keepalive: Weak<()>,
        heartbeat_duration: Duration,
        actor_client: ActorClient,
        tick: LeaderTimerTick,
    ) {
        loop {
            if keepalive.upgrade().is_none() {
                // Leadership for this term is over.
                return;
            }
            actor_client.leader_timer(tick.clone()).await;
            tokio::time::sleep(heartbeat_duration).await;
        }
    }
}

/// FollowerTimerHandle tracks the randomized election timeout. Each valid
/// leader contact calls `reset_timeout()`, which pushes the wake-up time out;
/// if the timer task ever wakes with no newer wake-up queued, it publishes a
/// follower timeout and the replica starts an election.
pub struct FollowerTimerHandle {
    // flume rather than tokio mpsc: the timer task needs a non-blocking
    // try_recv to distinguish "reset arrived while I slept" from "timed out".
    wake_time_queue: flume::Sender<Instant>,
    timeout_range: RangeInclusive<Duration>,
}

impl FollowerTimerHandle {
    pub fn spawn_background_task(
        min_timeout: Duration,
        max_timeout: Duration,
        actor_client: ActorClient,
    ) -> Self {
        let (tx, rx) = flume::unbounded();

        let handle = FollowerTimerHandle {
            wake_time_queue: tx,
            timeout_range: RangeInclusive::new(min_timeout, max_timeout),
        };
        handle.reset_timeout();

        tokio::task::spawn(Self::follower_timer_task(rx, actor_client));

        handle
    }

    pub fn reset_timeout(&self) {
        match self.wake_time_queue.try_send(self.random_wake_time()) {
            Ok(_) => {}
            Err(flume::TrySendError::Disconnected(_)) => {
                // Timer task exits only after the queue closes; a send racing
                // that shutdown has nothing left to reset.
            }
            Err(flume::TrySendError::Full(_)) => {
                unreachable!("follower timer queue is unbounded")
            }
        }
    }

    fn random_wake_time(&self) -> Instant {
        let jittered_timeout = rand::thread_rng().gen_range(self.timeout_range.clone());
        Instant::now() + jittered_timeout
    }

    async fn follower_timer_task(queue: flume::Receiver<Instant>, actor_client: ActorClient) {
        loop {
            match queue.try_recv() {
                Ok(wake_time) => {
                    // Leader contact arrived; sleep until the pushed-out
                    // deadline and check again.
                    tokio::time::sleep_until(wake_time).await;
                }
                Err(flume::TryRecvError::Empty) => {
                    // We slept to the deadline and nothing reset us: the
                    // leader has gone quiet. Election time.
                    actor_client.follower_timeout().await;
                    return;
                }
                Err(flume::TryRecvError::Disconnected) => {
                    // Handle dropped: this role instance ended. No election.
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Event;
    use crate::replica::local_state::Term;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn leader_timer_ticks_immediately_then_periodically() {
        let (tx, mut rx) = mpsc::channel(10);
        let actor_client = ActorClient::new(tx);
        let tick = LeaderTimerTick { term: Term::new(3) };

        let handle = LeaderTimerHandle::spawn_background_task(
            Duration::from_millis(20),
            actor_client,
            tick.clone(),
        );

        for _ in 0..3 {
            match rx.recv().await {
                Some(Event::LeaderTimer(received)) => assert_eq!(received, tick),
                other => panic!("unexpected event: {:?}", other),
            }
        }

        drop(handle);
        // After the handle is gone the task stops feeding the queue.
        tokio::time::sleep(Duration::from_millis(60)).await;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, Event::LeaderTimer(_)));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn follower_timer_fires_once_after_quiet_period() {
        let (tx, mut rx) = mpsc::channel(10);
        let actor_client = ActorClient::new(tx);

        let _handle = FollowerTimerHandle::spawn_background_task(
            Duration::from_millis(10),
            Duration::from_millis(20),
            actor_client,
        );

        match tokio::time::timeout(Duration::from_millis(500), rx.recv()).await {
            Ok(Some(Event::FollowerTimeout)) => {}
            other => panic!("expected follower timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn resets_keep_the_follower_timer_quiet() {
        let (tx, mut rx) = mpsc::channel(10);
        let actor_client = ActorClient::new(tx);

        let handle = FollowerTimerHandle::spawn_background_task(
            Duration::from_millis(150),
            Duration::from_millis(200),
            actor_client,
        );

        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(30)).await;
            handle.reset_timeout();
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn dropping_the_follower_handle_cancels_the_election() {
        let (tx, mut rx) = mpsc::channel(10);
        let actor_client = ActorClient::new(tx);

        let handle = FollowerTimerHandle::spawn_background_task(
            Duration::from_millis(10),
            Duration::from_millis(15),
            actor_client,
        );
        drop(handle);

        match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            Err(_elapsed) => {}
            Ok(event) => panic!("expected no event, got {:?}", event),
        }
    }
}
