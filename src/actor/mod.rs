use crate::replica;
use crate::replica::PersistentLocalState;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Formatter};
use tokio::sync::{mpsc, oneshot};

/// Everything the replica reacts to, funneled through one queue so that role,
/// term and pending-commit state have a single logical owner (the event loop
/// below is the "single coarse lock" around state transitions).
#[derive(Debug)]
pub enum Event {
    // Leader: validate, apply locally, fan out, hold callback until majority.
    // Candidate: reject (NoLeader).
    // Follower: reject with leader redirect if known, else NoLeader.
    ClientWrite(
        replica::ClientWriteInput,
        Callback<replica::WriteOutcome, replica::ClientWriteError>,
    ),

    // Any role: term-compare, maybe step down, grant vote per the voting
    // rules (vote is persisted before the callback fires).
    RequestVote(
        replica::RequestVoteInput,
        Callback<replica::RequestVoteOutput, replica::RequestVoteError>,
    ),

    // Leader: ignore (same-term duplicate leader is impossible).
    // Candidate: concede to the sender.
    // Follower: record leader, reset timeout, advance commit index.
    Heartbeat(
        replica::HeartbeatInput,
        Callback<replica::HeartbeatOutput, replica::PeerEnvelopeError>,
    ),

    // Any role: term-compare, then apply the operation idempotently.
    Replicate(
        replica::ReplicateInput,
        Callback<replica::ReplicateOutput, replica::PeerEnvelopeError>,
    ),

    // Any role: snapshot of role/term/leader-hint/commit for reads.
    ClusterStatus(Callback<replica::ClusterStatus, replica::ClusterStatusError>),

    // Candidate: tally; majority promotes to leader.
    // Leader/Follower: stale, discard.
    VoteReplyFromPeer(replica::VoteReplyFromPeer),

    // Leader: count toward the pending broadcast's majority.
    // Candidate/Follower: stale, discard.
    ReplicateReplyFromPeer(replica::ReplicateReplyFromPeer),

    // Leader: liveness + match-index bookkeeping, maybe start catch-up,
    // maybe step down on lost quorum or higher term.
    // Candidate/Follower: stale, discard.
    HeartbeatReplyFromPeer(replica::HeartbeatReplyFromPeer),

    // Leader: fail the still-pending broadcast back to the client.
    ReplicationExpired(replica::ReplicationExpired),

    // Leader: clear the peer's catch-up-in-flight flag.
    CatchupFinished(replica::CatchupFinished),

    // Leader: broadcast heartbeats (ticks from an old term are discarded).
    // Candidate/Follower: NOT POSSIBLE - discard.
    LeaderTimer(replica::LeaderTimerTick),

    // Leader: NOT POSSIBLE - discard.
    // Candidate/Follower: start a new election.
    FollowerTimeout,
}

pub struct Callback<O: Debug, E: Error>(oneshot::Sender<Result<O, E>>);

impl<O: Debug, E: Error> Debug for Callback<O, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish()
    }
}

impl<O: Debug, E: Error> Callback<O, E> {
    pub fn new(sender: oneshot::Sender<Result<O, E>>) -> Self {
        Callback(sender)
    }

    pub fn send(self, message: Result<O, E>) {
        // Receiver hanging up just means the caller stopped waiting.
        let _ = self.0.send(message);
    }
}

/// ActorClient is the handle other tasks use to talk to the replica event
/// loop. Request/response methods await a callback; notification methods are
/// fire-and-forget and tolerate the loop being gone (shutdown).
#[derive(Clone)]
pub struct ActorClient {
    sender: mpsc::Sender<Event>,
}

impl ActorClient {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        ActorClient { sender }
    }

    pub async fn client_write(
        &self,
        input: replica::ClientWriteInput,
    ) -> Result<replica::WriteOutcome, replica::ClientWriteError> {
        let (tx, rx) = oneshot::channel();
        self.send_to_actor(Event::ClientWrite(input, Callback(tx)))
            .await
            .map_err(|_| replica::ClientWriteError::ActorExited)?;

        rx.await.map_err(|_| replica::ClientWriteError::ActorExited)?
    }

    pub async fn request_vote(
        &self,
        input: replica::RequestVoteInput,
    ) -> Result<replica::RequestVoteOutput, replica::RequestVoteError> {
        let (tx, rx) = oneshot::channel();
        self.send_to_actor(Event::RequestVote(input, Callback(tx)))
            .await
            .map_err(|_| replica::RequestVoteError::ActorExited)?;

        rx.await.map_err(|_| replica::RequestVoteError::ActorExited)?
    }

    pub async fn heartbeat(
        &self,
        input: replica::HeartbeatInput,
    ) -> Result<replica::HeartbeatOutput, replica::PeerEnvelopeError> {
        let (tx, rx) = oneshot::channel();
        self.send_to_actor(Event::Heartbeat(input, Callback(tx)))
            .await
            .map_err(|_| replica::PeerEnvelopeError::ActorExited)?;

        rx.await.map_err(|_| replica::PeerEnvelopeError::ActorExited)?
    }

    pub async fn replicate(
        &self,
        input: replica::ReplicateInput,
    ) -> Result<replica::ReplicateOutput, replica::PeerEnvelopeError> {
        let (tx, rx) = oneshot::channel();
        self.send_to_actor(Event::Replicate(input, Callback(tx)))
            .await
            .map_err(|_| replica::PeerEnvelopeError::ActorExited)?;

        rx.await.map_err(|_| replica::PeerEnvelopeError::ActorExited)?
    }

    pub async fn cluster_status(
        &self,
    ) -> Result<replica::ClusterStatus, replica::ClusterStatusError> {
        let (tx, rx) = oneshot::channel();
        self.send_to_actor(Event::ClusterStatus(Callback(tx)))
            .await
            .map_err(|_| replica::ClusterStatusError::ActorExited)?;

        rx.await
            .map_err(|_| replica::ClusterStatusError::ActorExited)?
    }

    pub async fn notify_vote_reply_from_peer(&self, reply: replica::VoteReplyFromPeer) {
        let _ = self.send_to_actor(Event::VoteReplyFromPeer(reply)).await;
    }

    pub async fn notify_replicate_reply_from_peer(&self, reply: replica::ReplicateReplyFromPeer) {
        let _ = self.send_to_actor(Event::ReplicateReplyFromPeer(reply)).await;
    }

    pub async fn notify_heartbeat_reply_from_peer(&self, reply: replica::HeartbeatReplyFromPeer) {
        let _ = self.send_to_actor(Event::HeartbeatReplyFromPeer(reply)).await;
    }

    pub async fn notify_replication_expired(&self, expired: replica::ReplicationExpired) {
        let _ = self.send_to_actor(Event::ReplicationExpired(expired)).await;
    }

    pub async fn notify_catchup_finished(&self, finished: replica::CatchupFinished) {
        let _ = self.send_to_actor(Event::CatchupFinished(finished)).await;
    }

    pub async fn leader_timer(&self, tick: replica::LeaderTimerTick) {
        let _ = self.send_to_actor(Event::LeaderTimer(tick)).await;
    }

    pub async fn follower_timeout(&self) {
        let _ = self.send_to_actor(Event::FollowerTimeout).await;
    }

    async fn send_to_actor(&self, event: Event) -> Result<(), ()> {
        self.sender.send(event).await.map_err(|_| ())
    }
}

/// ReplicaActor is the replica logic in actor form: one task draining the
/// event queue, handling each event synchronously.
pub struct ReplicaActor<S>
where
    S: PersistentLocalState,
{
    logger: slog::Logger,
    receiver: mpsc::Receiver<Event>,
    replica: replica::Replica<S>,
}

impl<S> ReplicaActor<S>
where
    S: PersistentLocalState + Send + 'static,
{
    pub fn new(
        logger: slog::Logger,
        receiver: mpsc::Receiver<Event>,
        replica: replica::Replica<S>,
    ) -> Self {
        ReplicaActor {
            logger,
            receiver,
            replica,
        }
    }

    pub async fn run_event_loop(mut self) {
        while let Some(event) = self.receiver.recv().await {
            slog::trace!(self.logger, "Received: {:?}", event);
            self.handle_event(event);
        }
        slog::info!(self.logger, "Replica event loop has exited");
    }

    // This must NOT be async. Long running work is spawned on other tasks
    // and comes back to this loop as an event.
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::ClientWrite(input, callback) => {
                // Callback is held by the replica until majority or expiry.
                self.replica.handle_client_write(input, callback);
            }
            Event::RequestVote(input, callback) => {
                let result = self.replica.server_handle_request_vote(input);
                callback.send(result);
            }
            Event::Heartbeat(input, callback) => {
                let result = self.replica.server_handle_heartbeat(input);
                callback.send(result);
            }
            Event::Replicate(input, callback) => {
                let result = self.replica.server_handle_replicate(input);
                callback.send(result);
            }
            Event::ClusterStatus(callback) => {
                callback.send(Ok(self.replica.cluster_status()));
            }
            Event::VoteReplyFromPeer(reply) => {
                self.replica.handle_vote_reply_from_peer(reply);
            }
            Event::ReplicateReplyFromPeer(reply) => {
                self.replica.handle_replicate_reply_from_peer(reply);
            }
            Event::HeartbeatReplyFromPeer(reply) => {
                self.replica.handle_heartbeat_reply_from_peer(reply);
            }
            Event::ReplicationExpired(expired) => {
                self.replica.handle_replication_expired(expired);
            }
            Event::CatchupFinished(finished) => {
                self.replica.handle_catchup_finished(finished);
            }
            Event::LeaderTimer(tick) => {
                self.replica.handle_leader_timer(tick);
            }
            Event::FollowerTimeout => {
                self.replica.handle_follower_timeout();
            }
        }
    }
}
