use crate::actor::{ActorClient, Callback};
use crate::broker::{PushedMessage, SubscriptionBroker};
use crate::grpc::proto_replication_message::Payload;
use crate::grpc::{ProtoReplicationMessage, ProtoReplicationType};
use crate::replica::commit_watermark::CommitWatermark;
use crate::replica::election::{CurrentLeader, ElectionConfig, ElectionState};
use crate::replica::envelopes;
use crate::replica::local_state::{PersistentLocalState, Term};
use crate::replica::peer_client::PeerClient;
use crate::replica::peers::{ClusterTracker, ServerId};
use crate::replica::replica_api::{
    CatchupFinished, ClientWriteInput, ClientWriteError, ClusterStatus, HeartbeatInput,
    HeartbeatOutput, HeartbeatReplyFromPeer, HeartbeatResult, LeaderTimerTick, PeerAck,
    PeerEnvelopeError, ReplicateInput, ReplicateOutput, ReplicateReplyFromPeer, ReplicatedOp,
    ReplicationExpired, RequestVoteError, RequestVoteInput, RequestVoteOutput, RequestVoteResult,
    RoleSnapshot, TermOutOfDateInfo, ValidationError, VoteReplyFromPeer, WriteOperation,
    WriteOutcome,
};
use crate::store::{ChatStore, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::Duration;

/// Longest accepted message content, in bytes.
const MAX_CONTENT_BYTES: usize = 4096;
/// Longest accepted username, in bytes.
const MAX_USERNAME_BYTES: usize = 64;

pub struct ReplicaConfig<S>
where
    S: PersistentLocalState,
{
    pub logger: slog::Logger,
    pub heartbeat_logger: slog::Logger,
    pub cluster: ClusterTracker,
    pub store: Arc<ChatStore>,
    pub broker: Arc<SubscriptionBroker>,
    pub local_state: S,
    pub commit_watermark: CommitWatermark,
    pub actor_client: ActorClient,
    pub leader_heartbeat_duration: Duration,
    pub follower_min_timeout: Duration,
    pub follower_max_timeout: Duration,
    pub replication_ack_timeout: Duration,
}

/// Replica is this server's replication engine: the Follower/Candidate/Leader
/// state machine, the vote rules, and the leader's fan-out with majority
/// tracking. All methods run on the actor event loop, which serializes every
/// state transition.
pub struct Replica<S>
where
    S: PersistentLocalState,
{
    logger: slog::Logger,
    heartbeat_logger: slog::Logger,
    my_server_id: ServerId,
    cluster: ClusterTracker,
    store: Arc<ChatStore>,
    broker: Arc<SubscriptionBroker>,
    local_state: S,
    election_state: ElectionState,
    commit_watermark: CommitWatermark,
    actor_client: ActorClient,
    heartbeat_duration: Duration,
    replication_ack_timeout: Duration,

    /// Broadcasts awaiting majority acknowledgment, keyed by a leader-local
    /// sequence number. The client callback lives here until commit/expiry.
    pending: HashMap<u64, PendingReplication>,
    next_broadcast_seq: u64,

    /// (term, id) of the newest locally applied message, for the
    /// log-up-to-date vote check. The term half is in-memory only and
    /// restarts at 0; the id half is re-read from the store at startup.
    last_log: (Term, u64),
}

struct PendingReplication {
    acks: HashSet<ServerId>,
    effect: CommittedEffect,
    callback: Callback<WriteOutcome, ClientWriteError>,
}

/// The user-visible consequence to run once an operation commits.
enum CommittedEffect {
    AccountCreated,
    MessageSent(PushedMessage),
    MessagesDeleted(Vec<u64>),
    AccountDeleted(String),
    MarkedRead,
}

enum Prepared {
    Broadcast(ReplicatedOp, CommittedEffect),
    /// The operation validated to a no-op; answer without replicating.
    Immediate(WriteOutcome),
}

impl<S> Replica<S>
where
    S: PersistentLocalState + Send + 'static,
{
    pub fn new(config: ReplicaConfig<S>) -> Result<Self, StoreError> {
        let my_server_id = config.cluster.my_server_id().clone();
        let election_state = ElectionState::new_follower(
            ElectionConfig {
                leader_heartbeat_duration: config.leader_heartbeat_duration,
                follower_min_timeout: config.follower_min_timeout,
                follower_max_timeout: config.follower_max_timeout,
            },
            config.actor_client.clone(),
        );
        let last_log_index = config.store.highest_message_id()?;

        Ok(Replica {
            logger: config.logger,
            heartbeat_logger: config.heartbeat_logger,
            my_server_id,
            cluster: config.cluster,
            store: config.store,
            broker: config.broker,
            local_state: config.local_state,
            election_state,
            commit_watermark: config.commit_watermark,
            actor_client: config.actor_client,
            heartbeat_duration: config.leader_heartbeat_duration,
            replication_ack_timeout: config.replication_ack_timeout,
            pending: HashMap::new(),
            next_broadcast_seq: 1,
            last_log: (Term::new(0), last_log_index),
        })
    }

    // -----------------------------------------------------------------------
    // Client writes
    // -----------------------------------------------------------------------

    pub fn handle_client_write(
        &mut self,
        input: ClientWriteInput,
        callback: Callback<WriteOutcome, ClientWriteError>,
    ) {
        match self.election_state.current_leader() {
            CurrentLeader::Me => { /* carry on */ }
            CurrentLeader::Other(leader) => {
                callback.send(Err(ClientWriteError::LeaderRedirect { leader }));
                return;
            }
            CurrentLeader::Unknown => {
                callback.send(Err(ClientWriteError::NoLeader));
                return;
            }
        }

        match self.validate_and_apply(input.operation) {
            Ok(Prepared::Broadcast(op, effect)) => self.broadcast_for_commit(op, effect, callback),
            Ok(Prepared::Immediate(outcome)) => callback.send(Ok(outcome)),
            Err(e) => callback.send(Err(e)),
        }
    }

    /// Leader-side step 1-2 of the replication path: validate against our own
    /// committed state, assign the id, apply locally (durably).
    fn validate_and_apply(&mut self, operation: WriteOperation) -> Result<Prepared, ClientWriteError> {
        match operation {
            WriteOperation::CreateAccount {
                username,
                password_verifier,
            } => {
                validate_username(&username)?;
                let created_at = envelopes::now_unix_seconds();
                let created = self
                    .store
                    .create_account(&username, &password_verifier, created_at)
                    .map_err(|e| self.storage_fault(e))?;
                if !created {
                    return Err(ValidationError::UsernameTaken.into());
                }
                Ok(Prepared::Broadcast(
                    ReplicatedOp::Account {
                        username,
                        password_verifier,
                        created_at,
                    },
                    CommittedEffect::AccountCreated,
                ))
            }
            WriteOperation::SendMessage {
                sender,
                recipient,
                content,
            } => {
                if content.is_empty() || content.len() > MAX_CONTENT_BYTES {
                    return Err(ValidationError::Invalid("content length out of bounds").into());
                }
                self.require_user(&sender)?;
                self.require_user(&recipient)?;

                let highest = self
                    .store
                    .highest_message_id()
                    .map_err(|e| self.storage_fault(e))?;
                let message_id = self.commit_watermark.get().max(highest) + 1;
                let timestamp = envelopes::now_unix_seconds();
                self.store
                    .insert_message(message_id, &sender, &recipient, &content, timestamp)
                    .map_err(|e| self.storage_fault(e))?;
                self.last_log = (self.local_state.current_term(), message_id);

                let push = PushedMessage {
                    id: message_id,
                    sender: sender.clone(),
                    recipient: recipient.clone(),
                    content: content.clone(),
                    timestamp,
                };
                Ok(Prepared::Broadcast(
                    ReplicatedOp::Message {
                        message_id,
                        sender,
                        recipient,
                        content,
                        timestamp,
                    },
                    CommittedEffect::MessageSent(push),
                ))
            }
            WriteOperation::DeleteMessages {
                requester,
                message_ids,
            } => {
                self.require_user(&requester)?;
                let deleted = self
                    .store
                    .delete_messages(&requester, &message_ids)
                    .map_err(|e| self.storage_fault(e))?;
                if deleted.is_empty() {
                    return Ok(Prepared::Immediate(WriteOutcome::MessagesDeleted {
                        deleted,
                    }));
                }
                Ok(Prepared::Broadcast(
                    ReplicatedOp::DeleteMessages {
                        requester,
                        // Followers only ever see the ids that actually went away.
                        message_ids: deleted.clone(),
                    },
                    CommittedEffect::MessagesDeleted(deleted),
                ))
            }
            WriteOperation::DeleteAccount { username } => {
                let removed = self
                    .store
                    .delete_account(&username)
                    .map_err(|e| self.storage_fault(e))?;
                if !removed {
                    return Err(ValidationError::NoSuchUser(username).into());
                }
                Ok(Prepared::Broadcast(
                    ReplicatedOp::DeleteAccount {
                        username: username.clone(),
                    },
                    CommittedEffect::AccountDeleted(username),
                ))
            }
            WriteOperation::MarkRead {
                requester,
                message_ids,
            } => {
                self.require_user(&requester)?;
                if message_ids.is_empty() {
                    return Ok(Prepared::Immediate(WriteOutcome::MarkedRead));
                }
                self.store
                    .mark_read(&requester, &message_ids)
                    .map_err(|e| self.storage_fault(e))?;
                Ok(Prepared::Broadcast(
                    ReplicatedOp::MarkRead {
                        requester,
                        message_ids,
                    },
                    CommittedEffect::MarkedRead,
                ))
            }
        }
    }

    fn require_user(&mut self, username: &str) -> Result<(), ClientWriteError> {
        let exists = self
            .store
            .user_exists(username)
            .map_err(|e| self.storage_fault(e))?;
        if exists {
            Ok(())
        } else {
            Err(ValidationError::NoSuchUser(username.to_string()).into())
        }
    }

    /// A durability failure on the leader: step down and abort the operation.
    fn storage_fault(&mut self, error: StoreError) -> ClientWriteError {
        slog::error!(self.logger, "Storage failure; stepping down: {}", error);
        self.election_state.transition_to_follower(None);
        self.fail_all_pending();
        ClientWriteError::StorageFault(error.to_string())
    }

    /// Steps 3-6: broadcast the typed Replicate envelope and park the
    /// callback until a majority acknowledges or the deadline passes.
    fn broadcast_for_commit(
        &mut self,
        op: ReplicatedOp,
        effect: CommittedEffect,
        callback: Callback<WriteOutcome, ClientWriteError>,
    ) {
        if self.cluster.num_voting_members() == 1 {
            // Majority of one: our own durable apply is the commit.
            let outcome = self.complete_effect(effect);
            callback.send(Ok(outcome));
            return;
        }

        let term = self.local_state.current_term();
        let seq = self.next_broadcast_seq;
        self.next_broadcast_seq += 1;

        let envelope = envelopes::replicate_envelope(term, &self.my_server_id, &op);
        for peer in self.cluster.iter_peers() {
            tokio::task::spawn(Self::call_peer_replicate(
                peer.client.clone(),
                peer.id.clone(),
                envelope.clone(),
                self.actor_client.clone(),
                term,
                seq,
                self.replication_ack_timeout,
            ));
        }
        tokio::task::spawn(Self::replication_expiry_task(
            self.actor_client.clone(),
            seq,
            self.replication_ack_timeout,
        ));

        self.pending.insert(
            seq,
            PendingReplication {
                acks: HashSet::new(),
                effect,
                callback,
            },
        );
    }

    pub fn handle_replicate_reply_from_peer(&mut self, reply: ReplicateReplyFromPeer) {
        match reply.result {
            PeerAck::StaleTerm { new_term } => {
                slog::info!(
                    self.logger,
                    "Stepping down - discovered higher term {} via replication",
                    new_term
                );
                self.adopt_term_and_step_down(new_term);
            }
            PeerAck::Success { applied_message_id } => {
                self.election_state
                    .leader_record_heartbeat_ack(&reply.peer_id, applied_message_id);

                let majority = self.cluster.majority_size();
                let reached_majority = match self.pending.get_mut(&reply.broadcast_seq) {
                    Some(pending) => {
                        pending.acks.insert(reply.peer_id);
                        // +1: our own durable apply.
                        pending.acks.len() + 1 >= majority
                    }
                    None => false,
                };
                if reached_majority {
                    let pending = self
                        .pending
                        .remove(&reply.broadcast_seq)
                        .expect("pending entry present; checked above");
                    let outcome = self.complete_effect(pending.effect);
                    pending.callback.send(Ok(outcome));
                }
            }
            PeerAck::Failure => {
                // The expiry task decides; a later heartbeat cycle reconciles
                // the follower.
            }
        }
    }

    pub fn handle_replication_expired(&mut self, expired: ReplicationExpired) {
        if let Some(pending) = self.pending.remove(&expired.broadcast_seq) {
            slog::warn!(
                self.logger,
                "Replication broadcast {} missed majority before its deadline",
                expired.broadcast_seq
            );
            pending
                .callback
                .send(Err(ClientWriteError::ReplicationTimeout));
        }
    }

    fn complete_effect(&mut self, effect: CommittedEffect) -> WriteOutcome {
        match effect {
            CommittedEffect::AccountCreated => WriteOutcome::AccountCreated,
            CommittedEffect::MessageSent(push) => {
                let (message_id, timestamp) = (push.id, push.timestamp);
                self.advance_commit_to(message_id);
                WriteOutcome::MessageSent {
                    message_id,
                    timestamp,
                }
            }
            CommittedEffect::MessagesDeleted(deleted) => WriteOutcome::MessagesDeleted { deleted },
            CommittedEffect::AccountDeleted(username) => {
                self.broker.drop_user(&username);
                WriteOutcome::AccountDeleted
            }
            CommittedEffect::MarkedRead => WriteOutcome::MarkedRead,
        }
    }

    /// Ratchets commit state forward and pushes the newly committed messages
    /// into the broker, in id order.
    fn advance_commit_to(&mut self, new_commit_index: u64) {
        let old_commit_index = self.commit_watermark.get();
        if new_commit_index <= old_commit_index {
            return;
        }
        if let Err(e) = self
            .local_state
            .store_commit_index_if_increased(new_commit_index)
        {
            // Not fatal: the watermark is re-derivable from leader heartbeats
            // after a restart.
            slog::error!(
                self.logger,
                "Failed to persist commit index {}: {}",
                new_commit_index,
                e
            );
        }
        self.commit_watermark.advance_to(new_commit_index);

        match self
            .store
            .messages_in_range(old_commit_index, new_commit_index)
        {
            Ok(messages) => {
                for message in messages {
                    self.broker.publish(PushedMessage {
                        id: message.id,
                        sender: message.sender,
                        recipient: message.recipient,
                        content: message.content,
                        timestamp: message.timestamp,
                    });
                }
            }
            Err(e) => {
                slog::error!(self.logger, "Failed to read committed range: {}", e);
            }
        }
    }

    fn fail_all_pending(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending
                .callback
                .send(Err(ClientWriteError::ReplicationTimeout));
        }
    }

    fn adopt_term_and_step_down(&mut self, new_term: Term) {
        match self.local_state.store_term_if_increased(new_term) {
            Ok(_) => {}
            Err(e) => {
                slog::error!(self.logger, "Failed to persist term {}: {}", new_term, e);
            }
        }
        self.election_state.transition_to_follower(None);
        self.fail_all_pending();
    }

    // -----------------------------------------------------------------------
    // Votes
    // -----------------------------------------------------------------------

    pub fn server_handle_request_vote(
        &mut self,
        input: RequestVoteInput,
    ) -> Result<RequestVoteOutput, RequestVoteError> {
        if !self.cluster.contains_member(&input.candidate_id) {
            return Err(RequestVoteError::CandidateNotInCluster);
        }

        let current_term = self.local_state.current_term();
        if input.candidate_term < current_term {
            return Err(RequestVoteError::RequestTermOutOfDate(TermOutOfDateInfo {
                current_term,
            }));
        }

        let increased = self
            .local_state
            .store_term_if_increased(input.candidate_term)
            .map_err(|e| RequestVoteError::StorageFault(e.to_string()))?;
        if increased {
            self.election_state.transition_to_follower(None);
            self.fail_all_pending();
        }

        // At most one vote per term.
        let (unvoted, already_voted_for_candidate) =
            match self.local_state.voted_for_current_term().1 {
                None => (true, false),
                Some(voted_for) => (false, *voted_for == input.candidate_id),
            };
        if !unvoted && !already_voted_for_candidate {
            return Ok(RequestVoteOutput {
                vote_granted: false,
            });
        }

        // The candidate's log must be at least as up-to-date as ours.
        if !self.is_candidate_at_least_as_up_to_date(
            input.candidate_last_log_term,
            input.candidate_last_log_index,
        ) {
            return Ok(RequestVoteOutput {
                vote_granted: false,
            });
        }

        let granted = already_voted_for_candidate
            || self
                .local_state
                .store_vote_if_unvoted(input.candidate_term, input.candidate_id.clone())
                .map_err(|e| RequestVoteError::StorageFault(e.to_string()))?;

        if granted {
            slog::info!(
                self.logger,
                "Granted vote to {} for term {}",
                input.candidate_id,
                input.candidate_term
            );
            self.election_state.reset_timeout_if_follower();
        }
        Ok(RequestVoteOutput {
            vote_granted: granted,
        })
    }

    /// Higher last-log term wins; ties break on last-log index.
    fn is_candidate_at_least_as_up_to_date(
        &self,
        candidate_last_log_term: Term,
        candidate_last_log_index: u64,
    ) -> bool {
        let (my_last_log_term, my_last_log_index) = self.last_log;
        candidate_last_log_term > my_last_log_term
            || (candidate_last_log_term == my_last_log_term
                && candidate_last_log_index >= my_last_log_index)
    }

    pub fn handle_vote_reply_from_peer(&mut self, reply: VoteReplyFromPeer) {
        match reply.result {
            RequestVoteResult::VoteGranted => {
                let votes = self
                    .election_state
                    .add_received_vote_if_candidate(reply.term, reply.peer_id);
                if votes == 0 {
                    // Not campaigning in that term (anymore).
                    return;
                }
                slog::debug!(
                    self.logger,
                    "Vote tally for term {}: {}/{}",
                    reply.term,
                    votes,
                    self.cluster.num_voting_members()
                );
                if votes >= self.cluster.majority_size() {
                    self.win_election(reply.term, votes);
                }
            }
            RequestVoteResult::VoteNotGranted => {
                // No action.
            }
            RequestVoteResult::StaleTerm { new_term } => {
                let increased = self.local_state.store_term_if_increased(new_term);
                match increased {
                    Ok(true) => {
                        slog::info!(
                            self.logger,
                            "Abandoning election - discovered higher term {}",
                            new_term
                        );
                        self.election_state.transition_to_follower(None);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        slog::error!(self.logger, "Failed to persist term {}: {}", new_term, e);
                    }
                }
            }
            RequestVoteResult::RetryableFailure => {
                if !self.election_state.is_election_open(reply.term) {
                    return;
                }
                if let Some(peer) = self.cluster.peer(&reply.peer_id) {
                    let envelope = self.new_vote_request_envelope(reply.term);
                    tokio::task::spawn(Self::retry_peer_request_vote(
                        peer.client.clone(),
                        peer.id.clone(),
                        envelope,
                        self.actor_client.clone(),
                        reply.term,
                        self.replication_ack_timeout,
                        self.heartbeat_duration,
                    ));
                }
            }
            RequestVoteResult::MalformedReply => {
                // Don't retry a peer that answers nonsense.
            }
        }
    }

    fn win_election(&mut self, term: Term, votes: usize) {
        slog::info!(
            self.logger,
            "Elected leader for term {} with {}/{} votes",
            term,
            votes,
            self.cluster.num_voting_members()
        );
        let peer_ids = self.cluster.iter_peers().map(|p| p.id.clone()).collect();
        self.election_state.transition_to_leader_if_not(term, peer_ids);
        // The heartbeat timer's first tick broadcasts immediately, which
        // announces the new leadership and suppresses rival elections.
    }

    pub fn handle_follower_timeout(&mut self) {
        if self.election_state.is_leader() {
            return;
        }

        let new_term = match self
            .local_state
            .increment_term_and_vote_for_self(self.my_server_id.clone())
        {
            Ok(term) => term,
            Err(e) => {
                slog::error!(self.logger, "Cannot campaign, term persist failed: {}", e);
                self.election_state.transition_to_follower(None);
                return;
            }
        };

        slog::info!(
            self.logger,
            "No leader contact within timeout; campaigning in term {}",
            new_term
        );
        self.election_state.transition_to_candidate(new_term);

        if self.cluster.majority_size() == 1 {
            // Single-node cluster: our own vote is the majority.
            self.win_election(new_term, 1);
            return;
        }

        let envelope = self.new_vote_request_envelope(new_term);
        for peer in self.cluster.iter_peers() {
            tokio::task::spawn(Self::call_peer_request_vote(
                peer.client.clone(),
                peer.id.clone(),
                envelope.clone(),
                self.actor_client.clone(),
                new_term,
                self.replication_ack_timeout,
            ));
        }
    }

    fn new_vote_request_envelope(&self, term: Term) -> ProtoReplicationMessage {
        let (last_log_term, last_log_index) = self.last_log;
        envelopes::vote_request_envelope(term, &self.my_server_id, last_log_term, last_log_index)
    }

    // -----------------------------------------------------------------------
    // Heartbeats
    // -----------------------------------------------------------------------

    pub fn handle_leader_timer(&mut self, tick: LeaderTimerTick) {
        if self.election_state.leadership_term() != Some(tick.term) {
            return;
        }

        let commit_index = self.commit_watermark.get();
        slog::debug!(
            self.heartbeat_logger,
            "Broadcasting heartbeat (term {}, commit {})",
            tick.term,
            commit_index
        );
        let envelope = envelopes::heartbeat_envelope(tick.term, &self.my_server_id, commit_index);
        for peer in self.cluster.iter_peers() {
            tokio::task::spawn(Self::call_peer_heartbeat(
                peer.client.clone(),
                peer.id.clone(),
                envelope.clone(),
                self.actor_client.clone(),
                tick.term,
                self.replication_ack_timeout,
            ));
        }
    }

    pub fn server_handle_heartbeat(
        &mut self,
        input: HeartbeatInput,
    ) -> Result<HeartbeatOutput, PeerEnvelopeError> {
        self.accept_leader_contact(input.leader_term, &input.leader_id)?;

        slog::debug!(
            self.heartbeat_logger,
            "Heartbeat from {} (term {}, commit {})",
            input.leader_id,
            input.leader_term,
            input.leader_commit_index
        );

        // Follower commit index chases min(leader commit, local applied).
        let local_highest = self
            .store
            .highest_message_id()
            .map_err(|e| PeerEnvelopeError::StorageFault(e.to_string()))?;
        self.advance_commit_to(input.leader_commit_index.min(local_highest));

        Ok(HeartbeatOutput {
            highest_applied_id: local_highest,
        })
    }

    /// Shared first-action for heartbeat and replicate envelopes: membership
    /// and term checks, leader adoption, election timer reset.
    fn accept_leader_contact(
        &mut self,
        leader_term: Term,
        leader_id: &ServerId,
    ) -> Result<(), PeerEnvelopeError> {
        if !self.cluster.contains_member(leader_id) {
            return Err(PeerEnvelopeError::SenderNotInCluster);
        }

        let current_term = self.local_state.current_term();
        if leader_term < current_term {
            return Err(PeerEnvelopeError::SenderTermOutOfDate(TermOutOfDateInfo {
                current_term,
            }));
        }

        let increased = self
            .local_state
            .store_term_if_increased(leader_term)
            .map_err(|e| PeerEnvelopeError::StorageFault(e.to_string()))?;
        if increased {
            slog::info!(
                self.logger,
                "Adopting term {} from leader {}",
                leader_term,
                leader_id
            );
            self.election_state
                .transition_to_follower(Some(leader_id.clone()));
            self.fail_all_pending();
        } else {
            self.election_state.observe_leader(leader_id.clone());
        }
        self.election_state.reset_timeout_if_follower();
        Ok(())
    }

    pub fn handle_heartbeat_reply_from_peer(&mut self, reply: HeartbeatReplyFromPeer) {
        // Only meaningful while we lead in the term the heartbeat went out in.
        if self.election_state.leadership_term() != Some(reply.term) {
            return;
        }

        match reply.result {
            HeartbeatResult::Acked { highest_applied_id } => {
                self.election_state
                    .leader_record_heartbeat_ack(&reply.peer_id, highest_applied_id);
                let commit_index = self.commit_watermark.get();
                if self
                    .election_state
                    .leader_peer_needs_catchup(&reply.peer_id, commit_index)
                {
                    self.start_catchup(reply.peer_id, commit_index);
                }
            }
            HeartbeatResult::StaleTerm { new_term } => {
                slog::info!(
                    self.logger,
                    "Stepping down - discovered higher term {} via heartbeat",
                    new_term
                );
                self.adopt_term_and_step_down(new_term);
            }
            HeartbeatResult::Unreachable => {
                let alive = self.election_state.leader_record_heartbeat_miss(&reply.peer_id);
                if alive < self.cluster.majority_size() {
                    slog::warn!(
                        self.logger,
                        "Quorum lost: only {}/{} members reachable; stepping down",
                        alive,
                        self.cluster.num_voting_members()
                    );
                    self.election_state.transition_to_follower(None);
                    self.fail_all_pending();
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Replicate apply (follower side)
    // -----------------------------------------------------------------------

    pub fn server_handle_replicate(
        &mut self,
        input: ReplicateInput,
    ) -> Result<ReplicateOutput, PeerEnvelopeError> {
        self.accept_leader_contact(input.leader_term, &input.leader_id)?;

        let applied_message_id = self
            .apply_replicated_op(&input.operation)
            .map_err(|e| PeerEnvelopeError::StorageFault(e.to_string()))?;

        if applied_message_id > 0 {
            self.last_log = (
                input.leader_term,
                self.last_log.1.max(applied_message_id),
            );
        }

        Ok(ReplicateOutput { applied_message_id })
    }

    fn apply_replicated_op(&mut self, op: &ReplicatedOp) -> Result<u64, StoreError> {
        match op {
            ReplicatedOp::Message {
                message_id,
                sender,
                recipient,
                content,
                timestamp,
            } => {
                self.store
                    .insert_message(*message_id, sender, recipient, content, *timestamp)?;
                Ok(*message_id)
            }
            ReplicatedOp::Account {
                username,
                password_verifier,
                created_at,
            } => {
                self.store
                    .apply_account(username, password_verifier, *created_at)?;
                Ok(0)
            }
            ReplicatedOp::DeleteMessages {
                requester,
                message_ids,
            } => {
                self.store.delete_messages(requester, message_ids)?;
                Ok(0)
            }
            ReplicatedOp::DeleteAccount { username } => {
                self.store.delete_account(username)?;
                self.broker.drop_user(username);
                Ok(0)
            }
            ReplicatedOp::MarkRead {
                requester,
                message_ids,
            } => {
                self.store.mark_read(requester, message_ids)?;
                Ok(0)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Catch-up for lagging followers
    // -----------------------------------------------------------------------

    fn start_catchup(&mut self, peer_id: ServerId, commit_index: u64) {
        let match_index = self
            .election_state
            .leader_peer_match_index(&peer_id)
            .unwrap_or(0);

        let leader_highest = match self.store.highest_message_id() {
            Ok(highest) => highest,
            Err(e) => {
                slog::error!(self.logger, "Catch-up skipped, store read failed: {}", e);
                return;
            }
        };
        // Don't chase ids that no longer exist locally (deleted history).
        let target = commit_index.min(leader_highest);
        if match_index >= target {
            return;
        }

        let messages = match self.store.messages_in_range(match_index, target) {
            Ok(messages) => messages,
            Err(e) => {
                slog::error!(self.logger, "Catch-up skipped, store read failed: {}", e);
                return;
            }
        };
        if messages.is_empty() {
            return;
        }
        let accounts = match self.store.snapshot_for_catchup(0) {
            Ok(snapshot) => snapshot.accounts,
            Err(e) => {
                slog::error!(self.logger, "Catch-up skipped, store read failed: {}", e);
                return;
            }
        };

        let term = self.local_state.current_term();
        let mut catchup_envelopes = Vec::new();
        for account in accounts {
            catchup_envelopes.push(envelopes::replicate_envelope(
                term,
                &self.my_server_id,
                &ReplicatedOp::Account {
                    username: account.username,
                    password_verifier: account.password_verifier.into(),
                    created_at: account.created_at,
                },
            ));
        }
        let mut read_ids_by_recipient: HashMap<String, Vec<u64>> = HashMap::new();
        for message in &messages {
            if message.read {
                read_ids_by_recipient
                    .entry(message.recipient.clone())
                    .or_default()
                    .push(message.id);
            }
        }
        for message in messages {
            catchup_envelopes.push(envelopes::replicate_envelope(
                term,
                &self.my_server_id,
                &ReplicatedOp::Message {
                    message_id: message.id,
                    sender: message.sender,
                    recipient: message.recipient,
                    content: message.content,
                    timestamp: message.timestamp,
                },
            ));
        }
        for (recipient, message_ids) in read_ids_by_recipient {
            catchup_envelopes.push(envelopes::replicate_envelope(
                term,
                &self.my_server_id,
                &ReplicatedOp::MarkRead {
                    requester: recipient,
                    message_ids,
                },
            ));
        }

        let Some(peer) = self.cluster.peer(&peer_id) else {
            return;
        };
        slog::info!(
            self.logger,
            "Catching up peer {} from id {} to {} ({} envelopes)",
            peer_id,
            match_index,
            target,
            catchup_envelopes.len()
        );
        self.election_state.leader_set_catchup_in_flight(&peer_id, true);
        tokio::task::spawn(Self::call_peer_catchup(
            peer.client.clone(),
            peer_id,
            catchup_envelopes,
            self.actor_client.clone(),
            self.replication_ack_timeout,
        ));
    }

    pub fn handle_catchup_finished(&mut self, finished: CatchupFinished) {
        self.election_state
            .leader_set_catchup_in_flight(&finished.peer_id, false);
        if !finished.success {
            slog::debug!(
                self.logger,
                "Catch-up for peer {} did not complete; will retry after next heartbeat",
                finished.peer_id
            );
        }
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    pub fn cluster_status(&self) -> ClusterStatus {
        let leader = match self.election_state.current_leader() {
            CurrentLeader::Me => Some(self.my_server_id.clone()),
            CurrentLeader::Other(leader_id) => Some(leader_id),
            CurrentLeader::Unknown => None,
        };
        let role = if self.election_state.is_leader() {
            RoleSnapshot::Leader
        } else if self.election_state.is_candidate() {
            RoleSnapshot::Candidate
        } else {
            RoleSnapshot::Follower
        };
        ClusterStatus {
            role,
            term: self.local_state.current_term(),
            leader,
            commit_index: self.commit_watermark.get(),
        }
    }

    // -----------------------------------------------------------------------
    // Peer RPC tasks (run off the event loop, report back as events)
    // -----------------------------------------------------------------------

    async fn call_peer_replicate(
        mut peer_client: PeerClient,
        peer_id: ServerId,
        envelope: ProtoReplicationMessage,
        callback: ActorClient,
        term: Term,
        broadcast_seq: u64,
        timeout: Duration,
    ) {
        let rpc_reply = peer_client.handle_replication(envelope, timeout).await;

        let result = match rpc_reply {
            Ok(reply) => {
                let observed_term = Term::new(reply.term);
                match (reply.r#type(), reply.payload) {
                    (
                        ProtoReplicationType::ReplicationResponse,
                        Some(Payload::ReplicationResponse(response)),
                    ) if response.success => PeerAck::Success {
                        applied_message_id: response.message_id,
                    },
                    (ProtoReplicationType::ReplicationError, _) if observed_term > term => {
                        PeerAck::StaleTerm {
                            new_term: observed_term,
                        }
                    }
                    _ => PeerAck::Failure,
                }
            }
            Err(_) => PeerAck::Failure,
        };

        callback
            .notify_replicate_reply_from_peer(ReplicateReplyFromPeer {
                peer_id,
                broadcast_seq,
                result,
            })
            .await;
    }

    async fn replication_expiry_task(callback: ActorClient, broadcast_seq: u64, deadline: Duration) {
        tokio::time::sleep(deadline).await;
        callback
            .notify_replication_expired(ReplicationExpired { broadcast_seq })
            .await;
    }

    async fn call_peer_heartbeat(
        mut peer_client: PeerClient,
        peer_id: ServerId,
        envelope: ProtoReplicationMessage,
        callback: ActorClient,
        term: Term,
        timeout: Duration,
    ) {
        let rpc_reply = peer_client.handle_replication(envelope, timeout).await;

        let result = match rpc_reply {
            Ok(reply) => {
                let observed_term = Term::new(reply.term);
                match (reply.r#type(), reply.payload) {
                    (
                        ProtoReplicationType::ReplicationResponse,
                        Some(Payload::ReplicationResponse(response)),
                    ) if response.success => HeartbeatResult::Acked {
                        highest_applied_id: response.message_id,
                    },
                    (ProtoReplicationType::ReplicationError, _) if observed_term > term => {
                        HeartbeatResult::StaleTerm {
                            new_term: observed_term,
                        }
                    }
                    _ => HeartbeatResult::Unreachable,
                }
            }
            Err(_) => HeartbeatResult::Unreachable,
        };

        callback
            .notify_heartbeat_reply_from_peer(HeartbeatReplyFromPeer {
                peer_id,
                term,
                result,
            })
            .await;
    }

    async fn call_peer_request_vote(
        mut peer_client: PeerClient,
        peer_id: ServerId,
        envelope: ProtoReplicationMessage,
        callback: ActorClient,
        term: Term,
        timeout: Duration,
    ) {
        let rpc_reply = peer_client.handle_replication(envelope, timeout).await;

        let result = match rpc_reply {
            Ok(reply) => {
                let observed_term = Term::new(reply.term);
                match (reply.r#type(), reply.payload) {
                    (ProtoReplicationType::VoteResponse, Some(Payload::VoteResponse(response))) => {
                        if response.vote_granted {
                            RequestVoteResult::VoteGranted
                        } else {
                            RequestVoteResult::VoteNotGranted
                        }
                    }
                    (ProtoReplicationType::ReplicationError, _) if observed_term > term => {
                        RequestVoteResult::StaleTerm {
                            new_term: observed_term,
                        }
                    }
                    _ => RequestVoteResult::MalformedReply,
                }
            }
            Err(_) => RequestVoteResult::RetryableFailure,
        };

        callback
            .notify_vote_reply_from_peer(VoteReplyFromPeer {
                peer_id,
                term,
                result,
            })
            .await;
    }

    async fn retry_peer_request_vote(
        peer_client: PeerClient,
        peer_id: ServerId,
        envelope: ProtoReplicationMessage,
        callback: ActorClient,
        term: Term,
        timeout: Duration,
        delay: Duration,
    ) {
        tokio::time::sleep(delay).await;
        Self::call_peer_request_vote(peer_client, peer_id, envelope, callback, term, timeout).await;
    }

    async fn call_peer_catchup(
        mut peer_client: PeerClient,
        peer_id: ServerId,
        catchup_envelopes: Vec<ProtoReplicationMessage>,
        callback: ActorClient,
        timeout: Duration,
    ) {
        let mut success = true;
        for envelope in catchup_envelopes {
            match peer_client.handle_replication(envelope, timeout).await {
                Ok(reply) => {
                    let acked = matches!(
                        (reply.r#type(), reply.payload),
                        (
                            ProtoReplicationType::ReplicationResponse,
                            Some(Payload::ReplicationResponse(response)),
                        ) if response.success
                    );
                    if !acked {
                        success = false;
                        break;
                    }
                }
                Err(_) => {
                    success = false;
                    break;
                }
            }
        }

        callback
            .notify_catchup_finished(CatchupFinished { peer_id, success })
            .await;
    }
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() || username.len() > MAX_USERNAME_BYTES {
        return Err(ValidationError::Invalid("username length out of bounds"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Event;
    use crate::replica::local_state::VolatileLocalState;
    use bytes::Bytes;
    use tokio::sync::{mpsc, oneshot};

    const ME: &str = "127.0.0.1:41051";
    const PEER_A: &str = "127.0.0.1:41052";
    const PEER_B: &str = "127.0.0.1:41053";

    struct Fixture {
        replica: Replica<VolatileLocalState>,
        // Keeps timer/notification events flowing instead of blocking senders.
        _actor_rx: mpsc::Receiver<Event>,
        store: Arc<ChatStore>,
        broker: Arc<SubscriptionBroker>,
        watermark: CommitWatermark,
    }

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn fixture(peers: &[&str]) -> Fixture {
        let (actor_tx, actor_rx) = mpsc::channel(256);
        let cluster = ClusterTracker::create_valid_cluster(
            test_logger(),
            ServerId::new(ME),
            peers.iter().map(|p| ServerId::new(*p)).collect(),
        )
        .unwrap();
        let store = Arc::new(ChatStore::open_in_memory().unwrap());
        let broker = SubscriptionBroker::new(16);
        let watermark = CommitWatermark::new(0);

        let replica = Replica::new(ReplicaConfig {
            logger: test_logger(),
            heartbeat_logger: test_logger(),
            cluster,
            store: Arc::clone(&store),
            broker: Arc::clone(&broker),
            local_state: VolatileLocalState::new(),
            commit_watermark: watermark.clone(),
            actor_client: ActorClient::new(actor_tx),
            leader_heartbeat_duration: Duration::from_millis(50),
            follower_min_timeout: Duration::from_millis(500),
            follower_max_timeout: Duration::from_millis(1000),
            replication_ack_timeout: Duration::from_millis(200),
        })
        .unwrap();

        Fixture {
            replica,
            _actor_rx: actor_rx,
            store,
            broker,
            watermark,
        }
    }

    fn vote_input(candidate: &str, term: u64, last_log_term: u64, last_log_index: u64) -> RequestVoteInput {
        RequestVoteInput {
            candidate_term: Term::new(term),
            candidate_id: ServerId::new(candidate),
            candidate_last_log_term: Term::new(last_log_term),
            candidate_last_log_index: last_log_index,
        }
    }

    fn replicate_message_input(leader: &str, term: u64, id: u64, recipient: &str) -> ReplicateInput {
        ReplicateInput {
            leader_term: Term::new(term),
            leader_id: ServerId::new(leader),
            operation: ReplicatedOp::Message {
                message_id: id,
                sender: "alice".to_string(),
                recipient: recipient.to_string(),
                content: format!("m{}", id),
                timestamp: id as f64,
            },
        }
    }

    fn submit_write(
        replica: &mut Replica<VolatileLocalState>,
        operation: WriteOperation,
    ) -> oneshot::Receiver<Result<WriteOutcome, ClientWriteError>> {
        let (tx, rx) = oneshot::channel();
        replica.handle_client_write(ClientWriteInput { operation }, Callback::new(tx));
        rx
    }

    fn create_account_op(username: &str) -> WriteOperation {
        WriteOperation::CreateAccount {
            username: username.to_string(),
            password_verifier: Bytes::from_static(b"pw"),
        }
    }

    #[tokio::test]
    async fn grants_at_most_one_vote_per_term() {
        let mut f = fixture(&[PEER_A, PEER_B]);

        let granted = f.replica.server_handle_request_vote(vote_input(PEER_A, 1, 0, 0)).unwrap();
        assert!(granted.vote_granted);

        // Different candidate, same term: refused.
        let refused = f.replica.server_handle_request_vote(vote_input(PEER_B, 1, 0, 0)).unwrap();
        assert!(!refused.vote_granted);

        // Same candidate retrying: still granted.
        let repeat = f.replica.server_handle_request_vote(vote_input(PEER_A, 1, 0, 0)).unwrap();
        assert!(repeat.vote_granted);
    }

    #[tokio::test]
    async fn rejects_vote_request_from_a_past_term() {
        let mut f = fixture(&[PEER_A, PEER_B]);
        f.replica.server_handle_request_vote(vote_input(PEER_A, 3, 0, 0)).unwrap();

        match f.replica.server_handle_request_vote(vote_input(PEER_B, 2, 0, 0)) {
            Err(RequestVoteError::RequestTermOutOfDate(info)) => {
                assert_eq!(info.current_term, Term::new(3));
            }
            other => panic!("expected stale-term rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn denies_vote_to_candidate_with_a_shorter_log() {
        let mut f = fixture(&[PEER_A, PEER_B]);
        // Apply id 1..=3 from the term-1 leader.
        for id in 1..=3 {
            f.replica
                .server_handle_replicate(replicate_message_input(PEER_A, 1, id, "bob"))
                .unwrap();
        }

        let behind = f.replica.server_handle_request_vote(vote_input(PEER_B, 2, 1, 2)).unwrap();
        assert!(!behind.vote_granted);

        let caught_up = f.replica.server_handle_request_vote(vote_input(PEER_A, 2, 1, 3)).unwrap();
        assert!(caught_up.vote_granted);
    }

    #[tokio::test]
    async fn heartbeat_sets_leader_hint_and_advances_commit_to_local_applied() {
        let mut f = fixture(&[PEER_A, PEER_B]);
        let (_guard, mut updates) = f.broker.subscribe("bob");

        for id in 1..=2 {
            f.replica
                .server_handle_replicate(replicate_message_input(PEER_A, 1, id, "bob"))
                .unwrap();
        }
        // Nothing visible until the leader's commit index arrives.
        assert_eq!(f.watermark.get(), 0);

        let output = f
            .replica
            .server_handle_heartbeat(HeartbeatInput {
                leader_term: Term::new(1),
                leader_id: ServerId::new(PEER_A),
                leader_commit_index: 5,
            })
            .unwrap();

        assert_eq!(output.highest_applied_id, 2);
        // Capped at what we've locally applied.
        assert_eq!(f.watermark.get(), 2);

        let status = f.replica.cluster_status();
        assert_eq!(status.role, RoleSnapshot::Follower);
        assert_eq!(status.leader, Some(ServerId::new(PEER_A)));

        // Newly committed messages reached the local subscriber, in order.
        assert_eq!(updates.recv().await.unwrap().id, 1);
        assert_eq!(updates.recv().await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn stale_heartbeat_is_rejected_with_current_term() {
        let mut f = fixture(&[PEER_A, PEER_B]);
        f.replica.server_handle_request_vote(vote_input(PEER_A, 4, 0, 0)).unwrap();

        let result = f.replica.server_handle_heartbeat(HeartbeatInput {
            leader_term: Term::new(3),
            leader_id: ServerId::new(PEER_B),
            leader_commit_index: 0,
        });
        match result {
            Err(PeerEnvelopeError::SenderTermOutOfDate(info)) => {
                assert_eq!(info.current_term, Term::new(4));
            }
            other => panic!("expected stale-term rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn client_writes_are_refused_or_redirected_off_the_leader_path() {
        let mut f = fixture(&[PEER_A, PEER_B]);

        let rx = submit_write(&mut f.replica, create_account_op("alice"));
        match rx.await.unwrap() {
            Err(ClientWriteError::NoLeader) => {}
            other => panic!("expected NoLeader, got {:?}", other),
        }

        // Once a leader is known, the client gets a redirect instead.
        f.replica
            .server_handle_heartbeat(HeartbeatInput {
                leader_term: Term::new(1),
                leader_id: ServerId::new(PEER_A),
                leader_commit_index: 0,
            })
            .unwrap();
        let rx = submit_write(&mut f.replica, create_account_op("alice"));
        match rx.await.unwrap() {
            Err(ClientWriteError::LeaderRedirect { leader }) => {
                assert_eq!(leader, ServerId::new(PEER_A));
            }
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn replicate_apply_is_idempotent_by_id() {
        let mut f = fixture(&[PEER_A, PEER_B]);

        let first = f
            .replica
            .server_handle_replicate(replicate_message_input(PEER_A, 1, 7, "bob"))
            .unwrap();
        assert_eq!(first.applied_message_id, 7);

        // A heartbeat-driven retry of the same id must succeed quietly.
        let retry = f
            .replica
            .server_handle_replicate(replicate_message_input(PEER_A, 1, 7, "bob"))
            .unwrap();
        assert_eq!(retry.applied_message_id, 7);
        assert_eq!(f.store.highest_message_id().unwrap(), 7);
    }

    #[tokio::test]
    async fn single_node_cluster_elects_itself_and_commits_without_peers() {
        let mut f = fixture(&[]);

        f.replica.handle_follower_timeout();
        assert_eq!(f.replica.cluster_status().role, RoleSnapshot::Leader);

        let rx = submit_write(&mut f.replica, create_account_op("alice"));
        assert!(matches!(rx.await.unwrap(), Ok(WriteOutcome::AccountCreated)));
        let rx = submit_write(&mut f.replica, create_account_op("bob"));
        assert!(matches!(rx.await.unwrap(), Ok(WriteOutcome::AccountCreated)));

        // Duplicate username surfaces as validation, not replication.
        let rx = submit_write(&mut f.replica, create_account_op("alice"));
        match rx.await.unwrap() {
            Err(ClientWriteError::Validation(ValidationError::UsernameTaken)) => {}
            other => panic!("expected username_taken, got {:?}", other),
        }

        for expected_id in 1..=2u64 {
            let rx = submit_write(
                &mut f.replica,
                WriteOperation::SendMessage {
                    sender: "alice".to_string(),
                    recipient: "bob".to_string(),
                    content: format!("hi{}", expected_id),
                },
            );
            match rx.await.unwrap() {
                Ok(WriteOutcome::MessageSent { message_id, .. }) => {
                    assert_eq!(message_id, expected_id);
                }
                other => panic!("expected MessageSent, got {:?}", other),
            }
        }
        assert_eq!(f.watermark.get(), 2);
    }

    #[tokio::test]
    async fn leader_commits_once_a_majority_acknowledges() {
        let mut f = fixture(&[PEER_A, PEER_B]);

        // Win an election: campaign, then one granted vote = majority of 3.
        f.replica.handle_follower_timeout();
        f.replica.handle_vote_reply_from_peer(VoteReplyFromPeer {
            peer_id: ServerId::new(PEER_A),
            term: Term::new(1),
            result: RequestVoteResult::VoteGranted,
        });
        assert_eq!(f.replica.cluster_status().role, RoleSnapshot::Leader);

        // Broadcast seq numbers are assigned in order starting at 1.
        let mut rx = submit_write(&mut f.replica, create_account_op("alice"));
        f.replica.handle_replicate_reply_from_peer(ReplicateReplyFromPeer {
            peer_id: ServerId::new(PEER_A),
            broadcast_seq: 1,
            result: PeerAck::Success {
                applied_message_id: 0,
            },
        });
        assert!(matches!(rx.try_recv().unwrap(), Ok(WriteOutcome::AccountCreated)));

        let mut rx = submit_write(&mut f.replica, create_account_op("bob"));
        f.replica.handle_replicate_reply_from_peer(ReplicateReplyFromPeer {
            peer_id: ServerId::new(PEER_B),
            broadcast_seq: 2,
            result: PeerAck::Success {
                applied_message_id: 0,
            },
        });
        assert!(rx.try_recv().unwrap().is_ok());

        let mut rx = submit_write(
            &mut f.replica,
            WriteOperation::SendMessage {
                sender: "alice".to_string(),
                recipient: "bob".to_string(),
                content: "hi".to_string(),
            },
        );
        // One ack is not a majority yet.
        assert!(rx.try_recv().is_err());
        f.replica.handle_replicate_reply_from_peer(ReplicateReplyFromPeer {
            peer_id: ServerId::new(PEER_A),
            broadcast_seq: 3,
            result: PeerAck::Success {
                applied_message_id: 1,
            },
        });
        match rx.try_recv().unwrap() {
            Ok(WriteOutcome::MessageSent { message_id, .. }) => assert_eq!(message_id, 1),
            other => panic!("expected MessageSent, got {:?}", other),
        }
        assert_eq!(f.watermark.get(), 1);
    }

    #[tokio::test]
    async fn expired_broadcast_fails_back_to_the_client() {
        let mut f = fixture(&[PEER_A, PEER_B]);
        f.replica.handle_follower_timeout();
        f.replica.handle_vote_reply_from_peer(VoteReplyFromPeer {
            peer_id: ServerId::new(PEER_A),
            term: Term::new(1),
            result: RequestVoteResult::VoteGranted,
        });

        let mut rx = submit_write(&mut f.replica, create_account_op("alice"));
        f.replica.handle_replication_expired(ReplicationExpired { broadcast_seq: 1 });
        match rx.try_recv().unwrap() {
            Err(ClientWriteError::ReplicationTimeout) => {}
            other => panic!("expected timeout, got {:?}", other),
        }

        // A late ack for the expired broadcast is ignored.
        f.replica.handle_replicate_reply_from_peer(ReplicateReplyFromPeer {
            peer_id: ServerId::new(PEER_A),
            broadcast_seq: 1,
            result: PeerAck::Success {
                applied_message_id: 0,
            },
        });
    }

    #[tokio::test]
    async fn leader_steps_down_when_quorum_is_unreachable() {
        let mut f = fixture(&[PEER_A, PEER_B]);
        f.replica.handle_follower_timeout();
        f.replica.handle_vote_reply_from_peer(VoteReplyFromPeer {
            peer_id: ServerId::new(PEER_A),
            term: Term::new(1),
            result: RequestVoteResult::VoteGranted,
        });
        assert_eq!(f.replica.cluster_status().role, RoleSnapshot::Leader);

        // Threshold is follower_min_timeout / heartbeat = 10 missed rounds.
        for _ in 0..10 {
            for peer in [PEER_A, PEER_B] {
                f.replica.handle_heartbeat_reply_from_peer(HeartbeatReplyFromPeer {
                    peer_id: ServerId::new(peer),
                    term: Term::new(1),
                    result: HeartbeatResult::Unreachable,
                });
            }
        }
        assert_eq!(f.replica.cluster_status().role, RoleSnapshot::Follower);
    }

    #[tokio::test]
    async fn leader_steps_down_on_a_higher_term_from_any_reply() {
        let mut f = fixture(&[PEER_A, PEER_B]);
        f.replica.handle_follower_timeout();
        f.replica.handle_vote_reply_from_peer(VoteReplyFromPeer {
            peer_id: ServerId::new(PEER_A),
            term: Term::new(1),
            result: RequestVoteResult::VoteGranted,
        });

        let mut rx = submit_write(&mut f.replica, create_account_op("alice"));
        f.replica.handle_heartbeat_reply_from_peer(HeartbeatReplyFromPeer {
            peer_id: ServerId::new(PEER_B),
            term: Term::new(1),
            result: HeartbeatResult::StaleTerm {
                new_term: Term::new(6),
            },
        });

        let status = f.replica.cluster_status();
        assert_eq!(status.role, RoleSnapshot::Follower);
        assert_eq!(status.term, Term::new(6));
        // The in-flight write fails as retryable rather than hanging.
        assert!(rx.try_recv().unwrap().is_err());
    }
}
