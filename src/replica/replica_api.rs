use crate::replica::local_state::Term;
use crate::replica::peers::ServerId;
use bytes::Bytes;

// ---------------------------------------------------------------------------
// Client writes (arrive via the client RPC surface, leader-only)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ClientWriteInput {
    pub operation: WriteOperation,
}

/// The five replicated operations, as requested by a client.
#[derive(Debug, Clone)]
pub enum WriteOperation {
    CreateAccount {
        username: String,
        password_verifier: Bytes,
    },
    SendMessage {
        sender: String,
        recipient: String,
        content: String,
    },
    DeleteMessages {
        requester: String,
        message_ids: Vec<u64>,
    },
    DeleteAccount {
        username: String,
    },
    MarkRead {
        requester: String,
        message_ids: Vec<u64>,
    },
}

/// What the client learns once the write reached a majority.
#[derive(Debug)]
pub enum WriteOutcome {
    AccountCreated,
    MessageSent { message_id: u64, timestamp: f64 },
    MessagesDeleted { deleted: Vec<u64> },
    AccountDeleted,
    MarkedRead,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientWriteError {
    #[error("not leader, redirect to {leader}")]
    LeaderRedirect { leader: ServerId },

    // Likely an election in progress; the client should retry shortly.
    #[error("no leader known")]
    NoLeader,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("replication did not reach a majority in time")]
    ReplicationTimeout,

    #[error("local durability failure: {0}")]
    StorageFault(String),

    #[error("server replica task has exited")]
    ActorExited,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("username taken")]
    UsernameTaken,
    #[error("no such user: {0}")]
    NoSuchUser(String),
    #[error("invalid request: {0}")]
    Invalid(&'static str),
}

// ---------------------------------------------------------------------------
// Peer envelope handlers (arrive via HandleReplication)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RequestVoteInput {
    pub candidate_term: Term,
    pub candidate_id: ServerId,
    pub candidate_last_log_term: Term,
    pub candidate_last_log_index: u64,
}

#[derive(Debug)]
pub struct RequestVoteOutput {
    pub vote_granted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestVoteError {
    #[error("requesting candidate is not in the cluster")]
    CandidateNotInCluster,
    #[error("requesting candidate's term is out of date")]
    RequestTermOutOfDate(TermOutOfDateInfo),
    #[error("local durability failure: {0}")]
    StorageFault(String),
    #[error("server replica task has exited")]
    ActorExited,
}

#[derive(Debug)]
pub struct HeartbeatInput {
    pub leader_term: Term,
    pub leader_id: ServerId,
    pub leader_commit_index: u64,
}

#[derive(Debug)]
pub struct HeartbeatOutput {
    /// Our highest locally applied message id; the leader tracks it as
    /// match_index and drives catch-up from it.
    pub highest_applied_id: u64,
}

#[derive(Debug)]
pub struct ReplicateInput {
    pub leader_term: Term,
    pub leader_id: ServerId,
    pub operation: ReplicatedOp,
}

/// A replicated operation as it travels between servers. Applied identically
/// (and idempotently, keyed by id where applicable) on every replica.
#[derive(Debug, Clone)]
pub enum ReplicatedOp {
    Message {
        message_id: u64,
        sender: String,
        recipient: String,
        content: String,
        timestamp: f64,
    },
    Account {
        username: String,
        password_verifier: Bytes,
        created_at: f64,
    },
    DeleteMessages {
        requester: String,
        message_ids: Vec<u64>,
    },
    DeleteAccount {
        username: String,
    },
    MarkRead {
        requester: String,
        message_ids: Vec<u64>,
    },
}

#[derive(Debug)]
pub struct ReplicateOutput {
    /// The applied message id, or 0 for operations that don't carry one.
    pub applied_message_id: u64,
}

/// Shared error shape for heartbeat and replicate envelopes.
#[derive(Debug, thiserror::Error)]
pub enum PeerEnvelopeError {
    #[error("sending server is not in the cluster")]
    SenderNotInCluster,
    #[error("sending server's term is out of date")]
    SenderTermOutOfDate(TermOutOfDateInfo),
    #[error("local durability failure: {0}")]
    StorageFault(String),
    #[error("server replica task has exited")]
    ActorExited,
}

#[derive(Debug)]
pub struct TermOutOfDateInfo {
    pub current_term: Term,
}

// ---------------------------------------------------------------------------
// Replies from peers (fed back into the event loop by the RPC tasks)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct VoteReplyFromPeer {
    pub peer_id: ServerId,
    /// The term we were campaigning in when the request went out.
    pub term: Term,
    pub result: RequestVoteResult,
}

#[derive(Debug)]
pub enum RequestVoteResult {
    VoteGranted,
    VoteNotGranted,
    StaleTerm { new_term: Term },
    RetryableFailure,
    MalformedReply,
}

#[derive(Debug)]
pub struct ReplicateReplyFromPeer {
    pub peer_id: ServerId,
    /// Correlates the reply with the leader's pending broadcast.
    pub broadcast_seq: u64,
    pub result: PeerAck,
}

#[derive(Debug)]
pub enum PeerAck {
    Success { applied_message_id: u64 },
    Failure,
    StaleTerm { new_term: Term },
}

#[derive(Debug)]
pub struct HeartbeatReplyFromPeer {
    pub peer_id: ServerId,
    pub term: Term,
    pub result: HeartbeatResult,
}

#[derive(Debug)]
pub enum HeartbeatResult {
    Acked { highest_applied_id: u64 },
    StaleTerm { new_term: Term },
    Unreachable,
}

/// A pending broadcast hit its majority deadline.
#[derive(Debug)]
pub struct ReplicationExpired {
    pub broadcast_seq: u64,
}

#[derive(Debug)]
pub struct CatchupFinished {
    pub peer_id: ServerId,
    pub success: bool,
}

/// One tick of the leader's heartbeat timer.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderTimerTick {
    pub term: Term,
}

// ---------------------------------------------------------------------------
// Cluster status (read by GetLeader / GetClusterNodes and role dispatch)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClusterStatus {
    pub role: RoleSnapshot,
    pub term: Term,
    /// The current leader's endpoint, if one is known (possibly me).
    pub leader: Option<ServerId>,
    pub commit_index: u64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RoleSnapshot {
    Leader,
    Candidate,
    Follower,
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterStatusError {
    #[error("server replica task has exited")]
    ActorExited,
}
