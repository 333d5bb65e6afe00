mod commit_watermark;
mod election;
pub(crate) mod envelopes;
mod local_state;
mod peer_client;
mod peers;
mod replica;
mod replica_api;
mod timers;

pub use commit_watermark::CommitWatermark;
pub use local_state::DurableLocalState;
pub use local_state::LocalStateError;
pub use local_state::PersistentLocalState;
pub use local_state::Term;
pub use local_state::VolatileLocalState;
pub use peers::ClusterTracker;
pub use peers::InvalidCluster;
pub use peers::ServerId;
pub use replica::Replica;
pub use replica::ReplicaConfig;
pub use replica_api::CatchupFinished;
pub use replica_api::ClientWriteError;
pub use replica_api::ClientWriteInput;
pub use replica_api::ClusterStatus;
pub use replica_api::ClusterStatusError;
pub use replica_api::HeartbeatInput;
pub use replica_api::HeartbeatOutput;
pub use replica_api::HeartbeatReplyFromPeer;
pub use replica_api::HeartbeatResult;
pub use replica_api::LeaderTimerTick;
pub use replica_api::PeerAck;
pub use replica_api::PeerEnvelopeError;
pub use replica_api::ReplicateInput;
pub use replica_api::ReplicateOutput;
pub use replica_api::ReplicateReplyFromPeer;
pub use replica_api::ReplicatedOp;
pub use replica_api::ReplicationExpired;
pub use replica_api::RequestVoteError;
pub use replica_api::RequestVoteInput;
pub use replica_api::RequestVoteOutput;
pub use replica_api::RequestVoteResult;
pub use replica_api::RoleSnapshot;
pub use replica_api::TermOutOfDateInfo;
pub use replica_api::ValidationError;
pub use replica_api::VoteReplyFromPeer;
pub use replica_api::WriteOperation;
pub use replica_api::WriteOutcome;
