use crate::api::options::NodeOptions;
use std::path::PathBuf;

/// Static cluster membership. Endpoints are `host:port` strings; a member's
/// endpoint doubles as its identity everywhere in the protocol.
#[derive(Clone, Debug)]
pub struct ClusterInfo {
    /// This server's bind endpoint and identity.
    pub my_endpoint: String,
    /// The other members, excluding me.
    pub peer_endpoints: Vec<String>,
}

pub struct NodeConfig {
    pub cluster: ClusterInfo,
    /// Directory holding `state.db` and the durable term/vote/commit files.
    pub data_dir: PathBuf,
    pub logger: slog::Logger,
    /// Separate logger for heartbeat chatter, usually at a quieter level.
    pub heartbeat_logger: slog::Logger,
    pub options: NodeOptions,
}
