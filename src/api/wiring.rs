use crate::actor::{ActorClient, ReplicaActor};
use crate::api::configuration::NodeConfig;
use crate::api::options::NodeOptionsValidated;
use crate::broker::SubscriptionBroker;
use crate::grpc::proto_replication_message::Payload;
use crate::grpc::ProtoReplicationType;
use crate::replica::{
    envelopes, ClusterTracker, CommitWatermark, DurableLocalState, InvalidCluster,
    LocalStateError, PersistentLocalState, Replica, ReplicaConfig, ServerId,
};
use crate::server::{shutdown_signal, RpcServer, RpcServerConfig, RpcServerShutdownHandle};
use crate::store::{ChatStore, StoreError};
use std::convert::TryFrom;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Duration;

const ACTOR_QUEUE_DEPTH: usize = 64;
const SNAPSHOT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);
const STATE_DB_FILE: &str = "state.db";

#[derive(Debug, thiserror::Error)]
pub enum NodeCreationError {
    #[error("invalid cluster info: {0}")]
    InvalidClusterInfo(#[from] InvalidCluster),
    #[error("illegal options for configuring node: {0}")]
    IllegalOptions(&'static str),
    #[error("cannot create data dir: {0}")]
    DataDir(io::Error),
    #[error("cannot bind '{endpoint}': {source}")]
    Bind {
        endpoint: String,
        source: io::Error,
    },
    #[error("durable replication state unusable: {0}")]
    DurableState(#[from] LocalStateError),
    #[error("chat store unusable: {0}")]
    Store(#[from] StoreError),
}

/// A running node. Dropping the handle shuts the RPC server down.
pub struct ChatNodeHandle {
    server_id: ServerId,
    local_addr: Option<SocketAddr>,
    _server_shutdown: RpcServerShutdownHandle,
}

impl ChatNodeHandle {
    pub fn server_id(&self) -> &str {
        self.server_id.as_str()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

/// Boots one replicated chat server: durable state, store, snapshot
/// bootstrap for a fresh joiner, the replica event loop, and the gRPC
/// server carrying both the client and the peer surfaces.
pub async fn try_create_chat_node(config: NodeConfig) -> Result<ChatNodeHandle, NodeCreationError> {
    let root_logger = config.logger;

    let options = NodeOptionsValidated::try_from(config.options)
        .map_err(NodeCreationError::IllegalOptions)?;

    // Bind first: an occupied port should fail startup, not surface later
    // from inside the serve task.
    let listener = TcpListener::bind(&config.cluster.my_endpoint)
        .await
        .map_err(|source| NodeCreationError::Bind {
            endpoint: config.cluster.my_endpoint.clone(),
            source,
        })?;
    let local_addr = listener.local_addr().ok();

    std::fs::create_dir_all(&config.data_dir).map_err(NodeCreationError::DataDir)?;
    let store = Arc::new(ChatStore::open(&config.data_dir.join(STATE_DB_FILE))?);
    let mut local_state = DurableLocalState::load(&config.data_dir)?;

    let my_server_id = ServerId::new(config.cluster.my_endpoint.clone());
    let peer_ids = config
        .cluster
        .peer_endpoints
        .iter()
        .map(|endpoint| ServerId::new(endpoint.clone()))
        .collect();
    let cluster = ClusterTracker::create_valid_cluster(
        root_logger.clone(),
        my_server_id.clone(),
        peer_ids,
    )?;

    // A fresh node first catches up from any peer, then joins elections.
    try_snapshot_bootstrap(&root_logger, &cluster, &store, &mut local_state).await;
    let commit_watermark = CommitWatermark::new(local_state.commit_index());

    let broker = SubscriptionBroker::new(options.subscription_queue_capacity);

    let (actor_tx, actor_rx) = mpsc::channel(ACTOR_QUEUE_DEPTH);
    let actor_client = ActorClient::new(actor_tx);

    let cluster_members = cluster.all_member_ids();
    let replica = Replica::new(ReplicaConfig {
        logger: root_logger.clone(),
        heartbeat_logger: config.heartbeat_logger,
        cluster,
        store: Arc::clone(&store),
        broker: Arc::clone(&broker),
        local_state,
        commit_watermark: commit_watermark.clone(),
        actor_client: actor_client.clone(),
        leader_heartbeat_duration: options.leader_heartbeat_duration,
        follower_min_timeout: options.follower_min_timeout,
        follower_max_timeout: options.follower_max_timeout,
        replication_ack_timeout: options.replication_ack_timeout,
    })?;

    let replica_actor = ReplicaActor::new(root_logger.clone(), actor_rx, replica);
    tokio::spawn(replica_actor.run_event_loop());

    let (server_shutdown_handle, server_shutdown_signal) = shutdown_signal();
    let rpc_server = RpcServer::new(RpcServerConfig {
        logger: root_logger,
        local_replica: actor_client,
        store,
        broker,
        commit_watermark,
        my_server_id: my_server_id.clone(),
        cluster_members,
        client_write_deadline: options.client_write_deadline,
    });
    tokio::spawn(rpc_server.run(listener, server_shutdown_signal));

    Ok(ChatNodeHandle {
        server_id: my_server_id,
        local_addr,
        _server_shutdown: server_shutdown_handle,
    })
}

/// Best-effort snapshot pull for an empty store: ask each configured peer in
/// turn; the first committed snapshot wins. A node that finds no peer up
/// simply starts empty and converges through normal replication later.
async fn try_snapshot_bootstrap(
    logger: &slog::Logger,
    cluster: &ClusterTracker,
    store: &ChatStore,
    local_state: &mut DurableLocalState,
) {
    let fresh = matches!(
        (store.account_count(), store.highest_message_id()),
        (Ok(0), Ok(0))
    );
    if !fresh || cluster.num_voting_members() == 1 {
        return;
    }

    let request =
        envelopes::snapshot_request_envelope(local_state.current_term(), cluster.my_server_id());

    for peer in cluster.iter_peers() {
        let mut client = peer.client.clone();
        let reply = match client
            .handle_replication(request.clone(), SNAPSHOT_FETCH_TIMEOUT)
            .await
        {
            Ok(reply) => reply,
            Err(status) => {
                slog::debug!(logger, "Snapshot fetch from {} failed: {}", peer.id, status);
                continue;
            }
        };

        let (ProtoReplicationType::SnapshotResponse, Some(Payload::SnapshotResponse(response))) =
            (reply.r#type(), reply.payload)
        else {
            slog::debug!(logger, "Peer {} declined snapshot request", peer.id);
            continue;
        };

        let snapshot = envelopes::snapshot_from_response(response);
        let highest_id = snapshot.messages.iter().map(|m| m.id).max().unwrap_or(0);
        match store.apply_snapshot(&snapshot) {
            Ok(()) => {
                slog::info!(
                    logger,
                    "Bootstrapped from peer {}: {} accounts, {} messages",
                    peer.id,
                    snapshot.accounts.len(),
                    snapshot.messages.len()
                );
                if highest_id > 0 {
                    if let Err(e) = local_state.store_commit_index_if_increased(highest_id) {
                        slog::error!(logger, "Failed to persist bootstrapped commit index: {}", e);
                    }
                }
                return;
            }
            Err(e) => {
                slog::error!(logger, "Snapshot apply failed: {}", e);
            }
        }
    }

    slog::info!(logger, "No peer snapshot available; starting empty");
}
