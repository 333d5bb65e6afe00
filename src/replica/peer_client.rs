use crate::grpc::grpc_chat_client::GrpcChatClient;
use crate::grpc::ProtoReplicationMessage;
use tokio::time::Duration;
use tonic::transport::{Channel, Endpoint, Uri};

/// PeerClient carries all server-to-server traffic to one peer, through the
/// single HandleReplication RPC.
///
/// The underlying channel connects lazily: we come up even when the peer is
/// down, calls fail fast with Unavailable until it is reachable, and the
/// channel redials on later calls after a failure. Clones share the channel.
#[derive(Clone)]
pub struct PeerClient {
    logger: slog::Logger,
    client: GrpcChatClient<Channel>,
}

impl PeerClient {
    pub fn new(logger: slog::Logger, uri: Uri) -> Self {
        let channel = Endpoint::from(uri).connect_lazy();
        PeerClient {
            logger,
            client: GrpcChatClient::new(channel),
        }
    }

    pub async fn handle_replication(
        &mut self,
        request: ProtoReplicationMessage,
        timeout: Duration,
    ) -> Result<ProtoReplicationMessage, tonic::Status> {
        let mut rpc_request = tonic::Request::new(request);
        rpc_request.set_timeout(timeout);

        match self.client.handle_replication(rpc_request).await {
            Ok(reply) => Ok(reply.into_inner()),
            Err(status) => {
                slog::debug!(self.logger, "Peer RPC failed: {}", status);
                Err(status)
            }
        }
    }
}
