use crate::actor::ActorClient;
use crate::broker::SubscriptionBroker;
use crate::grpc::grpc_chat_server::{GrpcChat, GrpcChatServer};
use crate::grpc::{ProtoChatMessage, ProtoReplicationMessage, ProtoReplicationType};
use crate::replica::{CommitWatermark, ServerId};
use crate::server::chat_service::FORWARDED_FROM_METADATA_KEY;
use crate::server::session::SessionRegistry;
use crate::store::ChatStore;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Duration;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// RpcServer implements the single gRPC service carrying both surfaces: the
/// client envelope RPCs and the peer HandleReplication RPC. The trait methods
/// stay thin; the per-operation handlers live in `chat_service` and
/// `replication_service`.
pub struct RpcServer {
    pub(super) logger: slog::Logger,
    pub(super) local_replica: ActorClient,
    pub(super) store: Arc<ChatStore>,
    pub(super) broker: Arc<SubscriptionBroker>,
    pub(super) commit_watermark: CommitWatermark,
    pub(super) sessions: SessionRegistry,
    pub(super) my_server_id: ServerId,
    pub(super) cluster_members: Vec<ServerId>,
    pub(super) client_write_deadline: Duration,
}

pub struct RpcServerConfig {
    pub logger: slog::Logger,
    pub local_replica: ActorClient,
    pub store: Arc<ChatStore>,
    pub broker: Arc<SubscriptionBroker>,
    pub commit_watermark: CommitWatermark,
    pub my_server_id: ServerId,
    pub cluster_members: Vec<ServerId>,
    pub client_write_deadline: Duration,
}

/// Per-request facts pulled off the transport before the envelope is handed
/// to a handler.
#[derive(Clone, Copy)]
pub(super) struct RequestContext {
    pub remote_addr: Option<SocketAddr>,
    /// Set when a peer server relayed this request on a client's behalf; the
    /// origin server already ran the session check.
    pub forwarded: bool,
}

impl RequestContext {
    fn of<T>(request: &Request<T>) -> Self {
        RequestContext {
            remote_addr: request.remote_addr(),
            forwarded: request.metadata().contains_key(FORWARDED_FROM_METADATA_KEY),
        }
    }
}

impl RpcServer {
    pub fn new(config: RpcServerConfig) -> Self {
        RpcServer {
            logger: config.logger,
            local_replica: config.local_replica,
            store: config.store,
            broker: config.broker,
            commit_watermark: config.commit_watermark,
            sessions: SessionRegistry::new(),
            my_server_id: config.my_server_id,
            cluster_members: config.cluster_members,
            client_write_deadline: config.client_write_deadline,
        }
    }

    /// Serves until the shutdown signal fires. The listener is bound by the
    /// caller so that an unavailable port is a startup error, not a log line.
    pub async fn run(self, listener: TcpListener, shutdown_signal: impl Future<Output = ()>) {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on {:?}", listener.local_addr());

        let result = Server::builder()
            .add_service(GrpcChatServer::new(self))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal)
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
    }
}

#[async_trait::async_trait]
impl GrpcChat for RpcServer {
    async fn create_account(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let ctx = RequestContext::of(&request);
        let reply = self.handle_create_account(ctx, request.into_inner()).await;
        Ok(Response::new(reply))
    }

    async fn login(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let ctx = RequestContext::of(&request);
        let reply = self.handle_login(ctx, request.into_inner()).await;
        Ok(Response::new(reply))
    }

    async fn list_accounts(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let reply = self.handle_list_accounts(request.into_inner()).await;
        Ok(Response::new(reply))
    }

    async fn send_message(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let ctx = RequestContext::of(&request);
        let reply = self.handle_send_message(ctx, request.into_inner()).await;
        Ok(Response::new(reply))
    }

    type ReadMessagesStream = ReceiverStream<Result<ProtoChatMessage, Status>>;

    async fn read_messages(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<Self::ReadMessagesStream>, Status> {
        let ctx = RequestContext::of(&request);
        let stream = self.handle_read_messages(ctx, request.into_inner()).await;
        Ok(Response::new(stream))
    }

    async fn read_conversation(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let reply = self.handle_read_conversation(request.into_inner()).await;
        Ok(Response::new(reply))
    }

    async fn list_chat_partners(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let reply = self.handle_list_chat_partners(request.into_inner()).await;
        Ok(Response::new(reply))
    }

    async fn delete_messages(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let ctx = RequestContext::of(&request);
        let reply = self.handle_delete_messages(ctx, request.into_inner()).await;
        Ok(Response::new(reply))
    }

    async fn delete_account(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let ctx = RequestContext::of(&request);
        let reply = self.handle_delete_account(ctx, request.into_inner()).await;
        Ok(Response::new(reply))
    }

    async fn mark_read(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let ctx = RequestContext::of(&request);
        let reply = self.handle_mark_read(ctx, request.into_inner()).await;
        Ok(Response::new(reply))
    }

    async fn get_leader(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let reply = self.handle_get_leader(request.into_inner()).await;
        Ok(Response::new(reply))
    }

    async fn get_cluster_nodes(
        &self,
        request: Request<ProtoChatMessage>,
    ) -> Result<Response<ProtoChatMessage>, Status> {
        let reply = self.handle_get_cluster_nodes(request.into_inner()).await;
        Ok(Response::new(reply))
    }

    async fn handle_replication(
        &self,
        request: Request<ProtoReplicationMessage>,
    ) -> Result<Response<ProtoReplicationMessage>, Status> {
        let envelope = request.into_inner();
        // Heartbeats are too chatty for the wire log; the replica logs them
        // through the dedicated heartbeat logger instead.
        if envelope.r#type() != ProtoReplicationType::Heartbeat {
            slog::debug!(self.logger, "ServerWire - {:?}", envelope);
        }
        let reply = self.handle_replication_envelope(envelope).await;
        Ok(Response::new(reply))
    }
}
