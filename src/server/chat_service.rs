use crate::broker::PushedMessage;
use crate::grpc::grpc_chat_client::GrpcChatClient;
use crate::grpc::{ProtoChatMessage, ProtoMessageType};
use crate::replica::envelopes::now_unix_seconds;
use crate::replica::{
    ClientWriteError, ClientWriteInput, ServerId, ValidationError, WriteOperation, WriteOutcome,
};
use crate::server::payload;
use crate::server::server::{RequestContext, RpcServer};
use crate::store::StoredMessage;
use bytes::Bytes;
use prost_types::Struct;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataValue;
use tonic::transport::Endpoint;
use tonic::Status;

pub(super) const FORWARDED_FROM_METADATA_KEY: &str = "x-replichat-forwarded-from";

const SERVER_SENDER: &str = "SERVER";
const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CONVERSATION_LIMIT: u64 = 50;
const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 16;

const REASON_USERNAME_TAKEN: &str = "username_taken";
const REASON_INVALID: &str = "invalid";
const REASON_NO_SUCH_USER: &str = "no_such_user";
const REASON_BAD_CREDENTIALS: &str = "bad_credentials";
const REASON_NOT_AUTHENTICATED: &str = "not_authenticated";
const REASON_NO_LEADER: &str = "no_leader";
const REASON_REPLICATION_TIMEOUT: &str = "replication_timeout";
const REASON_DEADLINE: &str = "deadline_exceeded";
const REASON_INTERNAL: &str = "internal";

/// Which write RPC to re-issue against the leader when this server is a
/// follower and must relay on the client's behalf.
#[derive(Clone, Copy, Debug)]
enum WriteRpc {
    CreateAccount,
    SendMessage,
    DeleteMessages,
    DeleteAccount,
    MarkRead,
}

impl RpcServer {
    // -------------------------------------------------------------------
    // Account operations
    // -------------------------------------------------------------------

    pub(super) async fn handle_create_account(
        &self,
        ctx: RequestContext,
        envelope: ProtoChatMessage,
    ) -> ProtoChatMessage {
        let fields = envelope.payload.clone().unwrap_or_default();
        let username = named_user(&fields, "username", &envelope.sender);
        let Some(username) = username else {
            return error_envelope("", REASON_INVALID, Some("username required"));
        };
        let verifier = payload::get_str(&fields, "password_verifier").unwrap_or_default();

        let operation = WriteOperation::CreateAccount {
            username: username.clone(),
            password_verifier: Bytes::copy_from_slice(verifier.as_bytes()),
        };
        self.submit_or_forward(WriteRpc::CreateAccount, operation, &envelope, ctx, &username)
            .await
    }

    pub(super) async fn handle_login(
        &self,
        ctx: RequestContext,
        envelope: ProtoChatMessage,
    ) -> ProtoChatMessage {
        let fields = envelope.payload.clone().unwrap_or_default();
        let Some(username) = named_user(&fields, "username", &envelope.sender) else {
            return error_envelope("", REASON_INVALID, Some("username required"));
        };
        let verifier = payload::get_str(&fields, "password_verifier").unwrap_or_default();

        match self.store.verify_login(&username, verifier.as_bytes()) {
            Ok(crate::store::LoginCheck::Ok) => {
                if let Some(addr) = ctx.remote_addr {
                    self.sessions.authenticate(addr, &username);
                }
                slog::debug!(self.logger, "Login successful for '{}'", username);
                success_envelope(&username, payload::empty())
            }
            Ok(crate::store::LoginCheck::NoSuchUser) => {
                error_envelope(&username, REASON_NO_SUCH_USER, None)
            }
            Ok(crate::store::LoginCheck::BadCredentials) => {
                error_envelope(&username, REASON_BAD_CREDENTIALS, None)
            }
            Err(e) => {
                slog::error!(self.logger, "Login check failed: {}", e);
                error_envelope(&username, REASON_INTERNAL, None)
            }
        }
    }

    pub(super) async fn handle_delete_account(
        &self,
        ctx: RequestContext,
        envelope: ProtoChatMessage,
    ) -> ProtoChatMessage {
        let fields = envelope.payload.clone().unwrap_or_default();
        let Some(username) = named_user(&fields, "username", &envelope.sender) else {
            return error_envelope("", REASON_INVALID, Some("username required"));
        };
        if let Err(denied) = self.ensure_authenticated(ctx, &username) {
            return denied;
        }

        let operation = WriteOperation::DeleteAccount {
            username: username.clone(),
        };
        let reply = self
            .submit_or_forward(WriteRpc::DeleteAccount, operation, &envelope, ctx, &username)
            .await;
        if reply.r#type() == ProtoMessageType::Success {
            self.sessions.drop_user(&username);
        }
        reply
    }

    pub(super) async fn handle_list_accounts(&self, envelope: ProtoChatMessage) -> ProtoChatMessage {
        let fields = envelope.payload.clone().unwrap_or_default();
        let pattern = payload::get_str(&fields, "pattern").unwrap_or_default();

        match self.store.list_accounts(pattern) {
            Ok(accounts) => success_envelope(
                &envelope.sender,
                payload::object([("accounts", payload::string_list(accounts))]),
            ),
            Err(e) => {
                slog::error!(self.logger, "ListAccounts failed: {}", e);
                error_envelope(&envelope.sender, REASON_INTERNAL, None)
            }
        }
    }

    // -------------------------------------------------------------------
    // Message operations
    // -------------------------------------------------------------------

    pub(super) async fn handle_send_message(
        &self,
        ctx: RequestContext,
        envelope: ProtoChatMessage,
    ) -> ProtoChatMessage {
        let sender = envelope.sender.clone();
        let recipient = envelope.recipient.clone();
        let fields = envelope.payload.clone().unwrap_or_default();
        let content = payload::get_str(&fields, "content")
            .or_else(|| payload::get_str(&fields, "text"))
            .unwrap_or_default()
            .to_string();

        if let Err(denied) = self.ensure_authenticated(ctx, &sender) {
            return denied;
        }

        let operation = WriteOperation::SendMessage {
            sender: sender.clone(),
            recipient,
            content,
        };
        self.submit_or_forward(WriteRpc::SendMessage, operation, &envelope, ctx, &sender)
            .await
    }

    pub(super) async fn handle_delete_messages(
        &self,
        ctx: RequestContext,
        envelope: ProtoChatMessage,
    ) -> ProtoChatMessage {
        let requester = envelope.sender.clone();
        if let Err(denied) = self.ensure_authenticated(ctx, &requester) {
            return denied;
        }
        let fields = envelope.payload.clone().unwrap_or_default();
        let Some(message_ids) = message_id_list(&fields) else {
            return error_envelope(&requester, REASON_INVALID, Some("'ids' must be a list"));
        };

        let operation = WriteOperation::DeleteMessages {
            requester: requester.clone(),
            message_ids,
        };
        self.submit_or_forward(WriteRpc::DeleteMessages, operation, &envelope, ctx, &requester)
            .await
    }

    pub(super) async fn handle_mark_read(
        &self,
        ctx: RequestContext,
        envelope: ProtoChatMessage,
    ) -> ProtoChatMessage {
        let fields = envelope.payload.clone().unwrap_or_default();
        let Some(username) = named_user(&fields, "username", &envelope.sender) else {
            return error_envelope("", REASON_INVALID, Some("username required"));
        };
        if let Err(denied) = self.ensure_authenticated(ctx, &username) {
            return denied;
        }
        let Some(message_ids) = message_id_list(&fields) else {
            return error_envelope(&username, REASON_INVALID, Some("'ids' must be a list"));
        };

        let operation = WriteOperation::MarkRead {
            requester: username.clone(),
            message_ids,
        };
        self.submit_or_forward(WriteRpc::MarkRead, operation, &envelope, ctx, &username)
            .await
    }

    pub(super) async fn handle_read_conversation(
        &self,
        envelope: ProtoChatMessage,
    ) -> ProtoChatMessage {
        let username = envelope.sender.clone();
        let fields = envelope.payload.clone().unwrap_or_default();
        let Some(partner) = payload::get_str(&fields, "partner") else {
            return error_envelope(&username, REASON_INVALID, Some("partner required"));
        };
        let limit = payload::get_u64(&fields, "limit").unwrap_or(DEFAULT_CONVERSATION_LIMIT);
        let before_id = payload::get_u64(&fields, "before_id");

        let conversation = self.store.fetch_conversation(
            &username,
            partner,
            limit,
            before_id,
            self.commit_watermark.get(),
        );
        match conversation {
            Ok(conversation) => {
                let entries = conversation
                    .messages
                    .iter()
                    .map(|message| payload::nested(message_fields(message)));
                success_envelope(
                    &username,
                    payload::object([
                        ("messages", payload::value_list(entries)),
                        ("total", payload::number(conversation.total as f64)),
                    ]),
                )
            }
            Err(e) => {
                slog::error!(self.logger, "ReadConversation failed: {}", e);
                error_envelope(&username, REASON_INTERNAL, None)
            }
        }
    }

    pub(super) async fn handle_list_chat_partners(
        &self,
        envelope: ProtoChatMessage,
    ) -> ProtoChatMessage {
        let fields = envelope.payload.clone().unwrap_or_default();
        let Some(username) = named_user(&fields, "username", &envelope.sender) else {
            return error_envelope("", REASON_INVALID, Some("username required"));
        };
        let visible_up_to = self.commit_watermark.get();

        let partners = match self.store.list_chat_partners(&username, visible_up_to) {
            Ok(partners) => partners,
            Err(e) => {
                slog::error!(self.logger, "ListChatPartners failed: {}", e);
                return error_envelope(&username, REASON_INTERNAL, None);
            }
        };

        let mut unread_fields = Struct::default();
        for partner in &partners {
            match self
                .store
                .unread_count_from(&username, partner, visible_up_to)
            {
                Ok(count) => {
                    unread_fields
                        .fields
                        .insert(partner.clone(), payload::number(count as f64));
                }
                Err(e) => {
                    slog::error!(self.logger, "Unread count failed: {}", e);
                }
            }
        }

        success_envelope(
            &username,
            payload::object([
                ("partners", payload::string_list(partners)),
                ("unread_map", payload::nested(unread_fields)),
            ]),
        )
    }

    // -------------------------------------------------------------------
    // Cluster introspection
    // -------------------------------------------------------------------

    pub(super) async fn handle_get_leader(&self, envelope: ProtoChatMessage) -> ProtoChatMessage {
        match self.local_replica.cluster_status().await {
            Ok(status) => {
                let leader_value = match status.leader {
                    Some(leader) => payload::text(leader.into_inner()),
                    None => payload::null(),
                };
                success_envelope(&envelope.sender, payload::object([("leader", leader_value)]))
            }
            Err(e) => {
                slog::error!(self.logger, "GetLeader failed: {}", e);
                error_envelope(&envelope.sender, REASON_INTERNAL, None)
            }
        }
    }

    pub(super) async fn handle_get_cluster_nodes(
        &self,
        envelope: ProtoChatMessage,
    ) -> ProtoChatMessage {
        let nodes: Vec<String> = self
            .cluster_members
            .iter()
            .map(|member| member.as_str().to_string())
            .collect();
        success_envelope(
            &envelope.sender,
            payload::object([("nodes", payload::string_list(nodes))]),
        )
    }

    // -------------------------------------------------------------------
    // Live subscription
    // -------------------------------------------------------------------

    /// Server-streaming READ_MESSAGES: first the committed-but-undelivered
    /// backlog in id order, then live pushes as commits land, deduplicated by
    /// id. The broker entry is released when the client goes away or the
    /// subscription is dropped for falling behind.
    pub(super) async fn handle_read_messages(
        &self,
        ctx: RequestContext,
        envelope: ProtoChatMessage,
    ) -> ReceiverStream<Result<ProtoChatMessage, Status>> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CHANNEL_CAPACITY);

        let fields = envelope.payload.clone().unwrap_or_default();
        let Some(username) = named_user(&fields, "username", &envelope.sender) else {
            let _ = tx
                .try_send(Ok(error_envelope("", REASON_INVALID, Some("username required"))));
            return ReceiverStream::new(rx);
        };
        if let Err(denied) = self.ensure_authenticated(ctx, &username) {
            let _ = tx.try_send(Ok(denied));
            return ReceiverStream::new(rx);
        }
        match self.store.user_exists(&username) {
            Ok(true) => {}
            Ok(false) => {
                let _ = tx.try_send(Ok(error_envelope(&username, REASON_NO_SUCH_USER, None)));
                return ReceiverStream::new(rx);
            }
            Err(e) => {
                slog::error!(self.logger, "Subscription user check failed: {}", e);
                let _ = tx.try_send(Ok(error_envelope(&username, REASON_INTERNAL, None)));
                return ReceiverStream::new(rx);
            }
        }
        let backlog_limit = payload::get_u64(&fields, "limit");

        let logger = self.logger.clone();
        let store = Arc::clone(&self.store);
        let broker = Arc::clone(&self.broker);
        let commit_watermark = self.commit_watermark.clone();

        tokio::task::spawn(async move {
            // Subscribe before reading the backlog so a commit racing this
            // setup lands in the queue rather than in a gap.
            let (guard, mut updates) = broker.subscribe(&username);

            let backlog =
                match store.undelivered_messages(&username, commit_watermark.get(), backlog_limit) {
                    Ok(backlog) => backlog,
                    Err(e) => {
                        slog::error!(logger, "Subscription backlog read failed: {}", e);
                        let _ = tx
                            .send(Ok(error_envelope(&username, REASON_INTERNAL, None)))
                            .await;
                        return;
                    }
                };

            let mut last_streamed_id = 0;
            for message in backlog {
                if tx.send(Ok(stored_message_envelope(&message))).await.is_err() {
                    return;
                }
                mark_delivered_logged(&logger, &store, message.id);
                last_streamed_id = message.id;
            }

            loop {
                match updates.recv().await {
                    Some(push) if push.id > last_streamed_id => {
                        if tx.send(Ok(pushed_message_envelope(&push))).await.is_err() {
                            break;
                        }
                        mark_delivered_logged(&logger, &store, push.id);
                        last_streamed_id = push.id;
                    }
                    // Already streamed as part of the backlog.
                    Some(_) => continue,
                    // Broker dropped us (overflow or account deletion).
                    None => break,
                }
            }

            drop(guard);
        });

        ReceiverStream::new(rx)
    }

    // -------------------------------------------------------------------
    // Write submission and leader forwarding
    // -------------------------------------------------------------------

    fn ensure_authenticated(
        &self,
        ctx: RequestContext,
        username: &str,
    ) -> Result<(), ProtoChatMessage> {
        if ctx.forwarded {
            // The origin server authenticated the client's connection.
            return Ok(());
        }
        let authenticated = ctx
            .remote_addr
            .map(|addr| self.sessions.is_authenticated_as(addr, username))
            .unwrap_or(false);
        if authenticated {
            Ok(())
        } else {
            Err(error_envelope(
                username,
                REASON_NOT_AUTHENTICATED,
                Some("log in first"),
            ))
        }
    }

    /// Runs a client write through the replica; if this server turns out to
    /// be a follower, relays the original envelope to the leader and returns
    /// the leader's reply verbatim.
    async fn submit_or_forward(
        &self,
        rpc: WriteRpc,
        operation: WriteOperation,
        original: &ProtoChatMessage,
        ctx: RequestContext,
        reply_to: &str,
    ) -> ProtoChatMessage {
        let write = self
            .local_replica
            .client_write(ClientWriteInput { operation });
        let result = match tokio::time::timeout(self.client_write_deadline, write).await {
            Ok(result) => result,
            Err(_elapsed) => {
                return error_envelope(
                    reply_to,
                    REASON_DEADLINE,
                    Some("write did not complete in time; it may still commit"),
                );
            }
        };

        match result {
            Ok(outcome) => outcome_envelope(reply_to, outcome),
            Err(ClientWriteError::LeaderRedirect { leader }) => {
                if ctx.forwarded {
                    // Never chain forwards; the origin server will rediscover
                    // the leader and retry.
                    return error_envelope(
                        reply_to,
                        REASON_NO_LEADER,
                        Some("leadership moved while forwarding"),
                    );
                }
                slog::debug!(
                    self.logger,
                    "Forwarding {:?} to leader {} for '{}'",
                    rpc,
                    leader,
                    reply_to
                );
                match self.forward_to_leader(rpc, &leader, original).await {
                    Ok(reply) => reply,
                    Err(status) => {
                        slog::warn!(
                            self.logger,
                            "Failed to forward {:?} to leader {}: {}",
                            rpc,
                            leader,
                            status
                        );
                        error_envelope(
                            reply_to,
                            REASON_NO_LEADER,
                            Some("leader unreachable; retry shortly"),
                        )
                    }
                }
            }
            Err(ClientWriteError::NoLeader) => error_envelope(
                reply_to,
                REASON_NO_LEADER,
                Some("no leader elected yet; retry shortly"),
            ),
            Err(ClientWriteError::Validation(validation)) => {
                validation_envelope(reply_to, validation)
            }
            Err(ClientWriteError::ReplicationTimeout) => error_envelope(
                reply_to,
                REASON_REPLICATION_TIMEOUT,
                Some("majority unreachable; retry shortly"),
            ),
            Err(ClientWriteError::StorageFault(detail)) => {
                error_envelope(reply_to, REASON_INTERNAL, Some(&detail))
            }
            Err(ClientWriteError::ActorExited) => {
                error_envelope(reply_to, REASON_INTERNAL, Some("replica unavailable"))
            }
        }
    }

    async fn forward_to_leader(
        &self,
        rpc: WriteRpc,
        leader: &ServerId,
        original: &ProtoChatMessage,
    ) -> Result<ProtoChatMessage, Status> {
        let endpoint = Endpoint::from_shared(format!("http://{}", leader))
            .map_err(|e| Status::internal(e.to_string()))?;
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Status::unavailable(e.to_string()))?;
        let mut client = GrpcChatClient::new(channel);

        let mut request = tonic::Request::new(original.clone());
        request.set_timeout(FORWARD_TIMEOUT);
        let forwarded_from = MetadataValue::try_from(self.my_server_id.as_str())
            .map_err(|e| Status::internal(e.to_string()))?;
        request
            .metadata_mut()
            .insert(FORWARDED_FROM_METADATA_KEY, forwarded_from);

        let response = match rpc {
            WriteRpc::CreateAccount => client.create_account(request).await?,
            WriteRpc::SendMessage => client.send_message(request).await?,
            WriteRpc::DeleteMessages => client.delete_messages(request).await?,
            WriteRpc::DeleteAccount => client.delete_account(request).await?,
            WriteRpc::MarkRead => client.mark_read(request).await?,
        };
        Ok(response.into_inner())
    }
}

// -----------------------------------------------------------------------
// Envelope construction
// -----------------------------------------------------------------------

fn success_envelope(recipient: &str, fields: Struct) -> ProtoChatMessage {
    ProtoChatMessage {
        r#type: ProtoMessageType::Success as i32,
        payload: Some(fields),
        sender: SERVER_SENDER.to_string(),
        recipient: recipient.to_string(),
        timestamp: now_unix_seconds(),
    }
}

fn error_envelope(recipient: &str, reason: &str, detail: Option<&str>) -> ProtoChatMessage {
    let mut fields = payload::object([("reason", payload::text(reason))]);
    if let Some(detail) = detail {
        fields
            .fields
            .insert("detail".to_string(), payload::text(detail));
    }
    ProtoChatMessage {
        r#type: ProtoMessageType::Error as i32,
        payload: Some(fields),
        sender: SERVER_SENDER.to_string(),
        recipient: recipient.to_string(),
        timestamp: now_unix_seconds(),
    }
}

fn validation_envelope(reply_to: &str, validation: ValidationError) -> ProtoChatMessage {
    match validation {
        ValidationError::UsernameTaken => error_envelope(reply_to, REASON_USERNAME_TAKEN, None),
        ValidationError::NoSuchUser(name) => {
            error_envelope(reply_to, REASON_NO_SUCH_USER, Some(&name))
        }
        ValidationError::Invalid(detail) => error_envelope(reply_to, REASON_INVALID, Some(detail)),
    }
}

fn outcome_envelope(reply_to: &str, outcome: WriteOutcome) -> ProtoChatMessage {
    match outcome {
        WriteOutcome::AccountCreated | WriteOutcome::AccountDeleted | WriteOutcome::MarkedRead => {
            success_envelope(reply_to, payload::empty())
        }
        WriteOutcome::MessageSent {
            message_id,
            timestamp,
        } => success_envelope(
            reply_to,
            payload::object([
                ("message_id", payload::number(message_id as f64)),
                ("timestamp", payload::number(timestamp)),
            ]),
        ),
        WriteOutcome::MessagesDeleted { deleted } => success_envelope(
            reply_to,
            payload::object([("deleted", payload::id_list(&deleted))]),
        ),
    }
}

fn message_fields(message: &StoredMessage) -> Struct {
    payload::object([
        ("id", payload::number(message.id as f64)),
        ("from", payload::text(message.sender.clone())),
        ("to", payload::text(message.recipient.clone())),
        ("content", payload::text(message.content.clone())),
        ("timestamp", payload::number(message.timestamp)),
        ("read", payload::number(message.read as u8 as f64)),
        ("delivered", payload::number(message.delivered as u8 as f64)),
    ])
}

/// One streamed message, in the shape the READ_MESSAGES contract promises.
fn stored_message_envelope(message: &StoredMessage) -> ProtoChatMessage {
    streamed_envelope(
        message.id,
        &message.sender,
        &message.recipient,
        &message.content,
        message.timestamp,
    )
}

fn pushed_message_envelope(push: &PushedMessage) -> ProtoChatMessage {
    streamed_envelope(push.id, &push.sender, &push.recipient, &push.content, push.timestamp)
}

fn streamed_envelope(
    id: u64,
    sender: &str,
    recipient: &str,
    content: &str,
    timestamp: f64,
) -> ProtoChatMessage {
    ProtoChatMessage {
        r#type: ProtoMessageType::Success as i32,
        payload: Some(payload::object([
            ("message_id", payload::number(id as f64)),
            ("sender", payload::text(sender)),
            ("recipient", payload::text(recipient)),
            ("content", payload::text(content)),
            ("timestamp", payload::number(timestamp)),
        ])),
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        timestamp,
    }
}

fn mark_delivered_logged(logger: &slog::Logger, store: &crate::store::ChatStore, id: u64) {
    if let Err(e) = store.mark_delivered(id) {
        slog::error!(logger, "Failed to flag message {} delivered: {}", id, e);
    }
}

/// The acting username: explicit payload key first, envelope sender second.
fn named_user(fields: &Struct, key: &str, envelope_sender: &str) -> Option<String> {
    let name = payload::get_str(fields, key).unwrap_or(envelope_sender);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Message id lists arrive under "ids" per the payload contract; the older
/// "message_ids" spelling is accepted for compatibility.
fn message_id_list(fields: &Struct) -> Option<Vec<u64>> {
    if fields.fields.contains_key("ids") {
        return payload::get_id_list(fields, "ids");
    }
    if fields.fields.contains_key("message_ids") {
        return payload::get_id_list(fields, "message_ids");
    }
    // No list at all: treat as empty (a no-op write).
    Some(Vec::new())
}
