use prost_types::value::Kind;
use prost_types::{Struct, Value};
use replichat::wire::{GrpcChatClient, ProtoChatMessage, ProtoMessageType};
use replichat::{try_create_chat_node, ChatNodeHandle, ClusterInfo, NodeConfig, NodeOptions};
use std::error::Error;
use tokio::time::{sleep, Duration, Instant};
use tonic::transport::Channel;

const PORTS: [u16; 3] = [42151, 42152, 42153];
const STARTUP_WAIT: Duration = Duration::from_secs(15);
const STREAM_WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn three_node_cluster_serves_replicated_chat() -> Result<(), Box<dyn Error>> {
    let data_root = tempfile::tempdir()?;

    let mut nodes = Vec::new();
    for port in PORTS {
        nodes.push(spawn_node(port, data_root.path().to_path_buf()).await?);
    }

    // Someone must win an election before writes go anywhere.
    let mut alice = connect(PORTS[0]).await?;
    wait_for_leader(&mut alice).await?;

    // Account creation works against any node (followers forward).
    let created = retry_write(
        &mut alice,
        WriteCall::CreateAccount,
        envelope(
            ProtoMessageType::CreateAccount,
            "alice",
            "",
            fields(&[("username", text("alice")), ("password_verifier", text("pw-a"))]),
        ),
    )
    .await?;
    assert_eq!(created.r#type(), ProtoMessageType::Success);

    let created = retry_write(
        &mut alice,
        WriteCall::CreateAccount,
        envelope(
            ProtoMessageType::CreateAccount,
            "bob",
            "",
            fields(&[("username", text("bob")), ("password_verifier", text("pw-b"))]),
        ),
    )
    .await?;
    assert_eq!(created.r#type(), ProtoMessageType::Success);

    // Duplicate usernames are refused once the first create committed.
    let duplicate = alice
        .create_account(envelope(
            ProtoMessageType::CreateAccount,
            "alice",
            "",
            fields(&[("username", text("alice")), ("password_verifier", text("other"))]),
        ))
        .await?
        .into_inner();
    assert_eq!(duplicate.r#type(), ProtoMessageType::Error);
    assert_eq!(payload_str(&duplicate, "reason"), Some("username_taken".into()));

    // Login authenticates the connection it arrives on. The login may race
    // the local apply of the account on this node, so poll.
    login_until_success(&mut alice, "alice", "pw-a").await?;

    // Writes without a session on this connection are rejected.
    let mut stranger = connect(PORTS[1]).await?;
    let denied = stranger
        .send_message(envelope(
            ProtoMessageType::SendMessage,
            "alice",
            "bob",
            fields(&[("content", text("spoofed"))]),
        ))
        .await?
        .into_inner();
    assert_eq!(payload_str(&denied, "reason"), Some("not_authenticated".into()));

    // Bob subscribes on a different replica than the one alice writes to.
    let mut bob = connect(PORTS[2]).await?;
    login_until_success(&mut bob, "bob", "pw-b").await?;

    // Wrong verifier against an account this node has applied.
    let bad_login = bob
        .login(envelope(
            ProtoMessageType::Login,
            "bob",
            "",
            fields(&[("username", text("bob")), ("password_verifier", text("wrong"))]),
        ))
        .await?
        .into_inner();
    assert_eq!(payload_str(&bad_login, "reason"), Some("bad_credentials".into()));

    // The failed attempt must not have cleared bob's session.
    login_until_success(&mut bob, "bob", "pw-b").await?;
    let mut bob_stream = bob
        .read_messages(envelope(
            ProtoMessageType::ReadMessages,
            "bob",
            "",
            fields(&[("username", text("bob"))]),
        ))
        .await?
        .into_inner();

    // Two sends; ids must come back strictly increasing.
    let mut sent_ids = Vec::new();
    for content in ["hi1", "hi2"] {
        let sent = retry_write(
            &mut alice,
            WriteCall::SendMessage,
            envelope(
                ProtoMessageType::SendMessage,
                "alice",
                "bob",
                fields(&[("content", text(content))]),
            ),
        )
        .await?;
        assert_eq!(sent.r#type(), ProtoMessageType::Success);
        sent_ids.push(payload_u64(&sent, "message_id").expect("message_id in reply"));
    }
    assert!(sent_ids[0] < sent_ids[1]);

    // The subscription on the other replica yields both, in commit order.
    for (expected_id, expected_content) in sent_ids.iter().zip(["hi1", "hi2"]) {
        let pushed = tokio::time::timeout(STREAM_WAIT, bob_stream.message())
            .await??
            .expect("stream should stay open");
        assert_eq!(payload_u64(&pushed, "message_id"), Some(*expected_id));
        assert_eq!(payload_str(&pushed, "content"), Some(expected_content.to_string()));
    }

    // Reads are served from local committed state on every node. A follower
    // outside the acknowledging majority may lag briefly, so poll.
    let deadline = Instant::now() + STARTUP_WAIT;
    loop {
        let listed = stranger
            .list_accounts(envelope(
                ProtoMessageType::ListAccounts,
                "alice",
                "",
                fields(&[("pattern", text("*"))]),
            ))
            .await?
            .into_inner();
        let accounts = payload_string_list(&listed, "accounts");
        if accounts.contains(&"alice".to_string()) && accounts.contains(&"bob".to_string()) {
            break;
        }
        if Instant::now() > deadline {
            panic!("accounts never replicated to this node: {:?}", accounts);
        }
        sleep(Duration::from_millis(200)).await;
    }

    wait_for_conversation_total(&mut stranger, "alice", "bob", 2).await?;

    drop(nodes);
    Ok(())
}

async fn spawn_node(
    port: u16,
    data_root: std::path::PathBuf,
) -> Result<ChatNodeHandle, Box<dyn Error>> {
    let peer_endpoints = PORTS
        .iter()
        .filter(|p| **p != port)
        .map(|p| format!("127.0.0.1:{}", p))
        .collect();

    let logger = slog::Logger::root(slog::Discard, slog::o!());
    let node = try_create_chat_node(NodeConfig {
        cluster: ClusterInfo {
            my_endpoint: format!("127.0.0.1:{}", port),
            peer_endpoints,
        },
        data_dir: data_root.join(format!("node-{}", port)),
        logger: logger.clone(),
        heartbeat_logger: logger,
        options: NodeOptions {
            leader_heartbeat_duration: Some(Duration::from_millis(50)),
            follower_min_timeout: Some(Duration::from_millis(300)),
            follower_max_timeout: Some(Duration::from_millis(600)),
            replication_ack_timeout: Some(Duration::from_millis(500)),
            client_write_deadline: Some(Duration::from_secs(2)),
            subscription_queue_capacity: None,
        },
    })
    .await?;
    Ok(node)
}

async fn connect(port: u16) -> Result<GrpcChatClient<Channel>, Box<dyn Error>> {
    let deadline = Instant::now() + STARTUP_WAIT;
    loop {
        match GrpcChatClient::connect(format!("http://127.0.0.1:{}", port)).await {
            Ok(client) => return Ok(client),
            Err(e) if Instant::now() > deadline => return Err(e.into()),
            Err(_) => sleep(Duration::from_millis(100)).await,
        }
    }
}

async fn wait_for_leader(client: &mut GrpcChatClient<Channel>) -> Result<(), Box<dyn Error>> {
    let deadline = Instant::now() + STARTUP_WAIT;
    loop {
        let reply = client
            .get_leader(envelope(
                ProtoMessageType::GetLeader,
                "probe",
                "",
                Struct::default(),
            ))
            .await;
        if let Ok(reply) = reply {
            let reply = reply.into_inner();
            if reply.r#type() == ProtoMessageType::Success
                && payload_str(&reply, "leader").is_some()
            {
                return Ok(());
            }
        }
        if Instant::now() > deadline {
            return Err("no leader elected within the startup window".into());
        }
        sleep(Duration::from_millis(100)).await;
    }
}

#[derive(Clone, Copy)]
enum WriteCall {
    CreateAccount,
    SendMessage,
}

/// Writes can transiently fail around elections; retry until the cluster
/// settles or the window closes.
async fn retry_write(
    client: &mut GrpcChatClient<Channel>,
    call: WriteCall,
    request: ProtoChatMessage,
) -> Result<ProtoChatMessage, Box<dyn Error>> {
    let deadline = Instant::now() + STARTUP_WAIT;
    loop {
        let result = match call {
            WriteCall::CreateAccount => client.create_account(request.clone()).await,
            WriteCall::SendMessage => client.send_message(request.clone()).await,
        };
        match result {
            Ok(reply) => {
                let reply = reply.into_inner();
                let transient = reply.r#type() == ProtoMessageType::Error
                    && matches!(
                        payload_str(&reply, "reason").as_deref(),
                        Some("no_leader")
                            | Some("replication_timeout")
                            | Some("deadline_exceeded")
                    );
                if !transient {
                    return Ok(reply);
                }
            }
            Err(e) if Instant::now() > deadline => return Err(e.into()),
            Err(_) => {}
        }
        if Instant::now() > deadline {
            return Err("write did not settle within the startup window".into());
        }
        sleep(Duration::from_millis(200)).await;
    }
}

async fn login_until_success(
    client: &mut GrpcChatClient<Channel>,
    username: &str,
    verifier: &str,
) -> Result<(), Box<dyn Error>> {
    let deadline = Instant::now() + STARTUP_WAIT;
    loop {
        let reply = client
            .login(envelope(
                ProtoMessageType::Login,
                username,
                "",
                fields(&[
                    ("username", text(username)),
                    ("password_verifier", text(verifier)),
                ]),
            ))
            .await?
            .into_inner();
        if reply.r#type() == ProtoMessageType::Success {
            return Ok(());
        }
        if Instant::now() > deadline {
            return Err(format!("login for '{}' never succeeded", username).into());
        }
        sleep(Duration::from_millis(200)).await;
    }
}

async fn wait_for_conversation_total(
    client: &mut GrpcChatClient<Channel>,
    user: &str,
    partner: &str,
    expected_total: u64,
) -> Result<(), Box<dyn Error>> {
    let deadline = Instant::now() + STARTUP_WAIT;
    loop {
        let reply = client
            .read_conversation(envelope(
                ProtoMessageType::ReadMessages,
                user,
                "",
                fields(&[("partner", text(partner))]),
            ))
            .await?
            .into_inner();
        if payload_u64(&reply, "total") == Some(expected_total) {
            return Ok(());
        }
        if Instant::now() > deadline {
            return Err(format!(
                "conversation never reached {} committed messages",
                expected_total
            )
            .into());
        }
        sleep(Duration::from_millis(200)).await;
    }
}

// ---- envelope/payload helpers ----

fn envelope(
    message_type: ProtoMessageType,
    sender: &str,
    recipient: &str,
    payload: Struct,
) -> ProtoChatMessage {
    ProtoChatMessage {
        r#type: message_type as i32,
        payload: Some(payload),
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        timestamp: 0.0,
    }
}

fn fields(entries: &[(&str, Value)]) -> Struct {
    Struct {
        fields: entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
    }
}

fn text(value: &str) -> Value {
    Value {
        kind: Some(Kind::StringValue(value.to_string())),
    }
}

fn payload_str(message: &ProtoChatMessage, key: &str) -> Option<String> {
    match message.payload.as_ref()?.fields.get(key)?.kind.as_ref()? {
        Kind::StringValue(value) => Some(value.clone()),
        _ => None,
    }
}

fn payload_u64(message: &ProtoChatMessage, key: &str) -> Option<u64> {
    match message.payload.as_ref()?.fields.get(key)?.kind.as_ref()? {
        Kind::NumberValue(value) => Some(*value as u64),
        _ => None,
    }
}

fn payload_string_list(message: &ProtoChatMessage, key: &str) -> Vec<String> {
    let Some(payload) = message.payload.as_ref() else {
        return Vec::new();
    };
    let Some(Kind::ListValue(list)) = payload.fields.get(key).and_then(|v| v.kind.as_ref()) else {
        return Vec::new();
    };
    list.values
        .iter()
        .filter_map(|value| match value.kind.as_ref() {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
        .collect()
}
