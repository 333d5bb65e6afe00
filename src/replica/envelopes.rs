//! Builders and parsers for the peer envelope. Outbound envelopes are built
//! by the replica's fan-out tasks; inbound ones are decoded by the RPC
//! surface. Both directions share the op <-> payload mapping here so the two
//! can't drift.

use crate::grpc::proto_replication_message::Payload;
use crate::grpc::{
    ProtoAccountRecord, ProtoAccountReplication, ProtoDeletionPayload, ProtoHeartbeat,
    ProtoMessageRecord, ProtoMessageReplication, ProtoReplicationMessage, ProtoReplicationResponse,
    ProtoReplicationType, ProtoSnapshotRequest, ProtoSnapshotResponse, ProtoVoteRequest,
    ProtoVoteResponse,
};
use crate::replica::local_state::Term;
use crate::replica::peers::ServerId;
use crate::replica::replica_api::ReplicatedOp;
use crate::store::{AccountRecord, SnapshotRecords, StoredMessage};
use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn base_envelope(
    envelope_type: ProtoReplicationType,
    term: Term,
    server_id: &ServerId,
) -> ProtoReplicationMessage {
    ProtoReplicationMessage {
        r#type: envelope_type as i32,
        term: term.as_u64(),
        server_id: server_id.as_str().to_string(),
        timestamp: now_unix_seconds(),
        payload: None,
    }
}

pub fn heartbeat_envelope(term: Term, me: &ServerId, commit_index: u64) -> ProtoReplicationMessage {
    let mut envelope = base_envelope(ProtoReplicationType::Heartbeat, term, me);
    envelope.payload = Some(Payload::Heartbeat(ProtoHeartbeat { commit_index }));
    envelope
}

pub fn vote_request_envelope(
    term: Term,
    me: &ServerId,
    last_log_term: Term,
    last_log_index: u64,
) -> ProtoReplicationMessage {
    let mut envelope = base_envelope(ProtoReplicationType::RequestVote, term, me);
    envelope.payload = Some(Payload::VoteRequest(ProtoVoteRequest {
        last_log_term: last_log_term.as_u64(),
        last_log_index,
    }));
    envelope
}

pub fn vote_response_envelope(term: Term, me: &ServerId, vote_granted: bool) -> ProtoReplicationMessage {
    let mut envelope = base_envelope(ProtoReplicationType::VoteResponse, term, me);
    envelope.payload = Some(Payload::VoteResponse(ProtoVoteResponse { vote_granted }));
    envelope
}

pub fn replication_response_envelope(
    term: Term,
    me: &ServerId,
    success: bool,
    message_id: u64,
) -> ProtoReplicationMessage {
    let mut envelope = base_envelope(ProtoReplicationType::ReplicationResponse, term, me);
    envelope.payload = Some(Payload::ReplicationResponse(ProtoReplicationResponse {
        success,
        message_id,
    }));
    envelope
}

/// The stale-term rejection: carries our term so the sender can update.
pub fn replication_error_envelope(term: Term, me: &ServerId) -> ProtoReplicationMessage {
    base_envelope(ProtoReplicationType::ReplicationError, term, me)
}

pub fn snapshot_request_envelope(term: Term, me: &ServerId) -> ProtoReplicationMessage {
    let mut envelope = base_envelope(ProtoReplicationType::SnapshotRequest, term, me);
    envelope.payload = Some(Payload::SnapshotRequest(ProtoSnapshotRequest {}));
    envelope
}

pub fn snapshot_response_envelope(
    term: Term,
    me: &ServerId,
    snapshot: &SnapshotRecords,
) -> ProtoReplicationMessage {
    let mut envelope = base_envelope(ProtoReplicationType::SnapshotResponse, term, me);
    envelope.payload = Some(Payload::SnapshotResponse(ProtoSnapshotResponse {
        accounts: snapshot
            .accounts
            .iter()
            .map(|account| ProtoAccountRecord {
                username: account.username.clone(),
                password_verifier: account.password_verifier.clone(),
                created_at: account.created_at,
            })
            .collect(),
        messages: snapshot
            .messages
            .iter()
            .map(|message| ProtoMessageRecord {
                id: message.id,
                sender: message.sender.clone(),
                recipient: message.recipient.clone(),
                content: message.content.clone(),
                timestamp: message.timestamp,
                delivered: message.delivered,
                read: message.read,
            })
            .collect(),
    }));
    envelope
}

pub fn snapshot_from_response(response: ProtoSnapshotResponse) -> SnapshotRecords {
    SnapshotRecords {
        accounts: response
            .accounts
            .into_iter()
            .map(|account| AccountRecord {
                username: account.username,
                password_verifier: account.password_verifier,
                created_at: account.created_at,
            })
            .collect(),
        messages: response
            .messages
            .into_iter()
            .map(|message| StoredMessage {
                id: message.id,
                sender: message.sender,
                recipient: message.recipient,
                content: message.content,
                timestamp: message.timestamp,
                delivered: message.delivered,
                read: message.read,
            })
            .collect(),
    }
}

/// Builds the typed Replicate envelope for one replicated operation.
pub fn replicate_envelope(term: Term, me: &ServerId, op: &ReplicatedOp) -> ProtoReplicationMessage {
    match op {
        ReplicatedOp::Message {
            message_id,
            sender,
            recipient,
            content,
            timestamp,
        } => {
            let mut envelope = base_envelope(ProtoReplicationType::ReplicateMessage, term, me);
            envelope.payload = Some(Payload::MessageReplication(ProtoMessageReplication {
                message_id: *message_id,
                sender: sender.clone(),
                recipient: recipient.clone(),
                content: content.clone(),
                timestamp: *timestamp,
            }));
            envelope
        }
        ReplicatedOp::Account {
            username,
            password_verifier,
            created_at,
        } => {
            let mut envelope = base_envelope(ProtoReplicationType::ReplicateAccount, term, me);
            envelope.payload = Some(Payload::AccountReplication(ProtoAccountReplication {
                username: username.clone(),
                password_verifier: password_verifier.to_vec(),
                created_at: *created_at,
            }));
            envelope
        }
        ReplicatedOp::DeleteMessages {
            requester,
            message_ids,
        } => {
            let mut envelope =
                base_envelope(ProtoReplicationType::ReplicateDeleteMessages, term, me);
            envelope.payload = Some(Payload::Deletion(ProtoDeletionPayload {
                message_ids: message_ids.clone(),
                username: requester.clone(),
            }));
            envelope
        }
        ReplicatedOp::DeleteAccount { username } => {
            let mut envelope =
                base_envelope(ProtoReplicationType::ReplicateDeleteAccount, term, me);
            envelope.payload = Some(Payload::Deletion(ProtoDeletionPayload {
                message_ids: Vec::new(),
                username: username.clone(),
            }));
            envelope
        }
        ReplicatedOp::MarkRead {
            requester,
            message_ids,
        } => {
            let mut envelope = base_envelope(ProtoReplicationType::ReplicateMarkRead, term, me);
            envelope.payload = Some(Payload::Deletion(ProtoDeletionPayload {
                message_ids: message_ids.clone(),
                username: requester.clone(),
            }));
            envelope
        }
    }
}

/// Decodes the operation out of an inbound Replicate envelope. `None` means
/// the envelope type and payload don't line up.
pub fn replicated_op_from_envelope(envelope: &ProtoReplicationMessage) -> Option<ReplicatedOp> {
    match (envelope.r#type(), envelope.payload.as_ref()?) {
        (ProtoReplicationType::ReplicateMessage, Payload::MessageReplication(payload)) => {
            Some(ReplicatedOp::Message {
                message_id: payload.message_id,
                sender: payload.sender.clone(),
                recipient: payload.recipient.clone(),
                content: payload.content.clone(),
                timestamp: payload.timestamp,
            })
        }
        (ProtoReplicationType::ReplicateAccount, Payload::AccountReplication(payload)) => {
            Some(ReplicatedOp::Account {
                username: payload.username.clone(),
                password_verifier: Bytes::from(payload.password_verifier.clone()),
                created_at: payload.created_at,
            })
        }
        (ProtoReplicationType::ReplicateDeleteMessages, Payload::Deletion(payload)) => {
            Some(ReplicatedOp::DeleteMessages {
                requester: payload.username.clone(),
                message_ids: payload.message_ids.clone(),
            })
        }
        (ProtoReplicationType::ReplicateDeleteAccount, Payload::Deletion(payload)) => {
            Some(ReplicatedOp::DeleteAccount {
                username: payload.username.clone(),
            })
        }
        (ProtoReplicationType::ReplicateMarkRead, Payload::Deletion(payload)) => {
            Some(ReplicatedOp::MarkRead {
                requester: payload.username.clone(),
                message_ids: payload.message_ids.clone(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicate_envelopes_round_trip_every_operation() {
        let me = ServerId::new("127.0.0.1:50051");
        let term = Term::new(4);
        let ops = vec![
            ReplicatedOp::Message {
                message_id: 9,
                sender: "alice".into(),
                recipient: "bob".into(),
                content: "hi".into(),
                timestamp: 1234.5,
            },
            ReplicatedOp::Account {
                username: "carol".into(),
                password_verifier: Bytes::from_static(b"v"),
                created_at: 99.0,
            },
            ReplicatedOp::DeleteMessages {
                requester: "bob".into(),
                message_ids: vec![1, 2],
            },
            ReplicatedOp::DeleteAccount {
                username: "carol".into(),
            },
            ReplicatedOp::MarkRead {
                requester: "bob".into(),
                message_ids: vec![9],
            },
        ];

        for op in ops {
            let envelope = replicate_envelope(term, &me, &op);
            assert_eq!(envelope.term, 4);
            assert_eq!(envelope.server_id, "127.0.0.1:50051");
            let decoded = replicated_op_from_envelope(&envelope)
                .unwrap_or_else(|| panic!("failed to decode {:?}", envelope.r#type()));
            // Cheap structural check without requiring PartialEq on Bytes ops.
            assert_eq!(format!("{:?}", decoded), format!("{:?}", op));
        }
    }

    #[test]
    fn mismatched_type_and_payload_is_rejected() {
        let me = ServerId::new("127.0.0.1:50051");
        let mut envelope = heartbeat_envelope(Term::new(1), &me, 0);
        envelope.r#type = ProtoReplicationType::ReplicateMessage as i32;
        assert!(replicated_op_from_envelope(&envelope).is_none());
    }
}
