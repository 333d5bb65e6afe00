use crate::grpc::proto_replication_message::Payload;
use crate::grpc::{ProtoReplicationMessage, ProtoReplicationType};
use crate::replica::envelopes;
use crate::replica::{
    HeartbeatInput, PeerEnvelopeError, ReplicateInput, RequestVoteError, RequestVoteInput,
    ServerId, Term,
};
use crate::server::server::RpcServer;

impl RpcServer {
    /// Inbound half of the peer surface: decode the envelope, hand it to the
    /// replica event loop, encode the reply. Term handling is uniform: the
    /// replica's first action for every payload is the term-compare rule, and
    /// a stale sender gets REPLICATION_ERROR carrying our current term.
    pub(super) async fn handle_replication_envelope(
        &self,
        envelope: ProtoReplicationMessage,
    ) -> ProtoReplicationMessage {
        let sender_id = ServerId::new(envelope.server_id.clone());
        let sender_term = Term::new(envelope.term);

        match envelope.r#type() {
            ProtoReplicationType::RequestVote => {
                let Some(Payload::VoteRequest(vote_request)) = &envelope.payload else {
                    return envelopes::replication_error_envelope(sender_term, &self.my_server_id);
                };
                let input = RequestVoteInput {
                    candidate_term: sender_term,
                    candidate_id: sender_id,
                    candidate_last_log_term: Term::new(vote_request.last_log_term),
                    candidate_last_log_index: vote_request.last_log_index,
                };
                match self.local_replica.request_vote(input).await {
                    Ok(output) => envelopes::vote_response_envelope(
                        sender_term,
                        &self.my_server_id,
                        output.vote_granted,
                    ),
                    Err(RequestVoteError::RequestTermOutOfDate(info)) => {
                        envelopes::replication_error_envelope(info.current_term, &self.my_server_id)
                    }
                    Err(RequestVoteError::CandidateNotInCluster) => {
                        envelopes::vote_response_envelope(sender_term, &self.my_server_id, false)
                    }
                    Err(e) => {
                        slog::error!(self.logger, "RequestVote failed: {}", e);
                        envelopes::vote_response_envelope(sender_term, &self.my_server_id, false)
                    }
                }
            }

            ProtoReplicationType::Heartbeat => {
                let Some(Payload::Heartbeat(heartbeat)) = &envelope.payload else {
                    return envelopes::replication_error_envelope(sender_term, &self.my_server_id);
                };
                let input = HeartbeatInput {
                    leader_term: sender_term,
                    leader_id: sender_id,
                    leader_commit_index: heartbeat.commit_index,
                };
                match self.local_replica.heartbeat(input).await {
                    Ok(output) => envelopes::replication_response_envelope(
                        sender_term,
                        &self.my_server_id,
                        true,
                        output.highest_applied_id,
                    ),
                    Err(PeerEnvelopeError::SenderTermOutOfDate(info)) => {
                        envelopes::replication_error_envelope(info.current_term, &self.my_server_id)
                    }
                    Err(e) => {
                        slog::debug!(self.logger, "Heartbeat rejected: {}", e);
                        envelopes::replication_response_envelope(
                            sender_term,
                            &self.my_server_id,
                            false,
                            0,
                        )
                    }
                }
            }

            ProtoReplicationType::ReplicateMessage
            | ProtoReplicationType::ReplicateAccount
            | ProtoReplicationType::ReplicateDeleteMessages
            | ProtoReplicationType::ReplicateDeleteAccount
            | ProtoReplicationType::ReplicateMarkRead => {
                let Some(operation) = envelopes::replicated_op_from_envelope(&envelope) else {
                    return envelopes::replication_error_envelope(sender_term, &self.my_server_id);
                };
                let input = ReplicateInput {
                    leader_term: sender_term,
                    leader_id: sender_id,
                    operation,
                };
                match self.local_replica.replicate(input).await {
                    Ok(output) => envelopes::replication_response_envelope(
                        sender_term,
                        &self.my_server_id,
                        true,
                        output.applied_message_id,
                    ),
                    Err(PeerEnvelopeError::SenderTermOutOfDate(info)) => {
                        envelopes::replication_error_envelope(info.current_term, &self.my_server_id)
                    }
                    Err(e) => {
                        slog::error!(self.logger, "Replicate apply failed: {}", e);
                        envelopes::replication_response_envelope(
                            sender_term,
                            &self.my_server_id,
                            false,
                            0,
                        )
                    }
                }
            }

            // A joiner bootstrapping its store. This is a read of committed
            // state, not a protocol step, so it skips the stale-term check (a
            // fresh node legitimately carries term 0).
            ProtoReplicationType::SnapshotRequest => {
                let snapshot = match self.store.snapshot_for_catchup(self.commit_watermark.get()) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        slog::error!(self.logger, "Snapshot build failed: {}", e);
                        return envelopes::replication_error_envelope(
                            sender_term,
                            &self.my_server_id,
                        );
                    }
                };
                let term = match self.local_replica.cluster_status().await {
                    Ok(status) => status.term,
                    Err(_) => sender_term,
                };
                slog::info!(
                    self.logger,
                    "Serving snapshot to {} ({} accounts, {} messages)",
                    envelope.server_id,
                    snapshot.accounts.len(),
                    snapshot.messages.len()
                );
                envelopes::snapshot_response_envelope(term, &self.my_server_id, &snapshot)
            }

            // Responses arriving as requests are protocol misuse.
            ProtoReplicationType::VoteResponse
            | ProtoReplicationType::ReplicationResponse
            | ProtoReplicationType::ReplicationError
            | ProtoReplicationType::SnapshotResponse => {
                slog::warn!(
                    self.logger,
                    "Unexpected inbound envelope type {:?} from {}",
                    envelope.r#type(),
                    envelope.server_id
                );
                envelopes::replication_error_envelope(sender_term, &self.my_server_id)
            }
        }
    }
}
