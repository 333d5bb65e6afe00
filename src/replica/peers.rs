use crate::replica::peer_client::PeerClient;
use std::collections::hash_map::Values;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tonic::codegen::http::uri;

/// ServerId identifies a member of the replication cluster. It is the
/// member's client-visible `host:port` endpoint, which doubles as its
/// identity in vote and replication envelopes and in leader redirects.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(server_id: impl Into<String>) -> Self {
        ServerId(server_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Peer is a cluster member that is not me.
#[derive(Clone)]
pub struct Peer {
    pub id: ServerId,
    pub client: PeerClient,
}

/// ClusterTracker is the static membership of this replication cluster: me
/// plus a client handle per peer. Membership does not change at runtime.
pub struct ClusterTracker {
    my_server_id: ServerId,
    peers: HashMap<ServerId, Peer>,
}

impl ClusterTracker {
    pub fn create_valid_cluster(
        logger: slog::Logger,
        my_server_id: ServerId,
        peer_ids: Vec<ServerId>,
    ) -> Result<Self, InvalidCluster> {
        let peers_by_id = map_with_unique_index(peer_ids, |id| id.clone())
            .map_err(|dupe| InvalidCluster::DuplicateServerId(dupe.into_inner()))?;

        if peers_by_id.contains_key(&my_server_id) {
            return Err(InvalidCluster::DuplicateServerId(my_server_id.into_inner()));
        }

        let mut peers = HashMap::with_capacity(peers_by_id.len());
        for (peer_id, _) in peers_by_id {
            let peer_logger = logger.new(slog::o!("peer" => peer_id.as_str().to_string()));
            let client = PeerClient::new(peer_logger, make_uri(&peer_id)?);
            peers.insert(
                peer_id.clone(),
                Peer {
                    id: peer_id,
                    client,
                },
            );
        }

        Ok(ClusterTracker {
            my_server_id,
            peers,
        })
    }

    pub fn my_server_id(&self) -> &ServerId {
        &self.my_server_id
    }

    pub fn contains_member(&self, id: &ServerId) -> bool {
        self.peers.contains_key(id) || id == &self.my_server_id
    }

    pub fn iter_peers(&self) -> Values<'_, ServerId, Peer> {
        self.peers.values()
    }

    pub fn peer(&self, id: &ServerId) -> Option<&Peer> {
        self.peers.get(id)
    }

    /// All member endpoints, me included, sorted for stable output.
    pub fn all_member_ids(&self) -> Vec<ServerId> {
        let mut ids: Vec<ServerId> = self.peers.keys().cloned().collect();
        ids.push(self.my_server_id.clone());
        ids.sort();
        ids
    }

    /// Total voting members (peers + self).
    pub fn num_voting_members(&self) -> usize {
        self.peers.len() + 1
    }

    /// Smallest strict majority of the cluster.
    pub fn majority_size(&self) -> usize {
        self.num_voting_members() / 2 + 1
    }
}

fn make_uri(server_id: &ServerId) -> Result<uri::Uri, InvalidCluster> {
    // Reject ids that are not host:port up front, so a typo in --replicas is
    // a startup error rather than a connect-time surprise.
    let (_, port) = server_id
        .as_str()
        .rsplit_once(':')
        .ok_or_else(|| InvalidCluster::MalformedServerId(server_id.as_str().to_string()))?;
    port.parse::<u16>()
        .map_err(|_| InvalidCluster::MalformedServerId(server_id.as_str().to_string()))?;

    let url = format!("http://{}", server_id.as_str());
    uri::Uri::from_maybe_shared(url).map_err(InvalidCluster::InvalidUri)
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidCluster {
    #[error("duplicate server '{0}' in cluster config")]
    DuplicateServerId(String),
    #[error("server id '{0}' is not host:port")]
    MalformedServerId(String),
    #[error("invalid URI")]
    InvalidUri(#[from] uri::InvalidUri),
}

/// Returns a HashMap that is guaranteed to have uniquely indexed all of the
/// values. If a duplicate is present, its key is returned as an Err.
fn map_with_unique_index<K, V, F>(values: Vec<V>, key_for_value: F) -> Result<HashMap<K, V>, K>
where
    K: Hash + Eq,
    F: Fn(&V) -> K,
{
    let mut map = HashMap::with_capacity(values.len());

    for v in values {
        if let Some(duplicate) = map.insert(key_for_value(&v), v) {
            return Err(key_for_value(&duplicate));
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn rejects_duplicate_members() {
        let result = ClusterTracker::create_valid_cluster(
            test_logger(),
            ServerId::new("127.0.0.1:50051"),
            vec![
                ServerId::new("127.0.0.1:50052"),
                ServerId::new("127.0.0.1:50052"),
            ],
        );
        assert!(matches!(result, Err(InvalidCluster::DuplicateServerId(_))));

        let result = ClusterTracker::create_valid_cluster(
            test_logger(),
            ServerId::new("127.0.0.1:50051"),
            vec![ServerId::new("127.0.0.1:50051")],
        );
        assert!(matches!(result, Err(InvalidCluster::DuplicateServerId(_))));
    }

    #[test]
    fn rejects_malformed_endpoints() {
        let result = ClusterTracker::create_valid_cluster(
            test_logger(),
            ServerId::new("127.0.0.1:50051"),
            vec![ServerId::new("not-an-endpoint")],
        );
        assert!(matches!(result, Err(InvalidCluster::MalformedServerId(_))));
    }

    #[tokio::test]
    async fn majority_is_a_strict_majority() {
        let cluster = |peers: &[&str]| {
            ClusterTracker::create_valid_cluster(
                test_logger(),
                ServerId::new("127.0.0.1:50051"),
                peers.iter().map(|p| ServerId::new(*p)).collect(),
            )
            .unwrap()
        };

        assert_eq!(cluster(&[]).majority_size(), 1);
        assert_eq!(cluster(&["127.0.0.1:50052"]).majority_size(), 2);
        assert_eq!(
            cluster(&["127.0.0.1:50052", "127.0.0.1:50053"]).majority_size(),
            2
        );
        assert_eq!(
            cluster(&[
                "127.0.0.1:50052",
                "127.0.0.1:50053",
                "127.0.0.1:50054",
                "127.0.0.1:50055"
            ])
            .majority_size(),
            3
        );
    }
}
