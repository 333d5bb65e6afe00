use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Clone, Default)]
pub struct NodeOptions {
    pub leader_heartbeat_duration: Option<Duration>,
    pub follower_min_timeout: Option<Duration>,
    pub follower_max_timeout: Option<Duration>,
    /// Deadline for one replication broadcast to reach a majority.
    pub replication_ack_timeout: Option<Duration>,
    /// Deadline for a client-facing write RPC.
    pub client_write_deadline: Option<Duration>,
    /// Per-subscription queue bound; a subscriber that overflows it is
    /// disconnected.
    pub subscription_queue_capacity: Option<usize>,
}

pub(super) struct NodeOptionsValidated {
    pub leader_heartbeat_duration: Duration,
    pub follower_min_timeout: Duration,
    pub follower_max_timeout: Duration,
    pub replication_ack_timeout: Duration,
    pub client_write_deadline: Duration,
    pub subscription_queue_capacity: usize,
}

impl NodeOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.leader_heartbeat_duration >= self.follower_min_timeout {
            return Err("Follower minimum timeout must be greater than leader's heartbeat");
        }
        if self.follower_min_timeout >= self.follower_max_timeout {
            return Err("Follower minimum timeout must be less than maximum timeout");
        }
        if self.replication_ack_timeout < self.leader_heartbeat_duration * 2 {
            return Err("Replication ack timeout must be at least twice the heartbeat interval");
        }
        if self.client_write_deadline < self.replication_ack_timeout {
            return Err("Client write deadline must cover the replication ack timeout");
        }
        if self.subscription_queue_capacity == 0 {
            return Err("Subscription queue capacity must be non-zero");
        }

        Ok(())
    }
}

impl TryFrom<NodeOptions> for NodeOptionsValidated {
    type Error = &'static str;

    fn try_from(options: NodeOptions) -> Result<Self, Self::Error> {
        let values = NodeOptionsValidated {
            leader_heartbeat_duration: options
                .leader_heartbeat_duration
                .unwrap_or(Duration::from_millis(100)),
            follower_min_timeout: options
                .follower_min_timeout
                .unwrap_or(Duration::from_millis(1000)),
            follower_max_timeout: options
                .follower_max_timeout
                .unwrap_or(Duration::from_millis(2000)),
            replication_ack_timeout: options
                .replication_ack_timeout
                .unwrap_or(Duration::from_millis(1000)),
            client_write_deadline: options
                .client_write_deadline
                .unwrap_or(Duration::from_secs(2)),
            subscription_queue_capacity: options.subscription_queue_capacity.unwrap_or(128),
        };

        values.validate()?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(NodeOptionsValidated::try_from(NodeOptions::default()).is_ok());
    }

    #[test]
    fn heartbeat_must_undercut_election_timeout() {
        let options = NodeOptions {
            leader_heartbeat_duration: Some(Duration::from_millis(1500)),
            ..Default::default()
        };
        assert!(NodeOptionsValidated::try_from(options).is_err());
    }

    #[test]
    fn ack_timeout_must_cover_two_heartbeats() {
        let options = NodeOptions {
            replication_ack_timeout: Some(Duration::from_millis(150)),
            ..Default::default()
        };
        assert!(NodeOptionsValidated::try_from(options).is_err());
    }
}
