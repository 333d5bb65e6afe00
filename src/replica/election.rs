use crate::actor::ActorClient;
use crate::replica::local_state::Term;
use crate::replica::peers::ServerId;
use crate::replica::replica_api::LeaderTimerTick;
use crate::replica::timers::{FollowerTimerHandle, LeaderTimerHandle};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::time::Duration;

#[derive(Copy, Clone)]
pub struct ElectionConfig {
    pub leader_heartbeat_duration: Duration,
    pub follower_min_timeout: Duration,
    pub follower_max_timeout: Duration,
}

impl ElectionConfig {
    /// How many consecutive silent heartbeat rounds a leader tolerates from a
    /// peer before counting it dead for quorum purposes.
    fn missed_heartbeat_threshold(&self) -> u32 {
        let threshold = self.follower_min_timeout.as_millis()
            / self.leader_heartbeat_duration.as_millis().max(1);
        (threshold as u32).max(1)
    }
}

/// ElectionState is this server's role plus the state that travels with the
/// role: the election timer while follower/candidate, the received-vote set
/// while candidate, the per-peer replication view while leader. Transitions
/// swap the inner state wholesale, which drops the old role's timer.
pub struct ElectionState {
    state: State,
    config: ElectionConfig,
    actor_client: ActorClient,
}

#[derive(Debug, Eq, PartialEq)]
pub enum CurrentLeader {
    Me,
    Other(ServerId),
    Unknown,
}

enum State {
    Leader(LeaderState),
    Candidate(CandidateState),
    Follower(FollowerState),
}

struct LeaderState {
    term: Term,
    peer_views: HashMap<ServerId, PeerView>,
    _heartbeat_timer: LeaderTimerHandle,
}

/// The leader's knowledge of one peer.
struct PeerView {
    /// Highest message id known applied on the peer (from heartbeat acks).
    match_index: u64,
    consecutive_missed_heartbeats: u32,
    catchup_in_flight: bool,
}

struct CandidateState {
    term: Term,
    received_votes_from: HashSet<ServerId>,
    _election_timeout_tracker: FollowerTimerHandle,
}

struct FollowerState {
    leader_id: Option<ServerId>,
    election_timeout_tracker: FollowerTimerHandle,
}

impl ElectionState {
    pub fn new_follower(config: ElectionConfig, actor_client: ActorClient) -> Self {
        ElectionState {
            state: State::Follower(FollowerState::new(&config, actor_client.clone())),
            config,
            actor_client,
        }
    }

    pub fn current_leader(&self) -> CurrentLeader {
        match &self.state {
            State::Leader(_) => CurrentLeader::Me,
            State::Candidate(_) => CurrentLeader::Unknown,
            State::Follower(FollowerState { leader_id: None, .. }) => CurrentLeader::Unknown,
            State::Follower(FollowerState {
                leader_id: Some(leader_id),
                ..
            }) => CurrentLeader::Other(leader_id.clone()),
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.state, State::Leader(_))
    }

    pub fn is_candidate(&self) -> bool {
        matches!(self.state, State::Candidate(_))
    }

    pub fn reset_timeout_if_follower(&self) {
        if let State::Follower(fs) = &self.state {
            fs.election_timeout_tracker.reset_timeout();
        }
    }

    /// A heartbeat or replicate arrived from `leader_id` at our own term.
    /// Candidates concede; followers (re-)learn the leader endpoint.
    pub fn observe_leader(&mut self, leader_id: ServerId) {
        match &mut self.state {
            State::Follower(fs) => {
                fs.leader_id = Some(leader_id);
                return;
            }
            // Two leaders cannot share a term; nothing sane to record.
            State::Leader(_) => return,
            State::Candidate(_) => {}
        }
        self.transition_to_follower(Some(leader_id));
    }

    pub fn transition_to_candidate(&mut self, term: Term) {
        self.state = State::Candidate(CandidateState::new(
            term,
            &self.config,
            self.actor_client.clone(),
        ));
    }

    pub fn transition_to_follower(&mut self, leader_id: Option<ServerId>) {
        self.state = State::Follower(FollowerState::with_leader(
            leader_id,
            &self.config,
            self.actor_client.clone(),
        ));
    }

    /// Promotes a winning candidate. `match_index` starts at 0 for every
    /// peer; heartbeat acks repair it.
    pub fn transition_to_leader_if_not(&mut self, term: Term, peer_ids: Vec<ServerId>) {
        if let State::Leader(_) = &self.state {
            return;
        }

        self.state = State::Leader(LeaderState::new(
            term,
            peer_ids,
            &self.config,
            self.actor_client.clone(),
        ));
    }

    /// Returns the number of unique votes received so far in `term` (self
    /// included), or 0 when we're not campaigning in that term.
    pub fn add_received_vote_if_candidate(&mut self, term: Term, vote_from: ServerId) -> usize {
        if let State::Candidate(cs) = &mut self.state {
            if cs.term == term {
                cs.received_votes_from.insert(vote_from);
                // +1: we voted for ourselves when the campaign started.
                return cs.received_votes_from.len() + 1;
            }
        }
        0
    }

    pub fn is_election_open(&self, term: Term) -> bool {
        if let State::Candidate(cs) = &self.state {
            cs.term == term
        } else {
            false
        }
    }

    /// The term we became leader in, if leader.
    pub fn leadership_term(&self) -> Option<Term> {
        match &self.state {
            State::Leader(ls) => Some(ls.term),
            _ => None,
        }
    }

    // ---- leader-only peer bookkeeping ----

    pub fn leader_record_heartbeat_ack(&mut self, peer_id: &ServerId, highest_applied_id: u64) {
        if let State::Leader(ls) = &mut self.state {
            if let Some(view) = ls.peer_views.get_mut(peer_id) {
                view.match_index = view.match_index.max(highest_applied_id);
                view.consecutive_missed_heartbeats = 0;
            }
        }
    }

    /// Records a silent heartbeat round for `peer_id` and returns the number
    /// of members (self included) still considered alive.
    pub fn leader_record_heartbeat_miss(&mut self, peer_id: &ServerId) -> usize {
        let threshold = self.config.missed_heartbeat_threshold();
        if let State::Leader(ls) = &mut self.state {
            if let Some(view) = ls.peer_views.get_mut(peer_id) {
                view.consecutive_missed_heartbeats =
                    view.consecutive_missed_heartbeats.saturating_add(1);
            }
            let alive_peers = ls
                .peer_views
                .values()
                .filter(|view| view.consecutive_missed_heartbeats < threshold)
                .count();
            alive_peers + 1
        } else {
            0
        }
    }

    /// A peer is due for catch-up when its applied state trails the commit
    /// index and no catch-up for it is already running.
    pub fn leader_peer_needs_catchup(&self, peer_id: &ServerId, commit_index: u64) -> bool {
        if let State::Leader(ls) = &self.state {
            if let Some(view) = ls.peer_views.get(peer_id) {
                return view.match_index < commit_index && !view.catchup_in_flight;
            }
        }
        false
    }

    pub fn leader_set_catchup_in_flight(&mut self, peer_id: &ServerId, in_flight: bool) {
        if let State::Leader(ls) = &mut self.state {
            if let Some(view) = ls.peer_views.get_mut(peer_id) {
                view.catchup_in_flight = in_flight;
            }
        }
    }

    pub fn leader_peer_match_index(&self, peer_id: &ServerId) -> Option<u64> {
        if let State::Leader(ls) = &self.state {
            return ls.peer_views.get(peer_id).map(|view| view.match_index);
        }
        None
    }
}

impl fmt::Debug for ElectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Leader(ls) => write!(f, "Leader(Term={})", ls.term),
            State::Candidate(cs) => write!(f, "Candidate(Term={})", cs.term),
            State::Follower(FollowerState {
                leader_id: Some(leader_id),
                ..
            }) => write!(f, "Follower(Leader={})", leader_id),
            State::Follower(FollowerState { leader_id: None, .. }) => {
                write!(f, "Follower(Leader=None)")
            }
        }
    }
}

impl LeaderState {
    fn new(
        term: Term,
        peer_ids: Vec<ServerId>,
        config: &ElectionConfig,
        actor_client: ActorClient,
    ) -> Self {
        let peer_views = peer_ids
            .into_iter()
            .map(|peer_id| {
                (
                    peer_id,
                    PeerView {
                        match_index: 0,
                        consecutive_missed_heartbeats: 0,
                        catchup_in_flight: false,
                    },
                )
            })
            .collect();

        LeaderState {
            term,
            peer_views,
            _heartbeat_timer: LeaderTimerHandle::spawn_background_task(
                config.leader_heartbeat_duration,
                actor_client,
                LeaderTimerTick { term },
            ),
        }
    }
}

impl CandidateState {
    fn new(term: Term, config: &ElectionConfig, actor_client: ActorClient) -> Self {
        CandidateState {
            term,
            received_votes_from: HashSet::new(),
            // Candidates keep the same jittered timeout; if the election
            // stalls, the timer fires again and we campaign in a fresh term.
            _election_timeout_tracker: FollowerTimerHandle::spawn_background_task(
                config.follower_min_timeout,
                config.follower_max_timeout,
                actor_client,
            ),
        }
    }
}

impl FollowerState {
    fn new(config: &ElectionConfig, actor_client: ActorClient) -> Self {
        Self::with_leader(None, config, actor_client)
    }

    fn with_leader(
        leader_id: Option<ServerId>,
        config: &ElectionConfig,
        actor_client: ActorClient,
    ) -> Self {
        FollowerState {
            leader_id,
            election_timeout_tracker: FollowerTimerHandle::spawn_background_task(
                config.follower_min_timeout,
                config.follower_max_timeout,
                actor_client,
            ),
        }
    }
}
