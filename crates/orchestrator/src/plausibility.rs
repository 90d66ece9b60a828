//! Join/leave plausibility from the message traffic of a run.
//!
//! These checks compare what the protocol says happened (events and
//! messages) with the node lifecycle that was logged. They run once per
//! store, on the whole log.

use minhton_oracle_log::{
    EventId, EventRecord, NodeStateRecord, StoredNode, TrafficRecord,
};
use minhton_oracle_types::{EventType, MessageMode, MessageType, NodeState};
use minhton_oracle_validators::{CheckKind, CheckOutcome, CounterExample};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Join/leave bookkeeping of one log.
#[derive(Debug)]
pub struct JoinPlausibility<'a> {
    number_of_nodes: u64,
    events: &'a [EventRecord],
    node_states: &'a [NodeStateRecord],
    traffic: &'a [TrafficRecord],
    leave_events: HashSet<EventId>,
    /// Records before this timestamp belong to the initial build phase.
    build_cutoff: Option<i64>,
}

impl<'a> JoinPlausibility<'a> {
    pub fn new(
        number_of_nodes: u64,
        events: &'a [EventRecord],
        node_states: &'a [NodeStateRecord],
        traffic: &'a [TrafficRecord],
    ) -> Self {
        let leave_events = leave_events(events, traffic);
        let build_cutoff = events
            .iter()
            .filter(|e| !matches!(e.event_type, EventType::Join | EventType::FindQuery))
            .map(|e| e.timestamp_ms)
            .min();

        Self {
            number_of_nodes,
            events,
            node_states,
            traffic,
            leave_events,
            build_cutoff,
        }
    }

    /// LEAVE events that at least one REMOVE_NEIGHBOR message refers to.
    pub fn leave_count(&self) -> usize {
        self.leave_events.len()
    }

    fn in_build_phase(&self, timestamp_ms: i64) -> bool {
        self.build_cutoff.map_or(true, |cutoff| timestamp_ms < cutoff)
    }

    fn join_events(&self, build_phase_only: bool) -> i64 {
        self.events
            .iter()
            .filter(|e| e.event_type == EventType::Join)
            .filter(|e| !build_phase_only || self.in_build_phase(e.timestamp_ms))
            .count() as i64
    }

    /// Acknowledged joins. Both ends log every JOIN_ACCEPT_ACK.
    fn joined_nodes(&self, build_phase_only: bool) -> i64 {
        let acks = self
            .traffic
            .iter()
            .filter(|t| t.message_type == MessageType::JoinAcceptAck)
            .filter(|t| !build_phase_only || self.in_build_phase(t.timestamp_ms))
            .count() as i64;
        acks / 2
    }

    /// Run every plausibility check.
    ///
    /// Without leaves the counts must match the configured network size
    /// exactly; with leaves they only must not be outnumbered by leaves.
    pub fn check(&self) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::with_capacity(4);
        let leaves = self.leave_count() as i64;

        if leaves == 0 {
            let expected = self.number_of_nodes as i64 - 1;
            debug!(expected, cutoff = ?self.build_cutoff, "Checking join counts of the build phase");
            outcomes.push(count_equals(
                CheckKind::JoinEventCount,
                expected,
                self.join_events(true),
            ));
            outcomes.push(count_equals(
                CheckKind::JoinedNodeCount,
                expected,
                self.joined_nodes(true),
            ));
        } else {
            debug!(leaves, "Checking join counts against leaves");
            outcomes.push(at_least(
                CheckKind::JoinEventsExceedLeaves,
                leaves,
                self.join_events(false),
            ));
            outcomes.push(at_least(
                CheckKind::JoinedNodesExceedLeaves,
                leaves,
                self.joined_nodes(false),
            ));
        }

        outcomes.push(self.acknowledged_by_requester());
        outcomes.push(self.joined_nodes_running(leaves == 0));
        outcomes
    }

    /// The first JOIN of every join event and the first JOIN_ACCEPT_ACK
    /// answering it come from the same host.
    pub fn acknowledged_by_requester(&self) -> CheckOutcome {
        let requests = first_sender_host(self.traffic.iter().filter(|t| {
            t.message_type == MessageType::Join && t.ref_event_id == 0
        }));
        let acks = first_sender_host(
            self.traffic
                .iter()
                .filter(|t| t.message_type == MessageType::JoinAcceptAck),
        );

        let mut violations = Vec::new();
        for (event, requester) in &requests {
            match acks.get(event) {
                None => violations.push(CounterExample::Note(format!(
                    "event {}: join requested by {} was never acknowledged",
                    event,
                    show_host(requester)
                ))),
                Some(acknowledger) if acknowledger != requester => {
                    violations.push(CounterExample::Note(format!(
                        "event {}: join requested by {} but acknowledged by {}",
                        event,
                        show_host(requester),
                        show_host(acknowledger)
                    )))
                }
                Some(_) => {}
            }
        }
        for (event, acknowledger) in &acks {
            if !requests.contains_key(event) {
                violations.push(CounterExample::Note(format!(
                    "event {}: {} acknowledged a join nobody requested",
                    event,
                    show_host(acknowledger)
                )));
            }
        }
        CheckOutcome::from_violations(CheckKind::JoinAcknowledgedByRequester, violations)
    }

    /// Every node that sent a JOIN_ACCEPT_ACK appears as RUNNING at the
    /// position it acknowledged from.
    pub fn joined_nodes_running(&self, build_phase_only: bool) -> CheckOutcome {
        let running: Vec<&StoredNode> = self
            .node_states
            .iter()
            .filter(|r| r.state == NodeState::Running)
            .map(|r| &r.node)
            .collect();

        let mut violations = Vec::new();
        for ack in self.traffic.iter().filter(|t| {
            t.message_type == MessageType::JoinAcceptAck
                && t.mode == MessageMode::Sending
                && (!build_phase_only || self.in_build_phase(t.timestamp_ms))
        }) {
            if !running.iter().any(|node| node.same_host_and_position(&ack.sender)) {
                violations.push(CounterExample::Note(format!(
                    "event {}: {} at {} acknowledged a join but never ran there",
                    ack.causing_event(),
                    show_host(&ack.sender.peer.as_ref().map(|p| p.host.clone())),
                    ack.sender
                        .position
                        .map_or_else(|| "no position".to_string(), |p| p.to_string()),
                )));
            }
        }
        CheckOutcome::from_violations(CheckKind::JoinedNodesRunning, violations)
    }
}

fn leave_events(events: &[EventRecord], traffic: &[TrafficRecord]) -> HashSet<EventId> {
    let referenced: HashSet<EventId> = traffic
        .iter()
        .filter(|t| t.message_type == MessageType::RemoveNeighbor)
        .map(|t| t.ref_event_id)
        .collect();
    events
        .iter()
        .filter(|e| e.event_type == EventType::Leave && referenced.contains(&e.event_id))
        .map(|e| e.event_id)
        .collect()
}

/// Host of the first sender per causing event, in traffic order.
fn first_sender_host<'t>(
    messages: impl Iterator<Item = &'t TrafficRecord>,
) -> BTreeMap<EventId, Option<String>> {
    let mut first = BTreeMap::new();
    for message in messages {
        first
            .entry(message.causing_event())
            .or_insert_with(|| message.sender.peer.as_ref().map(|p| p.host.clone()));
    }
    first
}

fn show_host(host: &Option<String>) -> &str {
    host.as_deref().unwrap_or("unknown host")
}

fn count_equals(check: CheckKind, expected: i64, actual: i64) -> CheckOutcome {
    let violations = if expected == actual {
        Vec::new()
    } else {
        vec![CounterExample::Count { expected, actual }]
    };
    CheckOutcome::from_violations(check, violations)
}

/// `actual - leaves >= 0`.
fn at_least(check: CheckKind, leaves: i64, actual: i64) -> CheckOutcome {
    let violations = if actual >= leaves {
        Vec::new()
    } else {
        vec![CounterExample::Count {
            expected: leaves,
            actual,
        }]
    };
    CheckOutcome::from_violations(check, violations)
}
