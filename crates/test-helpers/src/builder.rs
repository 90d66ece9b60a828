//! Scripted in-memory event logs.

use indexmap::IndexSet;
use minhton_oracle_log::{
    EventId, EventRecord, GeneralInfo, MemoryEventLog, NodeStateRecord, RelationshipRecord,
    SequenceId, StoredNode, TrafficRecord,
};
use minhton_oracle_types::{
    tree, EventType, Fanout, MessageMode, MessageType, NeighborRelationship, NodeState,
    PositionMapper, TreePosition,
};
use std::collections::BTreeMap;

/// Port every scripted node listens on.
pub const NODE_PORT: u16 = 2000;

/// A stored node at `level:number` with the address the builder uses for
/// that position.
pub fn stored(level: u32, number: u64) -> StoredNode {
    StoredNode::at(level, number, host(level, number), NODE_PORT)
}

/// Address of the node scripted at `level:number`.
pub fn host(level: u32, number: u64) -> String {
    format!("10.0.{}.{}", level, number)
}

type Edge = (NeighborRelationship, TreePosition, TreePosition);

/// Builds a [`MemoryEventLog`] the way the simulation logger would write
/// it.
///
/// All tables share one clock, so timestamps follow the order in which
/// records are added. The root is bootstrapped under event id 0, which has
/// no event row; scripted events are numbered from 1.
///
/// `link_topology` writes the relationships a correct MINHTON network
/// would have for the currently running positions, so a log built only
/// from `join`, `leave` and `link_topology` passes every structural check.
pub struct LogBuilder {
    fanout: Fanout,
    number_of_nodes: Option<u64>,
    log: MemoryEventLog,
    mapper: PositionMapper,
    clock: i64,
    next_state_id: SequenceId,
    next_relationship_id: SequenceId,
    next_traffic_id: SequenceId,
    next_event_id: EventId,
    running: BTreeMap<TreePosition, StoredNode>,
    ever_joined: IndexSet<TreePosition>,
    linked: IndexSet<Edge>,
}

impl LogBuilder {
    /// Panics if `fanout < 2`.
    pub fn new(fanout: Fanout) -> Self {
        Self {
            fanout,
            number_of_nodes: None,
            log: MemoryEventLog::new(GeneralInfo::new(0, fanout)),
            mapper: PositionMapper::with_default_scale(fanout).expect("fanout must be at least 2"),
            clock: 0,
            next_state_id: 1,
            next_relationship_id: 1,
            next_traffic_id: 1,
            next_event_id: 1,
            running: BTreeMap::new(),
            ever_joined: IndexSet::new(),
            linked: IndexSet::new(),
        }
    }

    /// A perfect tree of the given height, built by joining every position
    /// in level order and linking after each join.
    pub fn perfect_tree(fanout: Fanout, height: u32) -> Self {
        let mut builder = Self::new(fanout);
        builder.bootstrap();
        for position in tree::perfect_tree_positions(fanout, height).into_iter().skip(1) {
            let event = builder.join(position.level, position.number);
            builder.link_topology(event);
        }
        builder
    }

    pub fn fanout(&self) -> Fanout {
        self.fanout
    }

    /// Override the node count of the general row. By default it is the
    /// number of positions that ever joined, root included.
    pub fn with_number_of_nodes(mut self, number_of_nodes: u64) -> Self {
        self.number_of_nodes = Some(number_of_nodes);
        self
    }

    /// Positions currently running, in level order.
    pub fn running_positions(&self) -> Vec<TreePosition> {
        self.running.keys().copied().collect()
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    /// Append an event row and return its id.
    pub fn event(&mut self, event_type: EventType) -> EventId {
        let event_id = self.next_event_id;
        self.next_event_id += 1;
        let timestamp_ms = self.tick();
        let order = self.log.events.len() as SequenceId + 1;
        self.log.events.push(EventRecord {
            order,
            event_id,
            timestamp_ms,
            event_type,
        });
        event_id
    }

    /// Append a node-state record.
    pub fn state(&mut self, event_id: EventId, node: StoredNode, state: NodeState) -> &mut Self {
        let id = self.next_state_id;
        self.next_state_id += 1;
        let timestamp_ms = self.tick();
        if let Some(position) = node.position {
            match state {
                NodeState::Running => {
                    self.running.insert(position, node.clone());
                    self.ever_joined.insert(position);
                }
                _ => {
                    if self.running.get(&position) == Some(&node) {
                        self.running.remove(&position);
                    }
                }
            }
        }
        self.log.node_states.push(NodeStateRecord {
            id,
            timestamp_ms,
            event_id,
            node,
            state,
        });
        self
    }

    pub fn running(&mut self, event_id: EventId, node: StoredNode) -> &mut Self {
        self.state(event_id, node, NodeState::Running)
    }

    pub fn left(&mut self, event_id: EventId, node: StoredNode) -> &mut Self {
        self.state(event_id, node, NodeState::Left)
    }

    /// Append a relationship record.
    pub fn relate(
        &mut self,
        event_id: EventId,
        kind: NeighborRelationship,
        subject: StoredNode,
        object: StoredNode,
    ) -> &mut Self {
        let id = self.next_relationship_id;
        self.next_relationship_id += 1;
        let timestamp_ms = self.tick();
        self.log.relationships.push(RelationshipRecord {
            id,
            timestamp_ms,
            event_id,
            kind,
            subject,
            object,
        });
        self
    }

    /// Append a record that clears a single-valued relationship.
    pub fn clear(
        &mut self,
        event_id: EventId,
        kind: NeighborRelationship,
        subject: StoredNode,
    ) -> &mut Self {
        self.relate(event_id, kind, subject, StoredNode::new(None, None))
    }

    /// Append reciprocal PARENT and CHILD records.
    pub fn parent_child(
        &mut self,
        event_id: EventId,
        parent: StoredNode,
        child: StoredNode,
    ) -> &mut Self {
        self.relate(event_id, NeighborRelationship::Parent, child.clone(), parent.clone());
        self.relate(event_id, NeighborRelationship::Child, parent, child)
    }

    /// Append reciprocal ADJACENT_RIGHT and ADJACENT_LEFT records for
    /// `left` directly left of `right`.
    pub fn adjacent(
        &mut self,
        event_id: EventId,
        left: StoredNode,
        right: StoredNode,
    ) -> &mut Self {
        self.relate(event_id, NeighborRelationship::AdjacentRight, left.clone(), right.clone());
        self.relate(event_id, NeighborRelationship::AdjacentLeft, right, left)
    }

    /// Append a traffic record.
    pub fn message(
        &mut self,
        event_id: EventId,
        ref_event_id: EventId,
        message_type: MessageType,
        mode: MessageMode,
        sender: StoredNode,
        target: StoredNode,
    ) -> &mut Self {
        let id = self.next_traffic_id;
        self.next_traffic_id += 1;
        let timestamp_ms = self.tick();
        self.log.traffic.push(TrafficRecord {
            id,
            timestamp_ms,
            message_type,
            mode,
            event_id,
            ref_event_id,
            sender,
            target,
        });
        self
    }

    /// Start the network with the root running under event id 0.
    pub fn bootstrap(&mut self) -> &mut Self {
        self.running(0, stored(0, 0))
    }

    /// Join `level:number` below its parent.
    ///
    /// Writes a JOIN event, the JOIN request of the new node, the
    /// JOIN_ACCEPT of the parent, the JOIN_ACCEPT_ACK as logged by both
    /// ends, and the RUNNING state of the new node. Relationships are left
    /// to [`LogBuilder::link_topology`].
    pub fn join(&mut self, level: u32, number: u64) -> EventId {
        let position = TreePosition::new(level, number);
        let parent = position
            .parent(self.fanout)
            .map(|p| stored(p.level, p.number))
            .unwrap_or_else(|| stored(0, 0));
        let joining = stored(level, number);
        let unplaced = StoredNode::new(None, joining.peer.clone());

        let event = self.event(EventType::Join);
        self.message(
            event,
            0,
            MessageType::Join,
            MessageMode::Sending,
            unplaced.clone(),
            parent.clone(),
        );
        self.message(
            event,
            event,
            MessageType::JoinAccept,
            MessageMode::Sending,
            parent.clone(),
            unplaced,
        );
        for mode in [MessageMode::Sending, MessageMode::Receiving] {
            self.message(
                event,
                event,
                MessageType::JoinAcceptAck,
                mode,
                joining.clone(),
                parent.clone(),
            );
        }
        self.running(event, joining);
        event
    }

    /// Leave `level:number`.
    ///
    /// Writes a LEAVE event, a REMOVE_NEIGHBOR message referencing it and
    /// the LEFT state of the node.
    pub fn leave(&mut self, level: u32, number: u64) -> EventId {
        let leaving = stored(level, number);
        let parent = TreePosition::new(level, number)
            .parent(self.fanout)
            .map(|p| stored(p.level, p.number))
            .unwrap_or_else(|| leaving.clone());

        let event = self.event(EventType::Leave);
        self.message(
            event,
            event,
            MessageType::RemoveNeighbor,
            MessageMode::Sending,
            leaving.clone(),
            parent,
        );
        self.left(event, leaving);
        event
    }

    /// Write the relationships of a correct network over the running
    /// positions under `event_id`.
    ///
    /// Only the difference to the previous call is written. Single-valued
    /// relationships that disappear are cleared; multi-valued ones are
    /// overwritten with a placeholder at the same position.
    pub fn link_topology(&mut self, event_id: EventId) -> &mut Self {
        let desired = self.desired_edges();

        let stale: Vec<Edge> = self
            .linked
            .iter()
            .filter(|edge| !desired.contains(*edge))
            .copied()
            .collect();
        for (kind, subject, object) in stale {
            let subject_node = stored(subject.level, subject.number);
            if kind.is_multi_valued() {
                let placeholder = StoredNode::new(Some(object), None);
                self.relate(event_id, kind, subject_node, placeholder);
            } else {
                self.clear(event_id, kind, subject_node);
            }
        }

        let added: Vec<Edge> = desired
            .iter()
            .filter(|edge| !self.linked.contains(*edge))
            .copied()
            .collect();
        for (kind, subject, object) in added {
            self.relate(
                event_id,
                kind,
                stored(subject.level, subject.number),
                stored(object.level, object.number),
            );
        }

        self.linked = desired;
        self
    }

    fn desired_edges(&mut self) -> IndexSet<Edge> {
        let fanout = self.fanout;
        let positions: Vec<TreePosition> = self.running.keys().copied().collect();
        let is_running = |p: &TreePosition| self.running.contains_key(p);
        let mut edges = IndexSet::new();

        for &position in &positions {
            if let Some(parent) = position.parent(fanout) {
                if is_running(&parent) {
                    edges.insert((NeighborRelationship::Parent, position, parent));
                }
            }
            for child in children(position, fanout).filter(|c| is_running(c)) {
                edges.insert((NeighborRelationship::Child, position, child));
            }
            for neighbor in tree::routing_table_numbers(position, fanout)
                .into_iter()
                .map(|n| TreePosition::new(position.level, n))
                .filter(|n| is_running(n))
            {
                edges.insert((NeighborRelationship::RoutingTableNeighbor, position, neighbor));
                for child in children(neighbor, fanout).filter(|c| is_running(c)) {
                    edges.insert((NeighborRelationship::RoutingTableNeighborChild, position, child));
                }
            }
        }

        let mut in_order = positions;
        in_order.sort_by_key(|p| self.mapper.value(*p));
        for pair in in_order.windows(2) {
            edges.insert((NeighborRelationship::AdjacentRight, pair[0], pair[1]));
            edges.insert((NeighborRelationship::AdjacentLeft, pair[1], pair[0]));
        }
        edges
    }

    /// Finish the log.
    pub fn build(&self) -> MemoryEventLog {
        let mut log = self.log.clone();
        let number_of_nodes = self
            .number_of_nodes
            .unwrap_or(self.ever_joined.len() as u64);
        log.general = Some(GeneralInfo::new(number_of_nodes, self.fanout));
        log
    }
}

fn children(position: TreePosition, fanout: Fanout) -> impl Iterator<Item = TreePosition> {
    tree::child_numbers(position, fanout).map(move |n| TreePosition::new(position.level + 1, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minhton_oracle_log::EventLog;

    #[test]
    fn test_perfect_tree_counts() {
        let builder = LogBuilder::perfect_tree(2, 2);
        let log = builder.build();

        assert_eq!(log.general_info().unwrap().number_of_nodes, 7);
        assert_eq!(log.events.len(), 6);
        assert_eq!(builder.running_positions().len(), 7);
        // Two acknowledgements per join.
        let acks = log
            .traffic
            .iter()
            .filter(|t| t.message_type == MessageType::JoinAcceptAck)
            .count();
        assert_eq!(acks, 12);
    }

    #[test]
    fn test_link_topology_only_writes_differences() {
        let mut builder = LogBuilder::new(2);
        builder.bootstrap();
        let first = builder.join(1, 0);
        builder.link_topology(first);
        let written = builder.build().relationships.len();
        // PARENT, CHILD and both adjacency directions.
        assert_eq!(written, 4);

        builder.link_topology(first);
        assert_eq!(builder.build().relationships.len(), written);
    }

    #[test]
    fn test_leave_removes_running_position() {
        let mut builder = LogBuilder::perfect_tree(2, 1);
        let event = builder.leave(1, 1);
        builder.link_topology(event);

        assert_eq!(
            builder.running_positions(),
            vec![TreePosition::ROOT, TreePosition::new(1, 0)]
        );
        let log = builder.build();
        let cleared = log
            .relationships
            .iter()
            .filter(|r| r.event_id == event && r.object.position.is_none())
            .count();
        // Root loses its adjacent right; 1:1 loses PARENT and ADJACENT_LEFT.
        assert_eq!(cleared, 3);
    }
}
