//! Snapshot reconstruction.
//!
//! The log is append-only, so "the topology as of event E" is the prefix of
//! each table up to a sequence bound, resolved with last-writer-wins:
//! within a group of records sharing a key, the record with the highest
//! sequence id is authoritative. [`latest_value_by_key`] is the only place
//! that rule is implemented; node states and every relationship kind go
//! through it with different keys.
//!
//! Node-state and relationship records live in separate id spaces, so each
//! table gets its own bound per event.

use crate::{
    DataError, EventId, EventLog, EventRecord, GeneralInfo, NodeStateRecord, Sequenced,
    SequenceId, StoredNode, TrafficRecord,
};
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use minhton_oracle_types::{
    ConfigurationError, Fanout, NeighborRelationship, Node, NodeState, PositionMapper, TreePosition,
};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tracing::{debug, info};

/// Upper bound on sequence ids, inclusive. None means unbounded.
pub type Bound = Option<SequenceId>;

/// Point in the log a snapshot is taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventRef {
    /// After all records of this event.
    Id(EventId),
    /// After every record in the log.
    Final,
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventRef::Id(id) => write!(f, "event {}", id),
            EventRef::Final => write!(f, "final state"),
        }
    }
}

/// Keep, per key, the record with the highest sequence id at or below
/// `bound`.
///
/// Records for which `key` returns None are ignored. The result preserves
/// the order in which keys were first seen.
pub fn latest_value_by_key<'a, R, K, F>(
    records: &'a [R],
    bound: Bound,
    key: F,
) -> IndexMap<K, &'a R>
where
    R: Sequenced,
    K: Hash + Eq,
    F: Fn(&R) -> Option<K>,
{
    let mut latest: IndexMap<K, &'a R> = IndexMap::new();
    for record in records {
        if bound.is_some_and(|bound| record.sequence_id() > bound) {
            continue;
        }
        let Some(key) = key(record) else {
            continue;
        };
        match latest.entry(key) {
            Entry::Occupied(mut entry) => {
                if record.sequence_id() >= entry.get().sequence_id() {
                    entry.insert(record);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
        }
    }
    latest
}

/// A node-state record with its node resolved.
#[derive(Debug, Clone)]
struct StateEntry {
    id: SequenceId,
    node: Option<Node>,
    state: NodeState,
}

impl Sequenced for StateEntry {
    fn sequence_id(&self) -> SequenceId {
        self.id
    }
}

/// A relationship record with both ends resolved.
#[derive(Debug, Clone)]
struct RelationshipEntry {
    id: SequenceId,
    subject: Option<Node>,
    /// None clears the relationship.
    object: Option<Node>,
}

impl Sequenced for RelationshipEntry {
    fn sequence_id(&self) -> SequenceId {
        self.id
    }
}

/// Resolved value of one relationship kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// At most one related node per subject.
    Single(IndexMap<Node, Node>),
    /// Any number of related nodes per subject.
    Multi(IndexMap<Node, Vec<Node>>),
}

impl Relation {
    pub fn is_empty(&self) -> bool {
        match self {
            Relation::Single(map) => map.is_empty(),
            Relation::Multi(map) => map.is_empty(),
        }
    }
}

/// Everything the validators need about one point in the log.
///
/// Relationship maps are restricted to live nodes: parent, child and
/// routing-table entries keep only pairs whose both ends exist; adjacency
/// entries keep every existing subject.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub event: EventRef,
    pub fanout: Fanout,
    pub existing: IndexSet<Node>,
    /// Deepest level among existing nodes.
    pub max_level: Option<u32>,
    pub parent_of: IndexMap<Node, Node>,
    pub children_of: IndexMap<Node, Vec<Node>>,
    pub adjacent_left_of: IndexMap<Node, Node>,
    pub adjacent_right_of: IndexMap<Node, Node>,
    pub routing_neighbors_of: IndexMap<Node, Vec<Node>>,
    pub routing_neighbor_children_of: IndexMap<Node, Vec<Node>>,
}

impl Snapshot {
    pub fn network_size(&self) -> usize {
        self.existing.len()
    }

    /// Whether no relationship of any kind is present.
    pub fn has_no_relationships(&self) -> bool {
        self.parent_of.is_empty()
            && self.children_of.is_empty()
            && self.adjacent_left_of.is_empty()
            && self.adjacent_right_of.is_empty()
            && self.routing_neighbors_of.is_empty()
            && self.routing_neighbor_children_of.is_empty()
    }
}

/// Deepest level among `nodes`.
pub fn max_level<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Option<u32> {
    nodes.into_iter().map(Node::level).max()
}

/// Reconstructs snapshots from a fully loaded event log.
///
/// The log is read once at construction; afterwards the reader is
/// immutable and can be shared across threads.
#[derive(Debug)]
pub struct SnapshotReader {
    general: GeneralInfo,
    position_scale: i64,
    events: Vec<EventRecord>,
    node_state_records: Vec<NodeStateRecord>,
    traffic: Vec<TrafficRecord>,
    states: Vec<StateEntry>,
    /// Relationship records per kind, each in sequence order.
    relationships: HashMap<NeighborRelationship, Vec<RelationshipEntry>>,
    state_bounds: HashMap<EventId, SequenceId>,
    relationship_bounds: HashMap<EventId, SequenceId>,
}

impl SnapshotReader {
    /// Read every table of `log` and resolve node positions.
    pub fn load<L: EventLog + ?Sized>(log: &L, position_scale: i64) -> Result<Self, DataError> {
        let general = log.general_info()?;
        let mut mapper = PositionMapper::new(general.fanout, position_scale)?;

        let events = log.events()?;
        let node_state_records = log.node_states()?;
        let relationship_records = log.relationships()?;
        let traffic = log.traffic()?;

        let states = node_state_records
            .iter()
            .map(|record| {
                Ok(StateEntry {
                    id: record.id,
                    node: resolve(&record.node, &mut mapper, general.fanout)?,
                    state: record.state,
                })
            })
            .collect::<Result<Vec<_>, DataError>>()?;

        let mut unknown = 0usize;
        let mut relationships: HashMap<NeighborRelationship, Vec<RelationshipEntry>> =
            HashMap::new();
        for record in &relationship_records {
            if record.kind == NeighborRelationship::Unknown {
                unknown += 1;
                continue;
            }
            relationships
                .entry(record.kind)
                .or_default()
                .push(RelationshipEntry {
                    id: record.id,
                    subject: resolve(&record.subject, &mut mapper, general.fanout)?,
                    object: resolve(&record.object, &mut mapper, general.fanout)?,
                });
        }
        if unknown > 0 {
            debug!(count = unknown, "Ignoring relationship records of unknown kind");
        }

        let state_bounds = event_bounds(
            &events,
            node_state_records.iter().map(|r| (r.event_id, r.id)),
        );
        let relationship_bounds = event_bounds(
            &events,
            relationship_records.iter().map(|r| (r.event_id, r.id)),
        );

        info!(
            fanout = general.fanout,
            events = events.len(),
            node_states = states.len(),
            relationships = relationship_records.len() - unknown,
            traffic = traffic.len(),
            positions = mapper.cached(),
            "Loaded event log"
        );

        Ok(Self {
            general,
            position_scale,
            events,
            node_state_records,
            traffic,
            states,
            relationships,
            state_bounds,
            relationship_bounds,
        })
    }

    pub fn general(&self) -> &GeneralInfo {
        &self.general
    }

    pub fn fanout(&self) -> Fanout {
        self.general.fanout
    }

    pub fn position_scale(&self) -> i64 {
        self.position_scale
    }

    /// Events in recording order.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn node_state_records(&self) -> &[NodeStateRecord] {
        &self.node_state_records
    }

    pub fn traffic(&self) -> &[TrafficRecord] {
        &self.traffic
    }

    /// Node-state bound for `event`.
    pub fn state_bound(&self, event: EventRef) -> Result<Bound, DataError> {
        lookup_bound(&self.state_bounds, event)
    }

    /// Relationship bound for `event`.
    pub fn relationship_bound(&self, event: EventRef) -> Result<Bound, DataError> {
        lookup_bound(&self.relationship_bounds, event)
    }

    /// Nodes whose latest state at `event` is RUNNING.
    pub fn existing_nodes(&self, event: EventRef) -> Result<IndexSet<Node>, DataError> {
        let bound = self.state_bound(event)?;
        let latest = latest_value_by_key(&self.states, bound, |entry| entry.node.clone());
        Ok(latest
            .into_iter()
            .filter(|(_, entry)| entry.state == NodeState::Running)
            .map(|(node, _)| node)
            .collect())
    }

    /// Resolved value of one relationship kind at `event`, without the
    /// live-node restriction.
    ///
    /// Clearing records are dropped after resolution, so a slot that was
    /// cleared last has no entry. Placeholder objects are dropped too,
    /// except as adjacent neighbors, where they stand in for an empty
    /// position next to the subject.
    pub fn relationship_snapshot(
        &self,
        event: EventRef,
        kind: NeighborRelationship,
    ) -> Result<Relation, DataError> {
        let bound = self.relationship_bound(event)?;
        if kind.is_multi_valued() {
            Ok(Relation::Multi(self.multi_valued(bound, kind)))
        } else {
            Ok(Relation::Single(self.single_valued(bound, kind)))
        }
    }

    fn entries(&self, kind: NeighborRelationship) -> &[RelationshipEntry] {
        self.relationships
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn single_valued(&self, bound: Bound, kind: NeighborRelationship) -> IndexMap<Node, Node> {
        let latest = latest_value_by_key(self.entries(kind), bound, |entry| {
            entry.subject.as_ref().map(Node::position)
        });
        let keeps_placeholders = matches!(
            kind,
            NeighborRelationship::AdjacentLeft | NeighborRelationship::AdjacentRight
        );

        let mut resolved = IndexMap::new();
        for entry in latest.values() {
            if let (Some(subject), Some(object)) = (&entry.subject, &entry.object) {
                if keeps_placeholders || !object.is_placeholder() {
                    resolved.insert(subject.clone(), object.clone());
                }
            }
        }
        resolved
    }

    fn multi_valued(&self, bound: Bound, kind: NeighborRelationship) -> IndexMap<Node, Vec<Node>> {
        let latest = latest_value_by_key(
            self.entries(kind),
            bound,
            |entry| -> Option<(TreePosition, TreePosition)> {
                let subject = entry.subject.as_ref()?;
                let object = entry.object.as_ref()?;
                Some((subject.position(), object.position()))
            },
        );

        let mut resolved: IndexMap<Node, Vec<Node>> = IndexMap::new();
        for entry in latest.values() {
            if let (Some(subject), Some(object)) = (&entry.subject, &entry.object) {
                if !object.is_placeholder() {
                    resolved
                        .entry(subject.clone())
                        .or_default()
                        .push(object.clone());
                }
            }
        }
        resolved
    }

    /// Full snapshot at `event`, restricted to live nodes.
    pub fn snapshot(&self, event: EventRef) -> Result<Snapshot, DataError> {
        let existing = self.existing_nodes(event)?;
        let bound = self.relationship_bound(event)?;

        let both_live = |map: IndexMap<Node, Node>| -> IndexMap<Node, Node> {
            map.into_iter()
                .filter(|(subject, object)| existing.contains(subject) && existing.contains(object))
                .collect()
        };
        let subject_live = |map: IndexMap<Node, Node>| -> IndexMap<Node, Node> {
            map.into_iter()
                .filter(|(subject, _)| existing.contains(subject))
                .collect()
        };
        let all_live = |map: IndexMap<Node, Vec<Node>>| -> IndexMap<Node, Vec<Node>> {
            map.into_iter()
                .filter(|(subject, _)| existing.contains(subject))
                .filter_map(|(subject, objects)| {
                    let objects: Vec<Node> = objects
                        .into_iter()
                        .filter(|object| existing.contains(object))
                        .collect();
                    (!objects.is_empty()).then_some((subject, objects))
                })
                .collect()
        };

        let parent_of = both_live(self.single_valued(bound, NeighborRelationship::Parent));
        let children_of = all_live(self.multi_valued(bound, NeighborRelationship::Child));
        let adjacent_left_of =
            subject_live(self.single_valued(bound, NeighborRelationship::AdjacentLeft));
        let adjacent_right_of =
            subject_live(self.single_valued(bound, NeighborRelationship::AdjacentRight));
        let routing_neighbors_of = all_live(
            self.multi_valued(bound, NeighborRelationship::RoutingTableNeighbor),
        );
        let routing_neighbor_children_of = all_live(
            self.multi_valued(bound, NeighborRelationship::RoutingTableNeighborChild),
        );

        Ok(Snapshot {
            event,
            fanout: self.fanout(),
            max_level: max_level(&existing),
            existing,
            parent_of,
            children_of,
            adjacent_left_of,
            adjacent_right_of,
            routing_neighbors_of,
            routing_neighbor_children_of,
        })
    }
}

/// Resolve a stored node, rejecting positions that do not exist in a tree
/// of `fanout`.
fn resolve(
    node: &StoredNode,
    mapper: &mut PositionMapper,
    fanout: Fanout,
) -> Result<Option<Node>, DataError> {
    let Some(position) = node.position else {
        return Ok(None);
    };
    if !position.is_valid(fanout) {
        return Err(ConfigurationError::InvalidPosition {
            level: i64::from(position.level),
            number: i64::try_from(position.number).unwrap_or(i64::MAX),
            fanout,
        }
        .into());
    }
    Ok(Some(Node::new(position, node.peer.clone(), mapper)))
}

/// Bound per event for one table.
///
/// An event's bound is the highest sequence id among its own records. An
/// event without records inherits the bound of the nearest earlier event
/// that has some, and 0 (empty prefix) if there is none.
fn event_bounds(
    events: &[EventRecord],
    records: impl Iterator<Item = (EventId, SequenceId)>,
) -> HashMap<EventId, SequenceId> {
    let mut highest: HashMap<EventId, SequenceId> = HashMap::new();
    for (event_id, id) in records {
        highest
            .entry(event_id)
            .and_modify(|current| *current = (*current).max(id))
            .or_insert(id);
    }

    let mut bounds = HashMap::with_capacity(events.len());
    let mut carried: SequenceId = 0;
    for event in events {
        if let Some(&bound) = highest.get(&event.event_id) {
            carried = bound;
        }
        bounds.entry(event.event_id).or_insert(carried);
    }
    bounds
}

fn lookup_bound(
    bounds: &HashMap<EventId, SequenceId>,
    event: EventRef,
) -> Result<Bound, DataError> {
    match event {
        EventRef::Final => Ok(None),
        EventRef::Id(id) => bounds
            .get(&id)
            .copied()
            .map(Some)
            .ok_or(DataError::UnknownEvent(id)),
    }
}
