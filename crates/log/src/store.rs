//! The event log abstraction.

use crate::{
    DataError, EventRecord, GeneralInfo, NodeStateRecord, RelationshipRecord, TrafficRecord,
};

/// Ordered, read-only access to a recorded simulation run.
///
/// Every method returns records ordered by sequence id. Implementations
/// never mutate the underlying store.
pub trait EventLog {
    /// The singleton configuration row.
    fn general_info(&self) -> Result<GeneralInfo, DataError>;

    /// All events, in recording order.
    fn events(&self) -> Result<Vec<EventRecord>, DataError>;

    /// All node lifecycle records.
    fn node_states(&self) -> Result<Vec<NodeStateRecord>, DataError>;

    /// All relationship records.
    fn relationships(&self) -> Result<Vec<RelationshipRecord>, DataError>;

    /// All logged messages. Empty if the run did not log traffic.
    fn traffic(&self) -> Result<Vec<TrafficRecord>, DataError>;
}

/// An event log held in memory.
///
/// Used to script scenarios in tests; records are kept in insertion order
/// and sorted by sequence id on read.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    pub general: Option<GeneralInfo>,
    pub events: Vec<EventRecord>,
    pub node_states: Vec<NodeStateRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub traffic: Vec<TrafficRecord>,
}

impl MemoryEventLog {
    pub fn new(general: GeneralInfo) -> Self {
        Self {
            general: Some(general),
            ..Default::default()
        }
    }
}

impl EventLog for MemoryEventLog {
    fn general_info(&self) -> Result<GeneralInfo, DataError> {
        let mut general = self.general.clone().ok_or(DataError::MissingGeneralInfo)?;
        let positions = self.node_states.iter().filter_map(|r| r.node.position);
        for position in positions {
            general.max_observed_level = general.max_observed_level.max(Some(position.level));
            general.max_observed_number = general.max_observed_number.max(Some(position.number));
        }
        Ok(general)
    }

    fn events(&self) -> Result<Vec<EventRecord>, DataError> {
        let mut events = self.events.clone();
        events.sort_by_key(|e| e.order);
        Ok(events)
    }

    fn node_states(&self) -> Result<Vec<NodeStateRecord>, DataError> {
        let mut states = self.node_states.clone();
        states.sort_by_key(|r| r.id);
        Ok(states)
    }

    fn relationships(&self) -> Result<Vec<RelationshipRecord>, DataError> {
        let mut relationships = self.relationships.clone();
        relationships.sort_by_key(|r| r.id);
        Ok(relationships)
    }

    fn traffic(&self) -> Result<Vec<TrafficRecord>, DataError> {
        let mut traffic = self.traffic.clone();
        traffic.sort_by_key(|r| r.id);
        Ok(traffic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoredNode;
    use minhton_oracle_types::NodeState;

    #[test]
    fn test_missing_general_info() {
        let log = MemoryEventLog::default();
        assert!(matches!(
            log.general_info(),
            Err(DataError::MissingGeneralInfo)
        ));
    }

    #[test]
    fn test_general_info_tracks_observed_extent() {
        let mut log = MemoryEventLog::new(GeneralInfo::new(3, 2));
        for (id, number) in [(2, 1), (1, 0)] {
            log.node_states.push(NodeStateRecord {
                id,
                timestamp_ms: id,
                event_id: 1,
                node: StoredNode::at(1, number, "10.0.0.1", 2000 + id as u16),
                state: NodeState::Running,
            });
        }

        let general = log.general_info().unwrap();
        assert_eq!(general.max_observed_level, Some(1));
        assert_eq!(general.max_observed_number, Some(1));

        let ids: Vec<_> = log.node_states().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
