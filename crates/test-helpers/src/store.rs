//! On-disk store fixtures.

use minhton_oracle_log::{EventLog, MemoryEventLog, StoredNode};
use minhton_oracle_types::PeerAddress;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE General (
        StartTime_ut INTEGER, StopTime_ut INTEGER, NumberOfNodes INTEGER,
        NumberOfEvents INTEGER, Fanout INTEGER, Exception TEXT, Config TEXT
    );
    CREATE TABLE Event (
        Id INTEGER PRIMARY KEY, Uuid INTEGER, Timestamp_ms INTEGER,
        Type INTEGER, ApplicationUuid INTEGER
    );
    CREATE TABLE MinhtonNode (
        PositionUuid INTEGER PRIMARY KEY, ApplicationUuid INTEGER,
        Level INTEGER, Number INTEGER, Fanout INTEGER
    );
    CREATE TABLE MinhtonPhysicalNodeInfo (
        ApplicationUuid INTEGER PRIMARY KEY, Ip TEXT, Port INTEGER
    );
    CREATE TABLE MinhtonNodeState (
        Id INTEGER PRIMARY KEY, PositionUuid INTEGER, Timestamp_ms INTEGER,
        State INTEGER, EventId INTEGER
    );
    CREATE TABLE MinhtonRoutingInfo (
        Id INTEGER PRIMARY KEY, Timestamp_ms INTEGER, EventId INTEGER,
        NodeUuid INTEGER, NeighborNodeUuid INTEGER, Relationship INTEGER
    );
    CREATE TABLE MinhtonTraffic (
        Id INTEGER PRIMARY KEY, Timestamp_ms INTEGER, MsgType INTEGER, Mode INTEGER,
        EventId INTEGER, RefEventId INTEGER, SenderNodeUuid INTEGER, TargetNodeUuid INTEGER
    );
";

/// Assigns row ids to node references the way the logger does: one
/// `MinhtonNode` row per distinct (position, peer), one
/// `MinhtonPhysicalNodeInfo` row per distinct peer.
struct NodeRows<'c> {
    conn: &'c Connection,
    fanout: i64,
    positions: HashMap<StoredNode, i64>,
    applications: HashMap<PeerAddress, i64>,
}

impl<'c> NodeRows<'c> {
    fn uuid(&mut self, node: &StoredNode) -> rusqlite::Result<i64> {
        if let Some(&uuid) = self.positions.get(node) {
            return Ok(uuid);
        }

        let application = match &node.peer {
            Some(peer) => Some(self.application(peer)?),
            None => None,
        };
        let uuid = self.positions.len() as i64 + 1;
        self.conn.execute(
            "INSERT INTO MinhtonNode (PositionUuid, ApplicationUuid, Level, Number, Fanout)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                uuid,
                application,
                node.position.map(|p| p.level as i64),
                node.position.map(|p| p.number as i64),
                self.fanout,
            ],
        )?;
        self.positions.insert(node.clone(), uuid);
        Ok(uuid)
    }

    fn application(&mut self, peer: &PeerAddress) -> rusqlite::Result<i64> {
        if let Some(&uuid) = self.applications.get(peer) {
            return Ok(uuid);
        }
        let uuid = self.applications.len() as i64 + 1;
        self.conn.execute(
            "INSERT INTO MinhtonPhysicalNodeInfo (ApplicationUuid, Ip, Port) VALUES (?1, ?2, ?3)",
            params![uuid, peer.host, peer.port],
        )?;
        self.applications.insert(peer.clone(), uuid);
        Ok(uuid)
    }
}

/// Write `log` to a new SQLite store at `path` in the logger's layout.
///
/// Panics if `log` has no general info.
pub fn write_sqlite_store(path: &Path, log: &MemoryEventLog) -> rusqlite::Result<()> {
    let general = log
        .general_info()
        .expect("scripted logs always carry general info");
    let mut conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO General (StartTime_ut, StopTime_ut, NumberOfNodes, NumberOfEvents, Fanout)
         VALUES (0, 0, ?1, ?2, ?3)",
        params![
            general.number_of_nodes as i64,
            log.events.len() as i64,
            general.fanout
        ],
    )?;

    for event in &log.events {
        tx.execute(
            "INSERT INTO Event (Id, Uuid, Timestamp_ms, Type) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.order,
                event.event_id as i64,
                event.timestamp_ms,
                event.event_type.code()
            ],
        )?;
    }

    let mut nodes = NodeRows {
        conn: &*tx,
        fanout: general.fanout as i64,
        positions: HashMap::new(),
        applications: HashMap::new(),
    };

    for record in &log.node_states {
        let node = nodes.uuid(&record.node)?;
        tx.execute(
            "INSERT INTO MinhtonNodeState (Id, PositionUuid, Timestamp_ms, State, EventId)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                node,
                record.timestamp_ms,
                record.state.code(),
                record.event_id as i64
            ],
        )?;
    }

    for record in &log.relationships {
        let subject = nodes.uuid(&record.subject)?;
        let object = nodes.uuid(&record.object)?;
        tx.execute(
            "INSERT INTO MinhtonRoutingInfo
                 (Id, Timestamp_ms, EventId, NodeUuid, NeighborNodeUuid, Relationship)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.timestamp_ms,
                record.event_id as i64,
                subject,
                object,
                record.kind.code()
            ],
        )?;
    }

    for record in &log.traffic {
        let sender = nodes.uuid(&record.sender)?;
        let target = nodes.uuid(&record.target)?;
        tx.execute(
            "INSERT INTO MinhtonTraffic
                 (Id, Timestamp_ms, MsgType, Mode, EventId, RefEventId, SenderNodeUuid, TargetNodeUuid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.timestamp_ms,
                record.message_type.code(),
                record.mode.code(),
                record.event_id as i64,
                record.ref_event_id as i64,
                sender,
                target
            ],
        )?;
    }

    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogBuilder;
    use minhton_oracle_log::SqliteEventLog;

    #[test]
    fn test_written_store_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perfect.db");
        let log = LogBuilder::perfect_tree(3, 1).build();
        write_sqlite_store(&path, &log).unwrap();

        let store = SqliteEventLog::open(&path).unwrap();
        assert_eq!(store.general_info().unwrap().number_of_nodes, 4);
        assert_eq!(store.events().unwrap(), log.events().unwrap());
        assert_eq!(store.node_states().unwrap(), log.node_states().unwrap());
        assert_eq!(store.relationships().unwrap(), log.relationships().unwrap());
        assert_eq!(store.traffic().unwrap(), log.traffic().unwrap());
    }
}
