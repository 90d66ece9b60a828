//! SQLite-backed event log.
//!
//! Reads the tables written by the simulation logger. The connection is
//! opened read-only and lives exactly as long as the [`SqliteEventLog`];
//! drop it to release the file.

use crate::records::position_from_columns;
use crate::{
    DataError, EventLog, EventRecord, GeneralInfo, NodeStateRecord, RelationshipRecord,
    StoredNode, TrafficRecord,
};
use minhton_oracle_types::{
    ConfigurationError, EventType, Fanout, MessageMode, MessageType, NeighborRelationship,
    NodeState, PeerAddress,
};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of event stores.
pub const STORE_EXTENSION: &str = "db";

const NODE_STATE_QUERY: &str = "
    SELECT s.Id, s.Timestamp_ms, s.EventId, s.State,
           n.Level, n.Number, p.Ip, p.Port
    FROM MinhtonNodeState AS s
    LEFT JOIN MinhtonNode AS n ON s.PositionUuid = n.PositionUuid
    LEFT JOIN MinhtonPhysicalNodeInfo AS p ON n.ApplicationUuid = p.ApplicationUuid
    ORDER BY s.Id";

const RELATIONSHIP_QUERY: &str = "
    SELECT r.Id, r.Timestamp_ms, r.EventId, r.Relationship,
           n1.Level, n1.Number, p1.Ip, p1.Port,
           n2.Level, n2.Number, p2.Ip, p2.Port
    FROM MinhtonRoutingInfo AS r
    LEFT JOIN MinhtonNode AS n1 ON r.NodeUuid = n1.PositionUuid
    LEFT JOIN MinhtonPhysicalNodeInfo AS p1 ON n1.ApplicationUuid = p1.ApplicationUuid
    LEFT JOIN MinhtonNode AS n2 ON r.NeighborNodeUuid = n2.PositionUuid
    LEFT JOIN MinhtonPhysicalNodeInfo AS p2 ON n2.ApplicationUuid = p2.ApplicationUuid
    ORDER BY r.Id";

const TRAFFIC_QUERY: &str = "
    SELECT t.Id, t.Timestamp_ms, t.MsgType, t.Mode, t.EventId, t.RefEventId,
           n1.Level, n1.Number, p1.Ip, p1.Port,
           n2.Level, n2.Number, p2.Ip, p2.Port
    FROM MinhtonTraffic AS t
    LEFT JOIN MinhtonNode AS n1 ON t.SenderNodeUuid = n1.PositionUuid
    LEFT JOIN MinhtonPhysicalNodeInfo AS p1 ON n1.ApplicationUuid = p1.ApplicationUuid
    LEFT JOIN MinhtonNode AS n2 ON t.TargetNodeUuid = n2.PositionUuid
    LEFT JOIN MinhtonPhysicalNodeInfo AS p2 ON n2.ApplicationUuid = p2.ApplicationUuid
    ORDER BY t.Id";

/// Whether `path` looks like an event store file.
pub fn is_store_file(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(STORE_EXTENSION)
}

/// A read-only handle on one event store file.
pub struct SqliteEventLog {
    path: PathBuf,
    conn: Connection,
}

impl std::fmt::Debug for SqliteEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEventLog")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteEventLog {
    /// Open a store read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !is_store_file(path) {
            return Err(DataError::NotAStoreFile(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!(path = %path.display(), "Opened event store");

        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `sql` and map the first row, if any.
    pub fn fetch_one<T, F>(&self, sql: &str, map: F) -> Result<Option<T>, DataError>
    where
        F: FnOnce(&Row<'_>) -> Result<T, DataError>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(map(row)?)),
            None => Ok(None),
        }
    }

    /// Run `sql` and map every row.
    pub fn fetch_all<T, F>(&self, sql: &str, mut map: F) -> Result<Vec<T>, DataError>
    where
        F: FnMut(&Row<'_>) -> Result<T, DataError>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(map(row)?);
        }
        Ok(out)
    }

    /// Whether a table or view exists.
    pub fn has_table(&self, name: &str) -> Result<bool, DataError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Tables that resolve node references must exist whenever a table
    /// referencing nodes does.
    fn require_node_tables(&self) -> Result<(), DataError> {
        for table in ["MinhtonNode", "MinhtonPhysicalNodeInfo"] {
            if !self.has_table(table)? {
                return Err(DataError::MissingTable(table));
            }
        }
        Ok(())
    }

    fn fanout(&self) -> Result<Fanout, DataError> {
        self.general_row().map(|(_, fanout)| fanout)
    }

    fn general_row(&self) -> Result<(u64, Fanout), DataError> {
        if !self.has_table("General")? {
            return Err(DataError::MissingTable("General"));
        }

        let row = self.fetch_one("SELECT NumberOfNodes, Fanout FROM General LIMIT 1", |row| {
            let nodes: Option<i64> = row.get(0)?;
            let fanout: Option<i64> = row.get(1)?;
            Ok((nodes, fanout))
        })?;

        let (nodes, fanout) = match row {
            Some((nodes, Some(fanout))) => (nodes, fanout),
            _ => return Err(DataError::MissingGeneralInfo),
        };

        let fanout = Fanout::try_from(fanout).map_err(|_| DataError::MalformedRow {
            table: "General",
            reason: format!("fanout {} out of range", fanout),
        })?;
        if fanout < 2 {
            return Err(ConfigurationError::InvalidFanout(fanout).into());
        }

        let nodes = nodes
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| DataError::MalformedRow {
                table: "General",
                reason: "NumberOfNodes is missing or negative".to_string(),
            })?;

        Ok((nodes, fanout))
    }
}

fn event_id_from_value(value: Value, table: &'static str) -> Result<u64, DataError> {
    let parsed = match &value {
        Value::Integer(id) => u64::try_from(*id).ok(),
        Value::Text(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| DataError::MalformedRow {
        table,
        reason: format!("event id {:?} is not a non-negative integer", value),
    })
}

/// Read a node reference from four consecutive columns
/// (level, number, ip, port) starting at `first`.
fn stored_node(
    row: &Row<'_>,
    first: usize,
    fanout: Fanout,
    table: &'static str,
) -> Result<StoredNode, DataError> {
    let level: Option<i64> = row.get(first)?;
    let number: Option<i64> = row.get(first + 1)?;
    let ip: Option<String> = row.get(first + 2)?;
    let port: Option<i64> = row.get(first + 3)?;

    let position = position_from_columns(level, number, fanout)?;
    let peer = match (ip, port) {
        (Some(ip), Some(port)) => {
            let port = u16::try_from(port).map_err(|_| DataError::MalformedRow {
                table,
                reason: format!("port {} out of range", port),
            })?;
            Some(PeerAddress::new(ip, port))
        }
        _ => None,
    };
    Ok(StoredNode::new(position, peer))
}

impl EventLog for SqliteEventLog {
    fn general_info(&self) -> Result<GeneralInfo, DataError> {
        let (nodes, fanout) = self.general_row()?;
        let mut general = GeneralInfo::new(nodes, fanout);

        if self.has_table("MinhtonNode")? {
            let extent = self.fetch_one("SELECT MAX(Level), MAX(Number) FROM MinhtonNode", |row| {
                let level: Option<i64> = row.get(0)?;
                let number: Option<i64> = row.get(1)?;
                Ok((level, number))
            })?;
            if let Some((level, number)) = extent {
                general.max_observed_level = level.and_then(|l| u32::try_from(l).ok());
                general.max_observed_number = number.and_then(|n| u64::try_from(n).ok());
            }
        }

        Ok(general)
    }

    fn events(&self) -> Result<Vec<EventRecord>, DataError> {
        if !self.has_table("Event")? {
            return Err(DataError::MissingTable("Event"));
        }

        self.fetch_all(
            "SELECT Id, Uuid, Timestamp_ms, Type FROM Event ORDER BY Id",
            |row| {
                Ok(EventRecord {
                    order: row.get(0)?,
                    event_id: event_id_from_value(row.get(1)?, "Event")?,
                    timestamp_ms: row.get(2)?,
                    event_type: EventType::from_code(row.get(3)?),
                })
            },
        )
    }

    fn node_states(&self) -> Result<Vec<NodeStateRecord>, DataError> {
        if !self.has_table("MinhtonNodeState")? {
            return Ok(Vec::new());
        }
        self.require_node_tables()?;
        let fanout = self.fanout()?;

        self.fetch_all(NODE_STATE_QUERY, |row| {
            let code: i64 = row.get(3)?;
            let state = NodeState::from_code(code).ok_or_else(|| DataError::MalformedRow {
                table: "MinhtonNodeState",
                reason: format!("unknown state {}", code),
            })?;
            Ok(NodeStateRecord {
                id: row.get(0)?,
                timestamp_ms: row.get(1)?,
                event_id: event_id_from_value(row.get(2)?, "MinhtonNodeState")?,
                state,
                node: stored_node(row, 4, fanout, "MinhtonNodeState")?,
            })
        })
    }

    fn relationships(&self) -> Result<Vec<RelationshipRecord>, DataError> {
        if !self.has_table("MinhtonRoutingInfo")? {
            return Ok(Vec::new());
        }
        self.require_node_tables()?;
        let fanout = self.fanout()?;

        self.fetch_all(RELATIONSHIP_QUERY, |row| {
            let code: i64 = row.get(3)?;
            let kind = NeighborRelationship::from_code(code).ok_or_else(|| {
                DataError::MalformedRow {
                    table: "MinhtonRoutingInfo",
                    reason: format!("unknown relationship {}", code),
                }
            })?;
            Ok(RelationshipRecord {
                id: row.get(0)?,
                timestamp_ms: row.get(1)?,
                event_id: event_id_from_value(row.get(2)?, "MinhtonRoutingInfo")?,
                kind,
                subject: stored_node(row, 4, fanout, "MinhtonRoutingInfo")?,
                object: stored_node(row, 8, fanout, "MinhtonRoutingInfo")?,
            })
        })
    }

    fn traffic(&self) -> Result<Vec<TrafficRecord>, DataError> {
        if !self.has_table("MinhtonTraffic")? {
            return Ok(Vec::new());
        }
        self.require_node_tables()?;
        let fanout = self.fanout()?;

        self.fetch_all(TRAFFIC_QUERY, |row| {
            let mode_code: i64 = row.get(3)?;
            let mode = MessageMode::from_code(mode_code).ok_or_else(|| DataError::MalformedRow {
                table: "MinhtonTraffic",
                reason: format!("unknown mode {}", mode_code),
            })?;
            Ok(TrafficRecord {
                id: row.get(0)?,
                timestamp_ms: row.get(1)?,
                message_type: MessageType::from_code(row.get(2)?),
                mode,
                event_id: event_id_from_value(row.get(4)?, "MinhtonTraffic")?,
                ref_event_id: event_id_from_value(row.get(5)?, "MinhtonTraffic")?,
                sender: stored_node(row, 6, fanout, "MinhtonTraffic")?,
                target: stored_node(row, 10, fanout, "MinhtonTraffic")?,
            })
        })
    }
}
