//! SQLite-backed history: one row per incident, one row per action.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::{schema, HistoryBackend, StorageError};
use crate::detect::incident::iso8601;
use crate::detect::{ActionEntry, AnomalyCategory, IncidentRecord};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

pub struct SqliteBackend {
    pool: Pool,
    path: PathBuf,
}

impl SqliteBackend {
    /// Prepare a pool for the database at `path`.
    ///
    /// Connections (and migrations) are established lazily, so an unreadable
    /// file surfaces on the first `load`/`save` rather than here.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::unavailable(path.display().to_string(), e))?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(|c| {
            c.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = FULL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            schema::migrate(c)
        });

        // The store serializes every write, so one connection is enough.
        let pool = R2D2Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_secs(5))
            .build_unchecked(manager);

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::unavailable(self.location(), e))
    }
}

impl HistoryBackend for SqliteBackend {
    fn load(&self) -> Result<Vec<IncidentRecord>, StorageError> {
        let conn = self.conn()?;
        let (rows, actions) =
            read_rows(&conn).map_err(|e| StorageError::unavailable(self.location(), e))?;

        let mut actions_by_incident: HashMap<i64, Vec<ActionEntry>> = HashMap::new();
        for (incident_id, action, timestamp) in actions {
            let timestamp =
                iso8601::parse(&timestamp).map_err(|e| StorageError::corrupt(self.location(), e))?;
            actions_by_incident
                .entry(incident_id)
                .or_default()
                .push(ActionEntry { action, timestamp });
        }

        let mut incidents = Vec::with_capacity(rows.len());
        for row in rows {
            let id = u64::try_from(row.id).map_err(|e| StorageError::corrupt(self.location(), e))?;
            let timestamp =
                iso8601::parse(&row.timestamp).map_err(|e| StorageError::corrupt(self.location(), e))?;
            incidents.push(IncidentRecord {
                id,
                kind: AnomalyCategory::new(&row.kind),
                confidence: row.confidence,
                timestamp,
                camera_id: row.camera_id,
                location: row.location,
                snapshot_reference: row.snapshot_path,
                actions: actions_by_incident.remove(&row.id).unwrap_or_default(),
            });
        }

        info!(path = %self.path.display(), count = incidents.len(), "Loaded incident history");
        Ok(incidents)
    }

    fn save(&self, incidents: &[IncidentRecord]) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        replace_all(&mut conn, incidents).map_err(|e| StorageError::unavailable(self.location(), e))?;
        debug!(path = %self.path.display(), count = incidents.len(), "Saved incident history");
        Ok(())
    }

    fn location(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

struct IncidentRow {
    id: i64,
    kind: String,
    confidence: f64,
    timestamp: String,
    camera_id: String,
    location: String,
    snapshot_path: String,
}

type ActionRow = (i64, String, String);

fn read_rows(conn: &Connection) -> rusqlite::Result<(Vec<IncidentRow>, Vec<ActionRow>)> {
    let mut stmt = conn.prepare(
        "SELECT id, type, confidence, timestamp, camera_id, location, snapshot_path
         FROM incidents ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(IncidentRow {
                id: row.get(0)?,
                kind: row.get(1)?,
                confidence: row.get(2)?,
                timestamp: row.get(3)?,
                camera_id: row.get(4)?,
                location: row.get(5)?,
                snapshot_path: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT incident_id, action, timestamp FROM incident_actions
         ORDER BY incident_id ASC, seq ASC",
    )?;
    let actions = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, actions))
}

fn replace_all(conn: &mut Connection, incidents: &[IncidentRecord]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM incident_actions", [])?;
    tx.execute("DELETE FROM incidents", [])?;

    {
        let mut insert_incident = tx.prepare(
            "INSERT INTO incidents (id, type, confidence, timestamp, camera_id, location, snapshot_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        let mut insert_action = tx.prepare(
            "INSERT INTO incident_actions (incident_id, seq, action, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for incident in incidents {
            let id = incident.id as i64;
            insert_incident.execute(params![
                id,
                incident.kind.as_str(),
                incident.confidence,
                incident.timestamp.to_rfc3339(),
                incident.camera_id,
                incident.location,
                incident.snapshot_reference,
            ])?;
            for (seq, entry) in incident.actions.iter().enumerate() {
                insert_action.execute(params![
                    id,
                    seq as i64,
                    entry.action,
                    entry.timestamp.to_rfc3339(),
                ])?;
            }
        }
    }

    tx.commit()
}
