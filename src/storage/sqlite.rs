//! SQLite artifact store

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{ArtifactStore, PersistedRun, RunSummary, migrations};
use crate::error::{CmError, Result};
use crate::pipeline::{PipelineInputs, RunStatus, SkippedStage, StageArtifact, StageId};

const BUSY_TIMEOUT_MS: u64 = 5_000;

/// SQLite-backed [`ArtifactStore`]. Writes are serialized through one
/// connection; WAL keeps concurrent readers cheap.
pub struct SqliteArtifactStore {
    conn: Mutex<Connection>,
    schema_version: u32,
}

impl std::fmt::Debug for SqliteArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteArtifactStore")
            .field("schema_version", &self.schema_version)
            .finish_non_exhaustive()
    }
}

impl SqliteArtifactStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::configure_pragmas(&conn)?;
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            schema_version,
        })
    }

    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }

    fn next_seq(conn: &Connection, table: &str, run_id: &str) -> Result<i64> {
        let seq: i64 = conn.query_row(
            &format!("SELECT COALESCE(MAX(seq), 0) + 1 FROM {table} WHERE run_id = ?1"),
            [run_id],
            |row| row.get(0),
        )?;
        Ok(seq)
    }

    fn touch(conn: &Connection, run_id: &str, at: DateTime<Utc>) -> Result<()> {
        let changed = conn.execute(
            "UPDATE runs SET updated_at = ?2 WHERE run_id = ?1",
            params![run_id, at.to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(CmError::RunNotFound(run_id.to_string()));
        }
        Ok(())
    }

    fn summary(conn: &Connection, run_id: &str) -> Result<RunSummary> {
        conn.query_row(
            "SELECT r.run_id, r.job_title, r.status_json, r.created_at, r.updated_at, \
             (SELECT COUNT(*) FROM artifacts a WHERE a.run_id = r.run_id AND a.superseded = 0) \
             FROM runs r WHERE r.run_id = ?1",
            [run_id],
            summary_from_row,
        )
        .optional()?
        .ok_or_else(|| CmError::RunNotFound(run_id.to_string()))?
    }
}

impl ArtifactStore for SqliteArtifactStore {
    fn begin_run(&self, run_id: &str, inputs: &PipelineInputs, at: DateTime<Utc>) -> Result<()> {
        let status = RunStatus::Running;
        self.conn.lock().execute(
            "INSERT INTO runs (run_id, job_title, status, status_json, inputs_json, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                run_id,
                inputs.job.title,
                status.label(),
                serde_json::to_string(&status)?,
                serde_json::to_string(inputs)?,
                at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn append(&self, run_id: &str, artifact: &StageArtifact) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let seq = Self::next_seq(&tx, "artifacts", run_id)?;
        tx.execute(
            "INSERT INTO artifacts (run_id, seq, stage_name, stage_index, version, schema_version, \
             timestamp, payload_json, gate_json, superseded) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                seq,
                artifact.stage_name.as_str(),
                artifact.stage_name.index(),
                artifact.version,
                artifact.schema_version,
                artifact.timestamp.to_rfc3339(),
                serde_json::to_string(&artifact.payload)?,
                serde_json::to_string(&artifact.gate_result)?,
                artifact.superseded,
            ],
        )?;
        Self::touch(&tx, run_id, artifact.timestamp)?;
        tx.commit()?;
        Ok(())
    }

    fn record_skip(&self, run_id: &str, skipped: &SkippedStage) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let seq = Self::next_seq(&tx, "skipped_stages", run_id)?;
        tx.execute(
            "INSERT INTO skipped_stages (run_id, seq, stage_name, stage_index, reason) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                seq,
                skipped.stage.as_str(),
                skipped.stage.index(),
                skipped.reason,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn supersede_from(&self, run_id: &str, stage: StageId) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        Self::summary(&tx, run_id)?;
        let artifacts = tx.execute(
            "UPDATE artifacts SET superseded = 1 \
             WHERE run_id = ?1 AND stage_index >= ?2 AND superseded = 0",
            params![run_id, stage.index()],
        )?;
        let skips = tx.execute(
            "UPDATE skipped_stages SET superseded = 1 \
             WHERE run_id = ?1 AND stage_index >= ?2 AND superseded = 0",
            params![run_id, stage.index()],
        )?;
        tx.commit()?;
        Ok(artifacts + skips)
    }

    fn finish(&self, run_id: &str, status: &RunStatus, at: DateTime<Utc>) -> Result<()> {
        let changed = self.conn.lock().execute(
            "UPDATE runs SET status = ?2, status_json = ?3, updated_at = ?4 WHERE run_id = ?1",
            params![
                run_id,
                status.label(),
                serde_json::to_string(status)?,
                at.to_rfc3339()
            ],
        )?;
        if changed == 0 {
            return Err(CmError::RunNotFound(run_id.to_string()));
        }
        Ok(())
    }

    fn load(&self, run_id: &str) -> Result<PersistedRun> {
        let conn = self.conn.lock();
        let summary = Self::summary(&conn, run_id)?;
        let inputs_json: String = conn.query_row(
            "SELECT inputs_json FROM runs WHERE run_id = ?1",
            [run_id],
            |row| row.get(0),
        )?;
        let inputs: PipelineInputs = serde_json::from_str(&inputs_json)?;

        let mut stmt = conn.prepare(
            "SELECT stage_name, version, schema_version, timestamp, payload_json, gate_json, superseded \
             FROM artifacts WHERE run_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map([run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, bool>(6)?,
            ))
        })?;
        let mut artifacts = Vec::new();
        for row in rows {
            let (stage, version, schema_version, timestamp, payload, gate, superseded) = row?;
            artifacts.push(StageArtifact {
                stage_name: stage.parse()?,
                version,
                schema_version,
                timestamp: parse_time(&timestamp)?,
                payload: serde_json::from_str(&payload)?,
                gate_result: serde_json::from_str(&gate)?,
                superseded,
            });
        }

        let mut stmt = conn.prepare(
            "SELECT stage_name, reason FROM skipped_stages \
             WHERE run_id = ?1 AND superseded = 0 ORDER BY seq",
        )?;
        let rows = stmt.query_map([run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut skipped = Vec::new();
        for row in rows {
            let (stage, reason) = row?;
            skipped.push(SkippedStage {
                stage: stage.parse()?,
                reason,
            });
        }

        Ok(PersistedRun {
            summary,
            inputs,
            artifacts,
            skipped,
        })
    }

    fn run_summary(&self, run_id: &str) -> Result<RunSummary> {
        Self::summary(&self.conn.lock(), run_id)
    }

    fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT r.run_id, r.job_title, r.status_json, r.created_at, r.updated_at, \
             (SELECT COUNT(*) FROM artifacts a WHERE a.run_id = r.run_id AND a.superseded = 0) \
             FROM runs r ORDER BY r.updated_at DESC, r.run_id",
        )?;
        let rows = stmt.query_map([], summary_from_row)?;
        let mut runs = Vec::new();
        for row in rows {
            runs.push(row??);
        }
        Ok(runs)
    }
}

/// Row mapper; JSON and timestamp errors surface as the inner result.
fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<Result<RunSummary>> {
    let run_id: String = row.get(0)?;
    let job_title: String = row.get(1)?;
    let status_json: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;
    let artifact_count: i64 = row.get(5)?;
    Ok(build_summary(
        run_id,
        job_title,
        &status_json,
        (&created_at, &updated_at),
        artifact_count,
    ))
}

fn build_summary(
    run_id: String,
    job_title: String,
    status_json: &str,
    (created_at, updated_at): (&str, &str),
    artifact_count: i64,
) -> Result<RunSummary> {
    Ok(RunSummary {
        run_id,
        job_title,
        status: serde_json::from_str(status_json)?,
        created_at: parse_time(created_at)?,
        updated_at: parse_time(updated_at)?,
        artifact_count: usize::try_from(artifact_count).unwrap_or_default(),
    })
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| CmError::Serialization(format!("bad timestamp '{raw}': {err}")))
}
