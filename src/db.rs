// 🗄️ Run History Store - SQLite persistence for processing runs
// One summary row per run plus that run's flagged addresses, so past
// runs can be listed and reviewed after the fact

use crate::aggregator::CategoryResult;
use crate::engine::FlagEntry;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

// ============================================================================
// RUN SUMMARY
// ============================================================================

/// RunSummary - One completed processing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Stable identity (UUID), assigned when the run is recorded
    pub id: String,

    /// Input file the run processed
    pub source_file: String,

    /// SHA-256 fingerprint of the input file's bytes
    pub source_hash: String,

    /// RFC 3339 timestamp (UTC)
    pub created_at: String,

    pub total: usize,
    pub public_count: usize,
    pub commercial_count: usize,
    pub competitive_count: usize,
    pub other_count: usize,
    pub roe_count: usize,
    pub remove_count: usize,
    pub flagged_count: usize,
}

impl RunSummary {
    /// Build a summary row for a finished run
    pub fn from_result(source_file: &str, source_hash: &str, result: &CategoryResult) -> Self {
        RunSummary {
            id: uuid::Uuid::new_v4().to_string(),
            source_file: source_file.to_string(),
            source_hash: source_hash.to_string(),
            created_at: Utc::now().to_rfc3339(),
            total: result.all.len(),
            public_count: result.public.len(),
            commercial_count: result.commercial.len(),
            competitive_count: result.competitive.len(),
            other_count: result.other.len(),
            roe_count: result.roe_kept_count(),
            remove_count: result.remove.len(),
            flagged_count: result.flagged.len(),
        }
    }
}

/// FlaggedRow - One flagged address as stored for review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaggedRow {
    pub record_id: String,
    pub street_address: String,
    pub unit_number: Option<String>,
    pub building_type: String,
    pub subname: String,
    pub reason: String,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("Failed to enable WAL mode")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS runs (
            id TEXT PRIMARY KEY,
            source_file TEXT NOT NULL,
            source_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            total INTEGER NOT NULL,
            public_count INTEGER NOT NULL,
            commercial_count INTEGER NOT NULL,
            competitive_count INTEGER NOT NULL,
            other_count INTEGER NOT NULL,
            roe_count INTEGER NOT NULL,
            remove_count INTEGER NOT NULL,
            flagged_count INTEGER NOT NULL
        )",
        [],
    )
    .context("Failed to create runs table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS flagged (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL REFERENCES runs(id),
            record_id TEXT NOT NULL,
            street_address TEXT NOT NULL,
            unit_number TEXT,
            building_type TEXT NOT NULL,
            subname TEXT NOT NULL,
            reason TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create flagged table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_flagged_run ON flagged(run_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_flagged_subname ON flagged(run_id, subname)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITES
// ============================================================================

/// Record a completed run and its flagged addresses
pub fn insert_run(conn: &Connection, run: &RunSummary, flagged: &[FlagEntry]) -> Result<()> {
    conn.execute(
        "INSERT INTO runs (
            id, source_file, source_hash, created_at, total,
            public_count, commercial_count, competitive_count, other_count,
            roe_count, remove_count, flagged_count
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            run.id,
            run.source_file,
            run.source_hash,
            run.created_at,
            run.total as i64,
            run.public_count as i64,
            run.commercial_count as i64,
            run.competitive_count as i64,
            run.other_count as i64,
            run.roe_count as i64,
            run.remove_count as i64,
            run.flagged_count as i64,
        ],
    )
    .context("Failed to insert run")?;

    for entry in flagged {
        conn.execute(
            "INSERT INTO flagged (
                run_id, record_id, street_address, unit_number,
                building_type, subname, reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run.id,
                entry.record.id,
                entry.record.street_address,
                entry.record.unit_number,
                entry.record.category.name(),
                entry.record.subname,
                entry.reason,
            ],
        )
        .context("Failed to insert flagged address")?;
    }

    Ok(())
}

// ============================================================================
// READS
// ============================================================================

const RUN_COLUMNS: &str = "id, source_file, source_hash, created_at, total, \
     public_count, commercial_count, competitive_count, other_count, \
     roe_count, remove_count, flagged_count";

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunSummary> {
    Ok(RunSummary {
        id: row.get(0)?,
        source_file: row.get(1)?,
        source_hash: row.get(2)?,
        created_at: row.get(3)?,
        total: row.get::<_, i64>(4)? as usize,
        public_count: row.get::<_, i64>(5)? as usize,
        commercial_count: row.get::<_, i64>(6)? as usize,
        competitive_count: row.get::<_, i64>(7)? as usize,
        other_count: row.get::<_, i64>(8)? as usize,
        roe_count: row.get::<_, i64>(9)? as usize,
        remove_count: row.get::<_, i64>(10)? as usize,
        flagged_count: row.get::<_, i64>(11)? as usize,
    })
}

/// All runs, newest first
pub fn get_runs(conn: &Connection) -> Result<Vec<RunSummary>> {
    let sql = format!("SELECT {} FROM runs ORDER BY created_at DESC", RUN_COLUMNS);
    let mut stmt = conn.prepare(&sql).context("Failed to prepare runs query")?;

    let runs = stmt
        .query_map([], run_from_row)
        .context("Failed to query runs")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read runs")?;

    Ok(runs)
}

pub fn get_run(conn: &Connection, run_id: &str) -> Result<Option<RunSummary>> {
    let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
    conn.query_row(&sql, params![run_id], run_from_row)
        .optional()
        .context("Failed to query run")
}

fn flagged_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FlaggedRow> {
    Ok(FlaggedRow {
        record_id: row.get(0)?,
        street_address: row.get(1)?,
        unit_number: row.get(2)?,
        building_type: row.get(3)?,
        subname: row.get(4)?,
        reason: row.get(5)?,
    })
}

/// Flagged addresses for one run, in insertion order
pub fn get_flagged_for_run(conn: &Connection, run_id: &str) -> Result<Vec<FlaggedRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT record_id, street_address, unit_number, building_type, subname, reason
             FROM flagged WHERE run_id = ?1 ORDER BY id",
        )
        .context("Failed to prepare flagged query")?;

    let rows = stmt
        .query_map(params![run_id], flagged_from_row)
        .context("Failed to query flagged addresses")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read flagged addresses")?;

    Ok(rows)
}

/// Flagged addresses for one community within a run
pub fn get_flagged_for_community(
    conn: &Connection,
    run_id: &str,
    subname: &str,
) -> Result<Vec<FlaggedRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT record_id, street_address, unit_number, building_type, subname, reason
             FROM flagged WHERE run_id = ?1 AND subname = ?2 ORDER BY id",
        )
        .context("Failed to prepare flagged query")?;

    let rows = stmt
        .query_map(params![run_id, subname], flagged_from_row)
        .context("Failed to query flagged addresses")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read flagged addresses")?;

    Ok(rows)
}

// ============================================================================
// FINGERPRINT
// ============================================================================

/// SHA-256 over the input file's bytes, recorded for provenance
pub fn file_fingerprint(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read input file: {:?}", path))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// TESTS
// ============================================================================
