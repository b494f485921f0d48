// Connectivity diagnostics
// Probes every candidate database location without creating or migrating anything.

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;

use crate::constants::{DB_PATH_ENV, REQUIRED_TABLES};
use crate::db::migrations;
use crate::db::DbCandidate;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct CandidateProbe {
    pub path: String,
    pub source: String,
    pub exists: bool,
    pub opened: bool,
    pub sqlite_version: Option<String>,
    pub schema_version: Option<u32>,
    pub expected_schema_version: u32,
    pub missing_tables: Vec<String>,
    pub db_size: Option<String>,
    pub error: Option<String>,
}

impl CandidateProbe {
    /// Opens and carries the full library schema
    pub fn is_usable(&self) -> bool {
        self.opened && self.missing_tables.is_empty()
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn existing_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names = stmt.query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

fn inspect(conn: &Connection, probe: &mut CandidateProbe) -> Result<()> {
    let version: String = conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
    probe.sqlite_version = Some(version);
    probe.schema_version = Some(migrations::get_schema_version(conn)?);

    let tables = existing_tables(conn)?;
    probe.missing_tables = REQUIRED_TABLES
        .iter()
        .filter(|t| !tables.iter().any(|have| have == *t))
        .map(|t| t.to_string())
        .collect();
    Ok(())
}

/// Inspect one candidate read-only
pub fn probe_candidate(candidate: &DbCandidate) -> CandidateProbe {
    let mut probe = CandidateProbe {
        path: candidate.path.display().to_string(),
        source: candidate.source.to_string(),
        exists: candidate.path.is_file(),
        opened: false,
        sqlite_version: None,
        schema_version: None,
        expected_schema_version: migrations::target_schema_version(),
        missing_tables: Vec::new(),
        db_size: None,
        error: None,
    };

    if !probe.exists {
        probe.error = Some("file not found".to_string());
        return probe;
    }
    probe.db_size = std::fs::metadata(&candidate.path).ok().map(|m| format_bytes(m.len()));

    let conn = match Connection::open_with_flags(
        &candidate.path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    ) {
        Ok(conn) => conn,
        Err(e) => {
            probe.error = Some(e.to_string());
            return probe;
        }
    };

    match inspect(&conn, &mut probe) {
        Ok(()) => probe.opened = true,
        // Not a database, or unreadable
        Err(e) => probe.error = Some(e.to_string()),
    }
    probe
}

/// Probe every candidate in order
pub fn probe_all(candidates: &[DbCandidate]) -> Vec<CandidateProbe> {
    candidates
        .iter()
        .map(|c| {
            log::debug!("Probing {} ({})", c.path.display(), c.source);
            probe_candidate(c)
        })
        .collect()
}

/// What to try when no candidate is usable
pub fn remediation_steps() -> Vec<String> {
    vec![
        "Run `fisi-library init` to create a database in the working directory".to_string(),
        "Pass an explicit location with `--database <path>`".to_string(),
        format!("Or set {} to the database file", DB_PATH_ENV),
        "Check that the file is readable and is a SQLite database".to_string(),
        "Re-run with -vv for connection details".to_string(),
    ]
}
