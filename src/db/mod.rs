// Database module
//
// Connection resolution order:
// 1) Explicit --database flag
// 2) Environment variable override (FISI_LIBRARY_DB)
// 3) biblioteca_fisi.db in the working directory
// 4) ~/.fisi-library/biblioteca_fisi.db

pub mod migrations;
pub mod schema;

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use rusqlite::{Connection, OpenFlags};
use anyhow::Result;

use crate::constants::{APP_DB_DIR, DB_BUSY_TIMEOUT_MS, DB_FILENAME, DB_PATH_ENV};
use crate::error::LibraryError;

/// Where a candidate database location came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Flag,
    Environment,
    WorkingDir,
    Home,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CandidateSource::Flag => "--database flag",
            CandidateSource::Environment => "FISI_LIBRARY_DB",
            CandidateSource::WorkingDir => "working directory",
            CandidateSource::Home => "home directory",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbCandidate {
    pub path: PathBuf,
    pub source: CandidateSource,
}

/// Build the ordered list of database locations to try.
/// Duplicate paths keep their first (highest precedence) entry.
pub fn candidate_paths(explicit: Option<&Path>) -> Vec<DbCandidate> {
    let mut candidates: Vec<DbCandidate> = Vec::new();
    let mut push = |path: PathBuf, source: CandidateSource| {
        if !candidates.iter().any(|c| c.path == path) {
            candidates.push(DbCandidate { path, source });
        }
    };

    if let Some(p) = explicit {
        push(p.to_path_buf(), CandidateSource::Flag);
    }

    if let Ok(v) = env::var(DB_PATH_ENV) {
        if !v.trim().is_empty() {
            push(PathBuf::from(v), CandidateSource::Environment);
        }
    }

    push(PathBuf::from(DB_FILENAME), CandidateSource::WorkingDir);

    if let Some(home) = home_db_path() {
        push(home, CandidateSource::Home);
    }

    candidates
}

/// ~/.fisi-library/biblioteca_fisi.db, if a home directory can be determined
pub fn home_db_path() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|home| home.home_dir().join(APP_DB_DIR).join(DB_FILENAME))
}

/// Set per-connection pragmas
fn configure_connection(conn: &Connection) -> Result<()> {
    // Enable foreign keys (must be done per connection)
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(&format!("PRAGMA busy_timeout = {};", DB_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open or create a database at the given path
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Cannot create database directory {}: {}. Check directory permissions.",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let conn = Connection::open(db_path)?;
    configure_connection(&conn)?;

    // Run migrations
    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Open an existing database; never creates the file
pub fn open_existing_db(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        anyhow::bail!("Database not found at {}", db_path.display());
    }

    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )?;
    configure_connection(&conn)?;
    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Try each candidate in order; the first one that opens wins.
pub fn connect(candidates: &[DbCandidate]) -> crate::error::Result<(Connection, DbCandidate)> {
    let mut attempts: Vec<String> = Vec::new();

    for candidate in candidates {
        log::debug!("Trying database {} ({})", candidate.path.display(), candidate.source);
        match open_existing_db(&candidate.path) {
            Ok(conn) => {
                log::info!("Connected to {} ({})", candidate.path.display(), candidate.source);
                return Ok((conn, candidate.clone()));
            }
            Err(e) => {
                log::debug!("  {} failed: {}", candidate.path.display(), e);
                attempts.push(format!("{} ({}): {}", candidate.path.display(), candidate.source, e));
            }
        }
    }

    if attempts.is_empty() {
        return Err(LibraryError::Connection("no database locations to try".to_string()));
    }

    Err(LibraryError::Connection(format!(
        "could not open any database location. Tried:\n  {}",
        attempts.join("\n  ")
    )))
}
