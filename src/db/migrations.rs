// Database migrations
// Migrations are forward-only. Never edit or delete a migration after it ships.

use rusqlite::Connection;
use anyhow::Result;

/// All migrations in order. Each migration is a SQL string.
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Users (students, professors, administrators)
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        university_code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'Estudiante',
        active INTEGER NOT NULL DEFAULT 1,
        registered_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
        password_updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
    );

    -- Books (bibliographic records)
    CREATE TABLE books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        isbn TEXT,
        title TEXT NOT NULL,
        publisher TEXT,
        publication_year INTEGER,
        language TEXT,
        pages INTEGER,
        lcc_section TEXT,
        lcc_number TEXT,
        lcc_cutter TEXT
    );

    -- Authors
    CREATE TABLE authors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        biography TEXT,
        orcid TEXT
    );

    -- Categories (one per LCC section)
    CREATE TABLE categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    -- Book-Author mapping
    CREATE TABLE book_authors (
        book_id INTEGER NOT NULL REFERENCES books(id),
        author_id INTEGER NOT NULL REFERENCES authors(id),
        PRIMARY KEY (book_id, author_id)
    );

    -- Book-Category mapping
    CREATE TABLE book_categories (
        book_id INTEGER NOT NULL REFERENCES books(id),
        category_id INTEGER NOT NULL REFERENCES categories(id),
        PRIMARY KEY (book_id, category_id)
    );

    -- Copies (physical items)
    CREATE TABLE copies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        book_id INTEGER NOT NULL REFERENCES books(id),
        copy_number INTEGER NOT NULL,
        barcode TEXT NOT NULL UNIQUE,
        location TEXT,
        status TEXT NOT NULL DEFAULT 'Disponible',
        added_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
        notes TEXT,
        UNIQUE(book_id, copy_number)
    );

    -- Loans
    CREATE TABLE loans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        copy_id INTEGER NOT NULL REFERENCES copies(id),
        user_id INTEGER NOT NULL REFERENCES users(id),
        loaned_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
        due_at TEXT NOT NULL,
        returned_at TEXT,
        status TEXT NOT NULL DEFAULT 'Prestado'
            CHECK (status IN ('Prestado', 'Atrasado', 'Devuelto')),
        renewals INTEGER NOT NULL DEFAULT 0,
        notes TEXT
    );

    -- Fines
    CREATE TABLE fines (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        loan_id INTEGER NOT NULL REFERENCES loans(id),
        user_id INTEGER NOT NULL REFERENCES users(id),
        amount REAL NOT NULL,
        status TEXT NOT NULL DEFAULT 'Pendiente'
            CHECK (status IN ('Pendiente', 'Pagada')),
        days_late INTEGER,
        reason TEXT,
        charged_at TEXT
    );

    CREATE INDEX idx_copies_book ON copies(book_id);
    CREATE INDEX idx_book_authors_author ON book_authors(author_id);
    CREATE INDEX idx_book_categories_category ON book_categories(category_id);
    CREATE INDEX idx_loans_copy ON loans(copy_id);
    CREATE INDEX idx_loans_user ON loans(user_id);
    CREATE INDEX idx_loans_status ON loans(status);
    CREATE INDEX idx_fines_status ON fines(status);
    CREATE INDEX idx_users_role ON users(role);
    "#,
];

/// Get current schema version from database
pub fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row(
        "PRAGMA user_version",
        [],
        |row| row.get(0)
    )?;
    Ok(version)
}

/// Schema version this build migrates to
pub fn target_schema_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Run all pending migrations (crash-safe)
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    let target_version = target_schema_version();

    // Refuse to open a DB created by a newer build
    if current_version > target_version {
        anyhow::bail!(
            "Database schema version {} is newer than this build supports (max {}). Please upgrade fisi-library.",
            current_version,
            target_version
        );
    }

    if current_version == target_version {
        return Ok(());
    }

    // Apply pending migrations one-by-one, each with its version bump
    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as u32;
        if migration_version <= current_version {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration)?;
        tx.execute_batch(&format!("PRAGMA user_version = {}", migration_version))?;
        tx.commit()?;

        log::info!("Applied migration {}", migration_version);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_migration_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
             ('users','books','authors','categories','book_authors','book_categories','copies','loans','fines')",
            [],
            |row| row.get(0),
        ).unwrap();
        assert_eq!(count, 9, "All 9 library tables should exist");
        assert_eq!(get_schema_version(&conn).unwrap(), target_schema_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_newer_schema_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99").unwrap();
        let err = run_migrations(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than this build supports"));
    }
}
