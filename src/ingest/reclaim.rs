// Orphan book reclamation
// A book with zero copies is an orphan, whatever its author links.

use rusqlite::Connection;
use serde::Serialize;

use crate::constants::ORPHAN_SAMPLE_SIZE;
use crate::db::schema::{self, BookSummary};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReclaimSummary {
    pub orphans_found: usize,
    /// First few orphans, for the console summary
    pub sample: Vec<BookSummary>,
    pub books_deleted: usize,
    pub category_links_deleted: usize,
    pub author_links_deleted: usize,
}

/// Delete orphan books and their link rows (category links, then author
/// links, then books). Runs inside the caller's transaction.
pub fn remove_orphan_books(conn: &Connection) -> Result<ReclaimSummary> {
    let orphans = schema::books_without_copies(conn)?;
    if orphans.is_empty() {
        return Ok(ReclaimSummary::default());
    }

    log::info!("Found {} orphan books (no copies)", orphans.len());
    let sample: Vec<BookSummary> = orphans.iter().take(ORPHAN_SAMPLE_SIZE).cloned().collect();

    let category_links_deleted = schema::delete_orphan_book_categories(conn)?;
    let author_links_deleted = schema::delete_orphan_book_authors(conn)?;
    let books_deleted = schema::delete_orphan_books(conn)?;

    Ok(ReclaimSummary {
        orphans_found: orphans.len(),
        sample,
        books_deleted,
        category_links_deleted,
        author_links_deleted,
    })
}

/// Standalone reclamation pass in its own transaction
pub fn reclaim_orphan_books(conn: &Connection) -> Result<ReclaimSummary> {
    let tx = conn.unchecked_transaction()?;
    let summary = remove_orphan_books(&tx)?;
    tx.commit()?;
    Ok(summary)
}
