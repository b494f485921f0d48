// Copy numbering, barcodes and copy creation

use std::collections::{BTreeSet, HashMap};
use rusqlite::Connection;
use serde::Serialize;

use crate::catalog::CatalogRecord;
use crate::constants::{
    BARCODE_PREFIX, COPY_STATUS_AVAILABLE, DEFAULT_COPY_LOCATION, DEFAULT_COPY_NUMBER,
    PROGRESS_INTERVAL,
};
use crate::db::schema::{self, NewCopy};
use crate::error::{LibraryError, Result};
use super::books::BookIndex;

/// FISI + 6-digit book id + 3-digit copy number
pub fn barcode(book_id: i64, copy_number: i64) -> String {
    format!("{}{:06}{:03}", BARCODE_PREFIX, book_id, copy_number)
}

/// Hands out copy numbers unique within each book. A taken number is
/// linear-probed upward to the next free one.
#[derive(Debug, Default)]
pub struct CopyNumberer {
    taken: HashMap<i64, BTreeSet<i64>>,
}

impl CopyNumberer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a number for `book_id`, starting from `requested`.
    /// The first call for a book loads the numbers already stored for it.
    pub fn assign(&mut self, conn: &Connection, book_id: i64, requested: i64) -> Result<i64> {
        if !self.taken.contains_key(&book_id) {
            let existing: BTreeSet<i64> = schema::list_copies_for_book(conn, book_id)?
                .into_iter()
                .map(|c| c.copy_number)
                .collect();
            self.taken.insert(book_id, existing);
        }
        let taken = self.taken.entry(book_id).or_default();

        let mut number = requested.max(DEFAULT_COPY_NUMBER);
        while taken.contains(&number) {
            number = number.checked_add(1).ok_or_else(|| {
                LibraryError::InvalidCatalog(format!(
                    "no free copy number after {} for book {}",
                    requested, book_id
                ))
            })?;
        }
        taken.insert(number);
        Ok(number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyStats {
    pub created: usize,
    /// Copies stored under a different number than the row asked for
    pub renumbered: usize,
}

/// One copy per catalog row that resolves to a book
pub fn create_copies(conn: &Connection, records: &[CatalogRecord], books: &BookIndex) -> Result<CopyStats> {
    let mut numberer = CopyNumberer::new();
    let mut stats = CopyStats::default();

    for record in records {
        let Some(&book_id) = record.book_key().as_ref().and_then(|k| books.get(k)) else {
            continue;
        };
        let requested = record.copy_number.unwrap_or(DEFAULT_COPY_NUMBER);
        let copy_number = numberer.assign(conn, book_id, requested)?;
        if copy_number != requested {
            log::debug!(
                "  Row {}: copy {} of book {} taken, using {}",
                record.row, requested, book_id, copy_number
            );
            stats.renumbered += 1;
        }

        schema::insert_copy(conn, &NewCopy {
            book_id,
            copy_number,
            barcode: barcode(book_id, copy_number),
            location: DEFAULT_COPY_LOCATION.to_string(),
            status: COPY_STATUS_AVAILABLE.to_string(),
            notes: record.notes.clone(),
        })?;
        stats.created += 1;

        if stats.created % PROGRESS_INTERVAL == 0 {
            log::info!("  Copies created: {}", stats.created);
        }
    }

    Ok(stats)
}
