// Catalog import pipeline
//
// Stages, all inside one transaction:
//   wipe catalog -> authors -> dedup -> categories -> books -> author links
//   -> link repair -> category links -> copies -> orphan reclamation

pub mod authors;
pub mod books;
pub mod copies;
pub mod normalize;
pub mod reclaim;

use std::path::Path;
use rusqlite::Connection;
use serde::Serialize;

use crate::catalog::{self, CatalogRecord};
use crate::db::schema::{self, CatalogCounts};
use crate::error::Result;
use self::authors::{MergedAuthor, SimilarAuthors};
use self::reclaim::ReclaimSummary;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Run every stage, then roll back instead of committing
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub authors_created: usize,
    pub duplicate_authors_removed: usize,
    pub merged_authors: Vec<MergedAuthor>,
    pub similar_authors: Vec<SimilarAuthors>,
    pub categories_created: usize,
    pub books_created: usize,
    pub author_links_created: usize,
    pub author_links_repaired: usize,
    pub category_links_created: usize,
    pub copies_created: usize,
    pub copies_renumbered: usize,
    pub reclaim: ReclaimSummary,
    pub final_counts: CatalogCounts,
    /// Should always be zero after reclamation
    pub books_without_copies: i64,
    pub dry_run: bool,
}

/// Read a catalog file and load it into the database
pub fn run_catalog_import(conn: &Connection, csv_path: &Path, options: &ImportOptions) -> Result<ImportSummary> {
    log::info!("Reading catalog {}", csv_path.display());
    let records = catalog::read_catalog(csv_path)?;
    import_records(conn, &records, options)
}

/// Replace the catalog tables with the contents of `records`
pub fn import_records(conn: &Connection, records: &[CatalogRecord], options: &ImportOptions) -> Result<ImportSummary> {
    let tx = conn.unchecked_transaction()?;
    let mut summary = ImportSummary {
        rows_read: records.len(),
        dry_run: options.dry_run,
        ..Default::default()
    };

    log::info!("Clearing existing catalog data");
    schema::wipe_catalog(&tx)?;

    log::info!("Creating authors");
    let created = authors::create_authors(&tx, records)?;
    summary.authors_created = created.len();

    log::info!("Merging duplicate authors");
    let dedup = authors::deduplicate_authors(&tx)?;
    summary.duplicate_authors_removed = dedup.merged.len();
    summary.merged_authors = dedup.merged;
    summary.similar_authors = dedup.similar;
    let author_ids = if summary.duplicate_authors_removed > 0 {
        authors::author_index(&tx)?
    } else {
        created
    };

    log::info!("Creating categories");
    let categories = books::create_categories(&tx, records)?;
    summary.categories_created = categories.len();

    log::info!("Creating books");
    let book_ids = books::create_books(&tx, records)?;
    summary.books_created = book_ids.len();

    log::info!("Linking books to authors");
    summary.author_links_created = books::link_book_authors(&tx, records, &book_ids, &author_ids)?;

    log::info!("Repairing books left without authors");
    summary.author_links_repaired = authors::repair_book_authors(&tx, records)?;

    log::info!("Linking books to categories");
    summary.category_links_created = books::link_book_categories(&tx, records, &book_ids, &categories)?;

    log::info!("Creating copies");
    let copy_stats = copies::create_copies(&tx, records, &book_ids)?;
    summary.copies_created = copy_stats.created;
    summary.copies_renumbered = copy_stats.renumbered;

    log::info!("Removing orphan books");
    summary.reclaim = reclaim::remove_orphan_books(&tx)?;

    summary.final_counts = schema::catalog_counts(&tx)?;
    summary.books_without_copies = schema::count_books_without_copies(&tx)?;
    if summary.books_without_copies > 0 {
        log::warn!("{} books still have no copies", summary.books_without_copies);
    }

    if options.dry_run {
        log::info!("Dry run: rolling back");
        tx.rollback()?;
    } else {
        tx.commit()?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests;
