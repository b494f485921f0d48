// Author creation, deduplication and link repair

use std::collections::{HashMap, HashSet};
use rusqlite::Connection;
use serde::Serialize;

use crate::catalog::CatalogRecord;
use crate::constants::{AUTHOR_SIMILARITY_HINT, ORCID_PLACEHOLDER_PREFIX, PROGRESS_INTERVAL};
use crate::db::schema::{self, Author};
use crate::error::Result;
use super::normalize::{normalize_name, similarity_ratio, split_authors};

/// Placeholder identifier for the n-th created author (1-based)
pub fn placeholder_orcid(n: usize) -> String {
    format!("{}{:06}", ORCID_PLACEHOLDER_PREFIX, n)
}

/// Insert one author per distinct name, walking author cells in first-seen order.
/// Returns exact name -> author id.
pub fn create_authors(conn: &Connection, records: &[CatalogRecord]) -> Result<HashMap<String, i64>> {
    let mut seen_cells: HashSet<&str> = HashSet::new();
    let mut ids: HashMap<String, i64> = HashMap::new();

    for record in records {
        let Some(cell) = record.raw_authors.as_deref() else { continue };
        if !seen_cells.insert(cell) {
            continue;
        }
        for name in split_authors(cell) {
            if ids.contains_key(&name) {
                continue;
            }
            let orcid = placeholder_orcid(ids.len() + 1);
            let id = schema::insert_author(conn, &name, Some(&orcid))?;
            ids.insert(name, id);

            if ids.len() % PROGRESS_INTERVAL == 0 {
                log::info!("  Authors created: {}", ids.len());
            }
        }
    }

    Ok(ids)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedAuthor {
    pub kept_id: i64,
    pub kept_name: String,
    pub removed_id: i64,
    pub removed_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarAuthors {
    pub first_id: i64,
    pub first_name: String,
    pub second_id: i64,
    pub second_name: String,
    pub ratio: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupReport {
    pub merged: Vec<MergedAuthor>,
    pub similar: Vec<SimilarAuthors>,
}

/// Pairwise scan in id order. The earliest author of each normalized name
/// survives; later ones are marked for removal. Empty keys never match.
pub fn find_duplicate_authors(authors: &[Author]) -> Vec<MergedAuthor> {
    let keys: Vec<String> = authors.iter().map(|a| normalize_name(&a.name)).collect();
    let mut removed: HashSet<usize> = HashSet::new();
    let mut merged = Vec::new();

    for i in 0..authors.len() {
        if removed.contains(&i) || keys[i].is_empty() {
            continue;
        }
        for j in (i + 1)..authors.len() {
            if removed.contains(&j) || keys[i] != keys[j] {
                continue;
            }
            removed.insert(j);
            merged.push(MergedAuthor {
                kept_id: authors[i].id,
                kept_name: authors[i].name.clone(),
                removed_id: authors[j].id,
                removed_name: authors[j].name.clone(),
            });
        }
    }

    merged
}

/// Pairs whose names are close but normalize differently.
pub fn find_similar_authors(authors: &[Author], threshold: f64) -> Vec<SimilarAuthors> {
    let keys: Vec<String> = authors.iter().map(|a| normalize_name(&a.name)).collect();
    let mut pairs = Vec::new();

    for i in 0..authors.len() {
        for j in (i + 1)..authors.len() {
            if keys[i] == keys[j] {
                continue;
            }
            let ratio = similarity_ratio(&authors[i].name, &authors[j].name);
            if ratio >= threshold {
                pairs.push(SimilarAuthors {
                    first_id: authors[i].id,
                    first_name: authors[i].name.clone(),
                    second_id: authors[j].id,
                    second_name: authors[j].name.clone(),
                    ratio,
                });
            }
        }
    }

    pairs
}

/// Delete later duplicates and report near-miss pairs among the survivors
pub fn deduplicate_authors(conn: &Connection) -> Result<DedupReport> {
    let authors = schema::list_authors(conn)?;
    let merged = find_duplicate_authors(&authors);

    for m in &merged {
        log::info!(
            "  Duplicate author: '{}' (id {}) merged into '{}' (id {})",
            m.removed_name, m.removed_id, m.kept_name, m.kept_id
        );
        schema::delete_author(conn, m.removed_id)?;
    }

    let survivors = schema::list_authors(conn)?;
    let similar = find_similar_authors(&survivors, AUTHOR_SIMILARITY_HINT);
    for s in &similar {
        log::warn!(
            "  Possible duplicate (not merged): '{}' (id {}) ~ '{}' (id {}) ratio {:.2}",
            s.first_name, s.first_id, s.second_name, s.second_id, s.ratio
        );
    }

    Ok(DedupReport { merged, similar })
}

/// Exact name -> id for the authors currently in the database
pub fn author_index(conn: &Connection) -> Result<HashMap<String, i64>> {
    Ok(schema::list_authors(conn)?
        .into_iter()
        .map(|a| (a.name, a.id))
        .collect())
}

/// Relink books that ended up with no authors (typically because their only
/// author was merged away). Each book is matched to the first catalog row
/// with the same lowercased title and year; its authors are looked up by
/// normalized name. Returns the number of links added.
pub fn repair_book_authors(conn: &Connection, records: &[CatalogRecord]) -> Result<usize> {
    let unlinked = schema::books_without_authors(conn)?;
    if unlinked.is_empty() {
        log::info!("  Every book already has an author");
        return Ok(0);
    }
    log::info!("  Books without authors: {}", unlinked.len());

    let mut by_key: HashMap<String, i64> = HashMap::new();
    for author in schema::list_authors(conn)? {
        let key = normalize_name(&author.name);
        if !key.is_empty() {
            by_key.entry(key).or_insert(author.id);
        }
    }

    let mut added = 0;
    for book in &unlinked {
        let title = book.title.to_lowercase();
        let row = records.iter().find(|r| {
            r.title.as_deref().map(str::to_lowercase).as_deref() == Some(title.as_str())
                && r.year == book.publication_year
        });
        let Some(row) = row else {
            log::debug!("  No catalog row for book {} '{}'", book.id, book.title);
            continue;
        };

        for name in row.author_names() {
            if let Some(&author_id) = by_key.get(&normalize_name(&name)) {
                if schema::link_book_author(conn, book.id, author_id)? {
                    added += 1;
                }
            }
        }
    }

    Ok(added)
}
