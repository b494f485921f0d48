// Categories, books and their link rows

use std::collections::HashMap;
use rusqlite::Connection;

use crate::catalog::{BookKey, CatalogRecord};
use crate::constants::DEFAULT_LANGUAGE;
use crate::db::schema::{self, NewBook};
use crate::error::Result;

/// Book identity -> book id, built while inserting books
pub type BookIndex = HashMap<BookKey, i64>;

/// One category per distinct LCC section. Returns section name -> category id.
pub fn create_categories(conn: &Connection, records: &[CatalogRecord]) -> Result<HashMap<String, i64>> {
    let mut categories: HashMap<String, i64> = HashMap::new();
    for section in records.iter().filter_map(|r| r.lcc_section.as_deref()) {
        if categories.contains_key(section) {
            continue;
        }
        let id = schema::get_or_create_category(conn, section)?;
        categories.insert(section.to_string(), id);
    }
    Ok(categories)
}

/// Insert one book per distinct identity; rows without a title are skipped.
pub fn create_books(conn: &Connection, records: &[CatalogRecord]) -> Result<BookIndex> {
    let mut books = BookIndex::new();
    let mut untitled = 0usize;

    for record in records {
        let Some(key) = record.book_key() else {
            untitled += 1;
            continue;
        };
        if books.contains_key(&key) {
            continue;
        }
        let Some(title) = record.title.clone() else { continue };

        let id = schema::insert_book(conn, &NewBook {
            title,
            publication_year: record.year,
            language: DEFAULT_LANGUAGE.to_string(),
            lcc_section: record.lcc_section.clone(),
            lcc_number: record.lcc_number.clone(),
            lcc_cutter: record.lcc_cutter.clone(),
        })?;
        books.insert(key, id);
    }

    if untitled > 0 {
        log::warn!("  Skipped {} catalog rows without a title", untitled);
    }

    Ok(books)
}

/// Link every row's book to the authors in its author cell, by exact name.
/// Names of authors removed by deduplication are absent from `authors` and
/// are left for the repair pass.
pub fn link_book_authors(
    conn: &Connection,
    records: &[CatalogRecord],
    books: &BookIndex,
    authors: &HashMap<String, i64>,
) -> Result<usize> {
    let mut created = 0;
    for record in records {
        let Some(&book_id) = record.book_key().as_ref().and_then(|k| books.get(k)) else {
            continue;
        };
        for name in record.author_names() {
            if let Some(&author_id) = authors.get(&name) {
                if schema::link_book_author(conn, book_id, author_id)? {
                    created += 1;
                }
            }
        }
    }
    Ok(created)
}

/// Link every row's book to the category of its LCC section
pub fn link_book_categories(
    conn: &Connection,
    records: &[CatalogRecord],
    books: &BookIndex,
    categories: &HashMap<String, i64>,
) -> Result<usize> {
    let mut created = 0;
    for record in records {
        let Some(&book_id) = record.book_key().as_ref().and_then(|k| books.get(k)) else {
            continue;
        };
        let Some(&category_id) = record.lcc_section.as_ref().and_then(|s| categories.get(s)) else {
            continue;
        };
        if schema::link_book_category(conn, book_id, category_id)? {
            created += 1;
        }
    }
    Ok(created)
}
