// Database schema types and query helpers

use rusqlite::{Connection, params, OptionalExtension};
use serde::{Deserialize, Serialize};
use crate::error::Result;

// ----- Author -----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub biography: Option<String>,
    pub orcid: Option<String>,
}

pub fn insert_author(conn: &Connection, name: &str, orcid: Option<&str>) -> Result<i64> {
    conn.execute(
        "INSERT INTO authors (name, biography, orcid) VALUES (?1, NULL, ?2)",
        params![name, orcid],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All authors in creation order
pub fn list_authors(conn: &Connection) -> Result<Vec<Author>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, biography, orcid FROM authors ORDER BY id"
    )?;
    let authors = stmt.query_map([], |row| {
        Ok(Author {
            id: row.get(0)?,
            name: row.get(1)?,
            biography: row.get(2)?,
            orcid: row.get(3)?,
        })
    })?
    .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(authors)
}

/// Delete an author and any links pointing at it
pub fn delete_author(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM book_authors WHERE author_id = ?1", params![id])?;
    conn.execute("DELETE FROM authors WHERE id = ?1", params![id])?;
    Ok(())
}

// ----- Category -----

pub fn insert_category(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO categories (name) VALUES (?1)",
        params![name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_category_by_name(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn.query_row(
        "SELECT id FROM categories WHERE name = ?1",
        params![name],
        |row| row.get(0),
    ).optional()?;
    Ok(id)
}

/// Return the existing category id or insert a new row
pub fn get_or_create_category(conn: &Connection, name: &str) -> Result<i64> {
    if let Some(id) = find_category_by_name(conn, name)? {
        return Ok(id);
    }
    insert_category(conn, name)
}

// ----- Book -----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub isbn: Option<String>,
    pub title: String,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub lcc_section: Option<String>,
    pub lcc_number: Option<String>,
    pub lcc_cutter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub publication_year: Option<i32>,
    pub language: String,
    pub lcc_section: Option<String>,
    pub lcc_number: Option<String>,
    pub lcc_cutter: Option<String>,
}

/// Minimal book projection used by repair and reclamation passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub publication_year: Option<i32>,
}

pub fn insert_book(conn: &Connection, book: &NewBook) -> Result<i64> {
    conn.execute(
        "INSERT INTO books (isbn, title, publisher, publication_year, language, pages,
                            lcc_section, lcc_number, lcc_cutter)
         VALUES (NULL, ?1, NULL, ?2, ?3, NULL, ?4, ?5, ?6)",
        params![
            book.title,
            book.publication_year,
            book.language,
            book.lcc_section,
            book.lcc_number,
            book.lcc_cutter,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
pub fn get_book(conn: &Connection, id: i64) -> Result<Option<Book>> {
    let result = conn.query_row(
        "SELECT id, isbn, title, publisher, publication_year, language, pages,
                lcc_section, lcc_number, lcc_cutter
         FROM books WHERE id = ?1",
        params![id],
        |row| {
            Ok(Book {
                id: row.get(0)?,
                isbn: row.get(1)?,
                title: row.get(2)?,
                publisher: row.get(3)?,
                publication_year: row.get(4)?,
                language: row.get(5)?,
                pages: row.get(6)?,
                lcc_section: row.get(7)?,
                lcc_number: row.get(8)?,
                lcc_cutter: row.get(9)?,
            })
        },
    ).optional()?;
    Ok(result)
}

fn query_book_summaries(conn: &Connection, sql: &str) -> Result<Vec<BookSummary>> {
    let mut stmt = conn.prepare(sql)?;
    let books = stmt.query_map([], |row| {
        Ok(BookSummary {
            id: row.get(0)?,
            title: row.get(1)?,
            publication_year: row.get(2)?,
        })
    })?
    .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(books)
}

/// Books with no row in book_authors
pub fn books_without_authors(conn: &Connection) -> Result<Vec<BookSummary>> {
    query_book_summaries(
        conn,
        "SELECT b.id, b.title, b.publication_year
         FROM books b
         LEFT JOIN book_authors ba ON b.id = ba.book_id
         WHERE ba.book_id IS NULL
         ORDER BY b.id",
    )
}

/// Books with no copies (orphans)
pub fn books_without_copies(conn: &Connection) -> Result<Vec<BookSummary>> {
    query_book_summaries(
        conn,
        "SELECT b.id, b.title, b.publication_year
         FROM books b
         LEFT JOIN copies c ON b.id = c.book_id
         WHERE c.book_id IS NULL
         ORDER BY b.id",
    )
}

pub fn count_books_without_copies(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM books b
         LEFT JOIN copies c ON b.id = c.book_id
         WHERE c.book_id IS NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

const ORPHAN_BOOK_IDS: &str = "SELECT b.id FROM books b
     LEFT JOIN copies c ON b.id = c.book_id
     WHERE c.book_id IS NULL";

pub fn delete_orphan_book_categories(conn: &Connection) -> Result<usize> {
    let n = conn.execute(
        &format!("DELETE FROM book_categories WHERE book_id IN ({})", ORPHAN_BOOK_IDS),
        [],
    )?;
    Ok(n)
}

pub fn delete_orphan_book_authors(conn: &Connection) -> Result<usize> {
    let n = conn.execute(
        &format!("DELETE FROM book_authors WHERE book_id IN ({})", ORPHAN_BOOK_IDS),
        [],
    )?;
    Ok(n)
}

pub fn delete_orphan_books(conn: &Connection) -> Result<usize> {
    let n = conn.execute(
        &format!("DELETE FROM books WHERE id IN ({})", ORPHAN_BOOK_IDS),
        [],
    )?;
    Ok(n)
}

// ----- Link tables -----

/// Link a book to an author. Returns false if the link already existed.
pub fn link_book_author(conn: &Connection, book_id: i64, author_id: i64) -> Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM book_authors WHERE book_id = ?1 AND author_id = ?2",
        params![book_id, author_id],
        |row| row.get(0),
    )?;
    if exists > 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO book_authors (book_id, author_id) VALUES (?1, ?2)",
        params![book_id, author_id],
    )?;
    Ok(true)
}

/// Link a book to a category. Returns false if the link already existed.
pub fn link_book_category(conn: &Connection, book_id: i64, category_id: i64) -> Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM book_categories WHERE book_id = ?1 AND category_id = ?2",
        params![book_id, category_id],
        |row| row.get(0),
    )?;
    if exists > 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO book_categories (book_id, category_id) VALUES (?1, ?2)",
        params![book_id, category_id],
    )?;
    Ok(true)
}

#[cfg(test)]
pub fn get_book_author_ids(conn: &Connection, book_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT author_id FROM book_authors WHERE book_id = ?1 ORDER BY author_id"
    )?;
    let ids = stmt.query_map(params![book_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

// ----- Copy -----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookCopy {
    pub id: i64,
    pub book_id: i64,
    pub copy_number: i64,
    pub barcode: String,
    pub location: Option<String>,
    pub status: String,
    pub added_at: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCopy {
    pub book_id: i64,
    pub copy_number: i64,
    pub barcode: String,
    pub location: String,
    pub status: String,
    pub notes: Option<String>,
}

pub fn insert_copy(conn: &Connection, copy: &NewCopy) -> Result<i64> {
    conn.execute(
        "INSERT INTO copies (book_id, copy_number, barcode, location, status, added_at, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, datetime('now', 'localtime'), ?6)",
        params![
            copy.book_id,
            copy.copy_number,
            copy.barcode,
            copy.location,
            copy.status,
            copy.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_copies_for_book(conn: &Connection, book_id: i64) -> Result<Vec<BookCopy>> {
    let mut stmt = conn.prepare(
        "SELECT id, book_id, copy_number, barcode, location, status, added_at, notes
         FROM copies WHERE book_id = ?1 ORDER BY copy_number"
    )?;
    let copies = stmt.query_map(params![book_id], |row| {
        Ok(BookCopy {
            id: row.get(0)?,
            book_id: row.get(1)?,
            copy_number: row.get(2)?,
            barcode: row.get(3)?,
            location: row.get(4)?,
            status: row.get(5)?,
            added_at: row.get(6)?,
            notes: row.get(7)?,
        })
    })?
    .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(copies)
}

// ----- Catalog maintenance -----

/// Remove every catalog row (copies, links, books, authors, categories).
/// Fails if loans still reference copies.
pub fn wipe_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DELETE FROM copies;
         DELETE FROM book_categories;
         DELETE FROM book_authors;
         DELETE FROM books;
         DELETE FROM authors;
         DELETE FROM categories;"
    )?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCounts {
    pub authors: i64,
    pub categories: i64,
    pub books: i64,
    pub copies: i64,
    pub book_authors: i64,
    pub book_categories: i64,
}

fn count_table(conn: &Connection, table: &str) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count)
}

pub fn catalog_counts(conn: &Connection) -> Result<CatalogCounts> {
    Ok(CatalogCounts {
        authors: count_table(conn, "authors")?,
        categories: count_table(conn, "categories")?,
        books: count_table(conn, "books")?,
        copies: count_table(conn, "copies")?,
        book_authors: count_table(conn, "book_authors")?,
        book_categories: count_table(conn, "book_categories")?,
    })
}

// ----- User -----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub university_code: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub registered_at: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub university_code: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

pub fn insert_user(conn: &Connection, user: &NewUser) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (university_code, name, email, password_hash, role, active,
                            registered_at, password_updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, datetime('now', 'localtime'), datetime('now', 'localtime'))",
        params![
            user.university_code,
            user.name,
            user.email,
            user.password_hash,
            user.role,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        university_code: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        role: row.get(4)?,
        active: row.get(5)?,
        registered_at: row.get(6)?,
    })
}

pub fn list_users_by_role(conn: &Connection, role: &str) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, university_code, name, email, role, active, registered_at
         FROM users WHERE role = ?1 ORDER BY id"
    )?;
    let users = stmt.query_map(params![role], map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn.query_row(
        "SELECT id, university_code, name, email, role, active, registered_at
         FROM users WHERE email = ?1",
        params![email],
        map_user,
    ).optional()?;
    Ok(user)
}

#[cfg(test)]
pub fn get_password_hash(conn: &Connection, user_id: i64) -> Result<Option<String>> {
    let hash = conn.query_row(
        "SELECT password_hash FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    ).optional()?;
    Ok(hash)
}
