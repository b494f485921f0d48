// Catalog CSV loader
//
// The catalog is a semicolon-delimited UTF-8 export with one row per physical
// copy. Columns: TITULO;Autor;Año;LCCSeccion;LCCNumero;LCCCutter;Ejemplar;Observaciones

use std::fs::File;
use std::io::Read;
use std::path::Path;
use serde::Deserialize;

use crate::constants::CATALOG_DELIMITER;
use crate::error::{LibraryError, Result};
use crate::ingest::normalize::{clean_text, parse_copy_number, parse_year, split_authors};

pub const REQUIRED_COLUMNS: [&str; 8] = [
    "TITULO", "Autor", "Año", "LCCSeccion", "LCCNumero", "LCCCutter", "Ejemplar", "Observaciones",
];

#[derive(Debug, Deserialize)]
struct RawCatalogRow {
    #[serde(rename = "TITULO")]
    title: Option<String>,
    #[serde(rename = "Autor")]
    authors: Option<String>,
    #[serde(rename = "Año")]
    year: Option<String>,
    #[serde(rename = "LCCSeccion")]
    lcc_section: Option<String>,
    #[serde(rename = "LCCNumero")]
    lcc_number: Option<String>,
    #[serde(rename = "LCCCutter")]
    lcc_cutter: Option<String>,
    #[serde(rename = "Ejemplar")]
    copy_number: Option<String>,
    #[serde(rename = "Observaciones")]
    notes: Option<String>,
}

/// One catalog row after cleanup
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub title: Option<String>,
    /// Author cell exactly as read; part of the book identity
    pub raw_authors: Option<String>,
    pub year: Option<i32>,
    pub lcc_section: Option<String>,
    pub lcc_number: Option<String>,
    pub lcc_cutter: Option<String>,
    /// Requested copy number; None when blank or not numeric
    pub copy_number: Option<i64>,
    pub notes: Option<String>,
}

/// Identity of a book: lowercased title, raw author cell, year, LCC triple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookKey {
    pub title: String,
    pub raw_authors: Option<String>,
    pub year: Option<i32>,
    pub lcc_section: Option<String>,
    pub lcc_number: Option<String>,
    pub lcc_cutter: Option<String>,
}

impl CatalogRecord {
    fn from_raw(row: usize, raw: RawCatalogRow) -> Self {
        let cleaned = |v: &Option<String>| v.as_deref().and_then(clean_text);
        CatalogRecord {
            row,
            title: cleaned(&raw.title),
            year: raw.year.as_deref().and_then(parse_year),
            lcc_section: cleaned(&raw.lcc_section),
            lcc_number: cleaned(&raw.lcc_number),
            lcc_cutter: cleaned(&raw.lcc_cutter),
            copy_number: raw.copy_number.as_deref().and_then(parse_copy_number),
            notes: cleaned(&raw.notes),
            raw_authors: raw.authors.filter(|a| !a.trim().is_empty()),
        }
    }

    /// Book identity; rows without a title have none
    pub fn book_key(&self) -> Option<BookKey> {
        let title = self.title.as_ref()?;
        Some(BookKey {
            title: title.to_lowercase(),
            raw_authors: self.raw_authors.clone(),
            year: self.year,
            lcc_section: self.lcc_section.clone(),
            lcc_number: self.lcc_number.clone(),
            lcc_cutter: self.lcc_cutter.clone(),
        })
    }

    /// Individual author names from the author cell
    pub fn author_names(&self) -> Vec<String> {
        self.raw_authors
            .as_deref()
            .map(split_authors)
            .unwrap_or_default()
    }
}

/// Read a catalog file from disk
pub fn read_catalog(path: &Path) -> Result<Vec<CatalogRecord>> {
    let file = File::open(path).map_err(|e| {
        LibraryError::InvalidCatalog(format!("cannot open {}: {}", path.display(), e))
    })?;
    let records = read_catalog_from(file)?;
    log::info!("Read {} catalog rows from {}", records.len(), path.display());
    Ok(records)
}

/// Read catalog rows from any reader
pub fn read_catalog_from<R: Read>(reader: R) -> Result<Vec<CatalogRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(CATALOG_DELIMITER)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h.trim_start_matches('\u{feff}').trim() == *col))
        .collect();
    if !missing.is_empty() {
        return Err(LibraryError::InvalidCatalog(format!(
            "missing columns: {}",
            missing.join(", ")
        )));
    }

    // Header cells may carry stray whitespace; deserialize against trimmed names
    let trimmed: csv::StringRecord = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect();
    rdr.set_headers(trimmed);

    let mut records = Vec::new();
    for (idx, result) in rdr.deserialize::<RawCatalogRow>().enumerate() {
        let raw = result?;
        records.push(CatalogRecord::from_raw(idx + 1, raw));
    }

    Ok(records)
}
