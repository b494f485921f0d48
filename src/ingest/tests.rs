// Import pipeline tests

use super::*;
use crate::catalog::read_catalog_from;
use crate::db::schema::{self, NewBook};
use std::io::Write as IoWrite;
use tempfile::TempDir;

const HEADER: &str = "TITULO;Autor;Año;LCCSeccion;LCCNumero;LCCCutter;Ejemplar;Observaciones\n";

/// In-memory DB with all migrations applied
fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    crate::db::migrations::run_migrations(&conn).unwrap();
    conn
}

fn records(rows: &[&str]) -> Vec<CatalogRecord> {
    let mut data = HEADER.to_string();
    for row in rows {
        data.push_str(row);
        data.push('\n');
    }
    read_catalog_from(data.as_bytes()).unwrap()
}

fn sample_catalog() -> Vec<CatalogRecord> {
    records(&[
        "Redes de Computadoras;Tanenbaum, Wetherall;2012;TK;5105.5;T36;1;",
        "Redes de Computadoras;Tanenbaum, Wetherall;2012;TK;5105.5;T36;2;Lomo dañado",
        "Sistemas Operativos Modernos;Tanenbaum;2009;QA;76.76;T36;1;",
        "Cálculo de una variable;Stewart;1750;QA;303;S74;1;",
        "Introducción a la teoría de la computación;Sipser;2006;QA;267;S57;x;",
    ])
}

fn copy_numbers(conn: &Connection, title: &str) -> Vec<i64> {
    let mut stmt = conn
        .prepare(
            "SELECT c.copy_number FROM copies c JOIN books b ON b.id = c.book_id
             WHERE b.title = ?1 ORDER BY c.copy_number",
        )
        .unwrap();
    stmt.query_map([title], |row| row.get(0))
        .unwrap()
        .collect::<std::result::Result<Vec<i64>, _>>()
        .unwrap()
}

#[test]
fn test_import_creates_catalog() {
    let conn = setup_test_db();
    let summary = import_records(&conn, &sample_catalog(), &ImportOptions::default()).unwrap();

    assert_eq!(summary.rows_read, 5);
    assert_eq!(summary.authors_created, 4);
    assert_eq!(summary.categories_created, 2);
    assert_eq!(summary.books_created, 4);
    assert_eq!(summary.copies_created, 5);
    assert_eq!(summary.books_without_copies, 0);

    let counts = &summary.final_counts;
    assert_eq!(counts.authors, 4);
    assert_eq!(counts.books, 4);
    assert_eq!(counts.copies, 5);
    // Redes -> 2 authors, the other three books -> 1 each
    assert_eq!(counts.book_authors, 5);
    assert_eq!(counts.book_categories, 4);
}

#[test]
fn test_reimport_is_idempotent() {
    let conn = setup_test_db();
    let catalog = sample_catalog();

    let first = import_records(&conn, &catalog, &ImportOptions::default()).unwrap();
    let second = import_records(&conn, &catalog, &ImportOptions::default()).unwrap();

    assert_eq!(first.final_counts, second.final_counts);
    assert_eq!(schema::catalog_counts(&conn).unwrap(), first.final_counts);
}

#[test]
fn test_placeholder_orcids_follow_creation_order() {
    let conn = setup_test_db();
    import_records(&conn, &sample_catalog(), &ImportOptions::default()).unwrap();

    let authors = schema::list_authors(&conn).unwrap();
    let orcids: Vec<&str> = authors.iter().filter_map(|a| a.orcid.as_deref()).collect();
    assert_eq!(orcids, vec!["ORCID000001", "ORCID000002", "ORCID000003", "ORCID000004"]);
    assert_eq!(authors[0].name, "Tanenbaum");
    assert_eq!(authors[1].name, "Wetherall");
}

#[test]
fn test_out_of_range_year_and_bad_copy_number() {
    let conn = setup_test_db();
    import_records(&conn, &sample_catalog(), &ImportOptions::default()).unwrap();

    let year: Option<i32> = conn
        .query_row(
            "SELECT publication_year FROM books WHERE title = 'Cálculo de una variable'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(year, None);

    // Non-numeric Ejemplar falls back to copy 1
    assert_eq!(copy_numbers(&conn, "Introducción a la teoría de la computación"), vec![1]);
}

#[test]
fn test_accent_variants_merge_and_books_are_relinked() {
    let conn = setup_test_db();
    let catalog = records(&[
        "Los ríos profundos;José María Arguedas;1958;PQ;8497;A65;1;",
        "Todas las sangres;Jose  Maria ARGUEDAS;1964;PQ;8497;A66;1;",
    ]);

    let summary = import_records(&conn, &catalog, &ImportOptions::default()).unwrap();

    assert_eq!(summary.authors_created, 2);
    assert_eq!(summary.duplicate_authors_removed, 1);
    assert_eq!(summary.merged_authors[0].kept_name, "José María Arguedas");
    assert_eq!(summary.author_links_created, 1);
    assert_eq!(summary.author_links_repaired, 1);

    let authors = schema::list_authors(&conn).unwrap();
    assert_eq!(authors.len(), 1);
    assert!(schema::books_without_authors(&conn).unwrap().is_empty());
    assert_eq!(summary.final_counts.book_authors, 2);
}

#[test]
fn test_colliding_copy_numbers_are_probed() {
    let conn = setup_test_db();
    let catalog = records(&[
        "Compiladores;Aho, Sethi, Ullman;1986;QA;76.76;C65;1;",
        "Compiladores;Aho, Sethi, Ullman;1986;QA;76.76;C65;2;",
        "Compiladores;Aho, Sethi, Ullman;1986;QA;76.76;C65;1;",
    ]);

    let summary = import_records(&conn, &catalog, &ImportOptions::default()).unwrap();
    assert_eq!(summary.books_created, 1);
    assert_eq!(summary.copies_renumbered, 1);
    assert_eq!(copy_numbers(&conn, "Compiladores"), vec![1, 2, 3]);

    let book_id: i64 = conn
        .query_row("SELECT id FROM books WHERE title = 'Compiladores'", [], |row| row.get(0))
        .unwrap();
    let copies = schema::list_copies_for_book(&conn, book_id).unwrap();
    assert_eq!(copies[2].barcode, copies::barcode(book_id, 3));
    assert!(copies.iter().all(|c| c.status == "Disponible"));
    assert!(copies.iter().all(|c| c.location.as_deref() == Some("Estante Principal")));
}

#[test]
fn test_title_case_variants_share_a_book() {
    let conn = setup_test_db();
    let catalog = records(&[
        "Física Universitaria;Sears;2004;QC;21;S43;1;",
        "  física universitaria ;Sears;2004;QC;21;S43;1;",
    ]);

    let summary = import_records(&conn, &catalog, &ImportOptions::default()).unwrap();
    assert_eq!(summary.books_created, 1);
    assert_eq!(copy_numbers(&conn, "Física Universitaria"), vec![1, 2]);
}

#[test]
fn test_untitled_rows_are_skipped() {
    let conn = setup_test_db();
    let catalog = records(&[
        ";Anónimo;2001;QA;1;A1;1;",
        "Álgebra Lineal;Grossman;2008;QA;184;G76;1;",
    ]);

    let summary = import_records(&conn, &catalog, &ImportOptions::default()).unwrap();
    assert_eq!(summary.books_created, 1);
    assert_eq!(summary.copies_created, 1);
    // The author of the skipped row is still created
    assert_eq!(summary.authors_created, 2);
}

#[test]
fn test_dry_run_rolls_back() {
    let conn = setup_test_db();
    let committed = import_records(&conn, &sample_catalog(), &ImportOptions::default()).unwrap();

    let other = records(&["Compiladores;Aho;1986;QA;76.76;C65;1;"]);
    let dry = import_records(&conn, &other, &ImportOptions { dry_run: true }).unwrap();

    assert!(dry.dry_run);
    assert_eq!(dry.final_counts.books, 1);
    assert_eq!(schema::catalog_counts(&conn).unwrap(), committed.final_counts);
}

#[test]
fn test_failed_import_leaves_catalog_untouched() {
    let conn = setup_test_db();
    let committed = import_records(&conn, &sample_catalog(), &ImportOptions::default()).unwrap();

    // A loan pins a copy, so wiping the catalog violates a foreign key
    conn.execute_batch(
        "INSERT INTO users (university_code, name, email, password_hash)
         VALUES ('20200001', 'Ana', 'ana@unmsm.edu.pe', 'x');
         INSERT INTO loans (copy_id, user_id, due_at)
         VALUES ((SELECT MIN(id) FROM copies), 1, datetime('now', '+7 days'));",
    )
    .unwrap();

    let result = import_records(&conn, &sample_catalog(), &ImportOptions::default());
    assert!(result.is_err());
    assert_eq!(schema::catalog_counts(&conn).unwrap(), committed.final_counts);
}

#[test]
fn test_reclaim_removes_books_without_copies() {
    let conn = setup_test_db();
    import_records(&conn, &sample_catalog(), &ImportOptions::default()).unwrap();

    let orphan = schema::insert_book(&conn, &NewBook {
        title: "Libro sin ejemplares".to_string(),
        publication_year: Some(2010),
        language: "Español".to_string(),
        lcc_section: Some("QA".to_string()),
        lcc_number: None,
        lcc_cutter: None,
    })
    .unwrap();
    let author = schema::list_authors(&conn).unwrap()[0].id;
    schema::link_book_author(&conn, orphan, author).unwrap();
    let category = schema::find_category_by_name(&conn, "QA").unwrap().unwrap();
    schema::link_book_category(&conn, orphan, category).unwrap();

    let summary = reclaim::reclaim_orphan_books(&conn).unwrap();
    assert_eq!(summary.orphans_found, 1);
    assert_eq!(summary.sample[0].id, orphan);
    assert_eq!(summary.books_deleted, 1);
    assert_eq!(summary.category_links_deleted, 1);
    assert_eq!(summary.author_links_deleted, 1);
    assert_eq!(schema::count_books_without_copies(&conn).unwrap(), 0);

    // Nothing left to reclaim
    let again = reclaim::reclaim_orphan_books(&conn).unwrap();
    assert_eq!(again.orphans_found, 0);
    assert_eq!(again.books_deleted, 0);
}

#[test]
fn test_run_catalog_import_from_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("catalogo.csv");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(HEADER.as_bytes()).unwrap();
        f.write_all("Estructuras de Datos;Weiss;1997;QA;76.73;W45;1;\n".as_bytes()).unwrap();
    }

    let conn = setup_test_db();
    let summary = run_catalog_import(&conn, &path, &ImportOptions::default()).unwrap();
    assert_eq!(summary.rows_read, 1);
    assert_eq!(summary.final_counts.copies, 1);

    let missing = run_catalog_import(&conn, &tmp.path().join("nope.csv"), &ImportOptions::default());
    assert!(matches!(missing, Err(crate::error::LibraryError::InvalidCatalog(_))));
}
