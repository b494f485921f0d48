// FISI Library Constants
// Values shared by the import pipeline, seeding, reports and diagnostics.

// Database location
pub const DB_FILENAME: &str = "biblioteca_fisi.db";
pub const APP_DB_DIR: &str = ".fisi-library";
pub const DB_PATH_ENV: &str = "FISI_LIBRARY_DB";
pub const DB_BUSY_TIMEOUT_MS: u32 = 5000;

// Catalog CSV
pub const CATALOG_DELIMITER: u8 = b';';
pub const DEFAULT_CATALOG_FILE: &str = "CATALOGO DE LIBROS FISI RC.csv";
pub const AUTHOR_SEPARATOR: char = ',';

// Plausible publication years; anything outside is stored as NULL
pub const MIN_PUBLICATION_YEAR: i32 = 1800;
pub const MAX_PUBLICATION_YEAR: i32 = 2030;

// Book defaults
pub const DEFAULT_LANGUAGE: &str = "Español";

// Copy defaults
pub const BARCODE_PREFIX: &str = "FISI";
pub const DEFAULT_COPY_NUMBER: i64 = 1;
pub const DEFAULT_COPY_LOCATION: &str = "Estante Principal";
pub const COPY_STATUS_AVAILABLE: &str = "Disponible";

// Author placeholder identifiers (ORCID000001, ORCID000002, ...)
pub const ORCID_PLACEHOLDER_PREFIX: &str = "ORCID";

// Progress logging interval (rows)
pub const PROGRESS_INTERVAL: usize = 100;

// Orphans listed in the console summary
pub const ORPHAN_SAMPLE_SIZE: usize = 3;

// Names at or above this ratio are reported as possible duplicates (never merged)
pub const AUTHOR_SIMILARITY_HINT: f64 = 0.9;

// ----- Users -----

pub const ROLE_ADMIN: &str = "Administrador";
pub const ROLE_PROFESSOR: &str = "Profesor";

pub const ADMIN_CODE: &str = "12345678";
pub const ADMIN_NAME: &str = "Administrador del Sistema";
pub const ADMIN_EMAIL: &str = "admin@unmsm.edu.pe";
pub const ADMIN_DEFAULT_PASSWORD: &str = "Admin123!";

pub const PROFESSOR_CODE: &str = "87654321";
pub const PROFESSOR_NAME: &str = "Profesor de Prueba";
pub const PROFESSOR_EMAIL: &str = "profesor@unmsm.edu.pe";
pub const PROFESSOR_DEFAULT_PASSWORD: &str = "Profesor123!";

pub const GENERATED_PASSWORD_LENGTH: usize = 12;
pub const GENERATED_PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";

// ----- Loans and fines -----

pub const LOAN_STATUS_LOANED: &str = "Prestado";
pub const LOAN_STATUS_OVERDUE: &str = "Atrasado";
pub const LOAN_STATUS_RETURNED: &str = "Devuelto";

pub const FINE_STATUS_PENDING: &str = "Pendiente";
pub const FINE_STATUS_PAID: &str = "Pagada";

// ----- Reports -----

pub const DEFAULT_REPORT_FILE: &str = "reportes_biblioteca.json";
pub const DEFAULT_TOP_LIMIT: u32 = 10;
pub const DEFAULT_PERFORMANCE_MONTHS: u32 = 6;
pub const DAYS_PER_REPORT_MONTH: i64 = 30;
pub const MONTH_LABELS: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun",
    "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];

// Tables every library database must have
pub const REQUIRED_TABLES: [&str; 9] = [
    "users", "books", "authors", "categories", "book_authors",
    "book_categories", "copies", "loans", "fines",
];
