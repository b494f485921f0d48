// Operational reports
//
// Seven read-only queries over users, loans and fines. Each produces a flat
// record; `generate_report` bundles them into one JSON-ready document.

pub mod render;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::constants::{
    DAYS_PER_REPORT_MONTH, DEFAULT_PERFORMANCE_MONTHS, DEFAULT_TOP_LIMIT, FINE_STATUS_PAID,
    FINE_STATUS_PENDING, LOAN_STATUS_LOANED, LOAN_STATUS_OVERDUE, LOAN_STATUS_RETURNED,
    MONTH_LABELS,
};
use crate::error::{LibraryError, Result};

const SQL_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Year for the loans-per-month report
    pub year: i32,
    pub top_limit: u32,
    /// Day for the daily activity report
    pub activity_date: NaiveDate,
    pub performance_months: u32,
    /// Reference time for overdue checks and the performance window
    pub now: NaiveDateTime,
}

impl ReportOptions {
    /// Defaults relative to `now`: current year, today, top 10, 6 months
    pub fn at(now: NaiveDateTime) -> Self {
        ReportOptions {
            year: now.year(),
            top_limit: DEFAULT_TOP_LIMIT,
            activity_date: now.date(),
            performance_months: DEFAULT_PERFORMANCE_MONTHS,
            now,
        }
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::at(Local::now().naive_local())
    }
}

fn sql_time(t: &NaiveDateTime) -> String {
    t.format(SQL_DATETIME).to_string()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of part over whole, 0 when whole is 0
fn rate(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        round2(part as f64 / whole as f64 * 100.0)
    } else {
        0.0
    }
}

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<i64> {
    Ok(conn.query_row(sql, params, |row| row.get(0))?)
}

// ----- 1. General statistics -----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralStats {
    pub active_users: i64,
    pub books: i64,
    pub copies: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
    pub pending_fines: i64,
    pub pending_fines_amount: f64,
}

pub fn general_stats(conn: &Connection, now: &NaiveDateTime) -> Result<GeneralStats> {
    let now = sql_time(now);

    // Counts every tracked status, returned loans included
    let active_loans = count(
        conn,
        "SELECT COUNT(*) FROM loans WHERE status IN (?1, ?2, ?3)",
        params![LOAN_STATUS_LOANED, LOAN_STATUS_OVERDUE, LOAN_STATUS_RETURNED],
    )?;
    let overdue_loans = count(
        conn,
        "SELECT COUNT(*) FROM loans
         WHERE status = ?1 OR (status = ?2 AND due_at < ?3)",
        params![LOAN_STATUS_OVERDUE, LOAN_STATUS_LOANED, now],
    )?;
    let (pending_fines, pending_fines_amount): (i64, f64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0.0) FROM fines WHERE status = ?1",
        params![FINE_STATUS_PENDING],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(GeneralStats {
        active_users: count(conn, "SELECT COUNT(*) FROM users WHERE active = 1", [])?,
        books: count(conn, "SELECT COUNT(*) FROM books", [])?,
        copies: count(conn, "SELECT COUNT(*) FROM copies", [])?,
        active_loans,
        overdue_loans,
        pending_fines,
        pending_fines_amount: round2(pending_fines_amount),
    })
}

// ----- 2. Loans per month -----

/// Loan counts for all twelve months, in calendar order
#[derive(Debug, Clone, PartialEq)]
pub struct MonthCounts(pub [i64; 12]);

impl MonthCounts {
    pub fn total(&self) -> i64 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        MONTH_LABELS.iter().copied().zip(self.0.iter().copied())
    }
}

impl Serialize for MonthCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(12))?;
        for (label, n) in self.iter() {
            map.serialize_entry(label, &n)?;
        }
        map.end()
    }
}

pub fn loans_per_month(conn: &Connection, year: i32) -> Result<MonthCounts> {
    let mut stmt = conn.prepare(
        "SELECT CAST(strftime('%m', loaned_at) AS INTEGER) AS month, COUNT(*)
         FROM loans
         WHERE strftime('%Y', loaned_at) = ?1
         GROUP BY month",
    )?;
    let rows = stmt.query_map(params![format!("{:04}", year)], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = [0i64; 12];
    for row in rows {
        let (month, n) = row?;
        if (1..=12).contains(&month) {
            counts[(month - 1) as usize] = n;
        }
    }
    Ok(MonthCounts(counts))
}

// ----- 3. Most-borrowed books -----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookLoans {
    pub title: String,
    pub loans: i64,
}

pub fn top_books(conn: &Connection, limit: u32) -> Result<Vec<BookLoans>> {
    let mut stmt = conn.prepare(
        "SELECT b.title, COUNT(l.id) AS total
         FROM loans l
         JOIN copies c ON l.copy_id = c.id
         JOIN books b ON c.book_id = b.id
         GROUP BY b.id, b.title
         ORDER BY total DESC, b.title
         LIMIT ?1",
    )?;
    let books = stmt.query_map(params![limit], |row| {
        Ok(BookLoans { title: row.get(0)?, loans: row.get(1)? })
    })?
    .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(books)
}

// ----- 4. Most-active users -----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserLoans {
    pub name: String,
    pub loans: i64,
}

pub fn top_users(conn: &Connection, limit: u32) -> Result<Vec<UserLoans>> {
    let mut stmt = conn.prepare(
        "SELECT u.name, COUNT(l.id) AS total
         FROM loans l
         JOIN users u ON l.user_id = u.id
         GROUP BY u.id, u.name
         ORDER BY total DESC, u.name
         LIMIT ?1",
    )?;
    let users = stmt.query_map(params![limit], |row| {
        Ok(UserLoans { name: row.get(0)?, loans: row.get(1)? })
    })?
    .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

// ----- 5. Active users per role -----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleCount {
    pub role: String,
    pub count: i64,
}

pub fn users_by_role(conn: &Connection) -> Result<Vec<RoleCount>> {
    let mut stmt = conn.prepare(
        "SELECT role, COUNT(*) AS total
         FROM users
         WHERE active = 1
         GROUP BY role
         ORDER BY total DESC, role",
    )?;
    let roles = stmt.query_map([], |row| {
        Ok(RoleCount { role: row.get(0)?, count: row.get(1)? })
    })?
    .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(roles)
}

// ----- 6. Daily activity -----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub loans: i64,
    pub returns: i64,
    pub fines_charged: i64,
    pub fines_paid: i64,
}

pub fn daily_activity(conn: &Connection, date: NaiveDate) -> Result<DailyActivity> {
    let day = date.format("%Y-%m-%d").to_string();
    Ok(DailyActivity {
        date,
        loans: count(conn, "SELECT COUNT(*) FROM loans WHERE date(loaned_at) = ?1", params![day])?,
        returns: count(conn, "SELECT COUNT(*) FROM loans WHERE date(returned_at) = ?1", params![day])?,
        fines_charged: count(conn, "SELECT COUNT(*) FROM fines WHERE date(charged_at) = ?1", params![day])?,
        // No payment timestamp is stored; paid fines are counted by charge date
        fines_paid: count(
            conn,
            "SELECT COUNT(*) FROM fines WHERE status = ?1 AND date(charged_at) = ?2",
            params![FINE_STATUS_PAID, day],
        )?,
    })
}

// ----- 7. Performance over a window -----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performance {
    pub months: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_loans: i64,
    pub completed_loans: i64,
    pub overdue_loans: i64,
    pub return_rate: f64,
    pub total_fines: i64,
    pub fines_amount: f64,
    pub fines_paid: i64,
    pub payment_rate: f64,
}

/// Window is `months` x 30 days back from `now`
pub fn performance(conn: &Connection, months: u32, now: &NaiveDateTime) -> Result<Performance> {
    let start = Duration::try_days(months as i64 * DAYS_PER_REPORT_MONTH)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| LibraryError::Other("performance window out of range".to_string()))?;
    let since = sql_time(&start);
    let now_sql = sql_time(now);

    let total_loans = count(conn, "SELECT COUNT(*) FROM loans WHERE loaned_at >= ?1", params![since])?;
    let completed_loans = count(
        conn,
        "SELECT COUNT(*) FROM loans WHERE loaned_at >= ?1 AND status = ?2",
        params![since, LOAN_STATUS_RETURNED],
    )?;
    let overdue_loans = count(
        conn,
        "SELECT COUNT(*) FROM loans
         WHERE loaned_at >= ?1 AND (status = ?2 OR (status = ?3 AND due_at < ?4))",
        params![since, LOAN_STATUS_OVERDUE, LOAN_STATUS_LOANED, now_sql],
    )?;
    let (total_fines, fines_amount): (i64, f64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0.0) FROM fines WHERE charged_at >= ?1",
        params![since],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let fines_paid = count(
        conn,
        "SELECT COUNT(*) FROM fines WHERE charged_at >= ?1 AND status = ?2",
        params![since, FINE_STATUS_PAID],
    )?;

    Ok(Performance {
        months,
        start_date: start.date(),
        end_date: now.date(),
        total_loans,
        completed_loans,
        overdue_loans,
        return_rate: rate(completed_loans, total_loans),
        total_fines,
        fines_amount: round2(fines_amount),
        fines_paid,
        payment_rate: rate(fines_paid, total_fines),
    })
}

// ----- Combined document -----

#[derive(Debug, Clone, Serialize)]
pub struct LibraryReport {
    pub generated_at: NaiveDateTime,
    pub general: GeneralStats,
    pub year: i32,
    pub loans_per_month: MonthCounts,
    pub top_books: Vec<BookLoans>,
    pub top_users: Vec<UserLoans>,
    pub users_by_role: Vec<RoleCount>,
    pub daily_activity: DailyActivity,
    pub performance: Performance,
}

/// Run all seven reports
pub fn generate_report(conn: &Connection, options: &ReportOptions) -> Result<LibraryReport> {
    log::info!("Generating reports");
    Ok(LibraryReport {
        generated_at: options.now,
        general: general_stats(conn, &options.now)?,
        year: options.year,
        loans_per_month: loans_per_month(conn, options.year)?,
        top_books: top_books(conn, options.top_limit)?,
        top_users: top_users(conn, options.top_limit)?,
        users_by_role: users_by_role(conn)?,
        daily_activity: daily_activity(conn, options.activity_date)?,
        performance: performance(conn, options.performance_months, &options.now)?,
    })
}

/// Write the report as pretty-printed UTF-8 JSON
pub fn save_json(report: &LibraryReport, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    log::info!("Report written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        crate::db::migrations::run_migrations(&conn).unwrap();
        conn
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, SQL_DATETIME).unwrap()
    }

    /// Two books, three copies, three users, five loans, three fines
    fn seed_activity(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO users (id, university_code, name, email, password_hash, role, active) VALUES
                (1, '10000001', 'Ana', 'ana@unmsm.edu.pe', 'x', 'Estudiante', 1),
                (2, '10000002', 'Bruno', 'bruno@unmsm.edu.pe', 'x', 'Estudiante', 1),
                (3, '10000003', 'Carla', 'carla@unmsm.edu.pe', 'x', 'Profesor', 1),
                (4, '10000004', 'Dario', 'dario@unmsm.edu.pe', 'x', 'Estudiante', 0);
             INSERT INTO books (id, title) VALUES (1, 'Redes'), (2, 'Compiladores');
             INSERT INTO copies (id, book_id, copy_number, barcode) VALUES
                (1, 1, 1, 'FISI000001001'),
                (2, 1, 2, 'FISI000001002'),
                (3, 2, 1, 'FISI000002001');
             INSERT INTO loans (id, copy_id, user_id, loaned_at, due_at, returned_at, status) VALUES
                (1, 1, 1, '2025-01-10 09:00:00', '2025-01-17 09:00:00', '2025-01-15 10:00:00', 'Devuelto'),
                (2, 2, 1, '2025-03-02 09:00:00', '2025-03-09 09:00:00', NULL, 'Atrasado'),
                (3, 3, 2, '2025-03-05 11:00:00', '2025-03-12 11:00:00', '2025-03-05 17:00:00', 'Devuelto'),
                (4, 1, 3, '2025-03-05 12:00:00', '2025-03-30 12:00:00', NULL, 'Prestado'),
                (5, 1, 2, '2024-12-20 12:00:00', '2025-01-20 12:00:00', NULL, 'Prestado');
             INSERT INTO fines (loan_id, user_id, amount, status, days_late, charged_at) VALUES
                (2, 1, 5.5, 'Pendiente', 3, '2025-03-12 08:00:00'),
                (5, 2, 10.25, 'Pendiente', 40, '2025-03-05 08:00:00'),
                (1, 1, 2.0, 'Pagada', 1, '2025-03-05 09:30:00');",
        )
        .unwrap();
    }

    #[test]
    fn test_general_stats() {
        let conn = setup();
        seed_activity(&conn);
        let stats = general_stats(&conn, &at("2025-03-15 00:00:00")).unwrap();

        assert_eq!(stats.active_users, 3);
        assert_eq!(stats.books, 2);
        assert_eq!(stats.copies, 3);
        assert_eq!(stats.active_loans, 5);
        // Loan 2 is Atrasado, loan 5 is Prestado and past due
        assert_eq!(stats.overdue_loans, 2);
        assert_eq!(stats.pending_fines, 2);
        assert!((stats.pending_fines_amount - 15.75).abs() < 1e-9);
    }

    #[test]
    fn test_loans_per_month_zero_fills() {
        let conn = setup();
        seed_activity(&conn);
        let months = loans_per_month(&conn, 2025).unwrap();

        assert_eq!(months.0, [1, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(months.total(), 4);

        let json = serde_json::to_string(&months).unwrap();
        assert!(json.starts_with(r#"{"Ene":1,"Feb":0,"Mar":3"#));
        assert!(json.ends_with(r#""Dic":0}"#));
    }

    #[test]
    fn test_top_books_and_users() {
        let conn = setup();
        seed_activity(&conn);

        let books = top_books(&conn, 10).unwrap();
        assert_eq!(books[0], BookLoans { title: "Redes".to_string(), loans: 4 });
        assert_eq!(books[1].loans, 1);

        let users = top_users(&conn, 1).unwrap();
        assert_eq!(users.len(), 1);
        // Ana and Bruno both have two loans; ties break by name
        assert_eq!(users[0].name, "Ana");
    }

    #[test]
    fn test_users_by_role_counts_active_only() {
        let conn = setup();
        seed_activity(&conn);
        let roles = users_by_role(&conn).unwrap();
        assert_eq!(roles[0], RoleCount { role: "Estudiante".to_string(), count: 2 });
        assert_eq!(roles[1], RoleCount { role: "Profesor".to_string(), count: 1 });
    }

    #[test]
    fn test_daily_activity() {
        let conn = setup();
        seed_activity(&conn);
        let day = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let activity = daily_activity(&conn, day).unwrap();

        assert_eq!(activity.loans, 2);
        assert_eq!(activity.returns, 1);
        assert_eq!(activity.fines_charged, 2);
        assert_eq!(activity.fines_paid, 1);
    }

    #[test]
    fn test_performance_window_and_rates() {
        let conn = setup();
        seed_activity(&conn);
        // 2 months = 60 days back from 2025-03-20 -> 2025-01-19
        let perf = performance(&conn, 2, &at("2025-03-20 00:00:00")).unwrap();

        assert_eq!(perf.start_date, NaiveDate::from_ymd_opt(2025, 1, 19).unwrap());
        assert_eq!(perf.total_loans, 3);
        assert_eq!(perf.completed_loans, 1);
        assert_eq!(perf.overdue_loans, 1);
        assert_eq!(perf.return_rate, 33.33);
        assert_eq!(perf.total_fines, 3);
        assert_eq!(perf.fines_amount, 17.75);
        assert_eq!(perf.fines_paid, 1);
        assert_eq!(perf.payment_rate, 33.33);
    }

    #[test]
    fn test_performance_window_out_of_range_is_an_error() {
        let conn = setup();
        let now = at("2025-03-20 00:00:00");

        for months in [10_000_000, u32::MAX] {
            let err = performance(&conn, months, &now).unwrap_err();
            assert!(matches!(err, LibraryError::Other(_)));
        }
        let mut options = ReportOptions::at(now);
        options.performance_months = u32::MAX;
        assert!(generate_report(&conn, &options).is_err());
    }

    #[test]
    fn test_empty_database_reports_zeroes() {
        let conn = setup();
        let report = generate_report(&conn, &ReportOptions::at(at("2025-06-01 12:00:00"))).unwrap();

        assert_eq!(report.general.active_loans, 0);
        assert_eq!(report.loans_per_month.total(), 0);
        assert!(report.top_books.is_empty());
        assert_eq!(report.performance.return_rate, 0.0);
        assert_eq!(report.performance.payment_rate, 0.0);
    }

    #[test]
    fn test_save_json() {
        let conn = setup();
        seed_activity(&conn);
        let report = generate_report(&conn, &ReportOptions::at(at("2025-03-20 00:00:00"))).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reportes.json");
        save_json(&report, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["generated_at"], "2025-03-20T00:00:00");
        assert_eq!(value["loans_per_month"]["Mar"], 3);
        assert_eq!(value["general"]["books"], 2);
        assert_eq!(value["performance"]["months"], 6);
    }
}
