// FISI Library CLI binary

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fisi_library::constants::{DEFAULT_CATALOG_FILE, DEFAULT_REPORT_FILE};
use fisi_library::db::{self, migrations, DbCandidate};
use fisi_library::diagnostics;
use fisi_library::ingest::{self, reclaim, ImportOptions, ImportSummary};
use fisi_library::reports::{self, render, ReportOptions};
use fisi_library::seed::{self, SeedOutcome};

#[derive(Parser)]
#[command(name = "fisi-library")]
#[command(about = "FISI library database administration: catalog import, seeding, reports", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file (overrides FISI_LIBRARY_DB and the default locations)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema at the first candidate location
    Init,

    /// Replace the catalog with the contents of a CSV export
    Import {
        /// Catalog CSV (semicolon-delimited)
        #[arg(default_value = DEFAULT_CATALOG_FILE)]
        csv: PathBuf,
        /// Run the whole pipeline, then roll back
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete books that have no copies
    Reclaim,

    /// Create the system administrator account
    SeedAdmin {
        /// Use a random password instead of the default
        #[arg(long)]
        generate_password: bool,
    },

    /// Create the test professor account
    SeedProfessor,

    /// Print operational reports and save them as JSON
    Report {
        /// JSON output file
        #[arg(short, long, default_value = DEFAULT_REPORT_FILE)]
        output: PathBuf,
        /// Year for loans per month (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
        /// Rows in the top books/users reports
        #[arg(long)]
        top: Option<u32>,
        /// Day for the activity report, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Months covered by the performance report
        #[arg(long)]
        months: Option<u32>,
        /// Print only; do not write the JSON file
        #[arg(long)]
        no_save: bool,
    },

    /// Probe every candidate database location
    CheckConnection,
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(verbose)));

    // Also bridges `log` records from the library
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Failures go to stderr once; the log only records the outcome
fn exit_code(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => {
            log::info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let candidates = db::candidate_paths(cli.database.as_deref());

    let result = match cli.command {
        Commands::Init => cmd_init(&candidates),
        Commands::Import { csv, dry_run } => cmd_import(&candidates, &csv, dry_run),
        Commands::Reclaim => cmd_reclaim(&candidates),
        Commands::SeedAdmin { generate_password } => cmd_seed_admin(&candidates, generate_password),
        Commands::SeedProfessor => cmd_seed_professor(&candidates),
        Commands::Report { output, year, top, date, months, no_save } => {
            cmd_report(&candidates, &output, year, top, date, months, no_save)
        }
        Commands::CheckConnection => cmd_check_connection(&candidates),
    };

    exit_code(result)
}

fn connect(candidates: &[DbCandidate]) -> Result<rusqlite::Connection> {
    let (conn, used) = db::connect(candidates)?;
    println!("Database: {} ({})", used.path.display(), used.source);
    Ok(conn)
}

fn cmd_init(candidates: &[DbCandidate]) -> Result<()> {
    let target = candidates
        .first()
        .context("No database location available")?;

    let existed = target.path.exists();
    let conn = db::open_db(&target.path)?;
    let version = migrations::get_schema_version(&conn)?;

    if existed {
        println!("Database already present at {}", target.path.display());
    } else {
        println!("Created database at {}", target.path.display());
    }
    println!("  Source:         {}", target.source);
    println!("  Schema version: {}", version);
    Ok(())
}

fn print_import_summary(summary: &ImportSummary) {
    println!();
    println!("Import {}:", if summary.dry_run { "dry run (rolled back)" } else { "complete" });
    println!("  Rows read:              {}", summary.rows_read);
    println!("  Authors created:        {}", summary.authors_created);
    println!("  Duplicate authors:      {}", summary.duplicate_authors_removed);
    for m in &summary.merged_authors {
        println!("    '{}' -> '{}'", m.removed_name, m.kept_name);
    }
    if !summary.similar_authors.is_empty() {
        println!("  Similar names (kept):   {}", summary.similar_authors.len());
    }
    println!("  Categories:             {}", summary.categories_created);
    println!("  Books:                  {}", summary.books_created);
    println!("  Book-author links:      {}", summary.author_links_created);
    if summary.author_links_repaired > 0 {
        println!("  Links repaired:         {}", summary.author_links_repaired);
    }
    println!("  Book-category links:    {}", summary.category_links_created);
    println!("  Copies:                 {}", summary.copies_created);
    if summary.copies_renumbered > 0 {
        println!("  Copies renumbered:      {}", summary.copies_renumbered);
    }
    print_reclaim_summary(&summary.reclaim);

    let counts = &summary.final_counts;
    println!();
    println!("Database totals:");
    println!("  Authors:    {}", counts.authors);
    println!("  Categories: {}", counts.categories);
    println!("  Books:      {}", counts.books);
    println!("  Copies:     {}", counts.copies);
    if summary.books_without_copies == 0 {
        println!("Every remaining book has at least one copy");
    } else {
        println!("WARNING: {} books still have no copies", summary.books_without_copies);
    }
}

fn print_reclaim_summary(summary: &reclaim::ReclaimSummary) {
    if summary.orphans_found == 0 {
        println!("  No orphan books found");
        return;
    }
    println!("  Orphan books found:     {}", summary.orphans_found);
    for book in &summary.sample {
        let year = book.publication_year.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string());
        println!("    - {}: '{}' ({})", book.id, book.title, year);
    }
    println!("  Books deleted:          {}", summary.books_deleted);
    println!("  Category links deleted: {}", summary.category_links_deleted);
    println!("  Author links deleted:   {}", summary.author_links_deleted);
}

fn cmd_import(candidates: &[DbCandidate], csv: &Path, dry_run: bool) -> Result<()> {
    let conn = connect(candidates)?;
    println!("Importing catalog from {}", csv.display());

    let options = ImportOptions { dry_run };
    let summary = ingest::run_catalog_import(&conn, csv, &options)
        .with_context(|| format!("Import of {} failed; no changes were kept", csv.display()))?;

    print_import_summary(&summary);
    Ok(())
}

fn cmd_reclaim(candidates: &[DbCandidate]) -> Result<()> {
    let conn = connect(candidates)?;
    let summary = reclaim::reclaim_orphan_books(&conn)?;
    println!("Orphan cleanup:");
    print_reclaim_summary(&summary);
    Ok(())
}

fn print_seed_outcome(outcome: &SeedOutcome, label: &str) {
    match outcome {
        SeedOutcome::Created { user, password } => {
            println!("{} created:", label);
            println!("  Code:     {}", user.university_code);
            println!("  Name:     {}", user.name);
            println!("  Email:    {}", user.email);
            println!("  Role:     {}", user.role);
            println!("  Password: {}", password);
            println!();
            println!("Store this password now; it is not shown again.");
        }
        SeedOutcome::AlreadyPresent(users) => {
            println!("{} already present; nothing created:", label);
            for user in users {
                println!("  {} - {} ({})", user.university_code, user.name, user.email);
            }
        }
    }
}

fn cmd_seed_admin(candidates: &[DbCandidate], generate_password: bool) -> Result<()> {
    let conn = connect(candidates)?;
    let password = generate_password.then(seed::generate_password);
    let outcome = seed::seed_admin(&conn, password)?;
    print_seed_outcome(&outcome, "Administrator");
    Ok(())
}

fn cmd_seed_professor(candidates: &[DbCandidate]) -> Result<()> {
    let conn = connect(candidates)?;
    let outcome = seed::seed_professor(&conn, None)?;
    print_seed_outcome(&outcome, "Test professor");
    Ok(())
}

fn cmd_report(
    candidates: &[DbCandidate],
    output: &Path,
    year: Option<i32>,
    top: Option<u32>,
    date: Option<NaiveDate>,
    months: Option<u32>,
    no_save: bool,
) -> Result<()> {
    let conn = connect(candidates)?;

    let mut options = ReportOptions::default();
    if let Some(year) = year {
        options.year = year;
    }
    if let Some(top) = top {
        options.top_limit = top;
    }
    if let Some(date) = date {
        options.activity_date = date;
    }
    if let Some(months) = months {
        options.performance_months = months;
    }

    let report = reports::generate_report(&conn, &options)?;
    print!("{}", render::render_report(&report));

    if !no_save {
        reports::save_json(&report, output)
            .with_context(|| format!("Could not write {}", output.display()))?;
        println!();
        println!("Reports saved to {}", output.display());
    }
    Ok(())
}

fn cmd_check_connection(candidates: &[DbCandidate]) -> Result<()> {
    let probes = diagnostics::probe_all(candidates);

    for (i, probe) in probes.iter().enumerate() {
        println!("[{}] {} ({})", i + 1, probe.path, probe.source);
        if !probe.exists {
            println!("    not found");
            continue;
        }
        if let Some(size) = &probe.db_size {
            println!("    size:           {}", size);
        }
        if !probe.opened {
            println!("    open failed:    {}", probe.error.as_deref().unwrap_or("unknown error"));
            continue;
        }
        if let Some(v) = &probe.sqlite_version {
            println!("    SQLite:         {}", v);
        }
        if let Some(v) = probe.schema_version {
            println!("    schema version: {} (this build: {})", v, probe.expected_schema_version);
        }
        if probe.missing_tables.is_empty() {
            println!("    library schema: present");
        } else {
            println!("    missing tables: {}", probe.missing_tables.join(", "));
        }
    }

    println!();
    let usable: Vec<_> = probes.iter().filter(|p| p.is_usable()).collect();
    if usable.is_empty() {
        println!("No usable database found. Next steps:");
        for (i, step) in diagnostics::remediation_steps().iter().enumerate() {
            println!("  {}. {}", i + 1, step);
        }
        anyhow::bail!("no usable database location");
    }

    println!("Usable databases:");
    for probe in usable {
        println!("  {} ({})", probe.path, probe.source);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(1), "info");
        assert_eq!(log_level(2), "debug");
        assert_eq!(log_level(9), "trace");
    }

    #[test]
    fn test_report_flags_parse() {
        let cli = Cli::try_parse_from(["fisi-library", "report", "--months", "4294967295", "--no-save"]).unwrap();
        let Commands::Report { months, no_save, .. } = cli.command else {
            panic!("expected report");
        };
        assert_eq!(months, Some(u32::MAX));
        assert!(no_save);
    }

    #[test]
    fn test_exit_code_reflects_result() {
        assert_eq!(exit_code(Ok(())), ExitCode::SUCCESS);
        assert_eq!(exit_code(Err(anyhow::anyhow!("no usable database location"))), ExitCode::FAILURE);
    }

    #[test]
    fn test_oversized_report_window_fails_cleanly() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        let mut options = ReportOptions::default();
        options.performance_months = u32::MAX;

        let result = reports::generate_report(&conn, &options).map(|_| ()).map_err(anyhow::Error::from);
        assert_eq!(exit_code(result), ExitCode::FAILURE);
    }
}
