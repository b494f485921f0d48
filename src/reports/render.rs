// Console rendering for reports

use std::fmt::Write;

use super::{
    BookLoans, DailyActivity, GeneralStats, LibraryReport, MonthCounts, Performance, RoleCount,
    UserLoans,
};

const RULE_WIDTH: usize = 60;
const BAR_WIDTH: i64 = 50;

/// 1234567 -> "1,234,567"
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Soles with two decimals and thousands separators: "S/ 1,234.50"
pub fn soles(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("S/ {}{}.{:02}", sign, thousands(cents / 100), cents % 100)
}

/// Clip to at most `max` characters, then pad to `max`
fn fit(text: &str, max: usize) -> String {
    let clipped: String = text.chars().take(max).collect();
    format!("{:<width$}", clipped, width = max)
}

fn header(out: &mut String, title: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    let _ = writeln!(out, "\n{}\n{}\n{}", rule, title, rule);
}

pub fn render_general(out: &mut String, stats: &GeneralStats) {
    header(out, "[REPORT 1] GENERAL STATISTICS");
    let _ = writeln!(out, "  Active users:             {}", thousands(stats.active_users));
    let _ = writeln!(out, "  Books:                    {}", thousands(stats.books));
    let _ = writeln!(out, "  Copies:                   {}", thousands(stats.copies));
    let _ = writeln!(out, "  Loans (all statuses):     {}", thousands(stats.active_loans));
    let _ = writeln!(out, "  Overdue loans:            {}", thousands(stats.overdue_loans));
    let _ = writeln!(out, "  Pending fines:            {}", thousands(stats.pending_fines));
    let _ = writeln!(out, "  Pending fines amount:     {}", soles(stats.pending_fines_amount));
}

pub fn render_months(out: &mut String, months: &MonthCounts, year: i32) {
    header(out, &format!("[REPORT 2] LOANS PER MONTH ({})", year));
    let total = months.total();
    for (label, n) in months.iter() {
        let bar = if total > 0 {
            "█".repeat((n * BAR_WIDTH / total) as usize)
        } else {
            String::new()
        };
        let _ = writeln!(out, "  {:3}: {:4} {}", label, n, bar);
    }
    let _ = writeln!(out, "\n  Year total: {} loans", thousands(total));
}

pub fn render_top_books(out: &mut String, books: &[BookLoans]) {
    header(out, "[REPORT 3] MOST BORROWED BOOKS");
    if books.is_empty() {
        let _ = writeln!(out, "  No loans recorded");
    }
    for (i, b) in books.iter().enumerate() {
        let _ = writeln!(out, "  {:2}. {} - {:3} loans", i + 1, fit(&b.title, 50), b.loans);
    }
}

pub fn render_top_users(out: &mut String, users: &[UserLoans]) {
    header(out, "[REPORT 4] MOST ACTIVE USERS");
    if users.is_empty() {
        let _ = writeln!(out, "  No loans recorded");
    }
    for (i, u) in users.iter().enumerate() {
        let _ = writeln!(out, "  {:2}. {} - {:3} loans", i + 1, fit(&u.name, 45), u.loans);
    }
}

pub fn render_roles(out: &mut String, roles: &[RoleCount]) {
    header(out, "[REPORT 5] ACTIVE USERS BY ROLE");
    let total: i64 = roles.iter().map(|r| r.count).sum();
    for r in roles {
        let pct = if total > 0 { r.count as f64 / total as f64 * 100.0 } else { 0.0 };
        let _ = writeln!(out, "  {:20}: {:4} ({:5.1}%)", r.role, r.count, pct);
    }
}

pub fn render_daily(out: &mut String, day: &DailyActivity) {
    header(out, "[REPORT 6] DAILY ACTIVITY");
    let _ = writeln!(out, "  Date:                     {}", day.date);
    let _ = writeln!(out, "  Loans:                    {}", thousands(day.loans));
    let _ = writeln!(out, "  Returns:                  {}", thousands(day.returns));
    let _ = writeln!(out, "  Fines charged:            {}", thousands(day.fines_charged));
    let _ = writeln!(out, "  Fines paid:               {}", thousands(day.fines_paid));
}

pub fn render_performance(out: &mut String, perf: &Performance) {
    header(out, "[REPORT 7] LIBRARY PERFORMANCE");
    let _ = writeln!(out, "  Period:                   {} months", perf.months);
    let _ = writeln!(out, "  From:                     {}", perf.start_date);
    let _ = writeln!(out, "  To:                       {}", perf.end_date);
    let _ = writeln!(out, "  Loans:                    {}", thousands(perf.total_loans));
    let _ = writeln!(out, "  Completed loans:          {}", thousands(perf.completed_loans));
    let _ = writeln!(out, "  Overdue loans:            {}", thousands(perf.overdue_loans));
    let _ = writeln!(out, "  Return rate:              {:.2}%", perf.return_rate);
    let _ = writeln!(out, "  Fines:                    {}", thousands(perf.total_fines));
    let _ = writeln!(out, "  Fines amount:             {}", soles(perf.fines_amount));
    let _ = writeln!(out, "  Fines paid:               {}", thousands(perf.fines_paid));
    let _ = writeln!(out, "  Payment rate:             {:.2}%", perf.payment_rate);
}

/// All seven reports as console text
pub fn render_report(report: &LibraryReport) -> String {
    let mut out = String::new();
    render_general(&mut out, &report.general);
    render_months(&mut out, &report.loans_per_month, report.year);
    render_top_books(&mut out, &report.top_books);
    render_top_users(&mut out, &report.top_users);
    render_roles(&mut out, &report.users_by_role);
    render_daily(&mut out, &report.daily_activity);
    render_performance(&mut out, &report.performance);
    out
}
