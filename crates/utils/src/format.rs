//! Display helpers for money, dates and ratios.
//!
//! Money is always carried as integer cents. Dates are rendered with Spanish
//! month names because that is what every page and exported document shows.

use chrono::{Datelike, NaiveDate};

const MONTHS_SHORT: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
];

const MONTHS_LONG: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `123456` cents → `"$1,234.56 MXN"`. An empty `currency` drops the suffix.
pub fn format_currency(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let body = format!("{}${}.{:02}", sign, group_thousands(abs / 100), abs % 100);
    if currency.is_empty() {
        body
    } else {
        format!("{} {}", body, currency)
    }
}

/// Short form for chart axes: `"$1.2M"`, `"$350K"`, `"$999"`.
pub fn format_compact_currency(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let units = cents.unsigned_abs() as f64 / 100.0;

    let body = if units >= 1_000_000.0 {
        trim_decimal(units / 1_000_000.0, "M")
    } else if units >= 1_000.0 {
        trim_decimal(units / 1_000.0, "K")
    } else {
        format!("{}", units.round() as u64)
    };
    format!("{}${}", sign, body)
}

fn trim_decimal(value: f64, suffix: &str) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}{}", rounded as u64, suffix)
    } else {
        format!("{:.1}{}", rounded, suffix)
    }
}

/// `2026-10-16` → `"16 oct 2026"`.
pub fn format_date(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        MONTHS_SHORT[date.month0() as usize],
        date.year()
    )
}

/// `2026-10-16` → `"16 de octubre de 2026"`.
pub fn format_date_long(date: NaiveDate) -> String {
    format!(
        "{} de {} de {}",
        date.day(),
        MONTHS_LONG[date.month0() as usize],
        date.year()
    )
}

/// Label for a chart bucket, e.g. `"oct 2026"`. Out-of-range months yield `"?"`.
pub fn format_month(year: i32, month: u32) -> String {
    match month {
        1..=12 => format!("{} {}", MONTHS_SHORT[(month - 1) as usize], year),
        _ => "?".to_string(),
    }
}

/// Accepts `YYYY-MM-DD` (form inputs) and `DD/MM/YYYY` (spreadsheet exports).
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%d/%m/%Y"))
        .ok()
}

/// Percentage rounded to one decimal. Zero when `whole` is not positive.
pub fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    let raw = part as f64 * 100.0 / whole as f64;
    (raw * 10.0).round() / 10.0
}

/// Days from `today` until `date`; negative when `date` is in the past.
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

pub fn relative_days(date: NaiveDate, today: NaiveDate) -> String {
    match days_until(date, today) {
        0 => "hoy".to_string(),
        1 => "mañana".to_string(),
        -1 => "ayer".to_string(),
        n if n > 1 => format!("en {} días", n),
        n => format!("hace {} días", -n),
    }
}
