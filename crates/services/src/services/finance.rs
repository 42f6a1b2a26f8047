use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use db::models::{
    expense::Expense,
    ledger::{LedgerEntry, LedgerKind},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;
use utils::format::{format_currency, format_date_long, percent};

use super::dashboard::{MonthlyPoint, Movement, monthly_series};

/// Longest range a summary covers, in months.
const MAX_MONTHS: u32 = 36;

#[derive(Debug, Error)]
pub enum FinanceError {
    #[error("invalid range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Outflow share of one category label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct OutflowCategory {
    pub label: String,
    pub total_cents: i64,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct FinanceSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub balance_cents: i64,
    pub labels: FinanceLabels,
    pub by_category: Vec<OutflowCategory>,
    pub monthly: Vec<MonthlyPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct FinanceLabels {
    pub period: String,
    pub income: String,
    pub expense: String,
    pub balance: String,
}

fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    let span = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32 + 1;
    (span.max(1) as u32).min(MAX_MONTHS)
}

/// Folds ledger entries and project expenses into one summary.
///
/// Ledger categories are free text and merge with project expense categories
/// by their display label, so "Materiales" typed by hand and
/// [`ExpenseCategory::Materials`](db::models::expense::ExpenseCategory::Materials)
/// land in the same bucket.
pub fn summarize(
    ledger: &[LedgerEntry],
    expenses: &[Expense],
    from: NaiveDate,
    to: NaiveDate,
    currency: &str,
) -> FinanceSummary {
    let in_range = |date: NaiveDate| date >= from && date <= to;

    let mut income_cents = 0;
    let mut outflows: BTreeMap<String, i64> = BTreeMap::new();
    for entry in ledger.iter().filter(|e| in_range(e.entry_date)) {
        match entry.kind {
            LedgerKind::Income => income_cents += entry.amount_cents,
            LedgerKind::Expense => {
                let label = entry.category.trim();
                let label = if label.is_empty() { "Otros" } else { label };
                *outflows.entry(label.to_string()).or_default() += entry.amount_cents;
            }
        }
    }
    for expense in expenses.iter().filter(|e| in_range(e.expense_date)) {
        *outflows
            .entry(expense.category.label().to_string())
            .or_default() += expense.amount_cents;
    }

    let expense_cents: i64 = outflows.values().sum();
    let mut by_category: Vec<OutflowCategory> = outflows
        .into_iter()
        .map(|(label, total_cents)| OutflowCategory {
            pct: percent(total_cents, expense_cents),
            label,
            total_cents,
        })
        .collect();
    by_category.sort_by(|a, b| b.total_cents.cmp(&a.total_cents));

    let movements = ledger
        .iter()
        .filter(|e| in_range(e.entry_date))
        .map(Movement::from)
        .chain(
            expenses
                .iter()
                .filter(|e| in_range(e.expense_date))
                .map(Movement::from),
        );
    let monthly = monthly_series(
        movements,
        (from.year(), from.month()),
        months_between(from, to),
    );

    let balance_cents = income_cents - expense_cents;
    FinanceSummary {
        from,
        to,
        income_cents,
        expense_cents,
        balance_cents,
        labels: FinanceLabels {
            period: format!("del {} al {}", format_date_long(from), format_date_long(to)),
            income: format_currency(income_cents, currency),
            expense: format_currency(expense_cents, currency),
            balance: format_currency(balance_cents, currency),
        },
        by_category,
        monthly,
    }
}

pub struct FinanceService;

impl FinanceService {
    pub async fn summary(
        pool: &SqlitePool,
        from: NaiveDate,
        to: NaiveDate,
        currency: &str,
    ) -> Result<FinanceSummary, FinanceError> {
        if from > to {
            return Err(FinanceError::InvalidRange { from, to });
        }
        let ledger = LedgerEntry::find_in_range(pool, from, to).await?;
        let expenses = Expense::find_in_range(pool, from, to).await?;
        debug!(
            %from,
            %to,
            ledger = ledger.len(),
            expenses = expenses.len(),
            "Building finance summary"
        );
        Ok(summarize(&ledger, &expenses, from, to, currency))
    }
}
