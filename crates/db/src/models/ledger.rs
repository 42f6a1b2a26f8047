use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use utils::filter::Searchable;
use uuid::Uuid;

use super::merge_text;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, EnumIter, Display,
)]
#[sqlx(type_name = "ledger_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LedgerKind {
    Income,
    Expense,
}

/// A company-level income or expense movement.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub kind: LedgerKind,
    pub category: String,
    pub description: String,
    pub amount_cents: i64,
    pub entry_date: NaiveDate,
    pub reference: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateLedgerEntry {
    pub project_id: Option<Uuid>,
    pub kind: LedgerKind,
    pub category: String,
    pub description: String,
    pub amount_cents: i64,
    pub entry_date: NaiveDate,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateLedgerEntry {
    pub project_id: Option<Uuid>,
    pub kind: Option<LedgerKind>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub amount_cents: Option<i64>,
    pub entry_date: Option<NaiveDate>,
    pub reference: Option<String>,
}

const LEDGER_COLUMNS: &str = "id, project_id, kind, category, description, amount_cents, entry_date, reference, created_by, created_at, updated_at";

impl Searchable for LedgerEntry {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.description.as_str(), self.category.as_str()];
        fields.extend(self.reference.as_deref());
        fields
    }

    fn status_key(&self) -> Option<String> {
        Some(self.kind.to_string())
    }

    fn date_key(&self) -> Option<NaiveDate> {
        Some(self.entry_date)
    }
}

impl LedgerEntry {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_entries ORDER BY entry_date DESC, created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_in_range(
        pool: &SqlitePool,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"SELECT {LEDGER_COLUMNS} FROM ledger_entries
               WHERE entry_date >= $1 AND entry_date <= $2
               ORDER BY entry_date ASC"#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"SELECT {LEDGER_COLUMNS} FROM ledger_entries
               WHERE project_id = $1
               ORDER BY entry_date DESC"#
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateLedgerEntry,
        created_by: Option<Uuid>,
        entry_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"INSERT INTO ledger_entries (id, project_id, kind, category, description, amount_cents, entry_date, reference, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {LEDGER_COLUMNS}"#
        ))
        .bind(entry_id)
        .bind(data.project_id)
        .bind(data.kind)
        .bind(data.category.trim())
        .bind(data.description.trim())
        .bind(data.amount_cents)
        .bind(data.entry_date)
        .bind(&data.reference)
        .bind(created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateLedgerEntry,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"UPDATE ledger_entries
               SET project_id = $2, kind = $3, category = $4, description = $5,
                   amount_cents = $6, entry_date = $7, reference = $8,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {LEDGER_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.project_id.or(existing.project_id))
        .bind(data.kind.unwrap_or(existing.kind))
        .bind(data.category.clone().unwrap_or(existing.category))
        .bind(data.description.clone().unwrap_or(existing.description))
        .bind(data.amount_cents.unwrap_or(existing.amount_cents))
        .bind(data.entry_date.unwrap_or(existing.entry_date))
        .bind(merge_text(&data.reference, existing.reference))
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ledger_entries WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{date, pool};

    fn entry(kind: LedgerKind, amount_cents: i64, d: NaiveDate) -> CreateLedgerEntry {
        CreateLedgerEntry {
            project_id: None,
            kind,
            category: "anticipo".into(),
            description: "Anticipo 30%".into(),
            amount_cents,
            entry_date: d,
            reference: None,
        }
    }

    #[tokio::test]
    async fn range_is_inclusive() {
        let pool = pool().await;
        for d in [date(2026, 9, 30), date(2026, 10, 1), date(2026, 10, 31), date(2026, 11, 1)] {
            LedgerEntry::create(&pool, &entry(LedgerKind::Income, 1_000, d), None, Uuid::new_v4())
                .await
                .unwrap();
        }
        let october = LedgerEntry::find_in_range(&pool, date(2026, 10, 1), date(2026, 10, 31))
            .await
            .unwrap();
        assert_eq!(october.len(), 2);
    }

    #[tokio::test]
    async fn kind_change_keeps_other_fields() {
        let pool = pool().await;
        let e = LedgerEntry::create(
            &pool,
            &entry(LedgerKind::Income, 5_000, date(2026, 10, 3)),
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert_eq!(e.kind, LedgerKind::Income);

        let flipped = LedgerEntry::update(
            &pool,
            e.id,
            &UpdateLedgerEntry {
                kind: Some(LedgerKind::Expense),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(flipped.kind, LedgerKind::Expense);
        assert_eq!(flipped.amount_cents, 5_000);
        assert_eq!(flipped.category, "anticipo");
    }

    #[tokio::test]
    async fn zero_amount_rejected() {
        let pool = pool().await;
        let result = LedgerEntry::create(
            &pool,
            &entry(LedgerKind::Expense, 0, date(2026, 10, 3)),
            None,
            Uuid::new_v4(),
        )
        .await;
        assert!(result.is_err());
    }
}
