use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use utils::filter::Searchable;
use uuid::Uuid;

use super::merge_text;

#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    TS,
    EnumString,
    EnumIter,
    Display,
    Default,
)]
#[sqlx(type_name = "expense_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExpenseCategory {
    Materials,
    Labor,
    Equipment,
    Transport,
    Services,
    Permits,
    #[default]
    Other,
}

impl ExpenseCategory {
    pub fn label(self) -> &'static str {
        match self {
            ExpenseCategory::Materials => "Materiales",
            ExpenseCategory::Labor => "Mano de obra",
            ExpenseCategory::Equipment => "Equipo",
            ExpenseCategory::Transport => "Transporte",
            ExpenseCategory::Services => "Servicios",
            ExpenseCategory::Permits => "Permisos",
            ExpenseCategory::Other => "Otros",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Expense {
    pub id: Uuid,
    pub project_id: Uuid,
    pub concept: String,
    pub category: ExpenseCategory,
    pub amount_cents: i64,
    pub expense_date: NaiveDate,
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    pub receipt_path: Option<String>, // Object path inside the storage bucket
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateExpense {
    pub project_id: Uuid,
    pub concept: String,
    pub category: Option<ExpenseCategory>,
    pub amount_cents: i64,
    pub expense_date: NaiveDate,
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    pub receipt_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateExpense {
    pub concept: Option<String>,
    pub category: Option<ExpenseCategory>,
    pub amount_cents: Option<i64>,
    pub expense_date: Option<NaiveDate>,
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    pub receipt_path: Option<String>,
}

const EXPENSE_COLUMNS: &str = "id, project_id, concept, category, amount_cents, expense_date, supplier, invoice_number, receipt_path, created_by, created_at, updated_at";

impl Searchable for Expense {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.concept.as_str()];
        fields.extend(self.supplier.as_deref());
        fields.extend(self.invoice_number.as_deref());
        fields
    }

    fn status_key(&self) -> Option<String> {
        Some(self.category.to_string())
    }

    fn date_key(&self) -> Option<NaiveDate> {
        Some(self.expense_date)
    }
}

impl Expense {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses ORDER BY expense_date DESC, created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            r#"SELECT {EXPENSE_COLUMNS} FROM expenses
               WHERE project_id = $1
               ORDER BY expense_date DESC, created_at DESC"#
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Expenses dated within `from..=to`.
    pub async fn find_in_range(
        pool: &SqlitePool,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            r#"SELECT {EXPENSE_COLUMNS} FROM expenses
               WHERE expense_date >= $1 AND expense_date <= $2
               ORDER BY expense_date ASC"#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn total_for_project(pool: &SqlitePool, project_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0) FROM expenses WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateExpense,
        created_by: Option<Uuid>,
        expense_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            r#"INSERT INTO expenses (id, project_id, concept, category, amount_cents, expense_date, supplier, invoice_number, receipt_path, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING {EXPENSE_COLUMNS}"#
        ))
        .bind(expense_id)
        .bind(data.project_id)
        .bind(data.concept.trim())
        .bind(data.category.unwrap_or_default())
        .bind(data.amount_cents)
        .bind(data.expense_date)
        .bind(&data.supplier)
        .bind(&data.invoice_number)
        .bind(&data.receipt_path)
        .bind(created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateExpense,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        sqlx::query_as::<_, Expense>(&format!(
            r#"UPDATE expenses
               SET concept = $2, category = $3, amount_cents = $4, expense_date = $5,
                   supplier = $6, invoice_number = $7, receipt_path = $8,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {EXPENSE_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.concept.clone().unwrap_or(existing.concept))
        .bind(data.category.unwrap_or(existing.category))
        .bind(data.amount_cents.unwrap_or(existing.amount_cents))
        .bind(data.expense_date.unwrap_or(existing.expense_date))
        .bind(merge_text(&data.supplier, existing.supplier))
        .bind(merge_text(&data.invoice_number, existing.invoice_number))
        .bind(merge_text(&data.receipt_path, existing.receipt_path))
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{date, pool, project};

    fn expense(project_id: Uuid, amount_cents: i64, day: u32) -> CreateExpense {
        CreateExpense {
            project_id,
            concept: "Cemento gris 50kg".into(),
            category: Some(ExpenseCategory::Materials),
            amount_cents,
            expense_date: date(2026, 10, day),
            supplier: Some("Materiales El Roble".into()),
            invoice_number: None,
            receipt_path: None,
        }
    }

    #[tokio::test]
    async fn totals_and_ranges() {
        let pool = pool().await;
        let p = project(&pool, "Bodega").await;
        for (amount, day) in [(10_000, 1), (25_050, 15), (5_000, 31)] {
            Expense::create(&pool, &expense(p.id, amount, day), None, Uuid::new_v4())
                .await
                .unwrap();
        }

        assert_eq!(Expense::total_for_project(&pool, p.id).await.unwrap(), 40_050);
        let other = project(&pool, "Vacía").await;
        assert_eq!(Expense::total_for_project(&pool, other.id).await.unwrap(), 0);

        let mid = Expense::find_in_range(&pool, date(2026, 10, 1), date(2026, 10, 15))
            .await
            .unwrap();
        assert_eq!(mid.len(), 2);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let pool = pool().await;
        let p = project(&pool, "Bodega").await;
        assert!(
            Expense::create(&pool, &expense(p.id, 0, 1), None, Uuid::new_v4())
                .await
                .is_err()
        );
        assert!(
            Expense::create(&pool, &expense(p.id, -500, 1), None, Uuid::new_v4())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn update_can_clear_supplier() {
        let pool = pool().await;
        let p = project(&pool, "Bodega").await;
        let e = Expense::create(&pool, &expense(p.id, 1_000, 2), None, Uuid::new_v4())
            .await
            .unwrap();
        let updated = Expense::update(
            &pool,
            e.id,
            &UpdateExpense {
                supplier: Some("".into()),
                amount_cents: Some(1_500),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.supplier, None);
        assert_eq!(updated.amount_cents, 1_500);
        assert_eq!(updated.category, ExpenseCategory::Materials);
    }
}
