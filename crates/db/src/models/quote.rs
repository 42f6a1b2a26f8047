use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use utils::filter::Searchable;
use uuid::Uuid;

use super::{
    merge_text,
    survey::{Survey, SurveyStatus},
};

/// IVA, in basis points.
pub const DEFAULT_TAX_RATE_BP: i64 = 1600;
const FOLIO_PREFIX: &str = "COT";

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
#[sqlx(type_name = "quote_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Sent,
    Approved,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Quote {
    pub id: Uuid,
    pub folio: String,
    pub project_id: Option<Uuid>,
    pub survey_id: Option<Uuid>,
    pub client: String,
    pub title: String,
    pub status: QuoteStatus,
    pub subtotal_cents: i64,
    pub tax_rate_bp: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct QuoteItem {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub position: i64,
    pub description: String,
    pub unit: String,
    pub quantity: f64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct QuoteWithItems {
    #[serde(flatten)]
    #[ts(flatten)]
    pub quote: Quote,
    pub items: Vec<QuoteItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateQuoteItem {
    pub description: String,
    pub unit: Option<String>,
    pub quantity: f64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateQuote {
    pub project_id: Option<Uuid>,
    pub survey_id: Option<Uuid>,
    pub client: String,
    pub title: String,
    pub tax_rate_bp: Option<i64>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<CreateQuoteItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateQuote {
    pub project_id: Option<Uuid>,
    pub client: Option<String>,
    pub title: Option<String>,
    pub tax_rate_bp: Option<i64>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct QuoteTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

pub fn line_total(quantity: f64, unit_price_cents: i64) -> i64 {
    (quantity * unit_price_cents as f64).round() as i64
}

/// Subtotal is the sum of rounded line totals; tax is rounded once on the subtotal.
pub fn compute_totals(
    lines: impl IntoIterator<Item = (f64, i64)>,
    tax_rate_bp: i64,
) -> QuoteTotals {
    let subtotal_cents: i64 = lines
        .into_iter()
        .map(|(quantity, price)| line_total(quantity, price))
        .sum();
    let tax_cents = (subtotal_cents as f64 * tax_rate_bp as f64 / 10_000.0).round() as i64;
    QuoteTotals {
        subtotal_cents,
        tax_cents,
        total_cents: subtotal_cents + tax_cents,
    }
}

pub fn format_folio(year: i32, sequence: i64) -> String {
    format!("{}-{}-{:04}", FOLIO_PREFIX, year, sequence)
}

const QUOTE_COLUMNS: &str = "id, folio, project_id, survey_id, client, title, status, subtotal_cents, tax_rate_bp, tax_cents, total_cents, valid_until, notes, created_by, created_at, updated_at";
const ITEM_COLUMNS: &str =
    "id, quote_id, position, description, unit, quantity, unit_price_cents, line_total_cents";

impl Searchable for Quote {
    fn search_text(&self) -> Vec<&str> {
        vec![self.folio.as_str(), self.client.as_str(), self.title.as_str()]
    }

    fn status_key(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn date_key(&self) -> Option<NaiveDate> {
        Some(self.created_at.date_naive())
    }
}

impl Quote {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        matches!(self.status, QuoteStatus::Draft | QuoteStatus::Sent)
            && self.valid_until.is_some_and(|until| until < today)
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Quote>(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn items(pool: &SqlitePool, quote_id: Uuid) -> Result<Vec<QuoteItem>, sqlx::Error> {
        sqlx::query_as::<_, QuoteItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM quote_items WHERE quote_id = $1 ORDER BY position ASC"
        ))
        .bind(quote_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_with_items(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<QuoteWithItems>, sqlx::Error> {
        let Some(quote) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let items = Self::items(pool, id).await?;
        Ok(Some(QuoteWithItems { quote, items }))
    }

    /// Next folio for `year`, e.g. `COT-2026-0008` after `COT-2026-0007`.
    pub async fn next_folio(conn: &mut SqliteConnection, year: i32) -> Result<String, sqlx::Error> {
        let prefix = format!("{}-{}-", FOLIO_PREFIX, year);
        let last: Option<i64> = sqlx::query_scalar(
            r#"SELECT MAX(CAST(substr(folio, length($1) + 1) AS INTEGER))
               FROM quotes
               WHERE folio LIKE $1 || '%'"#,
        )
        .bind(&prefix)
        .fetch_one(&mut *conn)
        .await?;
        Ok(format_folio(year, last.unwrap_or(0) + 1))
    }

    /// Creates the quote and its items in one transaction; totals are computed from the items.
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateQuote,
        created_by: Option<Uuid>,
        quote_id: Uuid,
    ) -> Result<QuoteWithItems, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let result = Self::insert(&mut *tx, data, created_by, quote_id).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn insert(
        conn: &mut SqliteConnection,
        data: &CreateQuote,
        created_by: Option<Uuid>,
        quote_id: Uuid,
    ) -> Result<QuoteWithItems, sqlx::Error> {
        let tax_rate_bp = data.tax_rate_bp.unwrap_or(DEFAULT_TAX_RATE_BP);
        let folio = Self::next_folio(&mut *conn, Utc::now().year()).await?;
        let totals = compute_totals(
            data.items.iter().map(|i| (i.quantity, i.unit_price_cents)),
            tax_rate_bp,
        );

        let quote = sqlx::query_as::<_, Quote>(&format!(
            r#"INSERT INTO quotes (id, folio, project_id, survey_id, client, title, subtotal_cents, tax_rate_bp, tax_cents, total_cents, valid_until, notes, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
               RETURNING {QUOTE_COLUMNS}"#
        ))
        .bind(quote_id)
        .bind(&folio)
        .bind(data.project_id)
        .bind(data.survey_id)
        .bind(data.client.trim())
        .bind(data.title.trim())
        .bind(totals.subtotal_cents)
        .bind(tax_rate_bp)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .bind(data.valid_until)
        .bind(&data.notes)
        .bind(created_by)
        .fetch_one(&mut *conn)
        .await?;

        let items = Self::insert_items(&mut *conn, quote_id, &data.items).await?;
        Ok(QuoteWithItems { quote, items })
    }

    async fn insert_items(
        conn: &mut SqliteConnection,
        quote_id: Uuid,
        items: &[CreateQuoteItem],
    ) -> Result<Vec<QuoteItem>, sqlx::Error> {
        let mut created = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            let row = sqlx::query_as::<_, QuoteItem>(&format!(
                r#"INSERT INTO quote_items (id, quote_id, position, description, unit, quantity, unit_price_cents, line_total_cents)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                   RETURNING {ITEM_COLUMNS}"#
            ))
            .bind(Uuid::new_v4())
            .bind(quote_id)
            .bind(position as i64 + 1)
            .bind(item.description.trim())
            .bind(item.unit.as_deref().unwrap_or("pza"))
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(line_total(item.quantity, item.unit_price_cents))
            .fetch_one(&mut *conn)
            .await?;
            created.push(row);
        }
        Ok(created)
    }

    async fn write_totals(conn: &mut SqliteConnection, quote_id: Uuid) -> Result<Quote, sqlx::Error> {
        let tax_rate_bp: i64 = sqlx::query_scalar("SELECT tax_rate_bp FROM quotes WHERE id = $1")
            .bind(quote_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let lines: Vec<(f64, i64)> =
            sqlx::query_as("SELECT quantity, unit_price_cents FROM quote_items WHERE quote_id = $1")
                .bind(quote_id)
                .fetch_all(&mut *conn)
                .await?;
        let totals = compute_totals(lines, tax_rate_bp);

        sqlx::query_as::<_, Quote>(&format!(
            r#"UPDATE quotes
               SET subtotal_cents = $2, tax_cents = $3, total_cents = $4,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {QUOTE_COLUMNS}"#
        ))
        .bind(quote_id)
        .bind(totals.subtotal_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .fetch_one(&mut *conn)
        .await
    }

    /// Replaces every line item and recomputes the totals.
    pub async fn replace_items(
        pool: &SqlitePool,
        quote_id: Uuid,
        items: &[CreateQuoteItem],
    ) -> Result<QuoteWithItems, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM quotes WHERE id = $1")
            .bind(quote_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(sqlx::Error::RowNotFound);
        }
        sqlx::query("DELETE FROM quote_items WHERE quote_id = $1")
            .bind(quote_id)
            .execute(&mut *tx)
            .await?;
        let items = Self::insert_items(&mut *tx, quote_id, items).await?;
        let quote = Self::write_totals(&mut *tx, quote_id).await?;
        tx.commit().await?;
        Ok(QuoteWithItems { quote, items })
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateQuote,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let mut tx = pool.begin().await?;
        sqlx::query(
            r#"UPDATE quotes
               SET project_id = $2, client = $3, title = $4, tax_rate_bp = $5, valid_until = $6,
                   notes = $7
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(data.project_id.or(existing.project_id))
        .bind(data.client.clone().unwrap_or(existing.client))
        .bind(data.title.clone().unwrap_or(existing.title))
        .bind(data.tax_rate_bp.unwrap_or(existing.tax_rate_bp))
        .bind(data.valid_until.or(existing.valid_until))
        .bind(merge_text(&data.notes, existing.notes))
        .execute(&mut *tx)
        .await?;
        let quote = Self::write_totals(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(quote)
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: QuoteStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Quote>(&format!(
            r#"UPDATE quotes SET status = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {QUOTE_COLUMNS}"#
        ))
        .bind(id)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    /// Drafts a quote from a site visit and marks the visit as quoted.
    pub async fn create_from_survey(
        pool: &SqlitePool,
        survey_id: Uuid,
        title: Option<String>,
        items: Vec<CreateQuoteItem>,
        created_by: Option<Uuid>,
        quote_id: Uuid,
    ) -> Result<(QuoteWithItems, Survey), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let survey = Survey::find_by_id(&mut *tx, survey_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let data = CreateQuote {
            project_id: survey.project_id,
            survey_id: Some(survey.id),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Cotización {}", survey.site_address)),
            client: survey.client.clone(),
            tax_rate_bp: None,
            valid_until: None,
            notes: survey.requirements.clone(),
            items,
        };
        let quote = Self::insert(&mut *tx, &data, created_by, quote_id).await?;
        let survey = Survey::update_status(&mut *tx, survey_id, SurveyStatus::Quoted).await?;
        tx.commit().await?;
        Ok((quote, survey))
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quotes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        survey::CreateSurvey,
        test_support::{date, pool},
    };

    fn item(description: &str, quantity: f64, unit_price_cents: i64) -> CreateQuoteItem {
        CreateQuoteItem {
            description: description.into(),
            unit: Some("m2".into()),
            quantity,
            unit_price_cents,
        }
    }

    fn quote(items: Vec<CreateQuoteItem>) -> CreateQuote {
        CreateQuote {
            project_id: None,
            survey_id: None,
            client: "Hotel Las Palmas".into(),
            title: "Cambio de cubierta".into(),
            tax_rate_bp: None,
            valid_until: None,
            notes: None,
            items,
        }
    }

    #[test]
    fn totals_round_lines_then_tax() {
        let totals = compute_totals([(2.5, 12_345), (1.0, 10_000)], DEFAULT_TAX_RATE_BP);
        // 2.5 * 123.45 = 308.625 -> 308.63
        assert_eq!(totals.subtotal_cents, 30_863 + 10_000);
        assert_eq!(totals.tax_cents, 6_538);
        assert_eq!(totals.total_cents, 40_863 + 6_538);

        let empty = compute_totals(Vec::new(), DEFAULT_TAX_RATE_BP);
        assert_eq!(empty.total_cents, 0);
    }

    #[test]
    fn folio_is_zero_padded() {
        assert_eq!(format_folio(2026, 7), "COT-2026-0007");
        assert_eq!(format_folio(2026, 12_345), "COT-2026-12345");
    }

    #[tokio::test]
    async fn folios_increase_within_the_year() {
        let pool = pool().await;
        let year = Utc::now().year();
        let first = Quote::create(&pool, &quote(vec![]), None, Uuid::new_v4()).await.unwrap();
        let second = Quote::create(&pool, &quote(vec![]), None, Uuid::new_v4()).await.unwrap();
        assert_eq!(first.quote.folio, format_folio(year, 1));
        assert_eq!(second.quote.folio, format_folio(year, 2));
    }

    #[tokio::test]
    async fn create_persists_items_and_totals() {
        let pool = pool().await;
        let created = Quote::create(
            &pool,
            &quote(vec![item("Lámina galvanizada", 40.0, 35_000), item("Mano de obra", 1.0, 800_000)]),
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(created.items.len(), 2);
        assert_eq!(created.items[0].position, 1);
        assert_eq!(created.items[0].line_total_cents, 1_400_000);
        assert_eq!(created.quote.subtotal_cents, 2_200_000);
        assert_eq!(created.quote.tax_cents, 352_000);
        assert_eq!(created.quote.total_cents, 2_552_000);

        let loaded = Quote::find_with_items(&pool, created.quote.id).await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(loaded.items[1].description, "Mano de obra");
    }

    #[tokio::test]
    async fn replacing_items_and_tax_recomputes() {
        let pool = pool().await;
        let created = Quote::create(&pool, &quote(vec![item("A", 1.0, 10_000)]), None, Uuid::new_v4())
            .await
            .unwrap();
        let id = created.quote.id;

        let replaced = Quote::replace_items(&pool, id, &[item("B", 3.0, 10_000)]).await.unwrap();
        assert_eq!(replaced.items.len(), 1);
        assert_eq!(replaced.quote.subtotal_cents, 30_000);
        assert_eq!(replaced.quote.total_cents, 34_800);

        let untaxed = Quote::update(
            &pool,
            id,
            &UpdateQuote {
                tax_rate_bp: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(untaxed.tax_cents, 0);
        assert_eq!(untaxed.total_cents, 30_000);
    }

    #[tokio::test]
    async fn replacing_items_of_unknown_quote_is_not_found() {
        let pool = pool().await;
        let err = Quote::replace_items(&pool, Uuid::new_v4(), &[item("A", 1.0, 100)])
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn zero_quantity_rolls_back_the_whole_quote() {
        let pool = pool().await;
        let result = Quote::create(&pool, &quote(vec![item("A", 0.0, 100)]), None, Uuid::new_v4()).await;
        assert!(result.is_err());
        assert!(Quote::find_all(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quote_from_survey_marks_it_quoted() {
        let pool = pool().await;
        let survey = Survey::create(
            &pool,
            &CreateSurvey {
                project_id: None,
                client: "Colegio Montessori".into(),
                site_address: "Calle 5 #200".into(),
                contact_name: None,
                contact_phone: None,
                visit_date: date(2026, 10, 1),
                findings: None,
                requirements: Some("Impermeabilizar azotea".into()),
            },
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let (quote, survey) = Quote::create_from_survey(
            &pool,
            survey.id,
            None,
            vec![item("Impermeabilizante", 120.0, 9_500)],
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(survey.status, SurveyStatus::Quoted);
        assert_eq!(quote.quote.client, "Colegio Montessori");
        assert_eq!(quote.quote.survey_id, Some(survey.id));
        assert_eq!(quote.quote.title, "Cotización Calle 5 #200");
        assert_eq!(quote.quote.notes.as_deref(), Some("Impermeabilizar azotea"));
    }

    #[tokio::test]
    async fn missing_survey_is_not_found() {
        let pool = pool().await;
        let err = Quote::create_from_survey(&pool, Uuid::new_v4(), None, vec![], None, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::RowNotFound));
    }

    #[test]
    fn expiry_only_for_open_quotes() {
        let now = Utc::now();
        let mut q = Quote {
            id: Uuid::new_v4(),
            folio: format_folio(2026, 1),
            project_id: None,
            survey_id: None,
            client: "C".into(),
            title: "T".into(),
            status: QuoteStatus::Sent,
            subtotal_cents: 0,
            tax_rate_bp: DEFAULT_TAX_RATE_BP,
            tax_cents: 0,
            total_cents: 0,
            valid_until: Some(date(2026, 10, 1)),
            notes: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        assert!(q.is_expired(date(2026, 10, 2)));
        q.status = QuoteStatus::Approved;
        assert!(!q.is_expired(date(2026, 10, 2)));
    }
}
