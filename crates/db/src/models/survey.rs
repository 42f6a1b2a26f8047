use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use utils::filter::Searchable;
use uuid::Uuid;

use super::merge_text;

/// Lifecycle of a site visit (levantamiento).
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
#[sqlx(type_name = "survey_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SurveyStatus {
    #[default]
    Scheduled,
    Completed,
    Quoted,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Survey {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub client: String,
    pub site_address: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub visit_date: NaiveDate,
    pub status: SurveyStatus,
    pub findings: Option<String>,
    pub requirements: Option<String>,
    pub surveyed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateSurvey {
    pub project_id: Option<Uuid>,
    pub client: String,
    pub site_address: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub visit_date: NaiveDate,
    pub findings: Option<String>,
    pub requirements: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateSurvey {
    pub project_id: Option<Uuid>,
    pub client: Option<String>,
    pub site_address: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub visit_date: Option<NaiveDate>,
    pub status: Option<SurveyStatus>,
    pub findings: Option<String>,
    pub requirements: Option<String>,
}

const SURVEY_COLUMNS: &str = "id, project_id, client, site_address, contact_name, contact_phone, visit_date, status, findings, requirements, surveyed_by, created_at, updated_at";

impl Searchable for Survey {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.client.as_str(), self.site_address.as_str()];
        fields.extend(self.contact_name.as_deref());
        fields
    }

    fn status_key(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn date_key(&self) -> Option<NaiveDate> {
        Some(self.visit_date)
    }
}

impl Survey {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Survey>(&format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys ORDER BY visit_date DESC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Scheduled visits on or after `today`, soonest first.
    pub async fn find_upcoming(pool: &SqlitePool, today: NaiveDate) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Survey>(&format!(
            r#"SELECT {SURVEY_COLUMNS} FROM surveys
               WHERE status = 'scheduled' AND visit_date >= $1
               ORDER BY visit_date ASC"#
        ))
        .bind(today)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Survey>(&format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateSurvey,
        surveyed_by: Option<Uuid>,
        survey_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Survey>(&format!(
            r#"INSERT INTO surveys (id, project_id, client, site_address, contact_name, contact_phone, visit_date, findings, requirements, surveyed_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING {SURVEY_COLUMNS}"#
        ))
        .bind(survey_id)
        .bind(data.project_id)
        .bind(data.client.trim())
        .bind(data.site_address.trim())
        .bind(&data.contact_name)
        .bind(&data.contact_phone)
        .bind(data.visit_date)
        .bind(&data.findings)
        .bind(&data.requirements)
        .bind(surveyed_by)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateSurvey,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        sqlx::query_as::<_, Survey>(&format!(
            r#"UPDATE surveys
               SET project_id = $2, client = $3, site_address = $4, contact_name = $5,
                   contact_phone = $6, visit_date = $7, status = $8, findings = $9,
                   requirements = $10, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {SURVEY_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.project_id.or(existing.project_id))
        .bind(data.client.clone().unwrap_or(existing.client))
        .bind(data.site_address.clone().unwrap_or(existing.site_address))
        .bind(merge_text(&data.contact_name, existing.contact_name))
        .bind(merge_text(&data.contact_phone, existing.contact_phone))
        .bind(data.visit_date.unwrap_or(existing.visit_date))
        .bind(data.status.unwrap_or(existing.status))
        .bind(merge_text(&data.findings, existing.findings))
        .bind(merge_text(&data.requirements, existing.requirements))
        .fetch_one(pool)
        .await
    }

    pub async fn update_status<'e, E>(
        executor: E,
        id: Uuid,
        status: SurveyStatus,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Survey>(&format!(
            r#"UPDATE surveys SET status = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {SURVEY_COLUMNS}"#
        ))
        .bind(id)
        .bind(status)
        .fetch_one(executor)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM surveys WHERE id = $1")
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

    fn survey(day: u32) -> CreateSurvey {
        CreateSurvey {
            project_id: None,
            client: "Hotel Las Palmas".into(),
            site_address: "Av. Reforma 120".into(),
            contact_name: Some("Sr. Gómez".into()),
            contact_phone: None,
            visit_date: date(2026, 10, day),
            findings: None,
            requirements: Some("Revisar cubierta".into()),
        }
    }

    #[tokio::test]
    async fn upcoming_only_scheduled_future_visits() {
        let pool = pool().await;
        let today = date(2026, 10, 16);
        Survey::create(&pool, &survey(10), None, Uuid::new_v4()).await.unwrap();
        let soon = Survey::create(&pool, &survey(20), None, Uuid::new_v4()).await.unwrap();
        let cancelled = Survey::create(&pool, &survey(18), None, Uuid::new_v4()).await.unwrap();
        Survey::update_status(&pool, cancelled.id, SurveyStatus::Cancelled)
            .await
            .unwrap();
        Survey::create(&pool, &survey(16), None, Uuid::new_v4()).await.unwrap();

        let upcoming = Survey::find_upcoming(&pool, today).await.unwrap();
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].visit_date, today);
        assert_eq!(upcoming[1].id, soon.id);
    }

    #[tokio::test]
    async fn update_records_findings() {
        let pool = pool().await;
        let s = Survey::create(&pool, &survey(10), None, Uuid::new_v4()).await.unwrap();
        let updated = Survey::update(
            &pool,
            s.id,
            &UpdateSurvey {
                findings: Some("Lámina oxidada en 40 m²".into()),
                status: Some(SurveyStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.status, SurveyStatus::Completed);
        assert_eq!(updated.contact_name.as_deref(), Some("Sr. Gómez"));
        assert!(updated.findings.is_some());
    }
}
