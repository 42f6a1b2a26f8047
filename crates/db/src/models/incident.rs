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
    PartialOrd,
    Ord,
    Hash,
    TS,
    EnumString,
    EnumIter,
    Display,
    Default,
)]
#[sqlx(type_name = "incident_severity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

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
#[sqlx(type_name = "incident_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn is_open(self) -> bool {
        matches!(self, IncidentStatus::Open | IncidentStatus::InProgress)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Incident {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub severity: IncidentSeverity,
    pub status: IncidentStatus,
    pub reported_by: Option<Uuid>,
    pub occurred_on: NaiveDate,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateIncident {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub severity: Option<IncidentSeverity>,
    pub occurred_on: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateIncident {
    pub title: Option<String>,
    pub description: Option<String>,
    pub severity: Option<IncidentSeverity>,
    pub status: Option<IncidentStatus>,
    pub occurred_on: Option<NaiveDate>,
}

const INCIDENT_COLUMNS: &str = "id, project_id, title, description, severity, status, reported_by, occurred_on, resolved_at, resolution, created_at, updated_at";

impl Searchable for Incident {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str()];
        fields.extend(self.description.as_deref());
        fields
    }

    fn status_key(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn date_key(&self) -> Option<NaiveDate> {
        Some(self.occurred_on)
    }
}

impl Incident {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Incident>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents ORDER BY occurred_on DESC, created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Incident>(&format!(
            r#"SELECT {INCIDENT_COLUMNS} FROM incidents
               WHERE project_id = $1
               ORDER BY occurred_on DESC, created_at DESC"#
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Open and in-progress incidents, most severe first.
    pub async fn find_open(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Incident>(&format!(
            r#"SELECT {INCIDENT_COLUMNS} FROM incidents
               WHERE status IN ('open', 'in_progress')
               ORDER BY CASE severity
                          WHEN 'critical' THEN 0
                          WHEN 'high' THEN 1
                          WHEN 'medium' THEN 2
                          ELSE 3
                        END,
                        occurred_on ASC"#
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Incident>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateIncident,
        reported_by: Option<Uuid>,
        incident_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Incident>(&format!(
            r#"INSERT INTO incidents (id, project_id, title, description, severity, reported_by, occurred_on)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {INCIDENT_COLUMNS}"#
        ))
        .bind(incident_id)
        .bind(data.project_id)
        .bind(data.title.trim())
        .bind(&data.description)
        .bind(data.severity.unwrap_or_default())
        .bind(reported_by)
        .bind(data.occurred_on)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateIncident,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let status = data.status.unwrap_or(existing.status);
        // Reopening clears the resolution stamp
        let resolved_at = if status.is_open() {
            None
        } else {
            existing.resolved_at.or_else(|| Some(Utc::now()))
        };

        sqlx::query_as::<_, Incident>(&format!(
            r#"UPDATE incidents
               SET title = $2, description = $3, severity = $4, status = $5, occurred_on = $6,
                   resolved_at = $7, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {INCIDENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.title.clone().unwrap_or(existing.title))
        .bind(merge_text(&data.description, existing.description))
        .bind(data.severity.unwrap_or(existing.severity))
        .bind(status)
        .bind(data.occurred_on.unwrap_or(existing.occurred_on))
        .bind(resolved_at)
        .fetch_one(pool)
        .await
    }

    /// Marks the incident resolved with the given resolution note.
    pub async fn resolve(
        pool: &SqlitePool,
        id: Uuid,
        resolution: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Incident>(&format!(
            r#"UPDATE incidents
               SET status = 'resolved', resolution = $2, resolved_at = $3,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {INCIDENT_COLUMNS}"#
        ))
        .bind(id)
        .bind(resolution.trim())
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = $1")
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

    fn incident(project_id: Uuid, title: &str, severity: IncidentSeverity) -> CreateIncident {
        CreateIncident {
            project_id,
            title: title.into(),
            description: None,
            severity: Some(severity),
            occurred_on: date(2026, 10, 5),
        }
    }

    #[tokio::test]
    async fn open_incidents_sorted_by_severity() {
        let pool = pool().await;
        let p = project(&pool, "Torre B").await;
        Incident::create(&pool, &incident(p.id, "Fisura menor", IncidentSeverity::Low), None, Uuid::new_v4())
            .await
            .unwrap();
        Incident::create(&pool, &incident(p.id, "Caída de andamio", IncidentSeverity::Critical), None, Uuid::new_v4())
            .await
            .unwrap();
        let resolved = Incident::create(&pool, &incident(p.id, "Fuga", IncidentSeverity::High), None, Uuid::new_v4())
            .await
            .unwrap();
        Incident::resolve(&pool, resolved.id, "Se cambió la válvula").await.unwrap();

        let open = Incident::find_open(&pool).await.unwrap();
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].severity, IncidentSeverity::Critical);
        assert_eq!(open[1].title, "Fisura menor");
    }

    #[tokio::test]
    async fn resolve_then_reopen() {
        let pool = pool().await;
        let p = project(&pool, "Torre B").await;
        let i = Incident::create(&pool, &incident(p.id, "Fuga", IncidentSeverity::High), None, Uuid::new_v4())
            .await
            .unwrap();

        let resolved = Incident::resolve(&pool, i.id, "Reparada").await.unwrap();
        assert_eq!(resolved.status, IncidentStatus::Resolved);
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.resolution.as_deref(), Some("Reparada"));

        let reopened = Incident::update(
            &pool,
            i.id,
            &UpdateIncident {
                status: Some(IncidentStatus::Open),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(reopened.resolved_at.is_none());
        assert!(reopened.status.is_open());
    }

    #[tokio::test]
    async fn resolving_missing_incident_is_not_found() {
        let pool = pool().await;
        let err = Incident::resolve(&pool, Uuid::new_v4(), "x").await.unwrap_err();
        assert!(matches!(err, sqlx::Error::RowNotFound));
    }
}
