use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, types::Json};
use ts_rs::TS;
use utils::filter::Searchable;
use uuid::Uuid;

use super::merge_text;

/// Meeting minutes (minuta) recorded against a project.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Minute {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub meeting_date: NaiveDate,
    pub location: Option<String>,
    #[sqlx(json)]
    pub attendees: Vec<String>,
    pub agenda: Option<String>,
    pub agreements: Option<String>,
    pub next_meeting: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateMinute {
    pub project_id: Uuid,
    pub title: String,
    pub meeting_date: NaiveDate,
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    pub agenda: Option<String>,
    pub agreements: Option<String>,
    pub next_meeting: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateMinute {
    pub title: Option<String>,
    pub meeting_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub attendees: Option<Vec<String>>,
    pub agenda: Option<String>,
    pub agreements: Option<String>,
    pub next_meeting: Option<NaiveDate>,
}

const MINUTE_COLUMNS: &str = "id, project_id, title, meeting_date, location, attendees, agenda, agreements, next_meeting, created_by, created_at, updated_at";

fn clean_attendees(attendees: &[String]) -> Vec<String> {
    attendees
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

impl Searchable for Minute {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str()];
        fields.extend(self.agreements.as_deref());
        fields.extend(self.attendees.iter().map(String::as_str));
        fields
    }

    fn date_key(&self) -> Option<NaiveDate> {
        Some(self.meeting_date)
    }
}

impl Minute {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Minute>(&format!(
            "SELECT {MINUTE_COLUMNS} FROM minutes ORDER BY meeting_date DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Minute>(&format!(
            r#"SELECT {MINUTE_COLUMNS} FROM minutes
               WHERE project_id = $1
               ORDER BY meeting_date DESC"#
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Minute>(&format!("SELECT {MINUTE_COLUMNS} FROM minutes WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateMinute,
        created_by: Option<Uuid>,
        minute_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Minute>(&format!(
            r#"INSERT INTO minutes (id, project_id, title, meeting_date, location, attendees, agenda, agreements, next_meeting, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING {MINUTE_COLUMNS}"#
        ))
        .bind(minute_id)
        .bind(data.project_id)
        .bind(data.title.trim())
        .bind(data.meeting_date)
        .bind(&data.location)
        .bind(Json(clean_attendees(&data.attendees)))
        .bind(&data.agenda)
        .bind(&data.agreements)
        .bind(data.next_meeting)
        .bind(created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateMinute,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let attendees = data
            .attendees
            .as_deref()
            .map(clean_attendees)
            .unwrap_or(existing.attendees);

        sqlx::query_as::<_, Minute>(&format!(
            r#"UPDATE minutes
               SET title = $2, meeting_date = $3, location = $4, attendees = $5, agenda = $6,
                   agreements = $7, next_meeting = $8, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {MINUTE_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.title.clone().unwrap_or(existing.title))
        .bind(data.meeting_date.unwrap_or(existing.meeting_date))
        .bind(merge_text(&data.location, existing.location))
        .bind(Json(attendees))
        .bind(merge_text(&data.agenda, existing.agenda))
        .bind(merge_text(&data.agreements, existing.agreements))
        .bind(data.next_meeting.or(existing.next_meeting))
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM minutes WHERE id = $1")
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

    #[tokio::test]
    async fn attendees_round_trip_through_json_column() {
        let pool = pool().await;
        let p = project(&pool, "Plaza Norte").await;
        let minute = Minute::create(
            &pool,
            &CreateMinute {
                project_id: p.id,
                title: "Junta de arranque".into(),
                meeting_date: date(2026, 10, 2),
                location: Some("Oficina de obra".into()),
                attendees: vec!["Ing. Ruiz".into(), "  ".into(), "Arq. Salas ".into()],
                agenda: None,
                agreements: Some("Iniciar excavación el lunes".into()),
                next_meeting: Some(date(2026, 10, 9)),
            },
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert_eq!(minute.attendees, vec!["Ing. Ruiz", "Arq. Salas"]);

        let updated = Minute::update(
            &pool,
            minute.id,
            &UpdateMinute {
                attendees: Some(vec!["Ing. Ruiz".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.attendees, vec!["Ing. Ruiz"]);
        assert_eq!(updated.location.as_deref(), Some("Oficina de obra"));

        let listed = Minute::find_by_project_id(&pool, p.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].attendees.len(), 1);
    }
}
