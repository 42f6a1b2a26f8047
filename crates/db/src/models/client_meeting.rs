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
#[sqlx(type_name = "meeting_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MeetingStatus {
    #[default]
    Scheduled,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ClientMeeting {
    pub id: Uuid,
    pub client: String,
    pub project_id: Option<Uuid>,
    pub survey_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub location: Option<String>,
    pub purpose: String,
    pub status: MeetingStatus,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateClientMeeting {
    pub client: String,
    pub project_id: Option<Uuid>,
    pub survey_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub location: Option<String>,
    pub purpose: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateClientMeeting {
    pub client: Option<String>,
    pub project_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub purpose: Option<String>,
    pub status: Option<MeetingStatus>,
    pub notes: Option<String>,
}

const MEETING_COLUMNS: &str = "id, client, project_id, survey_id, scheduled_at, location, purpose, status, notes, created_by, created_at, updated_at";

impl Searchable for ClientMeeting {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.client.as_str(), self.purpose.as_str()];
        fields.extend(self.location.as_deref());
        fields
    }

    fn status_key(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn date_key(&self) -> Option<NaiveDate> {
        Some(self.scheduled_at.date_naive())
    }
}

impl ClientMeeting {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ClientMeeting>(&format!(
            "SELECT {MEETING_COLUMNS} FROM client_meetings ORDER BY scheduled_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Scheduled meetings from `now` onwards, soonest first.
    pub async fn find_upcoming(
        pool: &SqlitePool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ClientMeeting>(&format!(
            r#"SELECT {MEETING_COLUMNS} FROM client_meetings
               WHERE status = 'scheduled' AND scheduled_at >= $1
               ORDER BY scheduled_at ASC"#
        ))
        .bind(now)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ClientMeeting>(&format!(
            "SELECT {MEETING_COLUMNS} FROM client_meetings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateClientMeeting,
        created_by: Option<Uuid>,
        meeting_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ClientMeeting>(&format!(
            r#"INSERT INTO client_meetings (id, client, project_id, survey_id, scheduled_at, location, purpose, notes, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {MEETING_COLUMNS}"#
        ))
        .bind(meeting_id)
        .bind(data.client.trim())
        .bind(data.project_id)
        .bind(data.survey_id)
        .bind(data.scheduled_at)
        .bind(&data.location)
        .bind(data.purpose.trim())
        .bind(&data.notes)
        .bind(created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateClientMeeting,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        sqlx::query_as::<_, ClientMeeting>(&format!(
            r#"UPDATE client_meetings
               SET client = $2, project_id = $3, scheduled_at = $4, location = $5, purpose = $6,
                   status = $7, notes = $8, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {MEETING_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.client.clone().unwrap_or(existing.client))
        .bind(data.project_id.or(existing.project_id))
        .bind(data.scheduled_at.unwrap_or(existing.scheduled_at))
        .bind(merge_text(&data.location, existing.location))
        .bind(data.purpose.clone().unwrap_or(existing.purpose))
        .bind(data.status.unwrap_or(existing.status))
        .bind(merge_text(&data.notes, existing.notes))
        .fetch_one(pool)
        .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: MeetingStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ClientMeeting>(&format!(
            r#"UPDATE client_meetings SET status = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {MEETING_COLUMNS}"#
        ))
        .bind(id)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM client_meetings WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::models::test_support::pool;

    fn meeting(at: DateTime<Utc>) -> CreateClientMeeting {
        CreateClientMeeting {
            client: "Constructora Delta".into(),
            project_id: None,
            survey_id: None,
            scheduled_at: at,
            location: None,
            purpose: "Revisión de cotización".into(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn upcoming_skips_past_and_cancelled() {
        let pool = pool().await;
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();

        ClientMeeting::create(&pool, &meeting(now - Duration::days(1)), None, Uuid::new_v4())
            .await
            .unwrap();
        let later = ClientMeeting::create(&pool, &meeting(now + Duration::days(3)), None, Uuid::new_v4())
            .await
            .unwrap();
        let soon = ClientMeeting::create(&pool, &meeting(now + Duration::hours(2)), None, Uuid::new_v4())
            .await
            .unwrap();
        let cancelled = ClientMeeting::create(&pool, &meeting(now + Duration::days(1)), None, Uuid::new_v4())
            .await
            .unwrap();
        ClientMeeting::update_status(&pool, cancelled.id, MeetingStatus::Cancelled)
            .await
            .unwrap();

        let upcoming = ClientMeeting::find_upcoming(&pool, now).await.unwrap();
        let ids: Vec<Uuid> = upcoming.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![soon.id, later.id]);
    }

    #[tokio::test]
    async fn update_marks_done_with_notes() {
        let pool = pool().await;
        let m = ClientMeeting::create(&pool, &meeting(Utc::now()), None, Uuid::new_v4())
            .await
            .unwrap();
        let done = ClientMeeting::update(
            &pool,
            m.id,
            &UpdateClientMeeting {
                status: Some(MeetingStatus::Done),
                notes: Some("Cliente aprobó alcance".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(done.status, MeetingStatus::Done);
        assert_eq!(done.purpose, "Revisión de cotización");
    }
}
