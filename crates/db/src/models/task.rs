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
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid, // Foreign key to Project
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>, // Set while status is Completed
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

impl CreateTask {
    pub fn titled(project_id: Uuid, title: &str) -> Self {
        Self {
            project_id,
            title: title.to_string(),
            description: None,
            status: None,
            priority: None,
            assignee_id: None,
            due_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

const TASK_COLUMNS: &str = "id, project_id, title, description, status, priority, assignee_id, due_date, completed_at, created_at, updated_at";

impl Searchable for Task {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str()];
        fields.extend(self.description.as_deref());
        fields
    }

    fn status_key(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn date_key(&self) -> Option<NaiveDate> {
        self.due_date
    }
}

impl Task {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Completed && self.due_date.is_some_and(|due| due < today)
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"SELECT {TASK_COLUMNS} FROM tasks
               WHERE project_id = $1
               ORDER BY due_date IS NULL, due_date ASC, created_at DESC"#
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_assignee(
        pool: &SqlitePool,
        assignee_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"SELECT {TASK_COLUMNS} FROM tasks
               WHERE assignee_id = $1 AND status != 'completed'
               ORDER BY due_date IS NULL, due_date ASC"#
        ))
        .bind(assignee_id)
        .fetch_all(pool)
        .await
    }

    /// Tasks not completed whose due date is before `today`, oldest first.
    pub async fn find_overdue(pool: &SqlitePool, today: NaiveDate) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"SELECT {TASK_COLUMNS} FROM tasks
               WHERE status != 'completed' AND due_date IS NOT NULL AND due_date < $1
               ORDER BY due_date ASC"#
        ))
        .bind(today)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let status = data.status.unwrap_or_default();
        let completed_at = (status == TaskStatus::Completed).then(Utc::now);
        sqlx::query_as::<_, Task>(&format!(
            r#"INSERT INTO tasks (id, project_id, title, description, status, priority, assignee_id, due_date, completed_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {TASK_COLUMNS}"#
        ))
        .bind(task_id)
        .bind(data.project_id)
        .bind(data.title.trim())
        .bind(&data.description)
        .bind(status)
        .bind(data.priority.unwrap_or_default())
        .bind(data.assignee_id)
        .bind(data.due_date)
        .bind(completed_at)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &SqlitePool, id: Uuid, data: &UpdateTask) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let status = data.status.unwrap_or(existing.status);
        let completed_at = completion_time(status, existing.completed_at);

        sqlx::query_as::<_, Task>(&format!(
            r#"UPDATE tasks
               SET title = $2, description = $3, status = $4, priority = $5, assignee_id = $6,
                   due_date = $7, completed_at = $8, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {TASK_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.title.clone().unwrap_or(existing.title))
        .bind(merge_text(&data.description, existing.description))
        .bind(status)
        .bind(data.priority.unwrap_or(existing.priority))
        .bind(data.assignee_id.or(existing.assignee_id))
        .bind(data.due_date.or(existing.due_date))
        .bind(completed_at)
        .fetch_one(pool)
        .await
    }

    /// Moves a task to `status`, stamping `completed_at` on completion and clearing it otherwise.
    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let completed_at = completion_time(status, existing.completed_at);

        sqlx::query_as::<_, Task>(&format!(
            r#"UPDATE tasks SET status = $2, completed_at = $3, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {TASK_COLUMNS}"#
        ))
        .bind(id)
        .bind(status)
        .bind(completed_at)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn completion_time(
    status: TaskStatus,
    current: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match status {
        TaskStatus::Completed => current.or_else(|| Some(Utc::now())),
        _ => None,
    }
}
