use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool, Type};
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
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    /// Statuses that still consume budget and appear on the operations board.
    pub fn is_open(self) -> bool {
        matches!(self, ProjectStatus::Planning | ProjectStatus::Active | ProjectStatus::Paused)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub client: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub budget_cents: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub manager_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ProjectWithManager {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub project: Project,
    pub manager_name: Option<String>,
}

impl std::ops::Deref for ProjectWithManager {
    type Target = Project;
    fn deref(&self) -> &Self::Target {
        &self.project
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    pub client: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub budget_cents: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub manager_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CreateProject {
    pub fn named(name: &str, client: &str) -> Self {
        Self {
            name: name.to_string(),
            client: client.to_string(),
            location: None,
            description: None,
            status: None,
            budget_cents: None,
            start_date: None,
            end_date: None,
            manager_id: None,
            latitude: None,
            longitude: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub client: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub budget_cents: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub manager_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

const PROJECT_COLUMNS: &str = "id, name, client, location, description, status, budget_cents, start_date, end_date, manager_id, latitude, longitude, created_at, updated_at";

impl Searchable for Project {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.client.as_str()];
        fields.extend(self.location.as_deref());
        fields
    }

    fn status_key(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn date_key(&self) -> Option<NaiveDate> {
        self.start_date
    }
}

impl Searchable for ProjectWithManager {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = self.project.search_text();
        fields.extend(self.manager_name.as_deref());
        fields
    }

    fn status_key(&self) -> Option<String> {
        self.project.status_key()
    }

    fn date_key(&self) -> Option<NaiveDate> {
        self.project.date_key()
    }
}

impl Project {
    /// Past its end date while still open.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.end_date.is_some_and(|end| end < today)
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// All projects joined with their manager's display name.
    pub async fn find_with_manager(
        pool: &SqlitePool,
    ) -> Result<Vec<ProjectWithManager>, sqlx::Error> {
        sqlx::query_as::<_, ProjectWithManager>(
            r#"SELECT p.id, p.name, p.client, p.location, p.description, p.status, p.budget_cents,
                      p.start_date, p.end_date, p.manager_id, p.latitude, p.longitude,
                      p.created_at, p.updated_at,
                      m.full_name AS manager_name
               FROM projects p
               LEFT JOIN profiles m ON m.id = p.manager_id
               ORDER BY p.created_at DESC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateProject,
        project_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            r#"INSERT INTO projects (id, name, client, location, description, status, budget_cents, start_date, end_date, manager_id, latitude, longitude)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING {PROJECT_COLUMNS}"#
        ))
        .bind(project_id)
        .bind(data.name.trim())
        .bind(data.client.trim())
        .bind(&data.location)
        .bind(&data.description)
        .bind(data.status.unwrap_or_default())
        .bind(data.budget_cents.unwrap_or(0))
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.manager_id)
        .bind(data.latitude)
        .bind(data.longitude)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateProject,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let name = data.name.clone().unwrap_or(existing.name);
        let client = data.client.clone().unwrap_or(existing.client);
        let location = merge_text(&data.location, existing.location);
        let description = merge_text(&data.description, existing.description);
        let status = data.status.unwrap_or(existing.status);
        let budget_cents = data.budget_cents.unwrap_or(existing.budget_cents);
        let start_date = data.start_date.or(existing.start_date);
        let end_date = data.end_date.or(existing.end_date);
        let manager_id = data.manager_id.or(existing.manager_id);
        let latitude = data.latitude.or(existing.latitude);
        let longitude = data.longitude.or(existing.longitude);

        sqlx::query_as::<_, Project>(&format!(
            r#"UPDATE projects
               SET name = $2, client = $3, location = $4, description = $5, status = $6,
                   budget_cents = $7, start_date = $8, end_date = $9, manager_id = $10,
                   latitude = $11, longitude = $12, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {PROJECT_COLUMNS}"#
        ))
        .bind(id)
        .bind(name)
        .bind(client)
        .bind(location)
        .bind(description)
        .bind(status)
        .bind(budget_cents)
        .bind(start_date)
        .bind(end_date)
        .bind(manager_id)
        .bind(latitude)
        .bind(longitude)
        .fetch_one(pool)
        .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: ProjectStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            r#"UPDATE projects SET status = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {PROJECT_COLUMNS}"#
        ))
        .bind(id)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    /// Deletes the project; tasks, expenses, incidents, reports and minutes cascade.
    /// Deletes the project and reports the child rows the schema removed or
    /// detached with it. `None` when the project does not exist.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<Option<ProjectRemoval>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let removal = ProjectRemoval {
            tasks: child_ids(&mut *tx, "tasks", id).await?,
            expenses: child_ids(&mut *tx, "expenses", id).await?,
            incidents: child_ids(&mut *tx, "incidents", id).await?,
            reports: child_ids(&mut *tx, "reports", id).await?,
            minutes: child_ids(&mut *tx, "minutes", id).await?,
            surveys: child_ids(&mut *tx, "surveys", id).await?,
            quotes: child_ids(&mut *tx, "quotes", id).await?,
            client_meetings: child_ids(&mut *tx, "client_meetings", id).await?,
            ledger_entries: child_ids(&mut *tx, "ledger_entries", id).await?,
        };

        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        tx.commit().await?;
        Ok(Some(removal))
    }
}

/// Rows affected by a project delete. Tasks, expenses, incidents, reports and
/// minutes are deleted with it; surveys, quotes, client meetings and ledger
/// entries stay with their `project_id` cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectRemoval {
    pub tasks: Vec<Uuid>,
    pub expenses: Vec<Uuid>,
    pub incidents: Vec<Uuid>,
    pub reports: Vec<Uuid>,
    pub minutes: Vec<Uuid>,
    pub surveys: Vec<Uuid>,
    pub quotes: Vec<Uuid>,
    pub client_meetings: Vec<Uuid>,
    pub ledger_entries: Vec<Uuid>,
}

async fn child_ids(
    conn: &mut SqliteConnection,
    table: &str,
    project_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT id FROM {table} WHERE project_id = $1"))
        .bind(project_id)
        .fetch_all(conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ledger::{CreateLedgerEntry, LedgerEntry, LedgerKind},
        profile::{CreateProfile, Profile},
        task::{CreateTask, Task},
        test_support::{date, pool, project},
    };

    #[tokio::test]
    async fn create_and_find() {
        let pool = pool().await;
        let mut data = CreateProject::named("Nave industrial", "Aceros del Bajío");
        data.budget_cents = Some(250_000_000);
        data.start_date = Some(date(2026, 1, 10));
        let id = Uuid::new_v4();
        let created = Project::create(&pool, &data, id).await.unwrap();

        assert_eq!(created.status, ProjectStatus::Planning);
        assert_eq!(created.budget_cents, 250_000_000);

        let found = Project::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(found.name, "Nave industrial");
        assert_eq!(found.start_date, Some(date(2026, 1, 10)));
    }

    #[tokio::test]
    async fn end_date_before_start_is_rejected() {
        let pool = pool().await;
        let mut data = CreateProject::named("Barda perimetral", "Cliente");
        data.start_date = Some(date(2026, 5, 1));
        data.end_date = Some(date(2026, 4, 1));
        assert!(Project::create(&pool, &data, Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn update_merges_and_filters_by_status() {
        let pool = pool().await;
        let p = project(&pool, "Remodelación").await;

        let updated = Project::update(
            &pool,
            p.id,
            &UpdateProject {
                status: Some(ProjectStatus::Active),
                budget_cents: Some(9_000_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Remodelación");
        assert_eq!(updated.status, ProjectStatus::Active);

        project(&pool, "Otra obra").await;
        let active: Vec<Project> = Project::find_all(&pool)
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.status == ProjectStatus::Active)
            .collect();
        assert_eq!(active.len(), 1);

        let paused = Project::update_status(&pool, p.id, ProjectStatus::Paused).await.unwrap();
        assert_eq!(paused.status, ProjectStatus::Paused);
    }

    #[tokio::test]
    async fn manager_name_is_joined() {
        let pool = pool().await;
        let manager_id = Uuid::new_v4();
        Profile::create(
            &pool,
            &CreateProfile {
                email: "ing@obra.mx".into(),
                full_name: "Ing. Ramírez".into(),
                role: None,
                phone: None,
            },
            manager_id,
        )
        .await
        .unwrap();

        let mut data = CreateProject::named("Puente peatonal", "Municipio");
        data.manager_id = Some(manager_id);
        Project::create(&pool, &data, Uuid::new_v4()).await.unwrap();
        project(&pool, "Sin gerente").await;

        let rows = Project::find_with_manager(&pool).await.unwrap();
        assert_eq!(rows.len(), 2);
        let with_manager = rows.iter().find(|r| r.name == "Puente peatonal").unwrap();
        assert_eq!(with_manager.manager_name.as_deref(), Some("Ing. Ramírez"));
    }

    #[tokio::test]
    async fn delete_cascades_to_tasks() {
        let pool = pool().await;
        let p = project(&pool, "Demolición").await;
        Task::create(&pool, &CreateTask::titled(p.id, "Retiro de escombro"), Uuid::new_v4())
            .await
            .unwrap();

        let entry = LedgerEntry::create(
            &pool,
            &CreateLedgerEntry {
                project_id: Some(p.id),
                kind: LedgerKind::Income,
                category: "Anticipo".into(),
                description: "Anticipo 30 %".into(),
                amount_cents: 100_000,
                entry_date: date(2026, 10, 1),
                reference: None,
            },
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let removal = Project::delete(&pool, p.id).await.unwrap().unwrap();
        assert_eq!(removal.tasks.len(), 1);
        assert_eq!(removal.ledger_entries, vec![entry.id]);
        assert!(removal.expenses.is_empty());
        assert!(Task::find_by_project_id(&pool, p.id).await.unwrap().is_empty());

        assert_eq!(Project::delete(&pool, p.id).await.unwrap(), None);
        let detached = LedgerEntry::find_by_id(&pool, entry.id).await.unwrap().unwrap();
        assert_eq!(detached.project_id, None);
    }

    #[test]
    fn overdue_only_while_open() {
        let mut p = Project {
            id: Uuid::new_v4(),
            name: "X".into(),
            client: "Y".into(),
            location: None,
            description: None,
            status: ProjectStatus::Active,
            budget_cents: 0,
            start_date: None,
            end_date: Some(date(2026, 9, 30)),
            manager_id: None,
            latitude: None,
            longitude: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(p.is_overdue(date(2026, 10, 1)));
        assert!(!p.is_overdue(date(2026, 9, 30)));
        p.status = ProjectStatus::Completed;
        assert!(!p.is_overdue(date(2026, 10, 1)));
    }
}
