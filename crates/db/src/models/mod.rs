pub mod client_meeting;
pub mod expense;
pub mod incident;
pub mod ledger;
pub mod minute;
pub mod profile;
pub mod project;
pub mod quote;
pub mod report;
pub mod survey;
pub mod task;

/// Merges an optional text field from an update payload: `None` keeps the
/// stored value, a blank string clears it.
pub(crate) fn merge_text(update: &Option<String>, current: Option<String>) -> Option<String> {
    match update {
        Some(s) if s.trim().is_empty() => None,
        Some(s) => Some(s.clone()),
        None => current,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use sqlx::SqlitePool;
    use uuid::Uuid;

    use super::project::{CreateProject, Project};
    use crate::DBService;

    pub async fn pool() -> SqlitePool {
        DBService::new_in_memory().await.unwrap().pool
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub async fn project(pool: &SqlitePool, name: &str) -> Project {
        Project::create(pool, &CreateProject::named(name, "Grupo Norte"), Uuid::new_v4())
            .await
            .unwrap()
    }
}
