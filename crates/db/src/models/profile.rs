use chrono::{DateTime, Utc};
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
#[sqlx(type_name = "profile_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Supervisor,
    #[default]
    Viewer,
}

impl Role {
    /// Roles allowed to create, edit and delete operational records.
    pub fn can_write(self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Supervisor)
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProfile {
    pub email: String,
    pub full_name: String,
    pub role: Option<Role>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProfile {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct RoleCount {
    pub role: Role,
    pub count: i64,
}

impl Searchable for Profile {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.full_name.as_str(), self.email.as_str()];
        fields.extend(self.phone.as_deref());
        fields
    }

    fn status_key(&self) -> Option<String> {
        Some(self.role.to_string())
    }
}

const SELECT_PROFILE: &str = r#"SELECT id, email, full_name, role, active, phone, created_at, updated_at
   FROM profiles"#;

impl Profile {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!("{SELECT_PROFILE} ORDER BY full_name ASC"))
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!("{SELECT_PROFILE} WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!("{SELECT_PROFILE} WHERE email = $1"))
            .bind(email.trim())
            .fetch_optional(pool)
            .await
    }

    /// Inserts a profile. The first profile of an installation is always an admin.
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateProfile,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&mut *tx)
            .await?;
        let role = if existing == 0 {
            Role::Admin
        } else {
            data.role.unwrap_or_default()
        };

        let profile = sqlx::query_as::<_, Profile>(
            r#"INSERT INTO profiles (id, email, full_name, role, phone)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, email, full_name, role, active, phone, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.email.trim())
        .bind(data.full_name.trim())
        .bind(role)
        .bind(&data.phone)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(profile)
    }

    /// Idempotent insert for first sign-in. Concurrent calls for the same id all
    /// see the same row. Returns `None` when the email belongs to another profile.
    pub async fn provision(
        pool: &SqlitePool,
        data: &CreateProfile,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO profiles (id, email, full_name, role, phone)
               SELECT $1, $2, $3,
                      CASE WHEN EXISTS (SELECT 1 FROM profiles) THEN $4 ELSE 'admin' END,
                      $5
               WHERE true
               ON CONFLICT DO NOTHING"#,
        )
        .bind(id)
        .bind(data.email.trim())
        .bind(data.full_name.trim())
        .bind(data.role.unwrap_or_default())
        .bind(&data.phone)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, id).await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateProfile,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let full_name = data
            .full_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(existing.full_name);
        let phone = merge_text(&data.phone, existing.phone);

        sqlx::query_as::<_, Profile>(
            r#"UPDATE profiles
               SET full_name = $2, phone = $3, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, email, full_name, role, active, phone, created_at, updated_at"#,
        )
        .bind(id)
        .bind(full_name)
        .bind(phone)
        .fetch_one(pool)
        .await
    }

    pub async fn set_role(pool: &SqlitePool, id: Uuid, role: Role) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"UPDATE profiles
               SET role = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, email, full_name, role, active, phone, created_at, updated_at"#,
        )
        .bind(id)
        .bind(role)
        .fetch_one(pool)
        .await
    }

    pub async fn set_active(pool: &SqlitePool, id: Uuid, active: bool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"UPDATE profiles
               SET active = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, email, full_name, role, active, phone, created_at, updated_at"#,
        )
        .bind(id)
        .bind(active)
        .fetch_one(pool)
        .await
    }

    pub async fn count_by_role(pool: &SqlitePool) -> Result<Vec<RoleCount>, sqlx::Error> {
        sqlx::query_as::<_, RoleCount>(
            "SELECT role, COUNT(*) AS count FROM profiles GROUP BY role ORDER BY role",
        )
        .fetch_all(pool)
        .await
    }

    /// Number of active admins; used to refuse demoting or disabling the last one.
    pub async fn count_active_admins(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE role = 'admin' AND active = 1")
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::pool;

    fn create(email: &str, role: Option<Role>) -> CreateProfile {
        CreateProfile {
            email: email.to_string(),
            full_name: "Ana López".to_string(),
            role,
            phone: None,
        }
    }

    #[tokio::test]
    async fn first_profile_becomes_admin() {
        let pool = pool().await;
        let first = Profile::create(&pool, &create("ana@obra.mx", Some(Role::Viewer)), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(first.role, Role::Admin);

        let second = Profile::create(&pool, &create("luis@obra.mx", None), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(second.role, Role::Viewer);
        assert!(second.active);
    }

    #[tokio::test]
    async fn provision_is_idempotent() {
        let pool = pool().await;
        let id = Uuid::new_v4();
        let first = Profile::provision(&pool, &create("ana@obra.mx", Some(Role::Viewer)), id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.role, Role::Admin);

        let again = Profile::provision(&pool, &create("ana@obra.mx", None), id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(Profile::find_all(&pool).await.unwrap().len(), 1);

        let viewer = Profile::provision(&pool, &create("luis@obra.mx", None), Uuid::new_v4())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(viewer.role, Role::Viewer);

        let taken = Profile::provision(&pool, &create("ANA@obra.mx", None), Uuid::new_v4())
            .await
            .unwrap();
        assert!(taken.is_none());
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive_and_unique() {
        let pool = pool().await;
        Profile::create(&pool, &create("Ana@Obra.mx", None), Uuid::new_v4())
            .await
            .unwrap();

        let found = Profile::find_by_email(&pool, "ana@obra.mx").await.unwrap();
        assert!(found.is_some());

        let duplicate = Profile::create(&pool, &create("ANA@OBRA.MX", None), Uuid::new_v4()).await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn role_and_active_changes() {
        let pool = pool().await;
        Profile::create(&pool, &create("admin@obra.mx", None), Uuid::new_v4())
            .await
            .unwrap();
        let id = Uuid::new_v4();
        Profile::create(&pool, &create("sup@obra.mx", None), id).await.unwrap();

        let promoted = Profile::set_role(&pool, id, Role::Supervisor).await.unwrap();
        assert_eq!(promoted.role, Role::Supervisor);
        assert!(promoted.role.can_write());
        assert!(!promoted.role.is_admin());

        let disabled = Profile::set_active(&pool, id, false).await.unwrap();
        assert!(!disabled.active);

        let counts = Profile::count_by_role(&pool).await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(Profile::count_active_admins(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_keeps_unset_fields() {
        let pool = pool().await;
        let id = Uuid::new_v4();
        let mut data = create("ana@obra.mx", None);
        data.phone = Some("555-0100".into());
        Profile::create(&pool, &data, id).await.unwrap();

        let updated = Profile::update(
            &pool,
            id,
            &UpdateProfile {
                full_name: Some("Ana María López".into()),
                phone: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.full_name, "Ana María López");
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));

        let cleared = Profile::update(
            &pool,
            id,
            &UpdateProfile {
                full_name: None,
                phone: Some(String::new()),
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.phone, None);
    }
}
