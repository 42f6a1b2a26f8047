use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use utils::filter::Searchable;
use uuid::Uuid;

use super::merge_text;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Report {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub summary: String,
    pub work_date: NaiveDate,
    pub weather_note: Option<String>,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ReportPhoto {
    pub id: Uuid,
    pub report_id: Uuid,
    pub storage_path: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReportWithPhotos {
    #[serde(flatten)]
    #[ts(flatten)]
    pub report: Report,
    pub photos: Vec<ReportPhoto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateReportPhoto {
    pub storage_path: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateReport {
    pub project_id: Uuid,
    pub title: String,
    pub summary: String,
    pub work_date: NaiveDate,
    pub weather_note: Option<String>,
    #[serde(default)]
    pub photos: Vec<CreateReportPhoto>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateReport {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub work_date: Option<NaiveDate>,
    pub weather_note: Option<String>,
}

const REPORT_COLUMNS: &str =
    "id, project_id, title, summary, work_date, weather_note, author_id, created_at, updated_at";
const PHOTO_COLUMNS: &str = "id, report_id, storage_path, caption, created_at";

impl Searchable for Report {
    fn search_text(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.summary.as_str()]
    }

    fn date_key(&self) -> Option<NaiveDate> {
        Some(self.work_date)
    }
}

impl Report {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports ORDER BY work_date DESC, created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            r#"SELECT {REPORT_COLUMNS} FROM reports
               WHERE project_id = $1
               ORDER BY work_date DESC, created_at DESC"#
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_with_photos(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<ReportWithPhotos>, sqlx::Error> {
        let Some(report) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let photos = Self::photos_for(pool, id).await?;
        Ok(Some(ReportWithPhotos { report, photos }))
    }

    pub async fn photos_for(
        pool: &SqlitePool,
        report_id: Uuid,
    ) -> Result<Vec<ReportPhoto>, sqlx::Error> {
        sqlx::query_as::<_, ReportPhoto>(&format!(
            r#"SELECT {PHOTO_COLUMNS} FROM report_photos
               WHERE report_id = $1
               ORDER BY created_at ASC"#
        ))
        .bind(report_id)
        .fetch_all(pool)
        .await
    }

    /// Inserts the report and its photo rows together.
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateReport,
        author_id: Option<Uuid>,
        report_id: Uuid,
    ) -> Result<ReportWithPhotos, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let report = sqlx::query_as::<_, Report>(&format!(
            r#"INSERT INTO reports (id, project_id, title, summary, work_date, weather_note, author_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {REPORT_COLUMNS}"#
        ))
        .bind(report_id)
        .bind(data.project_id)
        .bind(data.title.trim())
        .bind(&data.summary)
        .bind(data.work_date)
        .bind(&data.weather_note)
        .bind(author_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut photos = Vec::with_capacity(data.photos.len());
        for photo in &data.photos {
            photos.push(insert_photo(&mut *tx, report_id, photo).await?);
        }
        tx.commit().await?;
        Ok(ReportWithPhotos { report, photos })
    }

    pub async fn add_photo(
        pool: &SqlitePool,
        report_id: Uuid,
        photo: &CreateReportPhoto,
    ) -> Result<ReportPhoto, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        insert_photo(&mut *conn, report_id, photo).await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateReport,
    ) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        sqlx::query_as::<_, Report>(&format!(
            r#"UPDATE reports
               SET title = $2, summary = $3, work_date = $4, weather_note = $5,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {REPORT_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.title.clone().unwrap_or(existing.title))
        .bind(data.summary.clone().unwrap_or(existing.summary))
        .bind(data.work_date.unwrap_or(existing.work_date))
        .bind(merge_text(&data.weather_note, existing.weather_note))
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn insert_photo(
    conn: &mut SqliteConnection,
    report_id: Uuid,
    photo: &CreateReportPhoto,
) -> Result<ReportPhoto, sqlx::Error> {
    sqlx::query_as::<_, ReportPhoto>(&format!(
        r#"INSERT INTO report_photos (id, report_id, storage_path, caption)
           VALUES ($1, $2, $3, $4)
           RETURNING {PHOTO_COLUMNS}"#
    ))
    .bind(Uuid::new_v4())
    .bind(report_id)
    .bind(&photo.storage_path)
    .bind(&photo.caption)
    .fetch_one(conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{date, pool, project};

    fn photo(path: &str) -> CreateReportPhoto {
        CreateReportPhoto {
            storage_path: path.into(),
            caption: None,
        }
    }

    #[tokio::test]
    async fn create_with_photos_and_add_more() {
        let pool = pool().await;
        let p = project(&pool, "Nave industrial").await;
        let created = Report::create(
            &pool,
            &CreateReport {
                project_id: p.id,
                title: "Avance semana 3".into(),
                summary: "Se terminó el colado de zapatas".into(),
                work_date: date(2026, 10, 14),
                weather_note: Some("Soleado".into()),
                photos: vec![photo("reports/a/1.jpg"), photo("reports/a/2.jpg")],
            },
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert_eq!(created.photos.len(), 2);

        Report::add_photo(&pool, created.report.id, &photo("reports/a/3.jpg"))
            .await
            .unwrap();
        let loaded = Report::find_with_photos(&pool, created.report.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.photos.len(), 3);
    }

    #[tokio::test]
    async fn photo_for_missing_report_fails() {
        let pool = pool().await;
        assert!(Report::add_photo(&pool, Uuid::new_v4(), &photo("x.jpg")).await.is_err());
    }

    #[tokio::test]
    async fn deleting_report_removes_photos() {
        let pool = pool().await;
        let p = project(&pool, "Nave industrial").await;
        let created = Report::create(
            &pool,
            &CreateReport {
                project_id: p.id,
                title: "Cierre".into(),
                summary: "Entrega".into(),
                work_date: date(2026, 10, 15),
                weather_note: None,
                photos: vec![photo("reports/b/1.jpg")],
            },
            None,
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(Report::delete(&pool, created.report.id).await.unwrap(), 1);
        assert!(Report::photos_for(&pool, created.report.id).await.unwrap().is_empty());
    }
}
