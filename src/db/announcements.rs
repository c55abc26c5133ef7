use chrono::Utc;
use sqlx::Row;

use super::Repository;
use crate::errors::AppError;
use crate::models::{Announcement, CreateAnnouncementRequest};

impl Repository {
    pub async fn create_announcement(
        &self,
        request: &CreateAnnouncementRequest,
        created_by: &str,
    ) -> Result<Announcement, AppError> {
        let announcement = Announcement {
            id: uuid::Uuid::new_v4().to_string(),
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO announcements (id, title, description, created_by, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&announcement.id)
        .bind(&announcement.title)
        .bind(&announcement.description)
        .bind(&announcement.created_by)
        .bind(announcement.created_at)
        .execute(&self.pool)
        .await?;

        Ok(announcement)
    }

    /// Newest first.
    pub async fn list_announcements(&self) -> Result<Vec<Announcement>, AppError> {
        let rows = sqlx::query(
            "SELECT id, title, description, created_by, created_at FROM announcements ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut announcements = Vec::with_capacity(rows.len());
        for row in rows {
            announcements.push(Announcement {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                description: row.try_get("description")?,
                created_by: row.try_get("created_by")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(announcements)
    }
}
