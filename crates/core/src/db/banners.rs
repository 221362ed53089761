//! Home page banner repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use super::RepositoryError;
use crate::types::BannerId;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Banner {
    pub id: BannerId,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBanner {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Image URL is required"))]
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BannerChanges {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Image URL cannot be empty"))]
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

const fn default_true() -> bool {
    true
}

const BANNER_COLUMNS: &str = "id, title, description, image_url, link_url, display_order, \
                              is_active, valid_from, valid_until, created_at, updated_at";

pub struct BannerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BannerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active banners whose validity window contains `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_live(&self, now: DateTime<Utc>) -> Result<Vec<Banner>, RepositoryError> {
        let rows = sqlx::query_as::<_, Banner>(&format!(
            r"
            SELECT {BANNER_COLUMNS} FROM banners
            WHERE is_active
              AND (valid_from IS NULL OR valid_from <= $1)
              AND (valid_until IS NULL OR valid_until >= $1)
            ORDER BY display_order, id
            "
        ))
        .bind(now)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Banner>, RepositoryError> {
        let rows = sqlx::query_as::<_, Banner>(&format!(
            "SELECT {BANNER_COLUMNS} FROM banners ORDER BY display_order, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, new), fields(title = %new.title))]
    pub async fn create(&self, new: &NewBanner) -> Result<Banner, RepositoryError> {
        let row = sqlx::query_as::<_, Banner>(&format!(
            r"
            INSERT INTO banners (
                title, description, image_url, link_url, display_order, is_active,
                valid_from, valid_until
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {BANNER_COLUMNS}
            "
        ))
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.image_url)
        .bind(&new.link_url)
        .bind(new.display_order)
        .bind(new.is_active)
        .bind(new.valid_from)
        .bind(new.valid_until)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    #[instrument(skip(self, changes))]
    pub async fn update(
        &self,
        id: BannerId,
        changes: &BannerChanges,
    ) -> Result<Banner, RepositoryError> {
        sqlx::query_as::<_, Banner>(&format!(
            r"
            UPDATE banners SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                image_url = COALESCE($4, image_url),
                link_url = COALESCE($5, link_url),
                display_order = COALESCE($6, display_order),
                is_active = COALESCE($7, is_active),
                valid_from = COALESCE($8, valid_from),
                valid_until = COALESCE($9, valid_until),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {BANNER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.image_url)
        .bind(&changes.link_url)
        .bind(changes.display_order)
        .bind(changes.is_active)
        .bind(changes.valid_from)
        .bind(changes.valid_until)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: BannerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM banners WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
