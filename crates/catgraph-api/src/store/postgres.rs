//! Postgres cat store.
//!
//! All queries operate on the `cats` table created by
//! `migrations/0001_cats.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{CatStore, StoreError};
use crate::geo::Bounds;
use crate::model::{Cat, CatPatch, Point};

const CAT_COLUMNS: &str = "id, cat_name, weight, birthdate, filename, longitude, latitude, owner";

/// Connect to `url` and run the embedded migrations.
pub async fn init_pool(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(pool)
}

/// Cat store backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgCatStore {
    pool: PgPool,
}

impl PgCatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatStore for PgCatStore {
    async fn get(&self, id: Uuid) -> Result<Option<Cat>, StoreError> {
        let row = sqlx::query_as::<_, CatRow>(&format!("SELECT {CAT_COLUMNS} FROM cats WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CatRow::into_cat))
    }

    async fn list(&self) -> Result<Vec<Cat>, StoreError> {
        let rows = sqlx::query_as::<_, CatRow>(&format!(
            "SELECT {CAT_COLUMNS} FROM cats ORDER BY cat_name, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CatRow::into_cat).collect())
    }

    async fn within(&self, bounds: &Bounds) -> Result<Vec<Cat>, StoreError> {
        let rows = sqlx::query_as::<_, CatRow>(&format!(
            "SELECT {CAT_COLUMNS} FROM cats
             WHERE longitude BETWEEN $1 AND $2 AND latitude BETWEEN $3 AND $4
             ORDER BY cat_name, id"
        ))
        .bind(bounds.min_lng)
        .bind(bounds.max_lng)
        .bind(bounds.min_lat)
        .bind(bounds.max_lat)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CatRow::into_cat).collect())
    }

    async fn by_owner(&self, owner: &str) -> Result<Vec<Cat>, StoreError> {
        let rows = sqlx::query_as::<_, CatRow>(&format!(
            "SELECT {CAT_COLUMNS} FROM cats WHERE owner = $1 ORDER BY cat_name, id"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CatRow::into_cat).collect())
    }

    async fn insert(&self, cat: Cat) -> Result<Cat, StoreError> {
        sqlx::query(
            "INSERT INTO cats (id, cat_name, weight, birthdate, filename, longitude, latitude, owner)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(cat.id)
        .bind(&cat.cat_name)
        .bind(cat.weight)
        .bind(cat.birthdate)
        .bind(&cat.filename)
        .bind(cat.location.lng())
        .bind(cat.location.lat())
        .bind(&cat.owner)
        .execute(&self.pool)
        .await?;
        Ok(cat)
    }

    async fn update(&self, id: Uuid, patch: &CatPatch) -> Result<Option<Cat>, StoreError> {
        // FOR UPDATE: concurrent patches to one cat serialise on the row lock.
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, CatRow>(&format!(
            "SELECT {CAT_COLUMNS} FROM cats WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = current else {
            return Ok(None);
        };
        let mut cat = row.into_cat();
        patch.apply(&mut cat);

        sqlx::query(
            "UPDATE cats SET cat_name = $1, weight = $2, birthdate = $3, filename = $4,
                 longitude = $5, latitude = $6
             WHERE id = $7",
        )
        .bind(&cat.cat_name)
        .bind(cat.weight)
        .bind(cat.birthdate)
        .bind(&cat.filename)
        .bind(cat.location.lng())
        .bind(cat.location.lat())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(cat))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Cat>, StoreError> {
        let row = sqlx::query_as::<_, CatRow>(&format!(
            "DELETE FROM cats WHERE id = $1 RETURNING {CAT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CatRow::into_cat))
    }

    async fn owner_of(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        let owner = sqlx::query_scalar::<_, String>("SELECT owner FROM cats WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct CatRow {
    id: Uuid,
    cat_name: String,
    weight: f64,
    birthdate: DateTime<Utc>,
    filename: String,
    longitude: f64,
    latitude: f64,
    owner: String,
}

impl CatRow {
    fn into_cat(self) -> Cat {
        Cat {
            id: self.id,
            cat_name: self.cat_name,
            weight: self.weight,
            birthdate: self.birthdate,
            filename: self.filename,
            location: Point::new(self.longitude, self.latitude),
            owner: self.owner,
        }
    }
}
