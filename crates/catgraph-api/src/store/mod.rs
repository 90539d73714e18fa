//! # Cat Store
//!
//! Persistence for cat documents behind one async trait. Two
//! implementations:
//!
//! - [`MemoryCatStore`]: in-process map, used when `DATABASE_URL` is unset
//!   and in tests. State does not survive restarts.
//! - [`PgCatStore`]: Postgres via SQLx, migrations embedded from
//!   `migrations/`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::geo::Bounds;
use crate::model::{Cat, CatPatch};

pub use memory::MemoryCatStore;
pub use postgres::{init_pool, PgCatStore};

/// Errors from the cat store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Cat persistence. Lists are ordered by name, then id.
#[async_trait]
pub trait CatStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Cat>, StoreError>;

    async fn list(&self) -> Result<Vec<Cat>, StoreError>;

    /// Cats whose location lies inside `bounds`.
    async fn within(&self, bounds: &Bounds) -> Result<Vec<Cat>, StoreError>;

    async fn by_owner(&self, owner: &str) -> Result<Vec<Cat>, StoreError>;

    async fn insert(&self, cat: Cat) -> Result<Cat, StoreError>;

    /// Apply `patch`; `Ok(None)` when no cat has this id.
    async fn update(&self, id: Uuid, patch: &CatPatch) -> Result<Option<Cat>, StoreError>;

    /// Remove and return the cat; `Ok(None)` when no cat has this id.
    async fn delete(&self, id: Uuid) -> Result<Option<Cat>, StoreError>;

    /// Owner of a cat, for ownership checks.
    async fn owner_of(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self.get(id).await?.map(|cat| cat.owner))
    }

    /// Cheap liveness check used by the readiness probe.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub(crate) fn sort_cats(cats: &mut [Cat]) {
    cats.sort_by(|a, b| a.cat_name.cmp(&b.cat_name).then(a.id.cmp(&b.id)));
}
