//! In-memory cat store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{sort_cats, CatStore, StoreError};
use crate::geo::Bounds;
use crate::model::{Cat, CatPatch};

/// Thread-safe, cloneable in-memory cat store.
///
/// The lock is `parking_lot` and is never held across `.await`: every trait
/// method does its work synchronously before returning a ready future.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatStore {
    cats: Arc<RwLock<HashMap<Uuid, Cat>>>,
}

impl MemoryCatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. for tests.
    pub fn with_cats(cats: impl IntoIterator<Item = Cat>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.cats.write();
            for cat in cats {
                guard.insert(cat.id, cat);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.cats.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect(&self, keep: impl Fn(&Cat) -> bool) -> Vec<Cat> {
        let mut cats: Vec<Cat> = self
            .cats
            .read()
            .values()
            .filter(|cat| keep(cat))
            .cloned()
            .collect();
        sort_cats(&mut cats);
        cats
    }
}

#[async_trait]
impl CatStore for MemoryCatStore {
    async fn get(&self, id: Uuid) -> Result<Option<Cat>, StoreError> {
        Ok(self.cats.read().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Cat>, StoreError> {
        Ok(self.collect(|_| true))
    }

    async fn within(&self, bounds: &Bounds) -> Result<Vec<Cat>, StoreError> {
        Ok(self.collect(|cat| bounds.contains(&cat.location)))
    }

    async fn by_owner(&self, owner: &str) -> Result<Vec<Cat>, StoreError> {
        Ok(self.collect(|cat| cat.owner == owner))
    }

    async fn insert(&self, cat: Cat) -> Result<Cat, StoreError> {
        self.cats.write().insert(cat.id, cat.clone());
        Ok(cat)
    }

    async fn update(&self, id: Uuid, patch: &CatPatch) -> Result<Option<Cat>, StoreError> {
        let mut guard = self.cats.write();
        Ok(guard.get_mut(&id).map(|cat| {
            patch.apply(cat);
            cat.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Cat>, StoreError> {
        Ok(self.cats.write().remove(&id))
    }
}
