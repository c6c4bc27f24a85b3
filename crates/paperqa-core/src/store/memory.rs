//! In-memory [`Store`] implementation for tests and ephemeral sessions.
//!
//! Uses `HashMap` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over the collection.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::RetrievableUnit;

use super::{CollectionInfo, IndexedUnit, ScoredUnit, Store};

struct StoredCollection {
    info: CollectionInfo,
    units: Vec<IndexedUnit>,
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, StoredCollection>>,
    cache: RwLock<HashMap<(String, String), Vec<f32>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached embeddings across all models.
    pub fn cache_len(&self) -> usize {
        self.cache.read().unwrap().len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn replace_collection(&self, info: &CollectionInfo, units: &[IndexedUnit]) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        collections.insert(
            info.name.clone(),
            StoredCollection {
                info: info.clone(),
                units: units.to_vec(),
            },
        );
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let collections = self.collections.read().unwrap();
        Ok(collections.get(name).map(|c| c.info.clone()))
    }

    async fn list_units(&self, collection: &str) -> Result<Vec<RetrievableUnit>> {
        let collections = self.collections.read().unwrap();
        Ok(collections
            .get(collection)
            .map(|c| c.units.iter().map(|u| u.unit.clone()).collect())
            .unwrap_or_default())
    }

    async fn vector_search(
        &self,
        collection: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredUnit>> {
        let collections = self.collections.read().unwrap();
        let Some(stored) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<ScoredUnit> = stored
            .units
            .iter()
            .map(|u| ScoredUnit {
                unit: u.unit.clone(),
                vector: u.vector.clone(),
                score: cosine_similarity(query_vec, &u.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn cached_embeddings(
        &self,
        model: &str,
        hashes: &[String],
    ) -> Result<HashMap<String, Vec<f32>>> {
        let cache = self.cache.read().unwrap();
        Ok(hashes
            .iter()
            .filter_map(|h| {
                cache
                    .get(&(model.to_string(), h.clone()))
                    .map(|v| (h.clone(), v.clone()))
            })
            .collect())
    }

    async fn cache_embeddings(&self, model: &str, entries: &[(String, Vec<f32>)]) -> Result<()> {
        let mut cache = self.cache.write().unwrap();
        for (hash, vector) in entries {
            cache.insert((model.to_string(), hash.clone()), vector.clone());
        }
        Ok(())
    }
}
