//! Storage abstraction for the vector index.
//!
//! The [`Store`] trait defines the persistence operations needed by
//! [`crate::index`] and [`crate::retrieve`], enabling pluggable backends
//! (SQLite in the app crate, in-memory here for tests).
//!
//! A store holds any number of named collections. Each collection is
//! rewritten as a whole by [`Store::replace_collection`], so a build
//! leaves exactly the supplied units behind. An embedding cache keyed by
//! (content hash, model) lets rebuilds skip unchanged content.

pub mod memory;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::RetrievableUnit;

/// Summary of a built collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Embedding model that produced the stored vectors.
    pub model: String,
    pub dims: usize,
    pub unit_count: usize,
}

/// A unit together with its content hash and embedding, ready to store.
#[derive(Debug, Clone)]
pub struct IndexedUnit {
    pub unit: RetrievableUnit,
    pub hash: String,
    pub vector: Vec<f32>,
}

/// A stored unit returned from a vector search.
///
/// Carries its vector so the retriever can compute inter-result
/// similarity without another round-trip.
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    pub unit: RetrievableUnit,
    pub vector: Vec<f32>,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Abstract storage backend for vector collections.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace_collection`](Store::replace_collection) | Atomically rewrite a collection |
/// | [`collection_info`](Store::collection_info) | Look up a built collection |
/// | [`list_units`](Store::list_units) | All units of a collection, in build order |
/// | [`vector_search`](Store::vector_search) | Cosine similarity candidates |
/// | [`cached_embeddings`](Store::cached_embeddings) | Reuse vectors by content hash |
/// | [`cache_embeddings`](Store::cache_embeddings) | Remember new vectors |
#[async_trait]
pub trait Store: Send + Sync {
    /// Replace every unit in `info.name` with `units`, in order.
    async fn replace_collection(&self, info: &CollectionInfo, units: &[IndexedUnit]) -> Result<()>;

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>>;

    async fn list_units(&self, collection: &str) -> Result<Vec<RetrievableUnit>>;

    /// Return up to `limit` units ordered by descending cosine similarity.
    async fn vector_search(
        &self,
        collection: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredUnit>>;

    /// Look up cached vectors for `model`, keyed by content hash.
    /// Hashes with no cached vector are absent from the map.
    async fn cached_embeddings(
        &self,
        model: &str,
        hashes: &[String],
    ) -> Result<HashMap<String, Vec<f32>>>;

    async fn cache_embeddings(&self, model: &str, entries: &[(String, Vec<f32>)]) -> Result<()>;
}
