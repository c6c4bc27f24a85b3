//! Vector index construction over a [`Store`].
//!
//! [`build_or_load`] embeds a batch of units and rewrites a named
//! collection so it holds exactly those units. Vectors already in the
//! store's embedding cache (same content hash, same model) are reused,
//! so re-indexing an unchanged paper costs no embedding calls.
//!
//! # Algorithm
//!
//! 1. Drop units whose content is empty or whitespace-only. If none
//!    remain, fail with [`PipelineError::EmptyIndex`].
//! 2. Hash each unit's content (SHA-256).
//! 3. Fetch cached vectors for those hashes.
//! 4. Embed the remaining distinct contents in batches of `batch_size`.
//! 5. Check every vector against the embedder's dimensionality.
//! 6. Cache the new vectors and replace the collection atomically.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::{PipelineError, PipelineResult};
use crate::models::RetrievableUnit;
use crate::store::{CollectionInfo, IndexedUnit, Store};

/// Default number of texts per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// A reference to a built collection, passed to retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexHandle {
    pub collection: String,
    pub model: String,
    pub dims: usize,
    pub unit_count: usize,
}

impl From<CollectionInfo> for IndexHandle {
    fn from(info: CollectionInfo) -> Self {
        Self {
            collection: info.name,
            model: info.model,
            dims: info.dims,
            unit_count: info.unit_count,
        }
    }
}

/// SHA-256 hex digest of a unit's content.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Embed `units` and store them as collection `collection`.
pub async fn build_or_load<S, E>(
    store: &S,
    embedder: &E,
    collection: &str,
    units: &[RetrievableUnit],
    batch_size: usize,
) -> PipelineResult<IndexHandle>
where
    S: Store + ?Sized,
    E: Embedder + ?Sized,
{
    let units: Vec<&RetrievableUnit> = units
        .iter()
        .filter(|u| !u.content.trim().is_empty())
        .collect();
    if units.is_empty() {
        return Err(PipelineError::EmptyIndex);
    }

    let model = embedder.model_name().to_string();
    let hashes: Vec<String> = units.iter().map(|u| content_hash(&u.content)).collect();

    // First occurrence of each hash, with the text that produced it.
    let mut distinct: Vec<String> = Vec::new();
    let mut distinct_text: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    for (unit, h) in units.iter().zip(&hashes) {
        if seen.insert(h.as_str()) {
            distinct.push(h.clone());
            distinct_text.push(unit.content.as_str());
        }
    }

    let mut dims = embedder.dims();
    let mut vectors: HashMap<String, Vec<f32>> = store
        .cached_embeddings(&model, &distinct)
        .await
        .map_err(PipelineError::store)?;
    if dims > 0 {
        vectors.retain(|_, v| v.len() == dims);
    }
    let reused = vectors.len();

    let pending: Vec<(String, String)> = distinct
        .iter()
        .zip(&distinct_text)
        .filter(|(hash, _)| !vectors.contains_key(*hash))
        .map(|(hash, text)| (hash.clone(), text.to_string()))
        .collect();

    let mut fresh: Vec<(String, Vec<f32>)> = Vec::with_capacity(pending.len());
    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
        let embedded = embedder
            .embed_batch(&texts)
            .await
            .map_err(PipelineError::embedding)?;
        if embedded.len() != batch.len() {
            return Err(PipelineError::Embedding(format!(
                "expected {} vectors, got {}",
                batch.len(),
                embedded.len()
            )));
        }
        for ((hash, _), vector) in batch.iter().zip(embedded) {
            if dims == 0 {
                dims = vector.len();
            }
            if vector.len() != dims {
                return Err(PipelineError::DimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                });
            }
            fresh.push((hash.clone(), vector));
        }
    }

    if !fresh.is_empty() {
        store
            .cache_embeddings(&model, &fresh)
            .await
            .map_err(PipelineError::store)?;
    }
    vectors.extend(fresh.iter().cloned());
    if dims == 0 {
        dims = vectors.values().next().map(|v| v.len()).unwrap_or(0);
    }

    let mut indexed = Vec::with_capacity(units.len());
    for (unit, hash) in units.iter().zip(hashes) {
        let vector = vectors
            .get(&hash)
            .cloned()
            .ok_or_else(|| PipelineError::Embedding(format!("no vector for unit {}", hash)))?;
        indexed.push(IndexedUnit {
            unit: (*unit).clone(),
            hash,
            vector,
        });
    }

    let info = CollectionInfo {
        name: collection.to_string(),
        model,
        dims,
        unit_count: indexed.len(),
    };
    store
        .replace_collection(&info, &indexed)
        .await
        .map_err(PipelineError::store)?;

    debug!(collection, reused, embedded = fresh.len(), "embedding cache");
    info!(
        collection,
        units = info.unit_count,
        dims = info.dims,
        model = %info.model,
        "index built"
    );

    Ok(info.into())
}

/// Open a previously built collection.
pub async fn load<S: Store + ?Sized>(store: &S, collection: &str) -> PipelineResult<IndexHandle> {
    store
        .collection_info(collection)
        .await
        .map_err(PipelineError::store)?
        .map(IndexHandle::from)
        .ok_or_else(|| PipelineError::IndexNotFound(collection.to_string()))
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::testing::HashEmbedder;
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn units() -> Vec<RetrievableUnit> {
        vec![
            RetrievableUnit::new("transformers use attention layers", "METHOD", "a.pdf"),
            RetrievableUnit::new("we evaluate on imagenet benchmarks", "RESULTS", "a.pdf"),
            RetrievableUnit::new("   ", "EMPTY", "a.pdf"),
        ]
    }

    #[tokio::test]
    async fn builds_exactly_the_supplied_units() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(32);
        let handle = build_or_load(&store, &embedder, "s1", &units(), 8)
            .await
            .unwrap();
        assert_eq!(handle.unit_count, 2);
        assert_eq!(handle.dims, 32);
        assert_eq!(handle.model, "hash-test");

        let stored = store.list_units("s1").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].metadata.section, "METHOD");

        // Rebuilding with fewer units shrinks the collection.
        build_or_load(&store, &embedder, "s1", &units()[..1], 8)
            .await
            .unwrap();
        assert_eq!(store.list_units("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn all_blank_units_is_empty_index() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(8);
        let blank = vec![
            RetrievableUnit::new("", "A", "p"),
            RetrievableUnit::new(" \n\t", "B", "p"),
        ];
        let err = build_or_load(&store, &embedder, "s", &blank, 8)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyIndex));

        let err = build_or_load(&store, &embedder, "s", &[], 8)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyIndex));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unchanged_units_reuse_cached_vectors() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(16);
        build_or_load(&store, &embedder, "s", &units(), 8)
            .await
            .unwrap();
        assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 2);

        build_or_load(&store, &embedder, "other", &units(), 8)
            .await
            .unwrap();
        assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 2);
        assert_eq!(store.cache_len(), 2);
    }

    #[tokio::test]
    async fn batches_respect_batch_size() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(16);
        let many: Vec<RetrievableUnit> = (0..10)
            .map(|i| RetrievableUnit::new(format!("unit number {}", i), "S", "p"))
            .collect();
        build_or_load(&store, &embedder, "s", &many, 4).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn duplicate_content_is_embedded_once() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(16);
        let dupes = vec![
            RetrievableUnit::new("same text", "A", "p1"),
            RetrievableUnit::new("same text", "A", "p2"),
        ];
        let handle = build_or_load(&store, &embedder, "s", &dupes, 8).await.unwrap();
        assert_eq!(handle.unit_count, 2);
        assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn only_new_distinct_texts_are_embedded() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(16);
        let a = RetrievableUnit::new("alpha text", "A", "p");
        let b = RetrievableUnit::new("beta text", "B", "p");
        let c = RetrievableUnit::new("gamma text", "C", "p");
        build_or_load(&store, &embedder, "s", &[a.clone()], 8)
            .await
            .unwrap();
        assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 1);

        let mixed = vec![b.clone(), a.clone(), b.clone(), c, a];
        let handle = build_or_load(&store, &embedder, "s", &mixed, 8).await.unwrap();
        assert_eq!(handle.unit_count, 5);
        // a is cached; b and c are embedded once each.
        assert_eq!(embedder.texts_embedded.load(Ordering::SeqCst), 3);
        assert_eq!(store.list_units("s").await.unwrap()[2], b);
    }

    struct WrongDims;

    #[async_trait]
    impl Embedder for WrongDims {
        fn model_name(&self) -> &str {
            "wrong"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0; 3]).collect())
        }
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = InMemoryStore::new();
        let err = build_or_load(&store, &WrongDims, "s", &units(), 8)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
        assert!(store.collection_info("s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_missing_collection() {
        let store = InMemoryStore::new();
        let err = load(&store, "nope").await.unwrap_err();
        assert!(matches!(err, PipelineError::IndexNotFound(ref c) if c == "nope"));
    }
}
