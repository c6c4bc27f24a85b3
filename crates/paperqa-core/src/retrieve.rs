//! Maximal-marginal-relevance retrieval.
//!
//! The retriever embeds the question, pulls `fetch_k` nearest candidates
//! from the [`Store`], then greedily picks `k` of them. Each step takes
//! the candidate maximizing
//!
//! ```text
//! λ · sim(query, c) − (1 − λ) · max sim(c, s)   for s already selected
//! ```
//!
//! so near-duplicate passages do not crowd out the context. `λ = 1`
//! degenerates to plain top-k cosine ranking.
//!
//! The embedder must be the model the index was built with.

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{PipelineError, PipelineResult};
use crate::index::IndexHandle;
use crate::models::RetrievableUnit;
use crate::store::{ScoredUnit, Store};

/// Retrieval tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Number of units to return.
    pub k: usize,
    /// Number of nearest candidates considered by MMR.
    pub fetch_k: usize,
    /// Relevance/diversity trade-off in `[0, 1]`.
    pub lambda: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            k: 4,
            fetch_k: 20,
            lambda: 0.5,
        }
    }
}

/// Return the `params.k` most relevant, mutually diverse units for
/// `question`.
pub async fn retrieve<S, E>(
    store: &S,
    embedder: &E,
    index: &IndexHandle,
    question: &str,
    params: &RetrievalParams,
) -> PipelineResult<Vec<RetrievableUnit>>
where
    S: Store + ?Sized,
    E: Embedder + ?Sized,
{
    if index.model != embedder.model_name() {
        return Err(PipelineError::ModelMismatch {
            index: index.model.clone(),
            query: embedder.model_name().to_string(),
        });
    }
    if params.k == 0 {
        return Ok(Vec::new());
    }
    let query_vec = embedder
        .embed(question)
        .await
        .map_err(PipelineError::embedding)?;
    if index.dims > 0 && query_vec.len() != index.dims {
        return Err(PipelineError::DimensionMismatch {
            expected: index.dims,
            actual: query_vec.len(),
        });
    }

    let candidates = store
        .vector_search(&index.collection, &query_vec, params.fetch_k.max(params.k))
        .await
        .map_err(PipelineError::store)?;

    let picked = mmr_select(&candidates, params.k, params.lambda);
    tracing::debug!(
        collection = %index.collection,
        candidates = candidates.len(),
        selected = picked.len(),
        "mmr retrieval"
    );
    Ok(picked
        .into_iter()
        .map(|i| candidates[i].unit.clone())
        .collect())
}

/// Greedy MMR selection over candidates already scored against the
/// query. Returns indices into `candidates` in selection order.
pub fn mmr_select(candidates: &[ScoredUnit], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(candidates.len());
    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (pos, &i) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(&candidates[i].vector, &candidates[s].vector))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
            let score = lambda * candidates[i].score - (1.0 - lambda) * redundancy;
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((pos, score));
            }
        }
        match best {
            Some((pos, _)) => selected.push(remaining.remove(pos)),
            None => break,
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_or_load;
    use crate::index::testing::HashEmbedder;
    use crate::store::memory::InMemoryStore;

    fn candidate(name: &str, vector: Vec<f32>, score: f32) -> ScoredUnit {
        ScoredUnit {
            unit: RetrievableUnit::new(name, name, "p"),
            vector,
            score,
        }
    }

    #[test]
    fn first_pick_is_most_relevant() {
        let cands = vec![
            candidate("b", vec![0.0, 1.0], 0.2),
            candidate("a", vec![1.0, 0.0], 0.9),
        ];
        assert_eq!(mmr_select(&cands, 1, 0.5), vec![1]);
    }

    #[test]
    fn near_duplicates_are_skipped() {
        // a and a2 are identical and most relevant; c is less relevant but
        // orthogonal. With λ = 0.5 the second pick is c.
        let cands = vec![
            candidate("a", vec![1.0, 0.0], 0.95),
            candidate("a2", vec![1.0, 0.0], 0.94),
            candidate("c", vec![0.0, 1.0], 0.60),
        ];
        assert_eq!(mmr_select(&cands, 2, 0.5), vec![0, 2]);
    }

    #[test]
    fn lambda_one_is_plain_top_k() {
        let cands = vec![
            candidate("a", vec![1.0, 0.0], 0.95),
            candidate("a2", vec![1.0, 0.0], 0.94),
            candidate("c", vec![0.0, 1.0], 0.60),
        ];
        assert_eq!(mmr_select(&cands, 2, 1.0), vec![0, 1]);
    }

    #[test]
    fn k_larger_than_candidates() {
        let cands = vec![candidate("a", vec![1.0], 0.5)];
        assert_eq!(mmr_select(&cands, 4, 0.5), vec![0]);
        assert!(mmr_select(&[], 4, 0.5).is_empty());
    }

    #[tokio::test]
    async fn query_equal_to_unit_content_finds_it() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(64);
        let units = vec![
            RetrievableUnit::new("graph neural networks for molecules", "INTRO", "p"),
            RetrievableUnit::new("we trained on protein folding data", "METHOD", "p"),
            RetrievableUnit::new("accuracy improved by ten percent", "RESULTS", "p"),
        ];
        let handle = build_or_load(&store, &embedder, "c", &units, 8).await.unwrap();

        let params = RetrievalParams {
            k: 3,
            ..RetrievalParams::default()
        };
        let found = retrieve(&store, &embedder, &handle, &units[1].content, &params)
            .await
            .unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0], units[1]);
    }

    #[tokio::test]
    async fn zero_k_returns_nothing() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(8);
        let handle = build_or_load(
            &store,
            &embedder,
            "c",
            &[RetrievableUnit::new("some content", "S", "p")],
            8,
        )
        .await
        .unwrap();
        let params = RetrievalParams {
            k: 0,
            ..RetrievalParams::default()
        };
        assert!(retrieve(&store, &embedder, &handle, "q", &params)
            .await
            .unwrap()
            .is_empty());
    }

    struct Renamed(HashEmbedder);

    #[async_trait::async_trait]
    impl Embedder for Renamed {
        fn model_name(&self) -> &str {
            "some-other-model"
        }
        fn dims(&self) -> usize {
            self.0.dims()
        }
        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.0.embed_batch(texts).await
        }
    }

    #[tokio::test]
    async fn query_embedder_must_match_index_model() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::new(16);
        let handle = build_or_load(
            &store,
            &embedder,
            "c",
            &[RetrievableUnit::new("some content about graphs", "S", "p")],
            8,
        )
        .await
        .unwrap();

        let other = Renamed(HashEmbedder::new(16));
        let err = retrieve(&store, &other, &handle, "graphs", &RetrievalParams::default())
            .await
            .unwrap_err();
        match err {
            PipelineError::ModelMismatch { index, query } => {
                assert_eq!(index, "hash-test");
                assert_eq!(query, "some-other-model");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
