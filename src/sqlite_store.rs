//! SQLite-backed [`Store`] implementation.
//!
//! Collections live in `collections`/`units`/`unit_vectors`; the
//! embedding cache lives in `embedding_cache` keyed by (content hash,
//! model). Vector search is brute-force cosine similarity over the
//! collection's vectors, which is adequate for a handful of papers.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use paperqa_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use paperqa_core::models::RetrievableUnit;
use paperqa_core::store::{CollectionInfo, IndexedUnit, ScoredUnit, Store};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured index database and ensure its schema.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await.with_context(|| {
            format!(
                "Failed to open index database: {}",
                config.index.db_path().display()
            )
        })?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn row_to_unit(row: &sqlx::sqlite::SqliteRow) -> RetrievableUnit {
    RetrievableUnit::new(
        row.get::<String, _>("content"),
        row.get::<String, _>("section_title"),
        row.get::<String, _>("source_title"),
    )
}

#[async_trait]
impl Store for SqliteStore {
    async fn replace_collection(&self, info: &CollectionInfo, units: &[IndexedUnit]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM unit_vectors WHERE unit_id IN (SELECT id FROM units WHERE collection = ?)",
        )
        .bind(&info.name)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM units WHERE collection = ?")
            .bind(&info.name)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO collections (name, model, dims, unit_count, built_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                unit_count = excluded.unit_count,
                built_at = excluded.built_at
            "#,
        )
        .bind(&info.name)
        .bind(&info.model)
        .bind(info.dims as i64)
        .bind(units.len() as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        for (position, indexed) in units.iter().enumerate() {
            let unit_id = sqlx::query(
                r#"
                INSERT INTO units (collection, position, content, section_title, source_title, hash)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&info.name)
            .bind(position as i64)
            .bind(&indexed.unit.content)
            .bind(&indexed.unit.metadata.section)
            .bind(&indexed.unit.metadata.source)
            .bind(&indexed.hash)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            sqlx::query("INSERT INTO unit_vectors (unit_id, embedding) VALUES (?, ?)")
                .bind(unit_id)
                .bind(vec_to_blob(&indexed.vector))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let row = sqlx::query("SELECT name, model, dims, unit_count FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| CollectionInfo {
            name: r.get("name"),
            model: r.get("model"),
            dims: r.get::<i64, _>("dims") as usize,
            unit_count: r.get::<i64, _>("unit_count") as usize,
        }))
    }

    async fn list_units(&self, collection: &str) -> Result<Vec<RetrievableUnit>> {
        let rows = sqlx::query(
            r#"
            SELECT content, section_title, source_title
            FROM units
            WHERE collection = ?
            ORDER BY position ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_unit).collect())
    }

    async fn vector_search(
        &self,
        collection: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredUnit>> {
        let rows = sqlx::query(
            r#"
            SELECT u.content, u.section_title, u.source_title, v.embedding
            FROM units u
            JOIN unit_vectors v ON v.unit_id = u.id
            WHERE u.collection = ?
            ORDER BY u.position ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<ScoredUnit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                let score = cosine_similarity(query_vec, &vector);
                ScoredUnit {
                    unit: row_to_unit(row),
                    vector,
                    score,
                }
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
        let mut found = HashMap::new();
        for hash in hashes {
            let row = sqlx::query("SELECT embedding FROM embedding_cache WHERE hash = ? AND model = ?")
                .bind(hash)
                .bind(model)
                .fetch_optional(&self.pool)
                .await?;
            if let Some(row) = row {
                let blob: Vec<u8> = row.get("embedding");
                found.insert(hash.clone(), blob_to_vec(&blob));
            }
        }
        Ok(found)
    }

    async fn cache_embeddings(&self, model: &str, entries: &[(String, Vec<f32>)]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for (hash, vector) in entries {
            sqlx::query(
                r#"
                INSERT INTO embedding_cache (hash, model, dims, embedding, created_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(hash, model) DO UPDATE SET
                    dims = excluded.dims,
                    embedding = excluded.embedding,
                    created_at = excluded.created_at
                "#,
            )
            .bind(hash)
            .bind(model)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
