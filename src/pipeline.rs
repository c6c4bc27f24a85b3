//! Caller-facing pipeline API.
//!
//! [`Pipeline`] wires the configured store, embedder, language model,
//! extraction chain, and segmenter together and exposes the three
//! operations a front end needs:
//!
//! - [`Pipeline::ingest`]: PDF path → [`IngestedPaper`] (title, sections,
//!   extraction method)
//! - [`Pipeline::index`]: papers → [`IndexHandle`]
//! - [`Pipeline::ask`]: index + question + persona → [`Answer`]
//!
//! Ingestion never fails; its outcome is reported through
//! [`IngestStatus`]. Index and answer failures are [`PipelineError`]s.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use paperqa_core::builder;
use paperqa_core::chain::{AnswerChain, LanguageModel, RenderedPrompt};
use paperqa_core::embedding::Embedder;
use paperqa_core::error::PipelineResult;
use paperqa_core::index::{self, IndexHandle};
use paperqa_core::models::{Answer, ExtractionMethod, RawDocument, RetrievableUnit, Section};
use paperqa_core::segment::{HeadingSegmenter, SegmentationStrategy};
use paperqa_core::store::Store;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::ExtractionChain;
use crate::llm::create_language_model;
use crate::sqlite_store::SqliteStore;

/// How far ingestion of one paper got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Ok,
    /// Every extraction strategy failed or produced only whitespace.
    NoExtractableText,
    /// Text was extracted but no heading was detected.
    NoStructureFound,
}

impl std::fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestStatus::Ok => write!(f, "ok"),
            IngestStatus::NoExtractableText => write!(f, "no extractable text"),
            IngestStatus::NoStructureFound => write!(f, "no section structure found"),
        }
    }
}

/// The paper record produced by ingestion. Serializes as
/// `{title, sections: [{section_title, content}], extraction_method}`.
#[derive(Debug, Clone, Serialize)]
pub struct IngestedPaper {
    pub title: String,
    pub sections: Vec<Section>,
    pub extraction_method: ExtractionMethod,
    #[serde(skip)]
    pub status: IngestStatus,
}

/// Extract and segment one PDF with the default extraction chain and
/// heading segmenter. Needs no store or providers.
pub fn ingest(path: &Path) -> IngestedPaper {
    ingest_with(
        &ExtractionChain::default(),
        &HeadingSegmenter::new(),
        &RawDocument::from_path(path),
    )
}

fn ingest_with(
    extractor: &ExtractionChain,
    segmenter: &dyn SegmentationStrategy,
    doc: &RawDocument,
) -> IngestedPaper {
    let extraction = extractor.extract(&doc.path);
    let sections = segmenter.segment(&extraction.text);

    let status = if !extraction.success {
        IngestStatus::NoExtractableText
    } else if sections.is_empty() {
        IngestStatus::NoStructureFound
    } else {
        IngestStatus::Ok
    };
    match status {
        IngestStatus::Ok => info!(
            title = %doc.title,
            method = %extraction.method,
            strategy = %extraction.strategy,
            segmenter = segmenter.name(),
            sections = sections.len(),
            "paper ingested"
        ),
        other => warn!(title = %doc.title, status = %other, "paper has no usable sections"),
    }

    IngestedPaper {
        title: doc.title.clone(),
        sections,
        extraction_method: extraction.method,
        status,
    }
}

pub struct Pipeline {
    config: Config,
    store: Box<dyn Store>,
    embedder: Box<dyn Embedder>,
    llm: Box<dyn LanguageModel>,
    extractor: ExtractionChain,
    segmenter: Box<dyn SegmentationStrategy>,
}

impl Pipeline {
    /// Build a pipeline from configuration: SQLite store under
    /// `[index].dir` plus the configured embedding and language-model
    /// providers.
    pub async fn open(config: Config) -> Result<Self> {
        let store = SqliteStore::open(&config).await?;
        let embedder = create_embedder(&config.embedding)?;
        let llm = create_language_model(&config.llm)?;
        Ok(Self::with_parts(config, Box::new(store), embedder, llm))
    }

    /// Build a pipeline from explicit collaborators.
    pub fn with_parts(
        config: Config,
        store: Box<dyn Store>,
        embedder: Box<dyn Embedder>,
        llm: Box<dyn LanguageModel>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            llm,
            extractor: ExtractionChain::default(),
            segmenter: Box::new(HeadingSegmenter::new()),
        }
    }

    pub fn with_segmenter(mut self, segmenter: Box<dyn SegmentationStrategy>) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Extract and segment one PDF. The title is the file name.
    pub fn ingest(&self, path: &Path) -> IngestedPaper {
        self.ingest_document(&RawDocument::from_path(path))
    }

    pub fn ingest_document(&self, doc: &RawDocument) -> IngestedPaper {
        ingest_with(&self.extractor, self.segmenter.as_ref(), doc)
    }

    /// The retrievable units of `papers`, merged in order.
    pub fn units(&self, papers: &[IngestedPaper]) -> Vec<RetrievableUnit> {
        builder::build_many(
            papers
                .iter()
                .map(|p| (p.title.as_str(), p.sections.as_slice())),
            self.config.segmentation.min_section_chars,
        )
    }

    /// Build `collection` from the qualifying sections of `papers`.
    pub async fn index(
        &self,
        papers: &[IngestedPaper],
        collection: &str,
    ) -> PipelineResult<IndexHandle> {
        let units = self.units(papers);
        self.index_units(&units, collection).await
    }

    pub async fn index_units(
        &self,
        units: &[RetrievableUnit],
        collection: &str,
    ) -> PipelineResult<IndexHandle> {
        index::build_or_load(
            self.store.as_ref(),
            self.embedder.as_ref(),
            collection,
            units,
            self.config.embedding.batch_size,
        )
        .await
    }

    /// Handle for a collection built earlier.
    pub async fn load_index(&self, collection: &str) -> PipelineResult<IndexHandle> {
        index::load(self.store.as_ref(), collection).await
    }

    fn chain(&self) -> AnswerChain<'_, dyn Store, dyn Embedder, dyn LanguageModel> {
        AnswerChain::new(
            self.store.as_ref(),
            self.embedder.as_ref(),
            self.llm.as_ref(),
            self.config.retrieval.params(),
        )
    }

    /// Retrieve context and render the prompt without generating.
    pub async fn render_prompt(
        &self,
        index: &IndexHandle,
        question: &str,
        persona: &str,
    ) -> PipelineResult<RenderedPrompt> {
        self.chain().render(index, question, persona).await
    }

    pub async fn ask(
        &self,
        index: &IndexHandle,
        question: &str,
        persona: &str,
    ) -> PipelineResult<Answer> {
        self.chain().answer(index, question, persona).await
    }
}
