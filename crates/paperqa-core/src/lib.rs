//! # paperqa core
//!
//! Shared, I/O-free logic for paperqa: data models, section
//! segmentation, document building, store abstraction, index
//! construction, MMR retrieval, persona prompts, and the answer chain.
//!
//! This crate contains no tokio, sqlx, filesystem, or network code.
//! Embedding services, language models, and persistent stores are
//! reached through the [`embedding::Embedder`], [`chain::LanguageModel`],
//! and [`store::Store`] traits, implemented by the `paperqa` app crate.
//!
//! ```text
//! text ──▶ segment ──▶ builder ──▶ index::build ──▶ Store
//!                                                     │
//!          question ──▶ retrieve (MMR) ◀──────────────┘
//!                           │
//!                           ▼
//!                 prompt (persona) ──▶ LanguageModel ──▶ Answer
//! ```

pub mod builder;
pub mod chain;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod segment;
pub mod store;

pub use error::PipelineError;
