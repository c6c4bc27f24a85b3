//! # paperqa
//!
//! Question answering over research papers.
//!
//! paperqa extracts text from PDFs, splits it into sections at ALL-CAPS
//! headings, embeds the substantial sections into a SQLite-backed vector
//! index, and answers questions with a persona-styled prompt built from
//! MMR-retrieved context. Papers can be uploaded as files or fetched
//! from arXiv.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ arXiv fetch │──▶│ Extract PDF  │──▶│ Segment +    │
//! │ or upload   │   │ lopdf → pdf- │   │ build units  │
//! └─────────────┘   │ extract      │   └──────┬───────┘
//!                   └──────────────┘          │ embed
//!                                             ▼
//!        question ──▶ MMR retrieve ◀──── SQLite index
//!                          │
//!                          ▼
//!               persona prompt ──▶ LLM ──▶ answer
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pqa init
//! pqa fetch "quantum computing" --max 2
//! pqa index data/papers/*.pdf
//! pqa ask "What method was used?" --persona student
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF extraction strategy chain |
//! | [`fetch`] | arXiv search and download |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Language-model providers |
//! | [`http`] | Shared HTTP retry policy |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`pipeline`] | Caller-facing ingest / index / ask API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod fetch;
pub mod http;
pub mod llm;
pub mod migrate;
pub mod pipeline;
pub mod sqlite_store;

pub use paperqa_core as core;
