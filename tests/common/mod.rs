//! Shared fixtures for the integration tests: a minimal PDF writer and
//! in-process stand-ins for the embedding and language-model services.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use paperqa::core::chain::LanguageModel;
use paperqa::core::embedding::Embedder;

/// Build a PDF whose only page shows `lines`, each in its own text object
/// so extractors see one line per entry.
pub fn pdf_bytes(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let y = 800 - (i as i64) * 14;
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
        operations.push(Operation::new("Td", vec![40.into(), y.into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("content stream encodes"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf serializes");
    bytes
}

pub fn write_pdf(path: &Path, lines: &[&str]) {
    std::fs::write(path, pdf_bytes(lines)).unwrap();
}

/// A short paper with three headings; the abstract is too short to index.
pub const PAPER: &[&str] = &[
    "ABSTRACT",
    "A short abstract.",
    "METHOD",
    "We trained a transformer model on arXiv abstracts for ten epochs.",
    "RESULTS",
    "The model reached ninety percent accuracy on the held out split.",
];

/// Deterministic bag-of-words embedder.
pub struct WordEmbedder {
    pub dims: usize,
}

impl WordEmbedder {
    pub fn new() -> Self {
        Self { dims: 32 }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(5usize, |acc, b| acc.wrapping_mul(33).wrapping_add(b as usize));
            v[bucket % self.dims] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for WordEmbedder {
    fn model_name(&self) -> &str {
        "word-test"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Language model that records every prompt and replies with a fixed
/// string. Clone `prompts` before boxing the model to inspect it later.
pub struct RecordingModel {
    pub reply: String,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl RecordingModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub fn last_prompt(prompts: &Arc<Mutex<Vec<String>>>) -> Option<String> {
    prompts.lock().unwrap().last().cloned()
}

#[async_trait]
impl LanguageModel for RecordingModel {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}
