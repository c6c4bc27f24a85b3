//! PDF text extraction as an ordered chain of strategies.
//!
//! The chain tries each [`ExtractionStrategy`] in order and stops at the
//! first one whose output is usable (non-empty after trimming). The first
//! slot is reported as [`ExtractionMethod::Primary`], any later slot as
//! [`ExtractionMethod::Fallback`]. Failures never escape: unreadable
//! files, decoder errors, and decoder panics are logged and folded into
//! an unsuccessful [`ExtractionResult`] with empty text.
//!
//! Default chain:
//!
//! | Slot | Strategy | Decoder |
//! |------|----------|---------|
//! | primary | [`LopdfPages`] | `lopdf`, page by page, failed pages read as empty |
//! | fallback | [`PdfExtractText`] | `pdf-extract`, whole document |

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use paperqa_core::models::{ExtractionMethod, ExtractionResult};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read PDF: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF decoding failed: {0}")]
    Pdf(String),
    #[error("{0} panicked while decoding")]
    Panicked(&'static str),
}

/// One way of turning PDF bytes into text.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// The success predicate shared by every slot of the chain.
pub fn is_usable(text: &str) -> bool {
    !text.trim().is_empty()
}

/// Page-by-page extraction with `lopdf`. Pages are joined with `\n`; a
/// page that fails to decode contributes an empty string.
pub struct LopdfPages;

impl ExtractionStrategy for LopdfPages {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
            let pages: Vec<String> = doc
                .get_pages()
                .keys()
                .map(|&number| match doc.extract_text(&[number]) {
                    Ok(text) => text,
                    Err(e) => {
                        debug!(page = number, error = %e, "page text unavailable");
                        String::new()
                    }
                })
                .collect();
            Ok(pages.join("\n"))
        }));
        outcome.unwrap_or(Err(ExtractError::Panicked("lopdf")))
    }
}

/// Whole-document extraction with `pdf-extract`, which decodes fonts and
/// layout differently from `lopdf`.
pub struct PdfExtractText;

impl ExtractionStrategy for PdfExtractText {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }));
        outcome.unwrap_or(Err(ExtractError::Panicked("pdf-extract")))
    }
}

/// An ordered list of strategies.
pub struct ExtractionChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ExtractionChain {
    fn default() -> Self {
        Self::new(vec![Box::new(LopdfPages), Box::new(PdfExtractText)])
    }
}

impl ExtractionChain {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain over in-memory PDF bytes.
    pub fn run(&self, bytes: &[u8]) -> ExtractionResult {
        let mut last = "none";
        for (slot, strategy) in self.strategies.iter().enumerate() {
            last = strategy.name();
            let method = if slot == 0 {
                ExtractionMethod::Primary
            } else {
                ExtractionMethod::Fallback
            };
            match strategy.extract(bytes) {
                Ok(text) if is_usable(&text) => {
                    debug!(strategy = last, %method, chars = text.len(), "text extracted");
                    return ExtractionResult {
                        text,
                        method,
                        strategy: last.to_string(),
                        success: true,
                    };
                }
                Ok(_) => {
                    debug!(strategy = last, "strategy produced no text");
                }
                Err(e) => {
                    warn!(strategy = last, error = %e, "extraction strategy failed");
                }
            }
        }
        ExtractionResult::failed(last)
    }

    /// Read `path` and run the chain. A missing or unreadable file gives
    /// an unsuccessful result.
    pub fn extract(&self, path: &Path) -> ExtractionResult {
        match std::fs::read(path) {
            Ok(bytes) => self.run(&bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %ExtractError::from(e), "cannot read PDF");
                let last = self.strategies.last().map(|s| s.name()).unwrap_or("none");
                ExtractionResult::failed(last)
            }
        }
    }
}

/// Extract text from the PDF at `path` with the default chain.
pub fn extract(path: &Path) -> ExtractionResult {
    ExtractionChain::default().extract(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        output: Result<&'static str, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl ExtractionStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn extract(&self, _bytes: &[u8]) -> Result<String, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output
                .map(str::to_string)
                .map_err(|e| ExtractError::Pdf(e.to_string()))
        }
    }

    fn fixed(
        name: &'static str,
        output: Result<&'static str, &'static str>,
    ) -> (Box<dyn ExtractionStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Fixed {
                name,
                output,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    #[test]
    fn primary_success_skips_fallback() {
        let (primary, _) = fixed("a", Ok("METHOD\nWe used X."));
        let (fallback, fallback_calls) = fixed("b", Ok("other"));
        let result = ExtractionChain::new(vec![primary, fallback]).run(b"");
        assert!(result.success);
        assert_eq!(result.method, ExtractionMethod::Primary);
        assert_eq!(result.strategy, "a");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn whitespace_primary_falls_back() {
        let (primary, _) = fixed("a", Ok("  \n\t "));
        let (fallback, _) = fixed("b", Ok("recovered"));
        let result = ExtractionChain::new(vec![primary, fallback]).run(b"");
        assert!(result.success);
        assert_eq!(result.method, ExtractionMethod::Fallback);
        assert_eq!(result.text, "recovered");
    }

    #[test]
    fn erroring_primary_falls_back() {
        let (primary, _) = fixed("a", Err("broken xref"));
        let (fallback, _) = fixed("b", Ok("recovered"));
        let result = ExtractionChain::new(vec![primary, fallback]).run(b"");
        assert_eq!(result.method, ExtractionMethod::Fallback);
        assert_eq!(result.strategy, "b");
    }

    #[test]
    fn all_failing_gives_empty_fallback_result() {
        let (primary, _) = fixed("a", Err("bad"));
        let (fallback, _) = fixed("b", Ok(""));
        let result = ExtractionChain::new(vec![primary, fallback]).run(b"");
        assert!(!result.success);
        assert!(result.text.is_empty());
        assert_eq!(result.method, ExtractionMethod::Fallback);
        assert_eq!(result.strategy, "b");
    }

    #[test]
    fn garbage_bytes_do_not_panic() {
        let result = ExtractionChain::default().run(b"definitely not a pdf");
        assert!(!result.success);
        assert_eq!(result.method, ExtractionMethod::Fallback);
    }

    #[test]
    fn missing_file_is_unsuccessful() {
        let result = extract(Path::new("/nonexistent/paper.pdf"));
        assert!(!result.success);
        assert!(result.text.is_empty());
    }

    #[test]
    fn default_chain_order() {
        assert_eq!(
            ExtractionChain::default().strategy_names(),
            vec!["lopdf", "pdf-extract"]
        );
    }

    #[test]
    fn usable_predicate() {
        assert!(is_usable(" x "));
        assert!(!is_usable("\n \t"));
    }

    /// Two pages: the first shows `text`, the second's content stream
    /// reference points at an object that does not exist.
    fn pdf_with_broken_second_page(text: &str) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

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
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![40.into(), 800.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let good_page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        let broken_page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => Object::Reference((9999, 0)),
            "Resources" => resources_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![good_page.into(), broken_page.into()],
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn undecodable_page_keeps_other_pages_text() {
        let bytes = pdf_with_broken_second_page("METHODS SURVIVE");

        let text = LopdfPages.extract(&bytes).unwrap();
        assert!(text.contains("METHODS SURVIVE"));

        let result = ExtractionChain::default().run(&bytes);
        assert!(result.success);
        assert_eq!(result.method, ExtractionMethod::Primary);
        assert_eq!(result.strategy, "lopdf");
        assert!(result.text.contains("METHODS SURVIVE"));
    }
}
