//! Heading-based section segmentation.
//!
//! Raw extracted text is split into titled [`Section`]s. The splitting
//! rule sits behind the [`SegmentationStrategy`] trait so other
//! heuristics can replace it without touching the document builder.
//!
//! # Heading rule
//!
//! A heading is a line that starts with an uppercase ASCII letter,
//! contains only uppercase letters, digits, spaces/tabs, and colons, is
//! at least 4 characters long, and is immediately followed by a line
//! break. Text before the first heading is discarded. Each heading's
//! content runs up to the next heading or the end of the text.
//!
//! ```rust
//! use paperqa_core::segment::{HeadingSegmenter, SegmentationStrategy};
//!
//! let sections = HeadingSegmenter::new().segment("Title page\nINTRODUCTION\nWe study X.\n");
//! assert_eq!(sections.len(), 1);
//! assert_eq!(sections[0].title, "INTRODUCTION");
//! assert_eq!(sections[0].content, "We study X.");
//! ```

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Section;

/// Splits raw document text into titled sections.
pub trait SegmentationStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Split `text` into sections in document order. Returns an empty
    /// vector when no structure is found.
    fn segment(&self, text: &str) -> Vec<Section>;
}

fn heading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^([A-Z][A-Z0-9 \t:]{3,})\r?\n").expect("heading pattern is valid")
    })
}

/// The ALL-CAPS heading heuristic.
///
/// False positives (an all-caps sentence, a table header) are accepted;
/// no check is made that a heading names a real section.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadingSegmenter;

impl HeadingSegmenter {
    pub fn new() -> Self {
        Self
    }
}

impl SegmentationStrategy for HeadingSegmenter {
    fn name(&self) -> &str {
        "all-caps-headings"
    }

    fn segment(&self, text: &str) -> Vec<Section> {
        let headings: Vec<(usize, usize, &str)> = heading_pattern()
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let title = caps.get(1)?;
                Some((whole.start(), whole.end(), title.as_str()))
            })
            .collect();

        let mut sections = Vec::with_capacity(headings.len());
        for (i, &(_, body_start, title)) in headings.iter().enumerate() {
            let body_end = headings
                .get(i + 1)
                .map(|&(next_start, _, _)| next_start)
                .unwrap_or(text.len());
            sections.push(Section::new(title.trim(), text[body_start..body_end].trim()));
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str) -> Vec<Section> {
        HeadingSegmenter::new().segment(text)
    }

    #[test]
    fn three_headings_in_order() {
        let text = "ABSTRACT\nThis is the abstract.\nMETHOD\nWe used X.\nRESULTS\nWe found Y.";
        let sections = segment(text);
        assert_eq!(
            sections,
            vec![
                Section::new("ABSTRACT", "This is the abstract."),
                Section::new("METHOD", "We used X."),
                Section::new("RESULTS", "We found Y."),
            ]
        );
    }

    #[test]
    fn no_headings_yields_nothing() {
        assert!(segment("just some lowercase prose\nwith two lines\n").is_empty());
        assert!(segment("").is_empty());
    }

    #[test]
    fn front_matter_is_dropped() {
        let text = "A Study of Things\nJane Doe\n\nINTRODUCTION\nBody text here.\n";
        let sections = segment(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "INTRODUCTION");
        assert!(!sections[0].content.contains("Jane Doe"));
    }

    #[test]
    fn short_caps_lines_are_not_headings() {
        // "AB" and "ABC" are below the 4 character minimum.
        let sections = segment("INTRO\nfirst\nAB\nsecond\nABC\nthird\n");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "first\nAB\nsecond\nABC\nthird");
    }

    #[test]
    fn numbered_and_colon_headings() {
        let text = "1 INTRODUCTION\nnot a heading\n2 RELATED WORK:\nPrior art.\nAPPENDIX A\nExtra.";
        let titles: Vec<String> = segment(text).into_iter().map(|s| s.title).collect();
        // A leading digit is not an uppercase letter.
        assert_eq!(titles, vec!["APPENDIX A"]);

        let text = "SECTION 2: METHODS\nWe measured.\n";
        let sections = segment(text);
        assert_eq!(sections[0].title, "SECTION 2: METHODS");
    }

    #[test]
    fn heading_requires_trailing_newline() {
        // A caps line at end of text with no line break is not a heading.
        let sections = segment("INTRODUCTION\nBody.\nCONCLUSION");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "Body.\nCONCLUSION");
    }

    #[test]
    fn mixed_case_lines_are_not_headings() {
        assert!(segment("Introduction\nBody.\nMethods\nMore.\n").is_empty());
    }

    #[test]
    fn consecutive_headings_give_empty_content() {
        let sections = segment("PART ONE\nCHAPTER ONE\nIt begins.");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "PART ONE");
        assert_eq!(sections[0].content, "");
        assert_eq!(sections[1].content, "It begins.");
    }

    #[test]
    fn crlf_line_endings() {
        let sections = segment("ABSTRACT\r\nShort.\r\nRESULTS\r\nFound.\r\n");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "ABSTRACT");
        assert_eq!(sections[1].content, "Found.");
    }

    #[test]
    fn spans_cover_text_after_first_heading() {
        let text = "preamble\nINTRODUCTION\nalpha beta\nMETHODS\ngamma\ndelta\nRESULTS\nepsilon";
        let sections = segment(text);
        let rebuilt: Vec<String> = sections
            .iter()
            .map(|s| format!("{}\n{}", s.title, s.content))
            .collect();
        assert_eq!(rebuilt.join("\n"), &text["preamble\n".len()..]);
    }
}
