//! Turns segmented sections into [`RetrievableUnit`]s.
//!
//! Sections whose trimmed content is [`MIN_SECTION_CHARS`] characters or
//! shorter are dropped; every retained unit is tagged with its section
//! title and the owning paper's display title. Sections from several
//! papers can be merged into one sequence for multi-paper questions,
//! preserving paper order and, within a paper, segmentation order.

use crate::models::{RetrievableUnit, Section};

/// Sections at or below this many trimmed characters are not indexed.
pub const MIN_SECTION_CHARS: usize = 30;

/// Build retrievable units from one paper's sections.
pub fn build(sections: &[Section], source_title: &str) -> Vec<RetrievableUnit> {
    build_with_min(sections, source_title, MIN_SECTION_CHARS)
}

/// [`build`] with an explicit minimum length.
pub fn build_with_min(
    sections: &[Section],
    source_title: &str,
    min_chars: usize,
) -> Vec<RetrievableUnit> {
    sections
        .iter()
        .filter(|s| qualifies(&s.content, min_chars))
        .map(|s| RetrievableUnit::new(s.content.trim(), s.title.as_str(), source_title))
        .collect()
}

/// Merge several papers' sections into one combined sequence.
///
/// `papers` yields `(source_title, sections)` pairs in processing order.
pub fn build_many<'a, I>(papers: I, min_chars: usize) -> Vec<RetrievableUnit>
where
    I: IntoIterator<Item = (&'a str, &'a [Section])>,
{
    papers
        .into_iter()
        .flat_map(|(title, sections)| build_with_min(sections, title, min_chars))
        .collect()
}

fn qualifies(content: &str, min_chars: usize) -> bool {
    content.trim().chars().count() > min_chars
}
