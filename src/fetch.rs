//! arXiv paper fetcher.
//!
//! Queries the arXiv export API for the most recently submitted papers
//! matching a free-text query and downloads their PDFs into the
//! configured papers directory.
//!
//! Nothing here returns an error to the caller: a failed search yields no
//! paths, and a failed download is logged and skipped so the rest of the
//! batch still lands. Requests after the search are spaced by
//! `[fetch].request_delay_ms` to stay inside the catalog's rate limit.
//!
//! File names come from the paper title, truncated to 50 characters and
//! stripped of path-hostile characters. Two papers in one batch that
//! would share a name are told apart by their arXiv identifier.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{info, warn};

use crate::config::{clamp_max_results, FetchConfig};

/// Query used when the caller supplies an empty one.
pub const DEFAULT_QUERY: &str = "LLM";

const TITLE_CHARS: usize = 50;

/// One `<entry>` of the arXiv Atom feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Abstract page URL, e.g. `http://arxiv.org/abs/2401.01234v1`.
    pub id: String,
    pub title: String,
    pub pdf_url: String,
}

impl FeedEntry {
    /// The trailing identifier of [`FeedEntry::id`], e.g. `2401.01234v1`.
    pub fn short_id(&self) -> &str {
        self.id
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.id)
    }
}

/// Parse an arXiv Atom feed into its entries, in feed order.
///
/// Entries without an id are dropped. When an entry carries no PDF link
/// the URL is derived from the abstract URL.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Field {
        None,
        Id,
        Title,
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<(String, String, Option<String>)> = None;
    let mut field = Field::None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => current = Some((String::new(), String::new(), None)),
                b"id" if current.is_some() => {
                    field = Field::Id;
                    text.clear();
                }
                b"title" if current.is_some() => {
                    field = Field::Title;
                    text.clear();
                }
                b"link" => take_pdf_link(&e, &mut current),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"link" {
                    take_pdf_link(&e, &mut current);
                }
            }
            Ok(Event::Text(t)) => {
                if field != Field::None {
                    let chunk = t.unescape().context("invalid text in arXiv feed")?;
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(&chunk);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"id" | b"title" => {
                    if let Some((id, title, _)) = current.as_mut() {
                        let value = collapse_whitespace(&text);
                        match field {
                            Field::Id => *id = value,
                            Field::Title => *title = value,
                            Field::None => {}
                        }
                    }
                    field = Field::None;
                }
                b"entry" => {
                    if let Some((id, title, pdf)) = current.take() {
                        if id.is_empty() {
                            continue;
                        }
                        let pdf_url = pdf.unwrap_or_else(|| pdf_url_from_id(&id));
                        entries.push(FeedEntry { id, title, pdf_url });
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => bail!(
                "malformed arXiv feed at byte {}: {}",
                reader.buffer_position(),
                e
            ),
            _ => {}
        }
    }

    Ok(entries)
}

fn take_pdf_link(e: &BytesStart<'_>, current: &mut Option<(String, String, Option<String>)>) {
    let Some((_, _, pdf)) = current.as_mut() else {
        return;
    };
    let mut href = None;
    let mut is_pdf = false;
    for attr in e.attributes().flatten() {
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => continue,
        };
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value),
            b"title" if value == "pdf" => is_pdf = true,
            b"type" if value == "application/pdf" => is_pdf = true,
            _ => {}
        }
    }
    if is_pdf && pdf.is_none() {
        *pdf = href;
    }
}

fn pdf_url_from_id(id: &str) -> String {
    id.replacen("/abs/", "/pdf/", 1)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive a file name (with `.pdf`) from a paper title.
pub fn file_name_for(title: &str, fallback: &str) -> String {
    let cleaned: String = title
        .chars()
        .take(TITLE_CHARS)
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.').trim();
    let stem = if cleaned.is_empty() {
        fallback.replace('/', "_")
    } else {
        cleaned.to_string()
    };
    format!("{}.pdf", stem)
}

pub struct ArxivFetcher {
    client: reqwest::Client,
    base_url: String,
    dir: PathBuf,
    delay: Duration,
}

impl ArxivFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("paperqa/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            dir: config.dir.clone(),
            delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run a catalog search, newest submissions first.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<FeedEntry>> {
        let query = if query.trim().is_empty() {
            DEFAULT_QUERY
        } else {
            query.trim()
        };
        let max_results = clamp_max_results(max_results);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", format!("all:{}", query)),
                ("start", "0".to_string()),
                ("max_results", max_results.to_string()),
                ("sortBy", "submittedDate".to_string()),
                ("sortOrder", "descending".to_string()),
            ])
            .send()
            .await
            .context("arXiv search request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("arXiv search returned {}", status);
        }
        let body = response.text().await?;
        let mut entries = parse_feed(&body)?;
        entries.truncate(max_results);
        Ok(entries)
    }

    async fn download(&self, entry: &FeedEntry, path: &Path) -> Result<()> {
        let response = self
            .client
            .get(&entry.pdf_url)
            .send()
            .await
            .with_context(|| format!("request for {} failed", entry.pdf_url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("{} returned {}", entry.pdf_url, status);
        }
        let bytes = response.bytes().await?;
        if !bytes.starts_with(b"%PDF") {
            bail!("{} did not return a PDF", entry.pdf_url);
        }
        tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(())
    }

    /// Search and download up to `max_results` papers. Returns the local
    /// paths of the PDFs that were saved; empty on any catalog failure.
    pub async fn fetch(&self, query: &str, max_results: usize) -> Vec<PathBuf> {
        let entries = match self.search(query, max_results).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "arXiv search failed");
                return Vec::new();
            }
        };
        if entries.is_empty() {
            return Vec::new();
        }
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "cannot create papers directory");
            return Vec::new();
        }

        let mut used = HashSet::new();
        let mut saved = Vec::with_capacity(entries.len());
        for entry in &entries {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let mut name = file_name_for(&entry.title, entry.short_id());
            if !used.insert(name.clone()) {
                let stem = name.trim_end_matches(".pdf").to_string();
                name = format!("{}-{}.pdf", stem, entry.short_id().replace('/', "_"));
                used.insert(name.clone());
            }
            let path = self.dir.join(&name);

            match self.download(entry, &path).await {
                Ok(()) => {
                    info!(title = %entry.title, path = %path.display(), "downloaded paper");
                    saved.push(path);
                }
                Err(e) => {
                    warn!(title = %entry.title, error = %format!("{:#}", e), "skipping paper");
                }
            }
        }
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:quantum</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <title>Quantum Error Correction
      at Scale</title>
    <link href="http://arxiv.org/abs/2401.00001v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2401.00001v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00002v2</id>
    <title>Noise &amp; Decoherence</title>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_in_order() {
        let entries = parse_feed(FEED).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Quantum Error Correction at Scale");
        assert_eq!(entries[0].pdf_url, "http://arxiv.org/pdf/2401.00001v1");
        assert_eq!(entries[0].short_id(), "2401.00001v1");
    }

    #[test]
    fn derives_pdf_url_and_unescapes() {
        let entries = parse_feed(FEED).unwrap();
        assert_eq!(entries[1].title, "Noise & Decoherence");
        assert_eq!(entries[1].pdf_url, "http://arxiv.org/pdf/2401.00002v2");
    }

    #[test]
    fn feed_title_is_not_an_entry() {
        let xml = r#"<feed><title>Only a feed</title></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn malformed_feed_is_error() {
        assert!(parse_feed("<feed><entry><id>x</entry></feed>").is_err());
    }

    #[test]
    fn file_names_are_truncated_and_sanitized() {
        let long = "A".repeat(80);
        assert_eq!(file_name_for(&long, "id"), format!("{}.pdf", "A".repeat(50)));
        assert_eq!(
            file_name_for("Attention: is/all you need?", "id"),
            "Attention_ is_all you need_.pdf"
        );
        assert_eq!(file_name_for("   ", "2401.1v1"), "2401.1v1.pdf");
    }
}
