//! Document scanner: downloads a PDF and finds keyword hits page by page.

pub mod entities;

use std::collections::HashSet;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::fetch::Fetcher;
use crate::sanitize::redact_url;
use crate::store::Keyword;

pub use entities::{
    serialize_entities, Entity, EntityCapability, EntityExtractor, EntityLabel,
    PatternEntityExtractor,
};

/// Characters of context kept from the start of a match.
pub const DEFAULT_SNIPPET_CHARS: usize = 300;

/// One keyword hit on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMatch {
    pub keyword_id: i64,
    pub keyword: String,
    /// 1-indexed.
    pub page_number: u32,
    pub snippet: String,
    pub entities: String,
}

/// Result of scanning one document.
///
/// `content` holds the raw document only when at least one match was found.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub matches: Vec<ScanMatch>,
    pub content: Vec<u8>,
    pub pages_scanned: u32,
}

impl ScanOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }
}

pub struct DocumentScanner {
    fetcher: Arc<dyn Fetcher>,
    entities: Arc<EntityCapability>,
    snippet_chars: usize,
}

impl DocumentScanner {
    pub fn new(fetcher: Arc<dyn Fetcher>, entities: Arc<EntityCapability>) -> Self {
        Self {
            fetcher,
            entities,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }

    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars.max(1);
        self
    }

    /// Scans a document. Never fails: download and parse errors are logged
    /// and produce an empty outcome.
    pub async fn scan(&self, url: &str, keywords: &[Keyword], max_pages: Option<u32>) -> ScanOutcome {
        match self.try_scan(url, keywords, max_pages).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(url = %redact_url(url), error = %e, "Document scan failed");
                ScanOutcome::empty()
            }
        }
    }

    /// Like [`scan`](Self::scan) but surfaces the failure.
    pub async fn try_scan(
        &self,
        url: &str,
        keywords: &[Keyword],
        max_pages: Option<u32>,
    ) -> Result<ScanOutcome, ScanError> {
        let bytes = self.fetcher.get_bytes(url).await?;

        let keywords = keywords.to_vec();
        let entities = Arc::clone(&self.entities);
        let snippet_chars = self.snippet_chars;

        tokio::task::spawn_blocking(move || {
            scan_bytes(bytes, &keywords, max_pages, snippet_chars, &entities)
        })
        .await
        .map_err(|e| ScanError::TaskJoin(e.to_string()))?
    }
}

fn keyword_patterns(keywords: &[Keyword]) -> Vec<(&Keyword, Regex)> {
    keywords
        .iter()
        .filter(|k| !k.text.trim().is_empty())
        .filter_map(|k| {
            RegexBuilder::new(&regex::escape(&k.text))
                .case_insensitive(true)
                .build()
                .ok()
                .map(|re| (k, re))
        })
        .collect()
}

/// Scans an in-memory PDF. Blocking; call from a blocking context.
pub fn scan_bytes(
    bytes: Vec<u8>,
    keywords: &[Keyword],
    max_pages: Option<u32>,
    snippet_chars: usize,
    entities: &EntityCapability,
) -> Result<ScanOutcome, ScanError> {
    let doc = lopdf::Document::load_mem(&bytes).map_err(|e| ScanError::PdfParse(e.to_string()))?;

    let patterns = keyword_patterns(keywords);
    let limit = max_pages.map_or(usize::MAX, |n| n as usize);

    let mut matches = Vec::new();
    let mut pages_scanned = 0u32;

    for page_number in doc.get_pages().into_keys().take(limit) {
        pages_scanned += 1;

        let text = match doc.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                debug!(page = page_number, error = %e, "Skipping page without extractable text");
                continue;
            }
        };

        let mut seen: HashSet<i64> = HashSet::new();
        for (keyword, re) in &patterns {
            if seen.contains(&keyword.id) {
                continue;
            }
            // First occurrence only.
            let Some(found) = re.find(&text) else {
                continue;
            };
            seen.insert(keyword.id);

            let snippet = snippet_at(&text, found.start(), snippet_chars);
            let entities = entities.extract_serialized(&snippet);
            matches.push(ScanMatch {
                keyword_id: keyword.id,
                keyword: keyword.text.clone(),
                page_number,
                snippet,
                entities,
            });
        }
    }

    let content = if matches.is_empty() { Vec::new() } else { bytes };
    Ok(ScanOutcome {
        matches,
        content,
        pages_scanned,
    })
}

/// Up to `chars` characters of `text` starting at byte offset `start`.
fn snippet_at(text: &str, start: usize, chars: usize) -> String {
    text[start..].chars().take(chars).collect::<String>().trim_end().to_string()
}
