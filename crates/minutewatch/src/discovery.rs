//! Link discovery: finds candidate meeting documents on a source page.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::fetch::Fetcher;
use crate::sanitize::{document_filename, redact_url};
use crate::store::DateRange;

/// Document categories recognized from link text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Minutes,
    Agenda,
}

impl DocumentCategory {
    /// Classifies anchor text. "minutes" wins when both words appear.
    pub fn from_link_text(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("minutes") {
            Some(DocumentCategory::Minutes)
        } else if lower.contains("agenda") {
            Some(DocumentCategory::Agenda)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLink {
    pub url: String,
    pub filename: String,
    pub category: DocumentCategory,
    pub date: Option<NaiveDate>,
}

impl DocumentLink {
    /// `YYYY-MM` of the parsed date, if any.
    pub fn year_month(&self) -> Option<String> {
        self.date.map(|d| d.format("%Y-%m").to_string())
    }
}

/// What a discovery pass should keep.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryFilter {
    pub date_range: DateRange,
    pub include_minutes: bool,
    pub include_agendas: bool,
}

impl DiscoveryFilter {
    fn wants(&self, category: DocumentCategory) -> bool {
        match category {
            DocumentCategory::Minutes => self.include_minutes,
            DocumentCategory::Agenda => self.include_agendas,
        }
    }

    fn accepts_date(&self, date: Option<NaiveDate>) -> bool {
        if !self.date_range.is_bounded() {
            return true;
        }
        match date {
            Some(date) => self
                .date_range
                .contains(&date.format("%Y-%m").to_string()),
            // Undated documents are dropped once any bound is set.
            None => false,
        }
    }
}

static RE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[-_.](\d{1,2})[-_.](\d{1,2})").unwrap());

/// Finds the first valid `YYYY-MM-DD`-shaped date in a filename.
pub fn parse_filename_date(filename: &str) -> Option<NaiveDate> {
    RE_DATE.captures_iter(filename).find_map(|caps| {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// Extracts matching document links from an HTML page.
///
/// Pure function over the page body; [`LinkDiscovery::discover`] adds the
/// fetch.
pub fn extract_links(base: &Url, html: &str, filter: &DiscoveryFilter) -> Vec<DocumentLink> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&selector) {
        let text = anchor.text().collect::<String>();
        let Some(category) = DocumentCategory::from_link_text(text.trim()) else {
            continue;
        };
        if !filter.wants(category) {
            continue;
        }

        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let resolved = match base.join(href.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(_) => continue,
            Err(e) => {
                debug!(href = %href, error = %e, "Skipping unresolvable link");
                continue;
            }
        };

        let filename = document_filename(&resolved);
        let date = parse_filename_date(&filename);
        if !filter.accepts_date(date) {
            debug!(filename = %filename, "Link outside date range");
            continue;
        }

        if !seen.insert(resolved.to_string()) {
            continue;
        }
        links.push(DocumentLink {
            url: resolved.to_string(),
            filename,
            category,
            date,
        });
    }

    links
}

/// Fetches source pages and extracts their document links.
pub struct LinkDiscovery {
    fetcher: Arc<dyn Fetcher>,
}

impl LinkDiscovery {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Returns the matching links of `source_url`. Fetch or parse failures
    /// are logged and yield an empty list.
    pub async fn discover(&self, source_url: &str, filter: &DiscoveryFilter) -> Vec<DocumentLink> {
        let base = match Url::parse(source_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(source = %redact_url(source_url), error = %e, "Invalid source URL");
                return Vec::new();
            }
        };

        let html = match self.fetcher.get_text(source_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(source = %redact_url(source_url), error = %e, "Failed to fetch source page");
                return Vec::new();
            }
        };

        let links = extract_links(&base, &html, filter);
        debug!(
            source = %redact_url(source_url),
            count = links.len(),
            "Discovered document links"
        );
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;

    const PAGE: &str = r#"
        <html><body>
          <a href="/docs/minutes_2024-03-05.pdf">Council Minutes</a>
          <a href="/docs/agenda_2024-03-05.pdf">Agenda</a>
          <a href="https://other.gov/files/MINUTES%202023.12.01.pdf">MINUTES (archived)</a>
          <a href="/docs/minutes_2024-03-05.pdf">Minutes (duplicate)</a>
          <a href="/docs/budget.pdf">Budget report</a>
          <a href="mailto:clerk@city.gov">Minutes by mail</a>
          <a href="/docs/minutes-notes.pdf">Special meeting minutes</a>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://city.gov/council/").unwrap()
    }

    fn minutes_only() -> DiscoveryFilter {
        DiscoveryFilter {
            include_minutes: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_category_from_link_text() {
        assert_eq!(
            DocumentCategory::from_link_text("Meeting MINUTES"),
            Some(DocumentCategory::Minutes)
        );
        assert_eq!(
            DocumentCategory::from_link_text("agenda packet"),
            Some(DocumentCategory::Agenda)
        );
        assert_eq!(DocumentCategory::from_link_text("Budget"), None);
    }

    #[test]
    fn test_parse_filename_date_separators() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(parse_filename_date("minutes_2024-03-05.pdf"), expected);
        assert_eq!(parse_filename_date("minutes_2024_03_05.pdf"), expected);
        assert_eq!(parse_filename_date("minutes.2024.3.5.pdf"), expected);
        assert_eq!(parse_filename_date("minutes_2024-13-45.pdf"), None);
        assert_eq!(parse_filename_date("minutes.pdf"), None);
    }

    #[test]
    fn test_extract_links_filters_category_and_dedupes() {
        let links = extract_links(&base(), PAGE, &minutes_only());
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://city.gov/docs/minutes_2024-03-05.pdf",
                "https://other.gov/files/MINUTES%202023.12.01.pdf",
                "https://city.gov/docs/minutes-notes.pdf",
            ]
        );
        assert_eq!(links[1].filename, "MINUTES_2023.12.01.pdf");
        assert_eq!(links[1].date, NaiveDate::from_ymd_opt(2023, 12, 1));
        assert!(links.iter().all(|l| l.category == DocumentCategory::Minutes));
    }

    #[test]
    fn test_extract_links_includes_agendas_when_enabled() {
        let filter = DiscoveryFilter {
            include_minutes: false,
            include_agendas: true,
            ..Default::default()
        };
        let links = extract_links(&base(), PAGE, &filter);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].filename, "agenda_2024-03-05.pdf");
        assert_eq!(links[0].year_month().as_deref(), Some("2024-03"));
    }

    #[test]
    fn test_date_range_drops_out_of_range_and_undated() {
        let filter = DiscoveryFilter {
            date_range: DateRange::new(Some("2024-01".into()), None),
            include_minutes: true,
            include_agendas: false,
        };
        let links = extract_links(&base(), PAGE, &filter);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].filename, "minutes_2024-03-05.pdf");
    }

    #[tokio::test]
    async fn test_discover_fetch_failure_yields_empty() {
        let discovery = LinkDiscovery::new(Arc::new(MemoryFetcher::new()));
        let links = discovery
            .discover("https://city.gov/council/", &minutes_only())
            .await;
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_discover_fetches_and_extracts() {
        let fetcher = MemoryFetcher::new().with("https://city.gov/council/", PAGE);
        let discovery = LinkDiscovery::new(Arc::new(fetcher));
        let links = discovery
            .discover("https://city.gov/council/", &minutes_only())
            .await;
        assert_eq!(links.len(), 3);
    }
}
