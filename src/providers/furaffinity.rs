//! FurAffinity strategy
//!
//! The site has no API, so both the favorites listing and submission pages are
//! scraped. Credentials are the `a`/`b` session cookies, sent on every request
//! including asset downloads.

use crate::config::{FurAffinityConfig, HttpConfig};
use crate::crawler::{ListingPage, ListingSource};
use crate::extractor::{Extraction, ItemExtractor};
use crate::model::{normalize_tags, parse_remote_datetime, ItemId, MediaRecord, Provider, Submission};
use crate::providers::endpoint;
use crate::transport::{RequestSpec, RetryTransport, TransportResult};
use crate::SyncError;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

/// Listing and extraction for FurAffinity favorites
#[derive(Debug, Clone)]
pub struct FurAffinity {
    base_url: Url,
    username: String,
    cookie: String,
    timeout: Duration,
    listing: RetryTransport,
    detail: RetryTransport,
}

impl FurAffinity {
    pub fn new(
        config: &FurAffinityConfig,
        http: &HttpConfig,
        client: Client,
    ) -> Result<Self, SyncError> {
        let base_url = Url::parse(&config.base_url)?;
        let listing = RetryTransport::new(client, config.listing_retry.policy());
        let detail = listing.with_policy(config.detail_retry.policy());

        Ok(Self {
            base_url,
            username: config.username.clone(),
            cookie: format!("a={}; b={}", config.cookie_a, config.cookie_b),
            timeout: http.timeout(),
            listing,
            detail,
        })
    }

    fn page_request(&self, url: &Url) -> RequestSpec {
        RequestSpec::get(url.as_str())
            .header("Cookie", self.cookie.as_str())
            .timeout(self.timeout)
    }
}

#[async_trait]
impl ListingSource for FurAffinity {
    /// Site-relative URL of a favorites page
    type Cursor = String;

    fn first_cursor(&self) -> String {
        format!("/favorites/{}/", self.username)
    }

    async fn fetch_page(&self, cursor: &String) -> TransportResult<ListingPage<String>> {
        let url = endpoint(&self.base_url, cursor)?;
        let body = self.listing.send_text(&self.page_request(&url)).await?;
        Ok(parse_favorites_page(&body))
    }
}

#[async_trait]
impl ItemExtractor for FurAffinity {
    fn provider(&self) -> Provider {
        Provider::FurAffinity
    }

    async fn extract(&self, id: &ItemId) -> Result<Extraction, SyncError> {
        let submission_id = id.as_number().ok_or_else(|| SyncError::Extraction {
            id: id.to_string(),
            message: "submission id is not numeric".to_string(),
        })?;

        let url = endpoint(&self.base_url, &format!("/view/{}/", submission_id))?;
        let body = self.detail.send_text(&self.page_request(&url)).await?;

        match parse_submission_page(&body, submission_id, &self.base_url) {
            Some(record) => Ok(Extraction::Found(Submission {
                submission_id,
                files: vec![record],
                pools: Vec::new(),
            })),
            None => Ok(Extraction::NotFound),
        }
    }

    fn asset_request(&self, url: &str) -> RequestSpec {
        RequestSpec::get(url).header("Cookie", self.cookie.as_str())
    }
}

fn view_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/view/(\d+)/").expect("view link pattern is valid"))
}

fn next_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/favorites/[^/]+/\d+/next").expect("next link pattern is valid")
    })
}

fn line_break_whitespace() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\s*").expect("whitespace pattern is valid"))
}

/// Extracts submission ids and the next-page link from a favorites page
///
/// Only a next link of the form `/favorites/<name>/<n>/next` is followed;
/// anything else ends the listing.
pub fn parse_favorites_page(html: &str) -> ListingPage<String> {
    let document = Html::parse_document(html);
    let mut ids = Vec::new();

    if let (Ok(figure_selector), Ok(link_selector)) = (
        Selector::parse("section#gallery-favorites figure"),
        Selector::parse("a[href]"),
    ) {
        for figure in document.select(&figure_selector) {
            let id = figure
                .select(&link_selector)
                .filter_map(|a| a.value().attr("href"))
                .find_map(|href| view_link_pattern().captures(href))
                .map(|captures| captures[1].to_string());

            if let Some(id) = id {
                ids.push(ItemId::new(id));
            }
        }
    }

    let next = first_attr(&document, ".pagination a.button.right", "href")
        .filter(|href| next_link_pattern().is_match(href));

    ListingPage { ids, next }
}

/// Parses a submission page into a record
///
/// Returns `None` when the author, full-size image or title is missing, which
/// is how the site renders deleted or hidden submissions.
pub fn parse_submission_page(html: &str, submission_id: i64, base_url: &Url) -> Option<MediaRecord> {
    let document = Html::parse_document(html);

    let author = first_text(&document, ".submission-id-sub-container a strong")?;
    let image = first_attr(&document, "#submissionImg", "data-fullview-src")
        .or_else(|| first_attr(&document, ".submission-area object", "data"))?;
    let title = first_text(&document, ".submission-title h2")?;

    let image_url = base_url.join(&image).ok()?;
    let file_name = image_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())?
        .to_string();

    let Some(file_id) = file_name
        .split('.')
        .next()
        .and_then(|prefix| prefix.parse::<i64>().ok())
    else {
        tracing::warn!(
            "Submission {} has a file name without a numeric id: {}",
            submission_id,
            file_name
        );
        return None;
    };

    let description = select_first(&document, ".submission-description")
        .map(|element| description_text(&element.text().collect::<String>()))
        .unwrap_or_default();

    let raw_tags: Vec<String> = Selector::parse(".tags-row .tags a")
        .map(|selector| {
            document
                .select(&selector)
                .map(|a| a.text().collect::<String>())
                .collect()
        })
        .unwrap_or_default();

    let create_datetime = first_attr(
        &document,
        "div.submission-id-sub-container strong span.popup_date",
        "title",
    );

    let mut record = MediaRecord::new(Provider::FurAffinity, submission_id, file_id, &file_name);
    record.title = title;
    record.description = description;
    record.tags = normalize_tags(raw_tags.iter().map(String::as_str), &author);
    record.username = author;
    record.create_timestamp = create_datetime.as_deref().and_then(parse_remote_datetime);
    record.create_datetime = create_datetime;
    record.source_url = Some(image_url.to_string());

    Some(record)
}

/// Number of lines the description block opens with before the author's text
const DESCRIPTION_HEADER_LINES: usize = 3;

/// Cleans the text of a `.submission-description` block
///
/// Indentation after line breaks is dropped and the leading header lines (a
/// blank line, the author block and the posting line) are skipped.
fn description_text(raw: &str) -> String {
    line_break_whitespace()
        .replace_all(raw, "\n")
        .split('\n')
        .skip(DESCRIPTION_HEADER_LINES)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    select_first(document, selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    select_first(document, selector)
        .and_then(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
