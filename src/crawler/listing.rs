use crate::model::ItemId;
use crate::transport::TransportResult;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// One fetched page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage<C> {
    /// Item ids in document order
    pub ids: Vec<ItemId>,

    /// Cursor of the following page, if the page links to one
    pub next: Option<C>,
}

/// A paginated remote listing
///
/// Implementations fetch and parse a single page; pagination state lives in
/// `ListingCrawler`.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Position in the listing, as exposed by the remote site
    type Cursor: Clone + PartialEq + fmt::Debug + Send + Sync;

    /// Cursor of the first page
    fn first_cursor(&self) -> Self::Cursor;

    /// Fetches and parses the page at `cursor`
    async fn fetch_page(&self, cursor: &Self::Cursor) -> TransportResult<ListingPage<Self::Cursor>>;
}

/// Limits applied while walking a listing
#[derive(Debug, Clone, Copy)]
pub struct CrawlerSettings {
    /// Consecutive page fetch failures tolerated before giving up
    pub max_page_failures: u32,

    /// Pause before fetching a failed page again
    pub page_retry_delay: Duration,
}

/// Why a listing stopped producing ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlEnd {
    /// The last page had no usable next link
    Exhausted,

    /// Too many consecutive page fetches failed
    PageFailures,
}

/// Walks a listing page by page and yields item ids one at a time
///
/// The crawler keeps no state between runs; each new crawler starts at the
/// source's first cursor. Ids that were already returned are never taken back,
/// even if a later page cannot be fetched.
pub struct ListingCrawler<S: ListingSource> {
    source: S,
    settings: CrawlerSettings,

    /// Page to fetch once the buffer is drained; `None` when there is no more
    cursor: Option<S::Cursor>,
    buffer: VecDeque<ItemId>,
    consecutive_failures: u32,
    pages_fetched: u32,
    ids_yielded: u64,
    end: Option<CrawlEnd>,
}

impl<S: ListingSource> ListingCrawler<S> {
    pub fn new(source: S, settings: CrawlerSettings) -> Self {
        let cursor = Some(source.first_cursor());
        Self {
            source,
            settings,
            cursor,
            buffer: VecDeque::new(),
            consecutive_failures: 0,
            pages_fetched: 0,
            ids_yielded: 0,
            end: None,
        }
    }

    /// Returns the next item id, fetching the next page when needed
    ///
    /// Returns `None` once the listing is finished; every later call returns
    /// `None` as well.
    pub async fn next_id(&mut self) -> Option<ItemId> {
        loop {
            if let Some(id) = self.buffer.pop_front() {
                self.ids_yielded += 1;
                return Some(id);
            }

            let Some(cursor) = self.cursor.take() else {
                self.end.get_or_insert(CrawlEnd::Exhausted);
                return None;
            };

            match self.source.fetch_page(&cursor).await {
                Ok(page) => {
                    self.consecutive_failures = 0;
                    self.pages_fetched += 1;
                    tracing::debug!(
                        "Listing page {} ({:?}) returned {} ids",
                        self.pages_fetched,
                        cursor,
                        page.ids.len()
                    );

                    self.buffer.extend(page.ids);
                    self.cursor = match page.next {
                        Some(next) if next == cursor => {
                            tracing::debug!("Next page link points at the current page, stopping");
                            None
                        }
                        next => next,
                    };
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    if self.consecutive_failures > self.settings.max_page_failures {
                        tracing::warn!(
                            "Giving up on listing after {} consecutive failures: {}",
                            self.consecutive_failures,
                            e
                        );
                        self.end = Some(CrawlEnd::PageFailures);
                        return None;
                    }

                    tracing::warn!(
                        "Failed to fetch listing page {:?} ({}/{}): {}",
                        cursor,
                        self.consecutive_failures,
                        self.settings.max_page_failures,
                        e
                    );
                    tokio::time::sleep(self.settings.page_retry_delay).await;
                    self.cursor = Some(cursor);
                }
            }
        }
    }

    /// Number of listing pages fetched successfully
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Number of ids handed out so far
    pub fn ids_yielded(&self) -> u64 {
        self.ids_yielded
    }

    /// Why the listing ended, once it has
    pub fn end(&self) -> Option<CrawlEnd> {
        self.end
    }
}
