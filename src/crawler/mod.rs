//! Paginated listing crawler
//!
//! This module turns a paginated remote listing into a lazy sequence of item
//! ids:
//! - `ListingSource` is implemented once per provider and knows how to fetch
//!   and parse one page for a cursor
//! - `ListingCrawler` walks the pages, buffers ids and decides when to stop

mod listing;

pub use listing::{CrawlEnd, CrawlerSettings, ListingCrawler, ListingPage, ListingSource};
