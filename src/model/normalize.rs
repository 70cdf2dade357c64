//! Tag and date normalization
//!
//! Both providers hand back free-form keyword strings and dates in their own
//! formats. Everything stored goes through these helpers so that tag queries
//! and timestamp ordering work the same across providers.

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Normalizes a single tag: trimmed, lowercase, whitespace runs become `_`
///
/// Returns `None` for tags that are empty after trimming.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();

    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

/// Builds the synthetic `artist:<username>` tag
pub fn artist_tag(username: &str) -> String {
    format!("artist:{}", username.trim().to_lowercase())
}

/// Normalizes a list of raw tags and appends the artist tag
pub fn normalize_tags<'a, I>(raw: I, username: &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tags: BTreeSet<String> = raw.into_iter().filter_map(normalize_tag).collect();
    if !username.trim().is_empty() {
        tags.insert(artist_tag(username));
    }
    tags
}

fn ordinal_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})(st|nd|rd|th)\b").expect("ordinal suffix pattern is valid")
    })
}

/// Parses a remote date string into epoch milliseconds (UTC)
///
/// Accepted shapes:
/// - `Jan 4, 2017 01:50 AM` and `Jan 4th, 2017 01:50 AM`
/// - `2017-01-04 01:50:23.123456+00` (offset with or without minutes)
/// - `2017-01-04 01:50:23` (taken as UTC)
/// - RFC 3339
///
/// Returns `None` when no format matches.
pub fn parse_remote_datetime(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.timestamp_millis());
        }
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }

    let without_ordinal = ordinal_suffix().replace_all(raw, "$1");
    for format in ["%b %d, %Y %I:%M %p", "%B %d, %Y %I:%M %p"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&without_ordinal, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    None
}
