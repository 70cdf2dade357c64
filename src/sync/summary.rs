use std::fmt;

/// Why a sync run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The listing had no more pages
    ListingExhausted,

    /// Too many already-known items in a row
    DuplicateBudget,

    /// The listing kept failing to load
    PageFailures,

    /// Interrupted from outside between two items
    Cancelled,
}

impl StopReason {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::ListingExhausted => "listing_exhausted",
            Self::DuplicateBudget => "duplicate_budget",
            Self::PageFailures => "page_failures",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "listing_exhausted" => Some(Self::ListingExhausted),
            "duplicate_budget" => Some(Self::DuplicateBudget),
            "page_failures" => Some(Self::PageFailures),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ListingExhausted => "listing exhausted",
            Self::DuplicateBudget => "duplicate budget used up",
            Self::PageFailures => "listing pages kept failing",
            Self::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub new: u64,
    pub duplicate: u64,
    pub not_found: u64,
    pub failed: u64,
    pub pages_fetched: u32,

    /// Set once the run is over
    pub stop_reason: Option<StopReason>,
}

impl RunSummary {
    /// Number of listing entries that were looked at
    pub fn processed(&self) -> u64 {
        self.new + self.duplicate + self.not_found + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed ({} new, {} duplicate, {} not found, {} failed) over {} pages",
            self.processed(),
            self.new,
            self.duplicate,
            self.not_found,
            self.failed,
            self.pages_fetched
        )?;
        if let Some(reason) = self.stop_reason {
            write!(f, ", stopped: {}", reason)?;
        }
        Ok(())
    }
}
