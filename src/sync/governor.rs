/// What happened to one listing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// At least one file was downloaded for a submission not stored before
    New,

    /// Everything about the submission was already here
    Duplicate,

    /// The submission is gone or hidden
    NotFound,

    /// Extraction, download or persistence failed
    Failed,
}

/// Stops a run after a streak of items that were already mirrored
///
/// Listings are ordered newest first, so a run of known items means the rest
/// of the listing has been mirrored before.
#[derive(Debug, Clone)]
pub struct DuplicateGovernor {
    max_dup_count: u32,
    remaining: u32,
}

impl DuplicateGovernor {
    pub fn new(max_dup_count: u32) -> Self {
        Self {
            max_dup_count,
            remaining: max_dup_count,
        }
    }

    /// Updates the budget with the outcome of one item
    ///
    /// `New` refills the budget, `Duplicate` and `NotFound` use one unit and
    /// `Failed` leaves it alone.
    pub fn observe(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::New => self.remaining = self.max_dup_count,
            ItemOutcome::Duplicate | ItemOutcome::NotFound => {
                self.remaining = self.remaining.saturating_sub(1)
            }
            ItemOutcome::Failed => {}
        }
    }

    /// True once the budget is used up; checked before each item
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ItemOutcome::*;

    /// Feeds outcomes the way the runner does and returns how many were used
    fn items_processed(max_dup_count: u32, outcomes: &[ItemOutcome]) -> usize {
        let mut governor = DuplicateGovernor::new(max_dup_count);
        let mut processed = 0;
        for outcome in outcomes {
            if governor.is_exhausted() {
                break;
            }
            governor.observe(*outcome);
            processed += 1;
        }
        processed
    }

    #[test]
    fn test_stops_after_budget_of_duplicates() {
        assert_eq!(items_processed(2, &[New, New, Duplicate, Duplicate, Duplicate]), 4);
    }

    #[test]
    fn test_new_item_refills_budget() {
        let mut governor = DuplicateGovernor::new(2);
        governor.observe(Duplicate);
        assert_eq!(governor.remaining(), 1);
        governor.observe(New);
        assert_eq!(governor.remaining(), 2);
    }

    #[test]
    fn test_not_found_counts_and_failed_does_not() {
        assert_eq!(items_processed(2, &[NotFound, Failed, Failed, NotFound, New]), 4);

        let mut governor = DuplicateGovernor::new(1);
        governor.observe(Failed);
        assert!(!governor.is_exhausted());
        governor.observe(NotFound);
        assert!(governor.is_exhausted());
        governor.observe(Duplicate);
        assert_eq!(governor.remaining(), 0);
    }
}
