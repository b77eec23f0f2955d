//! One parent board's paginated fork list.

use std::collections::HashSet;

use fabula_board::domain::board::Board;
use fabula_core::client::BoardRecord;
use fabula_core::error::StoryError;
use fabula_core::ids::BoardId;

/// Pagination state for one parent board's fork children.
///
/// `items` preserves fetch order (first-seen position wins on duplicates),
/// which is not necessarily chronological. The page is owned exclusively by
/// the fork index and mutated only by its load and refresh operations.
#[derive(Debug, Default)]
pub struct ForkPage {
    /// De-duplicated fork children, in first-seen order.
    pub(crate) items: Vec<Board>,
    /// Whether another page is expected to exist.
    pub(crate) has_more: bool,
    /// Whether a fetch for this page is currently in flight.
    pub(crate) is_loading: bool,
}

impl ForkPage {
    /// Creates an empty page that expects at least one fetch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            has_more: true,
            is_loading: false,
        }
    }

    /// The loaded fork children, in first-seen order.
    #[must_use]
    pub fn items(&self) -> &[Board] {
        &self.items
    }

    /// Whether another page is expected to exist.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Whether a fetch is currently in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Decodes and appends `records`, dropping ids already present.
    /// Decoding is all-or-nothing: one malformed record rejects the batch
    /// and the page is left untouched.
    ///
    /// Returns the number of boards actually appended.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::MalformedResponse`] if any record carries an
    /// unknown stage code.
    pub(crate) fn absorb(&mut self, records: Vec<BoardRecord>) -> Result<usize, StoryError> {
        let decoded: Vec<Board> = records
            .into_iter()
            .map(Board::from_record)
            .collect::<Result<_, _>>()?;

        let mut seen: HashSet<BoardId> = self.items.iter().map(|b| b.id).collect();
        let mut appended = 0;
        for board in decoded {
            if seen.insert(board.id) {
                self.items.push(board);
                appended += 1;
            }
        }
        Ok(appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fabula_core::ids::{StoryId, UserId};

    fn record(id: i64) -> BoardRecord {
        BoardRecord {
            id: BoardId(id),
            story_id: StoryId(1),
            prev_board_id: BoardId(100),
            title: format!("fork {id}"),
            content: String::new(),
            background: String::new(),
            stage: 1,
            creator_id: UserId(7),
            ctime: Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_absorb_dedups_by_id_preserving_first_seen_order() {
        // Arrange
        let mut page = ForkPage::new();

        // Act
        let first = page.absorb(vec![record(1), record(2), record(3)]).unwrap();
        let second = page.absorb(vec![record(2), record(3), record(4)]).unwrap();

        // Assert
        assert_eq!(first, 3);
        assert_eq!(second, 1);
        let ids: Vec<i64> = page.items().iter().map(|b| b.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_absorb_rejects_batch_with_malformed_record() {
        // Arrange
        let mut page = ForkPage::new();
        let mut bad = record(2);
        bad.stage = 99;

        // Act
        let result = page.absorb(vec![record(1), bad]);

        // Assert
        assert!(matches!(
            result.unwrap_err(),
            StoryError::MalformedResponse(_)
        ));
        assert!(page.items().is_empty());
    }
}
