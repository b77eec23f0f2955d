//! The fork index: per-parent paginated fork lists.

use std::collections::HashMap;

use fabula_board::domain::board::Board;
use fabula_core::client::{BoardRecord, StoryApiClient};
use fabula_core::error::StoryError;
use fabula_core::ids::{BoardId, StoryId, UserId};
use tracing::{info, instrument, warn};

use crate::domain::page::ForkPage;

/// Fork page size requested from the backend.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Outcome of a fetch that may have been skipped by the
/// at-most-one-in-flight rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A fetch ran; carries the number of new boards appended.
    Loaded(usize),
    /// No fetch ran (already loading, no more pages, or page evicted).
    Skipped,
}

/// Per-parent cache of paginated fork lists.
///
/// The index is shared by every viewer of a parent board but mutated only
/// by its own fetch operations. At most one fetch per parent is in flight
/// at a time; a second call while one is outstanding is a no-op rather than
/// queued.
#[derive(Debug)]
pub struct ForkIndex {
    pages: HashMap<BoardId, ForkPage>,
    page_size: usize,
}

impl Default for ForkIndex {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ForkIndex {
    /// Creates an empty index requesting `page_size` boards per fetch.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            pages: HashMap::new(),
            page_size,
        }
    }

    /// The cached page for `parent`, if one exists.
    #[must_use]
    pub fn page(&self, parent: BoardId) -> Option<&ForkPage> {
        self.pages.get(&parent)
    }

    /// The loaded fork children of `parent`; empty when nothing is cached.
    #[must_use]
    pub fn forks(&self, parent: BoardId) -> &[Board] {
        self.pages.get(&parent).map_or(&[], ForkPage::items)
    }

    /// Fetches the first page of forks for `parent`, creating the page on
    /// first use. Results are appended with de-duplication by board id, so
    /// re-fetching after a fork was created locally surfaces the new child
    /// without discarding what is already loaded.
    ///
    /// No-op while a fetch for `parent` is already in flight.
    ///
    /// # Errors
    ///
    /// Returns the remote error unchanged; the cached items are left
    /// untouched and no retry is attempted.
    #[instrument(skip(self, client))]
    pub async fn fetch_forks(
        &mut self,
        parent: BoardId,
        story_id: StoryId,
        user_id: UserId,
        client: &dyn StoryApiClient,
    ) -> Result<FetchOutcome, StoryError> {
        let page_size = self.page_size;
        let page = self.pages.entry(parent).or_insert_with(ForkPage::new);
        if page.is_loading {
            return Ok(FetchOutcome::Skipped);
        }
        page.is_loading = true;

        let result = client
            .fork_list(user_id, story_id, parent, 0, page_size)
            .await;

        self.settle(parent, page_size, result)
    }

    /// Fetches the next page for `parent`, offset by the count of already
    /// loaded items. No-op unless the page exists with `has_more` set and
    /// no fetch in flight.
    ///
    /// # Errors
    ///
    /// Returns the remote error unchanged; the cached items are left
    /// untouched.
    #[instrument(skip(self, client))]
    pub async fn load_more(
        &mut self,
        parent: BoardId,
        story_id: StoryId,
        user_id: UserId,
        client: &dyn StoryApiClient,
    ) -> Result<FetchOutcome, StoryError> {
        let page_size = self.page_size;
        let Some(page) = self.pages.get_mut(&parent) else {
            return Ok(FetchOutcome::Skipped);
        };
        if page.is_loading || !page.has_more {
            return Ok(FetchOutcome::Skipped);
        }
        page.is_loading = true;
        let offset = page.items.len();

        let result = client
            .fork_list(user_id, story_id, parent, offset, page_size)
            .await;

        self.settle(parent, page_size, result)
    }

    /// Clears `parent`'s page and re-fetches from offset zero.
    ///
    /// # Errors
    ///
    /// Returns the remote error unchanged; after a failed refresh the page
    /// is empty and a later `fetch_forks` rebuilds it.
    pub async fn refresh(
        &mut self,
        parent: BoardId,
        story_id: StoryId,
        user_id: UserId,
        client: &dyn StoryApiClient,
    ) -> Result<FetchOutcome, StoryError> {
        if let Some(page) = self.pages.get_mut(&parent) {
            if page.is_loading {
                return Ok(FetchOutcome::Skipped);
            }
            page.items.clear();
            page.has_more = true;
        }
        self.fetch_forks(parent, story_id, user_id, client).await
    }

    /// Evicts `parent`'s page entirely. A later fetch rebuilds from
    /// scratch; a fetch in flight at eviction time settles silently.
    pub fn clear(&mut self, parent: BoardId) {
        self.pages.remove(&parent);
    }

    /// Applies a finished fetch to `parent`'s page: clears the in-flight
    /// flag, absorbs results, and recomputes `has_more`.
    fn settle(
        &mut self,
        parent: BoardId,
        page_size: usize,
        result: Result<Vec<BoardRecord>, StoryError>,
    ) -> Result<FetchOutcome, StoryError> {
        let Some(page) = self.pages.get_mut(&parent) else {
            // Evicted while the fetch was in flight; discard the result.
            return Ok(FetchOutcome::Skipped);
        };
        page.is_loading = false;

        let records = match result {
            Ok(records) => records,
            Err(err) => {
                warn!(parent = %parent, error = %err, "fork fetch failed");
                return Err(err);
            }
        };

        let returned = records.len();
        let appended = page.absorb(records)?;
        // A short page means no more, even if the backend nominally has
        // more; staleness beats a load-more loop that never terminates.
        page.has_more = returned == page_size;
        info!(parent = %parent, appended, returned, "fork page loaded");
        Ok(FetchOutcome::Loaded(appended))
    }
}
