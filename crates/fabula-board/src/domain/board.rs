//! The board value type.

use chrono::{DateTime, Utc};
use fabula_core::client::{BoardActive, BoardRecord, BoardStatus};
use fabula_core::error::StoryError;
use fabula_core::ids::{BoardId, RoleId, StoryId, UserId};
use serde::{Deserialize, Serialize};

use super::stage::Stage;

/// One narrative beat: a node in the story's fork tree.
///
/// A board with a zero `prev_board_id` is a root; any other value points at
/// the parent it was forked from. A board with a zero `id` has not been
/// persisted yet (a fork before its first save).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    /// Board identifier; zero until first persisted.
    pub id: BoardId,
    /// The story this board belongs to.
    pub story_id: StoryId,
    /// Parent board in the fork tree; zero for a root.
    pub prev_board_id: BoardId,
    /// User-authored title.
    pub title: String,
    /// User-authored narrative content.
    pub content: String,
    /// User-authored background / setting description.
    pub background: String,
    /// Current pipeline stage.
    pub stage: Stage,
    /// Remote publication status.
    pub status: BoardStatus,
    /// The user who created the board.
    pub creator_id: UserId,
    /// Creation timestamp.
    pub ctime: DateTime<Utc>,
    /// Characters participating in this beat.
    pub roles: Vec<RoleId>,
    /// AI-generated chapter title; empty until story generation succeeds.
    pub generated_title: String,
    /// AI-generated chapter body; empty until story generation succeeds.
    pub generated_content: String,
    /// Like count from the last re-hydration.
    pub like_count: i64,
    /// Comment count from the last re-hydration.
    pub comment_count: i64,
}

impl Board {
    /// Creates an unsaved root board for `story_id`.
    #[must_use]
    pub fn new_root(story_id: StoryId, creator_id: UserId, ctime: DateTime<Utc>) -> Self {
        Self {
            id: BoardId::ZERO,
            story_id,
            prev_board_id: BoardId::ZERO,
            title: String::new(),
            content: String::new(),
            background: String::new(),
            stage: Stage::Write,
            status: BoardStatus::Draft,
            creator_id,
            ctime,
            roles: Vec::new(),
            generated_title: String::new(),
            generated_content: String::new(),
            like_count: 0,
            comment_count: 0,
        }
    }

    /// Creates an unsaved fork of `parent`. The fork starts back at the
    /// `write` stage with the parent's background carried over as the
    /// starting setting.
    #[must_use]
    pub fn new_fork(parent: &Self, creator_id: UserId, ctime: DateTime<Utc>) -> Self {
        let mut board = Self::new_root(parent.story_id, creator_id, ctime);
        board.prev_board_id = parent.id;
        board.background = parent.background.clone();
        board.roles = parent.roles.clone();
        board
    }

    /// Reconstructs a board from the backend's wire record.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::MalformedResponse`] if the stage code is
    /// unknown.
    pub fn from_record(record: BoardRecord) -> Result<Self, StoryError> {
        let stage = Stage::from_code(record.stage)?;
        Ok(Self {
            id: record.id,
            story_id: record.story_id,
            prev_board_id: record.prev_board_id,
            title: record.title,
            content: record.content,
            background: record.background,
            stage,
            status: BoardStatus::Draft,
            creator_id: record.creator_id,
            ctime: record.ctime,
            roles: Vec::new(),
            generated_title: String::new(),
            generated_content: String::new(),
            like_count: 0,
            comment_count: 0,
        })
    }

    /// True for a board with no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.prev_board_id.is_zero()
    }

    /// True until the board's first successful save.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.id.is_zero()
    }

    /// Absorbs a re-hydrated active state: stage and engagement counters.
    /// Local edits to title/content/background are kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::MalformedResponse`] if the stage code is
    /// unknown.
    pub fn absorb_active(&mut self, active: &BoardActive) -> Result<(), StoryError> {
        self.stage = Stage::from_code(active.board.stage)?;
        self.like_count = active.like_count;
        self.comment_count = active.comment_count;
        Ok(())
    }
}
