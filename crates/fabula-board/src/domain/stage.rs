//! The generation stage machine.
//!
//! Stages are strictly ordered and none is skippable forward. Backward
//! movement is permitted for revision and never erases generated data. A
//! guard failure never mutates state; it produces a field-keyed validation
//! error for the presentation layer.

use fabula_core::error::StoryError;
use serde::{Deserialize, Serialize};

use super::board::Board;

/// Ordered pipeline stages for one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    /// Authoring the title, content, and background by hand.
    Write,
    /// Story content has been generated and can be completed/edited.
    Complete,
    /// Scenes exist and are being illustrated.
    Draw,
    /// Terminal stage: narration/review, from which publish is available.
    Narrate,
}

/// Facts about a board's scene collection needed by the stage guards.
///
/// Produced by the scene collection manager so the guard logic stays free of
/// a dependency on the collection type itself.
#[derive(Debug, Clone, Default)]
pub struct SceneFacts {
    /// Number of scenes attached to the board.
    pub scene_count: usize,
    /// Indexes of scenes with no generated image, in index order.
    pub scenes_missing_images: Vec<u32>,
}

impl Stage {
    /// Decodes the backend's numeric stage code.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::MalformedResponse`] for an unknown code.
    pub fn from_code(code: i32) -> Result<Self, StoryError> {
        match code {
            1 => Ok(Self::Write),
            2 => Ok(Self::Complete),
            3 => Ok(Self::Draw),
            4 => Ok(Self::Narrate),
            other => Err(StoryError::MalformedResponse(format!(
                "unknown stage code: {other}"
            ))),
        }
    }

    /// Encodes this stage as the backend's numeric code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Write => 1,
            Self::Complete => 2,
            Self::Draw => 3,
            Self::Narrate => 4,
        }
    }

    /// The next stage forward, or `None` at the terminal stage.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Write => Some(Self::Complete),
            Self::Complete => Some(Self::Draw),
            Self::Draw => Some(Self::Narrate),
            Self::Narrate => None,
        }
    }

    /// The previous stage, or `None` at the first stage.
    #[must_use]
    pub fn prev(self) -> Option<Self> {
        match self {
            Self::Write => None,
            Self::Complete => Some(Self::Write),
            Self::Draw => Some(Self::Complete),
            Self::Narrate => Some(Self::Draw),
        }
    }

    /// Checks whether the board may leave this stage in the forward
    /// direction.
    ///
    /// `override_missing_images` models the explicit user confirmation that
    /// allows advancing out of `draw` with scenes that have no generated
    /// image yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Validation`] keyed to the first unsatisfied
    /// field. The board is never mutated.
    pub fn check_exit(
        self,
        board: &Board,
        facts: &SceneFacts,
        override_missing_images: bool,
    ) -> Result<(), StoryError> {
        match self {
            Self::Write => {
                if board.title.trim().is_empty() {
                    return Err(StoryError::validation("title", "title must not be empty"));
                }
                if board.content.trim().is_empty() {
                    return Err(StoryError::validation(
                        "content",
                        "content must not be empty",
                    ));
                }
                if board.background.trim().is_empty() {
                    return Err(StoryError::validation(
                        "background",
                        "background must not be empty",
                    ));
                }
                Ok(())
            }
            Self::Complete => {
                if board.generated_title.trim().is_empty()
                    || board.generated_content.trim().is_empty()
                {
                    return Err(StoryError::validation(
                        "generated_story",
                        "generate the story content before continuing",
                    ));
                }
                Ok(())
            }
            Self::Draw => {
                if facts.scene_count == 0 {
                    return Err(StoryError::validation(
                        "scenes",
                        "add at least one scene before continuing",
                    ));
                }
                if !override_missing_images && !facts.scenes_missing_images.is_empty() {
                    let first = facts.scenes_missing_images[0];
                    return Err(StoryError::validation(
                        "scenes",
                        format!("scene {first} has no generated image"),
                    ));
                }
                Ok(())
            }
            Self::Narrate => Ok(()),
        }
    }
}
