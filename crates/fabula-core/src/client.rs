//! Remote collaborator abstraction.
//!
//! The generation/persistence backend is reached through one trait so the
//! pipeline can be exercised against a fake. Every method is a suspension
//! point; everything else in the workspace is synchronous.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoryError;
use crate::ids::{BoardId, RoleId, SceneId, StoryId, UserId};

/// Numeric storyboard status codes understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum BoardStatus {
    /// Visible only to its creator.
    Draft = 1,
    /// Published to the story's readers.
    Published = 2,
}

/// Which renderer a generation request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum RenderType {
    /// Text-only prompt generation for scenes.
    Prompt = 1,
    /// Still-image rendering for a scene.
    Image = 2,
}

/// Wire representation of a board as the backend returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardRecord {
    /// Board identifier.
    pub id: BoardId,
    /// The story this board belongs to.
    pub story_id: StoryId,
    /// Parent board in the fork tree; zero for a root board.
    pub prev_board_id: BoardId,
    /// Board title.
    pub title: String,
    /// Narrative content.
    pub content: String,
    /// Background / setting description.
    pub background: String,
    /// Raw pipeline stage code (see `fabula-board` for the decoded enum).
    pub stage: i32,
    /// The user who created the board.
    pub creator_id: UserId,
    /// Creation timestamp.
    pub ctime: DateTime<Utc>,
}

/// Request payload for creating (or first-saving) a board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoardRequest {
    /// The story the board belongs to.
    pub story_id: StoryId,
    /// Parent board id; zero when creating a root.
    pub prev_board_id: BoardId,
    /// Successor hint for mid-chain insertion; zero when appending.
    pub next_board_id: BoardId,
    /// Board title.
    pub title: String,
    /// Narrative content.
    pub content: String,
    /// Whether the content was AI-generated.
    pub is_ai_gen: bool,
    /// Background / setting description.
    pub background: String,
    /// Opaque generation parameters forwarded to the backend.
    pub params: serde_json::Value,
    /// Characters participating in this board.
    pub roles: Vec<RoleId>,
}

/// Request payload for continuing a story with generated content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinueStoryRequest {
    /// The story being continued.
    pub story_id: StoryId,
    /// The requesting user.
    pub user_id: UserId,
    /// The board being continued from.
    pub prev_board_id: BoardId,
    /// Free-form user prompt steering the generation.
    pub prompt: String,
    /// Working title supplied by the user.
    pub title: String,
    /// Working description of the beat.
    pub description: String,
    /// Background / setting description.
    pub background: String,
    /// Characters participating in this beat.
    pub roles: Vec<RoleId>,
}

/// Generated chapter summary carried inside a story-generation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSummary {
    /// Generated chapter title.
    pub title: String,
    /// Generated chapter body.
    pub content: String,
}

/// Result of a story-continuation generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenStoryResult {
    /// Summary of the generated chapter.
    pub chapter_summary: ChapterSummary,
}

/// Rendered output for one scene image request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRender {
    /// URLs of the generated images, in generation order.
    pub image_urls: Vec<String>,
}

/// A board's full active state, fetched on demand when re-opening it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardActive {
    /// The board record, including its current stage code.
    pub board: BoardRecord,
    /// Like count.
    pub like_count: i64,
    /// Comment count.
    pub comment_count: i64,
    /// Number of forks hanging off this board.
    pub fork_count: i64,
}

/// The remote API the pipeline depends on.
///
/// Implementations are expected to map transport failures to
/// [`StoryError::Remote`] and missing entities to [`StoryError::NotFound`];
/// the domain crates never see a raw transport error.
#[async_trait]
pub trait StoryApiClient: Send + Sync {
    /// Creates a storyboard (root or fork) and returns the stored record.
    async fn create_story_board(
        &self,
        request: &CreateBoardRequest,
    ) -> Result<BoardRecord, StoryError>;

    /// Generates continuation content for a story beat.
    async fn continue_gen_story(
        &self,
        request: &ContinueStoryRequest,
    ) -> Result<GenStoryResult, StoryError>;

    /// Generates image prompts for every scene of a board, server-side.
    async fn gen_board_prompts(
        &self,
        story_id: StoryId,
        board_id: BoardId,
        user_id: UserId,
        render_type: RenderType,
    ) -> Result<(), StoryError>;

    /// Persists one scene at `index` and returns its assigned id.
    async fn create_scene(&self, board_id: BoardId, index: u32) -> Result<SceneId, StoryError>;

    /// Renders images for one already-persisted scene.
    async fn gen_scene_image(
        &self,
        story_id: StoryId,
        board_id: BoardId,
        user_id: UserId,
        scene_id: SceneId,
        render_type: RenderType,
    ) -> Result<SceneRender, StoryError>;

    /// Sets the board's remote status.
    async fn publish_board(
        &self,
        story_id: StoryId,
        board_id: BoardId,
        user_id: UserId,
        status: BoardStatus,
    ) -> Result<(), StoryError>;

    /// Fetches one page of a board's fork children.
    async fn fork_list(
        &self,
        user_id: UserId,
        story_id: StoryId,
        board_id: BoardId,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<BoardRecord>, StoryError>;

    /// Re-hydrates a board's full active state.
    async fn board_active(&self, board_id: BoardId) -> Result<BoardActive, StoryError>;
}
