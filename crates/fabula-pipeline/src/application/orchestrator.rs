//! The pipeline orchestrator.
//!
//! Sequences the external generation calls each stage needs and keeps the
//! board and its scene collection consistent with their outcomes. One
//! orchestrator instance exclusively owns one board being edited; two
//! boards' pipelines are fully independent.

use std::sync::Arc;

use fabula_board::domain::board::Board;
use fabula_board::domain::stage::Stage;
use fabula_core::client::{
    BoardStatus, ContinueStoryRequest, CreateBoardRequest, RenderType, StoryApiClient,
};
use fabula_core::clock::Clock;
use fabula_core::error::StoryError;
use fabula_core::ids::{BoardId, StoryId, UserId};
use fabula_scenes::application::collection::{SceneCollection, SceneFailure};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::commands::{NextStep, PublishBoard, StepBack};

/// Anything a pipeline operation can fail with: a plain story error, or a
/// bulk scene failure that names the scene it hit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Validation, remote, not-found, or malformed-response error.
    #[error(transparent)]
    Story(#[from] StoryError),
    /// A bulk scene operation failed on a specific scene.
    #[error(transparent)]
    Scene(#[from] SceneFailure),
}

impl PipelineError {
    /// Returns true when re-invoking the failed operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Story(err) => err.is_retryable(),
            Self::Scene(failure) => failure.source.is_retryable(),
        }
    }
}

/// Drives one board through `write → complete → draw → narrate` and the
/// terminal publish action.
///
/// Every remote call is a suspension point; all other logic is synchronous.
/// A guard failure never mutates state, and a failed remote call leaves the
/// stage unchanged so the same stage-entry action can be re-invoked.
pub struct Orchestrator {
    board: Board,
    scenes: SceneCollection,
    user_id: UserId,
    client: Arc<dyn StoryApiClient>,
    last_error: Option<PipelineError>,
    closed: bool,
}

impl Orchestrator {
    /// Starts editing a brand-new root board for `story_id`.
    #[must_use]
    pub fn for_new_root(
        story_id: StoryId,
        user_id: UserId,
        client: Arc<dyn StoryApiClient>,
        clock: &dyn Clock,
    ) -> Self {
        let board = Board::new_root(story_id, user_id, clock.now());
        Self::for_board(board, user_id, client)
    }

    /// Starts editing a new fork of `parent`.
    #[must_use]
    pub fn for_fork(
        parent: &Board,
        user_id: UserId,
        client: Arc<dyn StoryApiClient>,
        clock: &dyn Clock,
    ) -> Self {
        let board = Board::new_fork(parent, user_id, clock.now());
        Self::for_board(board, user_id, client)
    }

    /// Wraps an existing board (e.g. one re-opened for editing).
    #[must_use]
    pub fn for_board(board: Board, user_id: UserId, client: Arc<dyn StoryApiClient>) -> Self {
        let scenes = SceneCollection::new(board.id);
        Self {
            board,
            scenes,
            user_id,
            client,
            last_error: None,
            closed: false,
        }
    }

    /// The board being edited.
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The board's current pipeline stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.board.stage
    }

    /// The board's scene collection.
    #[must_use]
    pub fn scenes(&self) -> &SceneCollection {
        &self.scenes
    }

    /// Mutable access for scene editing between stage transitions.
    pub fn scenes_mut(&mut self) -> &mut SceneCollection {
        &mut self.scenes
    }

    /// Mutable access to the board's editable fields.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    /// The most recent operation failure, for the presentation layer.
    #[must_use]
    pub fn last_error(&self) -> Option<&PipelineError> {
        self.last_error.as_ref()
    }

    /// True once publish succeeded and the presenting view should close.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Advances the board out of its current stage: evaluates the stage's
    /// exit guard, runs the stage's side effects, and moves forward.
    /// Returns the new stage.
    ///
    /// # Errors
    ///
    /// Returns a validation error (no remote call made) when the guard is
    /// unsatisfied, or the first remote failure otherwise. Either way the
    /// stage is unchanged and the same command can be re-issued.
    #[instrument(skip(self, cmd), fields(board_id = %self.board.id, correlation_id = %cmd.correlation_id))]
    pub async fn handle_next_step(&mut self, cmd: &NextStep) -> Result<Stage, PipelineError> {
        let result = self.next_step_inner(cmd).await;
        self.settle(result)
    }

    async fn next_step_inner(&mut self, cmd: &NextStep) -> Result<Stage, PipelineError> {
        let stage = self.board.stage;
        match stage {
            Stage::Write => {
                let facts = self.scenes.scene_facts();
                stage.check_exit(&self.board, &facts, false)?;
                self.generate_story_inner(&cmd.prompt).await?;
                self.save_board_inner().await?;
            }
            Stage::Complete => {
                let facts = self.scenes.scene_facts();
                stage.check_exit(&self.board, &facts, false)?;
                self.scenes.apply_all_scenes(self.client.as_ref()).await?;
                // Scenes must exist remotely before prompts can be
                // generated for them.
                self.generate_scene_prompts_inner().await?;
            }
            Stage::Draw => {
                if self.scenes.is_empty() {
                    return Err(StoryError::validation(
                        "scenes",
                        "add at least one scene before continuing",
                    )
                    .into());
                }
                let missing = !self.scenes.scene_facts().scenes_missing_images.is_empty();
                let generation = if missing {
                    self.scenes
                        .generate_all_images(
                            self.board.story_id,
                            self.user_id,
                            self.client.as_ref(),
                        )
                        .await
                } else {
                    Ok(())
                };
                let facts = self.scenes.scene_facts();
                if let Err(failure) = generation {
                    // Best-effort: the failure only blocks the transition
                    // when the guard would anyway.
                    if !cmd.override_missing_images && !facts.scenes_missing_images.is_empty() {
                        return Err(failure.into());
                    }
                    warn!(error = %failure, "advancing past draw despite render failure");
                }
                stage.check_exit(&self.board, &facts, cmd.override_missing_images)?;
            }
            Stage::Narrate => {
                return Err(StoryError::validation(
                    "stage",
                    "narrate is the final stage; publish instead",
                )
                .into());
            }
        }

        if let Some(next) = stage.next() {
            self.board.stage = next;
            info!(from = ?stage, to = ?next, "stage advanced");
        }
        Ok(self.board.stage)
    }

    /// Moves one stage backward for revision. No side effects; generated
    /// data is retained. Returns the new stage, or `None` from `write`.
    pub fn step_back(&mut self, cmd: &StepBack) -> Option<Stage> {
        let prev = self.board.stage.prev()?;
        info!(
            board_id = %self.board.id,
            correlation_id = %cmd.correlation_id,
            from = ?self.board.stage,
            to = ?prev,
            "stage stepped back"
        );
        self.board.stage = prev;
        Some(prev)
    }

    /// Generates story content for the board and stores the resulting
    /// chapter title and body.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::MalformedResponse`] when the remote reports
    /// success with an empty chapter title or body; the board's generated
    /// fields and stage are left unchanged.
    #[instrument(skip(self, prompt), fields(board_id = %self.board.id))]
    pub async fn generate_story(&mut self, prompt: &str) -> Result<(), PipelineError> {
        let result = self.generate_story_inner(prompt).await.map_err(Into::into);
        self.settle(result)
    }

    async fn generate_story_inner(&mut self, prompt: &str) -> Result<(), StoryError> {
        let request = ContinueStoryRequest {
            story_id: self.board.story_id,
            user_id: self.user_id,
            prev_board_id: self.board.prev_board_id,
            prompt: prompt.to_owned(),
            title: self.board.title.clone(),
            description: self.board.content.clone(),
            background: self.board.background.clone(),
            roles: self.board.roles.clone(),
        };

        let result = self.client.continue_gen_story(&request).await?;
        let summary = result.chapter_summary;
        if summary.title.trim().is_empty() || summary.content.trim().is_empty() {
            return Err(StoryError::MalformedResponse(
                "story generation failed: empty chapter summary".to_owned(),
            ));
        }

        self.board.generated_title = summary.title;
        self.board.generated_content = summary.content;
        info!(title = %self.board.generated_title, "story generated");
        Ok(())
    }

    /// Persists the board's title, content, background, and role set. The
    /// first successful save of a fork assigns its board id and re-targets
    /// the scene collection.
    ///
    /// # Errors
    ///
    /// Returns the remote error unchanged; local state is untouched.
    #[instrument(skip(self), fields(board_id = %self.board.id))]
    pub async fn save_board(&mut self) -> Result<(), PipelineError> {
        let result = self.save_board_inner().await.map_err(Into::into);
        self.settle(result)
    }

    async fn save_board_inner(&mut self) -> Result<(), StoryError> {
        let request = CreateBoardRequest {
            story_id: self.board.story_id,
            prev_board_id: self.board.prev_board_id,
            next_board_id: BoardId::ZERO,
            title: self.board.title.clone(),
            content: self.board.content.clone(),
            is_ai_gen: !self.board.generated_content.is_empty(),
            background: self.board.background.clone(),
            params: serde_json::json!({}),
            roles: self.board.roles.clone(),
        };

        let record = self.client.create_story_board(&request).await?;
        if !self.board.is_persisted() {
            self.board.id = record.id;
            self.board.ctime = record.ctime;
            self.scenes.set_board_id(record.id);
        }
        info!(board_id = %self.board.id, "board saved");
        Ok(())
    }

    /// Requests image-prompt generation for all of the board's scenes.
    /// All-or-nothing: an error aborts with no scene mutated.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Validation`] for an unsaved board; otherwise
    /// the remote error unchanged.
    #[instrument(skip(self), fields(board_id = %self.board.id))]
    pub async fn generate_scene_prompts(&mut self) -> Result<(), PipelineError> {
        let result = self.generate_scene_prompts_inner().await.map_err(Into::into);
        self.settle(result)
    }

    async fn generate_scene_prompts_inner(&mut self) -> Result<(), StoryError> {
        if !self.board.is_persisted() {
            return Err(StoryError::validation(
                "board",
                "save the board before generating prompts",
            ));
        }
        self.client
            .gen_board_prompts(
                self.board.story_id,
                self.board.id,
                self.user_id,
                RenderType::Prompt,
            )
            .await
    }

    /// Publishes the board. Only available from `narrate`; blocked while
    /// any scene has no generated image unless the user explicitly
    /// overrides. On success the board's status becomes published and the
    /// presenting view is signalled to close.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the stage or image guard blocks
    /// publishing (no remote call made), or the remote error unchanged; the
    /// board then stays in `narrate` with unpublished status, retryable.
    #[instrument(skip(self, cmd), fields(board_id = %self.board.id, correlation_id = %cmd.correlation_id))]
    pub async fn publish(&mut self, cmd: &PublishBoard) -> Result<(), PipelineError> {
        let result = self.publish_inner(cmd).await;
        self.settle(result)
    }

    async fn publish_inner(&mut self, cmd: &PublishBoard) -> Result<(), PipelineError> {
        if self.board.stage != Stage::Narrate {
            return Err(StoryError::validation(
                "stage",
                "publish is only available from narrate",
            )
            .into());
        }
        let facts = self.scenes.scene_facts();
        if !cmd.override_missing_images
            && let Some(&first) = facts.scenes_missing_images.first()
        {
            return Err(
                StoryError::validation("scenes", format!("scene {first} has no generated image"))
                    .into(),
            );
        }

        self.client
            .publish_board(
                self.board.story_id,
                self.board.id,
                self.user_id,
                BoardStatus::Published,
            )
            .await?;

        self.board.status = BoardStatus::Published;
        self.closed = true;
        info!(board_id = %self.board.id, "board published");
        Ok(())
    }

    /// Re-hydrates the board's active state (stage and engagement
    /// counters) from the backend. Local edits are kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::NotFound`] when the board vanished upstream,
    /// or the remote error unchanged.
    #[instrument(skip(self), fields(board_id = %self.board.id))]
    pub async fn reload_active(&mut self) -> Result<(), PipelineError> {
        let result = self.reload_active_inner().await.map_err(Into::into);
        self.settle(result)
    }

    async fn reload_active_inner(&mut self) -> Result<(), StoryError> {
        let active = self.client.board_active(self.board.id).await?;
        self.board.absorb_active(&active)
    }

    /// Records the outcome in `last_error` and hands it back.
    fn settle<T>(&mut self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(err) => self.last_error = Some(err.clone()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fabula_core::client::{BoardActive, BoardRecord, ChapterSummary, GenStoryResult};
    use fabula_scenes::domain::scene::Scene;
    use fabula_test_support::{ApiCall, FailingApiClient, FixedClock, ScriptedApiClient};
    use uuid::Uuid;

    const STORY: StoryId = StoryId(1);
    const USER: UserId = UserId(7);

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap())
    }

    fn next_step() -> NextStep {
        NextStep {
            correlation_id: Uuid::new_v4(),
            prompt: "continue the heist".to_owned(),
            override_missing_images: false,
        }
    }

    /// An orchestrator in `write` with all authored fields filled.
    fn authored_orchestrator(client: Arc<ScriptedApiClient>) -> Orchestrator {
        let mut orchestrator = Orchestrator::for_new_root(STORY, USER, client, &fixed_clock());
        let board = orchestrator.board_mut();
        board.title = "The vault".to_owned();
        board.content = "They go in at midnight.".to_owned();
        board.background = "A rain-slicked capital".to_owned();
        orchestrator
    }

    /// Advances a fresh orchestrator to `complete` with scenes attached.
    async fn orchestrator_at_complete(client: Arc<ScriptedApiClient>) -> Orchestrator {
        let mut orchestrator = authored_orchestrator(client);
        orchestrator.handle_next_step(&next_step()).await.unwrap();
        orchestrator.scenes_mut().add_scene("the approach");
        orchestrator.scenes_mut().add_scene("the alarm");
        orchestrator
    }

    async fn orchestrator_at_draw(client: Arc<ScriptedApiClient>) -> Orchestrator {
        let mut orchestrator = orchestrator_at_complete(client).await;
        orchestrator.handle_next_step(&next_step()).await.unwrap();
        orchestrator
    }

    async fn orchestrator_at_narrate(client: Arc<ScriptedApiClient>) -> Orchestrator {
        let mut orchestrator = orchestrator_at_draw(client).await;
        orchestrator.handle_next_step(&next_step()).await.unwrap();
        orchestrator
    }

    #[tokio::test]
    async fn test_next_step_from_write_blocks_on_empty_background_with_no_remote_calls() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = authored_orchestrator(Arc::clone(&client));
        orchestrator.board_mut().background = String::new();

        // Act
        let result = orchestrator.handle_next_step(&next_step()).await;

        // Assert
        match result.unwrap_err() {
            PipelineError::Story(StoryError::Validation { field, .. }) => {
                assert_eq!(field, "background");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(orchestrator.stage(), Stage::Write);
        assert!(client.calls().is_empty());
        assert!(orchestrator.last_error().is_some());
    }

    #[tokio::test]
    async fn test_next_step_from_write_generates_story_saves_board_and_advances() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = authored_orchestrator(Arc::clone(&client));

        // Act
        let stage = orchestrator.handle_next_step(&next_step()).await.unwrap();

        // Assert
        assert_eq!(stage, Stage::Complete);
        assert!(orchestrator.board().is_persisted());
        assert_eq!(orchestrator.board().generated_title, "Generated title");
        assert_eq!(orchestrator.scenes().board_id(), orchestrator.board().id);
        let calls = client.calls();
        assert!(matches!(calls[0], ApiCall::ContinueGenStory { .. }));
        assert!(matches!(calls[1], ApiCall::CreateStoryBoard { .. }));
        assert!(orchestrator.last_error().is_none());
    }

    #[tokio::test]
    async fn test_generate_story_rejects_empty_chapter_title_as_malformed() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        client.set_gen_story_result(Ok(GenStoryResult {
            chapter_summary: ChapterSummary {
                title: String::new(),
                content: "body".to_owned(),
            },
        }));
        let mut orchestrator = authored_orchestrator(Arc::clone(&client));

        // Act
        let result = orchestrator.generate_story("keep going").await;

        // Assert
        assert!(matches!(
            result.unwrap_err(),
            PipelineError::Story(StoryError::MalformedResponse(_))
        ));
        assert!(orchestrator.board().generated_title.is_empty());
        assert_eq!(orchestrator.stage(), Stage::Write);
    }

    #[tokio::test]
    async fn test_next_step_from_write_keeps_stage_when_story_generation_fails() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        client.set_gen_story_result(Err(StoryError::Remote("model unavailable".into())));
        let mut orchestrator = authored_orchestrator(Arc::clone(&client));

        // Act
        let result = orchestrator.handle_next_step(&next_step()).await;

        // Assert
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(orchestrator.stage(), Stage::Write);
        assert!(orchestrator.board().generated_title.is_empty());
        assert!(!orchestrator.board().is_persisted());
        // The board was never saved after the generation failure.
        assert_eq!(
            client.call_count(|c| matches!(c, ApiCall::CreateStoryBoard { .. })),
            0
        );
    }

    #[tokio::test]
    async fn test_next_step_from_write_keeps_stage_when_save_fails() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        client.fail_create_board(StoryError::Remote("backend down".into()));
        let mut orchestrator = authored_orchestrator(Arc::clone(&client));

        // Act
        let result = orchestrator.handle_next_step(&next_step()).await;

        // Assert
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(orchestrator.stage(), Stage::Write);
        assert!(!orchestrator.board().is_persisted());

        // Re-invoking the same stage-entry action succeeds once the remote
        // recovers.
        client.clear_create_board_failure();
        let stage = orchestrator.handle_next_step(&next_step()).await.unwrap();
        assert_eq!(stage, Stage::Complete);
        assert!(orchestrator.board().is_persisted());
    }

    #[tokio::test]
    async fn test_next_step_from_complete_keeps_stage_when_prompt_generation_fails() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        client.fail_gen_board_prompts(StoryError::Remote("queue full".into()));
        let mut orchestrator = orchestrator_at_complete(Arc::clone(&client)).await;

        // Act
        let result = orchestrator.handle_next_step(&next_step()).await;

        // Assert
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(orchestrator.stage(), Stage::Complete);
        // Scenes applied before the prompt failure keep their ids for the
        // retry.
        let ids: Vec<_> = orchestrator
            .scenes()
            .scenes()
            .iter()
            .map(|s| s.scene_id)
            .collect();
        assert!(ids.iter().all(|id| !id.is_zero()));

        // The retry re-enters the same stage without re-creating scenes.
        client.clear_gen_board_prompts_failure();
        let stage = orchestrator.handle_next_step(&next_step()).await.unwrap();
        assert_eq!(stage, Stage::Draw);
        let retried: Vec<_> = orchestrator
            .scenes()
            .scenes()
            .iter()
            .map(|s| s.scene_id)
            .collect();
        assert_eq!(ids, retried);
        assert_eq!(
            client.call_count(|c| matches!(c, ApiCall::CreateScene { .. })),
            2
        );
    }

    #[tokio::test]
    async fn test_dead_backend_leaves_board_untouched() {
        // Arrange
        let client: Arc<dyn StoryApiClient> = Arc::new(FailingApiClient);
        let mut orchestrator = Orchestrator::for_new_root(STORY, USER, client, &fixed_clock());
        let board = orchestrator.board_mut();
        board.title = "t".to_owned();
        board.content = "c".to_owned();
        board.background = "b".to_owned();

        // Act
        let result = orchestrator.handle_next_step(&next_step()).await;

        // Assert
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(orchestrator.stage(), Stage::Write);
        assert!(!orchestrator.board().is_persisted());
        assert!(orchestrator.board().generated_title.is_empty());
    }

    #[tokio::test]
    async fn test_next_step_from_complete_applies_scenes_then_generates_prompts() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = orchestrator_at_complete(Arc::clone(&client)).await;

        // Act
        let stage = orchestrator.handle_next_step(&next_step()).await.unwrap();

        // Assert
        assert_eq!(stage, Stage::Draw);
        assert!(orchestrator.scenes().scenes().iter().all(|s| s.is_persisted()));
        let calls = client.calls();
        let prompt_position = calls
            .iter()
            .position(|c| matches!(c, ApiCall::GenBoardPrompts { .. }))
            .unwrap();
        let last_create = calls
            .iter()
            .rposition(|c| matches!(c, ApiCall::CreateScene { .. }))
            .unwrap();
        assert!(last_create < prompt_position);
    }

    #[tokio::test]
    async fn test_next_step_from_complete_stops_on_scene_failure_before_prompts() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        client.fail_create_scene_at(1, StoryError::Remote("timeout".into()));
        let mut orchestrator = orchestrator_at_complete(Arc::clone(&client)).await;

        // Act
        let result = orchestrator.handle_next_step(&next_step()).await;

        // Assert
        match result.unwrap_err() {
            PipelineError::Scene(failure) => assert_eq!(failure.index, 1),
            other => panic!("expected Scene failure, got {other:?}"),
        }
        assert_eq!(orchestrator.stage(), Stage::Complete);
        assert_eq!(
            client.call_count(|c| matches!(c, ApiCall::GenBoardPrompts { .. })),
            0
        );
        // Partial progress is kept: scene 0 stays persisted for the retry.
        assert!(orchestrator.scenes().scene(0).unwrap().is_persisted());
    }

    #[tokio::test]
    async fn test_next_step_from_draw_renders_missing_images_and_advances() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = orchestrator_at_draw(Arc::clone(&client)).await;

        // Act
        let stage = orchestrator.handle_next_step(&next_step()).await.unwrap();

        // Assert
        assert_eq!(stage, Stage::Narrate);
        assert!(orchestrator.scenes().scenes().iter().all(Scene::has_images));
    }

    #[tokio::test]
    async fn test_next_step_from_draw_blocks_on_render_failure_without_override() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = orchestrator_at_draw(Arc::clone(&client)).await;
        let failing_id = orchestrator.scenes().scene(0).unwrap().scene_id;
        client.fail_scene_image(failing_id, StoryError::Remote("render overload".into()));

        // Act
        let result = orchestrator.handle_next_step(&next_step()).await;

        // Assert
        let err = result.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(orchestrator.stage(), Stage::Draw);
        // The sibling scene still got its image.
        assert!(orchestrator.scenes().scene(1).unwrap().has_images());
    }

    #[tokio::test]
    async fn test_next_step_from_draw_with_override_advances_despite_failure() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = orchestrator_at_draw(Arc::clone(&client)).await;
        let failing_id = orchestrator.scenes().scene(0).unwrap().scene_id;
        client.fail_scene_image(failing_id, StoryError::Remote("render overload".into()));
        let command = NextStep {
            override_missing_images: true,
            ..next_step()
        };

        // Act
        let stage = orchestrator.handle_next_step(&command).await.unwrap();

        // Assert
        assert_eq!(stage, Stage::Narrate);
        assert!(!orchestrator.scenes().scene(0).unwrap().has_images());
    }

    #[tokio::test]
    async fn test_next_step_at_narrate_is_rejected() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = orchestrator_at_narrate(Arc::clone(&client)).await;

        // Act
        let result = orchestrator.handle_next_step(&next_step()).await;

        // Assert
        assert!(matches!(
            result.unwrap_err(),
            PipelineError::Story(StoryError::Validation { field: "stage", .. })
        ));
        assert_eq!(orchestrator.stage(), Stage::Narrate);
    }

    #[tokio::test]
    async fn test_publish_is_blocked_outside_narrate() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = authored_orchestrator(Arc::clone(&client));
        let command = PublishBoard {
            correlation_id: Uuid::new_v4(),
            override_missing_images: false,
        };

        // Act
        let result = orchestrator.publish(&command).await;

        // Assert
        assert!(matches!(
            result.unwrap_err(),
            PipelineError::Story(StoryError::Validation { field: "stage", .. })
        ));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_publish_blocked_by_missing_images_unless_overridden() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = orchestrator_at_draw(Arc::clone(&client)).await;
        // Reach narrate with imageless scenes via explicit override.
        let advance = NextStep {
            override_missing_images: true,
            ..next_step()
        };
        for scene in orchestrator.scenes().scenes() {
            client.fail_scene_image(scene.scene_id, StoryError::Remote("overload".into()));
        }
        orchestrator.handle_next_step(&advance).await.unwrap();

        // Act
        let blocked = orchestrator
            .publish(&PublishBoard {
                correlation_id: Uuid::new_v4(),
                override_missing_images: false,
            })
            .await;
        let published = orchestrator
            .publish(&PublishBoard {
                correlation_id: Uuid::new_v4(),
                override_missing_images: true,
            })
            .await;

        // Assert
        assert!(matches!(
            blocked.unwrap_err(),
            PipelineError::Story(StoryError::Validation { field: "scenes", .. })
        ));
        published.unwrap();
        assert_eq!(orchestrator.board().status, BoardStatus::Published);
        assert!(orchestrator.is_closed());
        assert_eq!(
            client.call_count(|c| matches!(
                c,
                ApiCall::PublishBoard {
                    status: BoardStatus::Published,
                    ..
                }
            )),
            1
        );
    }

    #[tokio::test]
    async fn test_publish_remote_failure_keeps_board_unpublished_and_retryable() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = orchestrator_at_narrate(Arc::clone(&client)).await;
        client.fail_publish(StoryError::Remote("backend down".into()));
        let command = PublishBoard {
            correlation_id: Uuid::new_v4(),
            override_missing_images: false,
        };

        // Act
        let result = orchestrator.publish(&command).await;

        // Assert
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(orchestrator.stage(), Stage::Narrate);
        assert_eq!(orchestrator.board().status, BoardStatus::Draft);
        assert!(!orchestrator.is_closed());
    }

    #[tokio::test]
    async fn test_fork_links_to_parent_and_first_save_assigns_id() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let parent = {
            let mut orchestrator = orchestrator_at_complete(Arc::clone(&client)).await;
            orchestrator.board_mut().clone()
        };

        let mut fork =
            Orchestrator::for_fork(&parent, UserId(8), client.clone(), &fixed_clock());
        let board = fork.board_mut();
        board.title = "What if the alarm never rang".to_owned();
        board.content = "They walk out unseen.".to_owned();

        // Act
        let stage = fork.handle_next_step(&next_step()).await.unwrap();

        // Assert
        assert_eq!(stage, Stage::Complete);
        assert_eq!(fork.board().prev_board_id, parent.id);
        assert!(fork.board().is_persisted());
        assert_ne!(fork.board().id, parent.id);
        assert!(client.calls().contains(&ApiCall::CreateStoryBoard {
            prev_board_id: parent.id
        }));
    }

    #[tokio::test]
    async fn test_step_back_retains_generated_data() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = orchestrator_at_draw(Arc::clone(&client)).await;
        let command = StepBack {
            correlation_id: Uuid::new_v4(),
        };

        // Act
        let stage = orchestrator.step_back(&command);

        // Assert
        assert_eq!(stage, Some(Stage::Complete));
        assert!(!orchestrator.board().generated_title.is_empty());
        assert!(orchestrator.scenes().scenes().iter().all(|s| s.is_persisted()));
    }

    #[tokio::test]
    async fn test_step_back_from_write_is_a_noop() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = authored_orchestrator(Arc::clone(&client));

        // Act / Assert
        assert_eq!(
            orchestrator.step_back(&StepBack {
                correlation_id: Uuid::new_v4()
            }),
            None
        );
        assert_eq!(orchestrator.stage(), Stage::Write);
    }

    #[tokio::test]
    async fn test_reload_active_absorbs_stage_and_counters() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = orchestrator_at_complete(Arc::clone(&client)).await;
        let board_id = orchestrator.board().id;
        client.set_board_active(Ok(BoardActive {
            board: BoardRecord {
                id: board_id,
                story_id: STORY,
                prev_board_id: BoardId::ZERO,
                title: "remote".to_owned(),
                content: String::new(),
                background: String::new(),
                stage: Stage::Draw.code(),
                creator_id: USER,
                ctime: fixed_clock().0,
            },
            like_count: 3,
            comment_count: 1,
            fork_count: 0,
        }));

        // Act
        orchestrator.reload_active().await.unwrap();

        // Assert
        assert_eq!(orchestrator.stage(), Stage::Draw);
        assert_eq!(orchestrator.board().like_count, 3);
        assert_eq!(orchestrator.board().comment_count, 1);
    }

    #[tokio::test]
    async fn test_reload_active_surfaces_not_found_for_vanished_board() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = orchestrator_at_complete(Arc::clone(&client)).await;

        // Act: the scripted client has no active state configured.
        let result = orchestrator.reload_active().await;

        // Assert
        assert!(matches!(
            result.unwrap_err(),
            PipelineError::Story(StoryError::NotFound { entity: "board", .. })
        ));
    }

    #[tokio::test]
    async fn test_success_clears_last_error() {
        // Arrange
        let client = Arc::new(ScriptedApiClient::new());
        let mut orchestrator = authored_orchestrator(Arc::clone(&client));
        orchestrator.board_mut().title = String::new();
        orchestrator.handle_next_step(&next_step()).await.unwrap_err();
        assert!(orchestrator.last_error().is_some());

        // Act
        orchestrator.board_mut().title = "The vault".to_owned();
        orchestrator.handle_next_step(&next_step()).await.unwrap();

        // Assert
        assert!(orchestrator.last_error().is_none());
    }
}
