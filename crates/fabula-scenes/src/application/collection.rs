//! The scene collection: ordered scenes for one board, with per-scene and
//! bulk operations.

use fabula_board::domain::stage::SceneFacts;
use fabula_core::client::{RenderType, StoryApiClient};
use fabula_core::error::StoryError;
use fabula_core::ids::{BoardId, RoleId, SceneId, StoryId, UserId};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::scene::Scene;

/// A failure in a bulk scene operation, naming the scene it hit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scene {index}: {source}")]
pub struct SceneFailure {
    /// Index of the failing scene.
    pub index: u32,
    /// The underlying error.
    #[source]
    pub source: StoryError,
}

/// The ordered scene list for one board.
///
/// Owned exclusively by that board's pipeline orchestrator. Indexes are
/// unique and contiguous whenever the collection is consistent; insert and
/// remove renumber before returning.
#[derive(Debug)]
pub struct SceneCollection {
    board_id: BoardId,
    scenes: Vec<Scene>,
}

impl SceneCollection {
    /// Creates an empty collection for `board_id` (which may still be zero
    /// for an unsaved fork).
    #[must_use]
    pub fn new(board_id: BoardId) -> Self {
        Self {
            board_id,
            scenes: Vec::new(),
        }
    }

    /// The owning board's id.
    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Re-targets the collection after the board's first save assigned an
    /// id. Only meaningful while no scene has been persisted.
    pub fn set_board_id(&mut self, board_id: BoardId) {
        self.board_id = board_id;
    }

    /// The scenes, in index order.
    #[must_use]
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Number of scenes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// True when no scene exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// The scene at `index`, if any.
    #[must_use]
    pub fn scene(&self, index: u32) -> Option<&Scene> {
        self.scenes.get(index as usize)
    }

    /// Appends a new scene with `content` and returns its index.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_scene(&mut self, content: impl Into<String>) -> u32 {
        let index = self.scenes.len() as u32;
        let mut scene = Scene::new(index);
        scene.content = content.into();
        self.scenes.push(scene);
        index
    }

    /// Inserts an empty scene at `at`, shifting later scenes up and
    /// renumbering to keep indexes contiguous.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Validation`] when `at` is past the end.
    pub fn insert_scene(&mut self, at: u32) -> Result<(), StoryError> {
        if at as usize > self.scenes.len() {
            return Err(StoryError::validation(
                "scene",
                format!("no position {at} to insert at"),
            ));
        }
        self.scenes.insert(at as usize, Scene::new(at));
        self.renumber();
        Ok(())
    }

    /// Removes the scene at `index` and renumbers the remainder.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Validation`] when no scene exists at `index`.
    pub fn remove_scene(&mut self, index: u32) -> Result<Scene, StoryError> {
        if index as usize >= self.scenes.len() {
            return Err(missing_scene(index));
        }
        let removed = self.scenes.remove(index as usize);
        self.renumber();
        Ok(removed)
    }

    /// Replaces the text of the scene at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Validation`] when no scene exists at `index`.
    pub fn set_content(&mut self, index: u32, content: impl Into<String>) -> Result<(), StoryError> {
        self.scene_mut(index)?.content = content.into();
        Ok(())
    }

    /// Replaces the image prompt of the scene at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Validation`] when no scene exists at `index`.
    pub fn set_image_prompt(
        &mut self,
        index: u32,
        prompt: impl Into<String>,
    ) -> Result<(), StoryError> {
        self.scene_mut(index)?.image_prompt = prompt.into();
        Ok(())
    }

    /// Replaces the character set of the scene at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Validation`] when no scene exists at `index`.
    pub fn set_characters(
        &mut self,
        index: u32,
        characters: impl IntoIterator<Item = RoleId>,
    ) -> Result<(), StoryError> {
        self.scene_mut(index)?.characters = characters.into_iter().collect();
        Ok(())
    }

    /// Replaces the local reference image for the scene at `index`. Does
    /// not trigger generation.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Validation`] when no scene exists at `index`.
    pub fn update_reference_image(
        &mut self,
        index: u32,
        image: Vec<u8>,
    ) -> Result<(), StoryError> {
        self.scene_mut(index)?.reference_image = Some(image);
        Ok(())
    }

    /// Persists the scene at `index` and records its assigned id.
    ///
    /// Idempotent: an already-persisted scene is a no-op success returning
    /// the existing id. On failure the scene stays unpersisted and is safe
    /// to retry.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Validation`] for an unknown index, an unsaved
    /// board, or empty scene content; otherwise the remote error unchanged.
    #[instrument(skip(self, client))]
    pub async fn apply_scene(
        &mut self,
        index: u32,
        client: &dyn StoryApiClient,
    ) -> Result<SceneId, StoryError> {
        let board_id = self.board_id;
        if board_id.is_zero() {
            return Err(StoryError::validation(
                "board",
                "save the board before applying scenes",
            ));
        }
        let scene = self.scene_mut(index)?;
        if scene.is_persisted() {
            return Ok(scene.scene_id);
        }
        if scene.content.trim().is_empty() {
            return Err(StoryError::validation(
                "scene_content",
                format!("scene {index} has no content"),
            ));
        }

        let scene_id = client.create_scene(board_id, index).await?;

        // Re-resolve after the await; the list cannot have changed under an
        // exclusive borrow but the borrow itself ended at the call.
        let scene = self.scene_mut(index)?;
        scene.scene_id = scene_id;
        info!(%board_id, index, %scene_id, "scene persisted");
        Ok(scene_id)
    }

    /// Persists every unpersisted scene in index order, sequentially, as
    /// the backend assumes ordered scene creation. Stops at the first
    /// failure; scenes already applied keep their ids.
    ///
    /// # Errors
    ///
    /// Returns a [`SceneFailure`] naming the first scene that failed.
    #[instrument(skip(self, client))]
    pub async fn apply_all_scenes(
        &mut self,
        client: &dyn StoryApiClient,
    ) -> Result<(), SceneFailure> {
        let indexes: Vec<u32> = self.scenes.iter().map(|s| s.index).collect();
        for index in indexes {
            if let Err(source) = self.apply_scene(index, client).await {
                warn!(index, error = %source, "apply_all_scenes stopped");
                return Err(SceneFailure { index, source });
            }
        }
        Ok(())
    }

    /// Renders images for the scene at `index` and stores the returned
    /// URLs. Other scenes are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::Validation`] for an unknown index or an
    /// unpersisted scene; otherwise the remote error unchanged.
    #[instrument(skip(self, client))]
    pub async fn generate_image(
        &mut self,
        index: u32,
        story_id: StoryId,
        user_id: UserId,
        client: &dyn StoryApiClient,
    ) -> Result<(), StoryError> {
        let board_id = self.board_id;
        let scene = self.scene_mut(index)?;
        if !scene.is_persisted() {
            return Err(StoryError::validation(
                "scene",
                format!("scene {index} must be applied before image generation"),
            ));
        }
        let scene_id = scene.scene_id;

        let render = client
            .gen_scene_image(story_id, board_id, user_id, scene_id, RenderType::Image)
            .await?;

        let scene = self.scene_mut(index)?;
        scene.generated_image_urls = render.image_urls;
        Ok(())
    }

    /// Renders images for every scene in index order. A failure on one
    /// scene does not abort the rest: all scenes are attempted, and the
    /// reported error names the first scene that failed.
    ///
    /// # Errors
    ///
    /// Returns a [`SceneFailure`] for the first failing scene.
    #[instrument(skip(self, client))]
    pub async fn generate_all_images(
        &mut self,
        story_id: StoryId,
        user_id: UserId,
        client: &dyn StoryApiClient,
    ) -> Result<(), SceneFailure> {
        let indexes: Vec<u32> = self.scenes.iter().map(|s| s.index).collect();
        let mut first_failure: Option<SceneFailure> = None;
        for index in indexes {
            if let Err(source) = self.generate_image(index, story_id, user_id, client).await {
                warn!(index, error = %source, "scene image generation failed");
                if first_failure.is_none() {
                    first_failure = Some(SceneFailure { index, source });
                }
            }
        }
        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    /// Summarizes the collection for the stage guards.
    #[must_use]
    pub fn scene_facts(&self) -> SceneFacts {
        SceneFacts {
            scene_count: self.scenes.len(),
            scenes_missing_images: self
                .scenes
                .iter()
                .filter(|s| !s.has_images())
                .map(|s| s.index)
                .collect(),
        }
    }

    fn scene_mut(&mut self, index: u32) -> Result<&mut Scene, StoryError> {
        self.scenes
            .get_mut(index as usize)
            .ok_or_else(|| missing_scene(index))
    }

    /// Restores the contiguous-index invariant after insert/remove.
    #[allow(clippy::cast_possible_truncation)]
    fn renumber(&mut self) {
        for (position, scene) in self.scenes.iter_mut().enumerate() {
            scene.index = position as u32;
        }
    }
}

fn missing_scene(index: u32) -> StoryError {
    StoryError::validation("scene", format!("no scene at index {index}"))
}
