//! The scene value type.

use std::collections::BTreeSet;

use fabula_core::ids::{RoleId, SceneId};
use serde::{Deserialize, Serialize};

/// One illustrated moment within a board.
///
/// `index` is the stable sort key within the owning board and is unique and
/// contiguous whenever the collection is consistent. `scene_id` stays zero
/// until the scene is first persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Position within the board's scene list.
    pub index: u32,
    /// Backend-assigned identifier; zero before first persistence.
    pub scene_id: SceneId,
    /// Scene text.
    pub content: String,
    /// Prompt used for image generation.
    pub image_prompt: String,
    /// Characters appearing in this scene.
    pub characters: BTreeSet<RoleId>,
    /// Local reference image bytes, held until upload. Never serialized.
    #[serde(skip)]
    pub reference_image: Option<Vec<u8>>,
    /// URLs of generated images, in generation order.
    pub generated_image_urls: Vec<String>,
}

impl Scene {
    /// Creates an empty, unpersisted scene at `index`.
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self {
            index,
            scene_id: SceneId::ZERO,
            content: String::new(),
            image_prompt: String::new(),
            characters: BTreeSet::new(),
            reference_image: None,
            generated_image_urls: Vec::new(),
        }
    }

    /// True once the backend has assigned an id.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.scene_id.is_zero()
    }

    /// True when at least one image has been generated.
    #[must_use]
    pub fn has_images(&self) -> bool {
        !self.generated_image_urls.is_empty()
    }
}
