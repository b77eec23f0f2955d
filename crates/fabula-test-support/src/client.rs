//! Test clients — fake `StoryApiClient` implementations.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use fabula_core::client::{
    BoardActive, BoardRecord, BoardStatus, ChapterSummary, ContinueStoryRequest,
    CreateBoardRequest, GenStoryResult, RenderType, SceneRender, StoryApiClient,
};
use fabula_core::error::StoryError;
use fabula_core::ids::{BoardId, SceneId, StoryId, UserId};

/// One recorded call against a [`ScriptedApiClient`], with the arguments the
/// assertions care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// `create_story_board` was invoked.
    CreateStoryBoard {
        /// Parent id carried by the request.
        prev_board_id: BoardId,
    },
    /// `continue_gen_story` was invoked.
    ContinueGenStory {
        /// The board being continued from.
        prev_board_id: BoardId,
    },
    /// `gen_board_prompts` was invoked.
    GenBoardPrompts {
        /// Target board.
        board_id: BoardId,
    },
    /// `create_scene` was invoked.
    CreateScene {
        /// Owning board.
        board_id: BoardId,
        /// Scene position.
        index: u32,
    },
    /// `gen_scene_image` was invoked.
    GenSceneImage {
        /// Target scene.
        scene_id: SceneId,
    },
    /// `publish_board` was invoked.
    PublishBoard {
        /// Target board.
        board_id: BoardId,
        /// Requested status.
        status: BoardStatus,
    },
    /// `fork_list` was invoked.
    ForkList {
        /// Parent board.
        board_id: BoardId,
        /// Page offset.
        offset: usize,
        /// Requested page size.
        page_size: usize,
    },
    /// `board_active` was invoked.
    BoardActive {
        /// Target board.
        board_id: BoardId,
    },
}

/// A `StoryApiClient` that records every call and serves scripted outcomes.
///
/// By default every operation succeeds: boards and scenes get sequential
/// ids, story generation returns a non-empty chapter summary, and image
/// rendering returns a single URL derived from the scene id. Individual
/// operations can be scripted to fail or to return canned payloads.
pub struct ScriptedApiClient {
    calls: Mutex<Vec<ApiCall>>,
    next_board_id: AtomicI64,
    next_scene_id: AtomicI64,
    gen_story_result: Mutex<Result<GenStoryResult, StoryError>>,
    fork_pages: Mutex<VecDeque<Result<Vec<BoardRecord>, StoryError>>>,
    scene_image_failures: Mutex<HashMap<SceneId, StoryError>>,
    create_scene_failure: Mutex<Option<(u32, StoryError)>>,
    create_board_failure: Mutex<Option<StoryError>>,
    prompt_failure: Mutex<Option<StoryError>>,
    publish_failure: Mutex<Option<StoryError>>,
    board_active_result: Mutex<Option<Result<BoardActive, StoryError>>>,
}

impl Default for ScriptedApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedApiClient {
    /// Creates a client where every operation succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_board_id: AtomicI64::new(1000),
            next_scene_id: AtomicI64::new(500),
            gen_story_result: Mutex::new(Ok(GenStoryResult {
                chapter_summary: ChapterSummary {
                    title: "Generated title".to_owned(),
                    content: "Generated content".to_owned(),
                },
            })),
            fork_pages: Mutex::new(VecDeque::new()),
            scene_image_failures: Mutex::new(HashMap::new()),
            create_scene_failure: Mutex::new(None),
            create_board_failure: Mutex::new(None),
            prompt_failure: Mutex::new(None),
            publish_failure: Mutex::new(None),
            board_active_result: Mutex::new(None),
        }
    }

    /// Scripts the outcome of the next (and all later) story generations.
    pub fn set_gen_story_result(&self, result: Result<GenStoryResult, StoryError>) {
        *self.gen_story_result.lock().unwrap() = result;
    }

    /// Queues one `fork_list` response; calls pop pages in FIFO order and an
    /// exhausted queue yields empty pages.
    pub fn push_fork_page(&self, page: Result<Vec<BoardRecord>, StoryError>) {
        self.fork_pages.lock().unwrap().push_back(page);
    }

    /// Scripts `gen_scene_image` to fail for one scene id.
    pub fn fail_scene_image(&self, scene_id: SceneId, error: StoryError) {
        self.scene_image_failures
            .lock()
            .unwrap()
            .insert(scene_id, error);
    }

    /// Scripts `create_scene` to fail when asked to persist `index`.
    pub fn fail_create_scene_at(&self, index: u32, error: StoryError) {
        *self.create_scene_failure.lock().unwrap() = Some((index, error));
    }

    /// Scripts `create_story_board` to fail.
    pub fn fail_create_board(&self, error: StoryError) {
        *self.create_board_failure.lock().unwrap() = Some(error);
    }

    /// Lets `create_story_board` succeed again, for recovery scenarios.
    pub fn clear_create_board_failure(&self) {
        *self.create_board_failure.lock().unwrap() = None;
    }

    /// Scripts `gen_board_prompts` to fail.
    pub fn fail_gen_board_prompts(&self, error: StoryError) {
        *self.prompt_failure.lock().unwrap() = Some(error);
    }

    /// Lets `gen_board_prompts` succeed again, for recovery scenarios.
    pub fn clear_gen_board_prompts_failure(&self) {
        *self.prompt_failure.lock().unwrap() = None;
    }

    /// Scripts `publish_board` to fail.
    pub fn fail_publish(&self, error: StoryError) {
        *self.publish_failure.lock().unwrap() = Some(error);
    }

    /// Scripts the `board_active` response.
    pub fn set_board_active(&self, result: Result<BoardActive, StoryError>) {
        *self.board_active_result.lock().unwrap() = Some(result);
    }

    /// Returns a snapshot of every recorded call, in invocation order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Counts recorded calls matching `predicate`.
    pub fn call_count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl StoryApiClient for ScriptedApiClient {
    async fn create_story_board(
        &self,
        request: &CreateBoardRequest,
    ) -> Result<BoardRecord, StoryError> {
        self.record(ApiCall::CreateStoryBoard {
            prev_board_id: request.prev_board_id,
        });
        if let Some(err) = self.create_board_failure.lock().unwrap().clone() {
            return Err(err);
        }
        let id = BoardId(self.next_board_id.fetch_add(1, Ordering::SeqCst));
        Ok(BoardRecord {
            id,
            story_id: request.story_id,
            prev_board_id: request.prev_board_id,
            title: request.title.clone(),
            content: request.content.clone(),
            background: request.background.clone(),
            stage: 1,
            creator_id: UserId::ZERO,
            ctime: chrono::Utc::now(),
        })
    }

    async fn continue_gen_story(
        &self,
        request: &ContinueStoryRequest,
    ) -> Result<GenStoryResult, StoryError> {
        self.record(ApiCall::ContinueGenStory {
            prev_board_id: request.prev_board_id,
        });
        self.gen_story_result.lock().unwrap().clone()
    }

    async fn gen_board_prompts(
        &self,
        _story_id: StoryId,
        board_id: BoardId,
        _user_id: UserId,
        _render_type: RenderType,
    ) -> Result<(), StoryError> {
        self.record(ApiCall::GenBoardPrompts { board_id });
        match self.prompt_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn create_scene(&self, board_id: BoardId, index: u32) -> Result<SceneId, StoryError> {
        self.record(ApiCall::CreateScene { board_id, index });
        if let Some((failing_index, err)) = self.create_scene_failure.lock().unwrap().clone()
            && failing_index == index
        {
            return Err(err);
        }
        Ok(SceneId(self.next_scene_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn gen_scene_image(
        &self,
        _story_id: StoryId,
        _board_id: BoardId,
        _user_id: UserId,
        scene_id: SceneId,
        _render_type: RenderType,
    ) -> Result<SceneRender, StoryError> {
        self.record(ApiCall::GenSceneImage { scene_id });
        if let Some(err) = self.scene_image_failures.lock().unwrap().get(&scene_id) {
            return Err(err.clone());
        }
        Ok(SceneRender {
            image_urls: vec![format!("https://cdn.test/scene-{scene_id}.png")],
        })
    }

    async fn publish_board(
        &self,
        _story_id: StoryId,
        board_id: BoardId,
        _user_id: UserId,
        status: BoardStatus,
    ) -> Result<(), StoryError> {
        self.record(ApiCall::PublishBoard { board_id, status });
        match self.publish_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fork_list(
        &self,
        _user_id: UserId,
        _story_id: StoryId,
        board_id: BoardId,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<BoardRecord>, StoryError> {
        self.record(ApiCall::ForkList {
            board_id,
            offset,
            page_size,
        });
        match self.fork_pages.lock().unwrap().pop_front() {
            Some(page) => page,
            None => Ok(Vec::new()),
        }
    }

    async fn board_active(&self, board_id: BoardId) -> Result<BoardActive, StoryError> {
        self.record(ApiCall::BoardActive { board_id });
        match self.board_active_result.lock().unwrap().clone() {
            Some(result) => result,
            None => Err(StoryError::NotFound {
                entity: "board",
                id: board_id.0,
            }),
        }
    }
}

/// A `StoryApiClient` where every operation fails with a remote error.
/// Useful for asserting that failures leave local state untouched.
#[derive(Debug, Default)]
pub struct FailingApiClient;

impl FailingApiClient {
    fn refused<T>() -> Result<T, StoryError> {
        Err(StoryError::Remote("connection refused".into()))
    }
}

#[async_trait]
impl StoryApiClient for FailingApiClient {
    async fn create_story_board(
        &self,
        _request: &CreateBoardRequest,
    ) -> Result<BoardRecord, StoryError> {
        Self::refused()
    }

    async fn continue_gen_story(
        &self,
        _request: &ContinueStoryRequest,
    ) -> Result<GenStoryResult, StoryError> {
        Self::refused()
    }

    async fn gen_board_prompts(
        &self,
        _story_id: StoryId,
        _board_id: BoardId,
        _user_id: UserId,
        _render_type: RenderType,
    ) -> Result<(), StoryError> {
        Self::refused()
    }

    async fn create_scene(&self, _board_id: BoardId, _index: u32) -> Result<SceneId, StoryError> {
        Self::refused()
    }

    async fn gen_scene_image(
        &self,
        _story_id: StoryId,
        _board_id: BoardId,
        _user_id: UserId,
        _scene_id: SceneId,
        _render_type: RenderType,
    ) -> Result<SceneRender, StoryError> {
        Self::refused()
    }

    async fn publish_board(
        &self,
        _story_id: StoryId,
        _board_id: BoardId,
        _user_id: UserId,
        _status: BoardStatus,
    ) -> Result<(), StoryError> {
        Self::refused()
    }

    async fn fork_list(
        &self,
        _user_id: UserId,
        _story_id: StoryId,
        _board_id: BoardId,
        _offset: usize,
        _page_size: usize,
    ) -> Result<Vec<BoardRecord>, StoryError> {
        Self::refused()
    }

    async fn board_active(&self, _board_id: BoardId) -> Result<BoardActive, StoryError> {
        Self::refused()
    }
}
