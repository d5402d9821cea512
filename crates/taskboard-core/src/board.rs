//! Client-side board state over the task API.
//!
//! The board caches the task list and stats, never patches a task locally,
//! and refetches both after every successful write. Failures land in a
//! single dismissible error banner, except stats fetches which only log.

use std::collections::BTreeSet;
use std::future::Future;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::{self, TaskApi};
use crate::filter::{Filter, filtered_view};
use crate::stats::{Stats, local_stats};
use crate::task::{Draft, Health, Task, TaskId, TaskPatch};

pub const FETCH_TASKS_FAILED: &str = "Failed to fetch tasks";
pub const CREATE_TASK_FAILED: &str = "Failed to create task";
pub const UPDATE_TASK_FAILED: &str = "Failed to update task";
pub const DELETE_TASK_FAILED: &str = "Failed to delete task";

/// Identity of an in-flight mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestKey {
    Create,
    Update(TaskId),
    Toggle(TaskId),
    Delete(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Draft title was blank; nothing was sent.
    Skipped,
    /// The same mutation is already in flight; nothing was sent.
    Duplicate,
    /// A response from a later-issued fetch was already applied.
    Stale,
    Failed,
    Detached,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Outcome::Applied
    }
}

/// Read-only copy of the board, used for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardSnapshot {
    pub tasks: Vec<Task>,
    pub stats: Option<Stats>,
    pub draft: Draft,
    pub loading: bool,
    pub error: Option<String>,
    pub filter: Filter,
    pub form_open: bool,
}

impl BoardSnapshot {
    pub fn visible_tasks(&self) -> Vec<Task> {
        filtered_view(&self.tasks, self.filter)
    }

    pub fn local_stats(&self) -> Stats {
        local_stats(&self.tasks)
    }

    pub fn find(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Sequencer {
    issued: u64,
    applied: u64,
}

impl Sequencer {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn accept(&mut self, seq: u64) -> bool {
        if seq < self.applied {
            return false;
        }
        self.applied = seq;
        true
    }
}

#[derive(Debug, Default)]
struct BoardState {
    view: BoardSnapshot,
    in_flight: BTreeSet<RequestKey>,
    loading_holders: usize,
    tasks_seq: Sequencer,
    stats_seq: Sequencer,
    detached: bool,
}

impl BoardState {
    fn hold_loading(&mut self) {
        self.loading_holders += 1;
        self.view.loading = true;
    }

    fn release_loading(&mut self) {
        self.loading_holders = self.loading_holders.saturating_sub(1);
        self.view.loading = self.loading_holders > 0;
    }
}

/// Releases the mutation key and the loading hold when the request ends,
/// including when the owning future is dropped mid-flight.
struct RequestGuard<'a> {
    state: &'a Mutex<BoardState>,
    key: Option<RequestKey>,
    loading: bool,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(key) = self.key {
            state.in_flight.remove(&key);
        }
        if self.loading {
            state.release_loading();
        }
    }
}

pub struct TaskBoard<A> {
    api: A,
    state: Mutex<BoardState>,
}

impl<A> TaskBoard<A> {
    pub fn new(api: A) -> Self {
        Self::with_filter(api, Filter::All)
    }

    pub fn with_filter(api: A, filter: Filter) -> Self {
        let mut state = BoardState::default();
        state.view.filter = filter;
        Self {
            api,
            state: Mutex::new(state),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.state.lock().view.clone()
    }

    pub fn visible_tasks(&self) -> Vec<Task> {
        self.state.lock().view.visible_tasks()
    }

    pub fn local_stats(&self) -> Stats {
        local_stats(&self.state.lock().view.tasks)
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().view.loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().view.error.clone()
    }

    pub fn dismiss_error(&self) {
        self.state.lock().view.error = None;
    }

    pub fn set_filter(&self, filter: Filter) {
        debug!(%filter, "filter changed");
        self.state.lock().view.filter = filter;
    }

    pub fn set_draft_title(&self, title: impl Into<String>) {
        self.state.lock().view.draft.title = title.into();
    }

    pub fn set_draft_description(&self, description: impl Into<String>) {
        self.state.lock().view.draft.description = description.into();
    }

    pub fn show_add_form(&self) {
        self.state.lock().view.form_open = true;
    }

    pub fn hide_add_form(&self) {
        self.state.lock().view.form_open = false;
    }

    /// Stops all later responses from touching the board.
    pub fn detach(&self) {
        info!("board detached");
        self.state.lock().detached = true;
    }

    fn begin(
        &self,
        key: Option<RequestKey>,
        loading: bool,
    ) -> Result<RequestGuard<'_>, Outcome> {
        let mut state = self.state.lock();
        if state.detached {
            return Err(Outcome::Detached);
        }
        if let Some(key) = key
            && !state.in_flight.insert(key)
        {
            debug!(?key, "request already in flight");
            return Err(Outcome::Duplicate);
        }
        if loading {
            state.hold_loading();
        }
        Ok(RequestGuard {
            state: &self.state,
            key,
            loading,
        })
    }

    fn settle<F>(&self, apply: F) -> Outcome
    where
        F: FnOnce(&mut BoardState) -> Outcome,
    {
        let mut state = self.state.lock();
        if state.detached {
            debug!("discarding response for detached board");
            return Outcome::Detached;
        }
        apply(&mut state)
    }
}

impl<A: TaskApi> TaskBoard<A> {
    /// Initial load: tasks first, then stats.
    pub async fn mount(&self) -> Outcome {
        self.refresh().await
    }

    /// Refetches tasks then stats, in sequence. Reports the task load.
    pub async fn refresh(&self) -> Outcome {
        let tasks = self.load_tasks().await;
        self.load_stats().await;
        tasks
    }

    #[instrument(skip(self))]
    pub async fn load_tasks(&self) -> Outcome {
        let guard = match self.begin(None, true) {
            Ok(guard) => guard,
            Err(outcome) => return outcome,
        };
        let seq = self.state.lock().tasks_seq.issue();

        let result = self.api.list_tasks().await;
        let outcome = self.settle(|state| match result {
            Ok(tasks) => {
                if !state.tasks_seq.accept(seq) {
                    debug!(seq, "dropping stale task list");
                    return Outcome::Stale;
                }
                debug!(count = tasks.len(), "task list replaced");
                state.view.tasks = tasks;
                Outcome::Applied
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch tasks");
                state.view.error = Some(FETCH_TASKS_FAILED.to_string());
                Outcome::Failed
            }
        });
        drop(guard);
        outcome
    }

    /// Stats are supplementary: failures are logged and never shown.
    #[instrument(skip(self))]
    pub async fn load_stats(&self) -> Outcome {
        let guard = match self.begin(None, false) {
            Ok(guard) => guard,
            Err(outcome) => return outcome,
        };
        let seq = self.state.lock().stats_seq.issue();

        let result = self.api.stats().await;
        let outcome = self.settle(|state| match result {
            Ok(stats) => {
                if !state.stats_seq.accept(seq) {
                    debug!(seq, "dropping stale stats");
                    return Outcome::Stale;
                }
                state.view.stats = Some(stats);
                Outcome::Applied
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch stats");
                Outcome::Failed
            }
        });
        drop(guard);
        outcome
    }

    /// Sends the current draft. Blank titles are dropped without a request.
    #[instrument(skip(self))]
    pub async fn submit_draft(&self) -> Outcome {
        let draft = {
            let state = self.state.lock();
            if state.detached {
                return Outcome::Detached;
            }
            state.view.draft.clone()
        };

        if draft.is_blank() {
            debug!("blank draft title, not submitting");
            return Outcome::Skipped;
        }

        let body = draft.to_new_task();
        self.mutate(
            RequestKey::Create,
            true,
            CREATE_TASK_FAILED,
            || self.api.create_task(&body),
            |view, task| {
                info!(id = task.id, title = %task.title, "task created");
                view.draft = Draft::default();
                view.form_open = false;
            },
        )
        .await
    }

    /// Flips `completed` on the server; the local copy only changes via the
    /// refetch that follows.
    #[instrument(skip(self, task), fields(id = task.id, completed = task.completed))]
    pub async fn toggle_complete(&self, task: &Task) -> Outcome {
        let patch = TaskPatch::completed(!task.completed);
        self.mutate(
            RequestKey::Toggle(task.id),
            false,
            UPDATE_TASK_FAILED,
            || self.api.update_task(task.id, &patch),
            |_, updated| {
                info!(id = updated.id, completed = updated.completed, "task toggled");
            },
        )
        .await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Outcome {
        if patch.is_empty() {
            debug!("empty patch, not submitting");
            return Outcome::Skipped;
        }
        self.mutate(
            RequestKey::Update(id),
            false,
            UPDATE_TASK_FAILED,
            || self.api.update_task(id, patch),
            |_, updated| {
                info!(id = updated.id, "task updated");
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: TaskId) -> Outcome {
        self.mutate(
            RequestKey::Delete(id),
            false,
            DELETE_TASK_FAILED,
            || self.api.delete_task(id),
            |_, ()| {
                info!(id, "task deleted");
            },
        )
        .await
    }

    pub async fn health(&self) -> api::Result<Health> {
        self.api.health().await
    }

    async fn mutate<T, R, Fut, F>(
        &self,
        key: RequestKey,
        loading: bool,
        failure: &'static str,
        request: R,
        on_success: F,
    ) -> Outcome
    where
        R: FnOnce() -> Fut,
        Fut: Future<Output = api::Result<T>>,
        F: FnOnce(&mut BoardSnapshot, T),
    {
        let guard = match self.begin(Some(key), loading) {
            Ok(guard) => guard,
            Err(outcome) => return outcome,
        };

        let result = request().await;
        let outcome = self.settle(|state| match result {
            Ok(value) => {
                on_success(&mut state.view, value);
                Outcome::Applied
            }
            Err(err) => {
                warn!(?key, error = %err, "{failure}");
                state.view.error = Some(failure.to_string());
                Outcome::Failed
            }
        });
        drop(guard);

        if outcome.is_applied() {
            self.refresh().await;
        }
        outcome
    }
}
