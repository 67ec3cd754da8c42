use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::cache::EntityCache;
use crate::core::{PostNo, Result};
use crate::model::{SavedReply, SavedReplyKey};
use crate::scheduler::{StorageTaskScheduler, Task};
use crate::storage::{Store, TableKind};
use crate::trim::TrimPolicy;

use super::state::LoadState;

const SAVED_REPLY_TRIM: TrimPolicy = TrimPolicy::new(250, 50);

/// Saved replies are checked once per rendered post, so `is_saved` and
/// `find` never touch storage; everything is answered from the cache the
/// load task hydrated.
pub struct SavedReplyManager {
    store: Arc<Store>,
    scheduler: Arc<StorageTaskScheduler>,
    cache: Arc<EntityCache<SavedReplyKey, SavedReply>>,
    state: Arc<Mutex<LoadState>>,
}

impl SavedReplyManager {
    pub fn new(store: Arc<Store>, scheduler: Arc<StorageTaskScheduler>) -> Self {
        Self {
            store,
            scheduler,
            cache: Arc::new(EntityCache::new()),
            state: Arc::new(Mutex::new(LoadState::Unloaded)),
        }
    }

    fn load_task(&self) -> Task<()> {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        let state = Arc::clone(&self.state);
        Task::new(move || {
            SAVED_REPLY_TRIM.apply(&store, TableKind::SavedReply);

            let rows = store.all_saved_replies()?;
            cache.replace_all(rows.into_iter().map(|r| (r.key(), r)))?;

            *state.lock()? = LoadState::Ready;
            Ok(())
        })
    }

    /// Trim the table, then hydrate the cache. Blocks until done.
    pub fn load(&self) -> Result<()> {
        {
            let mut state = self.state.lock()?;
            if *state == LoadState::Ready {
                return Ok(());
            }
            *state = LoadState::Loading;
        }
        let result = self.scheduler.run_task(self.load_task());
        if result.is_err() {
            *self.state.lock()? = LoadState::Unloaded;
        }
        result
    }

    fn ensure_loaded(&self) -> Result<()> {
        let ready = self
            .state
            .lock()
            .map(|state| *state == LoadState::Ready)
            .unwrap_or(false);
        if ready {
            return Ok(());
        }
        self.load()
    }

    /// Forget everything; the next operation reloads. Called on storage reset.
    pub(crate) fn mark_unloaded(&self) -> Result<()> {
        *self.state.lock()? = LoadState::Unloaded;
        self.cache.clear()
    }

    /// Persist a reply the user just posted. Returns the row with its
    /// generated id; the cache picks it up in the same task.
    pub fn save_reply(&self, reply: SavedReply) -> Result<SavedReply> {
        self.ensure_loaded()?;
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task(Task::new(move || {
            let saved = store.insert_saved_reply(reply)?;
            cache.put(saved.key(), saved.clone())?;
            Ok(saved)
        }))
    }

    pub fn unsave_reply(&self, reply: SavedReply) -> Result<()> {
        self.ensure_loaded()?;
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task(Task::new(move || {
            store.delete_saved_reply(reply.id)?;
            cache.remove(&reply.key())?;
            Ok(())
        }))
    }

    /// Cache-only lookup; never blocks on storage once loaded.
    pub fn is_saved(&self, board_code: &str, no: PostNo) -> bool {
        self.find(board_code, no).is_some()
    }

    pub fn find(&self, board_code: &str, no: PostNo) -> Option<SavedReply> {
        if let Err(e) = self.ensure_loaded() {
            warn!("saved reply lookup before load: {e}");
            return None;
        }
        self.cache.get(&SavedReplyKey {
            board_code: board_code.to_string(),
            no,
        })
    }

    /// Drop every saved reply, table and cache both. Blocks until done.
    pub fn clear_saved_replies(&self) -> Result<()> {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task(Task::new(move || {
            store.clear(TableKind::SavedReply)?;
            cache.clear()?;
            Ok(())
        }))
    }

    /// Async flavor of [`clear_saved_replies`]; `on_complete` runs on the
    /// origin context once the table and cache are empty.
    pub fn clear_saved_replies_with<F>(&self, on_complete: F) -> Result<()>
    where
        F: FnOnce(()) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task_async_with(
            Task::new(move || {
                store.clear(TableKind::SavedReply)?;
                cache.clear()?;
                Ok(())
            }),
            on_complete,
        )
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
