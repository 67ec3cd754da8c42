// ============================================================================
// Store manager: composition root for the persistence core
// ============================================================================

mod hide;
mod history;
mod loadable;
mod pin;
mod saved_reply;
mod state;

pub use hide::HideManager;
pub use history::HistoryManager;
pub use loadable::LoadableManager;
pub use pin::PinManager;
pub use saved_reply::SavedReplyManager;
pub use state::LoadState;

use std::sync::Arc;

use serde_json::json;

use crate::core::Result;
use crate::scheduler::{InlineDispatcher, OriginDispatcher, StorageTaskScheduler, Task};
use crate::storage::{Store, TableKind};
use crate::transaction::TransactionRunner;

/// The central point for storage access. Owns the store, the single storage
/// worker and one manager per entity; application code reads and mutates
/// persistent state only through the managers exposed here.
pub struct StoreManager {
    store: Arc<Store>,
    scheduler: Arc<StorageTaskScheduler>,
    loadables: Arc<LoadableManager>,
    saved_replies: Arc<SavedReplyManager>,
    hides: Arc<HideManager>,
    history: Arc<HistoryManager>,
    pins: Arc<PinManager>,
}

impl StoreManager {
    /// Build the full persistence stack. `dispatcher` is where async
    /// completion callbacks are posted (the UI main loop in the app).
    pub fn new(dispatcher: Arc<dyn OriginDispatcher>) -> Self {
        let store = Arc::new(Store::new());
        let runner = Arc::new(TransactionRunner::new(Arc::clone(&store)));
        let scheduler = Arc::new(StorageTaskScheduler::new(runner, dispatcher));

        let loadables = Arc::new(LoadableManager::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
        ));
        let saved_replies = Arc::new(SavedReplyManager::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
        ));
        let hides = Arc::new(HideManager::new(Arc::clone(&store), Arc::clone(&scheduler)));
        let history = Arc::new(HistoryManager::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
        ));
        let pins = Arc::new(PinManager::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
            Arc::clone(&loadables),
        ));

        Self {
            store,
            scheduler,
            loadables,
            saved_replies,
            hides,
            history,
            pins,
        }
    }

    /// Stack with callbacks running inline on the storage worker; for
    /// headless and test use.
    pub fn headless() -> Self {
        Self::new(Arc::new(InlineDispatcher))
    }

    /// Startup sequence. Saved replies load synchronously because the first
    /// rendered post list already needs them; history and hidden posts only
    /// trim and warm caches, so they go async.
    pub fn initialize_and_trim(&self) -> Result<()> {
        self.saved_replies.load()?;
        self.history.load_async()?;
        self.hides.load_async()?;
        Ok(())
    }

    pub fn loadables(&self) -> &Arc<LoadableManager> {
        &self.loadables
    }

    pub fn saved_replies(&self) -> &Arc<SavedReplyManager> {
        &self.saved_replies
    }

    pub fn hides(&self) -> &Arc<HideManager> {
        &self.hides
    }

    pub fn history(&self) -> &Arc<HistoryManager> {
        &self.history
    }

    pub fn pins(&self) -> &Arc<PinManager> {
        &self.pins
    }

    pub fn scheduler(&self) -> &Arc<StorageTaskScheduler> {
        &self.scheduler
    }

    /// Wipe every table, drop every cache, reload. Developer-screen feature;
    /// all managers pass through `Unloaded` before anything serves reads
    /// again.
    pub fn reset(&self) -> Result<()> {
        let store = Arc::clone(&self.store);
        self.scheduler
            .run_task(Task::new(move || store.clear_all()))?;

        self.saved_replies.mark_unloaded()?;
        self.hides.mark_unloaded()?;
        self.history.mark_unloaded()?;
        self.loadables.invalidate()?;

        self.initialize_and_trim()
    }

    /// Per-table row counts, for the developer screen.
    pub fn summary(&self) -> Result<serde_json::Value> {
        let store = Arc::clone(&self.store);
        self.scheduler.run_task(Task::new(move || {
            let mut counts = serde_json::Map::new();
            for kind in TableKind::ALL {
                counts.insert(kind.name().to_string(), json!(store.row_count(kind)?));
            }
            Ok(serde_json::Value::Object(counts))
        }))
    }
}
