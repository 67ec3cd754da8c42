use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::cache::EntityCache;
use crate::core::{LoadableId, Result};
use crate::model::History;
use crate::scheduler::{StorageTaskScheduler, Task};
use crate::storage::{Store, TableKind};
use crate::trim::TrimPolicy;

use super::state::LoadState;

const HISTORY_TRIM: TrimPolicy = TrimPolicy::new(500, 50);

/// Thread visit history. One row per loadable; revisiting touches the date.
/// Recording a visit is pure side effect, so it goes fire-and-forget.
pub struct HistoryManager {
    store: Arc<Store>,
    scheduler: Arc<StorageTaskScheduler>,
    cache: Arc<EntityCache<LoadableId, History>>,
    state: Arc<Mutex<LoadState>>,
}

impl HistoryManager {
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
            HISTORY_TRIM.apply(&store, TableKind::History);

            let rows = store.all_history()?;
            cache.replace_all(rows.into_iter().map(|h| (h.loadable_id, h)))?;

            *state.lock()? = LoadState::Ready;
            Ok(())
        })
    }

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

    pub fn load_async(&self) -> Result<()> {
        *self.state.lock()? = LoadState::Loading;
        self.scheduler.run_task_async(self.load_task())
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

    pub(crate) fn mark_unloaded(&self) -> Result<()> {
        *self.state.lock()? = LoadState::Unloaded;
        self.cache.clear()
    }

    /// Record a visit. Insert on first sight, touch the date after; the
    /// caller never waits on it.
    pub fn add(&self, loadable_id: LoadableId) -> Result<()> {
        self.ensure_loaded()?;
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task_async(Task::new(move || {
            match store.find_history_for_loadable(loadable_id)? {
                Some(mut row) => {
                    row.date = Utc::now();
                    store.update_history(&row)?;
                    cache.put(loadable_id, row)?;
                }
                None => {
                    let row = store.insert_history(History::new(loadable_id))?;
                    cache.put(loadable_id, row)?;
                }
            }
            Ok(())
        }))
    }

    pub fn remove(&self, loadable_id: LoadableId) -> Result<()> {
        self.ensure_loaded()?;
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task(Task::new(move || {
            if let Some(row) = store.find_history_for_loadable(loadable_id)? {
                store.delete_history(row.id)?;
            }
            cache.remove(&loadable_id)?;
            Ok(())
        }))
    }

    pub fn contains(&self, loadable_id: LoadableId) -> bool {
        self.ensure_loaded().is_ok() && self.cache.get(&loadable_id).is_some()
    }

    /// All visits, most recent first.
    pub fn all(&self) -> Result<Vec<History>> {
        self.ensure_loaded()?;
        let store = Arc::clone(&self.store);
        self.scheduler.run_task(Task::new(move || {
            let mut rows = store.all_history()?;
            rows.sort_by(|a, b| b.date.cmp(&a.date));
            Ok(rows)
        }))
    }

    pub fn clear_history(&self) -> Result<()> {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task(Task::new(move || {
            store.clear(TableKind::History)?;
            cache.clear()?;
            Ok(())
        }))
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
