use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::cache::EntityCache;
use crate::core::{PostNo, Result, SiteId};
use crate::model::{PostHide, PostHideKey};
use crate::scheduler::{StorageTaskScheduler, Task};
use crate::storage::{Store, TableKind};
use crate::trim::TrimPolicy;

use super::state::LoadState;

const POST_HIDE_TRIM: TrimPolicy = TrimPolicy::new(250, 50);

/// Hidden posts and threads. Hit once per catalog/thread list item, so
/// visibility checks are cache reads; the hide/unhide mutations keep the
/// cache in step with the table inside their storage task.
pub struct HideManager {
    store: Arc<Store>,
    scheduler: Arc<StorageTaskScheduler>,
    cache: Arc<EntityCache<PostHideKey, PostHide>>,
    state: Arc<Mutex<LoadState>>,
}

impl HideManager {
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
            POST_HIDE_TRIM.apply(&store, TableKind::PostHide);

            let rows = store.all_post_hides()?;
            cache.replace_all(rows.into_iter().map(|h| (h.key(), h)))?;

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

    /// Trim and hydrate without blocking the caller. Used at startup where
    /// nothing renders hidden-post state yet.
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

    /// Hide a post or thread. Already-hidden entries are left alone, so
    /// hiding is idempotent.
    pub fn hide(&self, hide: PostHide) -> Result<()> {
        self.hide_many(vec![hide])
    }

    /// Bulk hide, one transaction for the whole batch. The cache picks the
    /// batch up only after every row is in; a failed batch rolls back without
    /// leaving cache entries behind.
    pub fn hide_many(&self, hides: Vec<PostHide>) -> Result<()> {
        self.ensure_loaded()?;
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task(Task::new(move || {
            let mut stored = Vec::with_capacity(hides.len());
            for hide in hides {
                let existing =
                    store.post_hides_in(hide.site_id, &hide.board_code, &[hide.no])?;
                if !existing.is_empty() {
                    continue;
                }
                stored.push(store.insert_post_hide(hide)?);
            }
            cache.put_all(stored.into_iter().map(|h| (h.key(), h)))
        }))
    }

    pub fn unhide(&self, site_id: SiteId, board_code: &str, no: PostNo) -> Result<()> {
        self.unhide_many(vec![PostHideKey {
            site_id,
            board_code: board_code.to_string(),
            no,
        }])
    }

    pub fn unhide_many(&self, keys: Vec<PostHideKey>) -> Result<()> {
        self.ensure_loaded()?;
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task(Task::new(move || {
            for key in keys {
                store.delete_post_hide(key.site_id, &key.board_code, key.no)?;
                cache.remove(&key)?;
            }
            Ok(())
        }))
    }

    /// Cache-only visibility check, one per rendered list item.
    pub fn is_hidden(&self, site_id: SiteId, board_code: &str, no: PostNo) -> bool {
        if let Err(e) = self.ensure_loaded() {
            warn!("hidden-post lookup before load: {e}");
            return false;
        }
        self.cache
            .get(&PostHideKey {
                site_id,
                board_code: board_code.to_string(),
                no,
            })
            .is_some()
    }

    /// The subset of `nos` that is hidden on this board, straight from
    /// storage. Used when filtering a freshly parsed post list.
    pub fn hidden_in(
        &self,
        site_id: SiteId,
        board_code: &str,
        nos: Vec<PostNo>,
    ) -> Result<Vec<PostHide>> {
        self.ensure_loaded()?;
        let store = Arc::clone(&self.store);
        let board_code = board_code.to_string();
        self.scheduler
            .run_task(Task::new(move || store.post_hides_in(site_id, &board_code, &nos)))
    }

    /// Drop every hide, table and cache both.
    pub fn clear_all(&self) -> Result<()> {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task(Task::new(move || {
            store.clear(TableKind::PostHide)?;
            cache.clear()?;
            Ok(())
        }))
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
