use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::cache::EntityCache;
use crate::core::{Result, SiteId, StoreError};
use crate::model::{Loadable, LoadableKey, LoadableMode};
use crate::scheduler::{StorageTaskScheduler, Task};
use crate::storage::Store;

/// Loadables are the identity glue of the whole app: pins, history and open
/// threads all reference the same row. Call sites construct transient
/// candidates freely; `get_or_create` maps any candidate onto the one cached,
/// persisted instance for its natural key.
///
/// The cache hydrates incrementally (there is no bulk load) and entries live
/// for the process lifetime.
pub struct LoadableManager {
    store: Arc<Store>,
    scheduler: Arc<StorageTaskScheduler>,
    cache: Arc<EntityCache<LoadableKey, Loadable>>,
}

impl LoadableManager {
    pub fn new(store: Arc<Store>, scheduler: Arc<StorageTaskScheduler>) -> Self {
        Self {
            store,
            scheduler,
            cache: Arc::new(EntityCache::new()),
        }
    }

    /// Resolve a candidate loadable to its persisted form.
    ///
    /// Candidates that already carry a row id pass through untouched, as do
    /// catalog loadables (never persisted). Otherwise the natural key is
    /// looked up in the cache, then in storage, and inserted when absent.
    /// Multiple storage rows for one key is a known data-quality defect:
    /// logged, first row wins.
    pub fn get_or_create(&self, candidate: Loadable) -> Result<Loadable> {
        if candidate.id != 0 {
            return Ok(candidate);
        }
        if candidate.is_catalog_mode() {
            return Ok(candidate);
        }

        let key = candidate.key();
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task(Task::new(move || {
            cache.refresh_or_load(key, || {
                let matches = store.find_loadables(
                    candidate.site_id,
                    LoadableMode::Thread,
                    &candidate.board_code,
                    candidate.no,
                )?;

                let mut row = match matches.first() {
                    None => store.insert_loadable(candidate)?,
                    Some(first) => {
                        if matches.len() > 1 {
                            warn!(
                                site = first.site_id,
                                board = %first.board_code,
                                no = first.no,
                                "{} duplicate loadable rows, taking the first",
                                matches.len()
                            );
                        }
                        first.clone()
                    }
                };

                row.last_load_date = Utc::now();
                store.update_loadable(&row)?;
                Ok(row)
            })
        }))
    }

    /// Take UI-state changes (title, scroll position) into the cache and mark
    /// the entry dirty. Nothing is written until [`flush`](Self::flush).
    pub fn update(&self, loadable: Loadable) -> Result<()> {
        if loadable.id == 0 || !loadable.is_thread_mode() {
            return Ok(());
        }
        let mut entry = loadable;
        entry.dirty = true;
        self.cache.put(entry.key(), entry)
    }

    /// Write dirty cache entries back to storage. Fire-and-forget; invoked
    /// when the app backgrounds. A dirty entry whose row is gone (the thread
    /// was unpinned while still open) is evicted, not treated as a failure.
    pub fn flush(&self) -> Result<()> {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task_async(Task::new(move || {
            for loadable in cache.values() {
                if !loadable.dirty {
                    continue;
                }
                match store.update_loadable(&loadable) {
                    Ok(()) => {
                        cache.update(&loadable.key(), |entry| entry.dirty = false)?;
                    }
                    Err(StoreError::RowNotFound(..)) => {
                        warn!(
                            site = loadable.site_id,
                            board = %loadable.board_code,
                            no = loadable.no,
                            "dropping dirty entry for a deleted loadable"
                        );
                        cache.remove(&loadable.key())?;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        }))
    }

    pub fn loadables_for_site(&self, site_id: SiteId) -> Result<Vec<Loadable>> {
        let store = Arc::clone(&self.store);
        self.scheduler
            .run_task(Task::new(move || store.loadables_for_site(site_id)))
    }

    /// Delete every loadable belonging to a site (site removal), evicting
    /// the matching cache entries in the same task.
    pub fn delete_for_site(&self, site_id: SiteId) -> Result<u64> {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        self.scheduler.run_task(Task::new(move || {
            let rows = store.loadables_for_site(site_id)?;
            let mut removed = 0;
            for loadable in rows {
                if store.delete_loadable(loadable.id)? {
                    removed += 1;
                }
                cache.remove(&loadable.key())?;
            }
            Ok(removed)
        }))
    }

    pub(crate) fn invalidate(&self) -> Result<()> {
        self.cache.clear()
    }

    /// Evict one entry after its row was deleted by an owning entity (pin
    /// removal). Without this a later flush would write to a missing row.
    pub(crate) fn forget(&self, key: &LoadableKey) -> Result<()> {
        self.cache.remove(key)?;
        Ok(())
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
