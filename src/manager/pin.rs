use std::sync::Arc;

use crate::core::{Result, StoreError};
use crate::model::{Loadable, Pin};
use crate::scheduler::{StorageTaskScheduler, Task};
use crate::storage::Store;

use super::loadable::LoadableManager;

/// Bookmarked threads. The set is small and user-bounded, so there is no
/// cache and no trim; every read is an indexed storage lookup.
///
/// A pin owns its loadable: creating one persists the loadable first (via
/// the loadable manager, which runs re-entrant on the storage worker), and
/// deleting one removes the loadable row with it.
pub struct PinManager {
    store: Arc<Store>,
    scheduler: Arc<StorageTaskScheduler>,
    loadables: Arc<LoadableManager>,
}

impl PinManager {
    pub fn new(
        store: Arc<Store>,
        scheduler: Arc<StorageTaskScheduler>,
        loadables: Arc<LoadableManager>,
    ) -> Self {
        Self {
            store,
            scheduler,
            loadables,
        }
    }

    /// Pin a thread. The candidate loadable may be transient; it is resolved
    /// through `get_or_create` inside the same transaction as the pin insert.
    pub fn create_pin(&self, loadable: Loadable) -> Result<Pin> {
        let store = Arc::clone(&self.store);
        let loadables = Arc::clone(&self.loadables);
        self.scheduler.run_task(Task::new(move || {
            let loadable = loadables.get_or_create(loadable)?;
            if loadable.id == 0 {
                return Err(StoreError::ConstraintViolation(
                    "cannot pin a loadable that was never persisted".into(),
                ));
            }
            store.insert_pin(Pin::new(loadable.id))
        }))
    }

    /// Remove the pin and its loadable row, evicting the loadable from the
    /// read cache in the same task.
    pub fn delete_pin(&self, pin: Pin) -> Result<()> {
        let store = Arc::clone(&self.store);
        let loadables = Arc::clone(&self.loadables);
        self.scheduler.run_task(Task::new(move || {
            store.delete_pin(pin.id)?;
            if let Some(loadable) = store.get_loadable(pin.loadable_id)? {
                store.delete_loadable(loadable.id)?;
                loadables.forget(&loadable.key())?;
            }
            Ok(())
        }))
    }

    pub fn update_pin(&self, pin: Pin) -> Result<()> {
        self.update_pins(vec![pin])
    }

    /// Persist watcher-state changes for a batch of pins in one transaction.
    pub fn update_pins(&self, pins: Vec<Pin>) -> Result<()> {
        let store = Arc::clone(&self.store);
        self.scheduler.run_task(Task::new(move || {
            for pin in &pins {
                store.update_pin(pin)?;
            }
            Ok(())
        }))
    }

    /// All pins with their loadables hydrated, in pin `order`.
    pub fn all_pins(&self) -> Result<Vec<(Pin, Loadable)>> {
        let store = Arc::clone(&self.store);
        self.scheduler.run_task(Task::new(move || {
            let mut pins = store.all_pins()?;
            pins.sort_by_key(|p| p.order);

            let mut out = Vec::with_capacity(pins.len());
            for pin in pins {
                let loadable = store
                    .get_loadable(pin.loadable_id)?
                    .ok_or(StoreError::RowNotFound("loadable", pin.loadable_id))?;
                out.push((pin, loadable));
            }
            Ok(out)
        }))
    }

    pub fn pin_count(&self) -> Result<u64> {
        let store = Arc::clone(&self.store);
        self.scheduler
            .run_task(Task::new(move || store.row_count(crate::storage::TableKind::Pin)))
    }
}
