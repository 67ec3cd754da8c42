use std::sync::Mutex;

use crate::core::{LoadableId, PostNo, Result, RowId, SiteId, StoreError};
use crate::model::{History, Loadable, LoadableMode, Pin, PostHide, SavedReply};

use super::tables::{TableKind, Tables};

struct StoreInner {
    tables: Tables,
    /// Pre-transaction image of the tables; `Some` while a transaction is
    /// open. Restoring it is what rollback means.
    snapshot: Option<Tables>,
    next_id: RowId,
}

/// The durable storage engine: typed per-entity CRUD, row counts, oldest-row
/// deletion and transaction begin/commit/rollback.
///
/// In the application this sits on top of an already-migrated relational
/// schema; here the rows live in persistent maps so a transaction snapshot is
/// a cheap structural clone. Access is serialized by the storage scheduler;
/// the internal mutex only keeps stray direct reads memory-safe.
pub struct Store {
    inner: Mutex<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                tables: Tables::default(),
                snapshot: None,
                next_id: 1,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    pub fn begin(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if inner.snapshot.is_some() {
            return Err(StoreError::Execution(
                "nested independent transactions are not supported".into(),
            ));
        }
        inner.snapshot = Some(inner.tables.clone());
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner
            .snapshot
            .take()
            .ok_or_else(|| StoreError::Execution("commit without open transaction".into()))?;
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        let snapshot = inner
            .snapshot
            .take()
            .ok_or_else(|| StoreError::Execution("rollback without open transaction".into()))?;
        inner.tables = snapshot;
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.snapshot.is_some())
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Generic table operations
    // ------------------------------------------------------------------

    pub fn row_count(&self, kind: TableKind) -> Result<u64> {
        Ok(self.inner.lock()?.tables.row_count(kind))
    }

    /// Delete the `n` rows with the lowest ids. Returns how many were removed.
    pub fn delete_oldest(&self, kind: TableKind, n: u64) -> Result<u64> {
        Ok(self.inner.lock()?.tables.delete_oldest(kind, n))
    }

    pub fn clear(&self, kind: TableKind) -> Result<()> {
        self.inner.lock()?.tables.clear(kind);
        Ok(())
    }

    pub fn clear_all(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        for kind in TableKind::ALL {
            inner.tables.clear(kind);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Loadables
    // ------------------------------------------------------------------

    pub fn insert_loadable(&self, mut loadable: Loadable) -> Result<Loadable> {
        let mut inner = self.inner.lock()?;
        loadable.id = inner.next_id;
        inner.next_id += 1;
        loadable.dirty = false;
        inner.tables.loadables.insert(loadable.id, loadable.clone());
        Ok(loadable)
    }

    pub fn update_loadable(&self, loadable: &Loadable) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if !inner.tables.loadables.contains_key(&loadable.id) {
            return Err(StoreError::RowNotFound("loadable", loadable.id));
        }
        let mut stored = loadable.clone();
        stored.dirty = false;
        inner.tables.loadables.insert(stored.id, stored);
        Ok(())
    }

    pub fn get_loadable(&self, id: LoadableId) -> Result<Option<Loadable>> {
        Ok(self.inner.lock()?.tables.loadables.get(&id).cloned())
    }

    pub fn delete_loadable(&self, id: LoadableId) -> Result<bool> {
        Ok(self.inner.lock()?.tables.loadables.remove(&id).is_some())
    }

    /// All rows matching the natural key of a thread loadable. More than one
    /// match is a data-quality defect the caller has to resolve.
    pub fn find_loadables(
        &self,
        site_id: SiteId,
        mode: LoadableMode,
        board_code: &str,
        no: PostNo,
    ) -> Result<Vec<Loadable>> {
        let inner = self.inner.lock()?;
        Ok(inner
            .tables
            .loadables
            .values()
            .filter(|l| {
                l.site_id == site_id && l.mode == mode && l.board_code == board_code && l.no == no
            })
            .cloned()
            .collect())
    }

    pub fn loadables_for_site(&self, site_id: SiteId) -> Result<Vec<Loadable>> {
        let inner = self.inner.lock()?;
        Ok(inner
            .tables
            .loadables
            .values()
            .filter(|l| l.site_id == site_id)
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // Saved replies
    // ------------------------------------------------------------------

    pub fn insert_saved_reply(&self, mut reply: SavedReply) -> Result<SavedReply> {
        let mut inner = self.inner.lock()?;
        reply.id = inner.next_id;
        inner.next_id += 1;
        inner.tables.saved_replies.insert(reply.id, reply.clone());
        Ok(reply)
    }

    pub fn delete_saved_reply(&self, id: RowId) -> Result<bool> {
        Ok(self.inner.lock()?.tables.saved_replies.remove(&id).is_some())
    }

    pub fn all_saved_replies(&self) -> Result<Vec<SavedReply>> {
        Ok(self.inner.lock()?.tables.saved_replies.values().cloned().collect())
    }

    // ------------------------------------------------------------------
    // Post hides
    // ------------------------------------------------------------------

    pub fn insert_post_hide(&self, mut hide: PostHide) -> Result<PostHide> {
        let mut inner = self.inner.lock()?;
        hide.id = inner.next_id;
        inner.next_id += 1;
        inner.tables.post_hides.insert(hide.id, hide.clone());
        Ok(hide)
    }

    pub fn delete_post_hide(&self, site_id: SiteId, board_code: &str, no: PostNo) -> Result<u64> {
        let mut inner = self.inner.lock()?;
        let victims: Vec<RowId> = inner
            .tables
            .post_hides
            .values()
            .filter(|h| h.site_id == site_id && h.board_code == board_code && h.no == no)
            .map(|h| h.id)
            .collect();
        for id in &victims {
            inner.tables.post_hides.remove(id);
        }
        Ok(victims.len() as u64)
    }

    pub fn all_post_hides(&self) -> Result<Vec<PostHide>> {
        Ok(self.inner.lock()?.tables.post_hides.values().cloned().collect())
    }

    pub fn post_hides_in(
        &self,
        site_id: SiteId,
        board_code: &str,
        nos: &[PostNo],
    ) -> Result<Vec<PostHide>> {
        let inner = self.inner.lock()?;
        Ok(inner
            .tables
            .post_hides
            .values()
            .filter(|h| h.site_id == site_id && h.board_code == board_code && nos.contains(&h.no))
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn insert_history(&self, mut history: History) -> Result<History> {
        let mut inner = self.inner.lock()?;
        history.id = inner.next_id;
        inner.next_id += 1;
        inner.tables.history.insert(history.id, history.clone());
        Ok(history)
    }

    pub fn update_history(&self, history: &History) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if !inner.tables.history.contains_key(&history.id) {
            return Err(StoreError::RowNotFound("history", history.id));
        }
        inner.tables.history.insert(history.id, history.clone());
        Ok(())
    }

    pub fn delete_history(&self, id: RowId) -> Result<bool> {
        Ok(self.inner.lock()?.tables.history.remove(&id).is_some())
    }

    pub fn find_history_for_loadable(&self, loadable_id: LoadableId) -> Result<Option<History>> {
        let inner = self.inner.lock()?;
        Ok(inner
            .tables
            .history
            .values()
            .find(|h| h.loadable_id == loadable_id)
            .cloned())
    }

    pub fn all_history(&self) -> Result<Vec<History>> {
        Ok(self.inner.lock()?.tables.history.values().cloned().collect())
    }

    // ------------------------------------------------------------------
    // Pins
    // ------------------------------------------------------------------

    pub fn insert_pin(&self, mut pin: Pin) -> Result<Pin> {
        let mut inner = self.inner.lock()?;
        pin.id = inner.next_id;
        inner.next_id += 1;
        inner.tables.pins.insert(pin.id, pin.clone());
        Ok(pin)
    }

    pub fn update_pin(&self, pin: &Pin) -> Result<()> {
        let mut inner = self.inner.lock()?;
        if !inner.tables.pins.contains_key(&pin.id) {
            return Err(StoreError::RowNotFound("pin", pin.id));
        }
        inner.tables.pins.insert(pin.id, pin.clone());
        Ok(())
    }

    pub fn delete_pin(&self, id: RowId) -> Result<bool> {
        Ok(self.inner.lock()?.tables.pins.remove(&id).is_some())
    }

    pub fn all_pins(&self) -> Result<Vec<Pin>> {
        Ok(self.inner.lock()?.tables.pins.values().cloned().collect())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_increasing_ids() {
        let store = Store::new();

        let a = store
            .insert_saved_reply(SavedReply::new(0, "g", 1, ""))
            .unwrap();
        let b = store
            .insert_saved_reply(SavedReply::new(0, "g", 2, ""))
            .unwrap();

        assert!(a.id > 0);
        assert!(b.id > a.id);
        assert_eq!(store.row_count(TableKind::SavedReply).unwrap(), 2);
    }

    #[test]
    fn rollback_restores_pre_transaction_state() {
        let store = Store::new();
        store
            .insert_saved_reply(SavedReply::new(0, "g", 1, ""))
            .unwrap();

        store.begin().unwrap();
        store
            .insert_saved_reply(SavedReply::new(0, "g", 2, ""))
            .unwrap();
        store
            .insert_post_hide(PostHide::thread(0, "g", 3))
            .unwrap();
        store.rollback().unwrap();

        assert_eq!(store.row_count(TableKind::SavedReply).unwrap(), 1);
        assert_eq!(store.row_count(TableKind::PostHide).unwrap(), 0);
    }

    #[test]
    fn commit_keeps_writes() {
        let store = Store::new();

        store.begin().unwrap();
        store
            .insert_saved_reply(SavedReply::new(0, "g", 1, ""))
            .unwrap();
        store.commit().unwrap();

        assert_eq!(store.row_count(TableKind::SavedReply).unwrap(), 1);
    }

    #[test]
    fn nested_begin_is_rejected() {
        let store = Store::new();
        store.begin().unwrap();
        assert!(store.begin().is_err());
        store.rollback().unwrap();
    }

    #[test]
    fn delete_oldest_removes_lowest_ids() {
        let store = Store::new();
        for no in 0..10 {
            store
                .insert_post_hide(PostHide::thread(0, "g", no))
                .unwrap();
        }

        let removed = store.delete_oldest(TableKind::PostHide, 4).unwrap();
        assert_eq!(removed, 4);

        let left: Vec<i64> = store
            .all_post_hides()
            .unwrap()
            .iter()
            .map(|h| h.no)
            .collect();
        assert_eq!(left, vec![4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn ids_are_not_reused_after_rollback() {
        let store = Store::new();

        store.begin().unwrap();
        let a = store
            .insert_saved_reply(SavedReply::new(0, "g", 1, ""))
            .unwrap();
        store.rollback().unwrap();

        let b = store
            .insert_saved_reply(SavedReply::new(0, "g", 1, ""))
            .unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn find_loadables_matches_natural_key_only() {
        let store = Store::new();
        store
            .insert_loadable(Loadable::for_thread(0, "g", 100, "a"))
            .unwrap();
        store
            .insert_loadable(Loadable::for_thread(0, "a", 100, "b"))
            .unwrap();
        store
            .insert_loadable(Loadable::for_thread(1, "g", 100, "c"))
            .unwrap();

        let hits = store
            .find_loadables(0, LoadableMode::Thread, "g", 100)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "a");
    }
}
