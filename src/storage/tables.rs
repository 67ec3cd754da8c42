use im::OrdMap;

use crate::core::RowId;
use crate::model::{History, Loadable, Pin, PostHide, SavedReply};

/// The tables managed by the store. Used for generic operations (row counts,
/// trims, clears) where the caller does not care about the row type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Loadable,
    Pin,
    SavedReply,
    PostHide,
    History,
}

impl TableKind {
    pub const ALL: [TableKind; 5] = [
        TableKind::Loadable,
        TableKind::Pin,
        TableKind::SavedReply,
        TableKind::PostHide,
        TableKind::History,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TableKind::Loadable => "loadable",
            TableKind::Pin => "pin",
            TableKind::SavedReply => "savedreply",
            TableKind::PostHide => "posthide",
            TableKind::History => "history",
        }
    }
}

/// Row storage, one ordered map per table, keyed by generated row id.
///
/// Backed by `im::OrdMap` so a full-table snapshot is an O(1) structural
/// clone; the transaction layer relies on that to make `begin` cheap.
/// Ascending key order doubles as insertion order, which is what the trim
/// policy's "oldest rows first" deletion walks.
#[derive(Clone, Default)]
pub struct Tables {
    pub loadables: OrdMap<RowId, Loadable>,
    pub pins: OrdMap<RowId, Pin>,
    pub saved_replies: OrdMap<RowId, SavedReply>,
    pub post_hides: OrdMap<RowId, PostHide>,
    pub history: OrdMap<RowId, History>,
}

impl Tables {
    pub fn row_count(&self, kind: TableKind) -> u64 {
        let len = match kind {
            TableKind::Loadable => self.loadables.len(),
            TableKind::Pin => self.pins.len(),
            TableKind::SavedReply => self.saved_replies.len(),
            TableKind::PostHide => self.post_hides.len(),
            TableKind::History => self.history.len(),
        };
        len as u64
    }

    /// Delete up to `n` rows with the lowest ids. Returns how many went.
    pub fn delete_oldest(&mut self, kind: TableKind, n: u64) -> u64 {
        fn drop_first<T: Clone>(map: &mut OrdMap<RowId, T>, n: u64) -> u64 {
            let victims: Vec<RowId> = map.keys().take(n as usize).copied().collect();
            for id in &victims {
                map.remove(id);
            }
            victims.len() as u64
        }

        match kind {
            TableKind::Loadable => drop_first(&mut self.loadables, n),
            TableKind::Pin => drop_first(&mut self.pins, n),
            TableKind::SavedReply => drop_first(&mut self.saved_replies, n),
            TableKind::PostHide => drop_first(&mut self.post_hides, n),
            TableKind::History => drop_first(&mut self.history, n),
        }
    }

    pub fn clear(&mut self, kind: TableKind) {
        match kind {
            TableKind::Loadable => self.loadables.clear(),
            TableKind::Pin => self.pins.clear(),
            TableKind::SavedReply => self.saved_replies.clear(),
            TableKind::PostHide => self.post_hides.clear(),
            TableKind::History => self.history.clear(),
        }
    }
}
