use serde::{Deserialize, Serialize};

use crate::core::{LoadableId, RowId};

/// A bookmarked thread. Owns a persisted loadable by id; the watcher state
/// tracks how many new posts arrived since the user last opened it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: RowId,
    pub loadable_id: LoadableId,
    pub watching: bool,
    pub watch_last_count: i32,
    pub watch_new_count: i32,
    pub order: i32,
}

impl Pin {
    pub fn new(loadable_id: LoadableId) -> Self {
        Self {
            id: 0,
            loadable_id,
            watching: true,
            watch_last_count: -1,
            watch_new_count: -1,
            order: -1,
        }
    }
}
