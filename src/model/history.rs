use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{LoadableId, RowId};

/// A visit to a thread. One row per loadable; revisiting touches the date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub id: RowId,
    pub loadable_id: LoadableId,
    pub date: DateTime<Utc>,
}

impl History {
    pub fn new(loadable_id: LoadableId) -> Self {
        Self {
            id: 0,
            loadable_id,
            date: Utc::now(),
        }
    }
}
