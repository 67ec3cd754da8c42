use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{LoadableId, PostNo, SiteId};

/// What a loadable points at: a board index or a single thread.
///
/// Only thread loadables are persisted; catalog loadables are transient
/// navigation targets and never hit storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadableMode {
    Catalog,
    Thread,
}

/// Something that can be loaded and displayed: a (site, board, thread) triple
/// plus presentation state the UI wants restored between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loadable {
    /// Generated row id; zero until persisted.
    pub id: LoadableId,
    pub site_id: SiteId,
    pub mode: LoadableMode,
    pub board_code: String,
    /// Thread number; zero for catalogs.
    pub no: PostNo,
    pub title: String,
    /// Scroll position to restore when reopening the thread.
    pub list_view_index: i32,
    pub last_load_date: DateTime<Utc>,
    /// True when the cached copy has changes not yet written back.
    /// Transient; not persisted.
    #[serde(skip)]
    pub dirty: bool,
}

/// Natural key of a thread loadable. Two in-memory `Loadable` instances with
/// the same key represent the same logical entity even when only one of them
/// carries a row id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadableKey {
    pub site_id: SiteId,
    pub board_code: String,
    pub no: PostNo,
}

impl Loadable {
    pub fn for_catalog(site_id: SiteId, board_code: &str) -> Self {
        Self {
            id: 0,
            site_id,
            mode: LoadableMode::Catalog,
            board_code: board_code.to_string(),
            no: 0,
            title: String::new(),
            list_view_index: 0,
            last_load_date: Utc::now(),
            dirty: false,
        }
    }

    pub fn for_thread(site_id: SiteId, board_code: &str, no: PostNo, title: &str) -> Self {
        Self {
            id: 0,
            site_id,
            mode: LoadableMode::Thread,
            board_code: board_code.to_string(),
            no,
            title: title.to_string(),
            list_view_index: 0,
            last_load_date: Utc::now(),
            dirty: false,
        }
    }

    pub fn is_thread_mode(&self) -> bool {
        self.mode == LoadableMode::Thread
    }

    pub fn is_catalog_mode(&self) -> bool {
        self.mode == LoadableMode::Catalog
    }

    pub fn key(&self) -> LoadableKey {
        LoadableKey {
            site_id: self.site_id,
            board_code: self.board_code.clone(),
            no: self.no,
        }
    }
}
