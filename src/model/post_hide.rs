use serde::{Deserialize, Serialize};

use crate::core::{PostNo, RowId, SiteId};

/// A post or thread the user hid. `whole_thread` hides the thread from the
/// catalog; `hide` distinguishes "collapse to stub" from "remove entirely".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostHide {
    pub id: RowId,
    pub site_id: SiteId,
    pub board_code: String,
    pub no: PostNo,
    pub whole_thread: bool,
    pub hide: bool,
    pub hide_replies: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostHideKey {
    pub site_id: SiteId,
    pub board_code: String,
    pub no: PostNo,
}

impl PostHide {
    pub fn thread(site_id: SiteId, board_code: &str, no: PostNo) -> Self {
        Self {
            id: 0,
            site_id,
            board_code: board_code.to_string(),
            no,
            whole_thread: true,
            hide: true,
            hide_replies: false,
        }
    }

    pub fn post(site_id: SiteId, board_code: &str, no: PostNo, hide_replies: bool) -> Self {
        Self {
            id: 0,
            site_id,
            board_code: board_code.to_string(),
            no,
            whole_thread: false,
            hide: true,
            hide_replies,
        }
    }

    pub fn key(&self) -> PostHideKey {
        PostHideKey {
            site_id: self.site_id,
            board_code: self.board_code.clone(),
            no: self.no,
        }
    }
}
