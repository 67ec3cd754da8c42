use serde::{Deserialize, Serialize};

use crate::core::{PostNo, RowId, SiteId};

/// A reply the user posted themselves, kept so their own posts can be
/// highlighted. Read once per rendered post, so lookups go through the
/// in-memory cache only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedReply {
    pub id: RowId,
    pub site_id: SiteId,
    pub board_code: String,
    pub no: PostNo,
    /// Deletion password the site handed back on post.
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SavedReplyKey {
    pub board_code: String,
    pub no: PostNo,
}

impl SavedReply {
    pub fn new(site_id: SiteId, board_code: &str, no: PostNo, password: &str) -> Self {
        Self {
            id: 0,
            site_id,
            board_code: board_code.to_string(),
            no,
            password: password.to_string(),
        }
    }

    pub fn key(&self) -> SavedReplyKey {
        SavedReplyKey {
            board_code: self.board_code.clone(),
            no: self.no,
        }
    }
}
