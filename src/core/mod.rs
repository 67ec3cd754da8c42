pub mod error;
pub mod types;

pub use error::{Result, StoreError};
pub use types::{LoadableId, PostNo, RowId, SiteId};
