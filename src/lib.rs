// ============================================================================
// chanstore
// ============================================================================
//
// Storage task-scheduling and read-cache core for an imageboard browser.
// Every persistence-backed feature (pins, loadables, hidden posts, saved
// replies, history) funnels through here: mutations are serialized onto one
// storage worker, wrapped in transactions, and mirrored into per-entity
// in-memory caches so hot reads never block on storage.

pub mod cache;
pub mod core;
pub mod manager;
pub mod model;
pub mod scheduler;
pub mod storage;
pub mod transaction;
pub mod trim;

// Re-export main types for convenience
pub use crate::core::{Result, StoreError};
pub use cache::EntityCache;
pub use manager::{
    HideManager, HistoryManager, LoadState, LoadableManager, PinManager, SavedReplyManager,
    StoreManager,
};
pub use scheduler::{
    CallbackQueue, InlineDispatcher, OriginDispatcher, QueueDispatcher, StorageTaskScheduler, Task,
};
pub use storage::{Store, TableKind};
pub use transaction::TransactionRunner;
pub use trim::TrimPolicy;
