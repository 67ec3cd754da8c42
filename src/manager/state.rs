/// Lifecycle of a manager's read cache.
///
/// Only `Ready` managers serve cache reads with full confidence; operations
/// arriving earlier trigger the load themselves. The only way back to
/// `Unloaded` is an explicit storage reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
}
