use crate::core::Result;

/// A unit of storage work: a side-effecting closure producing a typed result.
///
/// Built by entity managers, executed exactly once on the storage worker,
/// always inside a transaction. Not retried.
pub struct Task<T> {
    op: Box<dyn FnOnce() -> Result<T> + Send + 'static>,
}

impl<T> Task<T> {
    pub fn new<F>(op: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Self { op: Box::new(op) }
    }

    pub(crate) fn run(self) -> Result<T> {
        (self.op)()
    }
}
