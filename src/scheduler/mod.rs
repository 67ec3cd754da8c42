// ============================================================================
// Storage task scheduler
// ============================================================================
//
// All storage work funnels through one worker thread draining a FIFO queue.
// That single thread is the serialization point for the store: exactly one
// task touches it at a time, which is what keeps transactions from
// interleaving. Callers either block for a result (`run_task`), fire and
// forget (`run_task_async`), or get a completion callback posted back to
// their origin context (`run_task_async_with`).

mod dispatcher;
mod task;

pub use dispatcher::{CallbackQueue, InlineDispatcher, OriginDispatcher, QueueDispatcher};
pub use task::Task;

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use tracing::error;

use crate::core::{Result, StoreError};
use crate::transaction::TransactionRunner;

type Job = Box<dyn FnOnce() + Send>;

pub struct StorageTaskScheduler {
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    runner: Arc<TransactionRunner>,
    dispatcher: Arc<dyn OriginDispatcher>,
}

impl StorageTaskScheduler {
    pub fn new(runner: Arc<TransactionRunner>, dispatcher: Arc<dyn OriginDispatcher>) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();

        let worker = thread::Builder::new()
            .name("storage-worker".into())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            })
            .expect("failed to spawn storage worker");

        let worker_id = worker.thread().id();

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            worker_id,
            runner,
            dispatcher,
        }
    }

    /// True when the calling thread is the storage worker itself.
    pub fn on_storage_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Execute `task` and block until it completes, returning its result.
    ///
    /// Queues behind previously submitted async tasks. When called from a
    /// task already running on the storage worker the task executes inline
    /// instead of queuing, at any nesting depth, so nested transactional
    /// work cannot deadlock the worker against itself.
    pub fn run_task<T>(&self, task: Task<T>) -> Result<T>
    where
        T: Send + 'static,
    {
        if self.on_storage_thread() {
            return self.runner.run_in_transaction(|| task.run());
        }

        let (result_tx, result_rx) = mpsc::channel();
        let runner = Arc::clone(&self.runner);
        self.enqueue(Box::new(move || {
            let _ = result_tx.send(runner.run_in_transaction(|| task.run()));
        }))?;

        result_rx.recv().map_err(|_| {
            StoreError::SchedulerUnavailable("storage worker died before replying".into())
        })?
    }

    /// Enqueue `task` without waiting for it.
    ///
    /// A failing fire-and-forget task means storage state can no longer be
    /// trusted; it is logged and then panics the worker rather than being
    /// silently dropped.
    pub fn run_task_async<T>(&self, task: Task<T>) -> Result<()>
    where
        T: Send + 'static,
    {
        let runner = Arc::clone(&self.runner);
        self.enqueue(Box::new(move || {
            if let Err(e) = runner.run_in_transaction(|| task.run()) {
                error!("unsupervised storage task failed: {e}");
                panic!("unsupervised storage task failed: {e}");
            }
        }))
    }

    /// Enqueue `task`; once it completes, `on_complete` is handed to the
    /// origin dispatcher with the task's value. Failures follow the same
    /// terminal rule as [`run_task_async`].
    pub fn run_task_async_with<T, F>(&self, task: Task<T>, on_complete: F) -> Result<()>
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let runner = Arc::clone(&self.runner);
        let dispatcher = Arc::clone(&self.dispatcher);
        self.enqueue(Box::new(move || {
            match runner.run_in_transaction(|| task.run()) {
                Ok(value) => dispatcher.post(Box::new(move || on_complete(value))),
                Err(e) => {
                    error!("unsupervised storage task failed: {e}");
                    panic!("unsupervised storage task failed: {e}");
                }
            }
        }))
    }

    fn enqueue(&self, job: Job) -> Result<()> {
        let sender = self.sender.lock()?;
        let sender = sender.as_ref().ok_or_else(|| {
            StoreError::SchedulerUnavailable("scheduler is shut down".into())
        })?;
        sender.send(job).map_err(|_| {
            StoreError::SchedulerUnavailable("storage worker is gone".into())
        })
    }

    /// Close the queue and wait for in-flight work to finish.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(handle) = worker.take() {
                if handle.join().is_err() {
                    error!("storage worker terminated by a failed task");
                }
            }
        }
    }
}

impl Drop for StorageTaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SavedReply;
    use crate::storage::Store;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn scheduler_with_store() -> (Arc<StorageTaskScheduler>, Arc<Store>) {
        let store = Arc::new(Store::new());
        let runner = Arc::new(TransactionRunner::new(Arc::clone(&store)));
        let scheduler = Arc::new(StorageTaskScheduler::new(runner, Arc::new(InlineDispatcher)));
        (scheduler, store)
    }

    #[test]
    fn sync_task_returns_result() {
        let (scheduler, _store) = scheduler_with_store();

        let value = scheduler.run_task(Task::new(|| Ok(41 + 1))).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn sync_task_propagates_errors() {
        let (scheduler, _store) = scheduler_with_store();

        let result: Result<()> = scheduler.run_task(Task::new(|| {
            Err(StoreError::Execution("deliberate".into()))
        }));
        assert!(matches!(result, Err(StoreError::Execution(_))));
    }

    #[test]
    fn async_tasks_run_in_submission_order() {
        let (scheduler, _store) = scheduler_with_store();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let seen = Arc::clone(&seen);
            scheduler
                .run_task_async(Task::new(move || {
                    seen.lock().unwrap().push(i);
                    Ok(())
                }))
                .unwrap();
        }

        // A sync task queues behind everything already submitted.
        scheduler.run_task(Task::new(|| Ok(()))).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn reentrant_run_task_executes_inline() {
        let (scheduler, _store) = scheduler_with_store();

        fn nest(scheduler: &Arc<StorageTaskScheduler>, depth: u32) -> Result<u32> {
            if depth == 0 {
                return Ok(0);
            }
            let inner = Arc::clone(scheduler);
            scheduler.run_task(Task::new(move || {
                assert!(inner.on_storage_thread());
                Ok(nest(&inner, depth - 1)? + 1)
            }))
        }

        assert_eq!(nest(&scheduler, 5).unwrap(), 5);
    }

    #[test]
    fn callback_is_posted_to_origin_queue() {
        let store = Arc::new(Store::new());
        let runner = Arc::new(TransactionRunner::new(Arc::clone(&store)));
        let (dispatcher, queue) = QueueDispatcher::channel();
        let scheduler = StorageTaskScheduler::new(runner, Arc::new(dispatcher));

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        scheduler
            .run_task_async_with(Task::new(|| Ok(7)), move |value| {
                assert_eq!(value, 7);
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(queue.run_one(Duration::from_secs(5)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tasks_are_wrapped_in_transactions() {
        let (scheduler, store) = scheduler_with_store();

        let inner_store = Arc::clone(&store);
        let result: Result<()> = scheduler.run_task(Task::new(move || {
            inner_store.insert_saved_reply(SavedReply::new(0, "g", 1, ""))?;
            inner_store.insert_saved_reply(SavedReply::new(0, "g", 2, ""))?;
            Err(StoreError::Execution("abort both writes".into()))
        }));

        assert!(result.is_err());
        assert_eq!(
            store.row_count(crate::storage::TableKind::SavedReply).unwrap(),
            0
        );
    }

    #[test]
    fn concurrent_async_submissions_serialize() {
        let (scheduler, store) = scheduler_with_store();

        let mut producers = Vec::new();
        for t in 0..8 {
            let scheduler = Arc::clone(&scheduler);
            let store = Arc::clone(&store);
            producers.push(thread::spawn(move || {
                for i in 0..25 {
                    let store = Arc::clone(&store);
                    scheduler
                        .run_task_async(Task::new(move || {
                            store.insert_saved_reply(SavedReply::new(
                                0,
                                "g",
                                (t * 100 + i) as i64,
                                "",
                            ))?;
                            Ok(())
                        }))
                        .unwrap();
                }
            }));
        }
        for p in producers {
            p.join().unwrap();
        }

        // Queue drained once this sync task completes.
        scheduler.run_task(Task::new(|| Ok(()))).unwrap();
        assert_eq!(
            store.row_count(crate::storage::TableKind::SavedReply).unwrap(),
            200
        );
    }

    #[test]
    fn submissions_after_shutdown_fail_cleanly() {
        let (scheduler, _store) = scheduler_with_store();
        scheduler.shutdown();

        let result = scheduler.run_task(Task::new(|| Ok(())));
        assert!(matches!(result, Err(StoreError::SchedulerUnavailable(_))));
    }
}
