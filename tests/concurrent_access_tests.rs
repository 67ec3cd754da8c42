use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chanstore::model::{PostHide, SavedReply};
use chanstore::{
    InlineDispatcher, QueueDispatcher, Store, StorageTaskScheduler, StoreError, StoreManager,
    TableKind, Task, TransactionRunner,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn raw_stack() -> (Arc<StorageTaskScheduler>, Arc<Store>) {
    init_tracing();
    let store = Arc::new(Store::new());
    let runner = Arc::new(TransactionRunner::new(Arc::clone(&store)));
    let scheduler = Arc::new(StorageTaskScheduler::new(runner, Arc::new(InlineDispatcher)));
    (scheduler, store)
}

#[test]
fn concurrent_saves_from_many_threads_all_land() {
    init_tracing();
    let manager = Arc::new(StoreManager::headless());
    manager.initialize_and_trim().unwrap();

    let mut workers = Vec::new();
    for t in 0..8i64 {
        let manager = Arc::clone(&manager);
        workers.push(thread::spawn(move || {
            for i in 0..20i64 {
                manager
                    .saved_replies()
                    .save_reply(SavedReply::new(0, "g", t * 1000 + i, ""))
                    .unwrap();
            }
        }));
    }
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(manager.saved_replies().cached_count(), 160);
    assert_eq!(
        manager.summary().unwrap()["savedreply"],
        serde_json::json!(160)
    );
}

#[test]
fn concurrent_hides_and_reads_do_not_corrupt_state() {
    init_tracing();
    let manager = Arc::new(StoreManager::headless());
    manager.initialize_and_trim().unwrap();

    let writer = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            for no in 0..100i64 {
                manager.hides().hide(PostHide::thread(0, "g", no)).unwrap();
            }
        })
    };
    let reader = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            // Reads may see any completed prefix of the writes, never an error.
            for no in 0..100i64 {
                let _ = manager.hides().is_hidden(0, "g", no);
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();

    assert_eq!(manager.hides().cached_count(), 100);
    for no in 0..100i64 {
        assert!(manager.hides().is_hidden(0, "g", no));
    }
}

#[test]
fn interleaved_async_tasks_match_sequential_outcome() {
    let (scheduler, store) = raw_stack();

    // Two logical streams submitted from racing threads; each task reads the
    // current count and writes a row derived from it. Serialized execution
    // means no lost updates: exactly 50 rows at the end.
    let mut producers = Vec::new();
    for _ in 0..2 {
        let scheduler = Arc::clone(&scheduler);
        let store = Arc::clone(&store);
        producers.push(thread::spawn(move || {
            for _ in 0..25 {
                let store = Arc::clone(&store);
                scheduler
                    .run_task_async(Task::new(move || {
                        let next = store.row_count(TableKind::SavedReply)? as i64;
                        store.insert_saved_reply(SavedReply::new(0, "g", next, ""))?;
                        Ok(())
                    }))
                    .unwrap();
            }
        }));
    }
    for p in producers {
        p.join().unwrap();
    }

    scheduler.run_task(Task::new(|| Ok(()))).unwrap();
    assert_eq!(store.row_count(TableKind::SavedReply).unwrap(), 50);

    // Derived nos form the exact sequence 0..50: proof no task observed a
    // partial or stale count.
    let mut nos: Vec<i64> = store
        .all_saved_replies()
        .unwrap()
        .iter()
        .map(|r| r.no)
        .collect();
    nos.sort();
    assert_eq!(nos, (0..50).collect::<Vec<_>>());
}

#[test]
fn failed_task_rolls_back_both_writes() {
    let (scheduler, store) = raw_stack();

    let task_store = Arc::clone(&store);
    let result: chanstore::Result<()> = scheduler.run_task(Task::new(move || {
        task_store.insert_saved_reply(SavedReply::new(0, "g", 1, ""))?;
        task_store.insert_post_hide(PostHide::thread(0, "g", 2))?;
        Err(StoreError::Execution("fail after two writes".into()))
    }));

    assert!(result.is_err());
    assert_eq!(store.row_count(TableKind::SavedReply).unwrap(), 0);
    assert_eq!(store.row_count(TableKind::PostHide).unwrap(), 0);
}

#[test]
fn reentrant_submission_inside_task_does_not_deadlock() {
    let (scheduler, store) = raw_stack();

    let outer_scheduler = Arc::clone(&scheduler);
    let outer_store = Arc::clone(&store);
    let total = scheduler
        .run_task(Task::new(move || {
            outer_store.insert_saved_reply(SavedReply::new(0, "g", 1, ""))?;

            let inner_store = Arc::clone(&outer_store);
            let inner = outer_scheduler.run_task(Task::new(move || {
                inner_store.insert_saved_reply(SavedReply::new(0, "g", 2, ""))?;
                inner_store.row_count(TableKind::SavedReply)
            }))?;
            Ok(inner)
        }))
        .unwrap();

    assert_eq!(total, 2);
    assert_eq!(store.row_count(TableKind::SavedReply).unwrap(), 2);
}

#[test]
fn callbacks_arrive_on_the_origin_queue_in_order() {
    init_tracing();
    let (dispatcher, callbacks) = QueueDispatcher::channel();
    let store = Arc::new(Store::new());
    let runner = Arc::new(TransactionRunner::new(Arc::clone(&store)));
    let scheduler = StorageTaskScheduler::new(runner, Arc::new(dispatcher));

    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    for i in 0..5 {
        let order = Arc::clone(&order);
        scheduler
            .run_task_async_with(Task::new(move || Ok(i)), move |value| {
                order.lock().unwrap().push(value);
            })
            .unwrap();
    }

    let mut ran = 0;
    while ran < 5 {
        assert!(callbacks.run_one(Duration::from_secs(5)), "callback lost");
        ran += 1;
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn fire_and_forget_counts_complete_before_next_sync_task() {
    let (scheduler, _store) = raw_stack();
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..50 {
        let done = Arc::clone(&done);
        scheduler
            .run_task_async(Task::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
    }

    // Sync submission queues behind all of them.
    scheduler.run_task(Task::new(|| Ok(()))).unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 50);
}
