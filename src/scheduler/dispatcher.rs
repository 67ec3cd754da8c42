use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

/// Where async completion callbacks run.
///
/// In the application this posts to the UI main loop; the scheduler itself
/// has no dependency on any particular loop primitive.
pub trait OriginDispatcher: Send + Sync {
    fn post(&self, callback: Box<dyn FnOnce() + Send>);
}

/// Runs callbacks immediately on the storage worker. For headless use where
/// no UI loop exists and callback latency does not matter.
pub struct InlineDispatcher;

impl OriginDispatcher for InlineDispatcher {
    fn post(&self, callback: Box<dyn FnOnce() + Send>) {
        callback();
    }
}

/// Queues callbacks for some owning thread to drain, emulating a main loop.
pub struct QueueDispatcher {
    sender: Mutex<Sender<Box<dyn FnOnce() + Send>>>,
}

/// Receiving half of a [`QueueDispatcher`]; the owning thread pumps it.
pub struct CallbackQueue {
    receiver: Receiver<Box<dyn FnOnce() + Send>>,
}

impl QueueDispatcher {
    pub fn channel() -> (QueueDispatcher, CallbackQueue) {
        let (sender, receiver) = mpsc::channel();
        (
            QueueDispatcher {
                sender: Mutex::new(sender),
            },
            CallbackQueue { receiver },
        )
    }
}

impl OriginDispatcher for QueueDispatcher {
    fn post(&self, callback: Box<dyn FnOnce() + Send>) {
        if let Ok(sender) = self.sender.lock() {
            // Receiver gone means the origin loop shut down; late callbacks
            // are dropped, matching upstream teardown behavior.
            let _ = sender.send(callback);
        }
    }
}

impl CallbackQueue {
    /// Run every callback currently queued. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.receiver.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }

    /// Block up to `timeout` for one callback and run it.
    pub fn run_one(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(callback) => {
                callback();
                true
            }
            Err(_) => false,
        }
    }
}
