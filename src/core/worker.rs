//! Bounded-queue worker giving writers asynchronous delivery
//!
//! A `Worker` owns one consumer thread that drains a bounded channel in FIFO
//! order and hands every item to a processing callback. Producers block when
//! the queue is full. Closing is best-effort: the consumer drains what is
//! already queued, and the caller waits at most the given timeout for it.

use super::error::{LoggerError, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Queue capacity used by the asynchronous writers.
pub const DEFAULT_WORKER_CAPACITY: usize = 100;

/// How long writers wait for their worker to drain on close.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Clonable producer side of a [`Worker`].
pub struct WorkerSender<T> {
    sender: Sender<T>,
    open: Arc<AtomicBool>,
}

impl<T> Clone for WorkerSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            open: Arc::clone(&self.open),
        }
    }
}

impl<T> WorkerSender<T> {
    /// Queue an item, blocking while the queue is full.
    ///
    /// Returns `false` when the worker is closed; the item is dropped.
    pub fn send(&self, item: T) -> bool {
        if !self.is_open() {
            return false;
        }
        self.sender.send(item).is_ok()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Number of queued items not yet picked up by the consumer.
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

/// Bounded queue with a single consumer thread.
///
/// # Example
///
/// ```
/// use rust_logging_core::core::Worker;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// let worker = Worker::new("doc-worker", 8, move |n: usize| {
///     counter.fetch_add(n, Ordering::SeqCst);
/// })
/// .expect("spawn worker");
///
/// worker.enqueue(2);
/// worker.enqueue(3);
/// assert!(worker.close(Duration::from_secs(1)));
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
/// ```
pub struct Worker<T> {
    sender: WorkerSender<T>,
    shutdown: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    name: String,
}

impl<T: Send + 'static> Worker<T> {
    /// Spawn the consumer thread.
    pub fn new<F>(name: impl Into<String>, capacity: usize, mut process: F) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        if capacity == 0 {
            return Err(LoggerError::config("worker", "queue capacity must be at least 1"));
        }

        let name = name.into();
        let (sender, receiver) = bounded::<T>(capacity);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || consume(&thread_name, receiver, shutdown_rx, &mut process))
            .map_err(|e| LoggerError::io_operation("spawning worker thread", name.clone(), e))?;

        Ok(Self {
            sender: WorkerSender {
                sender,
                open: Arc::new(AtomicBool::new(true)),
            },
            shutdown: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
            name,
        })
    }
}

impl<T> Worker<T> {
    /// Queue an item, blocking while the queue is full. Ignored after close.
    pub fn enqueue(&self, item: T) -> bool {
        self.sender.send(item)
    }

    /// A producer handle that can outlive borrows of the worker.
    pub fn sender(&self) -> WorkerSender<T> {
        self.sender.clone()
    }

    pub fn is_open(&self) -> bool {
        self.sender.is_open()
    }

    pub fn pending(&self) -> usize {
        self.sender.pending()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop accepting items and wait up to `timeout` for the consumer to drain.
    ///
    /// Returns `true` when the consumer finished in time. Items still queued
    /// after the timeout are lost. Calling it again is a no-op returning `true`.
    pub fn close(&self, timeout: Duration) -> bool {
        self.sender.open.store(false, Ordering::Release);
        drop(self.shutdown.lock().take());

        let handle = match self.handle.lock().take() {
            Some(handle) => handle,
            None => return true,
        };

        // Closing from inside the callback cannot wait for itself
        if handle.thread().id() == thread::current().id() {
            return true;
        }

        join_with_timeout(handle, timeout, &self.name)
    }
}

impl<T> Drop for Worker<T> {
    fn drop(&mut self) {
        self.close(DEFAULT_CLOSE_TIMEOUT);
    }
}

fn consume<T, F>(name: &str, receiver: Receiver<T>, shutdown: Receiver<()>, process: &mut F)
where
    F: FnMut(T),
{
    loop {
        select! {
            recv(receiver) -> item => match item {
                Ok(item) => process_isolated(name, process, item),
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                for item in receiver.try_iter() {
                    process_isolated(name, process, item);
                }
                break;
            }
        }
    }
}

fn process_isolated<T, F>(name: &str, process: &mut F, item: T)
where
    F: FnMut(T),
{
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| process(item)));
    if let Err(panic_info) = result {
        eprintln!(
            "[LOGGER CRITICAL] Worker '{}' callback panicked: {}. The worker keeps running.",
            name,
            panic_message(panic_info.as_ref())
        );
    }
}

/// Extract the message of a caught panic.
pub(crate) fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Join `handle`, giving up after `timeout`.
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, name: &str) -> bool {
    let start = Instant::now();

    loop {
        if handle.is_finished() {
            if let Err(e) = handle.join() {
                eprintln!(
                    "[LOGGER ERROR] Thread '{}' panicked during shutdown: {}",
                    name,
                    panic_message(e.as_ref())
                );
                return false;
            }
            return true;
        }

        if start.elapsed() >= timeout {
            eprintln!(
                "[LOGGER WARNING] Thread '{}' did not finish within {:?}. Some logs may be lost.",
                name, timeout
            );
            return false;
        }

        thread::sleep(Duration::from_millis(10));
    }
}
