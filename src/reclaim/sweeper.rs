//! Background worker that runs reclamation cleanups.
//!
//! One [`Sweeper`] owns one thread and one unbounded MPSC queue. Any number of
//! caches and canonical sets hold cloned [`SweeperHandle`]s and push cleanup
//! jobs onto the queue; the thread runs them one at a time, in queue order.
//!
//! ## Failure isolation
//!
//! A job that returns [`CleanupError`] is logged at `warn`; a job that panics
//! is caught and logged at `error`. Either way the worker moves on to the next
//! job. An empty poll is not an error: the worker simply waits again.
//!
//! ## Lifecycle
//!
//! The worker starts in [`Sweeper::start`] and runs until [`Sweeper::stop`] (or
//! drop). Stopping drains whatever was queued before the stop request, waiting
//! at most [`SweeperConfig::stop_grace`]; if the grace period runs out the
//! thread is left to finish detached. Further `stop` calls are no-ops.
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//! use refcache::reclaim::Sweeper;
//!
//! let sweeper = Sweeper::start().unwrap();
//! let handle = sweeper.handle();
//! assert!(handle.enqueue(Box::new(|| Ok(()))));
//! assert!(handle.sync(Duration::from_secs(1)));
//!
//! assert!(sweeper.stop());
//! assert!(!handle.enqueue(Box::new(|| Ok(()))));
//! ```

use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::CleanupError;

/// A cleanup job run on the sweeper thread.
pub type Cleanup = Box<dyn FnOnce() -> Result<(), CleanupError> + Send + 'static>;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

enum Message {
    Cleanup(Cleanup),
    Sync(Sender<()>),
    Stop,
}

/// Sweeper thread configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Name given to the worker thread.
    pub thread_name: String,
    /// How long the worker blocks on an empty queue before polling again.
    /// Clamped to at least 1 ms.
    pub poll_interval: Duration,
    /// How long [`Sweeper::stop`] waits for queued cleanups to finish.
    pub stop_grace: Duration,
}

impl Default for SweeperConfig {
    /// Defaults:
    /// - `thread_name`: `"refcache-sweeper"`
    /// - `poll_interval`: 50 ms
    /// - `stop_grace`: 1 s
    fn default() -> Self {
        Self {
            thread_name: String::from("refcache-sweeper"),
            poll_interval: Duration::from_millis(50),
            stop_grace: Duration::from_secs(1),
        }
    }
}

/// Producer side of the sweeper queue. Cheap to clone.
#[derive(Clone)]
pub struct SweeperHandle {
    tx: Sender<Message>,
    stopped: Arc<AtomicBool>,
}

impl SweeperHandle {
    /// Queues `cleanup`. Returns `false` if the sweeper has been stopped.
    pub fn enqueue(&self, cleanup: Cleanup) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(Message::Cleanup(cleanup)).is_ok()
    }

    /// Waits until every cleanup queued before this call has run.
    ///
    /// Returns `false` on timeout or if the sweeper is stopped.
    pub fn sync(&self, timeout: Duration) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Message::Sync(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Returns `true` once [`Sweeper::stop`] has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl fmt::Debug for SweeperHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweeperHandle")
            .field("queued", &self.tx.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

struct Worker {
    thread: JoinHandle<()>,
    done: Receiver<()>,
}

/// Owner of the reclamation worker thread.
pub struct Sweeper {
    handle: SweeperHandle,
    worker: Mutex<Option<Worker>>,
    stop_grace: Duration,
}

impl Sweeper {
    /// Starts a sweeper with [`SweeperConfig::default`].
    pub fn start() -> io::Result<Self> {
        Self::with_config(SweeperConfig::default())
    }

    /// Starts a sweeper thread configured by `config`.
    pub fn with_config(config: SweeperConfig) -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let poll_interval = config.poll_interval.max(MIN_POLL_INTERVAL);

        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                run(&rx, poll_interval);
                let _ = done_tx.send(());
            })?;
        tracing::debug!(thread = %config.thread_name, "sweeper started");

        Ok(Self {
            handle: SweeperHandle {
                tx,
                stopped: Arc::new(AtomicBool::new(false)),
            },
            worker: Mutex::new(Some(Worker {
                thread,
                done: done_rx,
            })),
            stop_grace: config.stop_grace,
        })
    }

    /// Returns a producer handle for caches and canonical sets.
    pub fn handle(&self) -> SweeperHandle {
        self.handle.clone()
    }

    /// Returns `true` while the worker has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Stops the worker after it drains the cleanups queued so far.
    ///
    /// Returns `true` if the worker exited within the grace period (or was
    /// already stopped), `false` if it was left running detached.
    pub fn stop(&self) -> bool {
        let Some(worker) = self.worker.lock().take() else {
            return true;
        };
        self.handle.stopped.store(true, Ordering::Release);
        let _ = self.handle.tx.send(Message::Stop);

        match worker.done.recv_timeout(self.stop_grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.thread.join().is_err() {
                    tracing::error!("sweeper thread panicked during shutdown");
                }
                tracing::debug!("sweeper stopped");
                true
            },
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    grace = ?self.stop_grace,
                    pending = self.handle.tx.len(),
                    "sweeper did not finish within grace period, detaching"
                );
                false
            },
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sweeper")
            .field("running", &self.is_running())
            .field("queued", &self.handle.tx.len())
            .finish()
    }
}

fn run(rx: &Receiver<Message>, poll_interval: Duration) {
    loop {
        match rx.recv_timeout(poll_interval) {
            Ok(Message::Cleanup(job)) => run_cleanup(job),
            Ok(Message::Sync(ack)) => {
                let _ = ack.send(());
            },
            Ok(Message::Stop) => {
                // Jobs queued before the stop request still run; late producers
                // already see the stopped flag.
                for message in rx.try_iter() {
                    match message {
                        Message::Cleanup(job) => run_cleanup(job),
                        Message::Sync(ack) => {
                            let _ = ack.send(());
                        },
                        Message::Stop => {},
                    }
                }
                return;
            },
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn run_cleanup(job: Cleanup) {
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => {},
        Ok(Err(err)) => tracing::warn!(error = %err, "reclamation cleanup failed"),
        Err(payload) => {
            tracing::error!(panic = panic_message(&*payload), "reclamation cleanup panicked")
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting_job(counter: &Arc<AtomicUsize>) -> Cleanup {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn runs_jobs_in_order() {
        let sweeper = Sweeper::start().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let seen = Arc::clone(&seen);
            assert!(sweeper.handle().enqueue(Box::new(move || {
                seen.lock().push(i);
                Ok(())
            })));
        }
        assert!(sweeper.handle().sync(Duration::from_secs(5)));
        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn survives_failing_and_panicking_jobs() {
        let sweeper = Sweeper::start().unwrap();
        let handle = sweeper.handle();
        let counter = Arc::new(AtomicUsize::new(0));

        handle.enqueue(Box::new(|| Err(CleanupError::new("boom"))));
        handle.enqueue(Box::new(|| panic!("cleanup exploded")));
        handle.enqueue(counting_job(&counter));

        assert!(handle.sync(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(sweeper.is_running());
    }

    #[test]
    fn idle_worker_keeps_polling() {
        let sweeper = Sweeper::with_config(SweeperConfig {
            poll_interval: Duration::from_millis(1),
            ..SweeperConfig::default()
        })
        .unwrap();
        thread::sleep(Duration::from_millis(20));

        let counter = Arc::new(AtomicUsize::new(0));
        sweeper.handle().enqueue(counting_job(&counter));
        assert!(sweeper.handle().sync(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_drains_queue_and_is_idempotent() {
        let sweeper = Sweeper::start().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            sweeper.handle().enqueue(counting_job(&counter));
        }

        assert!(sweeper.stop());
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert!(!sweeper.is_running());

        assert!(sweeper.stop());
        assert!(sweeper.handle().is_stopped());
        assert!(!sweeper.handle().enqueue(counting_job(&counter)));
        assert!(!sweeper.handle().sync(Duration::from_millis(10)));
    }

    #[test]
    fn stop_gives_up_after_grace_period() {
        let sweeper = Sweeper::with_config(SweeperConfig {
            stop_grace: Duration::from_millis(10),
            ..SweeperConfig::default()
        })
        .unwrap();
        sweeper.handle().enqueue(Box::new(|| {
            thread::sleep(Duration::from_millis(300));
            Ok(())
        }));

        assert!(!sweeper.stop());
        assert!(sweeper.stop());
    }

    #[test]
    fn worker_thread_is_named() {
        let sweeper = Sweeper::with_config(SweeperConfig {
            thread_name: String::from("test-sweeper"),
            ..SweeperConfig::default()
        })
        .unwrap();
        let name = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&name);
        sweeper.handle().enqueue(Box::new(move || {
            *seen.lock() = thread::current().name().map(str::to_owned);
            Ok(())
        }));
        assert!(sweeper.handle().sync(Duration::from_secs(5)));
        assert_eq!(name.lock().as_deref(), Some("test-sweeper"));
    }
}
