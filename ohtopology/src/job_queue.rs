//! Serialized delivery of notifications to the listener.
//!
//! A fixed pool of [`Job`]s circulates between producers and a single
//! dispatch thread. Producers take an idle job from the free pool, fill it
//! and push it onto the ready queue; the dispatch thread pops ready jobs in
//! FIFO order, calls the listener, and hands the job back to the free pool.
//! When every job is in flight, producers block until one comes back.
//!
//! The dispatch thread never waits on its own pool. A listener that causes
//! a notification while no job is free gets an overflow job instead, which
//! is discarded once it has run.
//!
//! Sequence numbers are assigned at the moment a job enters the ready pool,
//! under the same lock as the push, so dispatch order equals sequence order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::error::{Result, TopologyError};
use crate::handler::TopologyHandler;
use crate::job::{Job, Notification};
use crate::model::Group;

/// FIFO of listener notifications with one dispatch thread.
pub struct JobQueue {
    free: Receiver<Job>,
    ready: Sender<Job>,
    next_sequence: Mutex<u64>,
    open: AtomicBool,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dispatch_thread: ThreadId,
    capacity: usize,
}

impl JobQueue {
    /// Start the dispatch thread. `handler` is only ever called from it.
    pub fn new<H>(capacity: usize, thread_name: &str, handler: H) -> Result<Self>
    where
        H: TopologyHandler + 'static,
    {
        let capacity = capacity.max(1);
        let (free_tx, free_rx) = channel::bounded(capacity);
        let (ready_tx, ready_rx) = channel::unbounded();

        for _ in 0..capacity {
            // Cannot fail: the receiver is alive and there is room for every job
            let _ = free_tx.send(Job::idle());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || run_dispatch(handler, ready_rx, free_tx, worker_stop))
            .map_err(TopologyError::WorkerSpawn)?;

        tracing::debug!(
            "Job queue started: {} jobs, dispatch thread '{}'",
            capacity,
            thread_name
        );

        Ok(Self {
            free: free_rx,
            ready: ready_tx,
            next_sequence: Mutex::new(0),
            open: AtomicBool::new(true),
            stop,
            dispatch_thread: handle.thread().id(),
            worker: Mutex::new(Some(handle)),
            capacity,
        })
    }

    /// Queue `notification` for `group`, blocking while all jobs are in flight.
    ///
    /// The job holds its own reference to the group until it has been
    /// dispatched. Returns the dispatch sequence number, or `None` if the
    /// queue is closed.
    ///
    /// Called from the dispatch thread itself, the call never blocks: if no
    /// job is free an overflow job is allocated for it.
    pub fn enqueue(&self, group: &Group, notification: Notification) -> Option<u64> {
        if !self.is_open() {
            tracing::debug!("Queue closed, dropping {} for {}", notification, group.udn());
            return None;
        }

        let group = group.clone();
        let mut job = if self.is_dispatch_thread() {
            match self.free.try_recv() {
                Ok(job) => job,
                Err(TryRecvError::Empty) => {
                    tracing::debug!(
                        "Pool exhausted on the dispatch thread, overflow job for {} on {}",
                        notification,
                        group.udn()
                    );
                    Job::idle()
                }
                Err(TryRecvError::Disconnected) => return None,
            }
        } else {
            // Disconnected once the dispatch thread has exited
            self.free.recv().ok()?
        };

        let mut next = self.next_sequence.lock();
        if !self.is_open() {
            return None;
        }
        let sequence = *next;
        job.fill(sequence, notification, group);
        self.ready.send(job).ok()?;
        *next += 1;
        Some(sequence)
    }

    /// Stop accepting work, deliver what is already queued, and join the
    /// dispatch thread.
    ///
    /// Safe to call more than once. Called from inside a listener callback it
    /// cannot join; the dispatch thread then stops after the current job and
    /// the rest of the queue is discarded.
    pub fn shutdown(&self) -> Result<()> {
        let Some(handle) = self.worker.lock().take() else {
            return Ok(());
        };

        if self.is_dispatch_thread() {
            self.open.store(false, Ordering::Release);
            self.stop.store(true, Ordering::Release);
            tracing::debug!("Job queue shutdown requested from the dispatch thread");
            return Ok(());
        }

        {
            let _next = self.next_sequence.lock();
            self.open.store(false, Ordering::Release);
            let mut sentinel = Job::idle();
            sentinel.fill_shutdown();
            // Fails only if the dispatch thread has already exited
            let _ = self.ready.send(sentinel);
        }

        handle.join().map_err(|_| TopologyError::WorkerPanicked)?;
        tracing::debug!("Job queue stopped");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Number of jobs in circulation.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the caller is running on the dispatch thread.
    pub fn is_dispatch_thread(&self) -> bool {
        thread::current().id() == self.dispatch_thread
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("Job queue shutdown failed: {}", e);
        }
    }
}

fn run_dispatch<H: TopologyHandler>(
    mut handler: H,
    ready: Receiver<Job>,
    free: Sender<Job>,
    stop: Arc<AtomicBool>,
) {
    tracing::debug!("Dispatch thread started");

    for mut job in ready.iter() {
        let keep_running = job.execute(&mut handler);
        // Full only when `job` was an overflow job; let it go
        let _ = free.try_send(job);
        if !keep_running || stop.load(Ordering::Acquire) {
            break;
        }
    }

    tracing::debug!("Dispatch thread exiting");
}
