//! Queue for boolean checks drained by a fixed worker pool.
//!
//! One thread (the master) pushes batches of checks onto the queue, where
//! they are evaluated by N worker threads. When the master is done adding
//! work it temporarily joins the pool as an N+1'th worker until all checks
//! are done, then takes the round verdict: the conjunction of every outcome.
//!
//! # Dispatch
//!
//! Claiming work is lock-free: an atomic cursor is CAS-advanced over the
//! shared sequence in spans of up to `batch_size` items, so any number of
//! workers dispatch without serializing through the mutex on the hot path.
//! The mutex is taken only briefly, to move a claimed span's checks out of
//! their slots and to fold the span's outcomes into the shared verdict; it is
//! never held across an evaluation.
//!
//! A later batch added within the same round grows the sequence and advances
//! the published total without resetting the cursor. Claim spans never cross
//! the total observed at claim time, so growth can only make more work
//! visible, never hide any; the outstanding counter stays the ground truth
//! for the drain.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::check::Check;
use crate::error::StartError;

/// Sequence of pending checks plus the shared round verdict.
struct RoundState<T> {
    /// Slots for the current round. A claimed slot is emptied before its
    /// check runs; slots are cleared when the round drains.
    items: Vec<Option<T>>,
    /// Conjunction of every outcome folded in so far this round.
    all_ok: bool,
}

/// State shared between the pool's threads and the owning queue.
struct Inner<T> {
    /// Guards `items`, `all_ok`, and the predicates of both condvars.
    state: Mutex<RoundState<T>>,
    /// Workers block here while no work is claimable.
    worker_cv: Condvar,
    /// The master blocks here while evaluations are outstanding.
    master_cv: Condvar,
    /// Next index to claim. Monotone within a round.
    cursor: AtomicUsize,
    /// Published length of `items`, read lock-free by claimants.
    total: AtomicUsize,
    /// Checks submitted but not yet folded into the verdict.
    outstanding: AtomicUsize,
    /// One-shot shutdown signal for idle workers.
    interrupted: AtomicBool,
    /// Maximum number of items claimed per span.
    batch_size: usize,
}

impl<T: Check + Send> Inner<T> {
    /// Claim the next span of up to `batch_size` unclaimed indices.
    ///
    /// Returns `None` when the cursor has reached the published total. Spans
    /// are clipped to the total read in the same iteration, so a claim can
    /// never cover indices a concurrent `add` has not yet published.
    fn claim(&self) -> Option<Range<usize>> {
        let mut cur = self.cursor.load(Ordering::Acquire);
        loop {
            let total = self.total.load(Ordering::Acquire);
            if cur >= total {
                return None;
            }
            let end = (cur + self.batch_size).min(total);
            match self
                .cursor
                .compare_exchange_weak(cur, end, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Some(cur..end),
                Err(observed) => cur = observed,
            }
        }
    }

    /// Move a claimed span's checks out of their slots.
    fn take_span(&self, span: Range<usize>) -> Vec<T> {
        let mut state = self.state.lock();
        state.items[span]
            .iter_mut()
            .filter_map(Option::take)
            .collect()
    }

    /// Fold a span's outcomes into the shared verdict and retire its count.
    ///
    /// Folding and the `outstanding` decrement share one critical section, so
    /// `outstanding == 0` observed under the mutex implies every evaluated
    /// outcome has already reached `all_ok`.
    fn flush(&self, count: usize, span_ok: bool) {
        let mut state = self.state.lock();
        state.all_ok &= span_ok;
        let remaining = self.outstanding.fetch_sub(count, Ordering::AcqRel) - count;
        drop(state);
        if remaining == 0 {
            self.master_cv.notify_one();
        }
    }

    /// Append a batch to the current round and wake workers.
    fn add(&self, batch: Vec<T>) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len();
        {
            let mut state = self.state.lock();
            // Bump the outstanding count before the items become claimable so
            // it can never under-run a concurrent flush.
            self.outstanding.fetch_add(count, Ordering::AcqRel);
            state.items.extend(batch.into_iter().map(Some));
            self.total.store(state.items.len(), Ordering::Release);
        }
        trace!(added = count, "batch queued");
        if count == 1 {
            self.worker_cv.notify_one();
        } else {
            self.worker_cv.notify_all();
        }
    }

    /// Shared work loop, run by workers for their whole lifetime and by the
    /// master while it drains a round.
    ///
    /// Returns the round verdict when `master` is true; the return value is
    /// meaningless for workers.
    fn run(&self, master: bool) -> bool {
        loop {
            if let Some(span) = self.claim() {
                let checks = self.take_span(span);
                let count = checks.len();
                let mut span_ok = true;
                for check in checks {
                    // A panicking check counts as a failure. The loop has to
                    // survive it, or the outstanding count would strand and
                    // the master would wait forever.
                    span_ok &= panic::catch_unwind(AssertUnwindSafe(|| check.check()))
                        .unwrap_or(false);
                }
                self.flush(count, span_ok);
            } else {
                let mut state = self.state.lock();
                if master {
                    while self.outstanding.load(Ordering::Acquire) != 0 {
                        self.master_cv.wait(&mut state);
                    }
                    let verdict = state.all_ok;
                    // Re-arm for the next round. Claimants read the cursor
                    // before the total, so the total is zeroed first.
                    state.all_ok = true;
                    state.items.clear();
                    self.total.store(0, Ordering::Release);
                    self.cursor.store(0, Ordering::Release);
                    trace!(verdict, "round drained");
                    return verdict;
                }
                if self.interrupted.load(Ordering::Acquire) {
                    return true;
                }
                self.worker_cv.wait_while(&mut state, |_| {
                    !self.interrupted.load(Ordering::Acquire)
                        && self.cursor.load(Ordering::Acquire)
                            >= self.total.load(Ordering::Acquire)
                });
            }
        }
    }
}

/// Queue for checks that have to be performed, drained by a fixed pool of
/// worker threads.
///
/// The queue only ever evaluates; which checks to submit, and what a check
/// verifies, belong to the caller. Work is submitted and awaited through a
/// [`RoundController`](crate::RoundController), which serializes rounds: the
/// controller holds the queue's control mutex for its whole lifetime, so at
/// most one round is in flight and there is exactly one master per round.
pub struct CheckQueue<T> {
    inner: Arc<Inner<T>>,
    /// Serializes rounds; held by a `RoundController` for its whole scope.
    control_mutex: Mutex<()>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Check + Send + 'static> CheckQueue<T> {
    /// Create an idle queue. No workers exist until [`CheckQueue::start`].
    ///
    /// `batch_size` caps how many checks a thread claims per dispatch and is
    /// clamped to at least 1.
    pub fn new(batch_size: usize) -> Self {
        CheckQueue {
            inner: Arc::new(Inner {
                state: Mutex::new(RoundState {
                    items: Vec::new(),
                    all_ok: true,
                }),
                worker_cv: Condvar::new(),
                master_cv: Condvar::new(),
                cursor: AtomicUsize::new(0),
                total: AtomicUsize::new(0),
                outstanding: AtomicUsize::new(0),
                interrupted: AtomicBool::new(false),
                batch_size: batch_size.max(1),
            }),
            control_mutex: Mutex::new(()),
            workers: Vec::new(),
        }
    }

    /// Spawn `n_workers` worker threads, named `"{name}.{index}"`.
    ///
    /// With zero workers the queue still functions: each round is drained
    /// entirely on the thread that waits on it. Threads spawned before a
    /// spawn failure stay registered, so [`CheckQueue::stop`] can join them.
    ///
    /// # Panics
    ///
    /// Panics if the pool is already running.
    pub fn start(&mut self, n_workers: usize, name: Option<&str>) -> Result<(), StartError> {
        assert!(self.workers.is_empty(), "worker pool already started");
        self.inner.interrupted.store(false, Ordering::Release);
        let base = name.unwrap_or("parcheck");
        self.workers.reserve(n_workers);
        for index in 0..n_workers {
            let inner = Arc::clone(&self.inner);
            let handle = thread::Builder::new()
                .name(format!("{}.{}", base, index))
                .spawn(move || {
                    inner.run(false);
                })?;
            self.workers.push(handle);
        }
        debug!(workers = n_workers, name = base, "worker pool started");
        Ok(())
    }

    /// Signal idle workers to exit their wait and terminate.
    ///
    /// Safe to call at any time. In-flight evaluations are not aborted, and a
    /// drain already in progress still completes and reports its verdict; no
    /// new rounds should be started afterwards.
    pub fn interrupt(&self) {
        // Flip the flag while holding the state mutex so a worker between
        // its predicate check and its sleep cannot miss the wakeup.
        let state = self.inner.state.lock();
        self.inner.interrupted.store(true, Ordering::Release);
        drop(state);
        self.inner.worker_cv.notify_all();
        debug!("worker pool interrupted");
    }

    /// Join every worker and forget them. Call after [`CheckQueue::interrupt`].
    pub fn stop(&mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("worker pool stopped");
    }

    pub(crate) fn control_lock(&self) -> MutexGuard<'_, ()> {
        self.control_mutex.lock()
    }

    pub(crate) fn push(&self, batch: Vec<T>) {
        self.inner.add(batch);
    }

    pub(crate) fn drain(&self) -> bool {
        self.inner.run(true)
    }
}

impl<T> Drop for CheckQueue<T> {
    fn drop(&mut self) {
        assert!(
            self.workers.is_empty(),
            "check queue dropped with live workers; interrupt and stop it first"
        );
    }
}
