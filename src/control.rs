//! Scoped controller that serializes rounds on a check queue.

use parking_lot::MutexGuard;

use crate::check::Check;
use crate::queue::CheckQueue;

/// RAII-style controller for a [`CheckQueue`] that guarantees the queue is
/// drained before the round's scope is left.
///
/// Construction acquires the queue's control mutex and blocks until any
/// prior round has released it, so at most one controller is live per queue.
/// Binding to `None` degenerates every operation to a no-op returning true,
/// the shape used when parallel checking is disabled.
pub struct RoundController<'a, T: Check + Send + 'static> {
    queue: Option<&'a CheckQueue<T>>,
    _lock: Option<MutexGuard<'a, ()>>,
    waited: bool,
}

impl<'a, T: Check + Send + 'static> RoundController<'a, T> {
    /// Open a round on `queue`, blocking until the previous round is done.
    pub fn new(queue: Option<&'a CheckQueue<T>>) -> Self {
        let lock = queue.map(|q| q.control_lock());
        RoundController {
            queue,
            _lock: lock,
            waited: false,
        }
    }

    /// Move a batch of checks into the round.
    pub fn add(&mut self, batch: Vec<T>) {
        if let Some(queue) = self.queue {
            queue.push(batch);
        }
    }

    /// Block until every submitted check has been evaluated, and return
    /// whether all of them succeeded.
    ///
    /// Consuming the controller makes a second wait (and any further `add`)
    /// unrepresentable; the control mutex is released when the consumed
    /// controller drops.
    pub fn wait(mut self) -> bool {
        self.drain()
    }

    fn drain(&mut self) -> bool {
        self.waited = true;
        match self.queue {
            Some(queue) => queue.drain(),
            None => true,
        }
    }
}

impl<T: Check + Send + 'static> Drop for RoundController<'_, T> {
    fn drop(&mut self) {
        // The queue must be drained before the next round may begin; a
        // controller dropped without waiting drains it here, discarding the
        // verdict.
        if !self.waited {
            let _ = self.drain();
        }
    }
}
