//! parcheck - parallel check queue
//!
//! A reusable concurrency primitive that accelerates a bulk validation phase
//! by spreading short, independent boolean checks across a fixed worker pool.
//! One thread (the master) pushes batches of checks onto a [`CheckQueue`]
//! through a [`RoundController`]; when it is done adding work it temporarily
//! joins the pool as an extra worker until every check has been evaluated,
//! then takes the round's verdict: true iff every check returned true.
//!
//! Checks are opaque to the queue. Anything implementing [`Check`] — a single
//! consuming call yielding a boolean — can be queued; a boxed closure works
//! out of the box.
//!
//! # Quick Start
//!
//! ```rust
//! use parcheck::{CheckQueue, RoundController};
//!
//! type Job = Box<dyn FnOnce() -> bool + Send>;
//!
//! let mut queue: CheckQueue<Job> = CheckQueue::new(16);
//! queue.start(4, Some("sigcheck")).unwrap();
//!
//! let verdict = {
//!     let mut round = RoundController::new(Some(&queue));
//!     round.add(vec![
//!         Box::new(|| true) as Job,
//!         Box::new(|| 2 + 2 == 4) as Job,
//!     ]);
//!     round.wait()
//! };
//! assert!(verdict);
//!
//! queue.interrupt();
//! queue.stop();
//! ```
//!
//! # Guarantees
//!
//! - Every check added within a round is evaluated exactly once before
//!   `wait` returns, regardless of how many batches it arrived in.
//! - The verdict is the conjunction of every outcome in the round; a check
//!   that panics counts as false. Verdicts never leak between rounds.
//! - At most one round is active per queue: constructing a second
//!   [`RoundController`] blocks until the first is destroyed, and a
//!   controller dropped without `wait` drains the queue first.
//! - No ordering is guaranteed among evaluations within a round; submit only
//!   checks whose outcomes are independent.

mod check;
mod control;
mod error;
mod queue;

pub use check::Check;
pub use control::RoundController;
pub use error::StartError;
pub use queue::CheckQueue;
