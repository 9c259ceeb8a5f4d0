//! The capability a queued item must provide.

/// A unit of work that evaluates to a boolean exactly once.
///
/// Checks are moved into the queue and moved back out for evaluation, so they
/// may carry resources; `check` consumes the value, which is what makes
/// "evaluated at most once, destroyed afterwards" hold by construction.
///
/// Evaluation runs without external synchronization and must not depend on
/// the outcome or ordering of other checks in the same round. A panic during
/// evaluation is contained by the queue and counted as a false outcome.
pub trait Check {
    /// Evaluate the check, consuming it.
    fn check(self) -> bool;
}

/// Boxed closures are checks, for callers that mix heterogeneous work in one
/// round.
impl Check for Box<dyn FnOnce() -> bool + Send> {
    fn check(self) -> bool {
        self()
    }
}
