use crate::config::{configured_max_nesting_depth, DEFAULT_MAX_NESTING_DEPTH};
use crate::error::Error;
use crate::receiver::{self, Receiver};
use crate::stop_token::{NeverStopToken, StopToken};
use crate::trampoline::future::ScheduleFuture;
use crate::trampoline::operation::{DetachedOperation, Operation};

type Result<T> = std::result::Result<T, Error>;

/// Scheduler that runs work on the calling thread without letting chains of synchronously
/// completing operations overflow the stack.
///
/// Operations started from inside other operations run inline until the nesting depth reaches
/// [`TrampolineScheduler::max_nesting_depth`]. Past that point they are deferred, and the outermost
/// start call on the thread runs them one after the other in a loop once its own work returns.
///
/// # Usage
///
/// ```
/// # use std::cell::Cell;
/// # use std::rc::Rc;
/// # use trampoline_scheduler::TrampolineScheduler;
/// fn count_down(scheduler: TrampolineScheduler, n: usize, counter: Rc<Cell<usize>>) {
///     counter.set(counter.get() + 1);
///     if n > 0 {
///         scheduler.execute(move || count_down(scheduler, n - 1, counter));
///     }
/// }
///
/// let counter = Rc::new(Cell::new(0));
/// let scheduler = TrampolineScheduler::default();
/// scheduler.execute({
///     let counter = counter.clone();
///     move || count_down(scheduler, 100_000, counter)
/// });
/// assert_eq!(counter.get(), 100_001);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TrampolineScheduler {
    max_nesting_depth: usize,
}

impl TrampolineScheduler {
    /// Create a scheduler with the given maximum nesting depth.
    ///
    /// # Arguments
    ///
    /// * `max_nesting_depth` - Number of operations that may run nested inside each other before
    ///   further operations are deferred. With a limit of `0` or `1`, every operation started from
    ///   inside another one is deferred.
    pub const fn new(max_nesting_depth: usize) -> Self {
        TrampolineScheduler { max_nesting_depth }
    }

    /// Create a scheduler with the maximum nesting depth from the `TRAMPOLINE_MAX_NESTING_DEPTH`
    /// environment variable, or the default if it is not set.
    pub fn from_env() -> Result<Self> {
        configured_max_nesting_depth().map(Self::new)
    }

    /// Maximum nesting depth of this scheduler.
    #[inline]
    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    /// Whether executing work on this scheduler may block the caller. Operations either run inline
    /// or are deferred to the drain loop of the current thread, so this is always `false`.
    #[inline]
    pub const fn execute_may_block_caller(&self) -> bool {
        false
    }

    /// Forward progress guarantee of the agents this scheduler runs work on. All work runs on the
    /// calling thread, interleaved with the drain loop, so nothing beyond weakly parallel progress
    /// is promised.
    #[inline]
    pub const fn forward_progress_guarantee(&self) -> ForwardProgressGuarantee {
        ForwardProgressGuarantee::WeaklyParallel
    }

    /// Produce a task descriptor for this scheduler. This has no side-effects.
    #[inline]
    pub fn schedule(&self) -> ScheduleSender {
        ScheduleSender {
            max_nesting_depth: self.max_nesting_depth,
        }
    }

    /// Run `f` on the trampoline. The closure runs right away unless the trampoline on this thread
    /// is nested to the limit, in which case it runs once the outermost call drains its queue.
    ///
    /// # Arguments
    ///
    /// * `f` - Function closure to execute.
    #[inline]
    pub fn execute(&self, f: impl FnOnce() + 'static) {
        self.schedule().start_detached(receiver::from_fn(move |_| f()));
    }
}

impl Default for TrampolineScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NESTING_DEPTH)
    }
}

/// Forward progress guarantee of the execution agents a scheduler creates, strongest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ForwardProgressGuarantee {
    /// Agents make progress independently of each other.
    Concurrent,
    /// Agents make progress once they have started executing.
    Parallel,
    /// Agents may need other agents to block on them before they make progress.
    WeaklyParallel,
}

/// Task descriptor produced by [`TrampolineScheduler::schedule`].
///
/// Inert until bound to a receiver with [`ScheduleSender::connect`] and started. Completes with
/// either the success or the cancelled signal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScheduleSender {
    max_nesting_depth: usize,
}

impl ScheduleSender {
    /// Bind a receiver, producing an operation that is owned by the caller.
    #[inline]
    pub fn connect<R: Receiver>(self, receiver: R) -> Operation<R> {
        Operation::new(receiver, self.max_nesting_depth)
    }

    /// Bind a receiver to a heap-allocated operation and start it right away. The allocation is
    /// released right before the receiver is completed.
    ///
    /// Unlike [`Operation::start`], this is safe because the operation owns itself.
    #[inline]
    pub fn start_detached<R: Receiver + 'static>(self, receiver: R) {
        DetachedOperation::start(receiver, self.max_nesting_depth);
    }

    /// Scheduler on which this sender completes.
    #[inline]
    pub fn completion_scheduler(&self) -> TrampolineScheduler {
        TrampolineScheduler::new(self.max_nesting_depth)
    }

    /// Environment of this sender. The sender is its own environment.
    #[inline]
    pub fn env(&self) -> &Self {
        self
    }

    /// Turn this sender into a future whose receiver observes the given stop token.
    ///
    /// # Arguments
    ///
    /// * `token` - Stop token consulted right before the future's operation completes.
    pub fn into_future_with_stop_token<T>(self, token: T) -> ScheduleFuture<T>
    where
        T: StopToken + Clone + Unpin + 'static,
    {
        ScheduleFuture::new(self, token)
    }
}

impl std::future::IntoFuture for ScheduleSender {
    type Output = crate::receiver::Completion;
    type IntoFuture = ScheduleFuture<NeverStopToken>;

    fn into_future(self) -> Self::IntoFuture {
        ScheduleFuture::new(self, NeverStopToken)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::receiver::Completion;
    use crate::stop_token::StopSource;

    #[test]
    fn test_default() {
        assert_eq!(TrampolineScheduler::default().max_nesting_depth(), 16);
        assert_eq!(TrampolineScheduler::default(), TrampolineScheduler::new(16));
    }

    #[test]
    fn test_equality() {
        assert_eq!(TrampolineScheduler::new(4), TrampolineScheduler::new(4));
        assert_ne!(TrampolineScheduler::new(4), TrampolineScheduler::new(5));
    }

    #[test]
    fn test_completion_scheduler() {
        let scheduler = TrampolineScheduler::new(7);
        let sender = scheduler.schedule();
        assert_eq!(sender.completion_scheduler(), scheduler);
        assert_eq!(sender.env().completion_scheduler(), scheduler);
    }

    #[test]
    fn test_schedule_is_pure() {
        let scheduler = TrampolineScheduler::new(3);
        assert_eq!(scheduler.schedule(), scheduler.schedule());
        assert!(!crate::trampoline::is_active());
    }

    #[test]
    fn test_execute() {
        let ran = Rc::new(Cell::new(false));
        TrampolineScheduler::default().execute({
            let ran = ran.clone();
            move || ran.set(true)
        });
        assert!(ran.get());
    }

    #[test]
    fn test_start_detached_stopped() {
        let source = StopSource::new();
        source.request_stop();
        let completion = Rc::new(Cell::new(None));
        TrampolineScheduler::default()
            .schedule()
            .start_detached(receiver::from_fn_with_stop_token(source.token(), {
                let completion = completion.clone();
                move |c| completion.set(Some(c))
            }));
        assert_eq!(completion.get(), Some(Completion::Stopped));
    }

    #[test]
    fn test_execute_does_not_block_caller() {
        assert!(!TrampolineScheduler::default().execute_may_block_caller());
        assert!(!TrampolineScheduler::new(1).execute_may_block_caller());
    }

    #[test]
    fn test_forward_progress_guarantee() {
        assert_eq!(
            TrampolineScheduler::default().forward_progress_guarantee(),
            ForwardProgressGuarantee::WeaklyParallel,
        );
        assert_ne!(
            TrampolineScheduler::new(3).forward_progress_guarantee(),
            ForwardProgressGuarantee::Parallel,
        );
    }

    #[test]
    fn test_from_env_defaults_when_unset() {
        if std::env::var_os(crate::config::MAX_NESTING_DEPTH_ENV).is_some() {
            return;
        }
        assert_eq!(
            TrampolineScheduler::from_env(),
            Ok(TrampolineScheduler::default()),
        );
        assert_eq!(
            crate::config::configured_max_nesting_depth(),
            Ok(DEFAULT_MAX_NESTING_DEPTH),
        );
    }

    #[test]
    fn test_limit_zero_defers_every_nested_operation() {
        let depths = Rc::new(RefCell::new(Vec::new()));
        let scheduler = TrampolineScheduler::new(0);

        fn step(
            scheduler: TrampolineScheduler,
            remaining: usize,
            depths: Rc<RefCell<Vec<Option<usize>>>>,
        ) {
            depths.borrow_mut().push(crate::trampoline::current_depth());
            if remaining > 0 {
                scheduler.execute(move || step(scheduler, remaining - 1, depths));
            }
        }

        scheduler.execute({
            let depths = depths.clone();
            move || step(scheduler, 4, depths)
        });
        assert_eq!(*depths.borrow(), vec![Some(1); 5]);
    }

    #[test]
    fn test_deferred_in_lifo_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let scheduler = TrampolineScheduler::new(1);
        scheduler.execute({
            let order = order.clone();
            move || {
                for name in ["a", "b", "c"] {
                    let order = order.clone();
                    scheduler.execute(move || order.borrow_mut().push(name));
                }
                assert!(order.borrow().is_empty());
            }
        });
        assert_eq!(*order.borrow(), vec!["c", "b", "a"]);
    }
}
