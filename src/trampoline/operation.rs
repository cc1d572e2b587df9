use std::marker::PhantomPinned;
use std::pin::Pin;
use std::ptr::NonNull;

use crate::receiver::{Env, Receiver};
use crate::stop_token::StopToken;
use crate::trampoline::state::TrampolineState;

/// Type-erased execution entry point of an operation.
type ExecuteFn = unsafe fn(NonNull<OperationBase>);

/// Header shared by all operation types. This is the node type of the intrusive deferred list.
///
/// Concrete operations are `#[repr(C)]` and start with this header, so a pointer to the header can
/// be cast back to the concrete operation inside its [`ExecuteFn`].
pub(crate) struct OperationBase {
    next: Option<NonNull<OperationBase>>,
    execute: ExecuteFn,
    max_nesting_depth: usize,
    _pinned: PhantomPinned,
}

impl OperationBase {
    fn new(execute: ExecuteFn, max_nesting_depth: usize) -> Self {
        OperationBase {
            next: None,
            execute,
            max_nesting_depth,
            _pinned: PhantomPinned,
        }
    }

    /// Run the operation's execution function.
    ///
    /// # Safety
    ///
    /// `this` must point to a live operation that has not been executed before.
    #[inline]
    pub(super) unsafe fn execute(this: NonNull<Self>) {
        let execute = (*this.as_ptr()).execute;
        execute(this)
    }

    #[inline]
    pub(super) unsafe fn next(this: NonNull<Self>) -> Option<NonNull<Self>> {
        (*this.as_ptr()).next
    }

    #[inline]
    pub(super) unsafe fn set_next(this: NonNull<Self>, next: Option<NonNull<Self>>) {
        (*this.as_ptr()).next = next;
    }

    /// Begin the operation: enter a new trampoline, execute inline (nested), or defer.
    ///
    /// # Safety
    ///
    /// `this` must point to a live operation that stays alive and in place until its terminal
    /// signal has been delivered.
    pub(super) unsafe fn start(this: NonNull<Self>) {
        let max_nesting_depth = (*this.as_ptr()).max_nesting_depth;
        match TrampolineState::current() {
            None => TrampolineState::run(this),
            Some(state) => {
                // SAFETY: the state lives on the stack of the outermost start call on this thread,
                // which encloses this one.
                let state = state.as_ref();
                let depth = state.depth();
                if depth < max_nesting_depth {
                    state.increment_depth();
                    tracing::trace!(depth = depth + 1, "executing operation inline");
                    Self::execute(this);
                } else {
                    tracing::trace!(depth, max_nesting_depth, "deferring operation");
                    state.defer(this);
                }
            }
        }
    }
}

/// Deliver the terminal signal to a receiver.
///
/// The stop token is consulted here and only here. For tokens that can never be stopped the check
/// is compiled out.
#[inline]
pub(super) fn complete<R: Receiver>(receiver: R) {
    if <<R::Env as Env>::StopToken as StopToken>::UNSTOPPABLE {
        receiver.set_value();
    } else if receiver.env().stop_token().stop_requested() {
        receiver.set_stopped();
    } else {
        receiver.set_value();
    }
}

/// Operation produced by binding a [`crate::ScheduleSender`] to a receiver.
///
/// The operation is owned by the caller. The trampoline only links it into its deferred list while
/// it waits to be executed, which is why it must be pinned before it can be started.
///
/// # Usage
///
/// ```
/// # use std::cell::Cell;
/// # use std::rc::Rc;
/// # use trampoline_scheduler::{receiver, Completion, TrampolineScheduler};
/// let completion = Rc::new(Cell::new(None));
/// let mut operation = Box::pin(TrampolineScheduler::default().schedule().connect(
///     receiver::from_fn({
///         let completion = completion.clone();
///         move |c| completion.set(Some(c))
///     }),
/// ));
/// // SAFETY: the operation is not moved or dropped before it completes.
/// unsafe { operation.as_mut().start() };
/// assert_eq!(completion.get(), Some(Completion::Value));
/// ```
#[repr(C)]
pub struct Operation<R> {
    base: OperationBase,
    receiver: Option<R>,
}

impl<R: Receiver> Operation<R> {
    pub(super) fn new(receiver: R, max_nesting_depth: usize) -> Self {
        Operation {
            base: OperationBase::new(Self::execute_impl, max_nesting_depth),
            receiver: Some(receiver),
        }
    }

    /// Start the operation.
    ///
    /// The operation either runs right away, or, if the trampoline running on this thread is
    /// already nested to the limit, is deferred until the outermost start call on this thread
    /// drains it. In both cases it has completed by the time that outermost call returns.
    ///
    /// # Safety
    ///
    /// The operation must not be moved, dropped or started again until its receiver has been
    /// completed. In particular, when started from inside another operation's receiver, it must
    /// outlive the outermost start call on this thread.
    ///
    /// # Panics
    ///
    /// Panics if the operation is executed after it has already completed.
    pub unsafe fn start(self: Pin<&mut Self>) {
        let this = NonNull::from(self.get_unchecked_mut()).cast::<OperationBase>();
        OperationBase::start(this)
    }

    /// Whether the receiver has been completed.
    pub fn is_completed(&self) -> bool {
        self.receiver.is_none()
    }

    unsafe fn execute_impl(this: NonNull<OperationBase>) {
        let this = this.cast::<Self>();
        let receiver = (*this.as_ptr())
            .receiver
            .take()
            .expect("operation executed after completion");
        complete(receiver);
    }
}

impl<R> std::fmt::Debug for Operation<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("max_nesting_depth", &self.base.max_nesting_depth)
            .field("completed", &self.receiver.is_none())
            .finish()
    }
}

/// Heap-allocated operation that frees itself right before it delivers its terminal signal.
#[repr(C)]
pub(super) struct DetachedOperation<R> {
    base: OperationBase,
    receiver: R,
}

impl<R: Receiver + 'static> DetachedOperation<R> {
    /// Allocate an operation for `receiver` and start it.
    pub(super) fn start(receiver: R, max_nesting_depth: usize) {
        let operation = Box::new(DetachedOperation {
            base: OperationBase::new(Self::execute_impl, max_nesting_depth),
            receiver,
        });
        let this = NonNull::from(Box::leak(operation)).cast::<OperationBase>();
        // SAFETY: the allocation is only reclaimed by `execute_impl`, which runs exactly once.
        unsafe { OperationBase::start(this) }
    }

    unsafe fn execute_impl(this: NonNull<OperationBase>) {
        let operation = Box::from_raw(this.cast::<Self>().as_ptr());
        let DetachedOperation { receiver, .. } = *operation;
        complete(receiver);
    }
}
