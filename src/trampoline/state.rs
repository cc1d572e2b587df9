use std::cell::Cell;
use std::ptr::NonNull;

use crate::trampoline::operation::OperationBase;

thread_local! {
    /// Trampoline state of the outermost running operation on this thread, if any.
    ///
    /// The pointee lives on the stack frame of that outermost start call. It is installed and
    /// cleared exclusively by [`TrampolineGuard`].
    static CURRENT: Cell<Option<NonNull<TrampolineState>>> = const { Cell::new(None) };
}

/// Per-thread trampoline bookkeeping: the nesting depth since the last reset and the head of the
/// intrusive stack of deferred operations.
///
/// The state never owns the operations it links. Every operation in the list is owned by whoever
/// started it, and that owner guarantees it stays alive until its terminal signal is delivered.
pub(super) struct TrampolineState {
    depth: Cell<usize>,
    head: Cell<Option<NonNull<OperationBase>>>,
}

impl TrampolineState {
    fn new() -> Self {
        TrampolineState {
            depth: Cell::new(1),
            head: Cell::new(None),
        }
    }

    /// Get the state of the trampoline that is running on this thread, if any.
    ///
    /// The returned pointer is only valid while the outermost start call that installed it is still
    /// on the stack. Callers must not keep it beyond the current start call.
    #[inline]
    pub(super) fn current() -> Option<NonNull<TrampolineState>> {
        CURRENT.with(|current| current.get())
    }

    /// Enter a fresh trampoline on this thread, execute `op` inline and then drain every operation
    /// that was deferred in the meantime. The state is torn down on every exit path.
    ///
    /// # Arguments
    ///
    /// * `op` - The operation that entered the trampoline.
    ///
    /// # Safety
    ///
    /// `op` must point to a live operation, and so must every operation deferred while the drain
    /// loop runs.
    pub(super) unsafe fn run(op: NonNull<OperationBase>) {
        let state = TrampolineState::new();
        let _guard = TrampolineGuard::install(&state);
        tracing::debug!("entered trampoline");

        OperationBase::execute(op);
        let drained = state.drain();

        tracing::debug!(drained, "trampoline drained");
    }

    #[inline]
    pub(super) fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Count one more inline execution. Depth is only ever reset by the drain loop, never decremented
    /// when a nested execution returns.
    #[inline]
    pub(super) fn increment_depth(&self) {
        self.depth.set(self.depth.get() + 1);
    }

    /// Push `op` to the front of the deferred list.
    ///
    /// # Safety
    ///
    /// `op` must point to a live operation that is not already in the list.
    #[inline]
    pub(super) unsafe fn defer(&self, op: NonNull<OperationBase>) {
        OperationBase::set_next(op, self.head.get());
        self.head.set(Some(op));
    }

    /// Execute deferred operations, most recently deferred first, until none are left. Returns the
    /// number of operations executed.
    unsafe fn drain(&self) -> usize {
        let mut drained = 0;
        while let Some(op) = self.head.get() {
            self.head.set(OperationBase::next(op));
            self.depth.set(1);
            OperationBase::execute(op);
            drained += 1;
        }
        drained
    }

    fn pending(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head.get();
        while let Some(op) = cursor {
            // SAFETY: every linked operation is alive while the state is installed.
            cursor = unsafe { OperationBase::next(op) };
            count += 1;
        }
        count
    }
}

/// Installs a [`TrampolineState`] as the current state of this thread and uninstalls it on drop.
struct TrampolineGuard<'state> {
    state: &'state TrampolineState,
}

impl<'state> TrampolineGuard<'state> {
    fn install(state: &'state TrampolineState) -> Self {
        CURRENT.with(|current| {
            debug_assert!(current.get().is_none(), "trampoline already installed");
            current.set(Some(NonNull::from(state)));
        });
        TrampolineGuard { state }
    }
}

impl Drop for TrampolineGuard<'_> {
    fn drop(&mut self) {
        // Only reachable with a non-empty list when an operation unwound out of the drain loop.
        if self.state.head.get().is_some() {
            tracing::warn!(
                abandoned = self.state.pending(),
                "trampoline torn down with deferred operations still queued"
            );
        }
        CURRENT.with(|current| current.set(None));
    }
}

/// Whether a trampoline is currently running on this thread.
pub fn is_active() -> bool {
    TrampolineState::current().is_some()
}

/// Current nesting depth of the trampoline running on this thread, or `None` if no trampoline is
/// running.
///
/// The depth starts at 1 for the operation that entered the trampoline and for every operation
/// the drain loop picks up, and grows by one for every operation executed inline inside another.
pub fn current_depth() -> Option<usize> {
    // SAFETY: a pointer is only present while its guard is installed, and the guard is dropped
    // before the state it points to.
    TrampolineState::current().map(|state| unsafe { state.as_ref() }.depth())
}
