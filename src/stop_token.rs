use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation capability that a receiver exposes through its environment.
///
/// The trampoline consults the token exactly once, right before it delivers the terminal signal of
/// an operation. Implementations of [`StopToken::stop_requested`] must be idempotent and free of
/// side-effects.
pub trait StopToken {
    /// `true` if tokens of this type can never report a stop request. The completion path skips the
    /// runtime check entirely for such tokens.
    const UNSTOPPABLE: bool = false;

    /// Whether cancellation has been requested.
    fn stop_requested(&self) -> bool;
}

/// Token that never signals cancellation.
///
/// This is the token of an environment that does not provide one.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NeverStopToken;

impl StopToken for NeverStopToken {
    const UNSTOPPABLE: bool = true;

    #[inline(always)]
    fn stop_requested(&self) -> bool {
        false
    }
}

/// Owner of a stop flag. Hands out [`StopSourceToken`] objects that observe it.
///
/// # Usage
///
/// ```
/// # use trampoline_scheduler::{StopSource, StopToken};
/// let source = StopSource::new();
/// let token = source.token();
/// assert!(!token.stop_requested());
/// assert!(source.request_stop());
/// assert!(token.stop_requested());
/// ```
#[derive(Debug, Default)]
pub struct StopSource {
    stopped: Arc<AtomicBool>,
}

impl StopSource {
    /// Create a stop source that has not been stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a token that observes this source.
    pub fn token(&self) -> StopSourceToken {
        StopSourceToken {
            stopped: self.stopped.clone(),
        }
    }

    /// Request cancellation. Returns `true` only for the call that actually changed the state.
    pub fn request_stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    /// Whether cancellation has been requested.
    pub fn stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Token handed out by a [`StopSource`].
#[derive(Debug, Clone)]
pub struct StopSourceToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken for StopSourceToken {
    #[inline]
    fn stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}
