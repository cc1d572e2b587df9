use crate::stop_token::{NeverStopToken, StopToken};

/// Environment of a receiver. The only capability the trampoline queries is the stop token.
pub trait Env {
    /// Type of stop token provided by this environment.
    type StopToken: StopToken;

    /// Get the stop token.
    fn stop_token(&self) -> Self::StopToken;
}

/// Environment that provides no capabilities. Its stop token never signals cancellation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct EmptyEnv;

impl Env for EmptyEnv {
    type StopToken = NeverStopToken;

    #[inline(always)]
    fn stop_token(&self) -> NeverStopToken {
        NeverStopToken
    }
}

/// Continuation that receives exactly one terminal signal for a bound operation.
///
/// Both terminal methods consume the receiver, which means a receiver can never be completed twice.
pub trait Receiver {
    /// Type of environment exposed by this receiver.
    type Env: Env;

    /// Query the environment of this receiver.
    fn env(&self) -> Self::Env;

    /// Deliver the success signal.
    fn set_value(self);

    /// Deliver the cancelled signal.
    fn set_stopped(self);
}

/// Terminal signal delivered to a receiver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Completion {
    /// The scheduled work ran and completed successfully.
    Value,
    /// Cancellation was requested before the scheduled work was completed.
    Stopped,
}

impl Completion {
    /// Whether this is the success signal.
    #[inline]
    pub fn is_value(&self) -> bool {
        matches!(self, Completion::Value)
    }

    /// Whether this is the cancelled signal.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Completion::Stopped)
    }
}

/// Receiver that forwards its terminal signal to a closure.
///
/// Use [`from_fn`] or [`from_fn_with_stop_token`] to create one.
pub struct FnReceiver<F, E = EmptyEnv> {
    f: F,
    env: E,
}

impl<F, E> std::fmt::Debug for FnReceiver<F, E>
where
    E: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FnReceiver").field("env", &self.env).finish()
    }
}

impl<F, E> Receiver for FnReceiver<F, E>
where
    F: FnOnce(Completion),
    E: Env + Clone,
{
    type Env = E;

    #[inline]
    fn env(&self) -> E {
        self.env.clone()
    }

    #[inline]
    fn set_value(self) {
        (self.f)(Completion::Value)
    }

    #[inline]
    fn set_stopped(self) {
        (self.f)(Completion::Stopped)
    }
}

/// Environment that carries a single stop token.
#[derive(Debug, Clone)]
pub struct StopTokenEnv<T>(T);

impl<T> Env for StopTokenEnv<T>
where
    T: StopToken + Clone,
{
    type StopToken = T;

    #[inline]
    fn stop_token(&self) -> T {
        self.0.clone()
    }
}

/// Create a receiver from a closure. The receiver's environment is empty, so the operation it is
/// bound to can never be cancelled.
///
/// # Example
///
/// ```
/// # use trampoline_scheduler::{receiver, Completion, Receiver};
/// let receiver = receiver::from_fn(|completion| assert_eq!(completion, Completion::Value));
/// receiver.set_value();
/// ```
pub fn from_fn<F>(f: F) -> FnReceiver<F>
where
    F: FnOnce(Completion),
{
    FnReceiver { f, env: EmptyEnv }
}

/// Create a receiver from a closure. The receiver's environment carries the given stop token.
///
/// # Arguments
///
/// * `token` - Stop token that is consulted right before the terminal signal is delivered.
/// * `f` - Closure that receives the terminal signal.
pub fn from_fn_with_stop_token<F, T>(token: T, f: F) -> FnReceiver<F, StopTokenEnv<T>>
where
    F: FnOnce(Completion),
    T: StopToken + Clone,
{
    FnReceiver {
        f,
        env: StopTokenEnv(token),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::stop_token::StopSource;

    #[test]
    fn test_from_fn_value() {
        let completion = Cell::new(None);
        from_fn(|c| completion.set(Some(c))).set_value();
        assert_eq!(completion.get(), Some(Completion::Value));
    }

    #[test]
    fn test_from_fn_stopped() {
        let completion = Cell::new(None);
        from_fn(|c| completion.set(Some(c))).set_stopped();
        assert_eq!(completion.get(), Some(Completion::Stopped));
    }

    #[test]
    fn test_empty_env_never_stops() {
        let receiver = from_fn(|_| ());
        assert!(!receiver.env().stop_token().stop_requested());
    }

    #[test]
    fn test_env_carries_stop_token() {
        let source = StopSource::new();
        let receiver = from_fn_with_stop_token(source.token(), |_| ());
        assert!(!receiver.env().stop_token().stop_requested());
        source.request_stop();
        assert!(receiver.env().stop_token().stop_requested());
    }

    #[test]
    fn test_completion_predicates() {
        assert!(Completion::Value.is_value());
        assert!(!Completion::Value.is_stopped());
        assert!(Completion::Stopped.is_stopped());
    }
}
