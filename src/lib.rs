//! Stack-bounded trampoline scheduler.
//!
//! When one operation's completion synchronously starts the next, a long chain of operations nests
//! one stack frame per link. [`TrampolineScheduler`] bounds that nesting: once the configured depth
//! is reached, further operations are deferred onto a per-thread queue that the outermost call
//! drains iteratively.

pub mod config;
pub mod error;
pub mod receiver;
pub mod stop_token;
pub mod trampoline;

pub use receiver::{Completion, EmptyEnv, Env, Receiver};
pub use stop_token::{NeverStopToken, StopSource, StopSourceToken, StopToken};
pub use trampoline::{
    ForwardProgressGuarantee, Operation, ScheduleFuture, ScheduleSender, TrampolineScheduler,
};

pub use error::Error;
