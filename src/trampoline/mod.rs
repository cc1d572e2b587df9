mod future;
mod operation;
mod scheduler;
mod state;

pub use future::ScheduleFuture;
pub use operation::Operation;
pub use scheduler::{ForwardProgressGuarantee, ScheduleSender, TrampolineScheduler};
pub use state::{current_depth, is_active};
