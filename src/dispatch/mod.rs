//! Capture queue and scoring dispatcher.

mod dispatcher;
mod queue;

pub use dispatcher::{DispatchSettings, Dispatcher};
pub use queue::QueueStatus;
