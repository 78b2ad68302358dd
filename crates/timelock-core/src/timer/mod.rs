mod engine;
mod service;

pub use engine::{TimerEngine, TimerState, TimerStatus, DEFAULT_SYNC_EVERY_SECS};
pub use service::{TimerService, TimerSettings};
