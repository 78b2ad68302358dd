//! # Timelock Core Library
//!
//! Silent notification engine for a countdown timer. When the timer runs out
//! the user is alerted without sound: the screen flashes, the device vibrates
//! or the camera torch blinks, each following the same on/off pattern.
//!
//! ## Architecture
//!
//! - **Patterns**: alternating on/off millisecond sequences and the four
//!   named presets
//! - **PatternClock**: walks a pattern against a phase sink, always ending
//!   with the effect forced off
//! - **Channels**: Visual, Haptic and Torch notification channels with
//!   scoped hardware ownership and cooperative cancellation
//! - **Timer Engine**: a tick-driven countdown state machine, plus a tokio
//!   service that drives it and fires the channels on completion
//! - **Sessions**: best-effort replication of each run to a remote store
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`NotificationManager`]: owns one instance of each channel
//! - [`TimerEngine`]: core timer state machine
//! - [`TimerService`]: async driver for the engine
//! - [`SessionStore`]: trait for the remote session record
//! - [`Config`]: application configuration management

pub mod channel;
pub mod clock;
pub mod error;
pub mod events;
pub mod guard;
pub mod manager;
pub mod pattern;
pub mod platform;
pub mod session;
pub mod storage;
pub mod timer;

pub use channel::{ChannelKind, FireOutcome, NotificationChannel, VisualSettings};
pub use clock::{ClockOutcome, PatternClock, PhaseSink};
pub use error::{
    ChannelError, ConfigError, CoreError, PlatformError, SessionError, ValidationError,
};
pub use events::Event;
pub use guard::ResourceGuard;
pub use manager::{Capabilities, ChannelReport, NotificationManager};
pub use pattern::{Pattern, PresetName};
pub use platform::{Platform, PlatformInfo};
pub use session::{
    HttpSessionStore, MemorySessionStore, NullSessionStore, SessionKey, SessionStatus,
    SessionStore, SessionSync, StoredSession,
};
pub use storage::Config;
pub use timer::{TimerEngine, TimerService, TimerSettings, TimerState, TimerStatus};
