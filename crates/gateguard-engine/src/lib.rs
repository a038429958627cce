//! Live navigation engine for layover trips.
//!
//! Owns the trip state machine: route progress, debounced deviation
//! detection, rate-limited reroutes, and the return-time safety
//! calculator. Everything runs on a single spawned task driven through
//! [`NavHandle`].

pub mod clock;
pub mod config;
pub mod engine;
pub mod events;
pub mod reroute;
pub mod return_time;
mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, NavConfig, RerouteConfig, ReturnTimeConfig};
pub use engine::{EngineClosed, NavCommand, NavEngine, NavHandle};
pub use events::{deviation_message, return_message, NavEvent, NavSnapshot};
