//! GateGuard CLI - replay tooling for the navigation engine.
//!
//! This crate provides the replay binary:
//! - gateguard-replay: walks a simulated layover itinerary through the
//!   engine and prints every event it announces

pub mod sim;

pub use sim::{demo_plan, offset_north, StubDirections, TripWalk};
