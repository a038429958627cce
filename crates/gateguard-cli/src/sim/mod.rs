//! Trip simulation building blocks.

mod provider;
mod scenario;

pub use provider::StubDirections;
pub use scenario::{demo_plan, offset_north, TripWalk};
