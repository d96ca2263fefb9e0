pub mod collector;

pub mod fixtures;

pub use collector::{Event, MockCollector};
