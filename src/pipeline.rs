//! Line-oriented host for the processor: JSON events in, JSON records out.

pub mod config;
pub mod context;
pub mod stream;
