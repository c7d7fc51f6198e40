//! Diagnostic events and the sinks that receive them.
//!
//! Engines emit [`CacheEvent`]s through a [`Diagnostics`] handle. The default
//! sink logs through `tracing`; [`MetricsSink`] counts through the `metrics`
//! facade.

pub mod events;
pub mod sink;

#[cfg(test)]
mod tests;

pub use events::{CacheEvent, HitSource};
#[cfg(any(test, feature = "mock"))]
pub use sink::RecordingSink;
pub use sink::{Diagnostics, EventSink, FanoutSink, MetricsSink, TracingSink};
