//! Progress reporting: the sink seam the engine publishes ticks and outcomes
//! through, plus ready-made sinks.
//!
//! Sinks are best effort. A sink that errors or stalls is logged by the
//! session ticker and otherwise ignored, so a broken transport never closes a
//! player's cash-out window.

pub mod sink;
pub mod stats;

pub use sink::{
    FanoutSink, LogSink, ProgressEvent, ProgressSink, SinkError, SinkResult, SubscriberSink,
};
pub use stats::{PlayerStats, StatsBook};
