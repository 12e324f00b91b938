//! Telemetry and logging
//!
//! Structured logging with tracing and frame timing for the render loop.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogGuard};
pub use metrics::{FrameProfiler, FrameStats, RunMetrics};
