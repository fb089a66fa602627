//! Observability module
//!
//! Logging, metrics, and the structured event stream that records every
//! decision the lifecycle controller makes.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{DisarmReason, Event, EventEmitter, EventSink};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
