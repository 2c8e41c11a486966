//! # Write Path
//!
//! Queue, batch assembly and the background publisher thread.
//!
//! ```text
//! ListenerAdapter ──enqueue──▶ EventQueue ──drain──▶ BatchAssembler ──▶ BatchingPublisher ──post──▶ TimelineStore
//! ```

pub mod batch;
pub mod metrics;
pub mod queue;
pub mod worker;

pub use batch::{Batch, BatchAssembler};
pub use metrics::{MetricsSnapshot, PublisherMetrics};
pub use queue::{EventQueue, QueuedEvent};
pub use worker::{BatchOutcome, BatchingPublisher, FlushReport};
