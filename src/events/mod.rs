pub mod listener;
pub mod types;

// Re-export key types for convenience
pub use listener::{ApplicationContext, EventSink, LifecycleListener, ListenerAdapter};
pub use types::{EventKind, LifecycleEvent, TimelineEvent};
