#![allow(clippy::doc_markdown)] // Allow technical terms like DashMap, OnceLock in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Timeline History
//!
//! Bridges a running application's lifecycle events to a remote, persistent
//! timeline store, and reconstructs application history from that store for
//! a browsing UI.
//!
//! ## Architecture
//!
//! Two halves that share no in-process state and meet only through the
//! store's data:
//!
//! - **Write path**: the host framework drives a [`events::ListenerAdapter`],
//!   which stamps records and enqueues them on a bounded
//!   [`publisher::EventQueue`]. A dedicated publisher thread drains the queue,
//!   assembles batches and posts them with bounded retry. The
//!   [`service::TimelineService`] facade owns the lifecycle
//!   (`Created -> Started -> Stopping -> Stopped`) and flushes on stop.
//! - **Read path**: the [`provider::HistoryProvider`] lists entities by type
//!   and primary filter, reconstructs listings and detail views, and caches
//!   listings with a TTL.
//!
//! ## Module Organization
//!
//! - [`service`] - Lifecycle facade and shared service context
//! - [`publisher`] - Event queue, batch assembly and the publisher thread
//! - [`events`] - Event records and the listener adapter
//! - [`provider`] - Listing and detail reconstruction with caching
//! - [`store`] - Timeline store trait and the in-memory backend
//! - [`registry`] - Store backend factory keyed by name
//! - [`state_machine`] - Service state and transitions
//! - [`resilience`] - Retry with exponential backoff
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use timeline_history::config::TimelineConfig;
//! use timeline_history::events::{ApplicationContext, LifecycleEvent, LifecycleListener};
//! use timeline_history::provider::HistoryProvider;
//! use timeline_history::registry::StoreRegistry;
//! use timeline_history::service::TimelineService;
//! use timeline_history::store::InMemoryTimelineStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! timeline_history::logging::init_structured_logging();
//!
//! let config = TimelineConfig::load(None)?;
//! let store = Arc::new(InMemoryTimelineStore::new());
//!
//! let service = TimelineService::new(config.clone(), store.clone())?;
//! service.start(ApplicationContext::new("app-0001"))?;
//! let listener = service.listener()?;
//! listener.on_event(LifecycleEvent::ApplicationStart { app_name: "etl".into(), user: None })?;
//! listener.on_event(LifecycleEvent::ApplicationEnd)?;
//! service.stop()?;
//!
//! let provider = HistoryProvider::new(store, config.provider, config.store.entity_type);
//! for entry in provider.list_applications().await? {
//!     println!("{} completed={}", entry.id, entry.completed);
//! }
//! # let _ = StoreRegistry::with_defaults();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod provider;
pub mod publisher;
pub mod registry;
pub mod resilience;
pub mod service;
pub mod state_machine;
pub mod store;

pub use config::{ProviderConfig, PublisherConfig, StoreConfig, TimelineConfig};
pub use error::{StoreError, StoreResult, TimelineError, TimelineResult};
pub use events::{
    ApplicationContext, EventKind, LifecycleEvent, LifecycleListener, ListenerAdapter,
    TimelineEvent,
};
pub use provider::{
    ApplicationDetail, ApplicationListingEntry, CompletionFilter, HistoryProvider,
    ProviderDiagnostics,
};
pub use publisher::{FlushReport, MetricsSnapshot};
pub use registry::StoreRegistry;
pub use service::{ServiceHealth, TimelineService};
pub use state_machine::ServiceState;
pub use store::{InMemoryTimelineStore, PrimaryFilter, TimelineEntity, TimelineStore};
