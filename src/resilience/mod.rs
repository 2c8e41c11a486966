//! # Resilience Module
//!
//! Retry with exponential backoff for remote store calls. Exhausted retries
//! are reported to the caller; nothing here retries without bound.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use timeline_history::resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(5));
//! let outcome = policy
//!     .execute("list_entities", Duration::from_secs(10), None, || async {
//!         Ok::<_, timeline_history::StoreError>(vec![1, 2, 3])
//!     })
//!     .await;
//! assert_eq!(outcome.attempts, 1);
//! # }
//! ```

pub mod retry;

pub use retry::{RetryOutcome, RetryPolicy};
