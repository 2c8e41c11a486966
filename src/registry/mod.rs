//! # Registry
//!
//! Compile-time registered factories selected by configuration.

pub mod store_registry;

pub use store_registry::{StoreConstructor, StoreRegistry};
