pub mod builders;
pub mod flaky_store;
pub mod strategies;

pub use builders::*;
pub use flaky_store::*;
