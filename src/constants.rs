//! # System Constants
//!
//! Names shared between the publisher (which writes them onto entities) and
//! the history provider (which queries by them).

/// Entity type used when none is configured
pub const DEFAULT_ENTITY_TYPE: &str = "application_timeline";

/// Store backend used when none is configured
pub const DEFAULT_STORE_BACKEND: &str = "memory";

/// Primary filter keys attached to entities at post time
pub mod filters {
    pub const APPLICATION_ID: &str = "applicationId";
    pub const USER: &str = "user";
    pub const HAS_END_EVENT: &str = "hasEndEvent";
    pub const TRUE: &str = "true";
}

/// Keys of the free-form `other_info` map on posted entities
pub mod other_info {
    pub const LAST_UPDATED: &str = "lastUpdated";
    pub const BATCH_SEQUENCE: &str = "batchSequence";
}
