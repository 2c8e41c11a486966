// State machine module for the timeline service lifecycle
//
// Created -> Started -> Stopping -> Stopped, never backwards.

pub mod service_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use service_state_machine::ServiceStateMachine;
pub use states::ServiceState;
