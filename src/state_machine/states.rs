use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of the timeline service
///
/// States are ordered; the service only ever moves forward through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ServiceState {
    /// Constructed but not yet started; no events accepted
    Created = 0,
    /// Accepting events and publishing in the background
    Started = 1,
    /// No longer accepting events; remaining queue is being flushed
    Stopping = 2,
    /// Flush finished or timed out; terminal
    Stopped = 3,
}

impl ServiceState {
    /// Check if this is the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Check if events may be enqueued in this state
    pub fn accepts_events(&self) -> bool {
        matches!(self, Self::Started)
    }

    /// Check if the publisher loop should still be running
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started | Self::Stopping)
    }

    /// Whether `self -> target` is one of the permitted forward transitions
    pub fn can_transition_to(&self, target: ServiceState) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Started)
                | (Self::Created, Self::Stopped)
                | (Self::Started, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }
}

impl From<u8> for ServiceState {
    fn from(value: u8) -> Self {
        match value {
            0 => ServiceState::Created,
            1 => ServiceState::Started,
            2 => ServiceState::Stopping,
            _ => ServiceState::Stopped,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl std::str::FromStr for ServiceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "started" => Ok(Self::Started),
            "stopping" => Ok(Self::Stopping),
            "stopped" => Ok(Self::Stopped),
            _ => Err(format!("Invalid service state: {s}")),
        }
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::Created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only_transitions() {
        assert!(ServiceState::Created.can_transition_to(ServiceState::Started));
        assert!(ServiceState::Created.can_transition_to(ServiceState::Stopped));
        assert!(ServiceState::Started.can_transition_to(ServiceState::Stopping));
        assert!(ServiceState::Stopping.can_transition_to(ServiceState::Stopped));

        assert!(!ServiceState::Started.can_transition_to(ServiceState::Created));
        assert!(!ServiceState::Stopped.can_transition_to(ServiceState::Started));
        assert!(!ServiceState::Stopping.can_transition_to(ServiceState::Started));
        assert!(!ServiceState::Started.can_transition_to(ServiceState::Started));
    }

    #[test]
    fn test_u8_round_trip_matches_discriminants() {
        for state in [
            ServiceState::Created,
            ServiceState::Started,
            ServiceState::Stopping,
            ServiceState::Stopped,
        ] {
            assert_eq!(ServiceState::from(state as u8), state);
        }
        assert_eq!(ServiceState::from(42), ServiceState::Stopped);
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(ServiceState::Stopping.to_string(), "stopping");
        assert_eq!(
            "started".parse::<ServiceState>().unwrap(),
            ServiceState::Started
        );
        assert!("running".parse::<ServiceState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&ServiceState::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
    }
}
