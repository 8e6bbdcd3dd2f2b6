//! Backend connectivity state and the caller-side transitions around it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnalysisError;

/// Connectivity state as seen by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Connected,
    Disconnected,
    Checking,
}

impl ConnectivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Checking => "checking",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "connected" => Some(Self::Connected),
            "disconnected" => Some(Self::Disconnected),
            "checking" => Some(Self::Checking),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of a successful health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Tracks connectivity for a caller and applies the usual transitions:
///
/// ```text
/// checking     --(health ok)--------------> connected
/// checking     --(health failed)----------> disconnected
/// connected    --(analysis lost network)--> disconnected
/// disconnected --(retry, health ok)-------> connected
/// ```
///
/// Nothing here polls; every transition is driven by an explicit call.
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    state: ConnectivityState,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    /// Starts in `checking`, since nothing is known until the first probe.
    pub fn new() -> Self {
        Self {
            state: ConnectivityState::Checking,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Mark a probe as in flight.
    pub fn begin_check(&mut self) -> ConnectivityState {
        self.transition(ConnectivityState::Checking)
    }

    /// Apply the outcome of a health probe.
    pub fn record_health(
        &mut self,
        outcome: &Result<HealthStatus, AnalysisError>,
    ) -> ConnectivityState {
        match outcome {
            Ok(_) => self.transition(ConnectivityState::Connected),
            Err(_) => self.transition(ConnectivityState::Disconnected),
        }
    }

    /// Apply the outcome of a failed analysis. Only transport-level failures
    /// (network errors, timeouts) drop the connection.
    pub fn record_analysis_failure(&mut self, err: &AnalysisError) -> ConnectivityState {
        if self.state == ConnectivityState::Connected && err.is_connectivity_loss() {
            self.transition(ConnectivityState::Disconnected)
        } else {
            self.state
        }
    }

    /// Analysis should only be attempted while connected.
    pub fn can_analyze(&self) -> bool {
        self.state == ConnectivityState::Connected
    }

    fn transition(&mut self, next: ConnectivityState) -> ConnectivityState {
        if self.state != next {
            debug!("Connectivity {} -> {}", self.state, next);
        }
        self.state = next;
        next
    }
}
