//! State machine for tracking the publish pipeline
//!
//! The pipeline is linear: every state has exactly one successor, and any
//! non-terminal state may abort. State is kept in memory only.

use crate::core::error::PublishError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Publishing state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishState {
    Initial,
    IdentityResolved,
    RepositoryEnsured,
    Authenticated,
    Built,
    Tagged,
    Pushed,
    Aborted,
}

impl PublishState {
    /// Next state in the pipeline, `None` for terminal states
    pub fn next(self) -> Option<PublishState> {
        match self {
            Self::Initial => Some(Self::IdentityResolved),
            Self::IdentityResolved => Some(Self::RepositoryEnsured),
            Self::RepositoryEnsured => Some(Self::Authenticated),
            Self::Authenticated => Some(Self::Built),
            Self::Built => Some(Self::Tagged),
            Self::Tagged => Some(Self::Pushed),
            Self::Pushed | Self::Aborted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Pushed | Self::Aborted)
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    /// From state
    pub from: PublishState,

    /// To state
    pub to: PublishState,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Additional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// State machine for tracking the publish pipeline
#[derive(Debug)]
pub struct PublishStateMachine {
    current_state: PublishState,
    transitions: Vec<StateTransition>,
    error: Option<String>,
}

impl Default for PublishStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishStateMachine {
    /// Create a new state machine
    pub fn new() -> Self {
        Self {
            current_state: PublishState::Initial,
            transitions: Vec::new(),
            error: None,
        }
    }

    /// Advance to the next pipeline state
    pub fn advance(
        &mut self,
        to: PublishState,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<(), PublishError> {
        if self.current_state.next() != Some(to) {
            return Err(PublishError::InvalidTransition {
                from: self.current_state.to_string(),
                to: to.to_string(),
            });
        }

        self.record(to, metadata);
        Ok(())
    }

    /// Abort the pipeline from any non-terminal state
    pub fn abort(&mut self, error: &PublishError) -> Result<(), PublishError> {
        if self.current_state.is_terminal() {
            return Err(PublishError::InvalidTransition {
                from: self.current_state.to_string(),
                to: PublishState::Aborted.to_string(),
            });
        }

        let mut metadata = HashMap::new();
        metadata.insert(
            "code".to_string(),
            serde_json::Value::String(error.code().to_string()),
        );

        self.error = Some(error.to_string());
        self.record(PublishState::Aborted, Some(metadata));
        Ok(())
    }

    fn record(&mut self, to: PublishState, metadata: Option<HashMap<String, serde_json::Value>>) {
        tracing::debug!("state: {} → {}", self.current_state, to);

        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
            metadata,
        });
        self.current_state = to;
    }

    /// Get current state
    pub fn get_state(&self) -> PublishState {
        self.current_state
    }

    /// Transition history
    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Get last error
    pub fn get_last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Get elapsed time between the first and last transition (ms)
    pub fn get_elapsed_time(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_milliseconds(),
            _ => 0,
        }
    }

    /// Get transition history as human-readable string
    pub fn get_history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                let time = t.timestamp.to_rfc3339();
                let meta = if let Some(metadata) = &t.metadata {
                    format!(" ({})", serde_json::to_string(metadata).unwrap_or_default())
                } else {
                    String::new()
                };
                format!("{}: {} → {}{}", time, t.from, t.to, meta)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
