use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    UnsupportedOrientation,
    HardwareUnavailable,
    ProtocolBusy,
    EmptyHistory,
}

/// Every failure the positioning core reports. All of them are recoverable
/// and meant to be shown to the operator, none are fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositioningError {
    #[error("invalid value '{input}' for {field}")]
    Validation { field: String, input: String },
    #[error("unsupported orientation code {axes:?}")]
    UnsupportedOrientation { axes: [i64; 3] },
    #[error("actuator unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("a move is already in progress")]
    ProtocolBusy,
    #[error("no movements to revert")]
    EmptyHistory,
}

impl PositioningError {
    pub fn validation(field: impl Into<String>, input: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            input: input.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PositioningError::Validation { .. } => ErrorCode::Validation,
            PositioningError::UnsupportedOrientation { .. } => ErrorCode::UnsupportedOrientation,
            PositioningError::HardwareUnavailable(_) => ErrorCode::HardwareUnavailable,
            PositioningError::ProtocolBusy => ErrorCode::ProtocolBusy,
            PositioningError::EmptyHistory => ErrorCode::EmptyHistory,
        }
    }

    /// Warnings are no-ops for the operator; everything else blocked an action.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            PositioningError::Validation { .. }
                | PositioningError::UnsupportedOrientation { .. }
                | PositioningError::EmptyHistory
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorNotice {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&PositioningError> for OperatorNotice {
    fn from(value: &PositioningError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
