use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Configuration,
    Validation,
    Conflict,
    Storage,
    Reconciliation,
    State,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    #[error("no draw requirements configured; save the settings first")]
    ConfigurationMissing,
    #[error("invalid requirements: {}", .0.join("; "))]
    InvalidRequirements(Vec<String>),
    #[error("could not import coupon candidates: {0}")]
    Import(String),
    #[error("coupon inventory is empty")]
    InventoryEmpty,
    #[error("{} coupon numbers don't meet requirements", .values.len())]
    InventoryInvalid { values: Vec<String> },
    #[error("coupon inventory is not sufficient: {required} prizes required, {available} numbers available")]
    InventoryInsufficient { required: usize, available: usize },
    #[error("previous draw results are stamped on the coupon inventory")]
    ConflictingPriorDraw,
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("commit diverged after {logged} prize records and {stamped} coupon stamps: {message}; reconcile the prize log against the coupon table before drawing again")]
    CommitDiverged {
        logged: usize,
        stamped: usize,
        message: String,
    },
    #[error("cannot {action} while session is {state}")]
    OutOfOrder { action: &'static str, state: String },
}

impl DrawError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DrawError::ConfigurationMissing => ErrorCode::Configuration,
            DrawError::InvalidRequirements(_)
            | DrawError::Import(_)
            | DrawError::InventoryEmpty
            | DrawError::InventoryInvalid { .. }
            | DrawError::InventoryInsufficient { .. } => ErrorCode::Validation,
            DrawError::ConflictingPriorDraw => ErrorCode::Conflict,
            DrawError::Storage(_) => ErrorCode::Storage,
            DrawError::CommitDiverged { .. } => ErrorCode::Reconciliation,
            DrawError::OutOfOrder { .. } => ErrorCode::State,
        }
    }

    /// Validation-class errors are fixed by the operator and retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Validation | ErrorCode::Configuration | ErrorCode::Conflict
        )
    }
}

impl From<anyhow::Error> for DrawError {
    fn from(value: anyhow::Error) -> Self {
        DrawError::Storage(format!("{value:#}"))
    }
}
