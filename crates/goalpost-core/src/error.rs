//! Error taxonomy of the sync engine.
//!
//! Validation errors are raised synchronously, before anything is applied.
//! Every other variant reaches the caller inside a rolled-back
//! [`Settlement`](crate::sync::Settlement) after the matching optimistic
//! change has been undone. None of them is fatal.

use goalpost_remote::GatewayError;
use goalpost_remote::models::Id;

use crate::order::OrderError;

/// A request rejected before any optimistic apply or network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("nothing to update")]
    EmptyPatch,

    #[error("goal {0} not found")]
    GoalNotFound(Id),

    #[error("task {0} not found")]
    TaskNotFound(Id),

    #[error("parent task {parent} is not part of goal {goal}")]
    ParentNotInGoal { parent: Id, goal: Id },

    #[error("{0} is still being created")]
    Provisional(Id),

    #[error("task {0} has subtasks; delete the whole subtree instead")]
    HasChildren(Id),

    #[error("reorder batch is empty")]
    EmptyBatch,

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Errors surfaced by the mutation coordinator and plan bridge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("could not reach the server: {0}")]
    Transport(String),

    #[error("server rejected the request ({status}): {message}")]
    RemoteRejection { status: u16, message: String },

    /// The session shell owns recovery from this one.
    #[error("not signed in")]
    Unauthenticated,

    #[error("server response does not match local state: {0}")]
    ReconciliationMismatch(String),
}

impl SyncError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<GatewayError> for SyncError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport(msg) => Self::Transport(msg),
            GatewayError::Decode(msg) => Self::Transport(format!("unreadable response: {msg}")),
            GatewayError::Unauthorized => Self::Unauthenticated,
            GatewayError::Rejected { status, message } => {
                Self::RemoteRejection { status, message }
            }
        }
    }
}

impl From<OrderError> for SyncError {
    fn from(err: OrderError) -> Self {
        Self::Validation(ValidationError::Order(err))
    }
}
