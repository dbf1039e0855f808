//! The two phases of an optimistic mutation.
//!
//! A mutating call returns once its change is visible in the store. The
//! returned [`Pending`] is the *applied-pending* phase; awaiting it runs the
//! remote call and yields the final [`Settlement`].

use std::fmt;
use std::future::IntoFuture;

use futures::future::BoxFuture;

use goalpost_remote::models::Id;

use crate::error::SyncError;

/// How an optimistic mutation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T> {
    /// The remote accepted the change; `T` is the reconciled value.
    Confirmed(T),
    /// The remote call failed and the optimistic change was undone.
    RolledBack(SyncError),
}

impl<T> Settlement<T> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Confirmed(_) => None,
            Self::RolledBack(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<T, SyncError> {
        match self {
            Self::Confirmed(value) => Ok(value),
            Self::RolledBack(err) => Err(err),
        }
    }
}

/// An applied optimistic change whose remote call has not settled.
///
/// The remote call starts on first poll, so it always runs after the
/// optimistic apply. Dropping a `Pending` without awaiting it leaves the
/// optimistic state in place and never contacts the remote.
#[must_use = "the remote call only runs when the pending mutation is awaited"]
pub struct Pending<T> {
    operation: &'static str,
    subject: Id,
    future: BoxFuture<'static, Settlement<T>>,
}

impl<T> Pending<T> {
    pub(crate) fn new(
        operation: &'static str,
        subject: Id,
        future: BoxFuture<'static, Settlement<T>>,
    ) -> Self {
        Self {
            operation,
            subject,
            future,
        }
    }

    /// Human-readable operation name, e.g. `"create task"`.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// The record the change applies to; the temporary id for creates.
    pub fn subject(&self) -> Id {
        self.subject
    }

    /// Run the remote call and reconcile or roll back.
    pub async fn settle(self) -> Settlement<T> {
        self.future.await
    }
}

impl<T> IntoFuture for Pending<T> {
    type Output = Settlement<T>;
    type IntoFuture = BoxFuture<'static, Settlement<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("operation", &self.operation)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// A user-visible report of a failed remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub operation: &'static str,
    pub subject: Option<Id>,
    pub error: SyncError,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not {}: {}", self.operation, self.error)
    }
}
