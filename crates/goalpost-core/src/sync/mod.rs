//! The mutation coordinator: optimistic apply, remote call, reconcile or
//! roll back.
//!
//! Every mutating operation validates, applies its change to the store
//! synchronously, and returns a [`Pending`]. Awaiting the pending value
//! issues the remote call and then either reconciles the store with the
//! server's answer or undoes exactly the change it applied.
//!
//! There is no per-record locking. Two in-flight mutations of the same
//! record both apply immediately and settle in the order their responses
//! arrive.

mod pending;
mod tasks;

use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use goalpost_remote::RemoteGateway;
use goalpost_remote::models::{Goal, GoalPatch, Id, NewGoal, Task};

use crate::error::{SyncError, ValidationError};
use crate::order::ReorderScope;
use crate::store::StoreHandle;

pub use pending::{Notice, Pending, Settlement};

/// Capacity of the notice channel. Slow subscribers see `Lagged`.
const NOTICE_CAPACITY: usize = 64;

/// Behaviour switches of the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub reorder_scope: ReorderScope,
}

/// Sole writer of the store.
///
/// Cloning is cheap; clones share the store, the gateway and the notice
/// channel.
#[derive(Clone)]
pub struct MutationCoordinator {
    store: StoreHandle,
    gateway: Arc<dyn RemoteGateway>,
    config: CoordinatorConfig,
    notices: broadcast::Sender<Notice>,
}

impl std::fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("config", &self.config)
            .field("revision", &self.store.revision())
            .finish_non_exhaustive()
    }
}

impl MutationCoordinator {
    pub fn new(gateway: Arc<dyn RemoteGateway>, config: CoordinatorConfig) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            store: StoreHandle::new(),
            gateway,
            config,
            notices,
        }
    }

    /// Read-only view of the store this coordinator writes.
    pub fn store(&self) -> StoreHandle {
        self.store.clone()
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.config
    }

    /// Receive a [`Notice`] for every rollback and failed fetch from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub(crate) fn gateway(&self) -> &Arc<dyn RemoteGateway> {
        &self.gateway
    }

    pub(crate) fn notify(&self, operation: &'static str, subject: Option<Id>, error: &SyncError) {
        // No subscribers is fine.
        let _ = self.notices.send(Notice {
            operation,
            subject,
            error: error.clone(),
        });
    }

    /// Log and publish a rollback, then wrap it as a settlement.
    fn rolled_back<T>(&self, operation: &'static str, subject: Id, error: SyncError) -> Settlement<T> {
        tracing::warn!(%subject, %error, "{operation} rolled back");
        self.notify(operation, Some(subject), &error);
        Settlement::RolledBack(error)
    }

    // -----------------------------------------------------------------------
    // Goals
    // -----------------------------------------------------------------------

    /// Fetch the goal list and replace the local one.
    ///
    /// Goals still waiting for their create call are kept. A selection that
    /// points at a goal the server no longer lists is cleared.
    pub async fn load_goals(&self) -> Result<Vec<Goal>, SyncError> {
        let result = match self.gateway.list_goals().await {
            Ok(goals) => match goals.iter().find(|g| g.id.is_provisional()) {
                Some(bad) => Err(SyncError::ReconciliationMismatch(format!(
                    "goal listing contains non-server id {}",
                    bad.id
                ))),
                None => Ok(goals),
            },
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(goals) => {
                tracing::debug!(count = goals.len(), "goals loaded");
                self.store.write().set_goals(goals.clone());
                Ok(goals)
            }
            Err(err) => {
                tracing::warn!(error = %err, "loading goals failed");
                self.notify("load goals", None, &err);
                Err(err)
            }
        }
    }

    /// Make `id` the selected goal.
    pub fn select_goal(&self, id: Id) -> Result<(), SyncError> {
        let mut store = self.store.write();
        if store.goal(id).is_none() {
            return Err(ValidationError::GoalNotFound(id).into());
        }
        store.select(Some(id));
        Ok(())
    }

    pub fn clear_selection(&self) {
        self.store.write().select(None);
    }

    /// Create a goal. The provisional goal is selected right away; the
    /// selection follows it to its server id on success.
    pub fn create_goal(&self, title: &str) -> Result<Pending<Goal>, SyncError> {
        let title = non_empty_title(title)?;
        let temp = Id::new_local();
        {
            let mut store = self.store.write();
            store.push_goal(Goal {
                id: temp,
                title: title.clone(),
                created_at: None,
            });
            store.select(Some(temp));
        }
        tracing::debug!(goal_id = %temp, "provisional goal applied");

        let this = self.clone();
        let body = NewGoal { title };
        let future = async move {
            let result = match this.gateway.create_goal(&body).await {
                Ok(goal) if goal.id.is_provisional() => Err(SyncError::ReconciliationMismatch(
                    format!("created goal has non-server id {}", goal.id),
                )),
                Ok(goal) => Ok(goal),
                Err(err) => Err(err.into()),
            };
            match result {
                Ok(goal) => {
                    this.store.write().reconcile_goal(temp, goal.clone());
                    tracing::info!(goal_id = %goal.id, "goal created");
                    Settlement::Confirmed(goal)
                }
                Err(err) => {
                    this.store.write().remove_goal(temp);
                    this.rolled_back("create goal", temp, err)
                }
            }
        };
        Ok(Pending::new("create goal", temp, future.boxed()))
    }

    /// Apply `patch` to a goal.
    pub fn update_goal(&self, id: Id, mut patch: GoalPatch) -> Result<Pending<Goal>, SyncError> {
        if patch.is_empty() {
            return Err(ValidationError::EmptyPatch.into());
        }
        if let Some(title) = patch.title.take() {
            patch.title = Some(non_empty_title(&title)?);
        }
        let server_id = confirmed(id)?;
        let previous = {
            let mut store = self.store.write();
            let previous = store
                .goal(id)
                .cloned()
                .ok_or(ValidationError::GoalNotFound(id))?;
            let mut updated = previous.clone();
            patch.apply_to(&mut updated);
            store.replace_goal(id, updated);
            previous
        };
        tracing::debug!(goal_id = %id, "goal update applied");

        let this = self.clone();
        let future = async move {
            let result = match this.gateway.update_goal(server_id, &patch).await {
                Ok(goal) if goal.id != id => Err(SyncError::ReconciliationMismatch(format!(
                    "update of goal {id} answered with goal {}",
                    goal.id
                ))),
                Ok(goal) => Ok(goal),
                Err(err) => Err(err.into()),
            };
            match result {
                Ok(goal) => {
                    this.store.write().replace_goal(id, goal.clone());
                    tracing::info!(goal_id = %id, "goal updated");
                    Settlement::Confirmed(goal)
                }
                Err(err) => {
                    // A goal deleted in the meantime stays deleted.
                    this.store.write().replace_goal(id, previous);
                    this.rolled_back("update goal", id, err)
                }
            }
        };
        Ok(Pending::new("update goal", id, future.boxed()))
    }

    /// Delete a goal and its tasks.
    ///
    /// Selection is cleared immediately if it pointed at the goal, and is
    /// not restored by a rollback.
    pub fn delete_goal(&self, id: Id) -> Result<Pending<()>, SyncError> {
        let server_id = confirmed(id)?;
        let removed = self
            .store
            .write()
            .remove_goal(id)
            .ok_or(ValidationError::GoalNotFound(id))?;
        tracing::debug!(goal_id = %id, "goal removal applied");

        let this = self.clone();
        let future = async move {
            match this.gateway.delete_goal(server_id).await {
                Ok(()) => {
                    tracing::info!(goal_id = %id, "goal deleted");
                    Settlement::Confirmed(())
                }
                Err(err) => {
                    this.store.write().restore_goal(removed);
                    this.rolled_back("delete goal", id, err.into())
                }
            }
        };
        Ok(Pending::new("delete goal", id, future.boxed()))
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    /// Re-fetch one goal's task collection and replace the local one.
    ///
    /// Tasks still waiting for their create call are kept. A listing that
    /// contains tasks of another goal is rejected and leaves the store as it
    /// was.
    pub async fn refresh_tasks(&self, goal_id: Id) -> Result<Vec<Task>, SyncError> {
        let server_id = confirmed(goal_id)?;
        if self.store.goal(goal_id).is_none() {
            return Err(ValidationError::GoalNotFound(goal_id).into());
        }
        let result = match self.gateway.list_tasks(server_id).await {
            Ok(tasks) => match tasks.iter().find(|t| t.goal_id != goal_id) {
                Some(stray) => Err(SyncError::ReconciliationMismatch(format!(
                    "task listing for goal {goal_id} contains task {} of goal {}",
                    stray.id, stray.goal_id
                ))),
                None => Ok(tasks),
            },
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(tasks) => {
                tracing::debug!(goal_id = %goal_id, count = tasks.len(), "tasks refreshed");
                let mut store = self.store.write();
                store.set_tasks(goal_id, tasks);
                Ok(store.tasks(goal_id).to_vec())
            }
            Err(err) => {
                tracing::warn!(goal_id = %goal_id, error = %err, "refreshing tasks failed");
                self.notify("refresh tasks", Some(goal_id), &err);
                Err(err)
            }
        }
    }
}

/// Trim a title and reject it if nothing is left.
fn non_empty_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(title.to_owned())
}

/// The server id of a record, or a validation error for provisional ones.
fn confirmed(id: Id) -> Result<i64, ValidationError> {
    id.server().ok_or(ValidationError::Provisional(id))
}
