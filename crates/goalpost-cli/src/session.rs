//! One CLI invocation's view of the remote: a coordinator plus lookup
//! helpers that load what a command needs before it mutates anything.

use std::sync::Arc;

use anyhow::{Context, Result};

use goalpost_core::{MutationCoordinator, Pending, StoreHandle};
use goalpost_remote::models::{Goal, Id, Task};
use goalpost_remote::{HttpGateway, RemoteGateway};

use crate::config::GoalpostConfig;

pub struct Session {
    pub coordinator: MutationCoordinator,
}

impl Session {
    /// Build a session talking HTTP to the configured remote.
    pub fn connect(config: &GoalpostConfig) -> Result<Self> {
        let gateway = HttpGateway::new(config.remote.clone()).context("failed to build HTTP client")?;
        tracing::debug!(base_url = %config.remote.base_url, "connecting");
        Ok(Self::with_gateway(Arc::new(gateway), config))
    }

    pub fn with_gateway(gateway: Arc<dyn RemoteGateway>, config: &GoalpostConfig) -> Self {
        Self {
            coordinator: MutationCoordinator::new(gateway, config.coordinator),
        }
    }

    pub fn store(&self) -> StoreHandle {
        self.coordinator.store()
    }

    /// Load the goal list.
    pub async fn goals(&self) -> Result<Vec<Goal>> {
        self.coordinator
            .load_goals()
            .await
            .context("failed to load goals")
    }

    /// Load the goal list and return goal `id`.
    pub async fn goal(&self, id: i64) -> Result<Goal> {
        self.goals()
            .await?
            .into_iter()
            .find(|g| g.id == Id::Server(id))
            .with_context(|| format!("goal {id} not found"))
    }

    /// Load goal `id` together with its task collection.
    pub async fn goal_with_tasks(&self, id: i64) -> Result<(Goal, Vec<Task>)> {
        let goal = self.goal(id).await?;
        let tasks = self
            .coordinator
            .refresh_tasks(goal.id)
            .await
            .with_context(|| format!("failed to load tasks of goal {id}"))?;
        Ok((goal, tasks))
    }

    /// Find task `id` by loading goals and their tasks until it turns up.
    pub async fn task(&self, id: i64) -> Result<Task> {
        let wanted = Id::Server(id);
        for goal in self.goals().await? {
            let tasks = self
                .coordinator
                .refresh_tasks(goal.id)
                .await
                .with_context(|| format!("failed to load tasks of goal {}", goal.id))?;
            if let Some(task) = tasks.into_iter().find(|t| t.id == wanted) {
                return Ok(task);
            }
        }
        anyhow::bail!("task {id} not found")
    }
}

/// Wait for a pending mutation and turn a rollback into an error.
pub async fn settle<T>(pending: Pending<T>) -> Result<T> {
    let operation = pending.operation();
    pending
        .settle()
        .await
        .into_result()
        .with_context(|| format!("could not {operation}"))
}
