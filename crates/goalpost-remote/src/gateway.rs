//! The `RemoteGateway` trait -- the interface to the goal/task service.
//!
//! Every method maps to exactly one HTTP call. Ids are canonical server ids;
//! callers resolve provisional records before talking to the remote. The
//! trait is object-safe so the coordinator can hold `Arc<dyn RemoteGateway>`.

use async_trait::async_trait;

use crate::models::{
    BatchReorder, Goal, GoalPatch, NewGoal, NewTask, PlanScope, Task, TaskPatch,
};

/// Errors a remote call can fail with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The service could not be reached, or the request timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered 401; the session shell has to re-authenticate.
    #[error("not authenticated")]
    Unauthorized,

    /// The service answered with a non-2xx status.
    #[error("remote rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Adapter interface for the goal/task service.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// `GET /goals`
    async fn list_goals(&self) -> Result<Vec<Goal>, GatewayError>;

    /// `POST /goals`
    async fn create_goal(&self, goal: &NewGoal) -> Result<Goal, GatewayError>;

    /// `PUT /goals/{id}`
    async fn update_goal(&self, id: i64, patch: &GoalPatch) -> Result<Goal, GatewayError>;

    /// `DELETE /goals/{id}`
    async fn delete_goal(&self, id: i64) -> Result<(), GatewayError>;

    /// `GET /goals/{id}/tasks`
    async fn list_tasks(&self, goal_id: i64) -> Result<Vec<Task>, GatewayError>;

    /// `POST /goals/{id}/tasks`
    async fn create_task(&self, goal_id: i64, task: &NewTask) -> Result<Task, GatewayError>;

    /// `PUT /tasks/{id}`
    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, GatewayError>;

    /// `DELETE /tasks/{id}`. The service removes the whole subtree.
    async fn delete_task(&self, id: i64) -> Result<(), GatewayError>;

    /// `POST /tasks/batch-update`
    async fn batch_reorder(&self, batch: &BatchReorder) -> Result<(), GatewayError>;

    /// `POST /goals/{id}/generate-plan` or `POST /tasks/{id}/generate-plan`.
    ///
    /// Returns the tasks the generator created.
    async fn generate_plan(&self, scope: PlanScope) -> Result<Vec<Task>, GatewayError>;
}

// Compile-time assertion: RemoteGateway must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn RemoteGateway) {}
};
