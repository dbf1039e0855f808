//! The generate-plan cycle.
//!
//! Each target moves `Idle -> Generating -> Idle`. While a target is
//! generating, a second request for it is a no-op. A successful generation
//! re-fetches the owning goal's task collection; a failed one changes
//! nothing and publishes a notice.

use std::collections::HashSet;
use std::fmt;
use std::future::IntoFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;

use goalpost_remote::models::{Id, PlanScope, Task};

use crate::error::{SyncError, ValidationError};
use crate::sync::MutationCoordinator;

/// What a plan is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanTarget {
    /// Top-level tasks of a goal.
    Goal(Id),
    /// Subtasks of a task.
    Task(Id),
}

impl PlanTarget {
    pub fn id(self) -> Id {
        match self {
            Self::Goal(id) | Self::Task(id) => id,
        }
    }

    fn scope(self) -> Result<PlanScope, ValidationError> {
        let server_id = self
            .id()
            .server()
            .ok_or(ValidationError::Provisional(self.id()))?;
        Ok(match self {
            Self::Goal(_) => PlanScope::Goal(server_id),
            Self::Task(_) => PlanScope::Task(server_id),
        })
    }
}

impl fmt::Display for PlanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Goal(id) => write!(f, "goal {id}"),
            Self::Task(id) => write!(f, "task {id}"),
        }
    }
}

/// Whether a target has a generation in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerationState {
    #[default]
    Idle,
    Generating,
}

/// How a generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The plan was created and the goal's tasks re-fetched.
    Refreshed {
        /// Tasks the generator reported as created.
        created: Vec<Task>,
        /// The goal's collection after the refresh.
        tasks: Vec<Task>,
    },
    /// Nothing changed locally.
    Failed(SyncError),
}

impl GenerationOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }
}

type InFlight = Arc<Mutex<HashSet<PlanTarget>>>;

/// Drives plan generation on top of a [`MutationCoordinator`].
#[derive(Debug, Clone)]
pub struct PlanGenerationBridge {
    coordinator: MutationCoordinator,
    in_flight: InFlight,
}

impl PlanGenerationBridge {
    pub fn new(coordinator: MutationCoordinator) -> Self {
        Self {
            coordinator,
            in_flight: InFlight::default(),
        }
    }

    pub fn state(&self, target: PlanTarget) -> GenerationState {
        if lock(&self.in_flight).contains(&target) {
            GenerationState::Generating
        } else {
            GenerationState::Idle
        }
    }

    /// Start generating a plan for `target`.
    ///
    /// Returns `Ok(None)` if `target` is already generating. The target
    /// enters `Generating` immediately and returns to `Idle` when the
    /// returned value settles or is dropped. Callers check
    /// [`StoreHandle::can_generate_plan`](crate::StoreHandle::can_generate_plan)
    /// first; the bridge does not look at the target's children.
    pub fn generate(&self, target: PlanTarget) -> Result<Option<PendingGeneration>, SyncError> {
        let scope = target.scope()?;
        let store = self.coordinator.store();
        let goal_id = match target {
            PlanTarget::Goal(id) => store
                .goal(id)
                .map(|g| g.id)
                .ok_or(ValidationError::GoalNotFound(id))?,
            PlanTarget::Task(id) => store
                .task(id)
                .map(|t| t.goal_id)
                .ok_or(ValidationError::TaskNotFound(id))?,
        };

        if !lock(&self.in_flight).insert(target) {
            tracing::debug!(plan_target = %target, "plan generation already running");
            return Ok(None);
        }
        let guard = Generating {
            in_flight: Arc::clone(&self.in_flight),
            target,
        };
        tracing::debug!(plan_target = %target, "plan generation started");

        let coordinator = self.coordinator.clone();
        let future = async move {
            let _guard = guard;
            let created = match coordinator.gateway().generate_plan(scope).await {
                Ok(created) => created,
                Err(err) => {
                    let err = SyncError::from(err);
                    tracing::warn!(plan_target = %target, error = %err, "plan generation failed");
                    coordinator.notify("generate plan", Some(target.id()), &err);
                    return GenerationOutcome::Failed(err);
                }
            };
            // A failed refresh has already published its own notice.
            match coordinator.refresh_tasks(goal_id).await {
                Ok(tasks) => {
                    tracing::info!(plan_target = %target, created = created.len(), "plan generated");
                    GenerationOutcome::Refreshed { created, tasks }
                }
                Err(err) => GenerationOutcome::Failed(err),
            }
        };
        Ok(Some(PendingGeneration {
            target,
            future: future.boxed(),
        }))
    }
}

/// A generation in flight. Awaiting it runs the request and the refresh.
#[must_use = "the generate-plan request only runs when awaited"]
pub struct PendingGeneration {
    target: PlanTarget,
    future: BoxFuture<'static, GenerationOutcome>,
}

impl PendingGeneration {
    pub fn target(&self) -> PlanTarget {
        self.target
    }

    pub async fn settle(self) -> GenerationOutcome {
        self.future.await
    }
}

impl IntoFuture for PendingGeneration {
    type Output = GenerationOutcome;
    type IntoFuture = BoxFuture<'static, GenerationOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

impl fmt::Debug for PendingGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingGeneration")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Clears the target's `Generating` state on drop.
struct Generating {
    in_flight: InFlight,
    target: PlanTarget,
}

impl Drop for Generating {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.target);
    }
}

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashSet<PlanTarget>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}
