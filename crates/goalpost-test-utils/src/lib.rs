//! Shared test utilities for goalpost integration tests.
//!
//! Provides two remotes:
//! - **[`FakeGateway`]**: an in-memory [`RemoteGateway`] that follows the
//!   service's rules (sequential ids, `order_idx = max + 1` on create,
//!   subtree delete) with fault injection ([`FakeGateway::fail_next`]) and
//!   response holds ([`FakeGateway::hold_next`]) for driving races.
//! - **[`spawn_stub_server`]**: serves an axum router on an ephemeral port so
//!   the HTTP gateway can be exercised over a real socket.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use goalpost_remote::gateway::{GatewayError, RemoteGateway};
use goalpost_remote::models::{
    BatchReorder, Goal, GoalPatch, Id, NewGoal, NewTask, PlanScope, Task, TaskPatch, TaskStatus,
};

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// Kind of remote operation, used to target failures and holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListGoals,
    CreateGoal,
    UpdateGoal,
    DeleteGoal,
    ListTasks,
    CreateTask,
    UpdateTask,
    DeleteTask,
    BatchReorder,
    GeneratePlan,
}

/// One recorded call with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListGoals,
    CreateGoal(NewGoal),
    UpdateGoal(i64, GoalPatch),
    DeleteGoal(i64),
    ListTasks(i64),
    CreateTask(i64, NewTask),
    UpdateTask(i64, TaskPatch),
    DeleteTask(i64),
    BatchReorder(BatchReorder),
    GeneratePlan(PlanScope),
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Self::ListGoals => Op::ListGoals,
            Self::CreateGoal(_) => Op::CreateGoal,
            Self::UpdateGoal(..) => Op::UpdateGoal,
            Self::DeleteGoal(_) => Op::DeleteGoal,
            Self::ListTasks(_) => Op::ListTasks,
            Self::CreateTask(..) => Op::CreateTask,
            Self::UpdateTask(..) => Op::UpdateTask,
            Self::DeleteTask(_) => Op::DeleteTask,
            Self::BatchReorder(_) => Op::BatchReorder,
            Self::GeneratePlan(_) => Op::GeneratePlan,
        }
    }
}

/// Handle that lets a held call proceed.
///
/// Dropping the handle also releases the call.
pub struct Release(oneshot::Sender<()>);

impl Release {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

// ---------------------------------------------------------------------------
// Fake gateway
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeState {
    goals: Vec<Goal>,
    tasks: Vec<Task>,
    next_id: i64,
    calls: Vec<Call>,
    failures: HashMap<Op, VecDeque<GatewayError>>,
    holds: HashMap<Op, VecDeque<oneshot::Receiver<()>>>,
    plan_titles: Vec<String>,
}

impl FakeState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn next_order(&self, goal_id: i64, parent_id: Option<i64>) -> u32 {
        self.tasks
            .iter()
            .filter(|t| t.goal_id == Id::Server(goal_id) && t.parent_id == parent_id.map(Id::Server))
            .map(|t| t.order_idx + 1)
            .max()
            .unwrap_or(0)
    }

    fn insert_task(
        &mut self,
        goal_id: i64,
        parent_id: Option<i64>,
        title: &str,
        description: Option<String>,
    ) -> Task {
        let order_idx = self.next_order(goal_id, parent_id);
        let task = Task {
            id: Id::Server(self.allocate_id()),
            goal_id: Id::Server(goal_id),
            parent_id: parent_id.map(Id::Server),
            title: title.to_owned(),
            description,
            status: TaskStatus::Active,
            order_idx,
            created_at: None,
        };
        self.tasks.push(task.clone());
        task
    }

    fn has_goal(&self, id: i64) -> bool {
        self.goals.iter().any(|g| g.id == Id::Server(id))
    }

    fn subtree_ids(&self, root: Id) -> Vec<Id> {
        let mut ids = vec![root];
        let mut i = 0;
        while i < ids.len() {
            let current = ids[i];
            ids.extend(
                self.tasks
                    .iter()
                    .filter(|t| t.parent_id == Some(current))
                    .map(|t| t.id),
            );
            i += 1;
        }
        ids
    }
}

fn not_found(what: &str, id: i64) -> GatewayError {
    GatewayError::Rejected {
        status: 404,
        message: format!("{what} {id} not found"),
    }
}

/// In-memory stand-in for the goal/task service.
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                plan_titles: vec!["Research".to_owned(), "Draft".to_owned(), "Review".to_owned()],
                ..FakeState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake gateway lock poisoned")
    }

    // -- Seeding --

    /// Insert a goal directly, bypassing the call log.
    pub fn seed_goal(&self, title: &str) -> Goal {
        let mut state = self.lock();
        let goal = Goal {
            id: Id::Server(state.allocate_id()),
            title: title.to_owned(),
            created_at: None,
        };
        state.goals.push(goal.clone());
        goal
    }

    /// Insert a task directly, bypassing the call log.
    pub fn seed_task(&self, goal: &Goal, parent: Option<&Task>, title: &str) -> Task {
        let goal_id = goal.id.server().expect("seeded goal has a server id");
        let parent_id = parent.and_then(|p| p.id.server());
        self.lock().insert_task(goal_id, parent_id, title, None)
    }

    /// Titles the fake plan generator creates under its target.
    pub fn set_plan_titles(&self, titles: &[&str]) {
        self.lock().plan_titles = titles.iter().map(|t| (*t).to_owned()).collect();
    }

    // -- Fault injection --

    /// Make the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: Op, err: GatewayError) {
        self.lock().failures.entry(op).or_default().push_back(err);
    }

    /// Hold the next call of `op` until the returned handle is released.
    ///
    /// The call is recorded immediately; the service-side effect and the
    /// response happen only after release, in release order.
    pub fn hold_next(&self, op: Op) -> Release {
        let (tx, rx) = oneshot::channel();
        self.lock().holds.entry(op).or_default().push_back(rx);
        Release(tx)
    }

    // -- Inspection --

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn goals(&self) -> Vec<Goal> {
        self.lock().goals.clone()
    }

    pub fn tasks(&self, goal: &Goal) -> Vec<Task> {
        self.lock()
            .tasks
            .iter()
            .filter(|t| t.goal_id == goal.id)
            .cloned()
            .collect()
    }

    /// Record the call, wait out any hold, then report an injected failure.
    async fn enter(&self, call: Call) -> Result<(), GatewayError> {
        let op = call.op();
        let hold = {
            let mut state = self.lock();
            state.calls.push(call);
            state.holds.get_mut(&op).and_then(VecDeque::pop_front)
        };
        if let Some(rx) = hold {
            let _ = rx.await;
        }
        match self.lock().failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn list_goals(&self) -> Result<Vec<Goal>, GatewayError> {
        self.enter(Call::ListGoals).await?;
        Ok(self.lock().goals.clone())
    }

    async fn create_goal(&self, goal: &NewGoal) -> Result<Goal, GatewayError> {
        self.enter(Call::CreateGoal(goal.clone())).await?;
        if goal.title.is_empty() {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "Missing goal title".to_owned(),
            });
        }
        let mut state = self.lock();
        let created = Goal {
            id: Id::Server(state.allocate_id()),
            title: goal.title.clone(),
            created_at: None,
        };
        state.goals.push(created.clone());
        Ok(created)
    }

    async fn update_goal(&self, id: i64, patch: &GoalPatch) -> Result<Goal, GatewayError> {
        self.enter(Call::UpdateGoal(id, patch.clone())).await?;
        let mut state = self.lock();
        let goal = state
            .goals
            .iter_mut()
            .find(|g| g.id == Id::Server(id))
            .ok_or_else(|| not_found("goal", id))?;
        patch.apply_to(goal);
        Ok(goal.clone())
    }

    async fn delete_goal(&self, id: i64) -> Result<(), GatewayError> {
        self.enter(Call::DeleteGoal(id)).await?;
        let mut state = self.lock();
        if !state.has_goal(id) {
            return Err(not_found("goal", id));
        }
        state.goals.retain(|g| g.id != Id::Server(id));
        state.tasks.retain(|t| t.goal_id != Id::Server(id));
        Ok(())
    }

    async fn list_tasks(&self, goal_id: i64) -> Result<Vec<Task>, GatewayError> {
        self.enter(Call::ListTasks(goal_id)).await?;
        let state = self.lock();
        if !state.has_goal(goal_id) {
            return Err(not_found("goal", goal_id));
        }
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.goal_id == Id::Server(goal_id))
            .cloned()
            .collect())
    }

    async fn create_task(&self, goal_id: i64, task: &NewTask) -> Result<Task, GatewayError> {
        self.enter(Call::CreateTask(goal_id, task.clone())).await?;
        let mut state = self.lock();
        if !state.has_goal(goal_id) {
            return Err(not_found("goal", goal_id));
        }
        Ok(state.insert_task(goal_id, task.parent_id, &task.title, task.description.clone()))
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, GatewayError> {
        self.enter(Call::UpdateTask(id, patch.clone())).await?;
        let mut state = self.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == Id::Server(id))
            .ok_or_else(|| not_found("task", id))?;
        patch.apply_to(task);
        Ok(task.clone())
    }

    async fn delete_task(&self, id: i64) -> Result<(), GatewayError> {
        self.enter(Call::DeleteTask(id)).await?;
        let mut state = self.lock();
        if !state.tasks.iter().any(|t| t.id == Id::Server(id)) {
            return Err(not_found("task", id));
        }
        let doomed = state.subtree_ids(Id::Server(id));
        state.tasks.retain(|t| !doomed.contains(&t.id));
        Ok(())
    }

    async fn batch_reorder(&self, batch: &BatchReorder) -> Result<(), GatewayError> {
        self.enter(Call::BatchReorder(batch.clone())).await?;
        let mut state = self.lock();
        if batch.updates.is_empty() {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "No updates provided".to_owned(),
            });
        }
        if let Some(missing) = batch
            .updates
            .iter()
            .find(|u| !state.tasks.iter().any(|t| t.id == Id::Server(u.id)))
        {
            return Err(not_found("task", missing.id));
        }
        for update in &batch.updates {
            if let Some(task) = state.tasks.iter_mut().find(|t| t.id == Id::Server(update.id)) {
                task.order_idx = update.order_idx;
                if let Some(parent) = update.parent_id {
                    task.parent_id = parent.map(Id::Server);
                }
            }
        }
        Ok(())
    }

    async fn generate_plan(&self, scope: PlanScope) -> Result<Vec<Task>, GatewayError> {
        self.enter(Call::GeneratePlan(scope)).await?;
        let mut state = self.lock();
        let (goal_id, parent_id) = match scope {
            PlanScope::Goal(id) => {
                if !state.has_goal(id) {
                    return Err(not_found("goal", id));
                }
                (id, None)
            }
            PlanScope::Task(id) => {
                let task = state
                    .tasks
                    .iter()
                    .find(|t| t.id == Id::Server(id))
                    .ok_or_else(|| not_found("task", id))?;
                let goal_id = task.goal_id.server().ok_or_else(|| not_found("task", id))?;
                (goal_id, Some(id))
            }
        };
        let titles = state.plan_titles.clone();
        Ok(titles
            .iter()
            .map(|title| state.insert_task(goal_id, parent_id, title, Some(String::new())))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Stub HTTP server
// ---------------------------------------------------------------------------

/// Serve `router` on `127.0.0.1` with an ephemeral port.
///
/// Returns the base URL (`http://127.0.0.1:<port>`). The server task lives
/// until the test runtime shuts down.
pub async fn spawn_stub_server(router: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub server");
    let addr = listener.local_addr().expect("stub server has no local addr");
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("stub server crashed");
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on, for transport-failure tests.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind probe listener");
    let addr = listener.local_addr().expect("probe listener has no local addr");
    drop(listener);
    format!("http://{addr}")
}
