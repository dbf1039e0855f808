//! Integration tests for the mutation coordinator against the in-memory
//! fake remote.

use std::sync::Arc;

use async_trait::async_trait;

use goalpost_core::{
    CoordinatorConfig, MutationCoordinator, ReorderScope, Settlement, SyncError, ValidationError,
};
use goalpost_remote::gateway::{GatewayError, RemoteGateway};
use goalpost_remote::models::{
    BatchReorder, Goal, GoalPatch, Id, NewGoal, NewTask, PlanScope, ReorderEntry, Task, TaskPatch,
    TaskStatus,
};
use goalpost_test_utils::{Call, FakeGateway, Op};

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

fn coordinator(fake: &Arc<FakeGateway>) -> MutationCoordinator {
    coordinator_with(fake, CoordinatorConfig::default())
}

fn coordinator_with(fake: &Arc<FakeGateway>, config: CoordinatorConfig) -> MutationCoordinator {
    let gateway: Arc<dyn RemoteGateway> = fake.clone();
    MutationCoordinator::new(gateway, config)
}

/// A fake with one goal holding roots A, B, C and a child A1 under A,
/// loaded into a fresh coordinator.
async fn loaded() -> (Arc<FakeGateway>, MutationCoordinator, Goal) {
    let fake = Arc::new(FakeGateway::new());
    let goal = fake.seed_goal("Launch");
    let a = fake.seed_task(&goal, None, "A");
    fake.seed_task(&goal, None, "B");
    fake.seed_task(&goal, None, "C");
    fake.seed_task(&goal, Some(&a), "A1");

    let coordinator = coordinator(&fake);
    coordinator.load_goals().await.expect("load goals");
    coordinator.refresh_tasks(goal.id).await.expect("refresh tasks");
    (fake, coordinator, goal)
}

fn task_by_title(coordinator: &MutationCoordinator, goal: &Goal, title: &str) -> Task {
    coordinator
        .store()
        .tasks(goal.id)
        .into_iter()
        .find(|t| t.title == title)
        .unwrap_or_else(|| panic!("no task titled {title}"))
}

fn root_titles(coordinator: &MutationCoordinator, goal: &Goal) -> Vec<(String, u32)> {
    coordinator
        .store()
        .forest(goal.id)
        .roots
        .iter()
        .map(|n| (n.task.title.clone(), n.task.order_idx))
        .collect()
}

/// Yield until the fake has seen `n` calls of `op`.
async fn wait_for_calls(fake: &FakeGateway, op: Op, n: usize) {
    for _ in 0..1000 {
        if fake.call_count(op) >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("timed out waiting for {n} {op:?} calls");
}

fn transport() -> GatewayError {
    GatewayError::Transport("connection reset".to_owned())
}

// -----------------------------------------------------------------------
// Goals
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_goal_selects_provisional_then_canonical() {
    let fake = Arc::new(FakeGateway::new());
    let coordinator = coordinator(&fake);
    let store = coordinator.store();

    let pending = coordinator.create_goal("  Write a book ").expect("valid title");
    let temp = pending.subject();
    assert!(temp.is_provisional());
    assert_eq!(store.selected_goal(), Some(temp));
    assert_eq!(store.goal(temp).map(|g| g.title), Some("Write a book".to_owned()));
    assert_eq!(fake.call_count(Op::CreateGoal), 0, "remote call waits for settle");

    let goal = pending.settle().await.into_result().expect("create succeeds");
    assert!(!goal.id.is_provisional());
    assert_eq!(store.selected_goal(), Some(goal.id));
    assert_eq!(store.goals(), vec![goal.clone()]);
    assert_eq!(
        fake.calls(),
        vec![Call::CreateGoal(NewGoal {
            title: "Write a book".to_owned()
        })]
    );
}

#[tokio::test]
async fn failed_create_goal_discards_provisional_and_selection() {
    let fake = Arc::new(FakeGateway::new());
    let coordinator = coordinator(&fake);
    let mut notices = coordinator.subscribe();
    let before = coordinator.store().snapshot();

    fake.fail_next(Op::CreateGoal, transport());
    let pending = coordinator.create_goal("Doomed").expect("valid title");
    let temp = pending.subject();

    let settlement = pending.settle().await;
    assert_eq!(
        settlement,
        Settlement::RolledBack(SyncError::Transport("connection reset".to_owned()))
    );
    assert_eq!(coordinator.store().snapshot(), before);

    let notice = notices.try_recv().expect("rollback publishes a notice");
    assert_eq!(notice.operation, "create goal");
    assert_eq!(notice.subject, Some(temp));
    assert_eq!(notice.to_string(), "could not create goal: could not reach the server: connection reset");
}

#[tokio::test]
async fn update_goal_rolls_back_on_rejection() {
    let (fake, coordinator, goal) = loaded().await;

    fake.fail_next(
        Op::UpdateGoal,
        GatewayError::Rejected {
            status: 500,
            message: "boom".to_owned(),
        },
    );
    let pending = coordinator
        .update_goal(goal.id, GoalPatch::title("Relaunch"))
        .expect("valid patch");
    assert_eq!(coordinator.store().goal(goal.id).unwrap().title, "Relaunch");

    let settlement = pending.settle().await;
    assert!(matches!(
        settlement.error(),
        Some(SyncError::RemoteRejection { status: 500, .. })
    ));
    assert_eq!(coordinator.store().goal(goal.id).unwrap().title, "Launch");
}

#[tokio::test]
async fn update_goal_confirms_server_record() {
    let (fake, coordinator, goal) = loaded().await;
    let updated = coordinator
        .update_goal(goal.id, GoalPatch::title("Relaunch"))
        .expect("valid patch")
        .await
        .into_result()
        .expect("update succeeds");
    assert_eq!(updated.title, "Relaunch");
    assert_eq!(fake.goals()[0].title, "Relaunch");
}

#[tokio::test]
async fn deleting_selected_goal_clears_selection_immediately() {
    let (fake, coordinator, goal) = loaded().await;
    coordinator.select_goal(goal.id).expect("goal exists");

    let release = fake.hold_next(Op::DeleteGoal);
    let pending = coordinator.delete_goal(goal.id).expect("goal exists");
    assert_eq!(coordinator.store().selected_goal(), None);
    assert!(coordinator.store().goal(goal.id).is_none());

    let handle = tokio::spawn(pending.settle());
    wait_for_calls(&fake, Op::DeleteGoal, 1).await;
    assert_eq!(coordinator.store().selected_goal(), None, "still cleared while in flight");
    release.release();

    assert!(handle.await.expect("join").is_confirmed());
    assert!(fake.goals().is_empty());
}

#[tokio::test]
async fn failed_delete_goal_restores_goal_and_tasks_but_not_selection() {
    let (fake, coordinator, goal) = loaded().await;
    let other = coordinator
        .create_goal("Other")
        .unwrap()
        .await
        .into_result()
        .unwrap();
    coordinator.select_goal(goal.id).unwrap();
    let goals_before = coordinator.store().goals();
    let tasks_before = coordinator.store().tasks(goal.id);

    fake.fail_next(Op::DeleteGoal, transport());
    let settlement = coordinator.delete_goal(goal.id).unwrap().settle().await;

    assert!(!settlement.is_confirmed());
    assert_eq!(coordinator.store().goals(), goals_before);
    assert_eq!(coordinator.store().goals()[1].id, other.id, "position kept");
    assert_eq!(coordinator.store().tasks(goal.id), tasks_before);
    assert_eq!(coordinator.store().selected_goal(), None);
}

#[tokio::test]
async fn failed_delete_goal_after_reload_leaves_one_copy() {
    let (fake, coordinator, goal) = loaded().await;
    let tasks_before = coordinator.store().tasks(goal.id);

    let release = fake.hold_next(Op::DeleteGoal);
    fake.fail_next(Op::DeleteGoal, transport());
    let handle = tokio::spawn(coordinator.delete_goal(goal.id).unwrap().settle());
    wait_for_calls(&fake, Op::DeleteGoal, 1).await;

    coordinator.load_goals().await.expect("reload goals");
    assert!(coordinator.store().goal(goal.id).is_some(), "reload lists the goal again");
    release.release();
    assert!(!handle.await.expect("join").is_confirmed());

    let ids: Vec<Id> = coordinator.store().goals().iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![goal.id]);
    assert_eq!(coordinator.store().tasks(goal.id), tasks_before);
}

#[tokio::test]
async fn load_goals_keeps_provisional_goals() {
    let (fake, coordinator, goal) = loaded().await;
    let release = fake.hold_next(Op::CreateGoal);
    let pending = coordinator.create_goal("Pending").unwrap();
    let temp = pending.subject();
    let handle = tokio::spawn(pending.settle());
    wait_for_calls(&fake, Op::CreateGoal, 1).await;

    let listed = coordinator.load_goals().await.unwrap();
    assert_eq!(listed, vec![goal.clone()]);
    let ids: Vec<Id> = coordinator.store().goals().iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![goal.id, temp]);

    release.release();
    let created = handle.await.unwrap().into_result().unwrap();
    let ids: Vec<Id> = coordinator.store().goals().iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![goal.id, created.id]);
}

#[tokio::test]
async fn unauthorized_surfaces_as_unauthenticated() {
    let fake = Arc::new(FakeGateway::new());
    let coordinator = coordinator(&fake);
    let mut notices = coordinator.subscribe();

    fake.fail_next(Op::ListGoals, GatewayError::Unauthorized);
    let err = coordinator.load_goals().await.unwrap_err();
    assert_eq!(err, SyncError::Unauthenticated);
    assert_eq!(notices.try_recv().unwrap().error, SyncError::Unauthenticated);
}

// -----------------------------------------------------------------------
// Validation
// -----------------------------------------------------------------------

#[tokio::test]
async fn validation_errors_skip_store_and_network() {
    let (fake, coordinator, goal) = loaded().await;
    let before = coordinator.store().snapshot();
    let calls_before = fake.calls().len();
    let a = task_by_title(&coordinator, &goal, "A");

    let err = coordinator.create_goal("   ").unwrap_err();
    assert_eq!(err, SyncError::Validation(ValidationError::EmptyTitle));

    let err = coordinator.create_task(goal.id, "", None, None).unwrap_err();
    assert_eq!(err, SyncError::Validation(ValidationError::EmptyTitle));

    let err = coordinator.create_task(Id::Server(999), "x", None, None).unwrap_err();
    assert_eq!(err, SyncError::Validation(ValidationError::GoalNotFound(Id::Server(999))));

    let err = coordinator.update_task(a.id, TaskPatch::default()).unwrap_err();
    assert_eq!(err, SyncError::Validation(ValidationError::EmptyPatch));

    let err = coordinator.update_task(a.id, TaskPatch::title(" ")).unwrap_err();
    assert_eq!(err, SyncError::Validation(ValidationError::EmptyTitle));

    let err = coordinator.delete_task(Id::Server(999)).unwrap_err();
    assert_eq!(err, SyncError::Validation(ValidationError::TaskNotFound(Id::Server(999))));

    let err = coordinator.select_goal(Id::Server(999)).unwrap_err();
    assert!(err.is_validation());

    assert_eq!(coordinator.store().snapshot(), before);
    assert_eq!(fake.calls().len(), calls_before);
}

#[tokio::test]
async fn parent_from_another_goal_is_rejected() {
    let (fake, coordinator, goal) = loaded().await;
    let other = fake.seed_goal("Other");
    let stray = fake.seed_task(&other, None, "Stray");
    coordinator.load_goals().await.unwrap();
    coordinator.refresh_tasks(other.id).await.unwrap();

    let err = coordinator
        .create_task(goal.id, "Child", Some(stray.id), None)
        .unwrap_err();
    assert_eq!(
        err,
        SyncError::Validation(ValidationError::ParentNotInGoal {
            parent: stray.id,
            goal: goal.id
        })
    );
}

#[tokio::test]
async fn provisional_records_cannot_be_mutated() {
    let (fake, coordinator, goal) = loaded().await;
    let release = fake.hold_next(Op::CreateTask);
    let pending = coordinator.create_task(goal.id, "New", None, None).unwrap();
    let temp = pending.subject();

    assert_eq!(
        coordinator.update_task(temp, TaskPatch::title("Renamed")).unwrap_err(),
        SyncError::Validation(ValidationError::Provisional(temp))
    );
    assert_eq!(
        coordinator.delete_task(temp).unwrap_err(),
        SyncError::Validation(ValidationError::Provisional(temp))
    );
    assert_eq!(
        coordinator.create_task(goal.id, "Child", Some(temp), None).unwrap_err(),
        SyncError::Validation(ValidationError::Provisional(temp))
    );

    release.release();
    assert!(pending.settle().await.is_confirmed());
}

// -----------------------------------------------------------------------
// Tasks
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_task_reconciles_to_exactly_one_record() {
    let (fake, coordinator, goal) = loaded().await;
    let a = task_by_title(&coordinator, &goal, "A");

    let pending = coordinator
        .create_task(goal.id, "A2", Some(a.id), Some("notes".to_owned()))
        .unwrap();
    let temp = pending.subject();
    let provisional = coordinator.store().task(temp).expect("applied before settle");
    assert_eq!(provisional.order_idx, 1, "one past A1");
    assert_eq!(provisional.parent_id, Some(a.id));

    let task = pending.settle().await.into_result().unwrap();
    let tasks = coordinator.store().tasks(goal.id);
    assert_eq!(tasks.iter().filter(|t| t.id == task.id).count(), 1);
    assert!(tasks.iter().all(|t| !t.id.is_provisional()));
    assert_eq!(task.order_idx, 1);
    assert_eq!(tasks.len(), 5);
    assert_eq!(
        fake.calls().last(),
        Some(&Call::CreateTask(
            goal.id.server().unwrap(),
            NewTask {
                title: "A2".to_owned(),
                parent_id: a.id.server(),
                description: Some("notes".to_owned()),
            }
        ))
    );
}

#[tokio::test]
async fn failed_create_task_leaves_store_unchanged() {
    let (fake, coordinator, goal) = loaded().await;
    let before = coordinator.store().snapshot();

    fake.fail_next(Op::CreateTask, transport());
    let pending = coordinator.create_task(goal.id, "D", None, None).unwrap();
    assert_eq!(coordinator.store().tasks(goal.id).len(), 5);

    let settlement = pending.settle().await;
    assert!(!settlement.is_confirmed());
    assert_eq!(coordinator.store().snapshot(), before);
}

#[tokio::test]
async fn failed_create_task_on_unloaded_goal_leaves_store_unchanged() {
    let fake = Arc::new(FakeGateway::new());
    fake.seed_goal("Fresh");
    let coordinator = coordinator(&fake);
    let goal = coordinator.load_goals().await.unwrap().remove(0);
    let before = coordinator.store().snapshot();

    fake.fail_next(Op::CreateTask, transport());
    let settlement = coordinator
        .create_task(goal.id, "First", None, None)
        .unwrap()
        .settle()
        .await;
    assert!(!settlement.is_confirmed());
    assert_eq!(coordinator.store().snapshot(), before);
}

#[tokio::test]
async fn update_task_rolls_back_to_snapshot() {
    let (fake, coordinator, goal) = loaded().await;
    let b = task_by_title(&coordinator, &goal, "B");

    fake.fail_next(Op::UpdateTask, transport());
    let pending = coordinator.update_task(b.id, TaskPatch::title("Bee")).unwrap();
    assert_eq!(coordinator.store().task(b.id).unwrap().title, "Bee");

    assert!(!pending.settle().await.is_confirmed());
    assert_eq!(coordinator.store().task(b.id).unwrap(), b);
}

#[tokio::test]
async fn toggle_task_status_round_trips() {
    let (fake, coordinator, goal) = loaded().await;
    let c = task_by_title(&coordinator, &goal, "C");

    let done = coordinator.toggle_task_status(c.id).unwrap().await.into_result().unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    let active = coordinator.toggle_task_status(c.id).unwrap().await.into_result().unwrap();
    assert_eq!(active.status, TaskStatus::Active);
    assert_eq!(
        fake.calls().last(),
        Some(&Call::UpdateTask(c.id.server().unwrap(), TaskPatch::status(TaskStatus::Active)))
    );
}

#[tokio::test]
async fn reversed_responses_end_in_last_arrival() {
    let (fake, coordinator, goal) = loaded().await;
    let b = task_by_title(&coordinator, &goal, "B");

    let first_release = fake.hold_next(Op::UpdateTask);
    let first = coordinator.update_task(b.id, TaskPatch::title("one")).unwrap();
    let first = tokio::spawn(first.settle());
    wait_for_calls(&fake, Op::UpdateTask, 1).await;

    let second_release = fake.hold_next(Op::UpdateTask);
    let second = coordinator.update_task(b.id, TaskPatch::title("two")).unwrap();
    assert_eq!(coordinator.store().task(b.id).unwrap().title, "two");
    let second = tokio::spawn(second.settle());
    wait_for_calls(&fake, Op::UpdateTask, 2).await;

    second_release.release();
    assert!(second.await.unwrap().is_confirmed());
    assert_eq!(coordinator.store().task(b.id).unwrap().title, "two");

    first_release.release();
    assert!(first.await.unwrap().is_confirmed());
    assert_eq!(coordinator.store().task(b.id).unwrap().title, "one");
}

#[tokio::test]
async fn delete_task_with_children_is_rejected() {
    let (fake, coordinator, goal) = loaded().await;
    let a = task_by_title(&coordinator, &goal, "A");
    assert_eq!(
        coordinator.delete_task(a.id).unwrap_err(),
        SyncError::Validation(ValidationError::HasChildren(a.id))
    );
    assert_eq!(fake.call_count(Op::DeleteTask), 0);
}

#[tokio::test]
async fn delete_leaf_task_does_not_renumber_siblings() {
    let (fake, coordinator, goal) = loaded().await;
    let b = task_by_title(&coordinator, &goal, "B");

    assert!(coordinator.delete_task(b.id).unwrap().await.is_confirmed());
    assert_eq!(
        root_titles(&coordinator, &goal),
        vec![("A".to_owned(), 0), ("C".to_owned(), 2)]
    );
    assert_eq!(fake.tasks(&goal).len(), 3);
}

#[tokio::test]
async fn subtree_delete_removes_descendants_and_restores_on_failure() {
    let (fake, coordinator, goal) = loaded().await;
    let a = task_by_title(&coordinator, &goal, "A");
    let before = coordinator.store().snapshot();

    fake.fail_next(Op::DeleteTask, transport());
    let pending = coordinator.delete_task_subtree(a.id).unwrap();
    let titles: Vec<String> = coordinator
        .store()
        .tasks(goal.id)
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["B", "C"]);

    assert!(!pending.settle().await.is_confirmed());
    assert_eq!(coordinator.store().snapshot(), before);

    assert!(coordinator.delete_task_subtree(a.id).unwrap().await.is_confirmed());
    assert_eq!(coordinator.store().tasks(goal.id).len(), 2);
    assert_eq!(fake.tasks(&goal).len(), 2);
}

// -----------------------------------------------------------------------
// Reorder
// -----------------------------------------------------------------------

#[tokio::test]
async fn moving_first_root_to_end_saves_one_batch() {
    let (fake, coordinator, goal) = loaded().await;
    let [a, b, c] = ["A", "B", "C"].map(|t| task_by_title(&coordinator, &goal, t));

    let pending = coordinator
        .move_task(a.id, None, 2)
        .unwrap()
        .expect("move changes order");
    assert_eq!(
        root_titles(&coordinator, &goal),
        vec![("B".to_owned(), 0), ("C".to_owned(), 1), ("A".to_owned(), 2)]
    );

    assert!(pending.settle().await.is_confirmed());
    assert_eq!(
        fake.calls().last(),
        Some(&Call::BatchReorder(BatchReorder {
            updates: vec![
                ReorderEntry { id: b.id.server().unwrap(), order_idx: 0, parent_id: None },
                ReorderEntry { id: c.id.server().unwrap(), order_idx: 1, parent_id: None },
                ReorderEntry { id: a.id.server().unwrap(), order_idx: 2, parent_id: None },
            ]
        }))
    );
    assert_eq!(fake.call_count(Op::BatchReorder), 1);
}

#[tokio::test]
async fn failed_batch_rolls_back_every_task() {
    let (fake, coordinator, goal) = loaded().await;
    let c = task_by_title(&coordinator, &goal, "C");
    let a = task_by_title(&coordinator, &goal, "A");
    let before = coordinator.store().snapshot();

    fake.fail_next(Op::BatchReorder, transport());
    let pending = coordinator.move_task(c.id, Some(a.id), 0).unwrap().unwrap();
    assert_eq!(coordinator.store().task(c.id).unwrap().parent_id, Some(a.id));

    assert!(!pending.settle().await.is_confirmed());
    assert_eq!(coordinator.store().snapshot(), before);
}

#[tokio::test]
async fn cross_group_move_sends_parent_change() {
    let (fake, coordinator, goal) = loaded().await;
    let a = task_by_title(&coordinator, &goal, "A");
    let c = task_by_title(&coordinator, &goal, "C");

    assert!(coordinator.move_task(c.id, Some(a.id), 0).unwrap().unwrap().await.is_confirmed());

    let Some(Call::BatchReorder(batch)) = fake.calls().last().cloned() else {
        panic!("expected a batch reorder call");
    };
    let moved = batch
        .updates
        .iter()
        .find(|u| u.id == c.id.server().unwrap())
        .unwrap();
    assert_eq!(moved.parent_id, Some(a.id.server()));
    assert_eq!(
        batch.updates.iter().filter(|u| u.parent_id.is_some()).count(),
        1
    );

    let children: Vec<String> = coordinator
        .store()
        .forest(goal.id)
        .find(a.id)
        .unwrap()
        .children
        .iter()
        .map(|n| n.task.title.clone())
        .collect();
    assert_eq!(children, vec!["C", "A1"]);
    let server_c = fake.tasks(&goal).into_iter().find(|t| t.id == c.id).unwrap();
    assert_eq!(server_c.parent_id, Some(a.id));
}

#[tokio::test]
async fn within_group_scope_skips_cross_group_moves() {
    let fake = Arc::new(FakeGateway::new());
    let goal = fake.seed_goal("Launch");
    let a = fake.seed_task(&goal, None, "A");
    let b = fake.seed_task(&goal, None, "B");
    let coordinator = coordinator_with(
        &fake,
        CoordinatorConfig {
            reorder_scope: ReorderScope::WithinGroup,
        },
    );
    coordinator.load_goals().await.unwrap();
    coordinator.refresh_tasks(goal.id).await.unwrap();

    assert!(coordinator.move_task(b.id, Some(a.id), 0).unwrap().is_none());
    assert!(coordinator.move_task(a.id, None, 0).unwrap().is_none(), "identity move");
    assert_eq!(fake.call_count(Op::BatchReorder), 0);

    assert!(coordinator.move_task_onto(b.id, a.id).unwrap().unwrap().await.is_confirmed());
    assert_eq!(
        root_titles(&coordinator, &goal),
        vec![("B".to_owned(), 0), ("A".to_owned(), 1)]
    );
}

#[tokio::test]
async fn move_into_own_subtree_is_rejected() {
    let (_fake, coordinator, goal) = loaded().await;
    let a = task_by_title(&coordinator, &goal, "A");
    let a1 = task_by_title(&coordinator, &goal, "A1");
    let err = coordinator.move_task(a.id, Some(a1.id), 0).unwrap_err();
    assert!(err.is_validation());
}

// -----------------------------------------------------------------------
// Refresh
// -----------------------------------------------------------------------

#[tokio::test]
async fn refresh_keeps_provisional_tasks() {
    let (fake, coordinator, goal) = loaded().await;
    let release = fake.hold_next(Op::CreateTask);
    let pending = coordinator.create_task(goal.id, "Later", None, None).unwrap();
    let temp = pending.subject();
    let handle = tokio::spawn(pending.settle());
    wait_for_calls(&fake, Op::CreateTask, 1).await;

    let listed = coordinator.refresh_tasks(goal.id).await.unwrap();
    assert!(listed.iter().any(|t| t.id == temp));

    release.release();
    let created = handle.await.unwrap().into_result().unwrap();
    let tasks = coordinator.store().tasks(goal.id);
    assert_eq!(tasks.iter().filter(|t| t.title == "Later").count(), 1);
    assert!(tasks.iter().any(|t| t.id == created.id));
}

/// Delegates to a fake but answers task listings with a task of the wrong
/// goal.
struct MisroutingGateway(Arc<FakeGateway>);

#[async_trait]
impl RemoteGateway for MisroutingGateway {
    async fn list_goals(&self) -> Result<Vec<Goal>, GatewayError> {
        self.0.list_goals().await
    }
    async fn create_goal(&self, goal: &NewGoal) -> Result<Goal, GatewayError> {
        self.0.create_goal(goal).await
    }
    async fn update_goal(&self, id: i64, patch: &GoalPatch) -> Result<Goal, GatewayError> {
        self.0.update_goal(id, patch).await
    }
    async fn delete_goal(&self, id: i64) -> Result<(), GatewayError> {
        self.0.delete_goal(id).await
    }
    async fn list_tasks(&self, goal_id: i64) -> Result<Vec<Task>, GatewayError> {
        let mut tasks = self.0.list_tasks(goal_id).await?;
        for task in &mut tasks {
            task.goal_id = Id::Server(goal_id + 1000);
        }
        Ok(tasks)
    }
    async fn create_task(&self, goal_id: i64, task: &NewTask) -> Result<Task, GatewayError> {
        let mut created = self.0.create_task(goal_id, task).await?;
        created.goal_id = Id::Server(goal_id + 1000);
        Ok(created)
    }
    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, GatewayError> {
        self.0.update_task(id, patch).await
    }
    async fn delete_task(&self, id: i64) -> Result<(), GatewayError> {
        self.0.delete_task(id).await
    }
    async fn batch_reorder(&self, batch: &BatchReorder) -> Result<(), GatewayError> {
        self.0.batch_reorder(batch).await
    }
    async fn generate_plan(&self, scope: PlanScope) -> Result<Vec<Task>, GatewayError> {
        self.0.generate_plan(scope).await
    }
}

#[tokio::test]
async fn mismatched_responses_are_rejected_and_rolled_back() {
    let fake = Arc::new(FakeGateway::new());
    let goal = fake.seed_goal("Launch");
    fake.seed_task(&goal, None, "A");
    let coordinator = MutationCoordinator::new(
        Arc::new(MisroutingGateway(fake.clone())),
        CoordinatorConfig::default(),
    );
    let mut notices = coordinator.subscribe();
    coordinator.load_goals().await.unwrap();
    let before = coordinator.store().snapshot();

    let err = coordinator.refresh_tasks(goal.id).await.unwrap_err();
    assert!(matches!(err, SyncError::ReconciliationMismatch(_)));
    assert_eq!(coordinator.store().snapshot(), before);
    assert_eq!(notices.try_recv().unwrap().operation, "refresh tasks");

    let settlement = coordinator
        .create_task(goal.id, "B", None, None)
        .unwrap()
        .settle()
        .await;
    assert!(matches!(
        settlement.error(),
        Some(SyncError::ReconciliationMismatch(_))
    ));
    assert_eq!(coordinator.store().snapshot(), before);
}
