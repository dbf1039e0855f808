//! Task mutations.

use futures::FutureExt;

use goalpost_remote::models::{BatchReorder, Id, NewTask, ReorderEntry, Task, TaskPatch, TaskStatus};

use super::{MutationCoordinator, Pending, Settlement, confirmed, non_empty_title};
use crate::error::{SyncError, ValidationError};
use crate::order::{self, ReorderPlan};
use crate::tree;

impl MutationCoordinator {
    /// Create a task under `goal_id`, optionally as a child of `parent_id`.
    ///
    /// The provisional task gets `order_idx` one past the largest in its
    /// sibling group, which is where the server will put it.
    pub fn create_task(
        &self,
        goal_id: Id,
        title: &str,
        parent_id: Option<Id>,
        description: Option<String>,
    ) -> Result<Pending<Task>, SyncError> {
        let title = non_empty_title(title)?;
        let goal_server_id = confirmed(goal_id)?;
        let parent_server_id = parent_id.map(confirmed).transpose()?;

        let temp = Id::new_local();
        let was_loaded = {
            let mut store = self.store.write();
            if store.goal(goal_id).is_none() {
                return Err(ValidationError::GoalNotFound(goal_id).into());
            }
            if let Some(parent) = parent_id {
                let owner = store
                    .task(parent)
                    .map(|t| t.goal_id)
                    .ok_or(ValidationError::TaskNotFound(parent))?;
                if owner != goal_id {
                    return Err(ValidationError::ParentNotInGoal {
                        parent,
                        goal: goal_id,
                    }
                    .into());
                }
            }
            let order_idx = tree::sibling_group(store.tasks(goal_id), goal_id, parent_id)
                .last()
                .map_or(0, |t| t.order_idx + 1);
            let was_loaded = store.tasks_loaded(goal_id);
            store.push_task(Task {
                id: temp,
                goal_id,
                parent_id,
                title: title.clone(),
                description: description.clone(),
                status: TaskStatus::Active,
                order_idx,
                created_at: None,
            });
            was_loaded
        };
        tracing::debug!(goal_id = %goal_id, task_id = %temp, "provisional task applied");

        let this = self.clone();
        let body = NewTask {
            title,
            parent_id: parent_server_id,
            description,
        };
        let future = async move {
            let result = match this.gateway.create_task(goal_server_id, &body).await {
                Ok(task) if task.id.is_provisional() => Err(SyncError::ReconciliationMismatch(
                    format!("created task has non-server id {}", task.id),
                )),
                Ok(task) if task.goal_id != goal_id || task.parent_id != parent_id => {
                    Err(SyncError::ReconciliationMismatch(format!(
                        "created task {} landed under goal {} parent {:?}",
                        task.id, task.goal_id, task.parent_id
                    )))
                }
                Ok(task) => Ok(task),
                Err(err) => Err(err.into()),
            };
            match result {
                Ok(task) => {
                    this.store.write().reconcile_task(temp, task.clone());
                    tracing::info!(goal_id = %goal_id, task_id = %task.id, "task created");
                    Settlement::Confirmed(task)
                }
                Err(err) => {
                    {
                        let mut store = this.store.write();
                        store.remove_tasks(goal_id, &[temp]);
                        if !was_loaded {
                            store.forget_empty_tasks(goal_id);
                        }
                    }
                    this.rolled_back("create task", temp, err)
                }
            }
        };
        Ok(Pending::new("create task", temp, future.boxed()))
    }

    /// Apply `patch` to a task.
    pub fn update_task(&self, id: Id, mut patch: TaskPatch) -> Result<Pending<Task>, SyncError> {
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
                .task(id)
                .cloned()
                .ok_or(ValidationError::TaskNotFound(id))?;
            let mut updated = previous.clone();
            patch.apply_to(&mut updated);
            store.replace_task(id, updated);
            previous
        };
        tracing::debug!(task_id = %id, "task update applied");

        let this = self.clone();
        let future = async move {
            let result = match this.gateway.update_task(server_id, &patch).await {
                Ok(task) if task.id != id || task.goal_id != previous.goal_id => {
                    Err(SyncError::ReconciliationMismatch(format!(
                        "update of task {id} answered with task {} of goal {}",
                        task.id, task.goal_id
                    )))
                }
                Ok(task) => Ok(task),
                Err(err) => Err(err.into()),
            };
            match result {
                Ok(task) => {
                    this.store.write().replace_task(id, task.clone());
                    tracing::info!(task_id = %id, "task updated");
                    Settlement::Confirmed(task)
                }
                Err(err) => {
                    // A task deleted in the meantime stays deleted.
                    this.store.write().replace_task(id, previous);
                    this.rolled_back("update task", id, err)
                }
            }
        };
        Ok(Pending::new("update task", id, future.boxed()))
    }

    /// Mark a task done or active.
    pub fn set_task_status(&self, id: Id, status: TaskStatus) -> Result<Pending<Task>, SyncError> {
        self.update_task(id, TaskPatch::status(status))
    }

    /// Flip a task between done and active.
    pub fn toggle_task_status(&self, id: Id) -> Result<Pending<Task>, SyncError> {
        let status = self
            .store
            .task(id)
            .map(|t| t.status)
            .ok_or(ValidationError::TaskNotFound(id))?;
        self.set_task_status(id, status.toggled())
    }

    /// Delete a leaf task. Tasks with subtasks are rejected; use
    /// [`delete_task_subtree`](Self::delete_task_subtree) for those.
    pub fn delete_task(&self, id: Id) -> Result<Pending<()>, SyncError> {
        self.remove_subtree(id, false)
    }

    /// Delete a task together with all of its descendants.
    pub fn delete_task_subtree(&self, id: Id) -> Result<Pending<()>, SyncError> {
        self.remove_subtree(id, true)
    }

    fn remove_subtree(&self, id: Id, cascade: bool) -> Result<Pending<()>, SyncError> {
        let operation = if cascade { "delete task subtree" } else { "delete task" };
        let server_id = confirmed(id)?;
        let (goal_id, removed) = {
            let mut store = self.store.write();
            let goal_id = store
                .task(id)
                .map(|t| t.goal_id)
                .ok_or(ValidationError::TaskNotFound(id))?;
            let collection = store.tasks(goal_id);
            let ids = if cascade {
                let ids = tree::subtree_ids(collection, id);
                if let Some(&pending) = ids.iter().find(|i| i.is_provisional()) {
                    return Err(ValidationError::Provisional(pending).into());
                }
                ids
            } else {
                if tree::has_children(collection, id) {
                    return Err(ValidationError::HasChildren(id).into());
                }
                vec![id]
            };
            (goal_id, store.remove_tasks(goal_id, &ids))
        };
        tracing::debug!(task_id = %id, count = removed.len(), "task removal applied");

        let this = self.clone();
        let future = async move {
            match this.gateway.delete_task(server_id).await {
                Ok(()) => {
                    tracing::info!(task_id = %id, "task deleted");
                    Settlement::Confirmed(())
                }
                Err(err) => {
                    this.store.write().restore_tasks(goal_id, removed);
                    this.rolled_back(operation, id, err.into())
                }
            }
        };
        Ok(Pending::new(operation, id, future.boxed()))
    }

    /// Apply a reorder plan to every affected task in one store write and
    /// send it as one batch. A failure rolls the whole batch back.
    pub fn batch_reorder(&self, plan: ReorderPlan) -> Result<Pending<()>, SyncError> {
        if plan.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        let moved = plan.moved;
        let new_parent = match plan.parent_change {
            Some(Some(parent)) => Some(Some(confirmed(parent)?)),
            Some(None) => Some(None),
            None => None,
        };
        let mut updates = Vec::with_capacity(plan.len());
        for assignment in &plan.assignments {
            updates.push(ReorderEntry {
                id: confirmed(assignment.id)?,
                order_idx: assignment.order_idx,
                parent_id: if assignment.id == moved { new_parent } else { None },
            });
        }

        let (goal_id, previous) = {
            let mut store = self.store.write();
            let goal_id = store
                .task(moved)
                .map(|t| t.goal_id)
                .ok_or(ValidationError::TaskNotFound(moved))?;
            let collection = store.tasks(goal_id);
            let mut previous = Vec::with_capacity(plan.len());
            for assignment in &plan.assignments {
                let task = collection
                    .iter()
                    .find(|t| t.id == assignment.id)
                    .ok_or(ValidationError::TaskNotFound(assignment.id))?;
                previous.push((task.id, task.order_idx, task.parent_id));
            }
            store.apply_plan(goal_id, &plan);
            (goal_id, previous)
        };
        tracing::debug!(goal_id = %goal_id, task_id = %moved, count = updates.len(), "reorder applied");

        let this = self.clone();
        let batch = BatchReorder { updates };
        let future = async move {
            match this.gateway.batch_reorder(&batch).await {
                Ok(()) => {
                    tracing::info!(goal_id = %goal_id, task_id = %moved, "reorder saved");
                    Settlement::Confirmed(())
                }
                Err(err) => {
                    this.store.write().set_positions(goal_id, &previous);
                    this.rolled_back("reorder tasks", moved, err.into())
                }
            }
        };
        Ok(Pending::new("reorder tasks", moved, future.boxed()))
    }

    /// Move a task to `index` in the sibling group under
    /// `destination_parent` and save the result.
    ///
    /// Returns `Ok(None)` when the move changes nothing, including
    /// cross-group moves under [`ReorderScope::WithinGroup`](crate::ReorderScope::WithinGroup).
    pub fn move_task(
        &self,
        id: Id,
        destination_parent: Option<Id>,
        index: usize,
    ) -> Result<Option<Pending<()>>, SyncError> {
        let plan = self.store.read(|store| {
            let goal_id = store
                .task(id)
                .map(|t| t.goal_id)
                .ok_or(ValidationError::TaskNotFound(id))?;
            order::assign_move(
                store.tasks(goal_id),
                id,
                destination_parent,
                index,
                self.config.reorder_scope,
            )
            .map_err(ValidationError::from)
        })?;
        plan.map(|plan| self.batch_reorder(plan)).transpose()
    }

    /// Drop `active` onto `over`: `active` takes `over`'s place in `over`'s
    /// sibling group.
    pub fn move_task_onto(&self, active: Id, over: Id) -> Result<Option<Pending<()>>, SyncError> {
        let plan = self.store.read(|store| {
            let goal_id = store
                .task(active)
                .map(|t| t.goal_id)
                .ok_or(ValidationError::TaskNotFound(active))?;
            order::move_onto(store.tasks(goal_id), active, over, self.config.reorder_scope)
                .map_err(ValidationError::from)
        })?;
        plan.map(|plan| self.batch_reorder(plan)).transpose()
    }
}
