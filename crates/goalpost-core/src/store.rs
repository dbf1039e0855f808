//! The in-memory store of goals and tasks.
//!
//! The store is owned by the [`MutationCoordinator`](crate::sync::MutationCoordinator),
//! which is its only writer: every mutating method here is crate-private.
//! Everyone else gets a [`StoreHandle`], which only reads.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use goalpost_remote::models::{Goal, Id, Task};

use crate::order::ReorderPlan;
use crate::plan::PlanTarget;
use crate::tree::{self, Forest};

/// Goals, per-goal flat task collections, and the current selection.
#[derive(Debug, Default)]
pub struct Store {
    goals: Vec<Goal>,
    tasks: BTreeMap<Id, Vec<Task>>,
    selected_goal: Option<Id>,
    revision: u64,
}

/// A comparable copy of the store contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub goals: Vec<Goal>,
    pub tasks: BTreeMap<Id, Vec<Task>>,
    pub selected_goal: Option<Id>,
}

/// A goal removed from the store, with what is needed to put it back.
#[derive(Debug, Clone)]
pub(crate) struct RemovedGoal {
    pub position: usize,
    pub goal: Goal,
    pub tasks: Option<Vec<Task>>,
}

/// A task removed from its goal's collection, with its former position.
#[derive(Debug, Clone)]
pub(crate) struct RemovedTask {
    pub position: usize,
    pub task: Task,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

impl Store {
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn goal(&self, id: Id) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    /// Flat task collection of a goal, in the order the remote listed it.
    pub fn tasks(&self, goal_id: Id) -> &[Task] {
        self.tasks.get(&goal_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether the goal's task collection has been loaded at least once.
    pub fn tasks_loaded(&self, goal_id: Id) -> bool {
        self.tasks.contains_key(&goal_id)
    }

    pub fn task(&self, id: Id) -> Option<&Task> {
        self.tasks.values().flatten().find(|t| t.id == id)
    }

    pub fn selected_goal(&self) -> Option<Id> {
        self.selected_goal
    }

    /// Incremented on every write.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Derive the goal's forest from its flat collection.
    pub fn forest(&self, goal_id: Id) -> Forest {
        tree::build_forest(self.tasks(goal_id))
    }

    /// Whether a plan may be generated for `target`: it exists, is
    /// confirmed, and has no children yet.
    pub fn can_generate_plan(&self, target: PlanTarget) -> bool {
        match target {
            PlanTarget::Goal(id) => {
                !id.is_provisional()
                    && self.goal(id).is_some()
                    && !self.tasks(id).iter().any(|t| t.parent_id.is_none())
            }
            PlanTarget::Task(id) => match self.task(id) {
                Some(task) => {
                    !id.is_provisional() && !tree::has_children(self.tasks(task.goal_id), id)
                }
                None => false,
            },
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            goals: self.goals.clone(),
            tasks: self.tasks.clone(),
            selected_goal: self.selected_goal,
        }
    }
}

// ---------------------------------------------------------------------------
// Writes (coordinator only)
// ---------------------------------------------------------------------------

impl Store {
    fn touch(&mut self) {
        self.revision += 1;
    }

    pub(crate) fn push_goal(&mut self, goal: Goal) {
        self.goals.push(goal);
        self.touch();
    }

    /// Replace the goal list with a fresh listing, keeping provisional goals.
    pub(crate) fn set_goals(&mut self, goals: Vec<Goal>) {
        let provisional: Vec<Goal> = self
            .goals
            .drain(..)
            .filter(|g| g.id.is_provisional())
            .collect();
        self.goals = goals;
        self.goals.extend(provisional);
        let live: Vec<Id> = self.goals.iter().map(|g| g.id).collect();
        self.tasks.retain(|id, _| live.contains(id));
        if self.selected_goal.is_some_and(|id| !live.contains(&id)) {
            self.selected_goal = None;
        }
        self.touch();
    }

    /// Swap a provisional goal for its canonical record.
    ///
    /// An existing record with the canonical id is dropped first, so exactly
    /// one copy remains. Selection follows the goal.
    pub(crate) fn reconcile_goal(&mut self, provisional: Id, canonical: Goal) {
        let canonical_id = canonical.id;
        self.goals.retain(|g| g.id != canonical_id);
        match self.goals.iter().position(|g| g.id == provisional) {
            Some(pos) => self.goals[pos] = canonical,
            None => self.goals.push(canonical),
        }
        if let Some(tasks) = self.tasks.remove(&provisional) {
            self.tasks.insert(canonical_id, tasks);
        }
        if self.selected_goal == Some(provisional) {
            self.selected_goal = Some(canonical_id);
        }
        self.touch();
    }

    /// Replace a goal in place. Returns `false` if it is no longer present.
    pub(crate) fn replace_goal(&mut self, id: Id, goal: Goal) -> bool {
        let Some(slot) = self.goals.iter_mut().find(|g| g.id == id) else {
            return false;
        };
        *slot = goal;
        self.touch();
        true
    }

    pub(crate) fn remove_goal(&mut self, id: Id) -> Option<RemovedGoal> {
        let position = self.goals.iter().position(|g| g.id == id)?;
        let goal = self.goals.remove(position);
        let tasks = self.tasks.remove(&id);
        if self.selected_goal == Some(id) {
            self.selected_goal = None;
        }
        self.touch();
        Some(RemovedGoal {
            position,
            goal,
            tasks,
        })
    }

    /// Put a removed goal back at its former position.
    ///
    /// If a reload has already brought the goal back, that record stays and
    /// only a missing task collection is restored.
    pub(crate) fn restore_goal(&mut self, removed: RemovedGoal) {
        let id = removed.goal.id;
        if !self.goals.iter().any(|g| g.id == id) {
            let position = removed.position.min(self.goals.len());
            self.goals.insert(position, removed.goal);
        }
        if let Some(tasks) = removed.tasks {
            self.tasks.entry(id).or_insert(tasks);
        }
        self.touch();
    }

    pub(crate) fn select(&mut self, goal: Option<Id>) {
        self.selected_goal = goal;
        self.touch();
    }

    /// Replace one goal's collection with a fresh listing, keeping
    /// provisional tasks that are still waiting for their create call.
    pub(crate) fn set_tasks(&mut self, goal_id: Id, mut tasks: Vec<Task>) {
        let provisional = self
            .tasks
            .remove(&goal_id)
            .unwrap_or_default()
            .into_iter()
            .filter(|t| t.id.is_provisional());
        tasks.extend(provisional);
        self.tasks.insert(goal_id, tasks);
        self.touch();
    }

    /// Drop a goal's collection entry if it is empty, so a goal whose tasks
    /// were never loaded reads as unloaded again.
    pub(crate) fn forget_empty_tasks(&mut self, goal_id: Id) {
        if self.tasks.get(&goal_id).is_some_and(Vec::is_empty) {
            self.tasks.remove(&goal_id);
            self.touch();
        }
    }

    pub(crate) fn push_task(&mut self, task: Task) {
        self.tasks.entry(task.goal_id).or_default().push(task);
        self.touch();
    }

    /// Swap a provisional task for its canonical record, leaving exactly
    /// one copy of the canonical id in the collection.
    pub(crate) fn reconcile_task(&mut self, provisional: Id, canonical: Task) {
        let collection = self.tasks.entry(canonical.goal_id).or_default();
        collection.retain(|t| t.id != canonical.id);
        match collection.iter().position(|t| t.id == provisional) {
            Some(pos) => collection[pos] = canonical,
            None => collection.push(canonical),
        }
        self.touch();
    }

    /// Replace a task in place. Returns `false` if it is no longer present.
    pub(crate) fn replace_task(&mut self, id: Id, task: Task) -> bool {
        let Some(slot) = self.tasks.values_mut().flatten().find(|t| t.id == id) else {
            return false;
        };
        *slot = task;
        self.touch();
        true
    }

    /// Remove tasks by id, remembering where each one sat.
    pub(crate) fn remove_tasks(&mut self, goal_id: Id, ids: &[Id]) -> Vec<RemovedTask> {
        let Some(collection) = self.tasks.get_mut(&goal_id) else {
            return Vec::new();
        };
        let removed: Vec<RemovedTask> = collection
            .iter()
            .enumerate()
            .filter(|(_, t)| ids.contains(&t.id))
            .map(|(position, task)| RemovedTask {
                position,
                task: task.clone(),
            })
            .collect();
        collection.retain(|t| !ids.contains(&t.id));
        self.touch();
        removed
    }

    /// Put removed tasks back at their former positions.
    pub(crate) fn restore_tasks(&mut self, goal_id: Id, mut removed: Vec<RemovedTask>) {
        let collection = self.tasks.entry(goal_id).or_default();
        removed.sort_by_key(|r| r.position);
        for r in removed {
            if collection.iter().any(|t| t.id == r.task.id) {
                continue;
            }
            let position = r.position.min(collection.len());
            collection.insert(position, r.task);
        }
        self.touch();
    }

    /// Apply a reorder plan to one goal's collection as one write.
    pub(crate) fn apply_plan(&mut self, goal_id: Id, plan: &ReorderPlan) {
        if let Some(collection) = self.tasks.get_mut(&goal_id) {
            plan.apply_to(collection);
        }
        self.touch();
    }

    /// Apply `(order_idx, parent_id)` pairs to several tasks as one write.
    pub(crate) fn set_positions(&mut self, goal_id: Id, positions: &[(Id, u32, Option<Id>)]) {
        if let Some(collection) = self.tasks.get_mut(&goal_id) {
            for task in collection.iter_mut() {
                if let Some(&(_, order_idx, parent_id)) =
                    positions.iter().find(|(id, ..)| *id == task.id)
                {
                    task.order_idx = order_idx;
                    task.parent_id = parent_id;
                }
            }
        }
        self.touch();
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Read-only access to the shared store.
///
/// Cloning the handle shares the same store. Writes go through the
/// coordinator, which holds the crate-private write path.
#[derive(Debug, Clone, Default)]
pub struct StoreHandle {
    inner: Arc<RwLock<Store>>,
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the store under a read lock.
    ///
    /// Do not hold on to the lock: `f` must not block or await.
    pub fn read<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        f(&self.read_guard())
    }

    pub fn goals(&self) -> Vec<Goal> {
        self.read(|s| s.goals().to_vec())
    }

    pub fn goal(&self, id: Id) -> Option<Goal> {
        self.read(|s| s.goal(id).cloned())
    }

    pub fn tasks(&self, goal_id: Id) -> Vec<Task> {
        self.read(|s| s.tasks(goal_id).to_vec())
    }

    pub fn task(&self, id: Id) -> Option<Task> {
        self.read(|s| s.task(id).cloned())
    }

    pub fn selected_goal(&self) -> Option<Id> {
        self.read(Store::selected_goal)
    }

    pub fn revision(&self) -> u64 {
        self.read(Store::revision)
    }

    pub fn forest(&self, goal_id: Id) -> Forest {
        self.read(|s| s.forest(goal_id))
    }

    pub fn can_generate_plan(&self, target: PlanTarget) -> bool {
        self.read(|s| s.can_generate_plan(target))
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.read(Store::snapshot)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Store> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
