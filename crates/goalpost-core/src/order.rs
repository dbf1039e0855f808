//! Order assignment after a drag-and-drop move.
//!
//! Every member of each affected sibling group is renumbered to its
//! position, so `order_idx` is contiguous from zero in both the source and
//! the destination group afterwards.

use serde::{Deserialize, Serialize};

use goalpost_remote::models::{Id, Task};

use crate::tree::{displayed_parent, sibling_group, subtree_ids};

/// Which moves the assigner accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderScope {
    /// Moves may change the task's parent.
    #[default]
    AcrossGroups,
    /// Only moves within the task's own sibling group; others are no-ops.
    WithinGroup,
}

/// Errors for moves that cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("task {0} is not in this goal")]
    TaskNotFound(Id),

    #[error("destination parent {0} is not in this goal")]
    ParentNotFound(Id),

    #[error("cannot move task {task} under its own subtree (parent {parent})")]
    WouldCreateCycle { task: Id, parent: Id },
}

/// New position of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAssignment {
    pub id: Id,
    pub order_idx: u32,
}

/// The full result of one move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    pub moved: Id,
    /// `Some(parent)` when the moved task changes sibling group.
    pub parent_change: Option<Option<Id>>,
    /// Every member of every affected group, source group first.
    pub assignments: Vec<OrderAssignment>,
}

impl ReorderPlan {
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn order_of(&self, id: Id) -> Option<u32> {
        self.assignments
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.order_idx)
    }

    /// Apply the plan to a local collection.
    pub fn apply_to(&self, tasks: &mut [Task]) {
        for task in tasks.iter_mut() {
            if let Some(order_idx) = self.order_of(task.id) {
                task.order_idx = order_idx;
            }
            if task.id == self.moved {
                if let Some(parent) = self.parent_change {
                    task.parent_id = parent;
                }
            }
        }
    }
}

/// Compute the assignment for moving `moved` to `index` within the sibling
/// group under `destination_parent` (`None` = root group).
///
/// `index` is a position in the destination group with the moved task
/// already taken out; it is clamped to the end of the group. Groups are
/// the ones [`build_forest`](crate::tree::build_forest) shows, so an orphan
/// moves within the root group. Returns
/// `Ok(None)` for moves that change nothing, and for cross-group moves when
/// `scope` is [`ReorderScope::WithinGroup`].
pub fn assign_move(
    tasks: &[Task],
    moved: Id,
    destination_parent: Option<Id>,
    index: usize,
    scope: ReorderScope,
) -> Result<Option<ReorderPlan>, OrderError> {
    let task = tasks
        .iter()
        .find(|t| t.id == moved)
        .ok_or(OrderError::TaskNotFound(moved))?;
    let goal_id = task.goal_id;
    let source_parent = displayed_parent(tasks, moved);

    if let Some(parent) = destination_parent {
        if !tasks.iter().any(|t| t.id == parent && t.goal_id == goal_id) {
            return Err(OrderError::ParentNotFound(parent));
        }
        if subtree_ids(tasks, moved).contains(&parent) {
            return Err(OrderError::WouldCreateCycle {
                task: moved,
                parent,
            });
        }
    }

    let mut source: Vec<Id> = sibling_group(tasks, goal_id, source_parent)
        .iter()
        .map(|t| t.id)
        .collect();
    let from = source
        .iter()
        .position(|&id| id == moved)
        .ok_or(OrderError::TaskNotFound(moved))?;
    source.remove(from);

    if destination_parent == source_parent {
        let to = index.min(source.len());
        if to == from {
            return Ok(None);
        }
        source.insert(to, moved);
        return Ok(Some(ReorderPlan {
            moved,
            parent_change: None,
            assignments: positional(&source),
        }));
    }

    if scope == ReorderScope::WithinGroup {
        tracing::debug!(task_id = %moved, "cross-group move ignored in within-group scope");
        return Ok(None);
    }

    let mut destination: Vec<Id> = sibling_group(tasks, goal_id, destination_parent)
        .iter()
        .map(|t| t.id)
        .collect();
    let to = index.min(destination.len());
    destination.insert(to, moved);

    let mut assignments = positional(&source);
    assignments.extend(positional(&destination));
    Ok(Some(ReorderPlan {
        moved,
        parent_change: Some(destination_parent),
        assignments,
    }))
}

/// Drop `active` onto `over`: take over's group and over's position.
pub fn move_onto(
    tasks: &[Task],
    active: Id,
    over: Id,
    scope: ReorderScope,
) -> Result<Option<ReorderPlan>, OrderError> {
    if active == over {
        return Ok(None);
    }
    let target = tasks
        .iter()
        .find(|t| t.id == over)
        .ok_or(OrderError::TaskNotFound(over))?;
    let parent = displayed_parent(tasks, over);
    let index = sibling_group(tasks, target.goal_id, parent)
        .iter()
        .position(|t| t.id == over)
        .ok_or(OrderError::TaskNotFound(over))?;
    assign_move(tasks, active, parent, index, scope)
}

fn positional(ids: &[Id]) -> Vec<OrderAssignment> {
    ids.iter()
        .zip(0u32..)
        .map(|(&id, order_idx)| OrderAssignment { id, order_idx })
        .collect()
}
