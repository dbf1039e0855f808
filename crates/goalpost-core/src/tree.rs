//! Forest derivation from a flat task collection.
//!
//! The forest is a derived view: it is rebuilt from the flat collection on
//! every call and never edited in place.

use std::collections::HashMap;

use goalpost_remote::models::{Id, Task};

/// One task and its ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub task: Task,
    pub children: Vec<TaskNode>,
}

impl TaskNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order traversal with depth, `self` at `depth`.
    pub fn walk<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a TaskNode)>) {
        out.push((depth, self));
        for child in &self.children {
            child.walk(depth + 1, out);
        }
    }
}

/// Ordered roots of one goal's task tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    pub roots: Vec<TaskNode>,
}

impl Forest {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.walk().len()
    }

    /// Pre-order traversal of the whole forest with depths.
    pub fn walk(&self) -> Vec<(usize, &TaskNode)> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.walk(0, &mut out);
        }
        out
    }

    pub fn find(&self, id: Id) -> Option<&TaskNode> {
        self.walk()
            .into_iter()
            .map(|(_, node)| node)
            .find(|node| node.task.id == id)
    }
}

/// Build the ordered forest for a flat collection of one goal's tasks.
///
/// A task is attached under its parent when `parent_id` names a task of the
/// same goal present in `tasks`; otherwise it becomes a root. Tasks whose
/// parent chain loops back on itself also become roots, so every input task
/// appears exactly once. Each sibling group is sorted by `order_idx`, ties
/// keeping input order.
pub fn build_forest(tasks: &[Task]) -> Forest {
    let parent_of = resolved_parents(tasks);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    let mut roots = Vec::new();
    for (i, parent) in parent_of.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }

    sort_group(tasks, &mut roots);
    for group in &mut children {
        sort_group(tasks, group);
    }

    Forest {
        roots: roots
            .into_iter()
            .map(|i| build_node(tasks, &children, i))
            .collect(),
    }
}

/// Index of the task each task is shown under, `None` for roots.
///
/// A parent counts only when it is present in `tasks` and belongs to the
/// same goal. Tasks on a parent cycle are roots.
fn resolved_parents(tasks: &[Task]) -> Vec<Option<usize>> {
    let index: HashMap<Id, usize> = tasks
        .iter()
        .enumerate()
        .rev()
        .map(|(i, t)| (t.id, i))
        .collect();

    let mut parent_of: Vec<Option<usize>> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            task.parent_id
                .and_then(|p| index.get(&p).copied())
                .filter(|&j| j != i && tasks[j].goal_id == task.goal_id)
        })
        .collect();

    let on_cycle: Vec<usize> = (0..tasks.len())
        .filter(|&i| {
            let mut cursor = parent_of[i];
            let mut steps = 0;
            while let Some(j) = cursor {
                if j == i {
                    return true;
                }
                steps += 1;
                if steps > tasks.len() {
                    break;
                }
                cursor = parent_of[j];
            }
            false
        })
        .collect();
    for i in on_cycle {
        parent_of[i] = None;
    }
    parent_of
}

/// The parent `id` is shown under in the forest, `None` when it is a root.
///
/// Differs from `parent_id` for orphans and tasks on a parent cycle.
pub fn displayed_parent(tasks: &[Task], id: Id) -> Option<Id> {
    let parents = resolved_parents(tasks);
    let i = tasks.iter().position(|t| t.id == id)?;
    parents[i].map(|j| tasks[j].id)
}

fn sort_group(tasks: &[Task], group: &mut [usize]) {
    // `sort_by_key` is stable, so equal order_idx keep input order.
    group.sort_by_key(|&i| tasks[i].order_idx);
}

fn build_node(tasks: &[Task], children: &[Vec<usize>], i: usize) -> TaskNode {
    TaskNode {
        task: tasks[i].clone(),
        children: children[i]
            .iter()
            .map(|&c| build_node(tasks, children, c))
            .collect(),
    }
}

/// The ordered sibling group of `goal_id` under `parent` (`None` = roots).
///
/// Membership follows [`build_forest`]: orphans and tasks on a parent cycle
/// belong to the root group.
pub fn sibling_group(tasks: &[Task], goal_id: Id, parent: Option<Id>) -> Vec<&Task> {
    let parents = resolved_parents(tasks);
    let mut group: Vec<&Task> = tasks
        .iter()
        .zip(&parents)
        .filter(|(t, p)| t.goal_id == goal_id && p.map(|j| tasks[j].id) == parent)
        .map(|(t, _)| t)
        .collect();
    group.sort_by_key(|t| t.order_idx);
    group
}

/// Whether any task in the collection names `id` as its parent.
pub fn has_children(tasks: &[Task], id: Id) -> bool {
    tasks.iter().any(|t| t.parent_id == Some(id))
}

/// `id` followed by all of its descendants, breadth-first.
pub fn subtree_ids(tasks: &[Task], id: Id) -> Vec<Id> {
    let mut ids = vec![id];
    let mut i = 0;
    while i < ids.len() {
        let current = ids[i];
        for task in tasks {
            if task.parent_id == Some(current) && !ids.contains(&task.id) {
                ids.push(task.id);
            }
        }
        i += 1;
    }
    ids
}
