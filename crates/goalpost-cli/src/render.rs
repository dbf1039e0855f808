//! Plain-text rendering of goals and task trees.

use goalpost_core::Forest;
use goalpost_remote::models::{Goal, TaskStatus};

/// One line per goal: `  <id>  <title>`.
pub fn render_goals(goals: &[Goal]) -> String {
    if goals.is_empty() {
        return "No goals yet. Create one with `goalpost goal add <title>`.\n".to_string();
    }
    let width = goals.iter().map(|g| g.id.to_string().len()).max().unwrap_or(0);
    goals
        .iter()
        .map(|g| format!("  {:>width$}  {}\n", g.id.to_string(), g.title))
        .collect()
}

/// Indented checklist of a forest, two spaces per level.
pub fn render_forest(forest: &Forest) -> String {
    if forest.is_empty() {
        return "  (no tasks)\n".to_string();
    }
    let mut out = String::new();
    for (depth, node) in forest.walk() {
        let mark = match node.task.status {
            TaskStatus::Done => 'x',
            TaskStatus::Active => ' ',
        };
        out.push_str(&format!(
            "{}[{mark}] {} ({})\n",
            "  ".repeat(depth + 1),
            node.task.title,
            node.task.id
        ));
        if let Some(description) = node.task.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!("{}    {description}\n", "  ".repeat(depth + 1)));
        }
    }
    out
}
