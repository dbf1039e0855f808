//! `goalpost plan` command: ask the remote to generate tasks.

use anyhow::{Context, Result, bail};

use goalpost_core::{GenerationOutcome, PlanGenerationBridge, PlanTarget};

use crate::render::render_forest;
use crate::session::Session;

/// Generate a plan for a goal (`goal_id`) or a task (`task_id`).
pub async fn run_plan(session: &Session, goal_id: Option<i64>, task_id: Option<i64>) -> Result<()> {
    let (target, owning_goal) = match (goal_id, task_id) {
        (Some(id), None) => {
            let (goal, _) = session.goal_with_tasks(id).await?;
            (PlanTarget::Goal(goal.id), goal.id)
        }
        (None, Some(id)) => {
            let task = session.task(id).await?;
            (PlanTarget::Task(task.id), task.goal_id)
        }
        _ => bail!("pass exactly one of --goal or --task"),
    };

    if !session.store().can_generate_plan(target) {
        bail!("{target} already has tasks; plans are only generated for empty targets");
    }

    let bridge = PlanGenerationBridge::new(session.coordinator.clone());
    let pending = bridge
        .generate(target)?
        .with_context(|| format!("a plan for {target} is already being generated"))?;
    println!("Generating plan for {target}...");

    match pending.settle().await {
        GenerationOutcome::Refreshed { created, .. } => {
            println!("Created {} tasks.", created.len());
            print!("{}", render_forest(&session.store().forest(owning_goal)));
            Ok(())
        }
        GenerationOutcome::Failed(err) => {
            Err(err).with_context(|| format!("could not generate a plan for {target}"))
        }
    }
}
