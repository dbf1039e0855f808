//! `goalpost tasks` and `goalpost task ...` commands.

use anyhow::{Result, bail};

use goalpost_core::tree;
use goalpost_remote::models::{Id, TaskPatch, TaskStatus};

use crate::TaskCommands;
use crate::render::render_forest;
use crate::session::{Session, settle};

/// Print a goal's task tree.
pub async fn run_tasks(session: &Session, goal_id: i64) -> Result<()> {
    let (goal, _) = session.goal_with_tasks(goal_id).await?;
    println!("Goal: {} ({})", goal.title, goal.id);
    print!("{}", render_forest(&session.store().forest(goal.id)));
    Ok(())
}

pub async fn run_task_command(command: TaskCommands, session: &Session) -> Result<()> {
    match command {
        TaskCommands::Add {
            goal_id,
            title,
            parent,
            description,
        } => {
            let (goal, _) = session.goal_with_tasks(goal_id).await?;
            let pending = session.coordinator.create_task(
                goal.id,
                &title,
                parent.map(Id::Server),
                description,
            )?;
            let task = settle(pending).await?;
            println!("Task {} created: {}", task.id, task.title);
        }
        TaskCommands::Edit {
            task_id,
            title,
            description,
        } => {
            let patch = TaskPatch {
                title,
                description,
                ..TaskPatch::default()
            };
            if patch.is_empty() {
                bail!("nothing to change; pass --title and/or --description");
            }
            let task = session.task(task_id).await?;
            let task = settle(session.coordinator.update_task(task.id, patch)?).await?;
            println!("Task {} updated: {}", task.id, task.title);
        }
        TaskCommands::Done { task_id } => {
            set_status(session, task_id, TaskStatus::Done).await?;
        }
        TaskCommands::Reopen { task_id } => {
            set_status(session, task_id, TaskStatus::Active).await?;
        }
        TaskCommands::Rm { task_id, recursive } => {
            let task = session.task(task_id).await?;
            let pending = if recursive {
                session.coordinator.delete_task_subtree(task.id)?
            } else {
                session.coordinator.delete_task(task.id)?
            };
            settle(pending).await?;
            println!("Task {} deleted: {}", task.id, task.title);
        }
        TaskCommands::Mv {
            task_id,
            parent,
            root,
            index,
        } => {
            let task = session.task(task_id).await?;
            let destination = if root {
                None
            } else {
                let shown_under = session
                    .store()
                    .read(|s| tree::displayed_parent(s.tasks(task.goal_id), task.id));
                parent.map(Id::Server).or(shown_under)
            };
            match session.coordinator.move_task(task.id, destination, index)? {
                Some(pending) => {
                    settle(pending).await?;
                    println!("Task {} moved.", task.id);
                    print!("{}", render_forest(&session.store().forest(task.goal_id)));
                }
                None => println!("Nothing to move."),
            }
        }
    }
    Ok(())
}

async fn set_status(session: &Session, task_id: i64, status: TaskStatus) -> Result<()> {
    let task = session.task(task_id).await?;
    if task.status == status {
        println!("Task {} is already {status}.", task.id);
        return Ok(());
    }
    let task = settle(session.coordinator.set_task_status(task.id, status)?).await?;
    println!("Task {} marked {}: {}", task.id, task.status, task.title);
    Ok(())
}
