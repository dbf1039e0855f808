//! `goalpost goals` and `goalpost goal ...` commands.

use anyhow::Result;

use goalpost_remote::models::GoalPatch;

use crate::GoalCommands;
use crate::render::render_goals;
use crate::session::{Session, settle};

/// List all goals.
pub async fn run_goals(session: &Session) -> Result<()> {
    let goals = session.goals().await?;
    print!("{}", render_goals(&goals));
    Ok(())
}

pub async fn run_goal_command(command: GoalCommands, session: &Session) -> Result<()> {
    match command {
        GoalCommands::Add { title } => {
            let pending = session.coordinator.create_goal(&title)?;
            let goal = settle(pending).await?;
            println!("Goal {} created: {}", goal.id, goal.title);
        }
        GoalCommands::Rename { goal_id, title } => {
            let goal = session.goal(goal_id).await?;
            let pending = session
                .coordinator
                .update_goal(goal.id, GoalPatch::title(title))?;
            let goal = settle(pending).await?;
            println!("Goal {} renamed to: {}", goal.id, goal.title);
        }
        GoalCommands::Rm { goal_id } => {
            let goal = session.goal(goal_id).await?;
            settle(session.coordinator.delete_goal(goal.id)?).await?;
            println!("Goal {} deleted: {}", goal.id, goal.title);
        }
    }
    Ok(())
}
