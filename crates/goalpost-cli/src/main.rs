mod config;
mod goal_cmds;
mod plan_cmd;
mod render;
mod session;
mod task_cmds;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use goalpost_core::ReorderScope;
use goalpost_remote::RemoteConfig;

use config::GoalpostConfig;
use session::Session;

#[derive(Parser)]
#[command(name = "goalpost", about = "Goal and task tree tracker")]
struct Cli {
    /// API base URL (overrides GOALPOST_API_URL env var)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a goalpost config file (no server required)
    Init {
        /// API base URL
        #[arg(long, default_value = RemoteConfig::DEFAULT_URL)]
        url: String,
        /// Session cookie, e.g. "session=abc123"
        #[arg(long)]
        session: Option<String>,
        /// Bearer token
        #[arg(long)]
        token: Option<String>,
        /// Which drag-and-drop moves are allowed
        #[arg(long, value_enum, default_value_t = ScopeArg::AcrossGroups)]
        reorder_scope: ScopeArg,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// List goals
    Goals,
    /// Goal management
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Show a goal's task tree
    Tasks {
        /// Goal ID
        goal_id: i64,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Generate a plan for an empty goal or a task without subtasks
    Plan {
        /// Goal ID to plan top-level tasks for
        #[arg(long, conflicts_with = "task", required_unless_present = "task")]
        goal: Option<i64>,
        /// Task ID to plan subtasks for
        #[arg(long)]
        task: Option<i64>,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a goal
    Add {
        /// Goal title
        title: String,
    },
    /// Rename a goal
    Rename {
        /// Goal ID
        goal_id: i64,
        /// New title
        title: String,
    },
    /// Delete a goal and all of its tasks
    Rm {
        /// Goal ID
        goal_id: i64,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task to a goal
    Add {
        /// Goal ID
        goal_id: i64,
        /// Task title
        title: String,
        /// Parent task ID (omit for a top-level task)
        #[arg(long)]
        parent: Option<i64>,
        /// Longer description
        #[arg(long)]
        description: Option<String>,
    },
    /// Change a task's title or description
    Edit {
        /// Task ID
        task_id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Mark a task done
    Done {
        /// Task ID
        task_id: i64,
    },
    /// Mark a task active again
    Reopen {
        /// Task ID
        task_id: i64,
    },
    /// Delete a task
    Rm {
        /// Task ID
        task_id: i64,
        /// Also delete all subtasks
        #[arg(long, short)]
        recursive: bool,
    },
    /// Move a task to a position, optionally under another parent
    Mv {
        /// Task ID
        task_id: i64,
        /// New parent task ID (default: keep the current parent)
        #[arg(long, conflicts_with = "root")]
        parent: Option<i64>,
        /// Move to the top level
        #[arg(long)]
        root: bool,
        /// Position within the destination group, starting at 0
        #[arg(long)]
        index: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    AcrossGroups,
    WithinGroup,
}

impl From<ScopeArg> for ReorderScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::AcrossGroups => Self::AcrossGroups,
            ScopeArg::WithinGroup => Self::WithinGroup,
        }
    }
}

/// Execute the `goalpost init` command: write config file.
fn cmd_init(
    url: &str,
    session: Option<String>,
    token: Option<String>,
    scope: ScopeArg,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_credentials = session.is_some() || token.is_some();
    let cfg = config::ConfigFile {
        remote: config::RemoteSection {
            url: url.to_string(),
            session,
            token,
            timeout_secs: None,
        },
        reorder: config::ReorderSection {
            scope: scope.into(),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  remote.url = {url}");
    if let Some(value) = scope.to_possible_value() {
        println!("  reorder.scope = {}", value.get_name());
    }
    if !has_credentials {
        println!();
        println!("No credentials stored; set GOALPOST_SESSION or GOALPOST_TOKEN, or rerun with --session/--token.");
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            url,
            session,
            token,
            reorder_scope,
            force,
        } => {
            cmd_init(&url, session, token, reorder_scope, force)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "goalpost", &mut std::io::stdout());
        }
        Commands::Goals => {
            let session = connect(cli.api_url.as_deref())?;
            goal_cmds::run_goals(&session).await?;
        }
        Commands::Goal { command } => {
            let session = connect(cli.api_url.as_deref())?;
            goal_cmds::run_goal_command(command, &session).await?;
        }
        Commands::Tasks { goal_id } => {
            let session = connect(cli.api_url.as_deref())?;
            task_cmds::run_tasks(&session, goal_id).await?;
        }
        Commands::Task { command } => {
            let session = connect(cli.api_url.as_deref())?;
            task_cmds::run_task_command(command, &session).await?;
        }
        Commands::Plan { goal, task } => {
            let session = connect(cli.api_url.as_deref())?;
            plan_cmd::run_plan(&session, goal, task).await?;
        }
    }

    Ok(())
}

/// Resolve configuration and open a session against the remote.
fn connect(cli_api_url: Option<&str>) -> anyhow::Result<Session> {
    let resolved = GoalpostConfig::resolve(cli_api_url)?;
    Session::connect(&resolved)
}
