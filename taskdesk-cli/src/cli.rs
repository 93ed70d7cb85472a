use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use taskdesk_client::api::{TaskPriority, TaskStatus};

#[derive(Parser, Debug)]
#[command(
    name = "taskdesk",
    author,
    version,
    about = "Taskdesk - command-line client for the taskdesk task board",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "TASKDESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// API base URL (overrides the configuration file)
    #[arg(long, global = true, env = "TASKDESK_API_URL")]
    pub api_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human readable output
    #[default]
    Pretty,
    /// Pretty-printed JSON
    Json,
    /// Table output (falls back to pretty without the `table-output` feature)
    Table,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "TASKDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log out and forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami {
        /// Fetch the profile from the server instead of the cached copy
        #[arg(long)]
        refresh: bool,
    },

    /// Work with tasks
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Per-task chat
    Chat {
        #[command(subcommand)]
        command: ChatCommands,
    },

    /// Telegram notification link
    Telegram {
        #[command(subcommand)]
        command: TelegramCommands,
    },

    /// Show or reset the configuration
    Config {
        #[arg(long)]
        show: bool,

        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks
    List {
        #[arg(long)]
        status: Option<TaskStatus>,

        #[arg(long)]
        priority: Option<TaskPriority>,

        #[arg(long)]
        assignee: Option<String>,

        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show a single task
    Show { id: String },

    /// Create a task
    Create {
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long, default_value = "medium")]
        priority: TaskPriority,

        #[arg(long)]
        assignee: Option<String>,

        /// Due date (RFC 3339, e.g. 2026-10-31T17:00:00Z)
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },

    /// Change a task's status
    Status { id: String, status: TaskStatus },

    /// Delete a task
    Delete { id: String },

    /// Show task counters
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum ChatCommands {
    /// Show the messages of a task
    List { task_id: String },

    /// Post a message to a task
    Send { task_id: String, message: String },
}

#[derive(Subcommand, Debug)]
pub enum TelegramCommands {
    /// Show the link status
    Status,

    /// Link a Telegram chat
    Link { chat_id: String },

    /// Remove the link
    Unlink,

    /// Send a test notification
    Test,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_task_status_command() {
        let args = Args::parse_from(["taskdesk", "tasks", "status", "12", "in-progress", "-o", "json"]);
        assert_eq!(args.output, Some(OutputFormat::Json));
        match args.command {
            Commands::Tasks {
                command: TaskCommands::Status { id, status },
            } => {
                assert_eq!(id, "12");
                assert_eq!(status, TaskStatus::InProgress);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
