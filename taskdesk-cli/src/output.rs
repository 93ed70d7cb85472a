use crate::{cli::OutputFormat, error::Result};
use chrono::{DateTime, Utc};
#[cfg(feature = "colored-output")]
use colored::*;
use serde::Serialize;
use std::io::Write;
#[cfg(feature = "table-output")]
use tabled::{Table, Tabled, settings::Style};
use taskdesk_client::UserProfile;
use taskdesk_client::api::{ChatMessage, Task, TaskStats, TaskStatus, TelegramStatus};

pub struct OutputManager {
    colored: bool,
    format: OutputFormat,
}

impl OutputManager {
    pub fn new(colored: bool, format: OutputFormat) -> Self {
        Self { colored, format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn format_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        Ok(format!("{}\n", serde_json::to_string_pretty(value)?))
    }

    pub fn format_user(&self, user: &UserProfile) -> Result<String> {
        if self.format == OutputFormat::Json {
            return self.format_json(user);
        }

        let mut output = String::new();
        output.push_str(&self.colorize(user.display_name(), &Color::Green, true));
        output.push('\n');
        output.push_str(&self.field("Username", &user.username));
        output.push_str(&self.field("Role", &user.role));
        output.push_str(&self.field("ID", &user.id));
        if let Some(perf) = &user.performance {
            output.push_str(&self.field("Completed", &perf.tasks_completed.to_string()));
            output.push_str(&self.field("In progress", &perf.tasks_in_progress.to_string()));
            output.push_str(&self.field("Overdue", &perf.tasks_overdue.to_string()));
            output.push_str(&self.field(
                "Completion rate",
                &format!("{:.1}%", perf.completion_rate),
            ));
        }
        Ok(output)
    }

    pub fn format_tasks(&self, tasks: &[Task]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(tasks),
            #[cfg(feature = "table-output")]
            OutputFormat::Table => Ok(self.format_tasks_table(tasks)),
            #[cfg(not(feature = "table-output"))]
            OutputFormat::Table => Ok(self.format_tasks_pretty(tasks)),
            OutputFormat::Pretty => Ok(self.format_tasks_pretty(tasks)),
        }
    }

    fn format_tasks_pretty(&self, tasks: &[Task]) -> String {
        if tasks.is_empty() {
            return "No tasks found.\n".to_string();
        }

        let now = Utc::now();
        let mut output = String::new();
        for task in tasks {
            let status = self.colorize(task.status.as_str(), &status_color(task.status), false);
            output.push_str(&format!(
                "#{:<5} [{}] {} ({})",
                task.id,
                status,
                self.colorize(&task.title, &Color::Cyan, true),
                task.priority
            ));
            if task.is_overdue(now) {
                output.push(' ');
                output.push_str(&self.colorize("overdue", &Color::Red, true));
            }
            output.push('\n');
        }
        output
    }

    #[cfg(feature = "table-output")]
    fn format_tasks_table(&self, tasks: &[Task]) -> String {
        #[derive(Tabled)]
        struct TaskRow<'a> {
            id: &'a str,
            title: &'a str,
            status: &'static str,
            priority: &'static str,
            assignee: &'a str,
            due: String,
        }

        let rows: Vec<TaskRow<'_>> = tasks
            .iter()
            .map(|task| TaskRow {
                id: &task.id,
                title: &task.title,
                status: task.status.as_str(),
                priority: task.priority.as_str(),
                assignee: task.assigned_to.as_deref().unwrap_or("-"),
                due: format_time(task.due_date),
            })
            .collect();

        format!("{}\n", Table::new(rows).with(Style::modern()))
    }

    pub fn format_task(&self, task: &Task) -> Result<String> {
        if self.format == OutputFormat::Json {
            return self.format_json(task);
        }

        let mut output = String::new();
        output.push_str(&self.colorize(&format!("#{} {}", task.id, task.title), &Color::Green, true));
        output.push('\n');
        output.push_str(&self.field(
            "Status",
            &self.colorize(task.status.as_str(), &status_color(task.status), false),
        ));
        output.push_str(&self.field("Priority", task.priority.as_str()));
        if let Some(assignee) = &task.assigned_to {
            output.push_str(&self.field("Assignee", assignee));
        }
        if let Some(due) = task.due_date {
            output.push_str(&self.field("Due", &format_time(Some(due))));
        }
        if let Some(created) = task.created_at {
            output.push_str(&self.field("Created", &format_time(Some(created))));
        }
        if let Some(description) = &task.description {
            output.push('\n');
            output.push_str(description);
            output.push('\n');
        }
        Ok(output)
    }

    pub fn format_stats(&self, stats: &TaskStats) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(stats),
            #[cfg(feature = "table-output")]
            OutputFormat::Table => {
                #[derive(Tabled)]
                struct StatRow {
                    counter: &'static str,
                    value: u32,
                }

                let rows = [
                    ("total", stats.total),
                    ("pending", stats.pending),
                    ("in_progress", stats.in_progress),
                    ("completed", stats.completed),
                    ("cancelled", stats.cancelled),
                    ("overdue", stats.overdue),
                ]
                .into_iter()
                .map(|(counter, value)| StatRow { counter, value });

                Ok(format!("{}\n", Table::new(rows).with(Style::modern())))
            }
            _ => {
                let mut output = String::new();
                output.push_str(&self.colorize("Task statistics:", &Color::Green, true));
                output.push('\n');
                output.push_str(&self.field("Total", &stats.total.to_string()));
                output.push_str(&self.field("Pending", &stats.pending.to_string()));
                output.push_str(&self.field("In progress", &stats.in_progress.to_string()));
                output.push_str(&self.field("Completed", &stats.completed.to_string()));
                output.push_str(&self.field("Cancelled", &stats.cancelled.to_string()));
                output.push_str(&self.field("Overdue", &stats.overdue.to_string()));
                Ok(output)
            }
        }
    }

    pub fn format_messages(&self, messages: &[ChatMessage]) -> Result<String> {
        if self.format == OutputFormat::Json {
            return self.format_json(messages);
        }
        if messages.is_empty() {
            return Ok("No messages yet.\n".to_string());
        }

        let mut output = String::new();
        for message in messages {
            let sender = message
                .sender_name
                .as_deref()
                .or(message.sender_id.as_deref())
                .unwrap_or("unknown");
            output.push_str(&format!(
                "{} {}: {}\n",
                self.colorize(&format_time(message.created_at), &Color::Blue, false),
                self.colorize(sender, &Color::Yellow, true),
                message.content
            ));
        }
        Ok(output)
    }

    pub fn format_telegram(&self, status: &TelegramStatus) -> Result<String> {
        if self.format == OutputFormat::Json {
            return self.format_json(status);
        }

        let mut output = String::new();
        if status.linked {
            output.push_str(&self.colorize("Telegram linked", &Color::Green, true));
        } else {
            output.push_str(&self.colorize("Telegram not linked", &Color::Yellow, true));
        }
        output.push('\n');
        if let Some(chat_id) = &status.chat_id {
            output.push_str(&self.field("Chat ID", chat_id));
        }
        if let Some(username) = &status.username {
            output.push_str(&self.field("Username", username));
        }
        Ok(output)
    }

    /// One-line confirmation, or `{"status":"ok","message":...}` in JSON mode.
    pub fn format_success(&self, message: &str) -> Result<String> {
        if self.format == OutputFormat::Json {
            return self.format_json(&serde_json::json!({
                "status": "ok",
                "message": message,
            }));
        }
        Ok(format!("{} {}\n", self.colorize("✓", &Color::Green, true), message))
    }

    pub fn warning(&self, message: &str) -> String {
        format!("{} {}", self.colorize("!", &Color::Yellow, true), message)
    }

    fn field(&self, label: &str, value: &str) -> String {
        format!("  {}: {}\n", self.colorize(label, &Color::Yellow, false), value)
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                    Color::Red => text.red(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}

enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
    Red,
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Pending => Color::Yellow,
        TaskStatus::InProgress => Color::Blue,
        TaskStatus::Completed => Color::Green,
        TaskStatus::Cancelled => Color::Red,
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn write_output(content: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
