use std::sync::Arc;

use taskdesk_client::api::{NewTask, TaskFilter};
use taskdesk_client::{CredentialStore, FileCredentialStore, SessionEvent, TaskdeskClient};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cli::{ChatCommands, OutputFormat, TaskCommands, TelegramCommands};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::output::{OutputManager, write_output};

pub struct CommandExecutor {
    client: TaskdeskClient,
    output: OutputManager,
    events: broadcast::Receiver<SessionEvent>,
}

impl CommandExecutor {
    pub fn new(
        config: &AppConfig,
        api_url: Option<&str>,
        timeout_secs: Option<u64>,
        format: OutputFormat,
    ) -> Result<Self> {
        let client_config = config.client_config(api_url, timeout_secs)?;
        let credentials_path = config.credentials_path()?;
        debug!(
            api_url = %client_config.base_url,
            credentials = %credentials_path.display(),
            "Creating API client"
        );

        let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(credentials_path));
        let client = TaskdeskClient::new(client_config, store)?;
        let events = client.api().subscribe();

        Ok(Self {
            client,
            output: OutputManager::new(config.colored, format),
            events,
        })
    }

    fn require_session(&self) -> Result<()> {
        if self.client.auth().is_authenticated() {
            Ok(())
        } else {
            Err(CliError::NotLoggedIn)
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let record = self.client.auth().login(username, password).await?;
        let message = format!("Logged in as {}", record.user.display_name());
        write_output(&self.output.format_success(&message)?)
    }

    pub async fn logout(&self) -> Result<()> {
        if !self.client.auth().is_authenticated() {
            return write_output(&self.output.format_success("Already logged out")?);
        }
        self.client.auth().logout().await?;
        write_output(&self.output.format_success("Logged out")?)
    }

    pub async fn whoami(&self, refresh: bool) -> Result<()> {
        self.require_session()?;
        let user = if refresh {
            self.client.auth().profile().await?
        } else {
            self.client.auth().current_user().ok_or(CliError::NotLoggedIn)?
        };
        write_output(&self.output.format_user(&user)?)
    }

    pub async fn tasks(&self, command: TaskCommands) -> Result<()> {
        self.require_session()?;
        let tasks = self.client.tasks();

        let rendered = match command {
            TaskCommands::List {
                status,
                priority,
                assignee,
                search,
                limit,
            } => {
                let filter = TaskFilter {
                    status,
                    priority,
                    assigned_to: assignee,
                    search,
                    page: None,
                    limit,
                };
                let list = tasks.list(&filter).await?;
                info!(count = list.len(), "Fetched tasks");
                self.output.format_tasks(&list)?
            }
            TaskCommands::Show { id } => self.output.format_task(&tasks.get(&id).await?)?,
            TaskCommands::Create {
                title,
                description,
                priority,
                assignee,
                due,
            } => {
                let task = tasks
                    .create(&NewTask {
                        description,
                        priority,
                        assigned_to: assignee,
                        due_date: due,
                        ..NewTask::new(title)
                    })
                    .await?;
                self.output.format_task(&task)?
            }
            TaskCommands::Status { id, status } => {
                let task = tasks.update_status(&id, status).await?;
                self.output.format_task(&task)?
            }
            TaskCommands::Delete { id } => {
                tasks.delete(&id).await?;
                self.output.format_success(&format!("Deleted task #{id}"))?
            }
            TaskCommands::Stats => self.output.format_stats(&tasks.stats().await?)?,
        };

        write_output(&rendered)
    }

    pub async fn chat(&self, command: ChatCommands) -> Result<()> {
        self.require_session()?;
        let chat = self.client.chat();

        let rendered = match command {
            ChatCommands::List { task_id } => {
                self.output.format_messages(&chat.messages(&task_id).await?)?
            }
            ChatCommands::Send { task_id, message } => {
                let sent = chat.send(&task_id, &message).await?;
                self.output.format_messages(std::slice::from_ref(&sent))?
            }
        };

        write_output(&rendered)
    }

    pub async fn telegram(&self, command: TelegramCommands) -> Result<()> {
        self.require_session()?;
        let notifications = self.client.notifications();

        let rendered = match command {
            TelegramCommands::Status => self.output.format_telegram(&notifications.status().await?)?,
            TelegramCommands::Link { chat_id } => {
                self.output.format_telegram(&notifications.link(&chat_id).await?)?
            }
            TelegramCommands::Unlink => {
                notifications.unlink().await?;
                self.output.format_success("Telegram unlinked")?
            }
            TelegramCommands::Test => {
                notifications.send_test().await?;
                self.output.format_success("Test notification sent")?
            }
        };

        write_output(&rendered)
    }

    /// Print a re-login hint if the session ended while the command ran.
    pub fn report_session_end(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if event.is_session_ended() && self.output.format() != OutputFormat::Json {
                eprintln!(
                    "{}",
                    self.output.warning(&format!(
                        "{}. Run `taskdesk login` to sign in again.",
                        event.description()
                    ))
                );
            }
        }
    }
}
