//! Main add logic module for ds-down.
//!
//! Runs the whole sequence: resolve the password, log in, create the task and log out.

use colored::Colorize;
use tracing::debug;

use crate::DsDownArgs;
use crate::config::{Config, Overrides};
use crate::credentials::{SecretSource, obtain_secret};
use crate::error::Error;
use crate::synology::DownloadStationClient;
use crate::task::{Task, TaskId};

/// Main handler for adding a download task to Download Station.
pub struct DsDown {
    config: Config,
    task: Task,
    dryrun: bool,
    quiet: bool,
}

impl DsDown {
    /// Create a new `DsDown` from command line arguments.
    ///
    /// Reads the config file and classifies the download target.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the target is neither a URL nor a file.
    pub fn try_from_args(args: &DsDownArgs) -> Result<Self, Error> {
        let config_path = ds_down::config::resolve_config_path(args.config.as_deref());
        let config = Config::resolve(config_path, Overrides::from(args))?;
        let task = Task::classify(args.target.as_deref().unwrap_or_default())?;

        Ok(Self::new(config, task, args.dryrun, args.quiet > 0))
    }

    #[must_use]
    pub const fn new(config: Config, task: Task, dryrun: bool, quiet: bool) -> Self {
        Self {
            config,
            task,
            dryrun,
            quiet,
        }
    }

    /// Run the add workflow.
    ///
    /// The session is logged out after the task request whether or not it succeeded.
    ///
    /// # Errors
    /// Returns the first error from password resolution, login, or task creation.
    pub async fn run(self) -> Result<Option<TaskId>, Error> {
        if self.dryrun {
            self.print_dryrun_summary();
            return Ok(None);
        }

        let client =
            DownloadStationClient::new(&self.config.host, self.config.accept_invalid_certs, self.config.timeout)?;

        let password = obtain_secret(&self.config.secret_source, self.config.timeout).await?;
        let session = client.login(&self.config.username, password).await?;

        let result = client.create_task(&session, &self.task).await;
        let logout = client.logout(session).await;

        let task_id = match (result, logout) {
            (Ok(task_id), Ok(())) => task_id,
            (Ok(task_id), Err(error)) => {
                ds_down::print_warning!("Task was added but logout failed: {error}");
                task_id
            }
            (Err(error), logout) => {
                if let Err(logout_error) = logout {
                    debug!("Logout failed: {logout_error}");
                }
                return Err(error);
            }
        };

        if !self.quiet {
            self.print_added(task_id.as_ref());
        }
        Ok(task_id)
    }

    fn print_added(&self, task_id: Option<&TaskId>) {
        let message = format!("Added {}: {}", self.task.kind(), self.task);
        match task_id {
            Some(id) => println!("{} {}", message.green(), format!("({id})").dimmed()),
            None => println!("{}", message.green()),
        }
    }

    fn print_dryrun_summary(&self) {
        println!("{}", "Dryrun: nothing is sent".yellow().bold());
        println!("  Config:   {}", self.config.path.display());
        println!("  Host:     {}", self.config.host);
        println!("  Username: {}", self.config.username);
        println!("  Password: from {}", self.config.secret_source.key());
        if matches!(self.config.secret_source, SecretSource::Command(_)) {
            println!("            (command is not run in dryrun mode)");
        }
        println!("  Task:     {} {}", self.task.kind(), self.task.to_string().cyan());
    }
}
