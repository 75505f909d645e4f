//! Console login prompt.
//!
//! Presents the login dialog on the terminal: username (pre-filled), then a
//! hidden password. An empty username cancels the login.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use authgate_core::auth::PromptState;
use authgate_core::{LoginController, LoginPresenter};
use tracing::{error, warn};

use crate::config::Config;

/// Clone is cheap - the config is shared with the prompts it spawns.
#[derive(Clone)]
pub struct ConsolePresenter {
    config: Arc<Mutex<Config>>,
}

impl ConsolePresenter {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    fn remember_username(&self, username: &str) {
        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        config.last_username = Some(username.to_string());
        if let Err(e) = config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }
}

impl LoginPresenter for ConsolePresenter {
    fn present(&self, controller: LoginController) {
        let presenter = self.clone();
        tokio::spawn(async move {
            if let Err(e) = presenter.run(controller).await {
                error!(error = %e, "Login prompt failed");
            }
        });
    }
}

impl ConsolePresenter {
    /// Drive one prompt until it closes. Returning early drops the
    /// controller, which cancels the login.
    async fn run(&self, mut controller: LoginController) -> Result<()> {
        eprintln!("\n=== Login required ===\n");

        loop {
            if let Some(message) = controller.error() {
                eprintln!("Login failed: {}\n", message);
            }

            let default = controller.username().to_string();
            let credentials = tokio::task::spawn_blocking(move || read_credentials(&default))
                .await
                .context("Prompt task failed")??;

            let Some((username, password)) = credentials else {
                controller.cancel();
                eprintln!("Login cancelled");
                return Ok(());
            };

            controller.set_username(&username);
            controller.set_password(&password);
            if !controller.can_submit() {
                eprintln!("Username and password required\n");
                continue;
            }

            eprintln!("\nAuthenticating...");
            if controller.submit().await == PromptState::ClosedSuccess {
                self.remember_username(controller.username());
                eprintln!("Login successful!\n");
                return Ok(());
            }
        }
    }
}

/// `None` when the user leaves the username empty (cancel)
fn read_credentials(default_username: &str) -> Result<Option<(String, String)>> {
    if default_username.is_empty() {
        eprint!("Username (empty to cancel): ");
    } else {
        eprint!("Username [{}] (\"-\" to cancel): ", default_username);
    }
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let Some(username) = resolve_username(input.trim(), default_username) else {
        return Ok(None);
    };

    let password = rpassword::prompt_password("Password: ")?;
    Ok(Some((username, password)))
}

fn resolve_username(input: &str, default_username: &str) -> Option<String> {
    match input {
        "-" => None,
        "" if default_username.is_empty() => None,
        "" => Some(default_username.to_string()),
        name => Some(name.to_string()),
    }
}
