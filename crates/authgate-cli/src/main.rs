//! Authgate - terminal front end for the 401 login interceptor.
//!
//! Issues requests through the interceptor; when the backend answers 401 the
//! console login prompt appears and the request completes after login.

mod config;
mod console;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use authgate_core::{AuthContext, RequestSpec};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use console::ConsolePresenter;

const USAGE: &str = "\
Usage: authgate <command>

Commands:
  get <path>           GET a resource (logs in on 401)
  post <path> <json>   POST a JSON body (logs in on 401)
  whoami               Show the logged-in user
  logout               End the session
  shell                Run commands interactively in one session

Environment:
  AUTHGATE_BASE_URL    Backend base URL
  AUTHGATE_USERNAME    Username to pre-fill
  RUST_LOG             Log filter (default: warn)";

#[derive(Debug, PartialEq)]
enum Command {
    Get(String),
    Post(String, serde_json::Value),
    Whoami,
    Logout,
    Shell,
    Help,
}

impl Command {
    /// Parse one shell line: `<command> [path] [json body...]`
    fn parse_line(line: &str) -> Result<Self> {
        let mut args = vec!["authgate".to_string()];
        args.extend(line.trim().splitn(3, char::is_whitespace).filter(|s| !s.is_empty()).map(String::from));
        Self::parse(&args)
    }

    fn parse(args: &[String]) -> Result<Self> {
        match args.get(1).map(String::as_str) {
            Some("get") => {
                let path = args.get(2).context("get: missing <path>")?;
                Ok(Command::Get(path.clone()))
            }
            Some("post") => {
                let path = args.get(2).context("post: missing <path>")?;
                let body = args.get(3).map(String::as_str).unwrap_or("{}");
                let body = serde_json::from_str(body).context("post: body is not valid JSON")?;
                Ok(Command::Post(path.clone(), body))
            }
            Some("whoami") => Ok(Command::Whoami),
            Some("logout") => Ok(Command::Logout),
            Some("shell") => Ok(Command::Shell),
            Some("help") | Some("--help") | Some("-h") | None => Ok(Command::Help),
            Some(other) => Err(anyhow::anyhow!("Unknown command: {}\n\n{}", other, USAGE)),
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let command = Command::parse(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let file_config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    // The presenter saves back what came from the file, without env overrides
    let presenter = Arc::new(ConsolePresenter::new(file_config.clone()));

    let mut config = file_config;
    config.apply_env();
    info!(base_url = %config.auth.base_url, "Authgate starting");

    let username = config.default_username();
    let ctx = AuthContext::connect(&config.auth, presenter, |guard| {
        guard.with_default_username(username)
    })
    .context("Failed to build HTTP client")?;

    if command == Command::Shell {
        return shell(&ctx).await;
    }
    run(&ctx, command).await
}

async fn run(ctx: &AuthContext, command: Command) -> Result<()> {
    match command {
        Command::Get(path) => {
            let response = ctx.interceptor.send(RequestSpec::get(path)).await?;
            println!("{}", response.status);
            println!("{}", response.body);
        }
        Command::Post(path, body) => {
            let response = ctx.interceptor.send(RequestSpec::post(path, body)).await?;
            println!("{}", response.status);
            println!("{}", response.body);
        }
        Command::Whoami => {
            let user = ctx.auth.get_logged_user().await?;
            if user.is_anonymous() {
                println!("Not logged in");
            } else {
                println!("{}", serde_json::to_string_pretty(&user)?);
            }
        }
        Command::Logout => {
            ctx.auth.logout().await?;
            // Next whoami asks the backend again
            ctx.auth.invalidate_logged_user();
            println!("Logged out");
        }
        Command::Shell | Command::Help => println!("{}", USAGE),
    }
    Ok(())
}

/// Read commands until EOF or `quit`. The session cookie lives as long as
/// the process, so later commands reuse the login.
async fn shell(ctx: &AuthContext) -> Result<()> {
    loop {
        let line = tokio::task::spawn_blocking(|| -> io::Result<Option<String>> {
            use std::io::Write;
            print!("authgate> ");
            io::stdout().flush()?;
            let mut line = String::new();
            let read = io::stdin().read_line(&mut line)?;
            Ok((read > 0).then_some(line))
        })
        .await
        .context("Shell input task failed")??;

        let Some(line) = line else {
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            return Ok(());
        }

        let result = match Command::parse_line(line) {
            Ok(Command::Shell) => Ok(()),
            Ok(command) => run(ctx, command).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            eprintln!("Error: {:#}", e);
        }
    }
}
