use std::fmt::Write as _;
use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use client::{
    AuthError, AuthGateway, ClientConfig, ConfigError, CredentialStore, FileStore, NavError, NavOutcome,
    NavigationController, RouteTable, Session,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

const DEFAULT_STORE_FILE: &str = "credentials.json";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Nav(#[from] NavError),
    #[error("failed to read input: {0}")]
    Input(#[from] io::Error),
    #[error("missing {0}")]
    MissingInput(&'static str),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    Unhealthy(u16),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "scribe", about = "Scribe account and navigation CLI")]
struct Cli {
    #[arg(long, env = "SCRIBE_API_URL", default_value = client::net::config::DEFAULT_API_URL)]
    base_url: String,

    /// Credential file; defaults to `$HOME/.config/scribe/credentials.json`.
    #[arg(long, env = "SCRIBE_CREDENTIALS")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the provider is up.
    Ping,
    /// Sign in and show where navigation lands.
    Login {
        email: String,
        #[arg(long, env = "SCRIBE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Register {
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, env = "SCRIBE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Logout,
    /// Show the stored session.
    Whoami {
        /// Re-fetch the profile from the provider first.
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    ChangePassword {
        #[arg(long, hide_env_values = true, env = "SCRIBE_PASSWORD")]
        current: Option<String>,
        #[arg(long = "new")]
        new_password: Option<String>,
    },
    ForgotPassword {
        email: String,
    },
    ResetPassword {
        otp: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long = "new")]
        new_password: Option<String>,
    },
    /// Show what navigating to `path` would do under the stored session.
    Open {
        path: String,
    },
    /// List the route table.
    Routes,
}

struct CliContext {
    controller: Arc<NavigationController>,
}

impl CliContext {
    fn gateway(&self) -> &AuthGateway {
        self.controller.gateway()
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?.with_base_url(&cli.base_url);
    let store_path = cli.store.unwrap_or_else(default_store_path);
    tracing::debug!(store = %store_path.display(), base_url = %config.base_url, "starting");

    if matches!(cli.command, Command::Ping) {
        return run_ping(&config.base_url).await;
    }
    if matches!(cli.command, Command::Routes) {
        print!("{}", render_routes(&RouteTable::standard()));
        return Ok(());
    }

    let store = Arc::new(CredentialStore::new(Arc::new(FileStore::new(store_path))));
    let gateway = Arc::new(AuthGateway::new(&config, store)?);
    let ctx = CliContext { controller: Arc::new(NavigationController::new(RouteTable::standard(), gateway)) };

    run(&ctx, cli.command).await
}

async fn run(ctx: &CliContext, command: Command) -> Result<(), CliError> {
    match command {
        Command::Ping | Command::Routes => Ok(()),
        Command::Login { email, password } => {
            let password = read_secret("password", password)?;
            let outcome = ctx.controller.login(&email, &password).await?;
            println!("{}", render_session(&ctx.controller.session()));
            print!("{}", render_outcome(&outcome));
            Ok(())
        }
        Command::Register { email, name, password } => {
            let name = name.unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_owned());
            let password = read_secret("password", password)?;
            let message = ctx.gateway().register(&name, &email, &password).await?;
            println!("{message}");
            Ok(())
        }
        Command::Logout => {
            let outcome = ctx.controller.logout().await?;
            println!("signed out");
            print!("{}", render_outcome(&outcome));
            Ok(())
        }
        Command::Whoami { refresh } => {
            if refresh {
                ctx.gateway().refresh_profile().await?;
            }
            println!("{}", render_session(&ctx.controller.session()));
            Ok(())
        }
        Command::ChangePassword { current, new_password } => {
            let current = read_secret("current password", current)?;
            let new_password = read_secret("new password", new_password)?;
            let message = ctx.gateway().change_password(&current, &new_password).await?;
            println!("{message}");
            Ok(())
        }
        Command::ForgotPassword { email } => {
            let reply = ctx.gateway().forgot_password(&email).await?;
            println!("{}", reply.message);
            if let Some(otp) = reply.otp {
                println!("code: {otp}");
            }
            Ok(())
        }
        Command::ResetPassword { otp, email, new_password } => {
            let new_password = read_secret("new password", new_password)?;
            let message = ctx.gateway().reset_password(email.as_deref(), &otp, &new_password).await?;
            println!("{message}");
            Ok(())
        }
        Command::Open { path } => {
            let outcome = ctx.controller.navigate(&path)?;
            print!("{}", render_outcome(&outcome));
            Ok(())
        }
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let response = reqwest::Client::new().get(format!("{base_url}/health")).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    let body = response.json::<Value>().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

// =============================================================================
// INPUT
// =============================================================================

fn default_store_path() -> PathBuf {
    std::env::var_os("HOME").map_or_else(
        || PathBuf::from(".scribe").join(DEFAULT_STORE_FILE),
        |home| PathBuf::from(home).join(".config/scribe").join(DEFAULT_STORE_FILE),
    )
}

fn read_secret(label: &'static str, provided: Option<String>) -> Result<String, CliError> {
    if let Some(value) = provided {
        return Ok(value);
    }
    eprint!("{label}: ");
    io::stderr().flush()?;
    read_line(&mut io::stdin().lock(), label)
}

fn read_line(input: &mut impl BufRead, label: &'static str) -> Result<String, CliError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(CliError::MissingInput(label));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

// =============================================================================
// OUTPUT
// =============================================================================

fn render_session(session: &Session) -> String {
    match session.profile() {
        Some(profile) => format!("signed in as {} ({})", profile.email, profile.role),
        None => "not signed in".to_owned(),
    }
}

fn render_outcome(outcome: &NavOutcome) -> String {
    let mut out = String::new();
    for hop in &outcome.redirects {
        let _ = writeln!(out, "  {} -> {} ({:?})", hop.from, hop.to, hop.reason);
    }
    let navbar = if outcome.navbar { "navbar" } else { "no navbar" };
    let _ = writeln!(out, "at {} [{}, {navbar}]", outcome.location, outcome.route.capability);
    out
}

fn render_routes(table: &RouteTable) -> String {
    let mut out = String::new();
    for route in table.routes() {
        let navbar = if route.navbar { "navbar" } else { "" };
        let _ = writeln!(out, "{:<28} {:<7} {navbar}", route.pattern, route.capability.as_str());
    }
    for (from, to) in table.aliases() {
        let _ = writeln!(out, "{from:<28} -> {to}");
    }
    let _ = writeln!(out, "{:<28} -> {}", "*", table.fallback());
    out
}
