//! `integrator` command line client
//!
//! Talks to the integration dashboard backend: health checks, user
//! management, schema browsing, and offline connection planning through the
//! same wizard the dashboard uses.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

mod plan;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use integrator_client::{ApiClient, HealthProbe, PROBE_MISSING_INPUT, SchemaCatalog, UserPanel};
use integrator_connections::{
    ConnectionRegistry, EMPTY_REGISTRY_MESSAGE, SimulatedSyncJobs, SyncCoordinator,
};
use integrator_core::{
    Config, Credentials, Error, NewUser, PasswordChange, Secret, User, UserRef,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Command line interface for the integration dashboard
#[derive(Parser)]
#[command(
    name = "integrator",
    version = env!("CARGO_PKG_VERSION"),
    about = "Command line client for the data integration dashboard"
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print results as JSON and log as JSON
    #[arg(long)]
    json: bool,

    /// Login name for authenticated commands
    #[arg(short, long, env = "INTEGRATOR_USERNAME")]
    username: Option<String>,

    /// Password for authenticated commands
    #[arg(short, long, env = "INTEGRATOR_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Check that the backend answers
    Health,

    /// Check a connection's backend with its API key
    Probe {
        /// Connection backend URL
        #[arg(long, value_name = "URL", default_value = "")]
        base_url: String,

        /// Connection API key
        #[arg(long, env = "INTEGRATOR_API_KEY", hide_env_values = true, default_value = "")]
        api_key: String,
    },

    /// Show the logged-in account
    Whoami,

    /// Manage accounts (administrators only)
    Users {
        /// User management subcommand
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Change the logged-in account's password
    ChangePassword {
        /// Current password
        #[arg(long)]
        old: String,

        /// New password
        #[arg(long)]
        new: String,
    },

    /// List source and destination schemas
    Schemas,

    /// Work with connection definitions
    Connections {
        /// Connection subcommand
        #[command(subcommand)]
        action: ConnectionCommands,
    },
}

/// User management commands
#[derive(Subcommand)]
enum UserCommands {
    /// List accounts
    List,

    /// Create an account
    Create {
        /// Login name
        #[arg(long)]
        username: String,

        /// Email address
        #[arg(long)]
        email: String,

        /// Initial password
        #[arg(long)]
        password: String,

        /// Grant administrator rights
        #[arg(long)]
        admin: bool,
    },

    /// Delete an account
    Delete {
        /// Numeric id or email address
        #[arg(value_name = "ID_OR_EMAIL")]
        target: UserRef,

        /// Skip the confirmation step
        #[arg(short, long)]
        yes: bool,
    },
}

/// Connection commands
#[derive(Subcommand)]
enum ConnectionCommands {
    /// Validate a plan file through the wizard and list the result
    Plan {
        /// JSON file holding a list of connections
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Run a simulated sync for every accepted connection
        #[arg(long)]
        sync: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(base_url) = &cli.base_url {
        config.backend.base_url.clone_from(base_url);
    }
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if cli.json {
        config.logging.format = "json".to_string();
    }
    integrator_core::init_logging(&config.logging).context("initializing logging")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.backend.base_url,
        "integrator starting"
    );

    let client = ApiClient::from_config(&config.backend)?;

    match &cli.command {
        Commands::Health => health(&cli, client).await,
        Commands::Probe { base_url, api_key } => probe(&cli, client, base_url, api_key).await,
        Commands::Whoami => {
            let user = login(&cli, &client).await?;
            emit(&cli, &user, || format_user(&user));
            Ok(())
        }
        Commands::Users { action } => users(&cli, client, action).await,
        Commands::ChangePassword { old, new } => {
            let user = login(&cli, &client).await?;
            let panel = UserPanel::new(client, user);
            let change = PasswordChange {
                old_password: Secret::from(old.as_str()),
                new_password: Secret::from(new.as_str()),
            };
            run_panel_action(&panel, panel.change_password(&change).await)
        }
        Commands::Schemas => schemas(&cli, client).await,
        Commands::Connections {
            action: ConnectionCommands::Plan { file, sync },
        } => plan_connections(&cli, &config, file, *sync).await,
    }
}

/// Print `value` as JSON with `--json`, otherwise the text rendering
fn emit<T: Serialize>(cli: &Cli, value: &T, text: impl FnOnce() -> String) {
    if cli.json {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!(error = %e, "failed to render JSON output"),
        }
    } else {
        println!("{}", text());
    }
}

fn format_user(user: &User) -> String {
    format!(
        "{} <{}>{}{}",
        user.username,
        user.email,
        if user.is_admin { " [admin]" } else { "" },
        if user.is_active { "" } else { " [inactive]" }
    )
}

async fn login(cli: &Cli, client: &ApiClient) -> anyhow::Result<User> {
    let (Some(username), Some(password)) = (&cli.username, &cli.password) else {
        bail!(
            "credentials required: pass --username/--password \
             or set INTEGRATOR_USERNAME/INTEGRATOR_PASSWORD"
        );
    };
    let user = client
        .login(&Credentials::new(username.as_str(), password.as_str()))
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message("Login failed")))?;
    Ok(user)
}

/// Turn a panel result into the panel's message or error text
fn run_panel_action<D: integrator_client::UserDirectory>(
    panel: &UserPanel<D>,
    result: integrator_core::Result<()>,
) -> anyhow::Result<()> {
    match result {
        Ok(()) => {
            if let Some(message) = panel.message() {
                println!("{message}");
            }
            if let Some(error) = panel.error() {
                eprintln!("{error}");
            }
            Ok(())
        }
        Err(e) => bail!(panel.error().unwrap_or_else(|| e.to_string())),
    }
}

async fn health(cli: &Cli, client: ApiClient) -> anyhow::Result<()> {
    let report = HealthProbe::new(client).backend().await;
    emit(cli, &report, || report.message.clone());
    if report.healthy {
        Ok(())
    } else {
        bail!("backend is not healthy")
    }
}

async fn probe(cli: &Cli, client: ApiClient, base_url: &str, api_key: &str) -> anyhow::Result<()> {
    let report = HealthProbe::new(client)
        .connection(base_url, &Secret::from(api_key))
        .await
        .map_err(|e| anyhow::anyhow!(probe_error_message(&e)))?;
    emit(cli, &report, || report.message.clone());
    if report.healthy {
        Ok(())
    } else {
        bail!("connection is not healthy")
    }
}

fn probe_error_message(error: &Error) -> String {
    match error {
        Error::Validation { .. } => PROBE_MISSING_INPUT.to_string(),
        other => other.user_message("Connection check failed"),
    }
}

async fn users(cli: &Cli, client: ApiClient, action: &UserCommands) -> anyhow::Result<()> {
    let user = login(cli, &client).await?;
    let panel = UserPanel::new(client, user);

    match action {
        UserCommands::List => {
            run_panel_action(&panel, panel.refresh().await)?;
            let users = panel.users();
            emit(cli, &users, || {
                users.iter().map(format_user).collect::<Vec<_>>().join("\n")
            });
            Ok(())
        }
        UserCommands::Create {
            username,
            email,
            password,
            admin,
        } => {
            let new_user = NewUser {
                username: username.clone(),
                email: email.clone(),
                password: Secret::from(password.as_str()),
                is_admin: *admin,
            };
            run_panel_action(&panel, panel.create_user(&new_user).await)
        }
        UserCommands::Delete { target, yes } => {
            // The list resolves ids to accounts for the self-deletion check
            run_panel_action(&panel, panel.refresh().await)?;
            run_panel_action(&panel, panel.request_delete(target.clone()))?;
            if !*yes {
                panel.cancel_delete();
                println!("Not deleting {target}; re-run with --yes to confirm");
                return Ok(());
            }
            run_panel_action(&panel, panel.confirm_delete().await.map(|_| ()))
        }
    }
}

async fn schemas(cli: &Cli, client: ApiClient) -> anyhow::Result<()> {
    let catalog = SchemaCatalog::new(client);
    let parsed = catalog
        .load()
        .await
        .map_err(|_| anyhow::anyhow!(catalog.error().unwrap_or_default()))?;

    emit(cli, &parsed, || {
        let mut out = String::new();
        let sections = [
            ("Sources", &parsed.sources),
            ("Destinations", &parsed.destinations),
        ];
        for (title, section) in sections {
            out.push_str(title);
            out.push('\n');
            for definition in section {
                out.push_str(&format!("  {}\n", definition.name));
                for row in definition.rows() {
                    out.push_str(&format!(
                        "    {:<24} {:<10} {:<8} {}\n",
                        row.name,
                        row.kind,
                        if row.required { "required" } else { "optional" },
                        row.description
                    ));
                }
            }
        }
        out.trim_end().to_string()
    });
    Ok(())
}

async fn plan_connections(
    cli: &Cli,
    config: &Config,
    file: &std::path::Path,
    sync: bool,
) -> anyhow::Result<()> {
    let entries = plan::load(file)
        .await
        .with_context(|| format!("reading plan {}", file.display()))?;

    let mut registry = ConnectionRegistry::new();
    let (created, rejected) = plan::apply(entries, &mut registry);
    for entry in &rejected {
        eprintln!("entry {} ({}): {}", entry.index, entry.name, entry.error);
    }

    if sync && !created.is_empty() {
        let coordinator = SyncCoordinator::from_config(
            Arc::new(SimulatedSyncJobs::from_config(&config.sync)),
            &config.sync,
        );
        let outcomes = join_all(created.iter().map(|id| registry.run_sync(id, &coordinator))).await;

        for (id, outcome) in created.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => {
                    registry.record_outcome(id, &outcome);
                }
                Err(e) => eprintln!("sync of {id} failed: {e}"),
            }
        }
    }

    let summaries = registry.summaries();
    emit(cli, &summaries, || {
        if summaries.is_empty() {
            EMPTY_REGISTRY_MESSAGE.to_string()
        } else {
            summaries
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        }
    });

    if rejected.is_empty() {
        Ok(())
    } else {
        bail!("{} of {} entries rejected", rejected.len(), rejected.len() + created.len())
    }
}
