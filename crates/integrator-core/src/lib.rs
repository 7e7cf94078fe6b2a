//! Core types and utilities for the integration dashboard client

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod config;
pub mod connection;
pub mod error;
pub mod schema;
pub mod secret;
pub mod user;

// Re-export commonly used types
pub use config::{BackendConfig, Config, LoggingConfig, SyncConfig};
pub use connection::{
    BigQueryConfig, Connection, ConnectionId, ConnectionStatus, Destination, DestinationKind,
    GoogleAdsConfig, MetaMarketingConfig, Schedule, ScheduleFrequency, Source,
};
pub use error::{Error, Result};
pub use schema::{FieldSpec, ParsedSchemas, SchemaDefinition, SchemaDocument};
pub use secret::Secret;
pub use user::{Credentials, NewUser, PasswordChange, TokenResponse, User, UserRef};

/// Initialize the logging system
///
/// `RUST_LOG` wins over the configured level when set. Output goes to stderr.
///
/// # Errors
///
/// Returns an error if the level is not a valid filter or a global subscriber
/// is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::configuration(format!("invalid log level '{}': {e}", config.level)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    installed.map_err(|e| Error::configuration(format!("failed to initialize logging: {e}")))
}
