//! Client side of the integration dashboard backend
//!
//! [`ApiClient`] speaks the REST API; the panels built on it keep the state an
//! operator sees: [`UserPanel`] for accounts, [`SchemaCatalog`] for the schema
//! document and [`HealthProbe`] for reachability checks.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod api_client;
pub mod health;
pub mod schema_catalog;
pub mod session;
pub mod users;

pub use api_client::ApiClient;
pub use health::{HealthProbe, PROBE_MISSING_INPUT, ProbeReport};
pub use schema_catalog::{CatalogState, SCHEMA_FETCH_FAILED, SchemaCatalog, SchemaSource};
pub use session::{MemorySessionStore, Session, SessionStore};
pub use users::{PASSWORD_CHANGED, USER_CREATED, USER_DELETED, UserDirectory, UserPanel};
