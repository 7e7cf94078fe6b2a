//! Cached view of the backend's source and destination schemas

use crate::api_client::ApiClient;
use async_trait::async_trait;
use integrator_core::{Error, ParsedSchemas, Result, SchemaDocument};
use parking_lot::Mutex;
use std::fmt;
use tracing::{debug, warn};

/// Shown when the schema document cannot be loaded
pub const SCHEMA_FETCH_FAILED: &str = "Failed to fetch schemas";

/// Anything that can produce the raw schema document
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Fetch the document
    async fn fetch_schemas(&self) -> Result<SchemaDocument>;
}

#[async_trait]
impl SchemaSource for ApiClient {
    async fn fetch_schemas(&self) -> Result<SchemaDocument> {
        Self::fetch_schemas(self).await
    }
}

/// Load state of a [`SchemaCatalog`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CatalogState {
    /// Nothing requested yet
    #[default]
    Idle,
    /// A load is running
    Loading,
    /// Last load succeeded
    Loaded(ParsedSchemas),
    /// Last load failed with this message
    Failed(String),
}

/// Schema document holder with one load at a time
pub struct SchemaCatalog<S> {
    source: S,
    state: Mutex<CatalogState>,
}

impl<S> fmt::Debug for SchemaCatalog<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCatalog")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl<S: SchemaSource> SchemaCatalog<S> {
    /// Idle catalog reading from `source`
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: Mutex::new(CatalogState::Idle),
        }
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> CatalogState {
        self.state.lock().clone()
    }

    /// Loaded schemas, if the last load succeeded
    #[must_use]
    pub fn schemas(&self) -> Option<ParsedSchemas> {
        match &*self.state.lock() {
            CatalogState::Loaded(schemas) => Some(schemas.clone()),
            _ => None,
        }
    }

    /// Failure message of the last load
    #[must_use]
    pub fn error(&self) -> Option<String> {
        match &*self.state.lock() {
            CatalogState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    /// Whether a load is running
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(*self.state.lock(), CatalogState::Loading)
    }

    /// Fetch and reshape the document.
    ///
    /// Allowed from any state except `Loading`. If the returned future is
    /// dropped before completing, the previous state is restored.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] while another load is running
    /// - the source's error; the catalog then holds [`SCHEMA_FETCH_FAILED`]
    pub async fn load(&self) -> Result<ParsedSchemas> {
        let mut guard = LoadingGuard::begin(&self.state)?;

        let result = self.source.fetch_schemas().await;
        match result {
            Ok(document) => {
                let parsed = ParsedSchemas::from(document);
                debug!(
                    sources = parsed.sources.len(),
                    destinations = parsed.destinations.len(),
                    "schemas loaded"
                );
                guard.finish(CatalogState::Loaded(parsed.clone()));
                Ok(parsed)
            }
            Err(e) => {
                warn!(error = %e, "schema fetch failed");
                guard.finish(CatalogState::Failed(SCHEMA_FETCH_FAILED.to_string()));
                Err(e)
            }
        }
    }
}

/// Holds the catalog in `Loading`; restores the prior state unless finished
struct LoadingGuard<'a> {
    state: &'a Mutex<CatalogState>,
    previous: Option<CatalogState>,
}

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a Mutex<CatalogState>) -> Result<Self> {
        let mut current = state.lock();
        if matches!(*current, CatalogState::Loading) {
            return Err(Error::busy("schema load"));
        }
        let previous = std::mem::replace(&mut *current, CatalogState::Loading);
        Ok(Self {
            state,
            previous: Some(previous),
        })
    }

    fn finish(&mut self, next: CatalogState) {
        self.previous = None;
        *self.state.lock() = next;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.state.lock() = previous;
        }
    }
}
