//! In-memory list of configured connections

use crate::draft::Submission;
use crate::sync::{SyncCoordinator, SyncOutcome};
use integrator_core::{Connection, ConnectionId, ConnectionStatus, Error, Result};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Shown when the registry has no connections
pub const EMPTY_REGISTRY_MESSAGE: &str = "No connections yet. Create your first connection!";

/// One line of the connection list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    /// Connection id
    pub id: ConnectionId,
    /// Display name
    pub name: String,
    /// `BigQuery - dataset.table`
    pub source: String,
    /// Destination type label
    pub destination: String,
    /// `frequency starting YYYY-MM-DD HH:MM`
    pub schedule: String,
    /// Current status
    pub status: ConnectionStatus,
}

impl From<&Connection> for ConnectionSummary {
    fn from(connection: &Connection) -> Self {
        Self {
            id: connection.id.clone(),
            name: connection.name.clone(),
            source: connection.source.describe(),
            destination: connection.destination.kind().label().to_string(),
            schedule: connection.schedule.describe(),
            status: connection.status,
        }
    }
}

impl fmt::Display for ConnectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} -> {}, {}",
            self.name, self.status, self.source, self.destination, self.schedule
        )
    }
}

/// Ordered collection of connections, in creation order
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    /// Empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connections: Vec::new(),
        }
    }

    /// Append a connection
    pub fn create(&mut self, connection: Connection) {
        info!(connection_id = %connection.id, name = %connection.name, "connection created");
        self.connections.push(connection);
    }

    /// Replace the connection stored under `id`, keeping its position and id.
    ///
    /// Returns `false` and changes nothing when `id` is absent.
    pub fn update(&mut self, id: &ConnectionId, mut connection: Connection) -> bool {
        let Some(slot) = self.connections.iter_mut().find(|c| &c.id == id) else {
            debug!(connection_id = %id, "update ignored, connection not found");
            return false;
        };
        connection.id = id.clone();
        *slot = connection;
        info!(connection_id = %id, "connection updated");
        true
    }

    /// Remove and return the connection stored under `id`
    pub fn delete(&mut self, id: &ConnectionId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| &c.id == id)?;
        let removed = self.connections.remove(index);
        info!(connection_id = %id, "connection deleted");
        Some(removed)
    }

    /// Store a finalized draft: create or update depending on the submission
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when an update targets a connection that is
    /// no longer in the registry.
    pub fn commit(&mut self, submission: Submission) -> Result<ConnectionId> {
        match submission {
            Submission::Create(connection) => {
                let id = connection.id.clone();
                self.create(connection);
                Ok(id)
            }
            Submission::Update(connection) => {
                let id = connection.id.clone();
                if self.update(&id, connection) {
                    Ok(id)
                } else {
                    Err(Error::not_found(format!("connection {id}")))
                }
            }
        }
    }

    /// Connection stored under `id`
    #[must_use]
    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.id == id)
    }

    /// Connections in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    /// Number of connections
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Set the status of `id`; returns whether it was found
    pub fn set_status(&mut self, id: &ConnectionId, status: ConnectionStatus) -> bool {
        match self.connections.iter_mut().find(|c| &c.id == id) {
            Some(connection) => {
                connection.status = status;
                true
            }
            None => false,
        }
    }

    /// List lines in creation order
    #[must_use]
    pub fn summaries(&self) -> Vec<ConnectionSummary> {
        self.connections.iter().map(ConnectionSummary::from).collect()
    }

    /// Run a sync for `id` without recording anything.
    ///
    /// Takes `&self` so syncs of distinct connections can be awaited together;
    /// pass each outcome to [`Self::record_outcome`] afterwards.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `id` is not in the registry
    /// - any error from [`SyncCoordinator::run`]
    pub async fn run_sync(
        &self,
        id: &ConnectionId,
        coordinator: &SyncCoordinator,
    ) -> Result<SyncOutcome> {
        let connection = self
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("connection {id}")))?;
        coordinator.run(&connection).await
    }

    /// Store the status `outcome` implies; returns whether `id` was found
    pub fn record_outcome(&mut self, id: &ConnectionId, outcome: &SyncOutcome) -> bool {
        let found = self.set_status(id, outcome.status());
        if !found {
            debug!(connection_id = %id, "sync finished for a connection no longer listed");
        }
        found
    }

    /// Run a sync for `id` and record the resulting status.
    ///
    /// The status is left untouched if the sync could not be run to an outcome.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run_sync`].
    pub async fn trigger_sync(
        &mut self,
        id: &ConnectionId,
        coordinator: &SyncCoordinator,
    ) -> Result<SyncOutcome> {
        let outcome = self.run_sync(id, coordinator).await?;
        self.record_outcome(id, &outcome);
        Ok(outcome)
    }
}

impl<'a> IntoIterator for &'a ConnectionRegistry {
    type Item = &'a Connection;
    type IntoIter = std::slice::Iter<'a, Connection>;

    fn into_iter(self) -> Self::IntoIter {
        self.connections.iter()
    }
}
