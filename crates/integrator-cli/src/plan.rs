//! Connection plan files: a JSON list of connections fed through the wizard

use integrator_connections::{Advance, ConnectionDraft, ConnectionRegistry, Submission};
use integrator_core::{
    BigQueryConfig, ConnectionId, Destination, Error, Result, ScheduleFrequency, Secret,
};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// One planned connection as written in the plan file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlanEntry {
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) source: BigQueryConfig,
    #[serde(default)]
    pub(crate) destination: Destination,
    #[serde(default)]
    pub(crate) frequency: ScheduleFrequency,
    #[serde(default)]
    pub(crate) start_time: String,
    #[serde(default)]
    pub(crate) base_url: String,
    #[serde(default)]
    pub(crate) api_key: Secret,
}

/// An entry the wizard refused
#[derive(Debug)]
pub(crate) struct Rejected {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) error: Error,
}

/// Read a plan file
pub(crate) async fn load(path: &Path) -> Result<Vec<PlanEntry>> {
    let text = tokio::fs::read_to_string(path).await?;
    let entries: Vec<PlanEntry> = serde_json::from_str(&text)?;
    debug!(path = %path.display(), entries = entries.len(), "plan loaded");
    Ok(entries)
}

/// Walk one entry through every wizard step
pub(crate) fn submit(entry: PlanEntry) -> Result<Submission> {
    let mut draft = ConnectionDraft::new();

    draft.set_name(entry.name);
    draft.advance()?;

    *draft.source_mut() = entry.source;
    draft.advance()?;

    draft.set_destination_kind(entry.destination.kind());
    match entry.destination {
        Destination::GoogleAds(config) => {
            if let Some(slot) = draft.google_ads_mut() {
                *slot = config;
            }
        }
        Destination::MetaMarketing(config) => {
            if let Some(slot) = draft.meta_marketing_mut() {
                *slot = config;
            }
        }
    }
    draft.advance()?;

    draft.set_frequency(entry.frequency);
    draft.set_start_time(&entry.start_time)?;
    draft.set_backend(entry.base_url, entry.api_key);

    match draft.advance()? {
        Advance::Finalized(submission) => Ok(submission),
        Advance::Moved(step) => Err(Error::invalid_value(
            "step",
            format!("wizard stopped early at {step}"),
        )),
    }
}

/// Commit every acceptable entry to `registry`, collecting the refusals
pub(crate) fn apply(
    entries: Vec<PlanEntry>,
    registry: &mut ConnectionRegistry,
) -> (Vec<ConnectionId>, Vec<Rejected>) {
    let mut created = Vec::new();
    let mut rejected = Vec::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let name = entry.name.clone();
        match submit(entry).and_then(|submission| registry.commit(submission)) {
            Ok(id) => created.push(id),
            Err(error) => {
                warn!(index, name = %name, error = %error, "plan entry rejected");
                rejected.push(Rejected { index, name, error });
            }
        }
    }

    (created, rejected)
}
