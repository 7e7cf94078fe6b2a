//! Four-step wizard that accumulates a [`Connection`]
//!
//! A draft moves through name → source → destination → schedule. Each
//! `advance` checks that the current step's required fields are filled in;
//! advancing past the last step finalizes the draft into a [`Submission`].
//! Going back never loses entered values.

use chrono::NaiveDateTime;
use integrator_core::connection::{missing_fields, parse_start_time};
use integrator_core::{
    BigQueryConfig, Connection, ConnectionId, ConnectionStatus, Destination, DestinationKind,
    Error, GoogleAdsConfig, MetaMarketingConfig, Result, Schedule, ScheduleFrequency, Secret,
    Source,
};
use std::fmt;
use tracing::debug;

/// Wizard position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WizardStep {
    /// Connection name
    Name = 1,
    /// `BigQuery` source settings
    Source = 2,
    /// Destination type and settings
    Destination = 3,
    /// Frequency and start time
    Schedule = 4,
}

impl WizardStep {
    /// All steps in order
    pub const ALL: [Self; 4] = [Self::Name, Self::Source, Self::Destination, Self::Schedule];

    /// 1-based position
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// Step heading
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Name => "Connection Name",
            Self::Source => "BigQuery Source Configuration",
            Self::Destination => "Destination Configuration",
            Self::Schedule => "Schedule Configuration",
        }
    }

    /// The following step, `None` on the last one
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Name => Some(Self::Source),
            Self::Source => Some(Self::Destination),
            Self::Destination => Some(Self::Schedule),
            Self::Schedule => None,
        }
    }

    /// The preceding step, `None` on the first one
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Name => None,
            Self::Source => Some(Self::Name),
            Self::Destination => Some(Self::Source),
            Self::Schedule => Some(Self::Destination),
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DraftMode {
    Create,
    Edit {
        id: ConnectionId,
        status: ConnectionStatus,
    },
}

/// Result of finalizing a draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// New connection with a freshly assigned id
    Create(Connection),
    /// Edited connection carrying the id it was opened with
    Update(Connection),
}

impl Submission {
    /// The finalized connection
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        match self {
            Self::Create(connection) | Self::Update(connection) => connection,
        }
    }

    /// Take the finalized connection
    #[must_use]
    pub fn into_connection(self) -> Connection {
        match self {
            Self::Create(connection) | Self::Update(connection) => connection,
        }
    }
}

/// What `advance` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Moved to this step
    Moved(WizardStep),
    /// Last step passed; the draft produced a submission
    Finalized(Submission),
}

/// In-progress connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionDraft {
    step: WizardStep,
    mode: DraftMode,
    name: String,
    source: BigQueryConfig,
    destination: Destination,
    frequency: ScheduleFrequency,
    start_time: Option<NaiveDateTime>,
    base_url: String,
    api_key: Secret,
}

impl Default for ConnectionDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionDraft {
    /// Empty draft for a new connection
    #[must_use]
    pub fn new() -> Self {
        Self {
            step: WizardStep::Name,
            mode: DraftMode::Create,
            name: String::new(),
            source: BigQueryConfig::default(),
            destination: Destination::default(),
            frequency: ScheduleFrequency::default(),
            start_time: None,
            base_url: String::new(),
            api_key: Secret::default(),
        }
    }

    /// Draft pre-filled from an existing connection; finalizing keeps its id
    ///
    /// The status is carried over as well instead of being reset to
    /// `disconnected`, so an edit does not hide the last sync result.
    #[must_use]
    pub fn edit(connection: &Connection) -> Self {
        let Source::BigQuery(source) = &connection.source;
        Self {
            step: WizardStep::Name,
            mode: DraftMode::Edit {
                id: connection.id.clone(),
                status: connection.status,
            },
            name: connection.name.clone(),
            source: source.clone(),
            destination: connection.destination.clone(),
            frequency: connection.schedule.frequency,
            start_time: Some(connection.schedule.start_time),
            base_url: connection.base_url.clone(),
            api_key: connection.api_key.clone(),
        }
    }

    /// Current step
    #[must_use]
    pub const fn step(&self) -> WizardStep {
        self.step
    }

    /// Id of the connection being edited, `None` for a new one
    #[must_use]
    pub const fn editing(&self) -> Option<&ConnectionId> {
        match &self.mode {
            DraftMode::Create => None,
            DraftMode::Edit { id, .. } => Some(id),
        }
    }

    /// Connection name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the connection name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Source settings
    #[must_use]
    pub const fn source(&self) -> &BigQueryConfig {
        &self.source
    }

    /// Mutable source settings
    pub const fn source_mut(&mut self) -> &mut BigQueryConfig {
        &mut self.source
    }

    /// Destination, whichever variant is selected
    #[must_use]
    pub const fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Google Ads settings when that destination is selected
    pub const fn google_ads_mut(&mut self) -> Option<&mut GoogleAdsConfig> {
        match &mut self.destination {
            Destination::GoogleAds(config) => Some(config),
            Destination::MetaMarketing(_) => None,
        }
    }

    /// Meta Marketing settings when that destination is selected
    pub const fn meta_marketing_mut(&mut self) -> Option<&mut MetaMarketingConfig> {
        match &mut self.destination {
            Destination::MetaMarketing(config) => Some(config),
            Destination::GoogleAds(_) => None,
        }
    }

    /// Select a destination type.
    ///
    /// Switching to another type discards the previous settings and starts the
    /// new type from empty values. Returns whether the type changed.
    pub fn set_destination_kind(&mut self, kind: DestinationKind) -> bool {
        if self.destination.kind() == kind {
            return false;
        }
        debug!(from = %self.destination.kind(), to = %kind, "destination type switched");
        self.destination = Destination::empty(kind);
        true
    }

    /// Run frequency
    #[must_use]
    pub const fn frequency(&self) -> ScheduleFrequency {
        self.frequency
    }

    /// Set the run frequency
    pub const fn set_frequency(&mut self, frequency: ScheduleFrequency) {
        self.frequency = frequency;
    }

    /// First run, if set
    #[must_use]
    pub const fn start_time(&self) -> Option<NaiveDateTime> {
        self.start_time
    }

    /// Set the first run from text; an empty string clears it
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] when the text is not a recognised
    /// timestamp. The previous value is kept in that case.
    pub fn set_start_time(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            self.start_time = None;
            return Ok(());
        }
        self.start_time = Some(parse_start_time(text)?);
        Ok(())
    }

    /// Set the first run
    pub const fn set_start_time_value(&mut self, start_time: NaiveDateTime) {
        self.start_time = Some(start_time);
    }

    /// Backend credentials stored with the connection
    pub fn set_backend(&mut self, base_url: impl Into<String>, api_key: impl Into<Secret>) {
        self.base_url = base_url.into();
        self.api_key = api_key.into();
    }

    /// Check one step's required fields
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the step and its empty fields.
    pub fn validate_step(&self, step: WizardStep) -> Result<()> {
        let missing = match step {
            WizardStep::Name => {
                if self.name.is_empty() {
                    vec!["name".to_string()]
                } else {
                    Vec::new()
                }
            }
            WizardStep::Source => missing_fields(&self.source),
            WizardStep::Destination => self.destination.missing_fields(),
            WizardStep::Schedule => {
                if self.start_time.is_none() {
                    vec!["start_time".to_string()]
                } else {
                    Vec::new()
                }
            }
        };

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(step.to_string(), missing))
        }
    }

    /// Move to the next step, or finalize on the last one
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the current step (or, when finalizing,
    /// any step) has an empty required field. The draft is left unchanged.
    pub fn advance(&mut self) -> Result<Advance> {
        self.validate_step(self.step)?;
        match self.step.next() {
            Some(next) => {
                self.step = next;
                Ok(Advance::Moved(next))
            }
            None => self.finalize().map(Advance::Finalized),
        }
    }

    /// Go back one step; entered values are kept
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] on the first step.
    pub fn retreat(&mut self) -> Result<WizardStep> {
        let previous = self
            .step
            .previous()
            .ok_or_else(|| Error::invalid_value("step", "already at the first step"))?;
        self.step = previous;
        Ok(previous)
    }

    /// Discard the draft
    pub fn cancel(self) {
        debug!(step = self.step.number(), editing = self.editing().is_some(), "draft cancelled");
    }

    fn finalize(&self) -> Result<Submission> {
        for step in WizardStep::ALL {
            self.validate_step(step)?;
        }
        let start_time = self
            .start_time
            .ok_or_else(|| Error::validation(WizardStep::Schedule.to_string(), ["start_time"]))?;

        let (id, status) = match &self.mode {
            DraftMode::Create => (ConnectionId::generate(), ConnectionStatus::Disconnected),
            DraftMode::Edit { id, status } => (id.clone(), *status),
        };

        let connection = Connection {
            id,
            name: self.name.clone(),
            source: Source::BigQuery(self.source.clone()),
            destination: self.destination.clone(),
            schedule: Schedule {
                frequency: self.frequency,
                start_time,
            },
            status,
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
        };

        Ok(match self.mode {
            DraftMode::Create => Submission::Create(connection),
            DraftMode::Edit { .. } => Submission::Update(connection),
        })
    }
}
