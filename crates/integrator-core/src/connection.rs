//! Connection data model: tagged source/destination configs, schedule and status

use crate::secret::{Secret, validate_present};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Opaque connection identifier, assigned once when a connection is created
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health of a connection as last reported by a sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Last sync succeeded
    Connected,
    /// Never synced
    #[default]
    Disconnected,
    /// Last sync failed
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// How often a connection runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleFrequency {
    /// Every hour
    Hourly,
    /// Every day
    #[default]
    Daily,
    /// Every week
    Weekly,
}

impl fmt::Display for ScheduleFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
        }
    }
}

impl FromStr for ScheduleFrequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(Error::invalid_value(
                "frequency",
                format!("expected hourly, daily or weekly, got '{other}'"),
            )),
        }
    }
}

/// `BigQuery` source settings; every field is required
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct BigQueryConfig {
    /// GCP project
    #[validate(length(min = 1))]
    pub project_id: String,

    /// Dataset inside the project
    #[validate(length(min = 1))]
    pub dataset_id: String,

    /// Table inside the dataset
    #[validate(length(min = 1))]
    pub table_id: String,

    /// Service account JSON, kept as entered
    #[validate(custom(function = "validate_present"))]
    pub credentials: Secret,
}

/// Google Ads destination settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleAdsConfig {
    /// Ads customer account
    #[validate(length(min = 1))]
    pub customer_id: String,
    /// Developer token
    pub developer_token: Secret,
    /// OAuth access token
    pub access_token: Secret,
    /// OAuth refresh token
    pub refresh_token: Secret,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: Secret,
}

/// Meta Marketing destination settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaMarketingConfig {
    /// Marketing API access token
    #[validate(custom(function = "validate_present"))]
    pub access_token: Secret,
    /// Ad account
    pub ad_account_id: String,
    /// App id
    pub app_id: String,
    /// App secret
    pub app_secret: Secret,
}

/// Where data is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum Source {
    /// A `BigQuery` table
    #[serde(rename = "bigquery")]
    BigQuery(BigQueryConfig),
}

impl Source {
    /// One-line description for listings
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::BigQuery(config) => {
                format!("BigQuery - {}.{}", config.dataset_id, config.table_id)
            }
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::BigQuery(BigQueryConfig::default())
    }
}

/// Destination discriminator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    /// Google Ads
    #[default]
    GoogleAds,
    /// Meta Marketing
    MetaMarketing,
}

impl DestinationKind {
    /// Human readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::GoogleAds => "Google Ads",
            Self::MetaMarketing => "Meta Marketing",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoogleAds => write!(f, "google_ads"),
            Self::MetaMarketing => write!(f, "meta_marketing"),
        }
    }
}

impl FromStr for DestinationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "google_ads" => Ok(Self::GoogleAds),
            "meta_marketing" => Ok(Self::MetaMarketing),
            other => Err(Error::invalid_value(
                "destination",
                format!("expected google_ads or meta_marketing, got '{other}'"),
            )),
        }
    }
}

/// Where data is written to. Exactly one variant's config exists at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum Destination {
    /// Google Ads
    GoogleAds(GoogleAdsConfig),
    /// Meta Marketing
    MetaMarketing(MetaMarketingConfig),
}

impl Destination {
    /// The empty config for `kind`
    #[must_use]
    pub fn empty(kind: DestinationKind) -> Self {
        match kind {
            DestinationKind::GoogleAds => Self::GoogleAds(GoogleAdsConfig::default()),
            DestinationKind::MetaMarketing => Self::MetaMarketing(MetaMarketingConfig::default()),
        }
    }

    /// Discriminator of this destination
    #[must_use]
    pub const fn kind(&self) -> DestinationKind {
        match self {
            Self::GoogleAds(_) => DestinationKind::GoogleAds,
            Self::MetaMarketing(_) => DestinationKind::MetaMarketing,
        }
    }

    /// Names of required fields that are still empty
    #[must_use]
    pub fn missing_fields(&self) -> Vec<String> {
        match self {
            Self::GoogleAds(config) => missing_fields(config),
            Self::MetaMarketing(config) => missing_fields(config),
        }
    }
}

impl Default for Destination {
    fn default() -> Self {
        Self::empty(DestinationKind::default())
    }
}

/// Names of the fields of `value` that fail validation, sorted
pub fn missing_fields<T: Validate>(value: &T) -> Vec<String> {
    match value.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(ToString::to_string)
                .collect();
            fields.sort();
            fields
        }
    }
}

/// Parse a schedule start time.
///
/// Accepts `YYYY-MM-DDTHH:MM` (browser `datetime-local`) and
/// `YYYY-MM-DDTHH:MM:SS` with optional fractional seconds.
///
/// # Errors
///
/// Returns [`Error::InvalidValue`] when `text` matches neither form.
pub fn parse_start_time(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .map_err(|e| Error::invalid_value("start_time", format!("'{text}': {e}")))
}

mod start_time_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format("%Y-%m-%dT%H:%M:%S").to_string())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_start_time(&text).map_err(serde::de::Error::custom)
    }
}

/// When and how often a connection runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Run frequency
    pub frequency: ScheduleFrequency,

    /// First run, local time
    #[serde(with = "start_time_format")]
    pub start_time: NaiveDateTime,
}

impl Schedule {
    /// One-line description for listings
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{} starting {}",
            self.frequency,
            self.start_time.format("%Y-%m-%d %H:%M")
        )
    }
}

/// A finalized source → destination connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Identifier, immutable after creation
    pub id: ConnectionId,

    /// Display label
    pub name: String,

    /// Data source
    pub source: Source,

    /// Data destination
    pub destination: Destination,

    /// Run schedule
    pub schedule: Schedule,

    /// Last known status
    #[serde(default)]
    pub status: ConnectionStatus,

    /// Backend reachable for this connection
    #[serde(default)]
    pub base_url: String,

    /// Key for `base_url`
    #[serde(default)]
    pub api_key: Secret,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn sample() -> Connection {
        Connection {
            id: ConnectionId::from("1"),
            name: "Daily Ads Sync".to_string(),
            source: Source::BigQuery(BigQueryConfig {
                project_id: "p1".to_string(),
                dataset_id: "d1".to_string(),
                table_id: "t1".to_string(),
                credentials: Secret::from("{}"),
            }),
            destination: Destination::GoogleAds(GoogleAdsConfig {
                customer_id: "123".to_string(),
                ..GoogleAdsConfig::default()
            }),
            schedule: Schedule {
                frequency: ScheduleFrequency::Daily,
                start_time: parse_start_time("2024-01-01T00:00:00").unwrap(),
            },
            status: ConnectionStatus::Disconnected,
            base_url: String::new(),
            api_key: Secret::default(),
        }
    }

    #[test]
    fn test_connection_wire_shape() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["source"]["type"], json!("bigquery"));
        assert_eq!(value["source"]["config"]["projectId"], json!("p1"));
        assert_eq!(value["destination"]["type"], json!("google_ads"));
        assert_eq!(value["destination"]["config"]["customerId"], json!("123"));
        assert_eq!(value["schedule"]["frequency"], json!("daily"));
        assert_eq!(value["schedule"]["startTime"], json!("2024-01-01T00:00:00"));
        assert_eq!(value["status"], json!("disconnected"));
        assert!(value.get("baseUrl").is_some());
    }

    #[test]
    fn test_meta_destination_deserializes() {
        let destination: Destination = serde_json::from_value(json!({
            "type": "meta_marketing",
            "config": {
                "accessToken": "tok",
                "adAccountId": "act_1",
                "appId": "",
                "appSecret": ""
            }
        }))
        .unwrap();

        match destination {
            Destination::MetaMarketing(config) => {
                assert_eq!(config.access_token.expose(), "tok");
                assert_eq!(config.ad_account_id, "act_1");
            }
            Destination::GoogleAds(_) => panic!("Expected Meta Marketing destination"),
        }
    }

    #[test]
    fn test_empty_destination_matches_kind() {
        for kind in [DestinationKind::GoogleAds, DestinationKind::MetaMarketing] {
            assert_eq!(Destination::empty(kind).kind(), kind);
        }
        assert_eq!(Destination::default().kind(), DestinationKind::GoogleAds);
    }

    #[test]
    fn test_missing_fields_per_variant() {
        assert_eq!(
            Destination::empty(DestinationKind::GoogleAds).missing_fields().len(),
            1
        );
        assert_eq!(
            Destination::empty(DestinationKind::MetaMarketing).missing_fields().len(),
            1
        );
        assert!(sample().destination.missing_fields().is_empty());
        assert_eq!(missing_fields(&BigQueryConfig::default()).len(), 4);
    }

    #[rstest]
    #[case("2024-01-01T00:00", "2024-01-01T00:00:00")]
    #[case("2024-01-01T00:00:00", "2024-01-01T00:00:00")]
    #[case(" 2024-06-30T13:45:10.250 ", "2024-06-30T13:45:10")]
    fn test_parse_start_time_forms(#[case] input: &str, #[case] expected: &str) {
        let parsed = parse_start_time(input).unwrap();
        assert_eq!(parsed.format("%Y-%m-%dT%H:%M:%S").to_string(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("tomorrow")]
    #[case("2024-13-01T00:00")]
    fn test_parse_start_time_rejects(#[case] input: &str) {
        assert!(matches!(
            parse_start_time(input),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_descriptions() {
        let connection = sample();
        assert_eq!(connection.source.describe(), "BigQuery - d1.t1");
        assert_eq!(connection.schedule.describe(), "daily starting 2024-01-01 00:00");
        assert_eq!(connection.destination.kind().to_string(), "google_ads");
        assert_eq!(DestinationKind::MetaMarketing.label(), "Meta Marketing");
    }

    #[test]
    fn test_frequency_and_kind_parsing() {
        assert_eq!("Weekly".parse::<ScheduleFrequency>().unwrap(), ScheduleFrequency::Weekly);
        assert!("monthly".parse::<ScheduleFrequency>().is_err());
        assert_eq!(
            "meta_marketing".parse::<DestinationKind>().unwrap(),
            DestinationKind::MetaMarketing
        );
        assert!("tiktok".parse::<DestinationKind>().is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_browser_start_time_parses_to_same_minute(
            day in 0i64..20_000,
            minute in 0i64..1440,
        ) {
            let expected = chrono::NaiveDate::from_ymd_opt(1990, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::days(day)
                + chrono::Duration::minutes(minute);
            let text = expected.format("%Y-%m-%dT%H:%M").to_string();
            proptest::prop_assert_eq!(parse_start_time(&text).unwrap(), expected);
        }

        #[test]
        fn prop_start_time_rejects_without_panicking(text in "\\PC{0,32}") {
            if let Err(e) = parse_start_time(&text) {
                proptest::prop_assert!(matches!(e, Error::InvalidValue { .. }), "unexpected error: {:?}", e);
            }
        }
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert!(!a.as_str().is_empty());
        assert_ne!(a, b);
    }
}
