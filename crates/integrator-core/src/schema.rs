//! Backend-provided configuration schemas and their display projection

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One configurable field of a source or destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Declared value type (`string`, `integer`, ...)
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Whether the field must be set
    #[serde(default)]
    pub required: bool,

    /// Free text help
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Field name → spec, in document order
pub type FieldTable = IndexMap<String, FieldSpec>;

/// A named entry of the raw document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    /// Field table; may be absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configs: Option<FieldTable>,
}

/// Raw `GET /schemas` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Source entries by name
    #[serde(default)]
    pub sources: Option<IndexMap<String, Option<SchemaEntry>>>,

    /// Destination entries by name
    #[serde(default)]
    pub destinations: Option<IndexMap<String, Option<SchemaEntry>>>,
}

/// A source or destination with its field table, ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDefinition {
    /// Entry name (`bigquery`, `google_ads`, ...)
    pub name: String,

    /// Field table, empty when the document had none
    pub configs: FieldTable,
}

/// A rendered row of a field table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRow {
    /// Field name
    pub name: String,
    /// Declared type
    pub kind: String,
    /// Required flag
    pub required: bool,
    /// Description, or `-`
    pub description: String,
}

impl SchemaDefinition {
    /// Rows in document order
    #[must_use]
    pub fn rows(&self) -> Vec<FieldRow> {
        self.configs
            .iter()
            .map(|(name, spec)| FieldRow {
                name: name.clone(),
                kind: spec.kind.clone(),
                required: spec.required,
                description: spec
                    .description
                    .clone()
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| "-".to_string()),
            })
            .collect()
    }
}

/// Sources and destinations reshaped for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedSchemas {
    /// Source definitions in document order
    pub sources: Vec<SchemaDefinition>,
    /// Destination definitions in document order
    pub destinations: Vec<SchemaDefinition>,
}

impl ParsedSchemas {
    /// Reshape a raw document. Missing sections or field tables become empty.
    #[must_use]
    pub fn from_document(document: SchemaDocument) -> Self {
        Self {
            sources: flatten(document.sources),
            destinations: flatten(document.destinations),
        }
    }
}

impl From<SchemaDocument> for ParsedSchemas {
    fn from(document: SchemaDocument) -> Self {
        Self::from_document(document)
    }
}

fn flatten(section: Option<IndexMap<String, Option<SchemaEntry>>>) -> Vec<SchemaDefinition> {
    section
        .unwrap_or_default()
        .into_iter()
        .map(|(name, entry)| SchemaDefinition {
            name,
            configs: entry.and_then(|e| e.configs).unwrap_or_default(),
        })
        .collect()
}
