//! FHIR-facing models consumed from and returned to the surrounding server

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A FHIR resource with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Resource ID
    pub id: String,

    /// Resource type (e.g., "CodeSystem")
    pub resource_type: String,

    /// Version ID (starts at 1)
    pub version_id: i32,

    /// Full resource JSON
    pub resource: JsonValue,

    /// Last updated timestamp
    pub last_updated: DateTime<Utc>,

    /// Is this resource deleted?
    pub deleted: bool,
}

impl Resource {
    /// Wrap resource JSON as the current, first version
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>, resource: JsonValue) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            version_id: 1,
            resource,
            last_updated: Utc::now(),
            deleted: false,
        }
    }

    /// Top-level string element, e.g. `url` or `content`
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.resource.get(name).and_then(|v| v.as_str())
    }
}

/// Whether a `CodeSystem.concept` element is flagged `notSelectable` or `abstract`
pub fn concept_is_abstract(concept: &JsonValue) -> bool {
    concept
        .get("property")
        .and_then(|v| v.as_array())
        .is_some_and(|properties| {
            properties.iter().any(|p| {
                matches!(
                    p.get("code").and_then(|c| c.as_str()),
                    Some("notSelectable" | "abstract")
                ) && p.get("valueBoolean").and_then(|v| v.as_bool()) == Some(true)
            })
        })
}

/// FHIR Coding (system + code)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: Some(code.into()),
            ..Default::default()
        }
    }
}

/// Entry of `ValueSet.expansion.contains`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionContains {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub is_abstract: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// Outcome of a `$lookup`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    pub found: bool,
    pub searched_for_code: String,
    pub searched_for_system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_abstract: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_system_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_system_display_name: Option<String>,
}

impl LookupResult {
    pub fn not_found(code: &str, system: &str) -> Self {
        Self {
            found: false,
            searched_for_code: code.to_string(),
            searched_for_system: system.to_string(),
            display: None,
            is_abstract: None,
            code_system_version: None,
            code_system_display_name: None,
        }
    }

    pub fn found(code: &str, system: &str) -> Self {
        Self {
            found: true,
            ..Self::not_found(code, system)
        }
    }
}
