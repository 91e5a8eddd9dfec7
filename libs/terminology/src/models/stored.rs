//! Rows of the persisted terminology tables

use serde::{Deserialize, Serialize};

/// Row from term_code_systems
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSystemRecord {
    pub pid: i64,
    pub uri: String,
    pub resource_id: String,
    pub current_version: Option<i64>,
}

/// Row from term_code_system_versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub pid: i64,
    pub code_system_pid: i64,
    pub resource_id: String,
    pub resource_version_id: i32,
}

/// Row from term_concepts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredConcept {
    pub pid: i64,
    pub version_pid: i64,
    pub code: String,
    pub display: Option<String>,
    pub is_abstract: bool,
}

/// Row from term_concept_links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredLink {
    pub parent_pid: i64,
    pub child_pid: i64,
}
