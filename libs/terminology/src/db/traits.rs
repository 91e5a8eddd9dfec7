//! Storage traits for the terminology tables and the resource store they sit next to

use crate::{
    models::{CodeSystemRecord, Concept, Resource, StoredConcept, StoredLink, VersionRecord},
    Result,
};
use async_trait::async_trait;

/// Read access to committed code system versions, plus the entry point for writes.
///
/// Reads only ever observe committed state: a version is either fully
/// visible or not visible at all.
#[async_trait]
pub trait TerminologyStore: Send + Sync + Clone {
    type Transaction: TerminologyTransaction;

    /// Begin a write transaction
    async fn begin_transaction(&self) -> Result<Self::Transaction>;

    /// Code system row bound to a canonical URI
    async fn find_code_system_by_uri(&self, uri: &str) -> Result<Option<CodeSystemRecord>>;

    /// Version committed for a revision of the owning resource.
    ///
    /// When the same revision was committed more than once the latest wins.
    async fn find_version(
        &self,
        resource_id: &str,
        resource_version_id: i32,
    ) -> Result<Option<VersionRecord>>;

    async fn find_version_by_pid(&self, version_pid: i64) -> Result<Option<VersionRecord>>;

    /// Concept with exactly this code in a version (lowest pid when the code repeats)
    async fn find_concept_by_code(
        &self,
        version_pid: i64,
        code: &str,
    ) -> Result<Option<StoredConcept>>;

    /// Direct parents of a concept
    async fn find_parents(&self, concept_pid: i64) -> Result<Vec<StoredConcept>>;

    /// Direct children of a concept
    async fn find_children(&self, concept_pid: i64) -> Result<Vec<StoredConcept>>;

    /// All concepts of a version, ordered by pid
    async fn list_concepts(&self, version_pid: i64) -> Result<Vec<StoredConcept>>;

    /// All links of a version
    async fn list_links(&self, version_pid: i64) -> Result<Vec<StoredLink>>;
}

/// Write side of a version commit.
///
/// Everything done through one transaction becomes visible on `commit` and
/// is discarded on `rollback` (or when the transaction is dropped).
#[async_trait]
pub trait TerminologyTransaction: Send {
    /// Commit the transaction
    async fn commit(self) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self) -> Result<()>;

    /// Serialize against other commits touching the same URI or owning resource
    async fn acquire_commit_lock(&mut self, uri: &str, resource_id: &str) -> Result<()>;

    async fn find_code_system_by_uri(&mut self, uri: &str) -> Result<Option<CodeSystemRecord>>;

    async fn find_code_system_by_resource(
        &mut self,
        resource_id: &str,
    ) -> Result<Option<CodeSystemRecord>>;

    /// Insert a code system row without a current version
    async fn insert_code_system(&mut self, uri: &str, resource_id: &str)
        -> Result<CodeSystemRecord>;

    /// Point an existing code system row at a (new) URI
    async fn rebind_code_system(&mut self, code_system_pid: i64, uri: &str) -> Result<()>;

    /// Insert a version row and return its pid
    async fn insert_version(
        &mut self,
        code_system_pid: i64,
        resource_id: &str,
        resource_version_id: i32,
    ) -> Result<i64>;

    async fn set_current_version(&mut self, code_system_pid: i64, version_pid: i64) -> Result<()>;

    /// Insert a concept row and return its pid
    async fn insert_concept(&mut self, version_pid: i64, concept: &Concept) -> Result<i64>;

    async fn insert_link(&mut self, version_pid: i64, parent_pid: i64, child_pid: i64)
        -> Result<()>;
}

/// Generic resource storage, owned by the surrounding server.
///
/// Only the operations the terminology engine consumes are part of this trait.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Store a resource as its current version
    async fn save(&self, resource: Resource) -> Result<Resource>;

    /// Read the current version of a resource
    ///
    /// # Returns
    /// * `Ok(Some(resource))` - Resource found and not deleted
    /// * `Ok(None)` - Resource not found or deleted
    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Resource>>;

    /// Ids of resources whose token search parameter `param` matches `system|code`
    async fn find_ids_by_indexed_token(
        &self,
        resource_type: &str,
        param: &str,
        system: &str,
        code: &str,
    ) -> Result<Vec<String>>;
}
