//! In-memory storage backends
//!
//! Used for tests and for embedding the engine without a database. Writers are
//! serialized through an async mutex; each transaction works on a staged copy
//! of the state that is published in one step on commit.
//!
//! Staging copies the whole terminology state, so a commit costs time and
//! memory proportional to everything stored so far. Fine for tests and small
//! embedded code systems; large terminologies belong in the Postgres store.

use super::traits::{ResourceStore, TerminologyStore, TerminologyTransaction};
use crate::{
    models::{CodeSystemRecord, Concept, Resource, StoredConcept, StoredLink, VersionRecord},
    Error, Result,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct TerminologyState {
    next_pid: i64,
    code_systems: BTreeMap<i64, CodeSystemRecord>,
    versions: BTreeMap<i64, VersionRecord>,
    concepts: BTreeMap<i64, StoredConcept>,
    // (parent, child) -> version
    links: BTreeMap<(i64, i64), i64>,
    // (child, parent)
    parents: BTreeSet<(i64, i64)>,
}

impl TerminologyState {
    fn allocate_pid(&mut self) -> i64 {
        self.next_pid += 1;
        self.next_pid
    }

    fn code_system_by_uri(&self, uri: &str) -> Option<CodeSystemRecord> {
        self.code_systems.values().find(|cs| cs.uri == uri).cloned()
    }

    fn concepts_by_pid(&self, pids: impl Iterator<Item = i64>) -> Vec<StoredConcept> {
        let pids: BTreeSet<i64> = pids.collect();
        pids.into_iter()
            .filter_map(|pid| self.concepts.get(&pid).cloned())
            .collect()
    }
}

fn poisoned() -> Error {
    Error::Internal("In-memory terminology state is poisoned".to_string())
}

/// Terminology store kept entirely in process memory
#[derive(Clone, Default)]
pub struct InMemoryTerminologyStore {
    state: Arc<RwLock<TerminologyState>>,
    writer: Arc<Mutex<()>>,
}

impl InMemoryTerminologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, TerminologyState>> {
        self.state.read().map_err(|_| poisoned())
    }
}

#[async_trait]
impl TerminologyStore for InMemoryTerminologyStore {
    type Transaction = InMemoryTerminologyTransaction;

    async fn begin_transaction(&self) -> Result<Self::Transaction> {
        let guard = self.writer.clone().lock_owned().await;
        let staged = self.read()?.clone();
        Ok(InMemoryTerminologyTransaction {
            state: self.state.clone(),
            staged: Some(staged),
            _writer: guard,
        })
    }

    async fn find_code_system_by_uri(&self, uri: &str) -> Result<Option<CodeSystemRecord>> {
        Ok(self.read()?.code_system_by_uri(uri))
    }

    async fn find_version(
        &self,
        resource_id: &str,
        resource_version_id: i32,
    ) -> Result<Option<VersionRecord>> {
        Ok(self
            .read()?
            .versions
            .values()
            .rev()
            .find(|v| v.resource_id == resource_id && v.resource_version_id == resource_version_id)
            .cloned())
    }

    async fn find_version_by_pid(&self, version_pid: i64) -> Result<Option<VersionRecord>> {
        Ok(self.read()?.versions.get(&version_pid).cloned())
    }

    async fn find_concept_by_code(
        &self,
        version_pid: i64,
        code: &str,
    ) -> Result<Option<StoredConcept>> {
        Ok(self
            .read()?
            .concepts
            .values()
            .find(|c| c.version_pid == version_pid && c.code == code)
            .cloned())
    }

    async fn find_parents(&self, concept_pid: i64) -> Result<Vec<StoredConcept>> {
        let state = self.read()?;
        let parents = state
            .parents
            .range((concept_pid, i64::MIN)..=(concept_pid, i64::MAX))
            .map(|(_, parent)| *parent);
        Ok(state.concepts_by_pid(parents))
    }

    async fn find_children(&self, concept_pid: i64) -> Result<Vec<StoredConcept>> {
        let state = self.read()?;
        let children = state
            .links
            .range((concept_pid, i64::MIN)..=(concept_pid, i64::MAX))
            .map(|((_, child), _)| *child);
        Ok(state.concepts_by_pid(children))
    }

    async fn list_concepts(&self, version_pid: i64) -> Result<Vec<StoredConcept>> {
        Ok(self
            .read()?
            .concepts
            .values()
            .filter(|c| c.version_pid == version_pid)
            .cloned()
            .collect())
    }

    async fn list_links(&self, version_pid: i64) -> Result<Vec<StoredLink>> {
        Ok(self
            .read()?
            .links
            .iter()
            .filter(|(_, version)| **version == version_pid)
            .map(|((parent_pid, child_pid), _)| StoredLink {
                parent_pid: *parent_pid,
                child_pid: *child_pid,
            })
            .collect())
    }
}

/// Staged writes of one in-memory commit
pub struct InMemoryTerminologyTransaction {
    state: Arc<RwLock<TerminologyState>>,
    staged: Option<TerminologyState>,
    _writer: OwnedMutexGuard<()>,
}

impl InMemoryTerminologyTransaction {
    fn staged_mut(&mut self) -> Result<&mut TerminologyState> {
        self.staged.as_mut().ok_or_else(|| {
            Error::Internal("Transaction already committed or rolled back".to_string())
        })
    }

    fn publish(&self) -> Result<RwLockWriteGuard<'_, TerminologyState>> {
        self.state.write().map_err(|_| poisoned())
    }
}

#[async_trait]
impl TerminologyTransaction for InMemoryTerminologyTransaction {
    async fn commit(mut self) -> Result<()> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| Error::Internal("Transaction already committed".to_string()))?;

        *self.publish()? = staged;
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.staged
            .take()
            .ok_or_else(|| Error::Internal("Transaction already rolled back".to_string()))?;
        Ok(())
    }

    async fn acquire_commit_lock(&mut self, _uri: &str, _resource_id: &str) -> Result<()> {
        // The writer mutex taken in begin_transaction already serializes commits.
        self.staged_mut()?;
        Ok(())
    }

    async fn find_code_system_by_uri(&mut self, uri: &str) -> Result<Option<CodeSystemRecord>> {
        Ok(self.staged_mut()?.code_system_by_uri(uri))
    }

    async fn find_code_system_by_resource(
        &mut self,
        resource_id: &str,
    ) -> Result<Option<CodeSystemRecord>> {
        Ok(self
            .staged_mut()?
            .code_systems
            .values()
            .find(|cs| cs.resource_id == resource_id)
            .cloned())
    }

    async fn insert_code_system(
        &mut self,
        uri: &str,
        resource_id: &str,
    ) -> Result<CodeSystemRecord> {
        let state = self.staged_mut()?;
        if state.code_system_by_uri(uri).is_some() {
            return Err(Error::Internal(format!(
                "Code system URI {uri} is already stored"
            )));
        }

        let record = CodeSystemRecord {
            pid: state.allocate_pid(),
            uri: uri.to_string(),
            resource_id: resource_id.to_string(),
            current_version: None,
        };
        state.code_systems.insert(record.pid, record.clone());
        Ok(record)
    }

    async fn rebind_code_system(&mut self, code_system_pid: i64, uri: &str) -> Result<()> {
        let state = self.staged_mut()?;
        let record = state.code_systems.get_mut(&code_system_pid).ok_or_else(|| {
            Error::Internal(format!("Unknown code system pid {code_system_pid}"))
        })?;
        record.uri = uri.to_string();
        Ok(())
    }

    async fn insert_version(
        &mut self,
        code_system_pid: i64,
        resource_id: &str,
        resource_version_id: i32,
    ) -> Result<i64> {
        let state = self.staged_mut()?;
        let pid = state.allocate_pid();
        state.versions.insert(
            pid,
            VersionRecord {
                pid,
                code_system_pid,
                resource_id: resource_id.to_string(),
                resource_version_id,
            },
        );
        Ok(pid)
    }

    async fn set_current_version(&mut self, code_system_pid: i64, version_pid: i64) -> Result<()> {
        let state = self.staged_mut()?;
        let record = state.code_systems.get_mut(&code_system_pid).ok_or_else(|| {
            Error::Internal(format!("Unknown code system pid {code_system_pid}"))
        })?;
        record.current_version = Some(version_pid);
        Ok(())
    }

    async fn insert_concept(&mut self, version_pid: i64, concept: &Concept) -> Result<i64> {
        let state = self.staged_mut()?;
        let pid = state.allocate_pid();
        state.concepts.insert(
            pid,
            StoredConcept {
                pid,
                version_pid,
                code: concept.code.clone(),
                display: concept.display.clone(),
                is_abstract: concept.is_abstract,
            },
        );
        Ok(pid)
    }

    async fn insert_link(
        &mut self,
        version_pid: i64,
        parent_pid: i64,
        child_pid: i64,
    ) -> Result<()> {
        let state = self.staged_mut()?;
        if state.links.contains_key(&(parent_pid, child_pid)) {
            return Err(Error::Internal(format!(
                "Link {parent_pid} -> {child_pid} is already stored"
            )));
        }
        state.links.insert((parent_pid, child_pid), version_pid);
        state.parents.insert((child_pid, parent_pid));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ResourceState {
    resources: HashMap<(String, String), Resource>,
    // (resource_type, param, system, code) -> ids
    tokens: HashMap<(String, String, String, String), HashSet<String>>,
}

/// Resource store kept in process memory.
///
/// Indexes the `code` token of CodeSystem resources: every top-level
/// `concept.code`, with the resource `url` as token system.
#[derive(Clone, Default)]
pub struct InMemoryResourceStore {
    state: Arc<RwLock<ResourceState>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn code_system_tokens(resource: &Resource) -> Vec<(String, String)> {
    if resource.resource_type != "CodeSystem" {
        return Vec::new();
    }
    let Some(url) = resource.str_field("url") else {
        return Vec::new();
    };
    let Some(concepts) = resource.resource.get("concept").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    concepts
        .iter()
        .filter_map(|c| c.get("code").and_then(|v| v.as_str()))
        .map(|code| (url.to_string(), code.to_string()))
        .collect()
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn save(&self, mut resource: Resource) -> Result<Resource> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let key = (resource.resource_type.clone(), resource.id.clone());

        if let Some(previous) = state.resources.get(&key) {
            resource.version_id = previous.version_id + 1;
        }

        state.tokens.retain(|(resource_type, ..), ids| {
            if *resource_type == resource.resource_type {
                ids.remove(&resource.id);
            }
            !ids.is_empty()
        });
        if !resource.deleted {
            for (system, code) in code_system_tokens(&resource) {
                state
                    .tokens
                    .entry((
                        resource.resource_type.clone(),
                        "code".to_string(),
                        system,
                        code,
                    ))
                    .or_default()
                    .insert(resource.id.clone());
            }
        }

        state.resources.insert(key, resource.clone());
        Ok(resource)
    }

    async fn read(&self, resource_type: &str, id: &str) -> Result<Option<Resource>> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .resources
            .get(&(resource_type.to_string(), id.to_string()))
            .filter(|r| !r.deleted)
            .cloned())
    }

    async fn find_ids_by_indexed_token(
        &self,
        resource_type: &str,
        param: &str,
        system: &str,
        code: &str,
    ) -> Result<Vec<String>> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let key = (
            resource_type.to_string(),
            param.to_string(),
            system.to_string(),
            code.to_string(),
        );
        let mut ids: Vec<String> = state
            .tokens
            .get(&key)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn rolled_back_writes_are_not_visible() {
        let store = InMemoryTerminologyStore::new();

        let mut tx = store.begin_transaction().await.unwrap();
        tx.insert_code_system("http://x/cs", "cs-1").await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store
            .find_code_system_by_uri("http://x/cs")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes_and_releases_writer() {
        let store = InMemoryTerminologyStore::new();

        {
            let mut tx = store.begin_transaction().await.unwrap();
            tx.insert_code_system("http://x/cs", "cs-1").await.unwrap();
        }

        let mut tx = store.begin_transaction().await.unwrap();
        assert!(tx
            .find_code_system_by_uri("http://x/cs")
            .await
            .unwrap()
            .is_none());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_links_are_rejected() {
        let store = InMemoryTerminologyStore::new();
        let mut tx = store.begin_transaction().await.unwrap();
        tx.insert_link(1, 10, 11).await.unwrap();

        let err = tx.insert_link(1, 10, 11).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn resource_store_indexes_top_level_codes_only() {
        let store = InMemoryResourceStore::new();
        let resource = Resource::new(
            "CodeSystem",
            "cs-1",
            json!({
                "resourceType": "CodeSystem",
                "url": "http://x/cs",
                "concept": [
                    { "code": "A", "concept": [{ "code": "B" }] }
                ]
            }),
        );
        store.save(resource).await.unwrap();

        let ids = store
            .find_ids_by_indexed_token("CodeSystem", "code", "http://x/cs", "A")
            .await
            .unwrap();
        assert_eq!(ids, vec!["cs-1".to_string()]);

        let nested = store
            .find_ids_by_indexed_token("CodeSystem", "code", "http://x/cs", "B")
            .await
            .unwrap();
        assert!(nested.is_empty());
    }

    #[tokio::test]
    async fn same_id_under_another_type_keeps_code_tokens() {
        let store = InMemoryResourceStore::new();
        store
            .save(Resource::new(
                "CodeSystem",
                "x",
                json!({ "url": "http://x/cs", "concept": [{ "code": "A" }] }),
            ))
            .await
            .unwrap();
        store
            .save(Resource::new("ValueSet", "x", json!({ "url": "http://x/vs" })))
            .await
            .unwrap();

        let ids = store
            .find_ids_by_indexed_token("CodeSystem", "code", "http://x/cs", "A")
            .await
            .unwrap();
        assert_eq!(ids, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn replaced_codes_leave_no_empty_index_entries() {
        let store = InMemoryResourceStore::new();
        store
            .save(Resource::new(
                "CodeSystem",
                "cs-1",
                json!({ "url": "http://x/cs", "concept": [{ "code": "A" }] }),
            ))
            .await
            .unwrap();
        store
            .save(Resource::new(
                "CodeSystem",
                "cs-1",
                json!({ "url": "http://x/cs", "concept": [{ "code": "B" }] }),
            ))
            .await
            .unwrap();

        let state = store.state.read().unwrap();
        let codes: Vec<&str> = state.tokens.keys().map(|(_, _, _, code)| code.as_str()).collect();
        assert_eq!(codes, vec!["B"]);
    }

    #[tokio::test]
    async fn saving_again_bumps_the_version() {
        let store = InMemoryResourceStore::new();
        let resource = Resource::new("CodeSystem", "cs-1", json!({ "url": "http://x/cs" }));
        store.save(resource.clone()).await.unwrap();
        let saved = store.save(resource).await.unwrap();

        assert_eq!(saved.version_id, 2);
    }
}
