use crate::{
    db::{ResourceStore, TerminologyStore},
    models::{CodeSystemVersion, Coding, LookupResult, StoredConcept},
    services::{
        closure::ClosureQueries,
        lookup::{CodeSystemCatalog, LookupService},
        version_store::VersionStore,
    },
    Error, Result,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Entry point for the operations the surrounding server exposes
#[derive(Clone)]
pub struct TerminologyService<S: TerminologyStore> {
    store: S,
    versions: VersionStore<S>,
    closure: ClosureQueries<S>,
    lookup: LookupService,
}

impl<S: TerminologyStore> TerminologyService<S> {
    pub fn new(
        store: S,
        resources: Arc<dyn ResourceStore>,
        catalog: Arc<dyn CodeSystemCatalog>,
    ) -> Self {
        Self {
            versions: VersionStore::new(store.clone()),
            closure: ClosureQueries::new(store.clone()),
            lookup: LookupService::new(resources, catalog),
            store,
        }
    }

    pub fn versions(&self) -> &VersionStore<S> {
        &self.versions
    }

    pub async fn store_new_code_system_version(
        &self,
        owner_resource_id: &str,
        system_uri: &str,
        version: CodeSystemVersion,
    ) -> Result<CodeSystemVersion> {
        self.versions
            .commit(owner_resource_id, system_uri, version)
            .await
            .inspect_err(Error::log)
    }

    pub async fn find_codes_above(
        &self,
        resource_id: &str,
        resource_version_id: i32,
        code: &str,
    ) -> Result<HashSet<StoredConcept>> {
        self.closure
            .find_codes_above(resource_id, resource_version_id, code)
            .await
            .inspect_err(Error::log)
    }

    pub async fn find_codes_below(
        &self,
        resource_id: &str,
        resource_version_id: i32,
        code: &str,
    ) -> Result<HashSet<StoredConcept>> {
        self.closure
            .find_codes_below(resource_id, resource_version_id, code)
            .await
            .inspect_err(Error::log)
    }

    pub async fn find_codes_above_in_system(
        &self,
        system: &str,
        code: &str,
    ) -> Result<HashSet<StoredConcept>> {
        self.closure
            .find_codes_above_in_system(system, code)
            .await
            .inspect_err(Error::log)
    }

    pub async fn find_codes_below_in_system(
        &self,
        system: &str,
        code: &str,
    ) -> Result<HashSet<StoredConcept>> {
        self.closure
            .find_codes_below_in_system(system, code)
            .await
            .inspect_err(Error::log)
    }

    pub async fn lookup_code(
        &self,
        code: Option<&str>,
        system: Option<&str>,
        coding: Option<&Coding>,
    ) -> Result<LookupResult> {
        self.lookup
            .lookup_code(code, system, coding)
            .await
            .inspect_err(Error::log)
    }

    /// Whether a code system has been stored for `system`
    pub async fn supports_system(&self, system: &str) -> Result<bool> {
        Ok(self.store.find_code_system_by_uri(system).await?.is_some())
    }
}
