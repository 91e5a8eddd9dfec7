//! Transitive ancestor/descendant queries over committed versions

use crate::{db::TerminologyStore, models::StoredConcept, Result};
use std::collections::HashSet;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Above,
    Below,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }
}

#[derive(Clone)]
pub struct ClosureQueries<S: TerminologyStore> {
    store: S,
}

impl<S: TerminologyStore> ClosureQueries<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The concept with `code` and every concept reachable through parent links
    pub async fn ancestors_of(&self, version_pid: i64, code: &str) -> Result<HashSet<StoredConcept>> {
        self.traverse(version_pid, code, Direction::Above).await
    }

    /// The concept with `code` and every concept reachable through child links
    pub async fn descendants_of(
        &self,
        version_pid: i64,
        code: &str,
    ) -> Result<HashSet<StoredConcept>> {
        self.traverse(version_pid, code, Direction::Below).await
    }

    /// Ancestors in the version committed for a revision of the owning resource
    #[tracing::instrument(skip(self))]
    pub async fn find_codes_above(
        &self,
        resource_id: &str,
        resource_version_id: i32,
        code: &str,
    ) -> Result<HashSet<StoredConcept>> {
        match self.store.find_version(resource_id, resource_version_id).await? {
            Some(version) => self.ancestors_of(version.pid, code).await,
            None => Ok(HashSet::new()),
        }
    }

    /// Descendants in the version committed for a revision of the owning resource
    #[tracing::instrument(skip(self))]
    pub async fn find_codes_below(
        &self,
        resource_id: &str,
        resource_version_id: i32,
        code: &str,
    ) -> Result<HashSet<StoredConcept>> {
        match self.store.find_version(resource_id, resource_version_id).await? {
            Some(version) => self.descendants_of(version.pid, code).await,
            None => Ok(HashSet::new()),
        }
    }

    /// Ancestors in the current version of the code system at `system`
    #[tracing::instrument(skip(self))]
    pub async fn find_codes_above_in_system(
        &self,
        system: &str,
        code: &str,
    ) -> Result<HashSet<StoredConcept>> {
        match self.current_version(system).await? {
            Some(version_pid) => self.ancestors_of(version_pid, code).await,
            None => Ok(HashSet::new()),
        }
    }

    /// Descendants in the current version of the code system at `system`
    #[tracing::instrument(skip(self))]
    pub async fn find_codes_below_in_system(
        &self,
        system: &str,
        code: &str,
    ) -> Result<HashSet<StoredConcept>> {
        match self.current_version(system).await? {
            Some(version_pid) => self.descendants_of(version_pid, code).await,
            None => Ok(HashSet::new()),
        }
    }

    async fn current_version(&self, system: &str) -> Result<Option<i64>> {
        Ok(self
            .store
            .find_code_system_by_uri(system)
            .await?
            .and_then(|cs| cs.current_version))
    }

    async fn traverse(
        &self,
        version_pid: i64,
        code: &str,
        direction: Direction,
    ) -> Result<HashSet<StoredConcept>> {
        let started = Instant::now();

        let Some(seed) = self.store.find_concept_by_code(version_pid, code).await? else {
            tracing::debug!("Code {} not found in version {}", code, version_pid);
            return Ok(HashSet::new());
        };

        let mut visited: HashSet<i64> = HashSet::from([seed.pid]);
        let mut work_list = vec![seed.pid];
        let mut result = HashSet::from([seed]);

        while let Some(pid) = work_list.pop() {
            let next = match direction {
                Direction::Above => self.store.find_parents(pid).await?,
                Direction::Below => self.store.find_children(pid).await?,
            };
            for concept in next {
                if visited.insert(concept.pid) {
                    work_list.push(concept.pid);
                    result.insert(concept);
                }
            }
        }

        tracing::info!(
            "Fetched {} codes {} code {} in {}ms",
            result.len(),
            direction.as_str(),
            code,
            started.elapsed().as_millis()
        );

        Ok(result)
    }
}
