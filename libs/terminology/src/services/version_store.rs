//! Committing new code system versions
//!
//! A commit binds (or rebinds) a canonical URI to its owning CodeSystem
//! resource, validates the draft graph, stores every concept and link once,
//! and moves the code system's current-version pointer. All of it happens in
//! one transaction, so readers see either the previous version or the new one.

use crate::{
    db::{TerminologyStore, TerminologyTransaction},
    models::{CodeSystemRecord, CodeSystemVersion, ConceptId},
    services::validation::validate_concepts_for_storage,
    Error, Result,
};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
struct CommitStats {
    version_pid: i64,
    concepts: usize,
    links: usize,
}

#[derive(Clone)]
pub struct VersionStore<S: TerminologyStore> {
    store: S,
}

impl<S: TerminologyStore> VersionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Store `version` as the new current version of the code system at `system_uri`.
    ///
    /// Returns the committed version with its persistent id set. On any error
    /// nothing is written.
    #[tracing::instrument(
        skip(self, version),
        fields(concepts = version.concepts().len(), links = version.links().len())
    )]
    pub async fn commit(
        &self,
        owner_resource_id: &str,
        system_uri: &str,
        mut version: CodeSystemVersion,
    ) -> Result<CodeSystemVersion> {
        let started = Instant::now();

        let owner = version
            .owner()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidRequest("No resource supplied".to_string()))?;
        if system_uri.trim().is_empty() {
            return Err(Error::InvalidRequest("No system URI supplied".to_string()));
        }
        if owner != owner_resource_id {
            return Err(Error::InvalidRequest(format!(
                "Code system version belongs to resource {owner}, not {owner_resource_id}"
            )));
        }

        tracing::info!("Storing code system");

        let mut tx = self.store.begin_transaction().await?;
        let stats = match write_version(&mut tx, system_uri, &owner, &version).await {
            Ok(stats) => stats,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Failed to roll back code system commit: {}", rollback_err);
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        version.set_pid(stats.version_pid);

        tracing::info!(
            "Stored code system version {} for {} with {} concepts and {} links in {}ms",
            stats.version_pid,
            system_uri,
            stats.concepts,
            stats.links,
            started.elapsed().as_millis()
        );

        Ok(version)
    }
}

async fn write_version<T: TerminologyTransaction>(
    tx: &mut T,
    system_uri: &str,
    owner: &str,
    version: &CodeSystemVersion,
) -> Result<CommitStats> {
    tx.acquire_commit_lock(system_uri, owner).await?;

    let code_system = bind_code_system(tx, system_uri, owner).await?;

    validate_concepts_for_storage(version)?;

    let version_pid = tx
        .insert_version(code_system.pid, owner, version.resource_version_id())
        .await?;
    tx.set_current_version(code_system.pid, version_pid).await?;

    let (concepts, links) = persist_concepts(tx, version_pid, version).await?;

    Ok(CommitStats {
        version_pid,
        concepts,
        links,
    })
}

/// Find the code system row for `uri`, claiming or creating it for `owner`
async fn bind_code_system<T: TerminologyTransaction>(
    tx: &mut T,
    uri: &str,
    owner: &str,
) -> Result<CodeSystemRecord> {
    if let Some(existing) = tx.find_code_system_by_uri(uri).await? {
        if existing.resource_id != owner {
            return Err(Error::DuplicateUri {
                uri: uri.to_string(),
                existing_resource_id: existing.resource_id,
            });
        }
        return Ok(existing);
    }

    match tx.find_code_system_by_resource(owner).await? {
        Some(existing) => {
            tracing::debug!(
                "Rebinding code system {} from {} to {}",
                existing.pid,
                existing.uri,
                uri
            );
            tx.rebind_code_system(existing.pid, uri).await?;
            Ok(CodeSystemRecord {
                uri: uri.to_string(),
                ..existing
            })
        }
        None => tx.insert_code_system(uri, owner).await,
    }
}

/// Write every concept reachable from the roots, children before parents.
///
/// A concept shared by several parents is written once; each distinct
/// parent/child link is written once, after both ends exist.
async fn persist_concepts<T: TerminologyTransaction>(
    tx: &mut T,
    version_pid: i64,
    version: &CodeSystemVersion,
) -> Result<(usize, usize)> {
    let children = version.child_index();
    let mut scheduled: HashSet<ConceptId> = HashSet::new();
    let mut persisted: HashMap<ConceptId, i64> = HashMap::new();
    let mut written_links: HashSet<(ConceptId, ConceptId)> = HashSet::new();

    for &root in version.roots() {
        if !scheduled.insert(root) {
            continue;
        }

        let mut stack: Vec<(ConceptId, usize)> = vec![(root, 0)];
        while let Some((id, next)) = stack.last().copied() {
            if let Some(&child) = children[id.index()].get(next) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                if scheduled.insert(child) {
                    stack.push((child, 0));
                }
                continue;
            }

            stack.pop();

            let concept = version
                .concept(id)
                .ok_or_else(|| Error::Internal(format!("Concept {} vanished", id.index())))?;
            let pid = tx.insert_concept(version_pid, concept).await?;
            persisted.insert(id, pid);

            for &child in &children[id.index()] {
                if !written_links.insert((id, child)) {
                    continue;
                }
                let child_pid = persisted.get(&child).copied().ok_or_else(|| {
                    Error::Internal(format!(
                        "Concept {} was not stored before its parent {}",
                        child.index(),
                        concept.code
                    ))
                })?;
                tx.insert_link(version_pid, pid, child_pid).await?;
            }
        }
    }

    Ok((persisted.len(), written_links.len()))
}
