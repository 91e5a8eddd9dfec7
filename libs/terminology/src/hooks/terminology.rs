//! Terminology resource hook
//!
//! Stores the concept hierarchy of every complete CodeSystem resource as a new
//! code system version, owned by the resource and keyed by its revision.

use crate::{
    db::TerminologyStore,
    hooks::ResourceHook,
    models::{concept_is_abstract, CodeSystemVersion, ConceptId, ParentChildLink, Resource},
    services::VersionStore,
    Error, Result,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

pub struct TerminologyHook<S: TerminologyStore> {
    versions: VersionStore<S>,
}

impl<S: TerminologyStore> TerminologyHook<S> {
    pub fn new(versions: VersionStore<S>) -> Self {
        Self { versions }
    }

    async fn store_codesystem(&self, resource: &Resource) -> Result<()> {
        let Some(url) = resource.str_field("url").filter(|u| !u.trim().is_empty()) else {
            tracing::debug!("CodeSystem {} has no url, not storing concepts", resource.id);
            return Ok(());
        };
        if resource.str_field("content") != Some("complete") {
            tracing::debug!(
                "CodeSystem {} is not complete, not storing concepts",
                resource.id
            );
            return Ok(());
        }

        tracing::info!(
            "CodeSystem {} has a status of complete, storing concepts in terminology tables",
            resource.id
        );

        let version = code_system_version_from_resource(resource)?;
        self.versions.commit(&resource.id, url, version).await?;
        Ok(())
    }
}

/// Build a draft version from the nested `concept` tree of a CodeSystem resource
pub fn code_system_version_from_resource(resource: &Resource) -> Result<CodeSystemVersion> {
    let mut version = CodeSystemVersion::for_resource(&resource.id, resource.version_id);
    let mut declared_parents: Vec<(ConceptId, String)> = Vec::new();

    let Some(top_level) = resource.resource.get("concept").and_then(|v| v.as_array()) else {
        return Ok(version);
    };

    // Pre-order walk, so the arena follows document order.
    let mut stack: Vec<(Option<ConceptId>, std::slice::Iter<'_, JsonValue>)> =
        vec![(None, top_level.iter())];
    while let Some((parent, siblings)) = stack.last_mut() {
        let parent = *parent;
        let Some(concept) = siblings.next() else {
            stack.pop();
            continue;
        };

        let Some(code) = concept
            .get("code")
            .and_then(|v| v.as_str())
            .filter(|c| !c.trim().is_empty())
        else {
            continue;
        };

        let display = concept.get("display").and_then(|v| v.as_str());
        let id = version.add_concept(code, display);
        version.set_abstract(id, concept_is_abstract(concept));
        match parent {
            Some(parent) => version.add_link(parent, id),
            None => version.push_root(id),
        }

        declared_parents.extend(
            parent_properties(concept).map(|parent_code| (id, parent_code.to_string())),
        );

        if let Some(children) = concept.get("concept").and_then(|v| v.as_array()) {
            stack.push((Some(id), children.iter()));
        }
    }

    for (child, parent_code) in declared_parents {
        let parent = version.find_by_code(&parent_code).ok_or_else(|| {
            let code = version
                .concept(child)
                .map(|c| c.code.as_str())
                .unwrap_or_default();
            Error::MalformedConcept(format!(
                "Concept {code} declares unknown parent {parent_code}"
            ))
        })?;
        let link = ParentChildLink { parent, child };
        if !version.links().contains(&link) {
            version.add_link(parent, child);
        }
    }

    Ok(version)
}

fn parent_properties(concept: &JsonValue) -> impl Iterator<Item = &str> {
    concept
        .get("property")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter(|p| p.get("code").and_then(|c| c.as_str()) == Some("parent"))
        .filter_map(|p| p.get("valueCode").and_then(|v| v.as_str()))
}

#[async_trait]
impl<S: TerminologyStore> ResourceHook for TerminologyHook<S> {
    async fn on_created(&self, resource: &Resource) -> Result<()> {
        self.on_updated(resource).await
    }

    async fn on_updated(&self, resource: &Resource) -> Result<()> {
        if resource.resource_type == "CodeSystem" {
            self.store_codesystem(resource)
                .await
                .inspect_err(Error::log)?;
        }
        Ok(())
    }

    async fn on_deleted(&self, _resource_type: &str, _id: &str, _version: i32) -> Result<()> {
        // Committed versions are immutable and stay queryable by revision.
        Ok(())
    }
}
