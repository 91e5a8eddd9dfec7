//! `$lookup` of a single code
//!
//! Codes of built-in code systems are answered by the catalog's expansion;
//! everything else is looked up in stored CodeSystem resources through the
//! `code` token index.

use crate::{
    db::ResourceStore,
    models::{concept_is_abstract, Coding, ExpansionContains, LookupResult, Resource},
    Error, Result,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Code systems known to the server without a stored CodeSystem resource
#[async_trait]
pub trait CodeSystemCatalog: Send + Sync {
    fn is_known(&self, system: &str) -> bool;

    /// Expand a value set containing just `system|code`
    async fn expand_single_code(
        &self,
        system: &str,
        code: &str,
    ) -> anyhow::Result<Vec<ExpansionContains>>;
}

#[derive(Clone)]
pub struct LookupService {
    resources: Arc<dyn ResourceStore>,
    catalog: Arc<dyn CodeSystemCatalog>,
}

impl LookupService {
    pub fn new(resources: Arc<dyn ResourceStore>, catalog: Arc<dyn CodeSystemCatalog>) -> Self {
        Self { resources, catalog }
    }

    /// Look up a code given either as `system` + `code` or as a `coding`
    #[tracing::instrument(skip(self, coding))]
    pub async fn lookup_code(
        &self,
        code: Option<&str>,
        system: Option<&str>,
        coding: Option<&Coding>,
    ) -> Result<LookupResult> {
        let (system, code) = resolve_identification(code, system, coding)?;

        if self.catalog.is_known(&system) {
            let contains = self
                .catalog
                .expand_single_code(&system, &code)
                .await
                .map_err(|e| {
                    Error::Internal(format!(
                        "Failed to expand {system}|{code} from the built-in catalog: {e}"
                    ))
                })?;

            if let Some(result) = match_expansion(&contains, &system, &code) {
                return Ok(result);
            }
        } else {
            let ids = self
                .resources
                .find_ids_by_indexed_token("CodeSystem", "code", &system, &code)
                .await?;

            for id in ids {
                let Some(resource) = self.resources.read("CodeSystem", &id).await? else {
                    continue;
                };
                if let Some(result) = match_top_level_concept(&resource, &system, &code) {
                    return Ok(result);
                }
            }
        }

        tracing::debug!("Code {}|{} not found", system, code);
        Ok(LookupResult::not_found(&code, &system))
    }
}

/// Decide which of the two ways of naming a code was used
fn resolve_identification(
    code: Option<&str>,
    system: Option<&str>,
    coding: Option<&Coding>,
) -> Result<(String, String)> {
    let have_code = code.is_some_and(|c| !c.is_empty());
    let have_system = system.is_some_and(|s| !s.is_empty());
    let coding_pair = coding.and_then(|coding| {
        match (coding.system.as_deref(), coding.code.as_deref()) {
            (Some(s), Some(c)) if !s.trim().is_empty() && !c.trim().is_empty() => Some((s, c)),
            _ => None,
        }
    });
    let have_coding = coding_pair.is_some();

    if !have_coding && !(have_system && have_code) {
        return Err(Error::InvalidRequest(
            "No code, coding, or codeableConcept provided to validate".to_string(),
        ));
    }
    if have_coding == (have_system && have_code) || have_system != have_code {
        return Err(Error::InvalidRequest(
            "$lookup can only validate (system AND code) OR (coding.system AND coding.code)"
                .to_string(),
        ));
    }

    match (coding_pair, system, code) {
        (Some((s, c)), _, _) => Ok((s.to_string(), c.to_string())),
        (None, Some(s), Some(c)) => Ok((s.to_string(), c.to_string())),
        _ => Err(Error::Internal("Lookup identification resolved to nothing".to_string())),
    }
}

fn match_expansion(contains: &[ExpansionContains], system: &str, code: &str) -> Option<LookupResult> {
    contains
        .iter()
        .find(|c| c.system.as_deref() == Some(system) && c.code.as_deref() == Some(code))
        .map(|c| LookupResult {
            display: c.display.clone(),
            is_abstract: Some(c.is_abstract.unwrap_or(false)),
            code_system_version: c.version.clone(),
            ..LookupResult::found(code, system)
        })
}

// Only top-level concepts are searched, nested ones are not.
fn match_top_level_concept(resource: &Resource, system: &str, code: &str) -> Option<LookupResult> {
    let concepts = resource.resource.get("concept")?.as_array()?;
    let concept = concepts
        .iter()
        .find(|c| c.get("code").and_then(JsonValue::as_str) == Some(code))?;

    Some(LookupResult {
        display: concept
            .get("display")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        is_abstract: Some(concept_is_abstract(concept)),
        code_system_version: resource.str_field("version").map(str::to_string),
        code_system_display_name: resource
            .str_field("name")
            .or_else(|| resource.str_field("title"))
            .map(str::to_string),
        ..LookupResult::found(code, system)
    })
}
