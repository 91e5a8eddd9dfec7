use async_trait::async_trait;
use ferrum_terminology::{
    models::{CodeSystemVersion, ExpansionContains, StoredConcept},
    services::CodeSystemCatalog,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const CS_URL: &str = "http://x/cs";
pub const LOINC: &str = "http://loinc.org";

/// Built-in catalog backed by a fixed list of codes
#[derive(Default)]
pub struct FakeCatalog {
    systems: HashMap<String, Vec<ExpansionContains>>,
    failing: bool,
    pub expansions: AtomicUsize,
}

impl FakeCatalog {
    pub fn with_code(mut self, system: &str, code: &str, display: &str) -> Self {
        self.systems
            .entry(system.to_string())
            .or_default()
            .push(ExpansionContains {
                system: Some(system.to_string()),
                code: Some(code.to_string()),
                display: Some(display.to_string()),
                version: Some("2.76".to_string()),
                is_abstract: None,
            });
        self
    }

    /// Every expansion fails
    pub fn failing(mut self, system: &str) -> Self {
        self.systems.entry(system.to_string()).or_default();
        self.failing = true;
        self
    }
}

#[async_trait]
impl CodeSystemCatalog for FakeCatalog {
    fn is_known(&self, system: &str) -> bool {
        self.systems.contains_key(system)
    }

    async fn expand_single_code(
        &self,
        system: &str,
        code: &str,
    ) -> anyhow::Result<Vec<ExpansionContains>> {
        self.expansions.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            anyhow::bail!("terminology server unavailable");
        }
        Ok(self
            .systems
            .get(system)
            .map(|contains| {
                contains
                    .iter()
                    .filter(|c| c.code.as_deref() == Some(code))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// `A -> B`
pub fn a_to_b(owner: &str) -> CodeSystemVersion {
    let mut version = CodeSystemVersion::for_resource(owner, 1);
    let a = version.add_root("A", Some("Alpha"));
    version.add_child_concept(a, "B", Some("Beta"));
    version
}

/// `TOP -> L -> BOTTOM` and `TOP -> R -> BOTTOM`
pub fn diamond(owner: &str) -> CodeSystemVersion {
    let mut version = CodeSystemVersion::for_resource(owner, 1);
    let top = version.add_root("TOP", None);
    let left = version.add_child_concept(top, "L", None);
    let right = version.add_child_concept(top, "R", None);
    let bottom = version.add_child_concept(left, "BOTTOM", None);
    version.add_link(right, bottom);
    version
}

pub fn codes(concepts: &HashSet<StoredConcept>) -> BTreeSet<String> {
    concepts.iter().map(|c| c.code.clone()).collect()
}

pub fn code_set(codes: &[&str]) -> BTreeSet<String> {
    codes.iter().map(|c| c.to_string()).collect()
}
