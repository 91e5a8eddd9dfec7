//! Concept graph model for a code system version that has not been committed yet
//!
//! Concepts live in an arena owned by the [`CodeSystemVersion`] and are
//! addressed by [`ConceptId`]. Parent/child relationships are kept as an
//! explicit edge list, so one concept may have several parents.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a concept inside one draft version's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConceptId(pub usize);

impl ConceptId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One vocabulary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Code that identifies the concept
    pub code: String,

    /// Text to display to the user
    pub display: Option<String>,

    /// Not selectable on its own (grouping concept)
    pub is_abstract: bool,

    /// Key of the draft version this concept was created for
    pub version_key: Uuid,
}

impl Concept {
    pub fn new(version_key: Uuid, code: impl Into<String>, display: Option<String>) -> Self {
        Self {
            code: code.into(),
            display,
            is_abstract: false,
            version_key,
        }
    }
}

/// Directed edge `parent -> child`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentChildLink {
    pub parent: ConceptId,
    pub child: ConceptId,
}

/// Draft (or, once `pid` is set, committed) snapshot of a code system's concept graph
#[derive(Debug, Clone)]
pub struct CodeSystemVersion {
    key: Uuid,
    pid: Option<i64>,
    owner: Option<String>,
    resource_version_id: i32,
    concepts: Vec<Concept>,
    links: Vec<ParentChildLink>,
    roots: Vec<ConceptId>,
}

impl Default for CodeSystemVersion {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeSystemVersion {
    /// Empty draft without an owning resource
    pub fn new() -> Self {
        Self {
            key: Uuid::new_v4(),
            pid: None,
            owner: None,
            resource_version_id: 1,
            concepts: Vec::new(),
            links: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Empty draft bound to a revision of the owning CodeSystem resource
    pub fn for_resource(resource_id: impl Into<String>, resource_version_id: i32) -> Self {
        let mut version = Self::new();
        version.owner = Some(resource_id.into());
        version.resource_version_id = resource_version_id;
        version
    }

    pub fn key(&self) -> Uuid {
        self.key
    }

    /// Persistent id, set once the version has been committed
    pub fn pid(&self) -> Option<i64> {
        self.pid
    }

    pub(crate) fn set_pid(&mut self, pid: i64) {
        self.pid = Some(pid);
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn resource_version_id(&self) -> i32 {
        self.resource_version_id
    }

    /// Add a concept owned by this version and return its id
    pub fn add_concept(&mut self, code: impl Into<String>, display: Option<&str>) -> ConceptId {
        let concept = Concept::new(self.key, code, display.map(str::to_string));
        self.insert_concept(concept)
    }

    /// Add a concept and register it as a root
    pub fn add_root(&mut self, code: impl Into<String>, display: Option<&str>) -> ConceptId {
        let id = self.add_concept(code, display);
        self.roots.push(id);
        id
    }

    /// Add a concept as a child of `parent`
    pub fn add_child_concept(
        &mut self,
        parent: ConceptId,
        code: impl Into<String>,
        display: Option<&str>,
    ) -> ConceptId {
        let id = self.add_concept(code, display);
        self.add_link(parent, id);
        id
    }

    /// Insert an already built concept as-is.
    ///
    /// The concept keeps its recorded version key; a concept created for a
    /// different version is rejected when the version is validated.
    pub fn insert_concept(&mut self, concept: Concept) -> ConceptId {
        let id = ConceptId(self.concepts.len());
        self.concepts.push(concept);
        id
    }

    pub fn push_root(&mut self, id: ConceptId) {
        self.roots.push(id);
    }

    pub fn add_link(&mut self, parent: ConceptId, child: ConceptId) {
        self.links.push(ParentChildLink { parent, child });
    }

    pub fn set_abstract(&mut self, id: ConceptId, is_abstract: bool) {
        if let Some(concept) = self.concepts.get_mut(id.index()) {
            concept.is_abstract = is_abstract;
        }
    }

    pub fn concept(&self, id: ConceptId) -> Option<&Concept> {
        self.concepts.get(id.index())
    }

    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    pub fn links(&self) -> &[ParentChildLink] {
        &self.links
    }

    pub fn roots(&self) -> &[ConceptId] {
        &self.roots
    }

    /// First concept with exactly this code
    pub fn find_by_code(&self, code: &str) -> Option<ConceptId> {
        self.concepts
            .iter()
            .position(|c| c.code == code)
            .map(ConceptId)
    }

    pub fn contains(&self, id: ConceptId) -> bool {
        id.index() < self.concepts.len()
    }

    /// Children of every concept, indexed by concept id, in link order.
    ///
    /// Links pointing outside the arena are left out; the validator reports
    /// them before anything relies on this index.
    pub fn child_index(&self) -> Vec<Vec<ConceptId>> {
        let mut index = vec![Vec::new(); self.concepts.len()];
        for link in &self.links {
            if self.contains(link.parent) && self.contains(link.child) {
                index[link.parent.index()].push(link.child);
            }
        }
        index
    }
}
