//! Domain models for the terminology engine

pub mod concept;
pub mod fhir;
pub mod stored;

pub use concept::{CodeSystemVersion, Concept, ConceptId, ParentChildLink};
pub use fhir::{concept_is_abstract, Coding, ExpansionContains, LookupResult, Resource};
pub use stored::{CodeSystemRecord, StoredConcept, StoredLink, VersionRecord};
