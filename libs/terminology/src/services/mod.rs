//! Terminology services

pub mod closure;
pub mod lookup;
pub mod terminology;
pub mod validation;
pub mod version_store;

pub use closure::ClosureQueries;
pub use lookup::{CodeSystemCatalog, LookupService};
pub use terminology::TerminologyService;
pub use validation::validate_concepts_for_storage;
pub use version_store::VersionStore;
