pub mod builders;
pub mod fixtures;
pub mod postgres;

use ferrum_terminology::{
    db::{InMemoryResourceStore, InMemoryTerminologyStore, ResourceStore},
    hooks::{ResourceHook, TerminologyHook},
    models::Resource,
    services::{CodeSystemCatalog, TerminologyService},
};
use std::sync::Arc;

// Re-export commonly used items
pub use builders::*;
pub use fixtures::*;

/// Engine wired to the in-memory backends
pub struct TestEngine {
    pub store: InMemoryTerminologyStore,
    pub resources: Arc<InMemoryResourceStore>,
    pub catalog: Arc<FakeCatalog>,
    pub service: TerminologyService<InMemoryTerminologyStore>,
    pub hook: TerminologyHook<InMemoryTerminologyStore>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_catalog(FakeCatalog::default())
    }

    pub fn with_catalog(catalog: FakeCatalog) -> Self {
        init_tracing();

        let store = InMemoryTerminologyStore::new();
        let resources = Arc::new(InMemoryResourceStore::new());
        let catalog = Arc::new(catalog);
        let service = TerminologyService::new(
            store.clone(),
            resources.clone() as Arc<dyn ResourceStore>,
            catalog.clone() as Arc<dyn CodeSystemCatalog>,
        );
        let hook = TerminologyHook::new(service.versions().clone());

        Self {
            store,
            resources,
            catalog,
            service,
            hook,
        }
    }

    /// Save a resource and run the hook on it, the way the server does on create/update
    pub async fn save(&self, resource: Resource) -> anyhow::Result<Resource> {
        let saved = self.resources.save(resource).await?;
        if saved.version_id == 1 {
            self.hook.on_created(&saved).await?;
        } else {
            self.hook.on_updated(&saved).await?;
        }
        Ok(saved)
    }
}

pub fn init_tracing() {
    ferrum_terminology::logging::init_simple_logging();
}
