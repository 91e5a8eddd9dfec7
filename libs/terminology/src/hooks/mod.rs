//! Resource lifecycle hooks
//!
//! The surrounding server calls these after a resource write has been stored.

use crate::{models::Resource, Result};
use async_trait::async_trait;

pub mod terminology;

pub use terminology::TerminologyHook;

#[async_trait]
pub trait ResourceHook: Send + Sync {
    async fn on_created(&self, resource: &Resource) -> Result<()>;

    async fn on_updated(&self, resource: &Resource) -> Result<()>;

    /// `version` is the revision that marks the deletion
    async fn on_deleted(&self, resource_type: &str, id: &str, version: i32) -> Result<()>;

    /// Resources written together, handled one by one in order.
    ///
    /// Stops at the first failing resource.
    async fn on_batch_updated(&self, resources: &[Resource]) -> Result<()> {
        for resource in resources {
            self.on_updated(resource).await?;
        }
        Ok(())
    }
}
