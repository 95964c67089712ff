//! Platform resource API trait definitions.
//!
//! This module defines the interface the planner and executor use to read
//! and mutate remote resources, independent of transport.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::resources::{Identifier, ResourceKind};

/// Trait for platform resource APIs.
///
/// Items travel in their JSON wire form. Every mutating call carries at most
/// the kind's batch limit of items.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Retrieves the items with the given ids. Unknown ids are omitted.
    async fn retrieve(&self, kind: ResourceKind, ids: &[Identifier]) -> Result<Vec<Value>>;

    /// Lists every item of a kind.
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>>;

    /// Creates items.
    async fn create(&self, kind: ResourceKind, items: &[Value]) -> Result<Vec<Value>>;

    /// Updates items in place.
    async fn update(&self, kind: ResourceKind, items: &[Value]) -> Result<Vec<Value>>;

    /// Deletes items by id.
    async fn delete(&self, kind: ResourceKind, ids: &[Identifier]) -> Result<()>;
}

#[async_trait]
impl PlatformApi for Box<dyn PlatformApi> {
    async fn retrieve(&self, kind: ResourceKind, ids: &[Identifier]) -> Result<Vec<Value>> {
        (**self).retrieve(kind, ids).await
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        (**self).list(kind).await
    }

    async fn create(&self, kind: ResourceKind, items: &[Value]) -> Result<Vec<Value>> {
        (**self).create(kind, items).await
    }

    async fn update(&self, kind: ResourceKind, items: &[Value]) -> Result<Vec<Value>> {
        (**self).update(kind, items).await
    }

    async fn delete(&self, kind: ResourceKind, ids: &[Identifier]) -> Result<()> {
        (**self).delete(kind, ids).await
    }
}

/// Existence check used by the dependency validator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// Returns true if the resource exists on the platform.
    async fn exists(&self, id: &Identifier) -> Result<bool>;
}

/// [`ResourceLookup`] backed by a [`PlatformApi`].
#[derive(Debug)]
pub struct PlatformLookup<'a, P: ?Sized> {
    api: &'a P,
}

impl<'a, P: PlatformApi + ?Sized> PlatformLookup<'a, P> {
    /// Wraps `api`.
    #[must_use]
    pub const fn new(api: &'a P) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<P: PlatformApi + ?Sized> ResourceLookup for PlatformLookup<'_, P> {
    async fn exists(&self, id: &Identifier) -> Result<bool> {
        let found = self
            .api
            .retrieve(id.kind(), std::slice::from_ref(id))
            .await?;
        Ok(!found.is_empty())
    }
}
