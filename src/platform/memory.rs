//! In-memory platform used by tests. Records every call it receives.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use super::api::PlatformApi;
use crate::error::{ModkitError, PlatformError, Result};
use crate::resources::{Identifier, ResourceKind, ResourceRecord};

/// A call received by [`InMemoryPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Retrieve(ResourceKind, usize),
    List(ResourceKind),
    Create(ResourceKind, Vec<Identifier>),
    Update(ResourceKind, Vec<Identifier>),
    Delete(ResourceKind, Vec<Identifier>),
}

impl Call {
    pub const fn is_mutating(&self) -> bool {
        matches!(self, Self::Create(..) | Self::Update(..) | Self::Delete(..))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    items: Mutex<BTreeMap<Identifier, Value>>,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<BTreeSet<ResourceKind>>,
    unreadable: Mutex<BTreeSet<ResourceKind>>,
}

fn identify(kind: ResourceKind, item: &Value) -> Result<Identifier> {
    ResourceRecord::from_json(kind, item.clone())
        .map(|r| r.identifier())
        .map_err(|e| PlatformError::api_error(400, e.to_string()).into())
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a remote item.
    pub fn with(self, kind: ResourceKind, item: Value) -> Self {
        if let Ok(id) = identify(kind, &item) {
            self.items
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id, item);
        }
        self
    }

    /// Makes every mutating call for `kind` fail.
    pub fn failing(self, kind: ResourceKind) -> Self {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind);
        self
    }

    /// Makes every retrieve and list call for `kind` fail.
    pub fn unreadable(self, kind: ResourceKind) -> Self {
        self.unreadable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn check_failing(&self, kind: ResourceKind) -> Result<()> {
        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind)
        {
            return Err(ModkitError::Platform(PlatformError::api_error(
                400,
                format!("{kind} rejected"),
            )));
        }
        Ok(())
    }

    fn check_readable(&self, kind: ResourceKind) -> Result<()> {
        if self
            .unreadable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind)
        {
            return Err(ModkitError::Platform(PlatformError::api_error(
                503,
                format!("{kind} unavailable"),
            )));
        }
        Ok(())
    }

    fn upsert(&self, kind: ResourceKind, items: &[Value]) -> Result<Vec<Identifier>> {
        let mut ids = Vec::with_capacity(items.len());
        let mut store = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        for item in items {
            let id = identify(kind, item)?;
            store.insert(id.clone(), item.clone());
            ids.push(id);
        }
        Ok(ids)
    }
}

#[async_trait]
impl PlatformApi for InMemoryPlatform {
    async fn retrieve(&self, kind: ResourceKind, ids: &[Identifier]) -> Result<Vec<Value>> {
        self.record(Call::Retrieve(kind, ids.len()));
        self.check_readable(kind)?;
        let store = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(ids.iter().filter_map(|id| store.get(id).cloned()).collect())
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        self.record(Call::List(kind));
        self.check_readable(kind)?;
        let store = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(store
            .iter()
            .filter(|(id, _)| id.kind() == kind)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn create(&self, kind: ResourceKind, items: &[Value]) -> Result<Vec<Value>> {
        let ids = items
            .iter()
            .map(|i| identify(kind, i))
            .collect::<Result<Vec<_>>>()?;
        self.record(Call::Create(kind, ids));
        self.check_failing(kind)?;
        self.upsert(kind, items)?;
        Ok(items.to_vec())
    }

    async fn update(&self, kind: ResourceKind, items: &[Value]) -> Result<Vec<Value>> {
        let ids = items
            .iter()
            .map(|i| identify(kind, i))
            .collect::<Result<Vec<_>>>()?;
        self.record(Call::Update(kind, ids));
        self.check_failing(kind)?;
        self.upsert(kind, items)?;
        Ok(items.to_vec())
    }

    async fn delete(&self, kind: ResourceKind, ids: &[Identifier]) -> Result<()> {
        self.record(Call::Delete(kind, ids.to_vec()));
        self.check_failing(kind)?;
        let mut store = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        for id in ids {
            store.remove(id);
        }
        Ok(())
    }
}
