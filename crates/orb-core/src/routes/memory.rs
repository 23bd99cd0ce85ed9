// # Memory Route Store
//
// In-memory implementation of RouteStore.
//
// ## When to Use
//
// - Embedding the coordinator where the routing file is managed elsewhere
// - Tests that compare routing content byte-for-byte across operations

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::routes::RouteSet;
use crate::traits::route_store::RouteStore;

/// In-memory routing "file"
///
/// Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryRouteStore {
    inner: Arc<RwLock<Option<Vec<u8>>>>,
}

impl MemoryRouteStore {
    /// Create a store with no file (every load is `NotFound`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the serialized form of `routes`
    pub fn with_routes(routes: &RouteSet) -> Result<Self> {
        Ok(Self::with_bytes(routes.to_yaml()?))
    }

    /// Create a store holding `contents` verbatim
    pub fn with_bytes(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(contents.into()))),
        }
    }

    /// Current contents, if any
    pub async fn contents(&self) -> Option<Vec<u8>> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl RouteStore for MemoryRouteStore {
    async fn load_raw(&self) -> Result<Vec<u8>> {
        self.inner
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::not_found("in-memory routing file has not been written"))
    }

    async fn save_raw(&self, contents: &[u8]) -> Result<()> {
        *self.inner.write().await = Some(contents.to_vec());
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_store_is_not_found() {
        let store = MemoryRouteStore::new();
        assert!(matches!(store.load().await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn clones_share_contents() {
        let store = MemoryRouteStore::with_routes(&RouteSet::new("t", "http_status:404")).unwrap();
        let other = store.clone();

        other.save_raw(b"tunnel: t2\ningress:\n  - service: http_status:404\n").await.unwrap();
        assert_eq!(store.load().await.unwrap().tunnel, "t2");
    }
}
