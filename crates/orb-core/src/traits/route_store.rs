// # Route Store Trait
//
// Defines how the coordinator reads and replaces the routing file.
//
// ## Implementations
//
// - File-based: `FileRouteStore` (write-to-temp + rename)
// - In-memory: `MemoryRouteStore` (embedding and tests)
//
// ## Why raw bytes?
//
// Rollback restores the exact bytes that were on disk before the call. The
// typed `load`/`save` helpers are layered on top of `load_raw`/`save_raw`.

use async_trait::async_trait;

use crate::error::Result;
use crate::routes::RouteSet;

/// Trait for routing file storage
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - `load_raw` on a missing file is `Error::NotFound`, never an empty default
/// - `save_raw` is atomic for concurrent readers: they observe either the old
///   or the new content, never a truncated file
/// - Implementations never cache; every `load_raw` reflects the current source
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Read the current routing file contents
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: the file does not exist
    /// - `Error::PermissionDenied`: the file is not readable
    async fn load_raw(&self) -> Result<Vec<u8>>;

    /// Atomically replace the routing file contents
    ///
    /// # Errors
    ///
    /// - `Error::PermissionDenied`: the file or its directory is not writable
    /// - `Error::Io`: any other write failure
    async fn save_raw(&self, contents: &[u8]) -> Result<()>;

    /// Human-readable location (for logs and error messages)
    fn location(&self) -> String;

    /// Load and parse the routing file
    ///
    /// # Errors
    ///
    /// Everything `load_raw` returns, plus `Error::Corrupt` on unparsable content.
    async fn load(&self) -> Result<RouteSet> {
        let raw = self.load_raw().await?;
        RouteSet::from_yaml(&raw)
    }

    /// Serialize and atomically write a route set
    ///
    /// Refuses to write a route set that violates the catch-all invariant.
    async fn save(&self, routes: &RouteSet) -> Result<()> {
        routes.ensure_catch_all_invariant()?;
        let raw = routes.to_yaml()?;
        self.save_raw(&raw).await
    }
}
