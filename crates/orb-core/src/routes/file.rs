// # File Route Store
//
// File-based implementation of RouteStore.
//
// ## Atomicity
//
// - New content is written to a hidden sibling (`.<name>.tmp`), flushed and
//   synced, then renamed over the target
// - The target is never truncated in place, so a concurrent reader (the tunnel
//   daemon reloading, or another tool) sees the old file or the new one
// - The existing file's permissions are carried over to the replacement
//
// ## Missing File
//
// The routing file is provisioned together with the tunnel daemon. A missing
// file is an error, not an empty route set: an empty set would have no
// catch-all rule.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::traits::route_store::RouteStore;

/// Routing file on local disk
///
/// # Example
///
/// ```rust,no_run
/// use orb_core::routes::FileRouteStore;
/// use orb_core::traits::RouteStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRouteStore::new("/etc/cloudflared/config.yml");
///
///     let routes = store.load().await?;
///     routes.ensure_catch_all_invariant()?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileRouteStore {
    path: PathBuf,
}

impl FileRouteStore {
    /// Create a store for the routing file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the routing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path used for atomic replacement
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "routes".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    fn map_read_error(&self, e: std::io::Error) -> Error {
        match e.kind() {
            ErrorKind::NotFound => Error::not_found(format!(
                "routing file not found at {}",
                self.path.display()
            )),
            ErrorKind::PermissionDenied => Error::permission_denied(format!(
                "cannot read {} - try with sudo",
                self.path.display()
            )),
            _ => Error::Io(e),
        }
    }

    fn map_write_error(&self, target: &Path, e: std::io::Error) -> Error {
        match e.kind() {
            ErrorKind::PermissionDenied => Error::permission_denied(format!(
                "cannot write {} - try with sudo",
                target.display()
            )),
            _ => Error::Io(e),
        }
    }

    async fn write_temp(&self, temp_path: &Path, contents: &[u8]) -> Result<()> {
        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| self.map_write_error(temp_path, e))?;

        file.write_all(contents)
            .await
            .map_err(|e| self.map_write_error(temp_path, e))?;
        file.flush()
            .await
            .map_err(|e| self.map_write_error(temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| self.map_write_error(temp_path, e))?;

        if let Ok(metadata) = fs::metadata(&self.path).await
            && let Err(e) = fs::set_permissions(temp_path, metadata.permissions()).await
        {
            tracing::warn!(
                "Could not copy permissions of {} to replacement: {}",
                self.path.display(),
                e
            );
        }

        Ok(())
    }
}

#[async_trait]
impl RouteStore for FileRouteStore {
    async fn load_raw(&self) -> Result<Vec<u8>> {
        let contents = fs::read(&self.path).await.map_err(|e| self.map_read_error(e))?;
        tracing::debug!("Loaded routing file {} ({} bytes)", self.path.display(), contents.len());
        Ok(contents)
    }

    async fn save_raw(&self, contents: &[u8]) -> Result<()> {
        let temp_path = self.temp_path();

        if let Err(e) = self.write_temp(&temp_path, contents).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(self.map_write_error(&self.path, e));
        }

        tracing::trace!("Routing file replaced: {}", self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
