//! Structured create/update/delete on tracked files
//!
//! Each editor owns one file path and performs a whole-file read-modify-write
//! per operation, reading the blob fresh every time (never cached). Every
//! successful mutation persists the file and then signals the process-control
//! collaborator to reload the network service; a reload failure propagates but
//! does not roll back the file mutation.
//!
//! Concurrent API writers against the same file are not serialized here; that
//! is a known, accepted gap.

mod dhcp;
mod directive;

use std::path::Path;
use std::sync::Arc;

pub use dhcp::{LeaseEditor, ReservationEditor};
pub use directive::DirectiveEditor;

use crate::error::Result;
use crate::traits::ServiceReloader;

/// Create the file (and its parent directories) if absent, empty
pub(crate) async fn ensure_file(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, b"").await?;
    Ok(())
}

/// Read a tracked file, treating a missing file as empty content
pub(crate) async fn read_or_empty(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Whole-file access to a tracked config blob
///
/// Used for the primary configuration file, which the API layer edits as
/// opaque text rather than as structured entries.
pub struct BlobEditor {
    path: std::path::PathBuf,
    reloader: Arc<dyn ServiceReloader>,
}

impl BlobEditor {
    pub fn new(path: impl Into<std::path::PathBuf>, reloader: Arc<dyn ServiceReloader>) -> Self {
        Self {
            path: path.into(),
            reloader,
        }
    }

    /// Current raw content of the file
    pub async fn read(&self) -> Result<String> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }

    /// Replace the whole file and reload the service
    pub async fn write(&self, content: &str) -> Result<()> {
        tokio::fs::write(&self.path, content).await?;
        self.reloader.reload().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::reloader::NoopReloader;
    use tempfile::tempdir;

    #[tokio::test]
    async fn ensure_file_creates_parents_and_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/custom.conf");

        ensure_file(&path).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "");

        // Idempotent: existing content is left alone
        tokio::fs::write(&path, "keep").await.unwrap();
        ensure_file(&path).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "keep");
    }

    #[tokio::test]
    async fn blob_editor_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dnsmasq.conf");
        tokio::fs::write(&path, "domain-needed\nbogus-priv").await.unwrap();

        let editor = BlobEditor::new(&path, Arc::new(NoopReloader));
        assert_eq!(editor.read().await.unwrap(), "domain-needed\nbogus-priv");

        editor.write("new-config").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "new-config");
    }
}
