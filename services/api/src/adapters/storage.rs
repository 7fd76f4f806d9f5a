//! services/api/src/adapters/storage.rs
//!
//! Stores uploaded files on the local filesystem under the configured upload
//! directory. Keys have the form `<area>/<uuid><ext>`, where the extension is
//! taken from the accepted MIME type. Bill keys double as the path below
//! `/uploads`, the only area served statically.

use async_trait::async_trait;
use bytes::Bytes;
use client_portal_core::domain::StoredFile;
use client_portal_core::files::stored_extension;
use client_portal_core::ports::{ByteStream, FileStorage, PortError, PortResult};
use futures::TryStreamExt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to a path, refusing anything that would escape the root.
    fn path_for(&self, key: &str) -> PortResult<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || key.is_empty() {
            return Err(PortError::NotFound("File".to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(e: std::io::Error) -> PortError {
    PortError::Unexpected(format!("file storage: {e}"))
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save(
        &self,
        area: &str,
        original_name: &str,
        mime_type: &str,
        data: Bytes,
    ) -> PortResult<StoredFile> {
        let dir = self.root.join(area);
        fs::create_dir_all(&dir).await.map_err(io_error)?;

        let ext = stored_extension(mime_type)
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let file_name = format!("{}{}", Uuid::new_v4(), ext);
        fs::write(dir.join(&file_name), &data)
            .await
            .map_err(io_error)?;
        debug!("Stored {} bytes as {}/{}", data.len(), area, file_name);

        Ok(StoredFile {
            key: format!("{}/{}", area, file_name),
            original_name: original_name.to_string(),
            size: data.len() as i64,
            mime_type: mime_type.to_string(),
        })
    }

    async fn open(&self, key: &str) -> PortResult<ByteStream> {
        let path = self.path_for(key)?;
        let file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => PortError::NotFound("File".to_string()),
            _ => io_error(e),
        })?;
        Ok(Box::pin(ReaderStream::new(file).map_err(io_error)))
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("File {} was already gone", key);
                Ok(())
            }
            Err(e) => Err(io_error(e)),
        }
    }
}
