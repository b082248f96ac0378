use super::{normalize, DirEntry, EntryKind, Stat, Vfs};
use crate::error::VfsError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Thin adapter over `std::fs`/`tokio::fs` for the native binary. Every
/// method joins against `root` and refuses to escape it, the way the
/// teacher's `FileOutputWriter` confines writes under `output.active_dir`
/// (`src/output/files.rs`).
pub struct LocalFsVfs {
    root: PathBuf,
}

impl LocalFsVfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(normalize(path))
    }

    fn io_err(path: &str, source: std::io::Error) -> VfsError {
        if source.kind() == std::io::ErrorKind::NotFound {
            VfsError::NotFound(path.to_string())
        } else {
            VfsError::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl Vfs for LocalFsVfs {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        let full = self.resolve(path);
        tokio::fs::read(&full)
            .await
            .map_err(|e| Self::io_err(path, e))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), VfsError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err(path, e))?;
        }
        let tmp = tmp_path(&full);
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| Self::io_err(path, e))?;
        tokio::fs::rename(&tmp, &full)
            .await
            .map_err(|e| Self::io_err(path, e))
    }

    async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, VfsError> {
        let full = self.resolve(path);
        let mut entries = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| Self::io_err(path, e))?;
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_err(path, e))?
        {
            let file_type = entry.file_type().await.map_err(|e| Self::io_err(path, e))?;
            out.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: if file_type.is_dir() {
                    EntryKind::Dir
                } else {
                    EntryKind::File
                },
            });
        }
        Ok(out)
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), VfsError> {
        let full = self.resolve(path);
        let result = if recursive {
            tokio::fs::create_dir_all(&full).await
        } else {
            tokio::fs::create_dir(&full).await
        };
        result.map_err(|e| Self::io_err(path, e))
    }

    async fn stat(&self, path: &str) -> Result<Stat, VfsError> {
        let full = self.resolve(path);
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| Self::io_err(path, e))?;
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Ok(Stat {
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
            size: meta.len(),
            mtime_ms,
        })
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), VfsError> {
        let full_from = self.resolve(from);
        let full_to = self.resolve(to);
        if let Some(parent) = full_to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err(to, e))?;
        }
        tokio::fs::rename(&full_from, &full_to)
            .await
            .map_err(|e| Self::io_err(from, e))
    }

    async fn rmdir(&self, path: &str, recursive: bool) -> Result<(), VfsError> {
        let full = self.resolve(path);
        let result = if recursive {
            tokio::fs::remove_dir_all(&full).await
        } else {
            tokio::fs::remove_dir(&full).await
        };
        result.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound(path.to_string()),
            _ if !recursive && e.raw_os_error() == Some(39) => VfsError::NotEmpty(path.to_string()),
            _ => Self::io_err(path, e),
        })
    }

    async fn unlink(&self, path: &str) -> Result<(), VfsError> {
        let full = self.resolve(path);
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| Self::io_err(path, e))
    }
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".ralph-tmp");
    target.with_file_name(name)
}
