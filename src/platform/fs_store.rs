//! An `ObjectStore` over a local directory tree.
//!
//! Buckets are directories directly under `root`; keys are `/`-separated
//! paths relative to the bucket directory. Useful for dry runs against a
//! downloaded copy of a bucket.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::{ObjectStore, ObjectSummary};
use crate::error::PlatformError;

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, PlatformError> {
        let dir = self.root.join(checked_relative(bucket)?);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(PlatformError::not_found(format!(
                "bucket directory '{}' does not exist",
                dir.display()
            )))
        }
    }
}

/// Refuses absolute paths and `..` so keys cannot escape the root.
fn checked_relative(path: &str) -> Result<&Path, PlatformError> {
    let candidate = Path::new(path);
    let escapes = candidate
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || path.is_empty() {
        return Err(PlatformError::rejected(format!(
            "'{}' is not a relative path inside the store",
            path
        )));
    }
    Ok(candidate)
}

fn io_error(context: &str, err: io::Error) -> PlatformError {
    match err.kind() {
        io::ErrorKind::NotFound => PlatformError::not_found(format!("{}: {}", context, err)),
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            PlatformError::transient(format!("{}: {}", context, err))
        }
        _ => PlatformError::rejected(format!("{}: {}", context, err)),
    }
}

impl ObjectStore for FsObjectStore {
    fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>, PlatformError> {
        let bucket_dir = self.bucket_dir(bucket)?;
        let mut objects = Vec::new();
        let mut pending = vec![bucket_dir.clone()];

        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).map_err(|e| io_error("list", e))?;
            for entry in entries {
                let entry = entry.map_err(|e| io_error("list", e))?;
                let path = entry.path();
                let metadata = entry.metadata().map_err(|e| io_error("stat", e))?;
                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }
                let relative = path.strip_prefix(&bucket_dir).unwrap_or(path.as_path());
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                objects.push(ObjectSummary {
                    key,
                    size: metadata.len(),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn fetch_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PlatformError> {
        let path = self.bucket_dir(bucket)?.join(checked_relative(key)?);
        fs::read(&path).map_err(|e| io_error(key, e))
    }
}
