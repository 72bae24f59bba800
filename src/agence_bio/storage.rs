//! Object storage for published extracts.

use crate::error::{PipelineError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait ObjectStore: Send + Sync {
    /// Upload `source` as `dest_path/dest_name`, replacing any existing object.
    fn put(&self, source: &Path, dest_path: &str, dest_name: &str) -> Result<()>;

    /// Whether two objects have identical content; `None` when the second
    /// object does not exist yet.
    fn compare(&self, path_a: &str, name_a: &str, path_b: &str, name_b: &str) -> Result<Option<bool>>;

    /// Human-readable location, used in notifications.
    fn describe(&self) -> String;
}

/// Bucket laid out as a directory tree under `root/bucket`.
pub struct LocalObjectStore {
    root: PathBuf,
    bucket: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    fn object_path(&self, path: &str, name: &str) -> PathBuf {
        self.root
            .join(&self.bucket)
            .join(path.trim_matches('/'))
            .join(name)
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, source: &Path, dest_path: &str, dest_name: &str) -> Result<()> {
        let target = self.object_path(dest_path, dest_name);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &target).map_err(|e| {
            PipelineError::Storage(format!("Failed to upload {:?} to {:?}: {}", source, target, e))
        })?;
        debug!("Uploaded {:?} to {:?}", source, target);
        Ok(())
    }

    fn compare(&self, path_a: &str, name_a: &str, path_b: &str, name_b: &str) -> Result<Option<bool>> {
        let a = self.object_path(path_a, name_a);
        let b = self.object_path(path_b, name_b);
        if !b.exists() {
            return Ok(None);
        }
        let content_a = fs::read(&a)
            .map_err(|e| PipelineError::Storage(format!("Failed to read {:?}: {}", a, e)))?;
        let content_b = fs::read(&b)
            .map_err(|e| PipelineError::Storage(format!("Failed to read {:?}: {}", b, e)))?;
        Ok(Some(content_a == content_b))
    }

    fn describe(&self) -> String {
        format!("{} (bucket {})", self.root.display(), self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_compare() {
        let root = std::env::temp_dir().join(format!("dgv-store-{}", uuid::Uuid::new_v4()));
        let store = LocalObjectStore::new(&root, "bucket");
        let src = root.join("src.csv");
        fs::create_dir_all(&root).unwrap();
        fs::write(&src, "a,b\n1,2\n").unwrap();

        store.put(&src, "agence_bio/new/", "x.csv").unwrap();
        assert!(root.join("bucket/agence_bio/new/x.csv").exists());
        assert_eq!(store.compare("agence_bio/new/", "x.csv", "agence_bio/latest/", "x.csv").unwrap(), None);

        store.put(&src, "agence_bio/latest/", "x.csv").unwrap();
        assert_eq!(store.compare("agence_bio/new/", "x.csv", "agence_bio/latest/", "x.csv").unwrap(), Some(true));

        fs::write(&src, "a,b\n1,3\n").unwrap();
        store.put(&src, "agence_bio/new/", "x.csv").unwrap();
        assert_eq!(store.compare("agence_bio/new/", "x.csv", "agence_bio/latest/", "x.csv").unwrap(), Some(false));
    }
}
