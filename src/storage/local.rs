// src/storage/local.rs

//! Local filesystem implementation of [`ArtifactStore`].

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::MetaEntry;
use crate::storage::ArtifactStore;

/// File name of the per-year index artifact.
const YEAR_INDEX_FILE: &str = "current_meta.json";

/// Filesystem-backed artifact store rooted at the scraper's data directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    data_dir: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at the given directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolve a relative artifact key, rejecting paths that would escape
    /// the data root.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        let escapes = rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(AppError::invalid_argument(format!(
                "unsafe artifact path: {key}"
            )));
        }
        Ok(self.data_dir.join(rel))
    }

    /// Read raw bytes, returning `None` if the file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read and parse a JSON artifact.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn list_years(&self) -> Result<Vec<i32>> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Data directory not found: {:?}", self.data_dir);
                return Ok(Vec::new());
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut years = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(year) = name.to_str().and_then(|s| s.parse::<i32>().ok()) else {
                log::debug!("Skipping non-numeric data directory entry: {:?}", name);
                continue;
            };
            // Only years with a readable index artifact count
            if tokio::fs::try_exists(entry.path().join(YEAR_INDEX_FILE)).await? {
                years.push(year);
            }
        }

        years.sort_unstable_by(|a, b| b.cmp(a));
        Ok(years)
    }

    async fn read_year_index(&self, year: i32) -> Result<Option<Vec<MetaEntry>>> {
        self.read_json(&format!("{year}/{YEAR_INDEX_FILE}")).await
    }

    async fn read_detail(&self, json_path: &str) -> Result<Option<Value>> {
        self.read_json(json_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_year(dir: &Path, year: i32, entries: &Value) {
        let year_dir = dir.join(year.to_string());
        std::fs::create_dir_all(year_dir.join("json")).unwrap();
        std::fs::write(
            year_dir.join(YEAR_INDEX_FILE),
            serde_json::to_vec_pretty(entries).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_list_years_sorted_desc() {
        let tmp = TempDir::new().unwrap();
        write_year(tmp.path(), 2024, &json!([]));
        write_year(tmp.path(), 2025, &json!([]));

        let store = LocalStore::new(tmp.path());
        assert_eq!(store.list_years().await.unwrap(), vec![2025, 2024]);
    }

    #[tokio::test]
    async fn test_list_years_skips_non_numeric_and_indexless() {
        let tmp = TempDir::new().unwrap();
        write_year(tmp.path(), 2025, &json!([]));
        std::fs::create_dir(tmp.path().join("html_backup")).unwrap();
        std::fs::create_dir(tmp.path().join("2023")).unwrap(); // no index artifact

        let store = LocalStore::new(tmp.path());
        assert_eq!(store.list_years().await.unwrap(), vec![2025]);
    }

    #[tokio::test]
    async fn test_list_years_missing_root_is_empty() {
        let store = LocalStore::new("/no/such/dir");
        assert_eq!(store.list_years().await.unwrap(), Vec::<i32>::new());
    }

    #[tokio::test]
    async fn test_read_year_index() {
        let tmp = TempDir::new().unwrap();
        write_year(
            tmp.path(),
            2025,
            &json!([{
                "name": "Astonea Labs Ltd",
                "json_path": "2025/json/Astonea_Labs_Ltd_IPO.json"
            }]),
        );

        let store = LocalStore::new(tmp.path());
        let entries = store.read_year_index(2025).await.unwrap().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Astonea Labs Ltd");

        assert!(store.read_year_index(1999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_index_is_error_not_none() {
        let tmp = TempDir::new().unwrap();
        let year_dir = tmp.path().join("2025");
        std::fs::create_dir_all(&year_dir).unwrap();
        std::fs::write(year_dir.join(YEAR_INDEX_FILE), b"not json{").unwrap();

        let store = LocalStore::new(tmp.path());
        assert!(store.read_year_index(2025).await.is_err());
    }

    #[tokio::test]
    async fn test_read_detail() {
        let tmp = TempDir::new().unwrap();
        write_year(tmp.path(), 2025, &json!([]));
        std::fs::write(
            tmp.path().join("2025/json/X_IPO.json"),
            serde_json::to_vec(&json!({ "ipo_details": [] })).unwrap(),
        )
        .unwrap();

        let store = LocalStore::new(tmp.path());
        let doc = store.read_detail("2025/json/X_IPO.json").await.unwrap();
        assert_eq!(doc, Some(json!({ "ipo_details": [] })));

        assert!(store
            .read_detail("2025/json/Missing.json")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_rejects_traversal_paths() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        assert!(store.read_detail("../etc/passwd").await.is_err());
        assert!(store.read_detail("/etc/passwd").await.is_err());
    }
}
