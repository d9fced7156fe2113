//! Key/value record of outputs already produced, so reruns can skip them.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    /// Everything that shaped the output: inputs, output location, policies.
    #[serde(default)]
    pub settings: String,
    pub created: DateTime<Utc>,
}

pub trait ResultCache {
    fn get(&self, key: &str) -> Option<&CacheEntry>;

    fn put(&mut self, key: &str, path: PathBuf, settings: &str);

    /// Persists pending entries.
    fn save(&mut self) -> Result<()>;

    /// True when `key` was recorded with the same settings and its file is
    /// still on disk.
    fn is_fresh(&self, key: &str, settings: &str) -> bool {
        self.get(key)
            .is_some_and(|entry| entry.settings == settings && entry.path.exists())
    }
}

/// Cache that lives for one run only.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    fn put(&mut self, key: &str, path: PathBuf, settings: &str) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                path,
                settings: settings.to_string(),
                created: Utc::now(),
            },
        );
    }

    fn save(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Cache persisted as a JSON object of `key -> {path, settings, created}`.
#[derive(Debug)]
pub struct JsonCache {
    file_path: PathBuf,
    entries: MemoryCache,
    dirty: bool,
}

impl JsonCache {
    /// Opens the cache at `file_path`. A missing file is an empty cache.
    pub fn open(file_path: &Path) -> Result<Self> {
        let entries = if file_path.exists() {
            let text = fs::read_to_string(file_path)
                .with_context(|| format!("Cannot read cache {:?}", file_path))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Cannot parse cache {:?}", file_path))?
        } else {
            BTreeMap::new()
        };

        Ok(JsonCache {
            file_path: file_path.to_path_buf(),
            entries: MemoryCache { entries },
            dirty: false,
        })
    }

    /// `~/.peff/cache.json`, or relative to the working directory when there is
    /// no home directory.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".peff")
            .join("cache.json")
    }

    pub fn len(&self) -> usize {
        self.entries.entries.len()
    }
}

impl ResultCache for JsonCache {
    fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    fn put(&mut self, key: &str, path: PathBuf, settings: &str) {
        self.entries.put(key, path, settings);
        self.dirty = true;
    }

    fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let text = serde_json::to_string_pretty(&self.entries.entries)?;
        fs::write(&self.file_path, text)
            .with_context(|| format!("Cannot write cache {:?}", self.file_path))?;
        self.dirty = false;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn should_put_and_get() {
        let mut cache = MemoryCache::default();
        cache.put(
            "season-sum/2016",
            PathBuf::from("/tmp/effective_precip_2016.tif"),
            "sum",
        );

        let entry = cache.get("season-sum/2016").unwrap();
        assert_eq!(entry.path, PathBuf::from("/tmp/effective_precip_2016.tif"));
        assert!(cache.get("season-sum/2017").is_none());
    }

    #[test]
    fn should_persist_entries() {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join("nested").join("cache.json");
        let output = temp_dir.path().join("effective_precip_2016.tif");
        fs::write(&output, b"").unwrap();

        let mut cache = JsonCache::open(&cache_path).unwrap();
        assert_eq!(cache.len(), 0);
        cache.put("season-sum/2016", output.clone(), "sum");
        cache.save().unwrap();

        let reopened = JsonCache::open(&cache_path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("season-sum/2016").unwrap().path, output);
        assert!(reopened.is_fresh("season-sum/2016", "sum"));
    }

    #[test]
    fn should_not_be_fresh_when_file_is_gone() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = MemoryCache::default();
        cache.put("season-sum/2016", temp_dir.path().join("deleted.tif"), "sum");

        assert!(!cache.is_fresh("season-sum/2016", "sum"));
    }

    #[test]
    fn should_not_be_fresh_when_settings_change() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("effective_precip_2016.tif");
        fs::write(&output, b"").unwrap();

        let mut cache = MemoryCache::default();
        cache.put("season-sum/2016", output, "sum nodata");

        assert!(cache.is_fresh("season-sum/2016", "sum nodata"));
        assert!(!cache.is_fresh("season-sum/2016", "sum empty"));
    }

    #[test]
    fn should_read_entries_without_settings() {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join("cache.json");
        fs::write(
            &cache_path,
            r#"{"bundle/2016": {"path": "/tmp/b.tif", "created": "2024-05-01T00:00:00Z"}}"#,
        )
        .unwrap();

        let cache = JsonCache::open(&cache_path).unwrap();

        assert_eq!(cache.get("bundle/2016").unwrap().settings, "");
    }

    #[test]
    fn should_reject_corrupt_cache() {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join("cache.json");
        fs::write(&cache_path, "not json").unwrap();

        assert!(JsonCache::open(&cache_path).is_err());
    }
}
