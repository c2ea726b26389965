use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use client_core::SecureStore;
use tokio::fs;

/// JSON map persisted to a single file. Stands in for the platform keychain
/// on desktop.
pub struct FileSecureStore {
    path: PathBuf,
}

impl FileSecureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt secure store {}", self.path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err).with_context(|| format!("reading {}", self.path.display())),
        }
    }
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.read_all().await?;
        items.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&items)?)
            .await
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

pub fn default_path() -> PathBuf {
    std::env::var_os("STOREFRONT_SECRETS")
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(".storefront").join("secrets.json"))
}
