use std::{collections::BTreeMap, io, path::PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use crosstalk_api::PersistentKv;
use tokio::sync::Mutex;

/// Key-value store kept as one JSON object in a file
///
/// A missing file reads as an empty store. Writes go to a sibling temporary
/// file first, then replace the store.
pub struct JsonFileKv {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileKv {
    pub fn new(path: impl Into<PathBuf>) -> JsonFileKv {
        JsonFileKv {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", self.path.display()))
    }

    async fn replace(&self, json: Vec<u8>) -> anyhow::Result<()> {
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))
    }
}

#[async_trait]
impl PersistentKv for JsonFileKv {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let _lock = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        let _lock = self.lock.lock().await;
        let mut data = self.load().await?;
        data.insert(String::from(key), value);
        let json = serde_json::to_vec_pretty(&data).context("serializing store")?;
        let res = self.replace(json).await;
        if let Err(err) = &res {
            tracing::error!(?err, key, "failed persisting value");
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let kv = JsonFileKv::new(&path);
        assert_eq!(kv.get("trackedIssues").await.unwrap(), None);

        kv.set("trackedIssues", String::from(r#"["a/b#1"]"#)).await.unwrap();
        kv.set("other", String::from("x")).await.unwrap();
        kv.set("other", String::from("y")).await.unwrap();

        let reopened = JsonFileKv::new(&path);
        assert_eq!(
            reopened.get("trackedIssues").await.unwrap().as_deref(),
            Some(r#"["a/b#1"]"#)
        );
        assert_eq!(reopened.get("other").await.unwrap().as_deref(), Some("y"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn corrupted_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        let kv = JsonFileKv::new(&path);
        assert!(kv.get("trackedIssues").await.is_err());
        assert!(kv.set("trackedIssues", String::from("[]")).await.is_err());
    }
}
