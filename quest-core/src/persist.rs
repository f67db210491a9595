//! Player record persistence.
//!
//! A single JSON file maps opaque user ids to small records. Semantics are
//! load-all/save-all with last-writer-wins; the only field the engine ever
//! writes back is the level.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A persisted player record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub character_class: String,
    pub level: u32,
}

/// JSON-file-backed store of player records keyed by user id.
#[derive(Debug, Clone)]
pub struct PlayerStore {
    path: PathBuf,
}

impl PlayerStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load every record. A missing file is an empty store.
    pub async fn load_all(&self) -> Result<HashMap<String, PlayerRecord>, PersistError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(error) => Err(error.into()),
        }
    }

    /// Overwrite the store with the given records.
    pub async fn save_all(
        &self,
        records: &HashMap<String, PlayerRecord>,
    ) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Look up one record.
    pub async fn get(&self, user_id: &str) -> Result<Option<PlayerRecord>, PersistError> {
        Ok(self.load_all().await?.remove(user_id))
    }

    /// Insert or overwrite one record.
    pub async fn put(&self, user_id: &str, record: PlayerRecord) -> Result<(), PersistError> {
        let mut records = self.load_all().await?;
        records.insert(user_id.to_string(), record);
        self.save_all(&records).await
    }

    /// Overwrite the level field for one user, creating a default record
    /// if none exists yet.
    pub async fn update_level(&self, user_id: &str, level: u32) -> Result<(), PersistError> {
        let mut records = self.load_all().await?;
        records
            .entry(user_id.to_string())
            .or_insert_with(|| PlayerRecord {
                name: "New Player".to_string(),
                character_class: "Warrior".to_string(),
                level: 1,
            })
            .level = level;
        self.save_all(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> PlayerStore {
        PlayerStore::new(dir.path().join("players.json"))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load_all().await.unwrap().is_empty());
        assert_eq!(store.get("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut records = HashMap::new();
        records.insert(
            "42".to_string(),
            PlayerRecord {
                name: "Brenna".to_string(),
                character_class: "Rogue".to_string(),
                level: 3,
            },
        );
        store.save_all(&records).await.unwrap();

        let loaded = store.get("42").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Brenna");
        assert_eq!(loaded.level, 3);
    }

    #[tokio::test]
    async fn test_update_level_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut records = HashMap::new();
        records.insert(
            "7".to_string(),
            PlayerRecord {
                name: "Aldric".to_string(),
                character_class: "Warrior".to_string(),
                level: 2,
            },
        );
        store.save_all(&records).await.unwrap();

        store.update_level("7", 5).await.unwrap();

        let record = store.get("7").await.unwrap().unwrap();
        assert_eq!(record.level, 5);
        // Other fields are untouched.
        assert_eq!(record.name, "Aldric");
    }

    #[tokio::test]
    async fn test_update_level_creates_default_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.update_level("9", 4).await.unwrap();

        let record = store.get("9").await.unwrap().unwrap();
        assert_eq!(record.level, 4);
        assert_eq!(record.name, "New Player");
    }
}
