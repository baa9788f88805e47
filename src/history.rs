//! Saved-query history, persisted as a JSON file next to the working
//! directory. Small enough that the whole file is rewritten on every change.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StudioError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedQuery {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub analysis_type: String,
    pub sql: String,
    pub created_at: DateTime<Utc>,
}

pub struct QueryHistory {
    path: PathBuf,
    entries: Vec<SavedQuery>,
}

impl QueryHistory {
    /// Opens the history file, starting empty when it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Vec::new()
        };
        Ok(Self { path, entries })
    }

    pub fn add(
        &mut self,
        username: &str,
        name: &str,
        analysis_type: &str,
        sql: &str,
    ) -> Result<Uuid> {
        let entry = SavedQuery {
            id: Uuid::new_v4(),
            username: username.to_string(),
            name: name.to_string(),
            analysis_type: analysis_type.to_string(),
            sql: sql.to_string(),
            created_at: Utc::now(),
        };
        let id = entry.id;
        self.entries.push(entry);
        self.persist()?;
        debug!(%id, username, "saved query");
        Ok(id)
    }

    /// Newest first.
    pub fn for_user(&self, username: &str) -> Vec<&SavedQuery> {
        let mut entries: Vec<&SavedQuery> = self
            .entries
            .iter()
            .filter(|e| e.username == username)
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    pub fn remove(&mut self, id: Uuid) -> Result<()> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() == before {
            return Err(StudioError::History(format!("no saved query with id {}", id)));
        }
        self.persist()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("query_history_{}_{}.json", tag, Uuid::new_v4()))
    }

    #[test]
    fn missing_file_starts_empty() {
        let history = QueryHistory::open(temp_path("missing")).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn add_persists_and_reloads() {
        let path = temp_path("roundtrip");
        let mut history = QueryHistory::open(&path).unwrap();
        history
            .add("maya", "august devices", "devices_analysis", "select 1")
            .unwrap();
        let reloaded = QueryHistory::open(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.for_user("maya")[0].name, "august devices");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn for_user_filters_and_remove_deletes() {
        let path = temp_path("filter");
        let mut history = QueryHistory::open(&path).unwrap();
        let id = history.add("maya", "a", "dma_analysis", "select 1").unwrap();
        history.add("liam", "b", "dma_analysis", "select 2").unwrap();
        assert_eq!(history.for_user("maya").len(), 1);
        history.remove(id).unwrap();
        assert!(history.for_user("maya").is_empty());
        assert_eq!(history.for_user("liam").len(), 1);
        assert!(history.remove(id).is_err());
        std::fs::remove_file(&path).ok();
    }
}
