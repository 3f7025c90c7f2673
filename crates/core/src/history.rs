//! Analysis history: where finished analyses are recorded, listed and removed.
//!
//! The pipeline only ever calls [`AnalysisStore::create`]; the read and
//! delete operations serve whatever front end manages the history.

use crate::error::StoreError;
use crate::models::{AnalysisRecord, AnalysisStats, HistoryPage};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_PAGE_LIMIT: usize = 50;

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn create(&self, record: &AnalysisRecord) -> Result<(), StoreError>;

    /// Newest first.
    async fn list(
        &self,
        limit: usize,
        offset: usize,
        user_id: Option<&str>,
    ) -> Result<HistoryPage, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Removes every record, or every record of one user. Returns how many went.
    async fn delete_all(&self, user_id: Option<&str>) -> Result<usize, StoreError>;

    async fn stats(&self, user_id: Option<&str>) -> Result<AnalysisStats, StoreError>;
}

#[derive(Default)]
pub struct InMemoryAnalysisStore {
    records: RwLock<Vec<AnalysisRecord>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn create(&self, record: &AnalysisRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
        user_id: Option<&str>,
    ) -> Result<HistoryPage, StoreError> {
        Ok(page_of(&*self.records.read().await, limit, offset, user_id))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        remove_by_id(&mut *self.records.write().await, id)
    }

    async fn delete_all(&self, user_id: Option<&str>) -> Result<usize, StoreError> {
        Ok(remove_for_user(&mut *self.records.write().await, user_id))
    }

    async fn stats(&self, user_id: Option<&str>) -> Result<AnalysisStats, StoreError> {
        Ok(stats_of(&*self.records.read().await, user_id))
    }
}

/// Keeps the history as one JSON array on disk.
pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<AnalysisRecord>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(StoreError::Io(error)),
        }
    }

    async fn save(&self, records: &[AnalysisRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for JsonFileStore {
    async fn create(&self, record: &AnalysisRecord) -> Result<(), StoreError> {
        let _lock = self.guard.lock().await;
        let mut records = self.load().await?;
        records.push(record.clone());
        self.save(&records).await
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
        user_id: Option<&str>,
    ) -> Result<HistoryPage, StoreError> {
        let _lock = self.guard.lock().await;
        Ok(page_of(&self.load().await?, limit, offset, user_id))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _lock = self.guard.lock().await;
        let mut records = self.load().await?;
        remove_by_id(&mut records, id)?;
        self.save(&records).await
    }

    async fn delete_all(&self, user_id: Option<&str>) -> Result<usize, StoreError> {
        let _lock = self.guard.lock().await;
        let mut records = self.load().await?;
        let removed = remove_for_user(&mut records, user_id);
        if removed > 0 {
            self.save(&records).await?;
        }
        Ok(removed)
    }

    async fn stats(&self, user_id: Option<&str>) -> Result<AnalysisStats, StoreError> {
        let _lock = self.guard.lock().await;
        Ok(stats_of(&self.load().await?, user_id))
    }
}

fn belongs_to(record: &AnalysisRecord, user_id: Option<&str>) -> bool {
    user_id.map_or(true, |user| record.user_id.as_deref() == Some(user))
}

fn page_of(
    records: &[AnalysisRecord],
    limit: usize,
    offset: usize,
    user_id: Option<&str>,
) -> HistoryPage {
    let mut matching = records
        .iter()
        .filter(|record| belongs_to(record, user_id))
        .cloned()
        .collect::<Vec<_>>();
    matching.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));

    HistoryPage {
        total: matching.len(),
        records: matching.into_iter().skip(offset).take(limit).collect(),
        limit,
        offset,
    }
}

fn remove_by_id(records: &mut Vec<AnalysisRecord>, id: &str) -> Result<(), StoreError> {
    let position = records
        .iter()
        .position(|record| record.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    records.remove(position);
    Ok(())
}

fn remove_for_user(records: &mut Vec<AnalysisRecord>, user_id: Option<&str>) -> usize {
    let before = records.len();
    records.retain(|record| !belongs_to(record, user_id));
    before - records.len()
}

fn stats_of(records: &[AnalysisRecord], user_id: Option<&str>) -> AnalysisStats {
    let matching = records
        .iter()
        .filter(|record| belongs_to(record, user_id))
        .collect::<Vec<_>>();

    let total = matching.len();
    if total == 0 {
        return AnalysisStats {
            total_analyses: 0,
            success_rate: 0.0,
            avg_processing_time: 0.0,
            total_documents: 0,
        };
    }

    let successful = matching.iter().filter(|record| record.success).count();
    let processing = matching.iter().map(|record| record.processing_time).sum::<u64>();
    let documents = matching
        .iter()
        .map(|record| record.file_name.as_str())
        .collect::<HashSet<_>>();

    AnalysisStats {
        total_analyses: total,
        success_rate: successful as f64 / total as f64 * 100.0,
        avg_processing_time: processing as f64 / total as f64,
        total_documents: documents.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn record(id: &str, file_name: &str, user_id: Option<&str>, age_minutes: i64) -> AnalysisRecord {
        AnalysisRecord {
            id: id.to_string(),
            answer: "answer".to_string(),
            source_chunks: vec!["chunk".to_string()],
            success: id != "failed",
            message: "Analysis completed successfully".to_string(),
            processing_time: 2,
            model: "local".to_string(),
            confidence: 0.5,
            timestamp: Utc::now() - Duration::minutes(age_minutes),
            file_name: file_name.to_string(),
            question: "question".to_string(),
            user_id: user_id.map(str::to_string),
            checksum: "00".to_string(),
        }
    }

    async fn seed(store: &dyn AnalysisStore) -> Result<(), StoreError> {
        store.create(&record("old", "a.pdf", Some("ana"), 30)).await?;
        store.create(&record("new", "b.pdf", Some("ana"), 1)).await?;
        store.create(&record("failed", "a.pdf", Some("bo"), 10)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paged() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryAnalysisStore::new();
        seed(&store).await?;

        let page = store.list(2, 0, None).await?;
        assert_eq!(page.total, 3);
        let ids = page.records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["new", "failed"]);

        let page = store.list(2, 2, None).await?;
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, "old");
        Ok(())
    }

    #[tokio::test]
    async fn user_filter_applies_to_list_and_delete_all() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryAnalysisStore::new();
        seed(&store).await?;

        assert_eq!(store.list(50, 0, Some("bo")).await?.total, 1);
        assert_eq!(store.delete_all(Some("ana")).await?, 2);
        assert_eq!(store.list(50, 0, None).await?.total, 1);
        assert_eq!(store.delete_all(None).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn deleting_unknown_id_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryAnalysisStore::new();
        seed(&store).await?;

        store.delete("old").await?;
        let error = store.delete("old").await.expect_err("second delete should fail");
        assert!(matches!(error, StoreError::NotFound(_)));
        Ok(())
    }

    #[tokio::test]
    async fn stats_count_success_and_unique_documents() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryAnalysisStore::new();
        assert_eq!(store.stats(None).await?.total_analyses, 0);
        seed(&store).await?;

        let stats = store.stats(None).await?;
        assert_eq!(stats.total_analyses, 3);
        assert_eq!(stats.total_documents, 2);
        assert!((stats.success_rate - 200.0 / 3.0).abs() < 1e-9);
        assert!((stats.avg_processing_time - 2.0).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn json_store_survives_reopening() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("history").join("analyses.json");

        {
            let store = JsonFileStore::new(&path);
            assert_eq!(store.list(10, 0, None).await?.total, 0);
            seed(&store).await?;
            store.delete("failed").await?;
        }

        let reopened = JsonFileStore::new(&path);
        let page = reopened.list(10, 0, None).await?;
        assert_eq!(page.total, 2);
        assert_eq!(page.records[0].id, "new");
        assert_eq!(reopened.stats(Some("ana")).await?.success_rate, 100.0);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_json_is_a_serialization_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("analyses.json");
        std::fs::write(&path, b"{ not json")?;

        let store = JsonFileStore::new(&path);
        let error = store.list(10, 0, None).await.expect_err("corrupt file should fail");
        assert!(matches!(error, StoreError::Serialization(_)));
        Ok(())
    }
}
