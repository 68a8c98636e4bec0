use crate::stores::memory::RecordState;
use crate::traits::RecordStore;
use crate::{HotwordPeriod, RecordError, SearchHistory, SearchHotword};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Record store persisted as one JSON snapshot, rewritten after every change.
pub struct FileRecordStore {
    path: PathBuf,
    state: Mutex<RecordState>,
}

impl FileRecordStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RecordError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(error) if error.kind() == ErrorKind::NotFound => RecordState::default(),
            Err(error) => return Err(error.into()),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &RecordState) -> Result<(), RecordError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, serde_json::to_vec_pretty(state)?).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    // The change is applied to a copy; memory only moves once the snapshot is on disk.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut RecordState) -> Result<T, RecordError>,
    ) -> Result<T, RecordError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let outcome = change(&mut next)?;
        if next != *state {
            self.persist(&next).await?;
            *state = next;
        }
        Ok(outcome)
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn insert_history(&self, history: SearchHistory) -> Result<(), RecordError> {
        self.commit(|state| {
            state.insert_history(history);
            Ok(())
        })
        .await
    }

    async fn record_click(
        &self,
        tenant_id: i64,
        history_id: Uuid,
        doc_id: &str,
        position: u32,
    ) -> Result<bool, RecordError> {
        self.commit(|state| state.record_click(tenant_id, history_id, doc_id, position))
            .await
    }

    async fn list_history(
        &self,
        tenant_id: i64,
        user_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<SearchHistory>, RecordError> {
        Ok(self.state.lock().await.list_history(tenant_id, user_id, limit))
    }

    async fn increment_hotword(
        &self,
        tenant_id: i64,
        keyword: &str,
        period: HotwordPeriod,
    ) -> Result<u64, RecordError> {
        self.commit(|state| Ok(state.increment_hotword(tenant_id, keyword, period)))
            .await
    }

    async fn list_hotwords(
        &self,
        tenant_id: i64,
        period: HotwordPeriod,
    ) -> Result<Vec<SearchHotword>, RecordError> {
        Ok(self.state.lock().await.list_hotwords(tenant_id, period))
    }

    async fn save_rankings(
        &self,
        tenant_id: i64,
        period: HotwordPeriod,
        ranked: &[SearchHotword],
    ) -> Result<(), RecordError> {
        self.commit(|state| {
            state.save_rankings(tenant_id, period, ranked);
            Ok(())
        })
        .await
    }
}
