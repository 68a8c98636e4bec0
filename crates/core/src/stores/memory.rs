use crate::traits::RecordStore;
use crate::{HotwordPeriod, RecordError, SearchHistory, SearchHotword};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// History rows and hotword counters. Shared by the memory and file stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RecordState {
    pub(crate) history: Vec<SearchHistory>,
    pub(crate) hotwords: Vec<SearchHotword>,
}

impl RecordState {
    pub(crate) fn insert_history(&mut self, history: SearchHistory) {
        self.history.push(history);
    }

    pub(crate) fn record_click(
        &mut self,
        tenant_id: i64,
        history_id: Uuid,
        doc_id: &str,
        position: u32,
    ) -> Result<bool, RecordError> {
        let row = self
            .history
            .iter_mut()
            .find(|row| row.id == history_id && row.tenant_id == tenant_id)
            .ok_or(RecordError::NotFound(history_id))?;

        if row.clicked_doc_id.is_some() {
            return Ok(false);
        }
        row.clicked_doc_id = Some(doc_id.to_string());
        row.click_position = Some(position);
        row.clicked_at = Some(Utc::now());
        Ok(true)
    }

    pub(crate) fn list_history(
        &self,
        tenant_id: i64,
        user_id: Option<i64>,
        limit: usize,
    ) -> Vec<SearchHistory> {
        let mut rows: Vec<SearchHistory> = self
            .history
            .iter()
            .filter(|row| row.tenant_id == tenant_id)
            .filter(|row| user_id.map_or(true, |user| row.user_id == user))
            .cloned()
            .collect();
        rows.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        rows.truncate(limit);
        rows
    }

    pub(crate) fn increment_hotword(
        &mut self,
        tenant_id: i64,
        keyword: &str,
        period: HotwordPeriod,
    ) -> u64 {
        match self.hotwords.iter_mut().find(|row| {
            row.tenant_id == tenant_id && row.period == period && row.keyword == keyword
        }) {
            Some(row) => {
                row.search_count += 1;
                row.updated_at = Utc::now();
                row.search_count
            }
            None => {
                self.hotwords
                    .push(SearchHotword::first_seen(tenant_id, keyword, period));
                1
            }
        }
    }

    pub(crate) fn list_hotwords(&self, tenant_id: i64, period: HotwordPeriod) -> Vec<SearchHotword> {
        self.hotwords
            .iter()
            .filter(|row| row.tenant_id == tenant_id && row.period == period)
            .cloned()
            .collect()
    }

    pub(crate) fn save_rankings(
        &mut self,
        tenant_id: i64,
        period: HotwordPeriod,
        ranked: &[SearchHotword],
    ) {
        for update in ranked {
            if let Some(row) = self.hotwords.iter_mut().find(|row| {
                row.tenant_id == tenant_id && row.period == period && row.keyword == update.keyword
            }) {
                row.ranking = update.ranking;
                row.trend = update.trend;
                row.is_new = update.is_new;
                row.updated_at = update.updated_at;
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<RecordState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RecordState> {
        // a panic mid-update leaves plain data behind; keep serving it
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_history(&self, history: SearchHistory) -> Result<(), RecordError> {
        self.state().insert_history(history);
        Ok(())
    }

    async fn record_click(
        &self,
        tenant_id: i64,
        history_id: Uuid,
        doc_id: &str,
        position: u32,
    ) -> Result<bool, RecordError> {
        self.state()
            .record_click(tenant_id, history_id, doc_id, position)
    }

    async fn list_history(
        &self,
        tenant_id: i64,
        user_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<SearchHistory>, RecordError> {
        Ok(self.state().list_history(tenant_id, user_id, limit))
    }

    async fn increment_hotword(
        &self,
        tenant_id: i64,
        keyword: &str,
        period: HotwordPeriod,
    ) -> Result<u64, RecordError> {
        Ok(self.state().increment_hotword(tenant_id, keyword, period))
    }

    async fn list_hotwords(
        &self,
        tenant_id: i64,
        period: HotwordPeriod,
    ) -> Result<Vec<SearchHotword>, RecordError> {
        Ok(self.state().list_hotwords(tenant_id, period))
    }

    async fn save_rankings(
        &self,
        tenant_id: i64,
        period: HotwordPeriod,
        ranked: &[SearchHotword],
    ) -> Result<(), RecordError> {
        self.state().save_rankings(tenant_id, period, ranked);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SearchMode;
    use chrono::Duration;

    fn history(tenant_id: i64, user_id: i64, minutes_ago: i64) -> SearchHistory {
        SearchHistory {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            keyword: Some("roadmap".to_string()),
            mode: SearchMode::Fulltext,
            result_count: 3,
            response_time_ms: 12,
            clicked_doc_id: None,
            click_position: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            clicked_at: None,
        }
    }

    #[tokio::test]
    async fn click_is_recorded_at_most_once() {
        let store = MemoryRecordStore::new();
        let row = history(1, 10, 0);
        let id = row.id;
        store.insert_history(row).await.unwrap();

        assert!(store.record_click(1, id, "doc_4", 2).await.unwrap());
        assert!(!store.record_click(1, id, "doc_9", 1).await.unwrap());

        let rows = store.list_history(1, Some(10), 10).await.unwrap();
        assert_eq!(rows[0].clicked_doc_id.as_deref(), Some("doc_4"));
        assert_eq!(rows[0].click_position, Some(2));
    }

    #[tokio::test]
    async fn click_on_other_tenant_is_not_found() {
        let store = MemoryRecordStore::new();
        let row = history(1, 10, 0);
        let id = row.id;
        store.insert_history(row).await.unwrap();

        assert!(matches!(
            store.record_click(2, id, "doc_4", 1).await,
            Err(RecordError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn history_is_newest_first_and_scoped() {
        let store = MemoryRecordStore::new();
        store.insert_history(history(1, 10, 30)).await.unwrap();
        store.insert_history(history(1, 10, 5)).await.unwrap();
        store.insert_history(history(1, 11, 1)).await.unwrap();
        store.insert_history(history(2, 10, 0)).await.unwrap();

        let mine = store.list_history(1, Some(10), 10).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine[0].created_at > mine[1].created_at);

        let tenant = store.list_history(1, None, 2).await.unwrap();
        assert_eq!(tenant.len(), 2);
        assert_eq!(tenant[0].user_id, 11);
    }

    #[tokio::test]
    async fn hotword_counter_upserts() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.increment_hotword(1, "okr", HotwordPeriod::Daily).await.unwrap(), 1);
        assert_eq!(store.increment_hotword(1, "okr", HotwordPeriod::Daily).await.unwrap(), 2);
        assert_eq!(store.increment_hotword(1, "okr", HotwordPeriod::Weekly).await.unwrap(), 1);
        assert_eq!(store.increment_hotword(2, "okr", HotwordPeriod::Daily).await.unwrap(), 1);

        let daily = store.list_hotwords(1, HotwordPeriod::Daily).await.unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].search_count, 2);
    }
}
