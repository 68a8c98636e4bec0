use crate::traits::RecordStore;
use crate::{HotwordPeriod, RecordError, SearchHistory, SearchHotword, Trend};
use chrono::Utc;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordTask {
    History(SearchHistory),
    Hotword { tenant_id: i64, keyword: String },
}

#[derive(Debug, Clone)]
pub struct SearchRecorder {
    sender: mpsc::Sender<RecordTask>,
}

impl SearchRecorder {
    /// Starts the worker. It exits once every recorder clone is dropped and the
    /// queue is drained.
    pub fn spawn<S>(store: Arc<S>, capacity: usize) -> (Self, JoinHandle<()>)
    where
        S: RecordStore + Send + Sync + 'static,
    {
        let (sender, mut receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(task) = receiver.recv().await {
                if let Err(error) = apply(store.as_ref(), &task).await {
                    warn!(%error, task = ?task, "search record task failed");
                }
            }
            debug!("search recorder stopped");
        });
        (Self { sender }, worker)
    }

    pub fn record_search_history(&self, history: SearchHistory) {
        self.enqueue(RecordTask::History(history));
    }

    pub fn update_hotword_stats(&self, tenant_id: i64, keyword: &str) {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return;
        }
        self.enqueue(RecordTask::Hotword {
            tenant_id,
            keyword: keyword.to_string(),
        });
    }

    fn enqueue(&self, task: RecordTask) {
        match self.sender.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) => {
                warn!(task = ?task, "search recorder queue full, dropping task");
            }
            Err(TrySendError::Closed(task)) => {
                warn!(task = ?task, "search recorder stopped, dropping task");
            }
        }
    }
}

async fn apply<S>(store: &S, task: &RecordTask) -> Result<(), RecordError>
where
    S: RecordStore + ?Sized,
{
    match task {
        RecordTask::History(history) => store.insert_history(history.clone()).await,
        RecordTask::Hotword { tenant_id, keyword } => store
            .increment_hotword(*tenant_id, keyword, HotwordPeriod::Daily)
            .await
            .map(|count| debug!(tenant_id = *tenant_id, keyword = %keyword, count, "hotword counted")),
    }
}

/// Positional ranking 1..N by count desc, keyword asc. Equal counts get
/// distinct ranks, unlike SQL `DENSE_RANK`. Trend compares against the
/// previously stored rank.
pub fn rank_hotwords(mut rows: Vec<SearchHotword>) -> Vec<SearchHotword> {
    rows.sort_by(|left, right| match right.search_count.cmp(&left.search_count) {
        Ordering::Equal => left.keyword.cmp(&right.keyword),
        other => other,
    });

    let now = Utc::now();
    rows.into_iter()
        .enumerate()
        .map(|(position, mut row)| {
            let rank = position as u32 + 1;
            let (trend, is_new) = match row.ranking {
                None => (Trend::Stable, true),
                Some(previous) if rank < previous => (Trend::Up, false),
                Some(previous) if rank > previous => (Trend::Down, false),
                Some(_) => (Trend::Stable, false),
            };
            row.ranking = Some(rank);
            row.trend = trend;
            row.is_new = is_new;
            row.updated_at = now;
            row
        })
        .collect()
}

/// Batch re-rank of a tenant's hotwords for one period.
pub async fn refresh_hotword_ranking<S>(
    store: &S,
    tenant_id: i64,
    period: HotwordPeriod,
) -> Result<Vec<SearchHotword>, RecordError>
where
    S: RecordStore + ?Sized,
{
    let ranked = rank_hotwords(store.list_hotwords(tenant_id, period).await?);
    store.save_rankings(tenant_id, period, &ranked).await?;
    info!(tenant_id, %period, count = ranked.len(), "hotword ranking refreshed");
    Ok(ranked)
}

/// Hotwords for suggestions: ranked rows first by rank, then unranked rows by count.
pub async fn top_hotwords<S>(
    store: &S,
    tenant_id: i64,
    period: HotwordPeriod,
    limit: usize,
) -> Result<Vec<SearchHotword>, RecordError>
where
    S: RecordStore + ?Sized,
{
    let mut rows = store.list_hotwords(tenant_id, period).await?;
    rows.sort_by(|left, right| match (left.ranking, right.ranking) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => right
            .search_count
            .cmp(&left.search_count)
            .then_with(|| left.keyword.cmp(&right.keyword)),
    });
    rows.truncate(limit);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryRecordStore;
    use crate::SearchMode;
    use uuid::Uuid;

    fn counted(keyword: &str, count: u64, ranking: Option<u32>) -> SearchHotword {
        SearchHotword {
            search_count: count,
            ranking,
            is_new: ranking.is_none(),
            ..SearchHotword::first_seen(1, keyword, HotwordPeriod::Daily)
        }
    }

    fn history(tenant_id: i64) -> SearchHistory {
        SearchHistory {
            id: Uuid::new_v4(),
            tenant_id,
            user_id: 9,
            keyword: Some("sprint".to_string()),
            mode: SearchMode::Hybrid,
            result_count: 4,
            response_time_ms: 20,
            clicked_doc_id: None,
            click_position: None,
            created_at: Utc::now(),
            clicked_at: None,
        }
    }

    #[test]
    fn ranking_assigns_positions_and_trends() {
        let ranked = rank_hotwords(vec![
            counted("alpha", 5, Some(1)),
            counted("beta", 9, Some(2)),
            counted("gamma", 1, Some(3)),
            counted("delta", 7, None),
        ]);

        let view: Vec<_> = ranked
            .iter()
            .map(|row| (row.keyword.as_str(), row.ranking, row.trend, row.is_new))
            .collect();
        assert_eq!(
            view,
            vec![
                ("beta", Some(1), Trend::Up, false),
                ("delta", Some(2), Trend::Stable, true),
                ("alpha", Some(3), Trend::Down, false),
                ("gamma", Some(4), Trend::Down, false),
            ]
        );
    }

    #[test]
    fn equal_counts_rank_alphabetically() {
        let ranked = rank_hotwords(vec![counted("zeta", 3, Some(1)), counted("eta", 3, Some(2))]);
        assert_eq!(ranked[0].keyword, "eta");
        assert_eq!(ranked[0].trend, Trend::Up);
        assert_eq!(ranked[1].trend, Trend::Down);
    }

    #[tokio::test]
    async fn worker_drains_queue_before_stopping() {
        let store = Arc::new(MemoryRecordStore::new());
        let (recorder, worker) = SearchRecorder::spawn(store.clone(), 16);

        recorder.record_search_history(history(3));
        recorder.update_hotword_stats(3, "  sprint ");
        recorder.update_hotword_stats(3, "sprint");
        recorder.update_hotword_stats(3, "   ");
        drop(recorder);
        worker.await.unwrap();

        assert_eq!(store.list_history(3, None, 10).await.unwrap().len(), 1);
        let hotwords = store.list_hotwords(3, HotwordPeriod::Daily).await.unwrap();
        assert_eq!(hotwords.len(), 1);
        assert_eq!(hotwords[0].keyword, "sprint");
        assert_eq!(hotwords[0].search_count, 2);
    }

    #[tokio::test]
    async fn enqueue_after_worker_stopped_does_not_panic() {
        let store = Arc::new(MemoryRecordStore::new());
        let (recorder, worker) = SearchRecorder::spawn(store, 1);
        worker.abort();
        let _ = worker.await;

        recorder.update_hotword_stats(1, "late");
        recorder.record_search_history(history(1));
    }

    #[tokio::test]
    async fn refresh_persists_rank_and_keeps_counts() {
        let store = MemoryRecordStore::new();
        for _ in 0..3 {
            store.increment_hotword(1, "okr", HotwordPeriod::Daily).await.unwrap();
        }
        store.increment_hotword(1, "roadmap", HotwordPeriod::Daily).await.unwrap();

        let first = refresh_hotword_ranking(&store, 1, HotwordPeriod::Daily).await.unwrap();
        assert_eq!(first[0].keyword, "okr");
        assert!(first.iter().all(|row| row.is_new));

        for _ in 0..5 {
            store.increment_hotword(1, "roadmap", HotwordPeriod::Daily).await.unwrap();
        }
        refresh_hotword_ranking(&store, 1, HotwordPeriod::Daily).await.unwrap();

        let top = top_hotwords(&store, 1, HotwordPeriod::Daily, 10).await.unwrap();
        assert_eq!(top[0].keyword, "roadmap");
        assert_eq!(top[0].search_count, 6);
        assert_eq!(top[0].trend, Trend::Up);
        assert!(!top[0].is_new);
        assert_eq!(top[1].trend, Trend::Down);
    }

    #[tokio::test]
    async fn unranked_hotwords_follow_ranked_ones() {
        let store = MemoryRecordStore::new();
        store.increment_hotword(1, "okr", HotwordPeriod::Daily).await.unwrap();
        refresh_hotword_ranking(&store, 1, HotwordPeriod::Daily).await.unwrap();
        for _ in 0..4 {
            store.increment_hotword(1, "fresh", HotwordPeriod::Daily).await.unwrap();
        }

        let top = top_hotwords(&store, 1, HotwordPeriod::Daily, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].keyword, "okr");
    }
}
