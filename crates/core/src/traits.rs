use crate::{
    FulltextQuery, HitPage, HotwordPeriod, RecordError, SearchError, SearchHistory, SearchHit,
    SearchHotword, VectorQuery,
};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait FulltextIndex {
    async fn search_fulltext(&self, query: &FulltextQuery) -> Result<HitPage, SearchError>;
}

#[async_trait]
pub trait VectorIndex {
    async fn search_vector(&self, query: &VectorQuery<'_>) -> Result<Vec<SearchHit>, SearchError>;
}

#[async_trait]
pub trait Embedder {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;
}

#[async_trait]
impl Embedder for Box<dyn Embedder + Send + Sync> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        (**self).embed(text).await
    }
}

/// Persistence for search history rows and hotword counters.
#[async_trait]
pub trait RecordStore {
    async fn insert_history(&self, history: SearchHistory) -> Result<(), RecordError>;

    /// Stores click feedback once. Returns `false` when the row already has a click.
    async fn record_click(
        &self,
        tenant_id: i64,
        history_id: Uuid,
        doc_id: &str,
        position: u32,
    ) -> Result<bool, RecordError>;

    async fn list_history(
        &self,
        tenant_id: i64,
        user_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<SearchHistory>, RecordError>;

    /// Upserts the counter and returns the new count.
    async fn increment_hotword(
        &self,
        tenant_id: i64,
        keyword: &str,
        period: HotwordPeriod,
    ) -> Result<u64, RecordError>;

    async fn list_hotwords(
        &self,
        tenant_id: i64,
        period: HotwordPeriod,
    ) -> Result<Vec<SearchHotword>, RecordError>;

    /// Writes `ranking`, `trend` and `is_new` of re-ranked rows. Counts are left as stored.
    async fn save_rankings(
        &self,
        tenant_id: i64,
        period: HotwordPeriod,
        ranked: &[SearchHotword],
    ) -> Result<(), RecordError>;
}
