use crate::config::SearchSettings;
use crate::fusion::{paginate, RrfFusion};
use crate::recorder::SearchRecorder;
use crate::traits::{Embedder, FulltextIndex, VectorIndex};
use crate::{
    FulltextQuery, HitPage, SearchError, SearchHistory, SearchHit, SearchMode, SearchRequest,
    SearchResponse, VectorQuery,
};
use chrono::Utc;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

const FULLTEXT: &str = "fulltext index";
const VECTOR: &str = "vector index";
const EMBEDDING: &str = "embedder";

pub struct SearchOrchestrator<F, V, E>
where
    F: FulltextIndex,
    V: VectorIndex,
    E: Embedder,
{
    fulltext: F,
    vector: V,
    embedder: E,
    fusion: RrfFusion,
    settings: SearchSettings,
    recorder: Option<SearchRecorder>,
}

/// A validated request with defaults applied.
#[derive(Debug)]
struct Plan<'a> {
    mode: SearchMode,
    keyword: Option<&'a str>,
    page: u32,
    size: u32,
}

impl<F, V, E> SearchOrchestrator<F, V, E>
where
    F: FulltextIndex + Send + Sync,
    V: VectorIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(
        fulltext: F,
        vector: V,
        embedder: E,
        settings: SearchSettings,
    ) -> Result<Self, SearchError> {
        settings.validate()?;
        Ok(Self {
            fulltext,
            vector,
            embedder,
            fusion: RrfFusion::new(settings.rrf_k),
            settings,
            recorder: None,
        })
    }

    pub fn with_recorder(mut self, recorder: SearchRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Runs one search. Provider failures and timeouts degrade to empty
    /// sources; only a malformed request is returned as an error.
    pub async fn search(
        &self,
        tenant_id: i64,
        user_id: Option<i64>,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let plan = self.plan(tenant_id, request)?;
        debug!(tenant_id, mode = %plan.mode, page = plan.page, size = plan.size, "dispatching search");

        let mut response = match plan.mode {
            SearchMode::Fulltext => {
                let keyword = plan.keyword.unwrap_or_default();
                let query = FulltextQuery {
                    tenant_id,
                    keyword: keyword.to_string(),
                    types: request.types.clone(),
                    page: plan.page,
                    size: plan.size,
                };
                let found = absorb(FULLTEXT, self.fulltext_page(&query).await);
                SearchResponse::new(found.hits, found.total, plan.page, plan.size)
            }
            SearchMode::Semantic => {
                let keyword = plan.keyword.unwrap_or_default();
                let hits = self
                    .semantic_hits(
                        tenant_id,
                        keyword,
                        &request.types,
                        self.candidate_window(plan.page, plan.size),
                        request.min_score.unwrap_or(self.settings.semantic_min_score),
                    )
                    .await;
                local_page(absorb(VECTOR, hits), plan.page, plan.size)
            }
            SearchMode::Vector => {
                let top_k = self.candidate_window(plan.page, plan.size);
                let min_score = request.min_score.unwrap_or(0.0);
                let hits = match request.query_vector.as_deref().filter(|v| !v.is_empty()) {
                    Some(vector) => {
                        self.vector_hits(tenant_id, vector, &request.types, top_k, min_score)
                            .await
                    }
                    None => {
                        let keyword = plan.keyword.unwrap_or_default();
                        self.semantic_hits(tenant_id, keyword, &request.types, top_k, min_score)
                            .await
                    }
                };
                local_page(absorb(VECTOR, hits), plan.page, plan.size)
            }
            SearchMode::Hybrid => {
                let keyword = plan.keyword.unwrap_or_default();
                let window = self.candidate_window(plan.page, plan.size);
                let query = FulltextQuery {
                    tenant_id,
                    keyword: keyword.to_string(),
                    types: request.types.clone(),
                    page: 1,
                    size: window as u32,
                };
                let min_score = request.min_score.unwrap_or(self.settings.semantic_min_score);

                let (fulltext, semantic) = tokio::join!(
                    self.fulltext_page(&query),
                    self.semantic_hits(tenant_id, keyword, &request.types, window, min_score)
                );
                let fulltext = absorb(FULLTEXT, fulltext.map(|found| found.hits));
                let semantic = absorb(VECTOR, semantic);

                let fused = self.fusion.merge(fulltext, semantic, plan.page, plan.size);
                SearchResponse::new(fused.hits, fused.total, plan.page, plan.size)
            }
        };

        response.took = started.elapsed().as_millis() as u64;
        self.record(tenant_id, user_id, request, &plan, &mut response);
        debug!(tenant_id, total = response.total, took = response.took, "search finished");
        Ok(response)
    }

    /// Full-text search with provider errors surfaced.
    pub async fn fulltext_search(
        &self,
        tenant_id: i64,
        keyword: &str,
        types: &[String],
        page: u32,
        size: u32,
    ) -> Result<SearchResponse, SearchError> {
        let page = page.max(1);
        let query = FulltextQuery {
            tenant_id,
            keyword: keyword.trim().to_string(),
            types: types.to_vec(),
            page,
            size,
        };
        let found = self.fulltext_page(&query).await?;
        Ok(SearchResponse::new(found.hits, found.total, page, size))
    }

    /// Nearest-neighbour search with provider errors surfaced. `total` is
    /// bounded by `top_k`.
    pub async fn vector_search(
        &self,
        tenant_id: i64,
        vector: &[f32],
        types: &[String],
        top_k: usize,
        min_score: f64,
    ) -> Result<SearchResponse, SearchError> {
        let hits = self
            .vector_hits(tenant_id, vector, types, top_k, min_score)
            .await?;
        let total = hits.len() as u64;
        Ok(SearchResponse::new(hits, total, 1, top_k as u32))
    }

    /// Embeds `query_text` and runs [`Self::vector_search`] with the configured
    /// semantic threshold.
    pub async fn semantic_search(
        &self,
        tenant_id: i64,
        query_text: &str,
        types: &[String],
        top_k: usize,
    ) -> Result<SearchResponse, SearchError> {
        let vector = self
            .bounded(EMBEDDING, self.embedder.embed(query_text))
            .await?;
        self.vector_search(
            tenant_id,
            &vector,
            types,
            top_k,
            self.settings.semantic_min_score,
        )
        .await
    }

    fn plan<'a>(&self, tenant_id: i64, request: &'a SearchRequest) -> Result<Plan<'a>, SearchError> {
        if tenant_id <= 0 {
            return Err(SearchError::InvalidRequest(format!(
                "tenant id must be positive, got {tenant_id}"
            )));
        }

        let mode = request.mode.unwrap_or_default();
        let keyword = request.trimmed_keyword();
        if mode.requires_keyword() && keyword.is_none() {
            return Err(SearchError::InvalidRequest(format!(
                "keyword is required for {mode} search"
            )));
        }
        if mode == SearchMode::Vector
            && keyword.is_none()
            && request.query_vector.as_ref().map_or(true, Vec::is_empty)
        {
            return Err(SearchError::InvalidRequest(
                "vector search needs a query vector or a keyword to embed".to_string(),
            ));
        }

        Ok(Plan {
            mode,
            keyword,
            page: request.page.unwrap_or(self.settings.default_page).max(1),
            size: request
                .size
                .unwrap_or(self.settings.default_size)
                .clamp(1, self.settings.max_size),
        })
    }

    /// Candidates fetched per source so that `page` can be cut from a ranking
    /// computed locally.
    fn candidate_window(&self, page: u32, size: u32) -> usize {
        let wanted = (page as usize).saturating_mul(size as usize);
        wanted.min(self.settings.max_candidates).max(size as usize)
    }

    async fn fulltext_page(&self, query: &FulltextQuery) -> Result<HitPage, SearchError> {
        self.bounded(FULLTEXT, self.fulltext.search_fulltext(query))
            .await
    }

    async fn vector_hits(
        &self,
        tenant_id: i64,
        vector: &[f32],
        types: &[String],
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let query = VectorQuery {
            tenant_id,
            vector,
            types,
            top_k,
            min_score,
        };
        let hits = self.bounded(VECTOR, self.vector.search_vector(&query)).await?;
        Ok(retain_min_score(hits, min_score))
    }

    async fn semantic_hits(
        &self,
        tenant_id: i64,
        text: &str,
        types: &[String],
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let vector = self.bounded(EMBEDDING, self.embedder.embed(text)).await?;
        self.vector_hits(tenant_id, &vector, types, top_k, min_score)
            .await
    }

    async fn bounded<T>(
        &self,
        backend: &'static str,
        call: impl Future<Output = Result<T, SearchError>>,
    ) -> Result<T, SearchError> {
        let limit = self.settings.provider_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout {
                backend: backend.to_string(),
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }

    fn record(
        &self,
        tenant_id: i64,
        user_id: Option<i64>,
        request: &SearchRequest,
        plan: &Plan<'_>,
        response: &mut SearchResponse,
    ) {
        let Some(recorder) = &self.recorder else {
            return;
        };

        if let (true, Some(user_id)) = (request.record_history, user_id) {
            let history = SearchHistory {
                id: Uuid::new_v4(),
                tenant_id,
                user_id,
                keyword: plan.keyword.map(str::to_string),
                mode: plan.mode,
                result_count: response.total,
                response_time_ms: response.took,
                clicked_doc_id: None,
                click_position: None,
                created_at: Utc::now(),
                clicked_at: None,
            };
            response.history_id = Some(history.id);
            recorder.record_search_history(history);
        }

        if let Some(keyword) = plan.keyword {
            recorder.update_hotword_stats(tenant_id, keyword);
        }
    }
}

/// Similarity threshold applied after the provider answers.
pub fn retain_min_score(mut hits: Vec<SearchHit>, min_score: f64) -> Vec<SearchHit> {
    hits.retain(|hit| hit.score >= min_score);
    hits
}

fn local_page(hits: Vec<SearchHit>, page: u32, size: u32) -> SearchResponse {
    let total = hits.len() as u64;
    SearchResponse::new(paginate(hits, page, size), total, page, size)
}

fn absorb<T: Default>(backend: &'static str, result: Result<T, SearchError>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            warn!(backend, %error, "search provider failed, treating source as empty");
            T::default()
        }
    }
}
