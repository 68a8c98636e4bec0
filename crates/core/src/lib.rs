pub mod config;
pub mod embeddings;
pub mod error;
pub mod fusion;
pub mod models;
pub mod orchestrator;
pub mod recorder;
pub mod stores;
pub mod traits;

pub use config::{SearchSettings, DEFAULT_RRF_K, DEFAULT_SEMANTIC_MIN_SCORE};
pub use embeddings::{CharacterNgramEmbedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{RecordError, SearchError};
pub use fusion::{FusedPage, RrfFusion};
pub use models::{
    FulltextQuery, HitPage, HotwordPeriod, SearchHistory, SearchHit, SearchHotword, SearchMode,
    SearchRequest, SearchResponse, Trend, VectorQuery,
};
pub use orchestrator::SearchOrchestrator;
pub use recorder::{
    rank_hotwords, refresh_hotword_ranking, top_hotwords, RecordTask, SearchRecorder,
};
pub use stores::{ElasticsearchStore, FileRecordStore, MemoryRecordStore, MilvusStore};
pub use traits::{Embedder, FulltextIndex, RecordStore, VectorIndex};
