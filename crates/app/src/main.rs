use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use hybrid_search_core::{
    refresh_hotword_ranking, top_hotwords, CharacterNgramEmbedder, ElasticsearchStore, Embedder,
    FileRecordStore, HotwordPeriod, HttpEmbedder, MilvusStore, RecordStore, SearchMode,
    SearchOrchestrator, SearchRecorder, SearchRequest, SearchSettings,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

type DynEmbedder = Box<dyn Embedder + Send + Sync>;
type Orchestrator = SearchOrchestrator<ElasticsearchStore, MilvusStore, DynEmbedder>;

#[derive(Parser)]
#[command(name = "hybrid-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    providers: ProviderArgs,

    /// JSON settings file; flags below override its values.
    #[arg(long, env = "HYBRID_SEARCH_SETTINGS")]
    settings: Option<PathBuf>,

    /// RRF damping constant
    #[arg(long, env = "HYBRID_SEARCH_RRF_K")]
    rrf_k: Option<f64>,

    /// Per-provider call timeout in milliseconds
    #[arg(long, env = "HYBRID_SEARCH_PROVIDER_TIMEOUT_MS")]
    provider_timeout_ms: Option<u64>,

    /// File holding search history and hotword counters
    #[arg(long, env = "HYBRID_SEARCH_STATE_FILE", default_value = "search-records.json")]
    state_file: PathBuf,
}

#[derive(Args)]
struct ProviderArgs {
    /// Elasticsearch base URL
    #[arg(long, env = "HYBRID_SEARCH_ES_URL", default_value = "http://localhost:9200")]
    elasticsearch_url: String,

    /// Elasticsearch index name
    #[arg(long, env = "HYBRID_SEARCH_ES_INDEX", default_value = "search_documents")]
    elasticsearch_index: String,

    /// Milvus REST base URL
    #[arg(long, env = "HYBRID_SEARCH_MILVUS_URL", default_value = "http://localhost:19530")]
    milvus_url: String,

    /// Milvus collection
    #[arg(long, env = "HYBRID_SEARCH_MILVUS_COLLECTION", default_value = "search_documents")]
    milvus_collection: String,

    /// Milvus bearer token
    #[arg(long, env = "HYBRID_SEARCH_MILVUS_TOKEN")]
    milvus_token: Option<String>,

    /// OpenAI-compatible embeddings base URL; the local n-gram embedder is used when unset
    #[arg(long, env = "HYBRID_SEARCH_EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Embedding model name
    #[arg(long, env = "HYBRID_SEARCH_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Embedding API key
    #[arg(long, env = "HYBRID_SEARCH_EMBEDDING_API_KEY")]
    embedding_api_key: Option<String>,

    /// Embedding dimension of the collection
    #[arg(long, env = "HYBRID_SEARCH_EMBEDDING_DIMENSIONS", default_value = "128")]
    embedding_dimensions: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Run one search and print the response envelope.
    Search {
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        user: Option<i64>,
        #[arg(long)]
        keyword: Option<String>,
        /// fulltext, semantic, vector or hybrid
        #[arg(long, default_value = "fulltext")]
        mode: SearchMode,
        /// Document types to keep, comma separated.
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
        /// Precomputed query vector, comma separated.
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        vector: Vec<f32>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        size: Option<u32>,
        #[arg(long)]
        min_score: Option<f64>,
        /// Store a history row for this search (needs --user).
        #[arg(long, default_value_t = false)]
        record_history: bool,
    },
    /// Report which result of a recorded search was opened.
    Click {
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        history_id: Uuid,
        #[arg(long)]
        doc_id: String,
        #[arg(long)]
        position: u32,
    },
    /// List recorded searches, newest first.
    History {
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        user: Option<i64>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// List hotwords for a period.
    Hotwords {
        #[arg(long)]
        tenant: i64,
        #[arg(long, default_value = "daily")]
        period: HotwordPeriod,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Recompute hotword ranking and trend.
    RefreshHotwords {
        #[arg(long)]
        tenant: i64,
        #[arg(long, default_value = "daily")]
        period: HotwordPeriod,
    },
    /// Create the Elasticsearch index mapping if it does not exist.
    EnsureIndex,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli).await?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "hybrid-search boot"
    );

    let store = Arc::new(FileRecordStore::open(&cli.state_file).await?);

    match cli.command {
        Command::Search {
            tenant,
            user,
            keyword,
            mode,
            types,
            vector,
            page,
            size,
            min_score,
            record_history,
        } => {
            let (recorder, worker) =
                SearchRecorder::spawn(store.clone(), settings.recorder_queue_capacity);
            let orchestrator = build_orchestrator(&cli.providers, settings)?.with_recorder(recorder);

            let request = SearchRequest {
                keyword,
                query_vector: (!vector.is_empty()).then_some(vector),
                types,
                mode: Some(mode),
                page,
                size,
                min_score,
                record_history,
            };
            if record_history && user.is_none() {
                warn!("--record-history has no effect without --user");
            }

            let response = orchestrator.search(tenant, user, &request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);

            // let queued history and hotword writes land before exit
            drop(orchestrator);
            worker.await?;
        }
        Command::Click {
            tenant,
            history_id,
            doc_id,
            position,
        } => {
            let updated = store
                .record_click(tenant, history_id, &doc_id, position)
                .await?;
            println!(
                "{}",
                json!({ "historyId": history_id, "updated": updated })
            );
        }
        Command::History {
            tenant,
            user,
            limit,
        } => {
            let rows = store.list_history(tenant, user, limit).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Hotwords {
            tenant,
            period,
            limit,
        } => {
            let rows = top_hotwords(store.as_ref(), tenant, period, limit).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::RefreshHotwords { tenant, period } => {
            let rows = refresh_hotword_ranking(store.as_ref(), tenant, period).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::EnsureIndex => {
            let index = ElasticsearchStore::new(
                &cli.providers.elasticsearch_url,
                &cli.providers.elasticsearch_index,
                settings.provider_timeout,
            )?;
            index.ensure_index().await?;
            println!("index {} ready", cli.providers.elasticsearch_index);
        }
    }

    Ok(())
}

async fn load_settings(cli: &Cli) -> anyhow::Result<SearchSettings> {
    let mut settings = match &cli.settings {
        Some(path) => SearchSettings::from_json_file(path).await?,
        None => SearchSettings::default(),
    };
    if let Some(rrf_k) = cli.rrf_k {
        settings.rrf_k = rrf_k;
    }
    if let Some(timeout_ms) = cli.provider_timeout_ms {
        settings.provider_timeout = std::time::Duration::from_millis(timeout_ms);
    }
    settings.validate()?;
    Ok(settings)
}

fn build_orchestrator(
    providers: &ProviderArgs,
    settings: SearchSettings,
) -> anyhow::Result<Orchestrator> {
    let timeout = settings.provider_timeout;
    let fulltext = ElasticsearchStore::new(
        &providers.elasticsearch_url,
        &providers.elasticsearch_index,
        timeout,
    )?;
    let vector = MilvusStore::new(
        &providers.milvus_url,
        &providers.milvus_collection,
        providers.embedding_dimensions,
        timeout,
    )?
    .with_token(providers.milvus_token.clone());

    let embedder: DynEmbedder = match &providers.embedding_url {
        Some(url) => Box::new(
            HttpEmbedder::new(
                url,
                &providers.embedding_model,
                providers.embedding_dimensions,
                timeout,
            )?
            .with_api_key(providers.embedding_api_key.clone()),
        ),
        None => Box::new(CharacterNgramEmbedder {
            dimensions: providers.embedding_dimensions,
        }),
    };

    Ok(SearchOrchestrator::new(fulltext, vector, embedder, settings)?)
}
