use crate::traits::Embedder;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Deterministic hashed trigram embedder for offline use and tests.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions()];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        Ok(self.embed_text(text))
    }
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let base = Url::parse(endpoint.trim_end_matches('/'))?;
        let endpoint = Url::parse(&format!("{}/embeddings", base.as_str().trim_end_matches('/')))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            api_key: None,
            dimensions,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "model": self.model, "input": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "embedding".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        let vector = parse_embedding_response(&body)?;
        if vector.len() != self.dimensions {
            return Err(SearchError::Embedding(format!(
                "model returned {} dimensions, expected {}",
                vector.len(),
                self.dimensions
            )));
        }
        Ok(vector)
    }
}

pub fn parse_embedding_response(body: &Value) -> Result<Vec<f32>, SearchError> {
    let values = body
        .pointer("/data/0/embedding")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "embedding".to_string(),
            details: "response has no data[0].embedding".to_string(),
        })?;

    values
        .iter()
        .map(|value| {
            value.as_f64().map(|v| v as f32).ok_or_else(|| {
                SearchError::Embedding(format!("non-numeric embedding component {value}"))
            })
        })
        .collect()
}
