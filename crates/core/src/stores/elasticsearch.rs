use crate::stores::hit_from_fields;
use crate::traits::FulltextIndex;
use crate::{FulltextQuery, HitPage, SearchError};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const HIGHLIGHT_PRE_TAG: &str = "<em>";
pub const HIGHLIGHT_POST_TAG: &str = "</em>";
pub const CONTENT_FRAGMENT_SIZE: u32 = 150;

const SEARCH_FIELDS: [&str; 4] = ["title^3", "content", "tags^2", "summary^2"];

pub struct ElasticsearchStore {
    client: Arc<Client>,
    endpoint: Url,
    index_name: String,
}

impl ElasticsearchStore {
    pub fn new(
        endpoint: &str,
        index_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            client: Arc::new(Client::builder().timeout(timeout).build()?),
            endpoint: Url::parse(endpoint.trim_end_matches('/'))?,
            index_name: index_name.into(),
        })
    }

    fn index_url(&self, suffix: &str) -> String {
        format!(
            "{}/{}{}",
            self.endpoint.as_str().trim_end_matches('/'),
            self.index_name,
            suffix
        )
    }

    pub async fn ensure_index(&self) -> Result<(), SearchError> {
        let response = self.client.head(self.index_url("")).send().await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(self.index_url(""))
            .json(&json!({
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0
                },
                "mappings": {
                    "properties": {
                        "tenant_id": {"type": "long"},
                        "type": {"type": "keyword"},
                        "business_id": {"type": "long"},
                        "title": {"type": "text"},
                        "content": {"type": "text"},
                        "summary": {"type": "text"},
                        "tags": {"type": "text", "fields": {"raw": {"type": "keyword"}}},
                        "creator_id": {"type": "long"},
                        "created_at": {"type": "date"},
                        "updated_at": {"type": "date"},
                        "metadata": {"type": "object", "enabled": false}
                    }
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: format!("index setup failed with {}", response.status()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl FulltextIndex for ElasticsearchStore {
    async fn search_fulltext(&self, query: &FulltextQuery) -> Result<HitPage, SearchError> {
        let response = self
            .client
            .post(self.index_url("/_search"))
            .json(&build_fulltext_body(query))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let response_json: Value = response.json().await?;
        parse_fulltext_response(&response_json)
    }
}

pub fn build_fulltext_body(query: &FulltextQuery) -> Value {
    let mut filters = vec![json!({"term": {"tenant_id": query.tenant_id}})];
    if !query.types.is_empty() {
        filters.push(json!({"terms": {"type": query.types}}));
    }

    let mut bool_query = json!({ "filter": filters });
    let keyword = query.keyword.trim();
    if !keyword.is_empty() {
        bool_query["must"] = json!([
            {
                "multi_match": {
                    "query": keyword,
                    "fields": SEARCH_FIELDS,
                    "fuzziness": "AUTO"
                }
            }
        ]);
    }

    json!({
        "from": query.offset(),
        "size": query.size,
        "track_total_hits": true,
        "query": { "bool": bool_query },
        "sort": [{"_score": {"order": "desc"}}],
        "highlight": {
            "pre_tags": [HIGHLIGHT_PRE_TAG],
            "post_tags": [HIGHLIGHT_POST_TAG],
            "fields": {
                "title": {"number_of_fragments": 0},
                "content": {
                    "fragment_size": CONTENT_FRAGMENT_SIZE,
                    "number_of_fragments": 1
                }
            }
        }
    })
}

pub fn parse_fulltext_response(body: &Value) -> Result<HitPage, SearchError> {
    let raw_hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "elasticsearch".to_string(),
            details: "response has no hits.hits array".to_string(),
        })?;

    // 7.x+ reports {"value": n}; older clusters report a bare number.
    let total = body
        .pointer("/hits/total/value")
        .or_else(|| body.pointer("/hits/total"))
        .and_then(Value::as_u64)
        .unwrap_or(raw_hits.len() as u64);

    let hits = raw_hits
        .iter()
        .map(|raw| {
            let id = raw
                .pointer("/_id")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let score = raw.pointer("/_score").and_then(Value::as_f64).unwrap_or(0.0);
            let mut hit = hit_from_fields(id, score, raw.get("_source").unwrap_or(&Value::Null));
            hit.highlight_title = first_fragment(raw, "title");
            hit.highlight_content = first_fragment(raw, "content");
            hit
        })
        .collect();

    Ok(HitPage { hits, total })
}

fn first_fragment(raw: &Value, field: &str) -> Option<String> {
    raw.get("highlight")
        .and_then(|highlight| highlight.get(field))
        .and_then(Value::as_array)
        .and_then(|fragments| fragments.first())
        .and_then(Value::as_str)
        .map(str::to_string)
}
