use crate::stores::hit_from_fields;
use crate::traits::VectorIndex;
use crate::{SearchError, SearchHit, VectorQuery};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub const OUTPUT_FIELDS: [&str; 10] = [
    "id",
    "type",
    "business_id",
    "title",
    "summary",
    "tags",
    "creator_id",
    "created_at",
    "updated_at",
    "metadata",
];

pub struct MilvusStore {
    endpoint: Url,
    collection: String,
    client: Client,
    token: Option<String>,
    vector_field: String,
    vector_size: usize,
}

impl MilvusStore {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        vector_size: usize,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            endpoint: Url::parse(endpoint.trim_end_matches('/'))?,
            collection: collection.into(),
            client: Client::builder().timeout(timeout).build()?,
            token: None,
            vector_field: "embedding".to_string(),
            vector_size,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_vector_field(mut self, field: impl Into<String>) -> Self {
        self.vector_field = field.into();
        self
    }

    pub fn vector_size(&self) -> usize {
        self.vector_size
    }
}

#[async_trait]
impl VectorIndex for MilvusStore {
    async fn search_vector(&self, query: &VectorQuery<'_>) -> Result<Vec<SearchHit>, SearchError> {
        if query.vector.len() != self.vector_size {
            return Err(SearchError::InvalidRequest(format!(
                "query vector dim {} is not {}",
                query.vector.len(),
                self.vector_size
            )));
        }

        let mut request = self
            .client
            .post(format!(
                "{}/v2/vectordb/entities/search",
                self.endpoint.as_str().trim_end_matches('/')
            ))
            .json(&build_vector_body(&self.collection, &self.vector_field, query));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "milvus".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_vector_response(&parsed)
    }
}

/// Milvus boolean filter expression for tenant scope plus an optional type list.
pub fn build_filter_expression(tenant_id: i64, types: &[String]) -> String {
    let mut expression = format!("tenant_id == {tenant_id}");
    if !types.is_empty() {
        let quoted = types
            .iter()
            .map(|doc_type| format!("\"{}\"", doc_type.replace('\\', "\\\\").replace('"', "\\\"")))
            .collect::<Vec<_>>()
            .join(",");
        expression.push_str(&format!(" and type in [{quoted}]"));
    }
    expression
}

pub fn build_vector_body(collection: &str, vector_field: &str, query: &VectorQuery<'_>) -> Value {
    json!({
        "collectionName": collection,
        "data": [query.vector],
        "annsField": vector_field,
        "limit": query.top_k,
        "filter": build_filter_expression(query.tenant_id, query.types),
        "outputFields": OUTPUT_FIELDS,
        "searchParams": {"metricType": "COSINE"}
    })
}

pub fn parse_vector_response(body: &Value) -> Result<Vec<SearchHit>, SearchError> {
    let code = body.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        return Err(SearchError::BackendResponse {
            backend: "milvus".to_string(),
            details: format!(
                "code {code}: {}",
                body.get("message").and_then(Value::as_str).unwrap_or("unknown error")
            ),
        });
    }

    let rows = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "milvus".to_string(),
            details: "response has no data array".to_string(),
        })?;

    let hits = rows
        .iter()
        .map(|row| {
            let id = match row.get("id") {
                Some(Value::String(id)) => id.clone(),
                Some(Value::Number(id)) => id.to_string(),
                _ => String::new(),
            };
            let score = row.get("distance").and_then(Value::as_f64).unwrap_or(0.0);
            hit_from_fields(&id, score, row)
        })
        .collect();

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_expression_scopes_tenant_and_types() {
        assert_eq!(build_filter_expression(42, &[]), "tenant_id == 42");
        assert_eq!(
            build_filter_expression(42, &["doc".to_string(), "task".to_string()]),
            r#"tenant_id == 42 and type in ["doc","task"]"#
        );
    }

    #[test]
    fn filter_expression_escapes_quotes() {
        let expression = build_filter_expression(1, &[r#"we"ird"#.to_string()]);
        assert_eq!(expression, r#"tenant_id == 1 and type in ["we\"ird"]"#);
    }

    #[test]
    fn body_requests_cosine_top_k() {
        let vector = [0.1f32, 0.2, 0.3];
        let types = vec!["knowledge".to_string()];
        let query = VectorQuery {
            tenant_id: 7,
            vector: &vector,
            types: &types,
            top_k: 25,
            min_score: 0.7,
        };

        let body = build_vector_body("documents", "embedding", &query);
        assert_eq!(body["collectionName"], "documents");
        assert_eq!(body["limit"], 25);
        assert_eq!(body["annsField"], "embedding");
        assert_eq!(body["searchParams"]["metricType"], "COSINE");
        assert_eq!(body["data"][0].as_array().unwrap().len(), 3);
        assert_eq!(body["filter"], r#"tenant_id == 7 and type in ["knowledge"]"#);
    }

    #[test]
    fn parses_rows_with_string_and_numeric_ids() {
        let body = json!({
            "code": 0,
            "data": [
                {"id": "doc_2", "distance": 0.91, "type": "doc", "title": "Assistant"},
                {"id": 1234, "distance": 0.85, "type": "task", "title": "Plan", "tags": ["q3"]}
            ]
        });
        let hits = parse_vector_response(&body).unwrap();
        assert_eq!(hits[0].id, "doc_2");
        assert_eq!(hits[0].score, 0.91);
        assert_eq!(hits[1].id, "1234");
        assert_eq!(hits[1].tags, vec!["q3"]);
    }

    #[test]
    fn non_zero_code_is_a_backend_error() {
        let body = json!({"code": 1100, "message": "collection not found"});
        match parse_vector_response(&body) {
            Err(SearchError::BackendResponse { details, .. }) => {
                assert!(details.contains("collection not found"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected_before_any_request() {
        let store = MilvusStore::new("http://localhost:19530", "documents", 4, Duration::from_secs(1))
            .unwrap();
        let vector = [0.5f32; 3];
        let query = VectorQuery {
            tenant_id: 1,
            vector: &vector,
            types: &[],
            top_k: 5,
            min_score: 0.0,
        };
        assert!(matches!(
            store.search_vector(&query).await,
            Err(SearchError::InvalidRequest(_))
        ));
    }
}
