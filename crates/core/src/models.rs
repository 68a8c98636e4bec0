use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::SearchError;

/// One scored document. `score` carries text relevance, cosine similarity or
/// the fused RRF value depending on which path produced the response.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub business_id: Option<i64>,
    pub title: String,
    pub summary: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub highlight_title: Option<String>,
    pub highlight_content: Option<String>,
    pub creator_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Fulltext,
    Semantic,
    Vector,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Fulltext => "fulltext",
            SearchMode::Semantic => "semantic",
            SearchMode::Vector => "vector",
            SearchMode::Hybrid => "hybrid",
        }
    }

    pub fn requires_keyword(&self) -> bool {
        !matches!(self, SearchMode::Vector)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fulltext" => Ok(SearchMode::Fulltext),
            "semantic" => Ok(SearchMode::Semantic),
            "vector" => Ok(SearchMode::Vector),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(SearchError::InvalidRequest(format!(
                "unknown search mode `{other}`"
            ))),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    pub keyword: Option<String>,
    pub query_vector: Option<Vec<f32>>,
    pub types: Vec<String>,
    pub mode: Option<SearchMode>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub min_score: Option<f64>,
    pub record_history: bool,
}

impl SearchRequest {
    pub fn keyword(keyword: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            keyword: Some(keyword.into()),
            mode: Some(mode),
            ..Self::default()
        }
    }

    /// Trimmed keyword, `None` when absent or blank.
    pub fn trimmed_keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub total_pages: u64,
    pub has_more: bool,
    pub took: u64,
    pub history_id: Option<Uuid>,
}

impl SearchResponse {
    pub fn new(hits: Vec<SearchHit>, total: u64, page: u32, size: u32) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total.div_ceil(u64::from(size))
        };
        Self {
            hits,
            total,
            page,
            size,
            total_pages,
            has_more: u64::from(page) < total_pages,
            took: 0,
            history_id: None,
        }
    }

    pub fn empty(page: u32, size: u32) -> Self {
        Self::new(Vec::new(), 0, page, size)
    }
}

/// Ranked hits from one provider call plus the provider's total count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitPage {
    pub hits: Vec<SearchHit>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FulltextQuery {
    pub tenant_id: i64,
    pub keyword: String,
    pub types: Vec<String>,
    pub page: u32,
    pub size: u32,
}

impl FulltextQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery<'a> {
    pub tenant_id: i64,
    pub vector: &'a [f32],
    pub types: &'a [String],
    pub top_k: usize,
    pub min_score: f64,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistory {
    pub id: Uuid,
    pub tenant_id: i64,
    pub user_id: i64,
    pub keyword: Option<String>,
    pub mode: SearchMode,
    pub result_count: u64,
    pub response_time_ms: u64,
    pub clicked_doc_id: Option<String>,
    pub click_position: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub clicked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HotwordPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl HotwordPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HotwordPeriod::Daily => "daily",
            HotwordPeriod::Weekly => "weekly",
            HotwordPeriod::Monthly => "monthly",
        }
    }
}

impl fmt::Display for HotwordPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HotwordPeriod {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(HotwordPeriod::Daily),
            "weekly" => Ok(HotwordPeriod::Weekly),
            "monthly" => Ok(HotwordPeriod::Monthly),
            other => Err(SearchError::InvalidRequest(format!(
                "unknown hotword period `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Stable,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHotword {
    pub tenant_id: i64,
    pub keyword: String,
    pub period: HotwordPeriod,
    pub search_count: u64,
    pub ranking: Option<u32>,
    pub trend: Trend,
    pub is_new: bool,
    pub updated_at: DateTime<Utc>,
}

impl SearchHotword {
    pub fn first_seen(tenant_id: i64, keyword: impl Into<String>, period: HotwordPeriod) -> Self {
        Self {
            tenant_id,
            keyword: keyword.into(),
            period,
            search_count: 1,
            ranking: None,
            trend: Trend::Stable,
            is_new: true,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_derives_paging_fields() {
        let first = SearchResponse::new(Vec::new(), 45, 1, 20);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_more);

        let last = SearchResponse::new(Vec::new(), 45, 3, 20);
        assert!(!last.has_more);

        let zero_size = SearchResponse::new(Vec::new(), 45, 1, 0);
        assert_eq!(zero_size.total_pages, 0);
        assert!(!zero_size.has_more);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert!("graph".parse::<SearchMode>().is_err());
        assert_eq!(SearchMode::default(), SearchMode::Fulltext);
    }

    #[test]
    fn request_uses_camel_case_wire_names() {
        let request: SearchRequest = serde_json::from_value(serde_json::json!({
            "keyword": "AI assistant",
            "mode": "hybrid",
            "recordHistory": true,
            "minScore": 0.5
        }))
        .unwrap();

        assert_eq!(request.mode, Some(SearchMode::Hybrid));
        assert!(request.record_history);
        assert_eq!(request.min_score, Some(0.5));
        assert!(request.types.is_empty());
    }

    #[test]
    fn blank_keyword_is_treated_as_missing() {
        let request = SearchRequest::keyword("   ", SearchMode::Fulltext);
        assert_eq!(request.trimmed_keyword(), None);
    }

    #[test]
    fn hit_serializes_doc_type_as_type() {
        let hit = SearchHit {
            id: "doc_1".to_string(),
            doc_type: "task".to_string(),
            ..SearchHit::default()
        };
        let value = serde_json::to_value(&hit).unwrap();
        assert_eq!(value["type"], "task");
        assert!(value.get("highlightTitle").is_none());
    }
}
