pub mod elasticsearch;
pub mod file;
pub mod memory;
pub mod milvus;

pub use elasticsearch::ElasticsearchStore;
pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
pub use milvus::MilvusStore;

use crate::SearchHit;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Builds a hit from the stored document fields both indexes share.
pub(crate) fn hit_from_fields(id: &str, score: f64, fields: &Value) -> SearchHit {
    let text = |name: &str| fields.get(name).and_then(Value::as_str).map(str::to_string);

    SearchHit {
        id: id.to_string(),
        doc_type: text("type").unwrap_or_default(),
        business_id: fields.get("business_id").and_then(Value::as_i64),
        title: text("title").unwrap_or_default(),
        summary: text("summary"),
        score,
        tags: fields
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        highlight_title: None,
        highlight_content: None,
        creator_id: fields.get("creator_id").and_then(Value::as_i64),
        created_at: fields.get("created_at").and_then(parse_timestamp),
        updated_at: fields.get("updated_at").and_then(parse_timestamp),
        metadata: fields
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
