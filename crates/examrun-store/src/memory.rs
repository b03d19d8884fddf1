//! In-memory record store for tests and offline runs.
//!
//! Supports the subset of the filter grammar the adapters emit: equality
//! and range clauses joined with `&&`, values compared as strings (which
//! orders ISO-style timestamps correctly).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use examrun_core::error::StoreError;

use crate::record::{RawRecord, RecordStore};

/// Backend timestamp format (space-separated, UTC).
pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

pub struct MemoryRecordStore {
    collections: Mutex<HashMap<String, Vec<RawRecord>>>,
    next_id: AtomicU64,
    list_calls: AtomicU32,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            list_calls: AtomicU32::new(0),
        }
    }

    /// Insert a record with a fixed id; panics on a non-object value.
    /// Intended for test and sample-data seeding.
    pub fn seed(&self, collection: &str, id: &str, fields: Value) {
        let Value::Object(fields) = fields else {
            panic!("seed requires a JSON object");
        };
        let record = RawRecord {
            id: id.to_string(),
            collection: collection.to_string(),
            created: Some(Utc::now().format(CREATED_FORMAT).to_string()),
            fields,
        };
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(record);
    }

    /// Number of `get_list` calls served; lets tests assert that gated
    /// actions re-query the source of truth.
    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::Relaxed)
    }

    fn matches(record: &RawRecord, filter: &str) -> bool {
        if filter.is_empty() {
            return true;
        }
        filter.split(" && ").all(|clause| {
            let Some((field, op, literal)) = parse_clause(clause) else {
                return false;
            };
            let value = match field {
                "created" => record.created.clone().unwrap_or_default(),
                name => match record.fields.get(name) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => return false,
                },
            };
            match op {
                ">=" => value.as_str() >= literal.as_str(),
                "<" => value.as_str() < literal.as_str(),
                _ => value == literal,
            }
        })
    }
}

fn parse_clause(clause: &str) -> Option<(&str, &str, String)> {
    for op in [">=", "<", "="] {
        if let Some((field, rest)) = clause.split_once(&format!(" {op} ")) {
            let literal = rest.trim().trim_matches('\'');
            return Some((field.trim(), op, literal.replace("''", "'")));
        }
    }
    None
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_one(&self, collection: &str, id: &str) -> Result<RawRecord, StoreError> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|records| records.iter().find(|r| r.id == id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    async fn get_list(
        &self,
        collection: &str,
        filter: &str,
        sort: &str,
    ) -> Result<Vec<RawRecord>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let mut records: Vec<RawRecord> = self
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| Self::matches(r, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        match sort {
            "created" => records.sort_by(|a, b| a.created.cmp(&b.created)),
            "-created" => records.sort_by(|a, b| b.created.cmp(&a.created)),
            _ => {}
        }
        Ok(records)
    }

    async fn create(&self, collection: &str, fields: Value) -> Result<RawRecord, StoreError> {
        let Value::Object(fields) = fields else {
            return Err(StoreError::Validation("record body must be an object".into()));
        };
        let id = format!("m{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = RawRecord {
            id,
            collection: collection.to_string(),
            created: Some(Utc::now().format(CREATED_FORMAT).to_string()),
            fields,
        };
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<RawRecord, StoreError> {
        let Value::Object(new_fields) = fields else {
            return Err(StoreError::Validation("record body must be an object".into()));
        };
        let mut collections = self.collections.lock().unwrap();
        let record = collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        for (key, value) in new_fields {
            record.fields.insert(key, value);
        }
        Ok(record.clone())
    }

    fn resolve_file_url(&self, record: &RawRecord, filename: &str) -> Option<String> {
        if filename.is_empty() {
            return None;
        }
        Some(format!(
            "memory://{}/{}/{filename}",
            record.collection, record.id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_one_round_trip() {
        let store = MemoryRecordStore::new();
        store.seed(
            "question_bank",
            "q1",
            serde_json::json!({"questionText": "stem"}),
        );

        let record = store.get_one("question_bank", "q1").await.unwrap();
        assert_eq!(record.str_field("questionText"), Some("stem"));

        let err = store.get_one("question_bank", "q2").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_filters_on_equality() {
        let store = MemoryRecordStore::new();
        store.seed("attempts", "a1", serde_json::json!({"user": "u1"}));
        store.seed("attempts", "a2", serde_json::json!({"user": "u2"}));

        let items = store
            .get_list("attempts", "user = 'u1'", "-created")
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a1");
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn list_filters_on_created_range() {
        let store = MemoryRecordStore::new();
        store.seed("attempts", "a1", serde_json::json!({"user": "u1"}));
        let today = Utc::now().date_naive();

        let hits = store
            .get_list(
                "attempts",
                &format!(
                    "user = 'u1' && created >= '{today} 00:00:00' && created < '{} 00:00:00'",
                    today.succ_opt().unwrap()
                ),
                "-created",
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = store
            .get_list("attempts", "created < '2000-01-01 00:00:00'", "-created")
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn filter_values_with_doubled_quotes_match() {
        let store = MemoryRecordStore::new();
        store.seed(
            "attempts",
            "a1",
            serde_json::json!({"lesson": "Newton's Laws"}),
        );
        let items = store
            .get_list("attempts", "lesson = 'Newton''s Laws'", "")
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = MemoryRecordStore::new();
        store.seed("attempts", "a1", serde_json::json!({"user": "u1"}));
        store
            .update("attempts", "a1", serde_json::json!({"score": 5}))
            .await
            .unwrap();

        let record = store.get_one("attempts", "a1").await.unwrap();
        assert_eq!(record.str_field("user"), Some("u1"));
        assert_eq!(record.fields.get("score"), Some(&serde_json::json!(5)));
    }
}
