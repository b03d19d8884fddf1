//! Attempt-store adapter.
//!
//! Persists one attempt record per key. A repeat submission merges into the
//! existing record: the repeated question keeps the latest entry but sums
//! its time-on-question, and the aggregates are recomputed from the merged
//! log, so a learner's total time per question accumulates across visits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Value};
use tracing::instrument;

use examrun_core::error::StoreError;
use examrun_core::model::AnswerRecord;
use examrun_core::scoring::{aggregate_entries, AttemptResult};
use examrun_core::traits::{AttemptKey, AttemptStore, StoredAttempt};

use crate::filter::Filter;
use crate::record::{RawRecord, RecordStore};

/// Collection holding attempt records.
pub const ATTEMPTS_COLLECTION: &str = "attempts";

/// [`AttemptStore`] over a [`RecordStore`].
pub struct AttemptStoreAdapter {
    store: Arc<dyn RecordStore>,
}

impl AttemptStoreAdapter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn list_for_user(&self, user: &str) -> Result<Vec<RawRecord>, StoreError> {
        let filter = Filter::new().eq("user", user.trim()).build();
        self.store
            .get_list(ATTEMPTS_COLLECTION, &filter, "-created")
            .await
    }
}

#[async_trait]
impl AttemptStore for AttemptStoreAdapter {
    #[instrument(skip(self, key), fields(user = %key.user()))]
    async fn find_latest(&self, key: &AttemptKey) -> Result<Option<StoredAttempt>, StoreError> {
        // Upstream subject/lesson casing and whitespace are inconsistent,
        // so the key match happens client-side on normalized strings.
        let records = self.list_for_user(key.user()).await?;
        Ok(records
            .iter()
            .filter(|record| record_matches_key(record, key))
            .find_map(|record| decode_record(record, key)))
    }

    #[instrument(skip(self, key, result), fields(user = %key.user()))]
    async fn upsert(
        &self,
        key: &AttemptKey,
        result: &AttemptResult,
    ) -> Result<StoredAttempt, StoreError> {
        let written = match self.find_latest(key).await? {
            Some(existing) => {
                let merged = merge_results(&existing.result, result);
                self.store
                    .update(
                        ATTEMPTS_COLLECTION,
                        &existing.id,
                        record_fields(key, &merged),
                    )
                    .await?
            }
            None => {
                self.store
                    .create(ATTEMPTS_COLLECTION, record_fields(key, result))
                    .await?
            }
        };

        decode_record(&written, key).ok_or_else(|| {
            StoreError::Validation("written attempt record failed to decode".into())
        })
    }

    #[instrument(skip(self))]
    async fn attempts_on(
        &self,
        user: &str,
        day: NaiveDate,
    ) -> Result<Vec<StoredAttempt>, StoreError> {
        let next = day.succ_opt().unwrap_or(day);
        let filter = Filter::new()
            .eq("user", user.trim())
            .ge("created", &format!("{day} 00:00:00"))
            .lt("created", &format!("{next} 00:00:00"))
            .build();
        let records = self
            .store
            .get_list(ATTEMPTS_COLLECTION, &filter, "-created")
            .await?;

        Ok(records
            .iter()
            .filter_map(|record| {
                let key = key_from_record(record)?;
                decode_record(record, &key)
            })
            .collect())
    }
}

fn normalized_eq(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn record_matches_key(record: &RawRecord, key: &AttemptKey) -> bool {
    let kind = record.str_field("kind").unwrap_or_default();
    match key {
        AttemptKey::Test { test_id, .. } => {
            kind == "test"
                && record
                    .str_field("test_id")
                    .is_some_and(|t| normalized_eq(t, test_id))
        }
        AttemptKey::Practice {
            subject, lesson, ..
        } => {
            kind == "practice"
                && record
                    .str_field("subject")
                    .is_some_and(|s| normalized_eq(s, subject))
                && record
                    .str_field("lesson")
                    .is_some_and(|l| normalized_eq(l, lesson))
        }
    }
}

fn key_from_record(record: &RawRecord) -> Option<AttemptKey> {
    let user = record.str_field("user")?.to_string();
    match record.str_field("kind")? {
        "test" => Some(AttemptKey::Test {
            user,
            test_id: record.str_field("test_id")?.to_string(),
        }),
        "practice" => Some(AttemptKey::Practice {
            user,
            subject: record.str_field("subject")?.to_string(),
            lesson: record.str_field("lesson")?.to_string(),
        }),
        _ => None,
    }
}

fn decode_record(record: &RawRecord, key: &AttemptKey) -> Option<StoredAttempt> {
    let result = record.fields.get("result")?;
    let result: AttemptResult = match serde_json::from_value(result.clone()) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(id = %record.id, error = %e, "skipping undecodable attempt record");
            return None;
        }
    };
    let created_at = record
        .created
        .as_deref()
        .and_then(parse_created)
        .unwrap_or(result.completed_at);

    Some(StoredAttempt {
        id: record.id.clone(),
        key: key.clone(),
        result,
        created_at,
    })
}

/// The backend formats timestamps as `2026-08-28 10:00:00.000Z`; RFC 3339 is
/// accepted too.
fn parse_created(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.fZ")
        .ok()
        .map(|naive| naive.and_utc())
}

fn record_fields(key: &AttemptKey, result: &AttemptResult) -> Value {
    let mut fields = match key {
        AttemptKey::Test { user, test_id } => json!({
            "user": user,
            "kind": "test",
            "test_id": test_id,
        }),
        AttemptKey::Practice {
            user,
            subject,
            lesson,
        } => json!({
            "user": user,
            "kind": "practice",
            "subject": subject,
            "lesson": lesson,
        }),
    };
    fields["result"] = serde_json::to_value(result).unwrap_or(Value::Null);
    fields
}

/// Merge a new result into an existing one. Existing entries keep their
/// position; a repeated question id takes the new entry with time summed;
/// brand-new questions append in their own order. Counts, score, and
/// percentage are recomputed from the merged log; durations accumulate.
fn merge_results(existing: &AttemptResult, new: &AttemptResult) -> AttemptResult {
    let mut merged: Vec<AnswerRecord> = existing.entries.clone();
    for entry in &new.entries {
        match merged
            .iter_mut()
            .find(|e| e.question_id == entry.question_id)
        {
            Some(slot) => {
                let prior_time = slot.time_spent_secs;
                *slot = entry.clone();
                slot.time_spent_secs += prior_time;
            }
            None => merged.push(entry.clone()),
        }
    }

    let (counts, score, max_score) = aggregate_entries(&merged);
    let percentage = if max_score == 0 {
        0.0
    } else {
        score as f64 / max_score as f64 * 100.0
    };

    AttemptResult {
        session_id: new.session_id,
        counts,
        score,
        max_score,
        percentage,
        duration_secs: existing.duration_secs + new.duration_secs,
        entries: merged,
        status: new.status.clone(),
        completed_at: new.completed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRecordStore;
    use examrun_core::model::OptionLabel;
    use examrun_core::scoring::AttemptStatus;
    use uuid::Uuid;

    fn entry(
        question_id: &str,
        selected: Option<OptionLabel>,
        correct: OptionLabel,
        secs: u64,
    ) -> AnswerRecord {
        AnswerRecord {
            question_id: question_id.into(),
            selected,
            correct,
            marks: 1,
            is_correct: selected.map(|s| s == correct),
            marked_for_review: false,
            visited: true,
            answer_checked: false,
            time_spent_secs: secs,
        }
    }

    fn result_with(entries: Vec<AnswerRecord>, duration_secs: u64) -> AttemptResult {
        let (counts, score, max_score) = aggregate_entries(&entries);
        AttemptResult {
            session_id: Uuid::new_v4(),
            counts,
            score,
            max_score,
            percentage: if max_score == 0 {
                0.0
            } else {
                score as f64 / max_score as f64 * 100.0
            },
            duration_secs,
            entries,
            status: AttemptStatus::Completed,
            completed_at: Utc::now(),
        }
    }

    fn practice_key(subject: &str, lesson: &str) -> AttemptKey {
        AttemptKey::Practice {
            user: "u1".into(),
            subject: subject.into(),
            lesson: lesson.into(),
        }
    }

    #[tokio::test]
    async fn no_prior_attempt_is_none_not_an_error() {
        let adapter = AttemptStoreAdapter::new(Arc::new(MemoryRecordStore::new()));
        let found = adapter
            .find_latest(&practice_key("Physics", "Optics"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn find_latest_matches_keys_case_insensitively() {
        let adapter = AttemptStoreAdapter::new(Arc::new(MemoryRecordStore::new()));
        let result = result_with(vec![entry("q1", Some(OptionLabel::A), OptionLabel::A, 5)], 5);
        adapter
            .upsert(&practice_key("Physics", "Optics"), &result)
            .await
            .unwrap();

        let found = adapter
            .find_latest(&practice_key("  physics ", "OPTICS"))
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().result.counts.correct, 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_collide() {
        let adapter = AttemptStoreAdapter::new(Arc::new(MemoryRecordStore::new()));
        let result = result_with(vec![entry("q1", Some(OptionLabel::A), OptionLabel::A, 5)], 5);
        adapter
            .upsert(&practice_key("Physics", "Optics"), &result)
            .await
            .unwrap();

        assert!(adapter
            .find_latest(&practice_key("Physics", "Waves"))
            .await
            .unwrap()
            .is_none());
        assert!(adapter
            .find_latest(&AttemptKey::Test {
                user: "u1".into(),
                test_id: "t1".into()
            })
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn repeat_upsert_merges_time_and_keeps_latest_selection() {
        let store = Arc::new(MemoryRecordStore::new());
        let adapter = AttemptStoreAdapter::new(Arc::clone(&store) as Arc<dyn RecordStore>);
        let key = practice_key("Physics", "Optics");

        let first = result_with(vec![entry("q1", Some(OptionLabel::A), OptionLabel::B, 10)], 10);
        adapter.upsert(&key, &first).await.unwrap();

        let second = result_with(vec![entry("q1", Some(OptionLabel::B), OptionLabel::B, 5)], 5);
        let stored = adapter.upsert(&key, &second).await.unwrap();

        assert_eq!(stored.result.entries.len(), 1);
        let merged = &stored.result.entries[0];
        assert_eq!(merged.time_spent_secs, 15);
        assert_eq!(merged.selected, Some(OptionLabel::B));
        assert_eq!(stored.result.counts.correct, 1);
        assert_eq!(stored.result.counts.incorrect, 0);
        assert_eq!(stored.result.duration_secs, 15);

        // Still exactly one record for the key.
        let records = store
            .get_list(ATTEMPTS_COLLECTION, "user = 'u1'", "-created")
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn merge_appends_new_questions_after_existing_ones() {
        let adapter = AttemptStoreAdapter::new(Arc::new(MemoryRecordStore::new()));
        let key = practice_key("Physics", "Optics");

        let first = result_with(vec![entry("q1", Some(OptionLabel::A), OptionLabel::A, 4)], 4);
        adapter.upsert(&key, &first).await.unwrap();

        let second = result_with(vec![entry("q2", None, OptionLabel::C, 6)], 6);
        let stored = adapter.upsert(&key, &second).await.unwrap();

        let ids: Vec<&str> = stored
            .result
            .entries
            .iter()
            .map(|e| e.question_id.as_str())
            .collect();
        assert_eq!(ids, vec!["q1", "q2"]);
        assert_eq!(stored.result.counts.total, 2);
        assert_eq!(stored.result.counts.attempted, 1);
        assert_eq!(stored.result.counts.unattempted, 1);
    }

    #[tokio::test]
    async fn attempts_on_returns_only_that_day() {
        let adapter = AttemptStoreAdapter::new(Arc::new(MemoryRecordStore::new()));
        let result = result_with(vec![entry("q1", Some(OptionLabel::A), OptionLabel::A, 5)], 5);
        adapter
            .upsert(&practice_key("Physics", "Optics"), &result)
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        let todays = adapter.attempts_on("u1", today).await.unwrap();
        assert_eq!(todays.len(), 1);

        let yesterday = today.pred_opt().unwrap();
        assert!(adapter.attempts_on("u1", yesterday).await.unwrap().is_empty());
    }

    #[test]
    fn created_timestamps_parse_both_formats() {
        assert!(parse_created("2026-08-28 10:15:00.123Z").is_some());
        assert!(parse_created("2026-08-28T10:15:00Z").is_some());
        assert!(parse_created("yesterday").is_none());
    }
}
