//! Question-source adapter.
//!
//! Two upstream collections hold "the same" entity with different field
//! conventions: the primary question bank (lower-camel fields, storage
//! filenames for images) and a legacy table (upper-camel fields, some image
//! fields holding raw URLs). Both are resolved here, once, into the
//! canonical [`Question`]; the engine never sees either upstream shape.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::instrument;

use examrun_core::error::StoreError;
use examrun_core::model::{
    Difficulty, OptionLabel, Question, QuestionOption, QuestionOrigin, Subject, TestModel,
};
use examrun_core::traits::{DroppedQuestion, QuestionBatch, QuestionRequest, QuestionSource};

use crate::record::{RawRecord, RecordStore};

/// Primary collection, lower-camel fields.
pub const BANK_COLLECTION: &str = "question_bank";
/// Legacy collection, upper-camel fields.
pub const LEGACY_COLLECTION: &str = "questions";

const FETCH_CONCURRENCY: usize = 8;

/// [`QuestionSource`] over a [`RecordStore`].
pub struct QuestionSourceAdapter {
    store: Arc<dyn RecordStore>,
}

impl QuestionSourceAdapter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Resolve one id: primary schema first, legacy on not-found. A miss in
    /// both (or a malformed record) yields a drop reason, never a batch
    /// failure; transport errors propagate.
    async fn fetch_one(&self, id: &str) -> Result<Result<Question, String>, StoreError> {
        match self.store.get_one(BANK_COLLECTION, id).await {
            Ok(record) => Ok(normalize_bank(self.store.as_ref(), &record)),
            Err(e) if e.is_not_found() => match self.store.get_one(LEGACY_COLLECTION, id).await {
                Ok(record) => Ok(normalize_legacy(self.store.as_ref(), &record)),
                Err(e2) if e2.is_not_found() => {
                    Ok(Err("not found in either question collection".into()))
                }
                Err(e2) => Err(e2),
            },
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl QuestionSource for QuestionSourceAdapter {
    #[instrument(skip(self, request), fields(count = request.ids.len()))]
    async fn fetch(&self, request: &QuestionRequest) -> Result<QuestionBatch, StoreError> {
        // Buffered (not unordered) so the output keeps the id order.
        let resolved: Vec<(String, Result<Result<Question, String>, StoreError>)> =
            stream::iter(request.ids.iter().cloned())
                .map(|id| async move {
                    let outcome = self.fetch_one(&id).await;
                    (id, outcome)
                })
                .buffered(FETCH_CONCURRENCY)
                .collect()
                .await;

        let mut questions = Vec::new();
        let mut dropped = Vec::new();
        for (id, outcome) in resolved {
            match outcome? {
                Ok(question) => questions.push(question),
                Err(reason) => {
                    tracing::warn!(id = %id, reason = %reason, "dropping unresolvable question");
                    dropped.push(DroppedQuestion { id, reason });
                }
            }
        }

        Ok(QuestionBatch {
            questions: group_for_model(questions, request.model),
            dropped,
        })
    }
}

/// Concatenate per-subject in the fixed paper order, keeping each subject's
/// internal order. Chapter-wise papers pass through untouched; subjects that
/// parse to none of the four buckets keep their relative order at the end.
pub fn group_for_model(questions: Vec<Question>, model: TestModel) -> Vec<Question> {
    match model {
        TestModel::ChapterWise => questions,
        TestModel::FullLength => {
            let mut buckets: [Vec<Question>; 4] = Default::default();
            let mut rest = Vec::new();
            for question in questions {
                let slot = Subject::from_str(&question.subject)
                    .ok()
                    .and_then(|subject| Subject::PAPER_ORDER.iter().position(|s| *s == subject));
                match slot {
                    Some(slot) => buckets[slot].push(question),
                    None => rest.push(question),
                }
            }
            buckets.into_iter().flatten().chain(rest).collect()
        }
    }
}

/// Fields as both upstream schemas carry them, post-rename.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BankFields {
    question_text: Option<String>,
    question_image: Option<String>,
    option_a: Option<String>,
    option_b: Option<String>,
    option_c: Option<String>,
    option_d: Option<String>,
    option_a_image: Option<String>,
    option_b_image: Option<String>,
    option_c_image: Option<String>,
    option_d_image: Option<String>,
    correct_option: Option<String>,
    explanation: Option<String>,
    explanation_image: Option<String>,
    marks: Option<u32>,
    subject: Option<String>,
    lesson: Option<String>,
    difficulty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct LegacyFields {
    question_text: Option<String>,
    question_image: Option<String>,
    option_a: Option<String>,
    option_b: Option<String>,
    option_c: Option<String>,
    option_d: Option<String>,
    option_a_image: Option<String>,
    option_b_image: Option<String>,
    option_c_image: Option<String>,
    option_d_image: Option<String>,
    correct_option: Option<String>,
    explanation: Option<String>,
    explanation_image: Option<String>,
    marks: Option<u32>,
    subject: Option<String>,
    lesson: Option<String>,
    difficulty: Option<String>,
}

impl From<LegacyFields> for BankFields {
    fn from(f: LegacyFields) -> Self {
        BankFields {
            question_text: f.question_text,
            question_image: f.question_image,
            option_a: f.option_a,
            option_b: f.option_b,
            option_c: f.option_c,
            option_d: f.option_d,
            option_a_image: f.option_a_image,
            option_b_image: f.option_b_image,
            option_c_image: f.option_c_image,
            option_d_image: f.option_d_image,
            correct_option: f.correct_option,
            explanation: f.explanation,
            explanation_image: f.explanation_image,
            marks: f.marks,
            subject: f.subject,
            lesson: f.lesson,
            difficulty: f.difficulty,
        }
    }
}

fn normalize_bank(store: &dyn RecordStore, record: &RawRecord) -> Result<Question, String> {
    let fields: BankFields =
        serde_json::from_value(serde_json::Value::Object(record.fields.clone()))
            .map_err(|e| format!("malformed bank record: {e}"))?;
    build_question(store, record, fields, QuestionOrigin::Bank)
}

fn normalize_legacy(store: &dyn RecordStore, record: &RawRecord) -> Result<Question, String> {
    let fields: LegacyFields =
        serde_json::from_value(serde_json::Value::Object(record.fields.clone()))
            .map_err(|e| format!("malformed legacy record: {e}"))?;
    build_question(store, record, fields.into(), QuestionOrigin::Legacy)
}

fn build_question(
    store: &dyn RecordStore,
    record: &RawRecord,
    fields: BankFields,
    origin: QuestionOrigin,
) -> Result<Question, String> {
    let correct = fields
        .correct_option
        .as_deref()
        .ok_or("missing correct option")?
        .parse::<OptionLabel>()?;

    let options = [
        option(store, record, fields.option_a, fields.option_a_image),
        option(store, record, fields.option_b, fields.option_b_image),
        option(store, record, fields.option_c, fields.option_c_image),
        option(store, record, fields.option_d, fields.option_d_image),
    ];

    let difficulty = fields
        .difficulty
        .as_deref()
        .and_then(|d| Difficulty::from_str(d).ok())
        .unwrap_or_default();

    Ok(Question {
        id: record.id.clone(),
        text: fields.question_text,
        image_url: resolve_image(store, record, fields.question_image),
        options,
        correct,
        explanation: fields.explanation,
        explanation_image_url: resolve_image(store, record, fields.explanation_image),
        marks: fields.marks.filter(|m| *m > 0).unwrap_or(1),
        subject: fields.subject.unwrap_or_default(),
        lesson: fields.lesson.unwrap_or_default(),
        difficulty,
        origin,
    })
}

fn option(
    store: &dyn RecordStore,
    record: &RawRecord,
    text: Option<String>,
    image: Option<String>,
) -> QuestionOption {
    QuestionOption {
        text,
        image_url: resolve_image(store, record, image),
    }
}

/// An already-absolute URL passes through untouched; anything else is a
/// storage-relative filename resolved against the record.
fn resolve_image(
    store: &dyn RecordStore,
    record: &RawRecord,
    value: Option<String>,
) -> Option<String> {
    let value = value.filter(|v| !v.trim().is_empty())?;
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value);
    }
    store.resolve_file_url(record, &value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRecordStore;
    use serde_json::json;

    fn bank_question(subject: &str, correct: &str) -> serde_json::Value {
        json!({
            "questionText": "stem",
            "optionA": "one",
            "optionB": "two",
            "optionC": "three",
            "optionD": "four",
            "correctOption": correct,
            "marks": 2,
            "subject": subject,
            "lesson": "L1",
            "difficulty": "hard"
        })
    }

    fn adapter_with(store: Arc<MemoryRecordStore>) -> QuestionSourceAdapter {
        QuestionSourceAdapter::new(store)
    }

    fn request(ids: &[&str], model: TestModel) -> QuestionRequest {
        QuestionRequest {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            model,
        }
    }

    #[tokio::test]
    async fn primary_schema_normalizes() {
        let store = Arc::new(MemoryRecordStore::new());
        store.seed(BANK_COLLECTION, "q1", bank_question("Physics", "B"));

        let batch = adapter_with(store)
            .fetch(&request(&["q1"], TestModel::ChapterWise))
            .await
            .unwrap();

        assert!(batch.dropped.is_empty());
        let q = &batch.questions[0];
        assert_eq!(q.correct, OptionLabel::B);
        assert_eq!(q.marks, 2);
        assert_eq!(q.difficulty, Difficulty::Hard);
        assert_eq!(q.origin, QuestionOrigin::Bank);
        assert_eq!(q.option(OptionLabel::C).text.as_deref(), Some("three"));
    }

    #[tokio::test]
    async fn falls_back_to_legacy_schema() {
        let store = Arc::new(MemoryRecordStore::new());
        store.seed(
            LEGACY_COLLECTION,
            "q9",
            json!({
                "QuestionText": "legacy stem",
                "OptionA": "a",
                "CorrectOption": "a",
                "Subject": "Chemistry",
                "Lesson": "Acids"
            }),
        );

        let batch = adapter_with(store)
            .fetch(&request(&["q9"], TestModel::ChapterWise))
            .await
            .unwrap();

        let q = &batch.questions[0];
        assert_eq!(q.origin, QuestionOrigin::Legacy);
        assert_eq!(q.text.as_deref(), Some("legacy stem"));
        assert_eq!(q.correct, OptionLabel::A);
        assert_eq!(q.marks, 1);
    }

    #[tokio::test]
    async fn missing_questions_drop_without_failing_the_batch() {
        let store = Arc::new(MemoryRecordStore::new());
        store.seed(BANK_COLLECTION, "q1", bank_question("Physics", "A"));
        store.seed(BANK_COLLECTION, "q3", bank_question("Physics", "C"));

        let batch = adapter_with(store)
            .fetch(&request(&["q1", "q2", "q3"], TestModel::ChapterWise))
            .await
            .unwrap();

        assert_eq!(batch.dropped.len(), 1);
        assert_eq!(batch.dropped[0].id, "q2");
        let ids: Vec<&str> = batch.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q3"]);
    }

    #[tokio::test]
    async fn malformed_correct_option_drops_the_question() {
        let store = Arc::new(MemoryRecordStore::new());
        store.seed(BANK_COLLECTION, "q1", bank_question("Physics", "Z"));

        let batch = adapter_with(store)
            .fetch(&request(&["q1"], TestModel::ChapterWise))
            .await
            .unwrap();
        assert!(batch.questions.is_empty());
        assert_eq!(batch.dropped.len(), 1);
    }

    #[tokio::test]
    async fn output_preserves_input_order() {
        let store = Arc::new(MemoryRecordStore::new());
        for id in ["q1", "q2", "q3", "q4", "q5"] {
            store.seed(BANK_COLLECTION, id, bank_question("Physics", "A"));
        }

        let batch = adapter_with(store)
            .fetch(&request(&["q4", "q1", "q5", "q2"], TestModel::ChapterWise))
            .await
            .unwrap();
        let ids: Vec<&str> = batch.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q4", "q1", "q5", "q2"]);
    }

    #[tokio::test]
    async fn full_length_groups_by_fixed_subject_order() {
        let store = Arc::new(MemoryRecordStore::new());
        store.seed(BANK_COLLECTION, "m1", bank_question("Maths", "A"));
        store.seed(BANK_COLLECTION, "p1", bank_question("physics", "A"));
        store.seed(BANK_COLLECTION, "c1", bank_question("Chemistry", "A"));
        store.seed(BANK_COLLECTION, "p2", bank_question("Physics", "A"));

        let batch = adapter_with(store)
            .fetch(&request(&["m1", "p1", "c1", "p2"], TestModel::FullLength))
            .await
            .unwrap();
        let ids: Vec<&str> = batch.questions.iter().map(|q| q.id.as_str()).collect();
        // Physics (internal order kept), then Chemistry, then Mathematics.
        assert_eq!(ids, vec!["p1", "p2", "c1", "m1"]);
    }

    #[tokio::test]
    async fn absolute_image_urls_are_never_double_resolved() {
        let store = Arc::new(MemoryRecordStore::new());
        let mut q = bank_question("Physics", "A");
        q["questionImage"] = json!("https://cdn.example.com/stem.png");
        q["optionAImage"] = json!("diagram.png");
        store.seed(BANK_COLLECTION, "q1", q);

        let batch = adapter_with(store)
            .fetch(&request(&["q1"], TestModel::ChapterWise))
            .await
            .unwrap();
        let question = &batch.questions[0];
        assert_eq!(
            question.image_url.as_deref(),
            Some("https://cdn.example.com/stem.png")
        );
        assert_eq!(
            question.option(OptionLabel::A).image_url.as_deref(),
            Some("memory://question_bank/q1/diagram.png")
        );
    }

    #[tokio::test]
    async fn transport_errors_fail_the_batch() {
        struct FailingStore;

        #[async_trait]
        impl RecordStore for FailingStore {
            async fn get_one(&self, _: &str, _: &str) -> Result<RawRecord, StoreError> {
                Err(StoreError::NetworkError("connection refused".into()))
            }
            async fn get_list(
                &self,
                _: &str,
                _: &str,
                _: &str,
            ) -> Result<Vec<RawRecord>, StoreError> {
                Err(StoreError::NetworkError("connection refused".into()))
            }
            async fn create(&self, _: &str, _: serde_json::Value) -> Result<RawRecord, StoreError> {
                unreachable!()
            }
            async fn update(
                &self,
                _: &str,
                _: &str,
                _: serde_json::Value,
            ) -> Result<RawRecord, StoreError> {
                unreachable!()
            }
            fn resolve_file_url(&self, _: &RawRecord, _: &str) -> Option<String> {
                None
            }
        }

        let adapter = QuestionSourceAdapter::new(Arc::new(FailingStore));
        let err = adapter
            .fetch(&request(&["q1"], TestModel::ChapterWise))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
