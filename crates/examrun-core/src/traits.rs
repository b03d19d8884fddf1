//! Adapter contracts for the engine's two collaborators.
//!
//! These async traits are implemented by the `examrun-store` crate against
//! the JSON-record backend, and by in-memory doubles in tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{Question, SessionKind, TestModel};
use crate::scoring::AttemptResult;

// ---------------------------------------------------------------------------
// Question source
// ---------------------------------------------------------------------------

/// Request for a batch of normalized questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    /// Explicit question ids; the response preserves this order.
    pub ids: Vec<String>,
    pub model: TestModel,
}

/// A question that could not be resolved from either upstream schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedQuestion {
    pub id: String,
    pub reason: String,
}

/// An ordered batch of normalized questions. Individual misses are dropped
/// rather than failing the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBatch {
    pub questions: Vec<Question>,
    #[serde(default)]
    pub dropped: Vec<DroppedQuestion>,
}

/// Trait for backends that resolve question ids into canonical questions.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn fetch(&self, request: &QuestionRequest) -> Result<QuestionBatch, StoreError>;
}

// ---------------------------------------------------------------------------
// Attempt store
// ---------------------------------------------------------------------------

/// Key identifying the durable attempt record a session writes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AttemptKey {
    Test { user: String, test_id: String },
    Practice {
        user: String,
        subject: String,
        lesson: String,
    },
}

impl AttemptKey {
    pub fn user(&self) -> &str {
        match self {
            AttemptKey::Test { user, .. } | AttemptKey::Practice { user, .. } => user,
        }
    }
}

impl From<&SessionKind> for AttemptKey {
    fn from(kind: &SessionKind) -> Self {
        match kind {
            SessionKind::Test { user, test_id } => AttemptKey::Test {
                user: user.clone(),
                test_id: test_id.clone(),
            },
            SessionKind::Practice {
                user,
                subject,
                lesson,
            } => AttemptKey::Practice {
                user: user.clone(),
                subject: subject.clone(),
                lesson: lesson.clone(),
            },
        }
    }
}

/// A persisted attempt as the store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAttempt {
    /// Backend record id.
    pub id: String,
    pub key: AttemptKey,
    pub result: AttemptResult,
    pub created_at: DateTime<Utc>,
}

/// Trait for the durable attempt store.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Most recently created attempt for a key, or `None` when the learner
    /// has no prior attempt. Key strings are matched case-insensitively
    /// after trimming.
    async fn find_latest(&self, key: &AttemptKey) -> Result<Option<StoredAttempt>, StoreError>;

    /// Create or update the attempt record for a key. An existing record's
    /// log is merged with the new one: a repeated question id takes the new
    /// entry but sums `time_spent_secs`, and aggregates are recomputed from
    /// the merged log.
    async fn upsert(
        &self,
        key: &AttemptKey,
        result: &AttemptResult,
    ) -> Result<StoredAttempt, StoreError>;

    /// All attempts a user logged on a given UTC calendar day.
    async fn attempts_on(
        &self,
        user: &str,
        day: NaiveDate,
    ) -> Result<Vec<StoredAttempt>, StoreError>;
}
