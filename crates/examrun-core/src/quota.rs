//! Daily-practice quota guard.
//!
//! Counts the practice attempts a user logged on the current UTC calendar
//! day and blocks new submissions at a fixed ceiling; timed-test attempts
//! never occupy a slot. The count is queried fresh
//! from the attempt store on every check so it survives reloads and stays
//! eventually consistent across tabs.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::traits::{AttemptKey, AttemptStore};

/// Default per-user, per-UTC-day attempt ceiling.
pub const DEFAULT_DAILY_LIMIT: u32 = 10;

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaDecision {
    /// A new attempt may be submitted.
    Allowed { used: u32, limit: u32 },
    /// This question was already answered correctly today; re-viewing its
    /// solved state consumes no slot.
    AlreadyMastered,
    /// The ceiling is reached; new submissions are blocked.
    Blocked { limit: u32 },
}

/// Gate for the daily-practice flow.
pub struct DailyQuotaGuard {
    store: Arc<dyn AttemptStore>,
    limit: u32,
}

impl DailyQuotaGuard {
    pub fn new(store: Arc<dyn AttemptStore>, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn with_default_limit(store: Arc<dyn AttemptStore>) -> Self {
        Self::new(store, DEFAULT_DAILY_LIMIT)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Check whether a new attempt at `question_id` may be submitted today.
    pub async fn check(&self, user: &str, question_id: &str) -> Result<QuotaDecision, StoreError> {
        self.check_on(user, question_id, Utc::now().date_naive()).await
    }

    /// Same as [`check`](Self::check) with an explicit day boundary.
    pub async fn check_on(
        &self,
        user: &str,
        question_id: &str,
        day: NaiveDate,
    ) -> Result<QuotaDecision, StoreError> {
        let attempts = self.store.attempts_on(user, day).await?;
        // Only practice attempts occupy slots; timed tests are unmetered.
        let practice: Vec<_> = attempts
            .iter()
            .filter(|a| matches!(a.key, AttemptKey::Practice { .. }))
            .collect();

        let mastered = practice.iter().any(|attempt| {
            attempt
                .result
                .entries
                .iter()
                .any(|e| e.question_id == question_id && e.is_correct == Some(true))
        });
        if mastered {
            return Ok(QuotaDecision::AlreadyMastered);
        }

        let used = practice.len() as u32;
        if used >= self.limit {
            return Ok(QuotaDecision::Blocked { limit: self.limit });
        }
        Ok(QuotaDecision::Allowed {
            used,
            limit: self.limit,
        })
    }
}
