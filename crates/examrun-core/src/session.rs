//! The session state machine.
//!
//! Owns the stage, the answer ledger, the countdown, and submission for one
//! test-taker's session. All mutation is synchronous within a call; the only
//! async boundaries are the two adapter traits, and re-entrant submission is
//! excluded by an in-flight flag rather than by host UI disablement.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::SessionError;
use crate::model::{Ledger, OptionLabel, Question, SessionConfig, SessionKind};
use crate::palette::{classify, PaletteStatus};
use crate::scoring::{score_session, AttemptStatus, TerminationReason};
use crate::traits::{
    AttemptKey, AttemptStore, QuestionRequest, QuestionSource, StoredAttempt,
};

/// Fallback countdown when the configured duration is unset or zero.
pub const DEFAULT_DURATION_MINS: u32 = 60;

/// Coarse-grained session phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting on the access-code challenge.
    Gate,
    /// Instructions screen; questions may not be loaded yet.
    Instructions,
    Running,
    Ended(EndState),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndState {
    Completed,
    Terminated { reason: String },
}

/// Navigation request relative to the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavTarget {
    Next,
    Prev,
    /// Absolute index; out-of-range values clamp to the nearest bound.
    Index(usize),
}

/// What initiated a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitTrigger {
    /// Explicit learner action; ends the session as completed.
    Manual,
    /// Engine-initiated; ends the session as terminated with a reason.
    Auto(TerminationReason),
}

/// Outcome of one timer tick.
#[derive(Debug)]
pub enum Tick {
    /// The session is not running; nothing happened.
    Idle,
    /// A confirmation prompt is open or a submission is in flight; the
    /// countdown did not move.
    Suspended,
    /// One second elapsed.
    Running { remaining_secs: u64 },
    /// The countdown hit zero and the automatic submission was persisted.
    Expired(StoredAttempt),
}

/// The exam-session engine.
///
/// Owns `SessionState` and the [`Ledger`] exclusively for the lifetime of
/// one session. Dropping the engine abandons an unsubmitted session; no
/// partial write happens on teardown.
pub struct SessionEngine {
    config: SessionConfig,
    questions_source: Arc<dyn QuestionSource>,
    attempts: Arc<dyn AttemptStore>,
    session_id: Uuid,
    stage: Stage,
    questions: Vec<Question>,
    ledger: Ledger,
    current: usize,
    remaining_secs: Option<u64>,
    started_at: Option<Instant>,
    entered_at: Option<Instant>,
    submitting: bool,
    prompt_open: bool,
}

impl SessionEngine {
    pub fn new(
        config: SessionConfig,
        questions_source: Arc<dyn QuestionSource>,
        attempts: Arc<dyn AttemptStore>,
    ) -> Self {
        let gated = config.access_code.is_some() && !config.access_verified;
        Self {
            config,
            questions_source,
            attempts,
            session_id: Uuid::new_v4(),
            stage: if gated { Stage::Gate } else { Stage::Instructions },
            questions: Vec::new(),
            ledger: Ledger::default(),
            current: 0,
            remaining_secs: None,
            started_at: None,
            entered_at: None,
            submitting: false,
            prompt_open: false,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    pub fn remaining_secs(&self) -> Option<u64> {
        self.remaining_secs
    }

    /// The attempt key this session will write under.
    pub fn attempt_key(&self) -> AttemptKey {
        AttemptKey::from(&self.config.kind)
    }

    /// Check a supplied access code against the configured one. Both sides
    /// are trimmed before comparison. On mismatch the stage stays at the
    /// gate and retries are unlimited.
    pub fn verify_access_code(&mut self, input: &str) -> Result<(), SessionError> {
        if self.stage != Stage::Gate {
            return Ok(());
        }
        match &self.config.access_code {
            Some(code) if code.trim() == input.trim() => {
                self.stage = Stage::Instructions;
                Ok(())
            }
            _ => Err(SessionError::AccessDenied),
        }
    }

    /// Transition `Instructions -> Running`: load questions if needed, seed
    /// the ledger, apply practice-resume history, and start the countdown.
    ///
    /// Fails closed into `Ended(Terminated)` when zero questions resolve.
    /// Any store failure leaves the stage at `Instructions` so the host can
    /// retry.
    pub async fn begin(&mut self) -> Result<(), SessionError> {
        match self.stage {
            Stage::Gate => return Err(SessionError::GateClosed),
            Stage::Running | Stage::Ended(_) => return Ok(()),
            Stage::Instructions => {}
        }

        if self.questions.is_empty() {
            let request = QuestionRequest {
                ids: self.config.question_ids.clone(),
                model: self.config.test_model,
            };
            let batch = self.questions_source.fetch(&request).await?;
            for dropped in &batch.dropped {
                tracing::warn!(id = %dropped.id, reason = %dropped.reason, "question dropped from session");
            }
            self.questions = batch.questions;
        }

        if self.questions.is_empty() {
            self.stage = Stage::Ended(EndState::Terminated {
                reason: TerminationReason::NoQuestions.to_string(),
            });
            return Err(SessionError::NoQuestions);
        }

        let mut ledger = Ledger::seed(&self.questions);

        // A practice question the learner already submitted keeps its
        // logged answer; revisiting never re-prompts.
        if matches!(self.config.kind, SessionKind::Practice { .. }) {
            if let Some(prior) = self.attempts.find_latest(&self.attempt_key()).await? {
                for question in &self.questions {
                    if let Some(entry) = prior
                        .result
                        .entries
                        .iter()
                        .find(|e| e.question_id == question.id && e.selected.is_some())
                    {
                        let mut seeded = entry.clone();
                        seeded.answer_checked = true;
                        seeded.visited = true;
                        // Time restarts at zero; the store sums time across
                        // visits when the session is submitted again.
                        seeded.time_spent_secs = 0;
                        ledger.put(seeded);
                    }
                }
            }
        }

        let duration_mins = match self.config.duration_mins {
            Some(mins) if mins > 0 => mins,
            _ => DEFAULT_DURATION_MINS,
        };

        self.ledger = ledger;
        self.current = 0;
        self.remaining_secs = Some(u64::from(duration_mins) * 60);
        let now = Instant::now();
        self.started_at = Some(now);
        self.entered_at = Some(now);
        if let Some(entry) = self.current_entry_mut() {
            entry.visited = true;
        }
        self.stage = Stage::Running;
        Ok(())
    }

    /// Set the current question's selected option. Clears any previously
    /// computed correctness; correctness only exists after scoring.
    pub fn select_option(&mut self, label: OptionLabel) {
        if self.stage != Stage::Running {
            return;
        }
        if let Some(entry) = self.current_entry_mut() {
            entry.selected = Some(label);
            entry.is_correct = None;
        }
    }

    /// Null the current question's selection.
    pub fn clear_response(&mut self) {
        if self.stage != Stage::Running {
            return;
        }
        if let Some(entry) = self.current_entry_mut() {
            entry.selected = None;
            entry.is_correct = None;
        }
    }

    /// Flip the review flag, independent of selection state.
    pub fn toggle_review_mark(&mut self) {
        if self.stage != Stage::Running {
            return;
        }
        if let Some(entry) = self.current_entry_mut() {
            entry.marked_for_review = !entry.marked_for_review;
        }
    }

    /// Move to another question. Accrues elapsed time into the current
    /// record first, then clamps the target into range. Total over any
    /// input; never errors.
    pub fn navigate(&mut self, target: NavTarget) {
        if self.stage != Stage::Running {
            return;
        }
        self.accrue_current();

        let last = self.questions.len().saturating_sub(1);
        self.current = match target {
            NavTarget::Next => (self.current + 1).min(last),
            NavTarget::Prev => self.current.saturating_sub(1),
            NavTarget::Index(i) => i.min(last),
        };
        if let Some(entry) = self.current_entry_mut() {
            entry.visited = true;
        }
    }

    /// Open or close the submit confirmation prompt. While open, the
    /// countdown is suspended so a user-initiated submit cannot race the
    /// automatic one.
    pub fn set_prompt_open(&mut self, open: bool) {
        self.prompt_open = open;
    }

    /// Advance the countdown by one second. Reaching zero fires exactly one
    /// automatic submission with reason `time_up`.
    pub async fn tick(&mut self) -> Result<Tick, SessionError> {
        if self.stage != Stage::Running {
            return Ok(Tick::Idle);
        }
        if self.prompt_open || self.submitting {
            return Ok(Tick::Suspended);
        }

        let remaining = self.remaining_secs.unwrap_or(0).saturating_sub(1);
        self.remaining_secs = Some(remaining);

        if remaining == 0 {
            match self
                .submit(SubmitTrigger::Auto(TerminationReason::TimeUp))
                .await?
            {
                Some(stored) => return Ok(Tick::Expired(stored)),
                // Already ended or in flight; nothing fired.
                None => return Ok(Tick::Idle),
            }
        }

        Ok(Tick::Running {
            remaining_secs: remaining,
        })
    }

    /// Score the ledger and write the attempt through the store.
    ///
    /// A no-op returning `Ok(None)` when the session already ended or a
    /// submission is in flight. On a store failure the stage does not
    /// advance: the in-flight flag clears, the ledger stays intact, and the
    /// error propagates so the host can retry.
    pub async fn submit(
        &mut self,
        trigger: SubmitTrigger,
    ) -> Result<Option<StoredAttempt>, SessionError> {
        if self.stage != Stage::Running || self.submitting {
            return Ok(None);
        }

        self.accrue_current();
        self.submitting = true;

        let status = match &trigger {
            SubmitTrigger::Manual => AttemptStatus::Completed,
            SubmitTrigger::Auto(reason) => AttemptStatus::Terminated(reason.clone()),
        };
        let duration_secs = self
            .started_at
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0);

        let result = score_session(
            self.session_id,
            &self.questions,
            &mut self.ledger,
            duration_secs,
            status.clone(),
        );

        let written = self.attempts.upsert(&self.attempt_key(), &result).await;
        self.submitting = false;

        match written {
            Ok(stored) => {
                self.stage = Stage::Ended(match status {
                    AttemptStatus::Completed => EndState::Completed,
                    AttemptStatus::Terminated(reason) => EndState::Terminated {
                        reason: reason.to_string(),
                    },
                });
                Ok(Some(stored))
            }
            Err(e) => {
                tracing::error!(error = %e, "attempt write failed; session stays resumable");
                Err(e.into())
            }
        }
    }

    /// Palette classification for every question, in question order.
    pub fn palette(&self) -> Vec<PaletteStatus> {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                self.ledger
                    .get(&q.id)
                    .map(|entry| classify(entry, i == self.current))
                    .unwrap_or(PaletteStatus::NotVisited)
            })
            .collect()
    }

    /// Add whole seconds since the last navigation (or session start) to
    /// the current record and reset the per-question clock. Runs before any
    /// index change and before scoring, so time never attributes to the
    /// wrong question.
    fn accrue_current(&mut self) {
        let now = Instant::now();
        let elapsed = self
            .entered_at
            .map(|t| now.duration_since(t).as_secs())
            .unwrap_or(0);
        self.entered_at = Some(now);
        if elapsed == 0 {
            return;
        }
        if let Some(entry) = self.current_entry_mut() {
            entry.time_spent_secs += elapsed;
        }
    }

    fn current_entry_mut(&mut self) -> Option<&mut crate::model::AnswerRecord> {
        let id = self.questions.get(self.current)?.id.clone();
        self.ledger.get_mut(&id)
    }
}
