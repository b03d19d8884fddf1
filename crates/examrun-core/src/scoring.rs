//! Ledger scoring and the durable attempt result.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AnswerRecord, Ledger, Question};

/// Why a session was terminated instead of completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The countdown reached zero.
    TimeUp,
    /// The session had nothing to run.
    NoQuestions,
    /// Host-supplied reason (e.g. a proctoring rule).
    Other(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::TimeUp => write!(f, "time_up"),
            TerminationReason::NoQuestions => write!(f, "no_questions"),
            TerminationReason::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// Terminal status tag written with every attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum AttemptStatus {
    Completed,
    Terminated(TerminationReason),
}

/// Aggregated answer counts. Invariants:
/// `attempted = correct + incorrect` and `attempted + unattempted = total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptCounts {
    pub correct: u32,
    pub incorrect: u32,
    pub attempted: u32,
    pub unattempted: u32,
    pub total: u32,
}

/// The durable, scored outcome of one session submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    /// Session identifier that produced this result.
    pub session_id: Uuid,
    pub counts: AttemptCounts,
    pub score: u32,
    pub max_score: u32,
    pub percentage: f64,
    /// Wall-clock duration of the session in whole seconds.
    pub duration_secs: u64,
    /// The frozen ledger, in question order.
    pub entries: Vec<AnswerRecord>,
    pub status: AttemptStatus,
    pub completed_at: DateTime<Utc>,
}

/// Recompute counts and score from a log alone. Each entry carries its
/// cached correct label and marks, so this needs no question lookup; the
/// attempt store reuses it after merging logs across sessions.
pub fn aggregate_entries(entries: &[AnswerRecord]) -> (AttemptCounts, u32, u32) {
    let mut counts = AttemptCounts {
        total: entries.len() as u32,
        ..Default::default()
    };
    let mut score = 0u32;
    let mut max_score = 0u32;

    for entry in entries {
        max_score += entry.marks;
        match entry.selected {
            Some(selected) if selected == entry.correct => {
                counts.correct += 1;
                counts.attempted += 1;
                score += entry.marks;
            }
            Some(_) => {
                counts.incorrect += 1;
                counts.attempted += 1;
            }
            None => counts.unattempted += 1,
        }
    }

    (counts, score, max_score)
}

/// Score a session: fix each entry's correctness flag, then aggregate in
/// question order. Correctness is computed here and nowhere earlier, so a
/// changed answer can never leak a stale flag into the host before
/// submission.
pub fn score_session(
    session_id: Uuid,
    questions: &[Question],
    ledger: &mut Ledger,
    duration_secs: u64,
    status: AttemptStatus,
) -> AttemptResult {
    for question in questions {
        if let Some(entry) = ledger.get_mut(&question.id) {
            entry.is_correct = entry.selected.map(|s| s == entry.correct);
        }
    }

    let entries = ledger.in_order(questions);
    let (counts, score, max_score) = aggregate_entries(&entries);
    let percentage = if max_score == 0 {
        0.0
    } else {
        score as f64 / max_score as f64 * 100.0
    };

    AttemptResult {
        session_id,
        counts,
        score,
        max_score,
        percentage,
        duration_secs,
        entries,
        status,
        completed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, OptionLabel, QuestionOrigin};

    fn question(id: &str, correct: OptionLabel, marks: u32) -> Question {
        Question {
            id: id.into(),
            text: None,
            image_url: None,
            options: Default::default(),
            correct,
            explanation: None,
            explanation_image_url: None,
            marks,
            subject: "Physics".into(),
            lesson: "Optics".into(),
            difficulty: Difficulty::Medium,
            origin: QuestionOrigin::Bank,
        }
    }

    #[test]
    fn count_invariants_hold() {
        let questions = vec![
            question("q1", OptionLabel::A, 1),
            question("q2", OptionLabel::B, 1),
            question("q3", OptionLabel::C, 1),
        ];
        let mut ledger = Ledger::seed(&questions);
        ledger.get_mut("q1").unwrap().selected = Some(OptionLabel::A);
        ledger.get_mut("q2").unwrap().selected = Some(OptionLabel::D);

        let result = score_session(
            Uuid::nil(),
            &questions,
            &mut ledger,
            30,
            AttemptStatus::Completed,
        );

        assert_eq!(result.counts.correct, 1);
        assert_eq!(result.counts.incorrect, 1);
        assert_eq!(result.counts.unattempted, 1);
        assert_eq!(
            result.counts.attempted,
            result.counts.correct + result.counts.incorrect
        );
        assert_eq!(
            result.counts.attempted + result.counts.unattempted,
            result.counts.total
        );
        assert!(result.score <= result.max_score);
    }

    #[test]
    fn marks_weight_the_score() {
        let questions = vec![
            question("q1", OptionLabel::A, 4),
            question("q2", OptionLabel::B, 2),
        ];
        let mut ledger = Ledger::seed(&questions);
        ledger.get_mut("q1").unwrap().selected = Some(OptionLabel::A);

        let result = score_session(
            Uuid::nil(),
            &questions,
            &mut ledger,
            10,
            AttemptStatus::Completed,
        );
        assert_eq!(result.score, 4);
        assert_eq!(result.max_score, 6);
        assert!((result.percentage - 400.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn correctness_is_fixed_at_scoring_time() {
        let questions = vec![question("q1", OptionLabel::B, 1)];
        let mut ledger = Ledger::seed(&questions);
        assert_eq!(ledger.get("q1").unwrap().is_correct, None);

        ledger.get_mut("q1").unwrap().selected = Some(OptionLabel::B);
        let result = score_session(
            Uuid::nil(),
            &questions,
            &mut ledger,
            5,
            AttemptStatus::Completed,
        );
        assert_eq!(result.entries[0].is_correct, Some(true));
        assert_eq!(ledger.get("q1").unwrap().is_correct, Some(true));
    }

    #[test]
    fn empty_ledger_scores_zero_percent() {
        let result = score_session(
            Uuid::nil(),
            &[],
            &mut Ledger::default(),
            0,
            AttemptStatus::Terminated(TerminationReason::NoQuestions),
        );
        assert_eq!(result.max_score, 0);
        assert_eq!(result.percentage, 0.0);
        assert_eq!(result.counts.total, 0);
    }

    #[test]
    fn termination_reason_serializes_as_snake_case() {
        let status = AttemptStatus::Terminated(TerminationReason::TimeUp);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "terminated");
        assert_eq!(json["reason"], "time_up");
        assert_eq!(TerminationReason::TimeUp.to_string(), "time_up");
    }

    #[test]
    fn attempt_result_json_roundtrip() {
        let questions = vec![question("q1", OptionLabel::A, 1)];
        let mut ledger = Ledger::seed(&questions);
        let result = score_session(
            Uuid::new_v4(),
            &questions,
            &mut ledger,
            12,
            AttemptStatus::Completed,
        );
        let json = serde_json::to_string(&result).unwrap();
        let back: AttemptResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
