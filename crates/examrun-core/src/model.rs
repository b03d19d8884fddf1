//! Core data model types for examrun.
//!
//! These are the fundamental types the whole system uses to represent
//! questions, per-question answer state, and session inputs.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four answer option labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    /// All labels in display order.
    pub const ALL: [OptionLabel; 4] = [
        OptionLabel::A,
        OptionLabel::B,
        OptionLabel::C,
        OptionLabel::D,
    ];

    /// Zero-based position of this label.
    pub fn index(self) -> usize {
        match self {
            OptionLabel::A => 0,
            OptionLabel::B => 1,
            OptionLabel::C => 2,
            OptionLabel::D => 3,
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionLabel::A => write!(f, "A"),
            OptionLabel::B => write!(f, "B"),
            OptionLabel::C => write!(f, "C"),
            OptionLabel::D => write!(f, "D"),
        }
    }
}

impl FromStr for OptionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(OptionLabel::A),
            "B" => Ok(OptionLabel::B),
            "C" => Ok(OptionLabel::C),
            "D" => Ok(OptionLabel::D),
            other => Err(format!("unknown option label: {other}")),
        }
    }
}

/// Question difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" | "moderate" => Ok(Difficulty::Medium),
            "hard" | "difficult" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Subjects in the fixed full-length paper order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    Physics,
    Chemistry,
    Mathematics,
    Biology,
}

impl Subject {
    /// Fixed concatenation order for full-length papers.
    pub const PAPER_ORDER: [Subject; 4] = [
        Subject::Physics,
        Subject::Chemistry,
        Subject::Mathematics,
        Subject::Biology,
    ];
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Physics => write!(f, "Physics"),
            Subject::Chemistry => write!(f, "Chemistry"),
            Subject::Mathematics => write!(f, "Mathematics"),
            Subject::Biology => write!(f, "Biology"),
        }
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "physics" => Ok(Subject::Physics),
            "chemistry" => Ok(Subject::Chemistry),
            "mathematics" | "maths" | "math" => Ok(Subject::Mathematics),
            "biology" => Ok(Subject::Biology),
            other => Err(format!("unknown subject: {other}")),
        }
    }
}

/// Which upstream collection a question was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionOrigin {
    /// The primary question bank (lower-camel fields).
    Bank,
    /// The legacy question table (upper-camel fields, raw image URLs).
    Legacy,
}

/// One labeled answer option. Both fields are optional upstream; an option
/// with neither text nor image is simply rendered empty by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A normalized question. Immutable once fetched for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Record identifier in the upstream collection.
    pub id: String,
    /// Stem text.
    #[serde(default)]
    pub text: Option<String>,
    /// Stem image, resolved to an absolute URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Options A through D, in label order.
    pub options: [QuestionOption; 4],
    /// The single correct option label.
    pub correct: OptionLabel,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub explanation_image_url: Option<String>,
    /// Marks awarded for an exact match.
    #[serde(default = "default_marks")]
    pub marks: u32,
    pub subject: String,
    pub lesson: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Which upstream schema this question came from.
    pub origin: QuestionOrigin,
}

fn default_marks() -> u32 {
    1
}

impl Question {
    /// The option carried under a given label.
    pub fn option(&self, label: OptionLabel) -> &QuestionOption {
        &self.options[label.index()]
    }
}

/// One question's answer state, mutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    /// Currently selected option, if any.
    #[serde(default)]
    pub selected: Option<OptionLabel>,
    /// Correct label cached at session start; never recomputed from the
    /// question afterwards, so the score cannot drift against the ledger.
    pub correct: OptionLabel,
    /// Marks cached alongside the correct label so aggregates can be
    /// recomputed from the log alone.
    #[serde(default = "default_marks")]
    pub marks: u32,
    /// Computed only at scoring time.
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub marked_for_review: bool,
    /// Whether the learner ever navigated to this question.
    #[serde(default)]
    pub visited: bool,
    /// Set when the record was seeded from a prior submitted attempt.
    #[serde(default)]
    pub answer_checked: bool,
    /// Cumulative whole seconds spent viewing this question.
    #[serde(default)]
    pub time_spent_secs: u64,
}

impl AnswerRecord {
    /// A fresh, unanswered record for a question.
    pub fn fresh(question: &Question) -> Self {
        Self {
            question_id: question.id.clone(),
            selected: None,
            correct: question.correct,
            marks: question.marks,
            is_correct: None,
            marked_for_review: false,
            visited: false,
            answer_checked: false,
            time_spent_secs: 0,
        }
    }
}

/// The per-question answer ledger for one session. Sized at session start,
/// never shrinks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    entries: HashMap<String, AnswerRecord>,
}

impl Ledger {
    /// Initialize one nulled record per loaded question.
    pub fn seed(questions: &[Question]) -> Self {
        let entries = questions
            .iter()
            .map(|q| (q.id.clone(), AnswerRecord::fresh(q)))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, question_id: &str) -> Option<&AnswerRecord> {
        self.entries.get(question_id)
    }

    pub fn get_mut(&mut self, question_id: &str) -> Option<&mut AnswerRecord> {
        self.entries.get_mut(question_id)
    }

    /// Replace an entry wholesale (resume seeding).
    pub fn put(&mut self, record: AnswerRecord) {
        self.entries.insert(record.question_id.clone(), record);
    }

    /// Entries in the order of the given question list. Questions without a
    /// ledger entry are skipped; the engine never produces that state.
    pub fn in_order(&self, questions: &[Question]) -> Vec<AnswerRecord> {
        questions
            .iter()
            .filter_map(|q| self.entries.get(&q.id).cloned())
            .collect()
    }
}

/// Declared shape of the paper being administered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestModel {
    /// Exactly one subject's questions.
    ChapterWise,
    /// Multi-subject, concatenated in [`Subject::PAPER_ORDER`].
    FullLength,
}

/// What kind of session is being run; determines the attempt key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SessionKind {
    /// A timed test keyed by (user, test).
    Test { user: String, test_id: String },
    /// A daily-practice problem keyed by (user, subject, lesson).
    Practice {
        user: String,
        subject: String,
        lesson: String,
    },
}

impl SessionKind {
    pub fn user(&self) -> &str {
        match self {
            SessionKind::Test { user, .. } | SessionKind::Practice { user, .. } => user,
        }
    }
}

/// Everything a host supplies to run one session. Ambient browser state
/// (like a cached PIN verification) is passed in explicitly so the engine
/// stays a function of its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub kind: SessionKind,
    /// Explicit question ids, order-preserving.
    pub question_ids: Vec<String>,
    pub test_model: TestModel,
    /// Countdown duration in minutes; unset or zero falls back to 60.
    #[serde(default)]
    pub duration_mins: Option<u32>,
    /// Optional PIN gating the instructions screen.
    #[serde(default)]
    pub access_code: Option<String>,
    /// True when a prior verification for this test is already cached.
    #[serde(default)]
    pub access_verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, correct: OptionLabel) -> Question {
        Question {
            id: id.into(),
            text: Some("stem".into()),
            image_url: None,
            options: Default::default(),
            correct,
            explanation: None,
            explanation_image_url: None,
            marks: 1,
            subject: "Physics".into(),
            lesson: "Kinematics".into(),
            difficulty: Difficulty::Medium,
            origin: QuestionOrigin::Bank,
        }
    }

    #[test]
    fn option_label_display_and_parse() {
        assert_eq!(OptionLabel::A.to_string(), "A");
        assert_eq!("b".parse::<OptionLabel>().unwrap(), OptionLabel::B);
        assert_eq!(" C ".parse::<OptionLabel>().unwrap(), OptionLabel::C);
        assert!("E".parse::<OptionLabel>().is_err());
    }

    #[test]
    fn difficulty_parse_aliases() {
        assert_eq!("Easy".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert_eq!("moderate".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert_eq!("difficult".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn subject_parse_aliases() {
        assert_eq!("maths".parse::<Subject>().unwrap(), Subject::Mathematics);
        assert_eq!(" physics ".parse::<Subject>().unwrap(), Subject::Physics);
        assert!("geography".parse::<Subject>().is_err());
    }

    #[test]
    fn ledger_seeds_one_nulled_record_per_question() {
        let questions = vec![question("q1", OptionLabel::A), question("q2", OptionLabel::C)];
        let ledger = Ledger::seed(&questions);
        assert_eq!(ledger.len(), 2);
        let entry = ledger.get("q2").unwrap();
        assert_eq!(entry.selected, None);
        assert_eq!(entry.correct, OptionLabel::C);
        assert_eq!(entry.time_spent_secs, 0);
        assert!(!entry.visited);
    }

    #[test]
    fn ledger_in_order_follows_question_order() {
        let questions = vec![question("q2", OptionLabel::B), question("q1", OptionLabel::A)];
        let ledger = Ledger::seed(&questions);
        let ordered = ledger.in_order(&questions);
        assert_eq!(ordered[0].question_id, "q2");
        assert_eq!(ordered[1].question_id, "q1");
    }

    #[test]
    fn question_serde_defaults_marks() {
        let json = serde_json::json!({
            "id": "q1",
            "options": [{}, {}, {}, {}],
            "correct": "A",
            "subject": "Physics",
            "lesson": "Waves",
            "origin": "bank"
        });
        let q: Question = serde_json::from_value(json).unwrap();
        assert_eq!(q.marks, 1);
        assert_eq!(q.difficulty, Difficulty::Medium);
    }
}
