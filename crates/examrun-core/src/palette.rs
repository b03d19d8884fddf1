//! Question-palette projection.
//!
//! A pure function of one ledger entry; the palette grid is reproducible
//! from the ledger alone with no hidden state.

use serde::{Deserialize, Serialize};

use crate::model::AnswerRecord;

/// Visual classification of one palette cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteStatus {
    /// The question currently on screen. Overrides everything else.
    Active,
    NotVisited,
    Answered,
    NotAnswered,
    MarkedForReview,
    MarkedAndAnswered,
}

/// Classify one entry for the palette. `is_current` always wins.
pub fn classify(record: &AnswerRecord, is_current: bool) -> PaletteStatus {
    if is_current {
        return PaletteStatus::Active;
    }
    match (record.selected.is_some(), record.marked_for_review) {
        (true, true) => PaletteStatus::MarkedAndAnswered,
        (true, false) => PaletteStatus::Answered,
        (false, true) => PaletteStatus::MarkedForReview,
        (false, false) if record.visited => PaletteStatus::NotAnswered,
        (false, false) => PaletteStatus::NotVisited,
    }
}
