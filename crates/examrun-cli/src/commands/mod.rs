pub mod history;
pub mod init;
pub mod run;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use examrun_store::{load_config_from, HttpRecordStore, MemoryRecordStore, RecordStore};

/// Open the record backend: HTTP per config, or the in-memory store for
/// offline runs.
pub(crate) fn open_store(
    offline: bool,
    config_path: Option<&Path>,
) -> Result<Arc<dyn RecordStore>> {
    if offline {
        let store = MemoryRecordStore::new();
        seed_sample_questions(&store);
        return Ok(Arc::new(store));
    }
    let config = load_config_from(config_path)?;
    Ok(Arc::new(HttpRecordStore::new(&config)?))
}

/// Bank-schema sample questions, ids `sample-1..3`; matches the session
/// definition `init` writes.
pub(crate) fn seed_sample_questions(store: &MemoryRecordStore) {
    let samples = [
        (
            "sample-1",
            "A body moves with constant velocity. What is its acceleration?",
            ["Zero", "Constant and non-zero", "Increasing", "Decreasing"],
            "A",
        ),
        (
            "sample-2",
            "Which quantity is a vector?",
            ["Speed", "Distance", "Displacement", "Mass"],
            "C",
        ),
        (
            "sample-3",
            "The SI unit of force is the",
            ["joule", "newton", "watt", "pascal"],
            "B",
        ),
    ];

    for (id, text, options, correct) in samples {
        store.seed(
            "question_bank",
            id,
            serde_json::json!({
                "questionText": text,
                "optionA": options[0],
                "optionB": options[1],
                "optionC": options[2],
                "optionD": options[3],
                "correctOption": correct,
                "marks": 1,
                "subject": "Physics",
                "lesson": "Mechanics",
                "difficulty": "easy",
            }),
        );
    }
}
