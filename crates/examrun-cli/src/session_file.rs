//! TOML session definitions.
//!
//! A session file declares what to run: the kind (timed test or daily
//! practice), the question ids, the paper model, and the optional access
//! code. It maps directly onto [`SessionConfig`].

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use examrun_core::model::{SessionConfig, SessionKind, TestModel};

#[derive(Debug, Deserialize)]
struct SessionDoc {
    session: SessionEntry,
}

#[derive(Debug, Deserialize)]
struct SessionEntry {
    kind: String,
    user: String,
    #[serde(default)]
    test_id: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    lesson: Option<String>,
    question_ids: Vec<String>,
    #[serde(default = "default_model")]
    model: TestModel,
    #[serde(default)]
    duration_mins: Option<u32>,
    #[serde(default)]
    access_code: Option<String>,
}

fn default_model() -> TestModel {
    TestModel::ChapterWise
}

/// Parse and validate a session definition file.
pub fn load(path: &Path) -> Result<SessionConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read session file: {}", path.display()))?;
    let doc: SessionDoc = toml::from_str(&content)
        .with_context(|| format!("invalid session file: {}", path.display()))?;
    into_config(doc.session)
}

fn into_config(entry: SessionEntry) -> Result<SessionConfig> {
    if entry.user.trim().is_empty() {
        bail!("session.user must not be empty");
    }
    if entry.question_ids.is_empty() {
        bail!("session.question_ids must not be empty");
    }

    let kind = match entry.kind.as_str() {
        "test" => {
            let Some(test_id) = entry.test_id else {
                bail!("kind = \"test\" requires session.test_id");
            };
            SessionKind::Test {
                user: entry.user,
                test_id,
            }
        }
        "practice" => {
            let (Some(subject), Some(lesson)) = (entry.subject, entry.lesson) else {
                bail!("kind = \"practice\" requires session.subject and session.lesson");
            };
            SessionKind::Practice {
                user: entry.user,
                subject,
                lesson,
            }
        }
        other => bail!("unknown session kind: {other} (expected \"test\" or \"practice\")"),
    };

    Ok(SessionConfig {
        kind,
        question_ids: entry.question_ids,
        test_model: entry.model,
        duration_mins: entry.duration_mins,
        access_code: entry.access_code,
        access_verified: false,
    })
}
