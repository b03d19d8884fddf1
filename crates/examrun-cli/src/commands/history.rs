//! The `examrun history` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use comfy_table::{Cell, Table};

use examrun_core::scoring::AttemptStatus;
use examrun_core::traits::{AttemptKey, AttemptStore, StoredAttempt};
use examrun_store::AttemptStoreAdapter;

use crate::commands::open_store;

pub async fn execute(
    user: String,
    test: Option<String>,
    subject: Option<String>,
    lesson: Option<String>,
    day: Option<NaiveDate>,
    offline: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let store = open_store(offline, config_path.as_deref())?;
    let attempts = AttemptStoreAdapter::new(Arc::clone(&store));

    if let Some(day) = day {
        let found = attempts.attempts_on(&user, day).await?;
        if found.is_empty() {
            println!("No attempts on {day}.");
        } else {
            print_day(&found);
        }
        return Ok(());
    }

    let key = match (test, subject, lesson) {
        (Some(test_id), None, None) => AttemptKey::Test { user, test_id },
        (None, Some(subject), Some(lesson)) => AttemptKey::Practice {
            user,
            subject,
            lesson,
        },
        _ => bail!("pass either --test, or both --subject and --lesson"),
    };

    match attempts.find_latest(&key).await? {
        Some(stored) => print_attempt(&stored),
        None => println!("No attempt recorded."),
    }
    Ok(())
}

fn status_label(status: &AttemptStatus) -> String {
    match status {
        AttemptStatus::Completed => "completed".to_string(),
        AttemptStatus::Terminated(reason) => format!("terminated ({reason})"),
    }
}

fn print_day(found: &[StoredAttempt]) {
    let mut table = Table::new();
    table.set_header(vec!["Created", "Key", "Score", "Status"]);
    for stored in found {
        let key = match &stored.key {
            AttemptKey::Test { test_id, .. } => format!("test {test_id}"),
            AttemptKey::Practice {
                subject, lesson, ..
            } => format!("{subject} / {lesson}"),
        };
        table.add_row(vec![
            Cell::new(stored.created_at.format("%H:%M:%S")),
            Cell::new(key),
            Cell::new(format!(
                "{}/{} ({:.1}%)",
                stored.result.score, stored.result.max_score, stored.result.percentage
            )),
            Cell::new(status_label(&stored.result.status)),
        ]);
    }
    println!("{table}");
}

fn print_attempt(stored: &StoredAttempt) {
    let result = &stored.result;
    println!(
        "Attempt from {} — {}/{} ({:.1}%), {}s, {}",
        stored.created_at.format("%Y-%m-%d %H:%M UTC"),
        result.score,
        result.max_score,
        result.percentage,
        result.duration_secs,
        status_label(&result.status),
    );

    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Selected", "Correct", "Result", "Time"]);
    for (i, entry) in result.entries.iter().enumerate() {
        let selected = entry
            .selected
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        let verdict = match entry.is_correct {
            Some(true) => "right",
            Some(false) => "wrong",
            None => "-",
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&entry.question_id),
            Cell::new(selected),
            Cell::new(entry.correct),
            Cell::new(verdict),
            Cell::new(format!("{}s", entry.time_spent_secs)),
        ]);
    }
    println!("{table}");
}
