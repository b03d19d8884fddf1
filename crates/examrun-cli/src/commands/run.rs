//! The `examrun run` command.
//!
//! Drives one session interactively: PIN gate, instructions, then a loop
//! multiplexing learner input against the one-second countdown tick.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use examrun_core::model::{OptionLabel, SessionKind};
use examrun_core::palette::PaletteStatus;
use examrun_core::quota::{DailyQuotaGuard, QuotaDecision};
use examrun_core::scoring::{AttemptResult, AttemptStatus};
use examrun_core::session::{NavTarget, SessionEngine, Stage, SubmitTrigger, Tick};
use examrun_core::traits::AttemptStore;
use examrun_store::{AttemptStoreAdapter, QuestionSourceAdapter};

use crate::commands::open_store;
use crate::session_file;

pub async fn execute(
    session_path: PathBuf,
    offline: bool,
    daily_limit: u32,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(daily_limit >= 1, "daily limit must be at least 1");

    let config = session_file::load(&session_path)?;
    let store = open_store(offline, config_path.as_deref())?;
    let questions = Arc::new(QuestionSourceAdapter::new(Arc::clone(&store)));
    let attempts: Arc<dyn AttemptStore> =
        Arc::new(AttemptStoreAdapter::new(Arc::clone(&store)));

    // Daily-practice sessions consume a quota slot per submission; a
    // question already answered correctly today is exempt.
    if let SessionKind::Practice { user, .. } = &config.kind {
        let guard = DailyQuotaGuard::new(Arc::clone(&attempts), daily_limit);
        let question_id = config
            .question_ids
            .first()
            .context("session has no question ids")?;
        match guard.check(user, question_id).await? {
            QuotaDecision::Blocked { limit } => {
                println!("Daily practice limit reached ({limit} per day). Try again tomorrow.");
                return Ok(());
            }
            QuotaDecision::AlreadyMastered => {
                println!("Already solved today; this session won't use a practice slot.");
            }
            QuotaDecision::Allowed { used, limit } => {
                println!("Practice slot {}/{limit} for today.", used + 1);
            }
        }
    }

    let mut engine = SessionEngine::new(config, questions, attempts);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // PIN gate. Unlimited retries; the session only opens on a match.
    while engine.stage() == &Stage::Gate {
        println!("Enter access PIN:");
        let Some(line) = lines.next_line().await? else {
            anyhow::bail!("input closed before the PIN was verified");
        };
        if engine.verify_access_code(&line).is_err() {
            println!("Incorrect PIN.");
        }
    }

    engine.begin().await?;
    tracing::info!(
        session = %engine.session_id(),
        questions = engine.questions().len(),
        "session started"
    );
    println!(
        "\n{} questions, {} minutes. Commands: a-d select, n/p move, g N goto, r mark, x clear, s submit.",
        engine.questions().len(),
        engine.remaining_secs().unwrap_or(0) / 60,
    );
    render(&engine);

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let stored = loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // stdin closed: submit what we have.
                    break engine.submit(SubmitTrigger::Manual).await?;
                };
                match handle_command(&mut engine, line.trim()).await? {
                    Outcome::Continue => render(&engine),
                    Outcome::Submitted(stored) => break stored,
                    Outcome::Quit => {
                        println!("Session abandoned; nothing was saved.");
                        return Ok(());
                    }
                }
            }
            _ = interval.tick() => {
                if let Tick::Expired(stored) = engine.tick().await? {
                    println!("\nTime's up — submitting automatically.");
                    break Some(stored);
                }
            }
        }
    };

    match stored {
        Some(stored) => print_result(&stored.result),
        None => println!("Nothing to submit."),
    }
    Ok(())
}

enum Outcome {
    Continue,
    Submitted(Option<examrun_core::traits::StoredAttempt>),
    Quit,
}

async fn handle_command(engine: &mut SessionEngine, input: &str) -> Result<Outcome> {
    match input {
        "" => {}
        "n" => engine.navigate(NavTarget::Next),
        "p" => engine.navigate(NavTarget::Prev),
        "r" => engine.toggle_review_mark(),
        "x" => engine.clear_response(),
        "q" => return Ok(Outcome::Quit),
        "s" => {
            // Confirmation prompt suspends the countdown in a UI host; here
            // submission is immediate.
            let stored = engine.submit(SubmitTrigger::Manual).await?;
            return Ok(Outcome::Submitted(stored));
        }
        other => {
            if let Some(rest) = other.strip_prefix("g ") {
                match rest.trim().parse::<usize>() {
                    Ok(n) if n >= 1 => engine.navigate(NavTarget::Index(n - 1)),
                    _ => println!("Usage: g <question number>"),
                }
            } else if let Ok(label) = other.parse::<OptionLabel>() {
                engine.select_option(label);
            } else {
                println!("Unknown command: {other}");
            }
        }
    }
    Ok(Outcome::Continue)
}

fn render(engine: &SessionEngine) {
    if engine.stage() != &Stage::Running {
        return;
    }
    let Some(question) = engine.current_question() else {
        return;
    };

    let remaining = engine.remaining_secs().unwrap_or(0);
    println!(
        "\n[{}] Q{}/{} — {}",
        format_clock(remaining),
        engine.current_index() + 1,
        engine.questions().len(),
        palette_line(&engine.palette()),
    );
    if let Some(text) = &question.text {
        println!("{text}");
    }
    if let Some(url) = &question.image_url {
        println!("(image: {url})");
    }
    let entry = engine.ledger().get(&question.id);
    for label in OptionLabel::ALL {
        let marker = match entry.and_then(|e| e.selected) {
            Some(selected) if selected == label => ">",
            _ => " ",
        };
        let option = question.option(label);
        let text = option.text.as_deref().unwrap_or("");
        match &option.image_url {
            Some(url) => println!(" {marker} {label}. {text} (image: {url})"),
            None => println!(" {marker} {label}. {text}"),
        }
    }
}

fn palette_line(statuses: &[PaletteStatus]) -> String {
    statuses
        .iter()
        .map(|s| match s {
            PaletteStatus::Active => '*',
            PaletteStatus::NotVisited => '.',
            PaletteStatus::Answered => 'a',
            PaletteStatus::NotAnswered => 'o',
            PaletteStatus::MarkedForReview => 'm',
            PaletteStatus::MarkedAndAnswered => 'M',
        })
        .collect()
}

fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn print_result(result: &AttemptResult) {
    use comfy_table::{Cell, Table};

    let status = match &result.status {
        AttemptStatus::Completed => "completed".to_string(),
        AttemptStatus::Terminated(reason) => format!("terminated ({reason})"),
    };
    println!(
        "\nScore: {}/{} ({:.1}%) — {} correct, {} incorrect, {} unattempted — {status}",
        result.score,
        result.max_score,
        result.percentage,
        result.counts.correct,
        result.counts.incorrect,
        result.counts.unattempted,
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
