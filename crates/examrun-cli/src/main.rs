//! examrun CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

mod commands;
mod session_file;

#[derive(Parser)]
#[command(name = "examrun", version, about = "Timed exam-session engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an exam session interactively
    Run {
        /// Path to a .toml session definition
        #[arg(long)]
        session: PathBuf,

        /// Use the built-in in-memory backend with sample questions
        #[arg(long)]
        offline: bool,

        /// Daily-practice submissions allowed per UTC day
        #[arg(long, default_value = "10")]
        daily_limit: u32,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show a learner's stored attempts
    History {
        /// Learner identifier
        #[arg(long)]
        user: String,

        /// Test id (timed-test attempts)
        #[arg(long)]
        test: Option<String>,

        /// Subject (practice attempts; requires --lesson)
        #[arg(long)]
        subject: Option<String>,

        /// Lesson (practice attempts; requires --subject)
        #[arg(long)]
        lesson: Option<String>,

        /// List every attempt on a UTC day (YYYY-MM-DD) instead
        #[arg(long)]
        day: Option<NaiveDate>,

        /// Use the built-in in-memory backend
        #[arg(long)]
        offline: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config and example session definition
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examrun=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            session,
            offline,
            daily_limit,
            config,
        } => commands::run::execute(session, offline, daily_limit, config).await,
        Commands::History {
            user,
            test,
            subject,
            lesson,
            day,
            offline,
            config,
        } => commands::history::execute(user, test, subject, lesson, day, offline, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
