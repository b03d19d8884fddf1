//! The `examrun init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create examrun.toml
    if std::path::Path::new("examrun.toml").exists() {
        println!("examrun.toml already exists, skipping.");
    } else {
        std::fs::write("examrun.toml", SAMPLE_CONFIG)?;
        println!("Created examrun.toml");
    }

    // Create example session definition
    std::fs::create_dir_all("sessions")?;
    let example_path = std::path::Path::new("sessions/sample.toml");
    if example_path.exists() {
        println!("sessions/sample.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, SAMPLE_SESSION)?;
        println!("Created sessions/sample.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit examrun.toml with your backend URL and token");
    println!("  2. Try it offline: examrun run --session sessions/sample.toml --offline");
    println!("  3. Review results: examrun history --user learner-1 --test sample --offline");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examrun configuration

# Base URL of the record backend.
server_url = "http://127.0.0.1:8090"

# Bearer token sent as the Authorization header.
auth_token = "${EXAMRUN_TOKEN}"

# Request timeout in seconds.
timeout_secs = 30
"#;

const SAMPLE_SESSION: &str = r#"[session]
kind = "test"
user = "learner-1"
test_id = "sample"
model = "chapter_wise"
duration_mins = 5

# These ids exist in the offline sample bank; point at your own records
# when running against a real backend.
question_ids = ["sample-1", "sample-2", "sample-3"]
"#;
