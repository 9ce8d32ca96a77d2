//! Run command implementation.

use crate::ResultView;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use trueplay_core::results::{self, RunStatus};
use trueplay_core::{Config, Playground};
use trueplay_types::{LogEntry, LogStatus};

/// Where the script to run comes from
#[derive(Debug, Clone)]
pub enum ScriptSource {
    File(PathBuf),
    Stdin,
    Template(String),
}

#[derive(Serialize)]
struct RunReport<'a> {
    status: RunStatus,
    network: &'a str,
    logs: &'a [LogEntry],
}

/// Run a script and print its log; exits with status 1 unless the run
/// produced a response
pub fn run_script(config_path: &Path, source: ScriptSource, json: bool, view: ResultView) -> Result<()> {
    let config = Config::load_or_default(config_path).context("Failed to load configuration")?;
    let mut playground = Playground::from_config(&config)?;

    let logs = match &source {
        ScriptSource::Template(id) => playground.run_template(id)?,
        ScriptSource::File(path) if path.as_os_str() == "-" => playground.run_source(&read_stdin()?),
        ScriptSource::File(path) => {
            let code = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
            playground.run_source(&code)
        }
        ScriptSource::Stdin => playground.run_source(&read_stdin()?),
    };
    let status = RunStatus::of(&logs);

    if json {
        let report = RunReport {
            status,
            network: playground.network_name(),
            logs: &logs,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_logs(&logs, view);
    }

    if status != RunStatus::Success {
        std::process::exit(1);
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut code = String::new();
    std::io::stdin()
        .read_to_string(&mut code)
        .context("Failed to read script from stdin")?;
    Ok(code)
}

fn print_logs(logs: &[LogEntry], view: ResultView) {
    let now = chrono::Utc::now().timestamp_millis();

    let console = results::console_entries(logs);
    if !console.is_empty() {
        println!("Logs ({})", console.len());
        for entry in console {
            let mark = if entry.status == LogStatus::Error { "✗" } else { "✓" };
            println!(
                "  {} [{}, {}] {}",
                mark,
                results::format_timestamp(entry.timestamp),
                results::time_ago(entry.timestamp, now),
                entry.message
            );
        }
        println!();
    }

    match results::response(logs) {
        Some(response) => {
            println!("Result");
            match view {
                ResultView::Code => println!("{}", results::format_json(response)),
                ResultView::Table => println!("{}", results::tabulate(response).render()),
            }
        }
        None => eprintln!("❌ Script failed without a result"),
    }
}
