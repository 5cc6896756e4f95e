//! Remote console commands and their replies.

use crate::executor::BackupOrchestrator;
use crate::transfer::progress::format_bytes;
use crate::EngineError;

pub const HELP: &str = "\
Commands:
  list          List registered backup jobs
  status        Show status and progress of every job
  start <name>  Run a job and wait for it to finish
  stop <name>   Stop a running job
  help          Show this summary
Send an empty line to disconnect.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Status,
    Start(String),
    Stop(String),
    Help,
    Unknown(String),
}

impl Command {
    /// Parse one input line. The verb is case-insensitive; the rest of the
    /// line is the job name.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        match (verb.to_lowercase().as_str(), arg.is_empty()) {
            ("list", true) => Self::List,
            ("status", true) => Self::Status,
            ("help", true) => Self::Help,
            ("start", false) => Self::Start(arg.to_string()),
            ("stop", false) => Self::Stop(arg.to_string()),
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Run `command` against the orchestrator and render the reply (no trailing newline).
pub async fn dispatch(command: Command, orchestrator: &BackupOrchestrator) -> String {
    match command {
        Command::List => list(orchestrator).await,
        Command::Status => status(orchestrator).await,
        Command::Start(name) => start(orchestrator, &name).await,
        Command::Stop(name) => stop(orchestrator, &name).await,
        Command::Help => HELP.to_string(),
        Command::Unknown(input) => {
            format!("Unknown command: '{}'. Type 'help' for the command list.", input)
        }
    }
}

async fn list(orchestrator: &BackupOrchestrator) -> String {
    let jobs = orchestrator.jobs().await;
    if jobs.is_empty() {
        return "No backup jobs registered.".to_string();
    }

    let mut out = format!("Jobs ({}):", jobs.len());
    for job in &jobs {
        out.push_str(&format!(
            "\n- {} | {} | {} -> {} | {}",
            job.name,
            job.backup_type,
            job.source_path.display(),
            job.destination_path.display(),
            job.status
        ));
    }
    out
}

async fn status(orchestrator: &BackupOrchestrator) -> String {
    let jobs = orchestrator.jobs().await;
    if jobs.is_empty() {
        return "No backup jobs registered.".to_string();
    }

    let mut out = String::from("Status:");
    for job in &jobs {
        out.push_str(&format!(
            "\n- {}: {} {}% ({})",
            job.name,
            job.status,
            job.progress,
            format_bytes(job.total_file_size)
        ));
    }
    out
}

async fn start(orchestrator: &BackupOrchestrator, name: &str) -> String {
    if orchestrator.job(name).await.is_none() {
        return EngineError::JobNotFound(name.to_string()).to_string();
    }

    match orchestrator.execute(&[name]).await.into_iter().next() {
        Some(report) if report.succeeded() => format!("Job {} completed.", name),
        Some(report) => format!(
            "Job {} ended {}: {}",
            name,
            report.status,
            report.error.as_deref().unwrap_or("unknown error")
        ),
        None => EngineError::JobNotFound(name.to_string()).to_string(),
    }
}

async fn stop(orchestrator: &BackupOrchestrator, name: &str) -> String {
    if orchestrator.stop(name) {
        format!("Stop requested for job {}.", name)
    } else if orchestrator.job(name).await.is_some() {
        format!("Job {} is not running.", name)
    } else {
        EngineError::JobNotFound(name.to_string()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("list"), Command::List);
        assert_eq!(Command::parse("  STATUS "), Command::Status);
        assert_eq!(Command::parse("start My Docs"), Command::Start("My Docs".to_string()));
        assert_eq!(Command::parse("stop J1"), Command::Stop("J1".to_string()));
        assert_eq!(Command::parse("help"), Command::Help);
        assert_eq!(Command::parse("start"), Command::Unknown("start".to_string()));
        assert_eq!(Command::parse("list all"), Command::Unknown("list all".to_string()));
        assert_eq!(Command::parse("format c:"), Command::Unknown("format c:".to_string()));
    }
}
