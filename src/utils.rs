//! Utility functions for SLURM command execution and output parsing.

use crate::error::SubmitError;
use crate::job::JobId;
use crossterm::style::StyledContent;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Display;
use std::io::IsTerminal;
use std::path::Path;
use std::process::Command;

static RE_SUBMITTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Submitted batch job (\d+)").unwrap());

/// Result of running a SLURM command
#[derive(Debug)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub return_code: Option<i32>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.return_code == Some(0)
    }
}

/// Execute a command in `work_dir` and capture stdout, stderr, and return code.
///
/// # Arguments
/// * `cmd` - Program followed by its arguments
/// * `work_dir` - Working directory of the child process
pub fn run_slurm_command(cmd: &[String], work_dir: &Path) -> Result<CommandResult, SubmitError> {
    let Some((program, args)) = cmd.split_first() else {
        return Err(SubmitError::Spawn {
            program: String::new(),
            error: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        });
    };

    let output = Command::new(program)
        .args(args)
        .current_dir(work_dir)
        .output()
        .map_err(|error| SubmitError::Spawn {
            program: program.clone(),
            error,
        })?;

    Ok(CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        return_code: output.status.code(),
    })
}

/// Parse job ID from sbatch output.
///
/// Typical sbatch output: "Submitted batch job 12345". With `--parsable`
/// sbatch prints just "12345" or "12345;cluster".
pub fn parse_job_id(sbatch_output: &str) -> Option<JobId> {
    if let Some(m) = RE_SUBMITTED
        .captures(sbatch_output)
        .and_then(|caps| caps.get(1))
    {
        return m.as_str().parse().ok();
    }

    sbatch_output
        .split_whitespace()
        .last()?
        .split(';')
        .next()?
        .parse()
        .ok()
}

/// Output stream a status label is written to.
#[derive(Debug, Clone, Copy)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn is_terminal(self) -> bool {
        match self {
            Stream::Stdout => std::io::stdout().is_terminal(),
            Stream::Stderr => std::io::stderr().is_terminal(),
        }
    }
}

/// Render `content` with its style only if `stream` is a terminal.
pub fn styled<D: Display>(content: StyledContent<D>, stream: Stream) -> String {
    paint(content, stream.is_terminal())
}

fn paint<D: Display>(content: StyledContent<D>, terminal: bool) -> String {
    if terminal {
        content.to_string()
    } else {
        content.content().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::style::Stylize;
    use tempfile::TempDir;

    #[test]
    fn test_paint_plain_off_terminal() {
        assert_eq!(paint("Submitted".green(), false), "Submitted");
        assert_eq!(paint("Running:".bold(), false), "Running:");
    }

    #[test]
    fn test_paint_styles_on_terminal() {
        let painted = paint("Failed".red(), true);
        assert!(painted.contains('\x1b'));
        assert!(painted.contains("Failed"));
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(
            parse_job_id("Submitted batch job 12345").map(|id| id.to_string()),
            Some("12345".to_string())
        );
        assert_eq!(
            parse_job_id("Submitted batch job 999999999\n").map(|id| id.to_string()),
            Some("999999999".to_string())
        );
        assert_eq!(parse_job_id("Invalid output"), None);
        assert_eq!(parse_job_id(""), None);
    }

    #[test]
    fn test_parse_job_id_parsable() {
        assert_eq!(
            parse_job_id("4242\n").map(|id| id.to_string()),
            Some("4242".to_string())
        );
        assert_eq!(
            parse_job_id("4242;cluster1").map(|id| id.to_string()),
            Some("4242".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command_in_work_dir() {
        let dir = TempDir::new().unwrap();
        let cmd = vec!["pwd".to_string()];
        let result = run_slurm_command(&cmd, dir.path()).unwrap();
        assert!(result.success());
        let reported = std::path::PathBuf::from(result.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command_failure() {
        let dir = TempDir::new().unwrap();
        let cmd = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo boom >&2; exit 3".to_string(),
        ];
        let result = run_slurm_command(&cmd, dir.path()).unwrap();
        assert!(!result.success());
        assert_eq!(result.return_code, Some(3));
        assert_eq!(result.stderr.trim(), "boom");
    }

    #[test]
    fn test_run_missing_program() {
        let dir = TempDir::new().unwrap();
        let cmd = vec!["subnamd-no-such-program".to_string()];
        let err = run_slurm_command(&cmd, dir.path()).unwrap_err();
        assert!(matches!(err, SubmitError::Spawn { .. }));
    }
}
