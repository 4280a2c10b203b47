//! Submission commands and the schedulers that execute them.

use crate::error::{ParseError, SubmitError};
use crate::job::{JobId, JobRequest};
use crate::utils::{parse_job_id, run_slurm_command, styled, Stream};
use crossterm::style::Stylize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Command line used to reach sbatch, e.g. `sbatch` or `ssh login sbatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerCommand(Vec<String>);

impl Default for SchedulerCommand {
    fn default() -> Self {
        Self(vec!["sbatch".to_string()])
    }
}

impl FromStr for SchedulerCommand {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words = shell_words::split(s).map_err(|e| ParseError::Command(e.to_string()))?;
        if words.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        Ok(Self(words))
    }
}

/// A fully rendered sbatch invocation for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitCommand {
    /// Program and arguments
    pub argv: Vec<String>,
    /// Directory to run the command in
    pub work_dir: PathBuf,
}

impl SubmitCommand {
    /// Render the invocation that submits `request` once `dependencies` have
    /// completed successfully.
    pub fn new(scheduler: &SchedulerCommand, request: &JobRequest, dependencies: &[JobId]) -> Self {
        let resources = &request.resources;
        let mut argv = scheduler.0.clone();

        argv.push(format!("--job-name={}", request.job_name));
        argv.push(format!("--time={}", resources.wall_time));
        argv.push("--nodes=1".to_string());
        argv.push(format!("--ntasks-per-node={}", resources.ncpus));
        if resources.ngpus > 0 {
            argv.push(format!("--gpus={}", resources.ngpus));
        }
        if !dependencies.is_empty() {
            let ids: Vec<&str> = dependencies.iter().map(JobId::as_str).collect();
            argv.push(format!("--dependency=afterok:{}", ids.join(":")));
        }
        argv.push(request.script_name());

        Self {
            argv,
            work_dir: request.work_dir(),
        }
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    /// Job IDs named in the `--dependency` flag, if any.
    pub fn dependencies(&self) -> Vec<String> {
        self.argv
            .iter()
            .filter_map(|arg| arg.strip_prefix("--dependency=afterok:"))
            .flat_map(|ids| ids.split(':'))
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for SubmitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_words::join(&self.argv))
    }
}

/// Something that accepts submission commands and hands back job IDs.
pub trait Scheduler {
    fn submit(&mut self, command: &SubmitCommand) -> Result<JobId, SubmitError>;
}

/// Submits jobs by running sbatch.
#[derive(Debug, Default)]
pub struct Sbatch;

impl Scheduler for Sbatch {
    fn submit(&mut self, command: &SubmitCommand) -> Result<JobId, SubmitError> {
        println!("{} {}", styled("Running:".bold(), Stream::Stdout), command);

        let result = run_slurm_command(&command.argv, &command.work_dir)?;
        if !result.success() {
            return Err(SubmitError::Failed {
                program: command.program().to_string(),
                exit_code: result.return_code,
                stderr: result.stderr.trim().to_string(),
            });
        }

        parse_job_id(&result.stdout).ok_or_else(|| SubmitError::UnparsableJobId {
            program: command.program().to_string(),
            stdout: result.stdout.trim().to_string(),
        })
    }
}

/// Prints commands instead of running them.
#[derive(Debug, Default)]
pub struct DryRun {
    issued: usize,
}

impl Scheduler for DryRun {
    fn submit(&mut self, command: &SubmitCommand) -> Result<JobId, SubmitError> {
        self.issued += 1;
        println!(
            "{} {} (in {})",
            styled("Would run:".bold(), Stream::Stdout),
            command,
            command.work_dir.display()
        );
        Ok(JobId::placeholder(self.issued))
    }
}
