//! CLI entry point and argument definitions.

use crate::job::{JobId, JobRequest, Resources, WallTime};
use crate::job_manager::{JobManager, SubmissionReport};
use crate::scheduler::{DryRun, Sbatch, Scheduler, SchedulerCommand};
use crate::script::{write_script, Launcher};
use crate::utils::{styled, Stream};
use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use crossterm::style::Stylize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// subnamd - Submit NAMD jobs specified by CONFIG to SLURM.
#[derive(Debug, Parser)]
#[command(name = "subnamd")]
#[command(version)]
#[command(about = "Submit NAMD jobs specified by CONFIG to SLURM")]
pub struct Cli {
    /// NAMD configuration files, submitted in the order given
    #[arg(value_name = "CONFIG", required = true, value_parser = parse_config_path)]
    pub configs: Vec<PathBuf>,

    /// Number of CPUs
    #[arg(
        short = 'n',
        long,
        env = "SUBNAMD_NCPUS",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..=64)
    )]
    pub ncpus: u32,

    /// Number of GPUs
    #[arg(
        short = 'g',
        long,
        env = "SUBNAMD_NGPUS",
        default_value_t = 0,
        value_parser = clap::value_parser!(u32).range(0..=4)
    )]
    pub ngpus: u32,

    /// Wall time ([D-]HH:MM:SS and the other forms sbatch accepts)
    #[arg(short = 'w', long, env = "SUBNAMD_WALL_TIME", default_value = "12:00:00")]
    pub wall_time: WallTime,

    /// Start after the specified job exited OK (may be repeated)
    #[arg(long, value_name = "JOB_ID")]
    pub after: Vec<JobId>,

    /// Submit jobs as a dependency chain
    #[arg(long)]
    pub chain: bool,

    /// Write the batch scripts and print the commands, but do not submit
    #[arg(long, conflicts_with = "sbatch")]
    pub dry_run: bool,

    /// Environment module that provides NAMD
    #[arg(long, env = "SUBNAMD_MODULE", default_value = "namd3")]
    pub module: String,

    /// NAMD executable
    #[arg(long, env = "SUBNAMD_BIN", default_value = "namd3")]
    pub namd: String,

    /// Command used to submit batch scripts
    #[arg(long, value_name = "COMMAND")]
    pub sbatch: Option<SchedulerCommand>,

    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,
}

/// Accept only existing regular files whose batch script would not overwrite them.
fn parse_config_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if !path.exists() {
        return Err(format!("file '{}' does not exist", value));
    }
    if path.is_dir() {
        return Err(format!("'{}' is a directory", value));
    }
    if path.extension().is_some_and(|ext| ext == "slurm") {
        return Err(format!(
            "'{}' has the .slurm extension and would be overwritten by its batch script",
            value
        ));
    }
    Ok(path)
}

impl Cli {
    fn resources(&self) -> Resources {
        Resources {
            ncpus: self.ncpus,
            ngpus: self.ngpus,
            wall_time: self.wall_time.clone(),
        }
    }

    fn launcher(&self) -> Launcher {
        Launcher {
            module: self.module.clone(),
            namd: self.namd.clone(),
        }
    }

    /// Reject argument combinations that a single value parser cannot see.
    ///
    /// Two configuration files with the same stem in the same directory would
    /// share one batch script, so the second would overwrite the first.
    pub fn validate(&self) -> Result<(), clap::Error> {
        let mut scripts: HashMap<PathBuf, &PathBuf> = HashMap::new();
        for (config, request) in self.configs.iter().zip(self.job_requests()) {
            let script = script_key(&request);
            let Some(previous) = scripts.insert(script.clone(), config) else {
                continue;
            };
            // Listing the same file twice rewrites an identical script.
            if same_file(previous, config) {
                continue;
            }
            return Err(Cli::command().error(
                ErrorKind::ValueValidation,
                format!(
                    "'{}' and '{}' would both use the batch script '{}'",
                    previous.display(),
                    config.display(),
                    script.display()
                ),
            ));
        }
        Ok(())
    }

    /// One request per configuration file, all sharing the same resources.
    pub fn job_requests(&self) -> Vec<JobRequest> {
        let resources = self.resources();
        self.configs
            .iter()
            .map(|config| JobRequest::new(config.clone(), resources.clone(), self.after.clone()))
            .collect()
    }
}

/// Script location with the directory resolved, so `eq.conf` and `./eq.namd` collide.
fn script_key(request: &JobRequest) -> PathBuf {
    match request.work_dir().canonicalize() {
        Ok(dir) => dir.join(request.script_name()),
        Err(_) => request.script_path(),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Handle a submission: write every batch script, then submit.
pub fn handle_submit(cli: Cli) -> Result<()> {
    let requests = cli.job_requests();
    let launcher = cli.launcher();

    for request in &requests {
        write_script(request, &launcher)?;
    }

    if cli.chain && !cli.after.is_empty() {
        let ids: Vec<&str> = cli.after.iter().map(JobId::as_str).collect();
        log::info!("chain starts after job(s) {}", ids.join(", "));
    }

    let scheduler: Box<dyn Scheduler> = if cli.dry_run {
        Box::new(DryRun::default())
    } else {
        Box::new(Sbatch)
    };
    let mut job_manager = JobManager::new(scheduler, cli.sbatch.clone().unwrap_or_default());
    let report = job_manager.submit_all(&requests, cli.chain);

    print_report(&report, cli.dry_run);

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} submission(s) failed, {} not attempted",
            report.failed.len(),
            requests.len(),
            report.skipped.len()
        );
    }

    Ok(())
}

fn print_report(report: &SubmissionReport, dry_run: bool) {
    let verb = if dry_run { "Prepared" } else { "Submitted" };
    for (config, job_id) in &report.submitted {
        println!(
            "{} {} as job {}",
            styled(verb.green(), Stream::Stdout),
            config.display(),
            job_id
        );
    }
    for (config, err) in &report.failed {
        eprintln!(
            "{} {}: {}",
            styled("Failed".red(), Stream::Stderr),
            config.display(),
            err
        );
    }
    for config in &report.skipped {
        eprintln!(
            "{} {} (chain broken)",
            styled("Skipped".yellow(), Stream::Stderr),
            config.display()
        );
    }
}
