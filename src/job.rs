//! Job requests and the values they are built from.

use crate::error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

static RE_JOB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(_\d+)?$").unwrap());

// minutes | minutes:seconds | hours:minutes:seconds
// days-hours | days-hours:minutes | days-hours:minutes:seconds
static RE_WALL_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(:\d+){0,2}|\d+-\d+(:\d+){0,2})$").unwrap());

/// Identifier assigned by SLURM to a submitted job.
///
/// Accepts plain job IDs (`12345`) and array task IDs (`12345_7`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Stand-in identifier handed out when nothing is actually submitted.
    pub fn placeholder(index: usize) -> Self {
        Self(format!("dry-run-{}", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for JobId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if RE_JOB_ID.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ParseError::JobId(s.to_string()))
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wall-time limit in one of the formats `sbatch --time` accepts.
///
/// The value is kept exactly as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallTime(String);

impl FromStr for WallTime {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if RE_WALL_TIME.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ParseError::WallTime(s.to_string()))
        }
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resources requested for every job of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    pub ncpus: u32,
    pub ngpus: u32,
    pub wall_time: WallTime,
}

/// One NAMD configuration file to be submitted.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Path to the NAMD configuration file, as given on the command line
    pub config: PathBuf,
    pub job_name: String,
    pub resources: Resources,
    /// Jobs that must finish successfully before this one starts
    pub after: Vec<JobId>,
}

impl JobRequest {
    pub fn new(config: PathBuf, resources: Resources, after: Vec<JobId>) -> Self {
        let job_name = job_name(&config);
        Self {
            config,
            job_name,
            resources,
            after,
        }
    }

    /// Directory the job is submitted from.
    pub fn work_dir(&self) -> PathBuf {
        match self.config.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Path of the generated batch script, next to the configuration file.
    pub fn script_path(&self) -> PathBuf {
        self.config.with_extension("slurm")
    }

    /// Batch script file name, relative to [`work_dir`](Self::work_dir).
    pub fn script_name(&self) -> String {
        file_name(&self.script_path())
    }

    /// Configuration file name, relative to [`work_dir`](Self::work_dir).
    pub fn config_name(&self) -> String {
        file_name(&self.config)
    }

    /// File that receives NAMD's standard output.
    pub fn output_name(&self) -> String {
        let stem = self
            .config
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{}.out", stem)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Derive a SLURM job name from a configuration path.
pub fn job_name(config: &Path) -> String {
    job_name_with_home(config, home::home_dir())
}

fn job_name_with_home(config: &Path, home: Option<PathBuf>) -> String {
    // Symlinks stay unresolved; the resolved home matches as well.
    let absolute = std::path::absolute(config).unwrap_or_else(|_| {
        std::env::current_dir()
            .unwrap_or_default()
            .join(config)
    });
    let homes: Vec<PathBuf> = home
        .into_iter()
        .flat_map(|home| {
            let resolved = home.canonicalize().ok();
            std::iter::once(home).chain(resolved)
        })
        .collect();
    job_name_from(&absolute, &homes)
}

/// Join the components of `path` relative to the closest enclosing git work
/// tree (keeping the work tree's own name) or to a home directory, whichever
/// comes first walking upwards. Falls back to the full path.
fn job_name_from(path: &Path, homes: &[PathBuf]) -> String {
    for parent in path.ancestors().skip(1) {
        if parent.join(".git").exists() {
            if let (Some(name), Ok(relative)) = (parent.file_name(), path.strip_prefix(parent)) {
                return join_components(&Path::new(name).join(relative));
            }
        }
        if homes.iter().any(|home| home == parent) {
            if let Ok(relative) = path.strip_prefix(parent) {
                return join_components(relative);
            }
        }
    }

    join_components(path)
}

fn join_components(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_")
}
