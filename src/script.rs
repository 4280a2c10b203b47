//! SLURM batch script generation for NAMD runs.

use crate::error::ScriptError;
use crate::job::JobRequest;
use std::fs;
use std::path::PathBuf;

/// How NAMD is made available and launched on the compute node.
#[derive(Debug, Clone)]
pub struct Launcher {
    /// Environment module providing NAMD
    pub module: String,
    /// NAMD executable name
    pub namd: String,
}

impl Default for Launcher {
    fn default() -> Self {
        Self {
            module: "namd3".to_string(),
            namd: "namd3".to_string(),
        }
    }
}

/// Render the batch script for `request`.
pub fn render_script(request: &JobRequest, launcher: &Launcher) -> String {
    let resources = &request.resources;
    let mut script = String::new();

    script.push_str("#!/bin/bash\n\n");
    script.push_str(&format!(
        "#SBATCH --job-name={}\n",
        shell_words::quote(&request.job_name)
    ));
    script.push_str(&format!("#SBATCH --time={}\n", resources.wall_time));
    script.push_str("#SBATCH --nodes=1\n");
    script.push_str(&format!("#SBATCH --ntasks-per-node={}\n", resources.ncpus));
    if resources.ngpus > 0 {
        script.push_str(&format!("#SBATCH --gpus={}\n", resources.ngpus));
    }

    script.push_str("\nmodule purge\n");
    script.push_str(&format!("module load {}\n\n", launcher.module));

    script.push_str(&format!(
        "{} +p {} +setcpuaffinity",
        launcher.namd, resources.ncpus
    ));
    if resources.ngpus > 0 {
        script.push_str(" +devices ${CUDA_VISIBLE_DEVICES}");
    }
    script.push_str(&format!(
        " {} > {}\n",
        shell_words::quote(&request.config_name()),
        shell_words::quote(&request.output_name())
    ));

    script
}

/// Write the batch script next to the configuration file and return its path.
pub fn write_script(request: &JobRequest, launcher: &Launcher) -> Result<PathBuf, ScriptError> {
    let path = request.script_path();
    if let Err(error) = fs::write(&path, render_script(request, launcher)) {
        return Err(ScriptError { path, error });
    }
    log::debug!("wrote {} for {}", path.display(), request.config.display());
    Ok(path)
}
