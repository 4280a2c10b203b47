mod cli;
mod error;
mod job;
mod job_manager;
mod scheduler;
mod script;
mod utils;

use clap::Parser;
use cli::Cli;
use error::ScriptError;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        e.exit();
    }

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .parse_default_env()
        .init();

    match cli::handle_submit(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            // Nothing was submitted if a script could not be written.
            if err.downcast_ref::<ScriptError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
