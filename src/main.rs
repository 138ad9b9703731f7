mod args;
mod pipeline;

use clap::Parser;
use env_logger::Env;
use log::{debug, warn};
use snafu::ErrorCompat;

use crate::args::{Args, Command};
use crate::pipeline::PipelineResult;

fn run(args: Args) -> PipelineResult<bool> {
    match args.command {
        Command::Build {
            config,
            out,
            reference,
            report,
        } => {
            pipeline::run_build(&config, out, reference, report)?;
            Ok(true)
        }
        Command::Validate { input, fix, out } => pipeline::run_validate(&input, fix, out),
        Command::Scan {
            input,
            contests,
            window,
            top,
            out,
        } => {
            pipeline::run_scan(&input, contests, window, top, out)?;
            Ok(true)
        }
    }
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
    debug!("args: {:?}", args);

    match run(args) {
        Ok(true) => {}
        Ok(false) => {
            warn!("the dataset has mismatches");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("An error occured: {}", e);
            if let Some(bt) = ErrorCompat::backtrace(&e) {
                eprintln!("trace: {}", bt);
            }
            std::process::exit(1);
        }
    }
}
