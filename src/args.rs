use clap::{Parser, Subcommand};

/// Builds, checks and analyzes the county election margins dataset.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Reads all the sources of a pipeline configuration and writes the dataset.
    Build {
        /// (file path) The pipeline configuration in JSON format.
        #[clap(short, long, value_parser)]
        config: String,
        /// (file path, 'stdout' or empty) Overrides the output path of the configuration.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (file path) A reference dataset. If provided, the produced dataset must be identical to it.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
        /// (file path or empty) Where to write the build report. By default it is only logged.
        #[clap(long, value_parser)]
        report: Option<String>,
    },
    /// Recomputes every derived field of a dataset and reports the differences.
    Validate {
        /// (file path) The dataset to check.
        #[clap(short, long, value_parser)]
        input: String,
        /// If passed, overwrites the mismatching fields and rewrites the dataset in place.
        #[clap(long, takes_value = false)]
        fix: bool,
        /// (file path, 'stdout' or empty) Where to write the validation report.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
    /// Reports the extremes, swings, flips and realignments of a dataset.
    Scan {
        /// (file path) The dataset to analyze.
        #[clap(short, long, value_parser)]
        input: String,
        /// (list of comma-separated values) The contests to scan. Defaults to President, Governor and US Senate.
        #[clap(long, value_parser, use_value_delimiter = true)]
        contests: Option<Vec<String>>,
        /// (integer) Only consider the N most recent years.
        #[clap(long, value_parser)]
        window: Option<usize>,
        /// (integer, default 6) Number of counties in the realignment ranking.
        #[clap(long, value_parser)]
        top: Option<usize>,
        /// (file path, 'stdout' or empty) Where to write the trend report.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
}
