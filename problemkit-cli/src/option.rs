use std::{io::Write, path::PathBuf};

use chrono::Local;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Problem or contest directory, may be repeated. A contest directory
    /// stands for every problem inside it. Defaults to the current directory.
    #[arg(long, global = true)]
    pub problem: Vec<PathBuf>,
    /// Raise the log level to debug
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Print reports as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,
    /// Number of parallel jobs, defaults to the number of cores
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,
    /// Path of the checktestdata binary
    #[arg(long, global = true)]
    pub checktestdata: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Generate testdata from generators/gen.yaml
    Generate {
        /// Overwrite changed testcases
        #[arg(short, long)]
        force: bool,
        /// Allow overwriting samples, together with --force
        #[arg(long)]
        samples: bool,
        /// Submission producing the answers
        #[arg(long)]
        submission: Option<String>,
    },
    /// Remove the testdata gen.yaml accounts for
    Clean,
    /// Run input and answer validators
    Validate {
        /// Only validate inputs
        #[arg(long, conflicts_with = "output")]
        input: bool,
        /// Only validate answers
        #[arg(long)]
        output: bool,
    },
    /// Judge submissions against the testdata
    Run {
        /// Keep running after the first failed testcase
        #[arg(long)]
        no_lazy: bool,
        /// Print the verdict analysis table
        #[arg(long)]
        table: bool,
        /// Submissions to run, relative to the problem directory
        submissions: Vec<String>,
    },
    /// Regenerate answer files with a submission
    Answers {
        #[arg(long)]
        submission: Option<String>,
        /// Overwrite answers that changed
        #[arg(short, long)]
        force: bool,
    },
    /// Count testcases, validators and submissions
    Stats,
    /// Generate, validate and run everything
    All {
        #[arg(short, long)]
        force: bool,
    },
}

pub fn setup_logger(verbose: u8) {
    let default_filter = if verbose > 0 { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:5} [{}:{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.file().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                &record.args()
            )
        })
        .init();
}
