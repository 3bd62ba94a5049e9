mod option;

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use option::{Cli, Commands};
use problemkit_core::{
    compiler::CompilerCache,
    generate,
    judge::{run_submissions, RunReport},
    package::{find_problems, Problem, ProblemStats},
    settings::Settings,
    validate::{validate, ValidatorKind},
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    option::setup_logger(cli.verbose);
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the command on every selected problem. Succeeds only if it succeeds
/// on all of them.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let dirs = if cli.problem.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.problem.clone()
    };
    let mut problems = vec![];
    for dir in dirs.iter() {
        let found = find_problems(dir)?;
        if found.is_empty() {
            log::warn!("no problems found in {:?}", dir);
        }
        problems.extend(found);
    }

    let build_dir = tempfile::Builder::new().prefix("problemkit_").tempdir()?;
    let mut cache = CompilerCache::new(build_dir.path().to_path_buf());
    if let Some(checktestdata) = &cli.checktestdata {
        cache = cache.with_checktestdata(checktestdata.clone());
    }

    if matches!(cli.command, Commands::Stats) && !cli.json {
        println!("{}", stats_header());
    }
    let mut json = vec![];
    let mut success = true;
    for problem in problems.iter() {
        let problem_success = match run_problem(&cli, problem, &cache, &mut json) {
            Ok(problem_success) => problem_success,
            Err(e) => {
                log::error!("{}: {:#}", problem.name, e);
                false
            }
        };
        if problem_success {
            log::info!("{}: done", problem.name);
        } else {
            log::warn!("{}: finished with failures", problem.name);
        }
        success &= problem_success;
    }
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(success)
}

fn run_problem(
    cli: &Cli,
    problem: &Problem,
    cache: &CompilerCache,
    json: &mut Vec<serde_json::Value>,
) -> anyhow::Result<bool> {
    log::debug!("problem {} at {:?}", problem.name, problem.path);
    let mut settings = Settings::load(&problem.path)?;
    settings.verbose = cli.verbose;
    if let Some(jobs) = cli.jobs {
        settings.jobs = jobs.max(1);
    }
    settings.checktestdata = cli.checktestdata.clone();

    let success = match cli.command.clone() {
        Commands::Generate {
            force,
            samples,
            submission,
        } => {
            settings.force = force;
            settings.samples = samples;
            settings.submission = submission;
            generate::generate(problem, &settings, cache)?
        }
        Commands::Clean => generate::clean(problem)?,
        Commands::Validate { input, output } => {
            let mut success = true;
            if !output {
                success &= validate(problem, ValidatorKind::Input, &settings, cache)?;
            }
            if !input {
                success &= validate(problem, ValidatorKind::Output, &settings, cache)?;
            }
            success
        }
        Commands::Run {
            no_lazy,
            table,
            submissions,
        } => {
            settings.lazy = !no_lazy;
            settings.table = table;
            settings.submissions = submissions;
            let report = run_submissions(problem, &settings, cache)?;
            print_report(&report, cli.json, json)?;
            report.success
        }
        Commands::Answers { submission, force } => {
            settings.submission = submission;
            settings.force = force;
            let stats = generate::generate_answers(problem, &settings, cache)?;
            if cli.json {
                json.push(serde_json::to_value(&stats)?);
            }
            stats.failed == 0
        }
        Commands::Stats => {
            let stats = problem.stats()?;
            if cli.json {
                json.push(serde_json::to_value(&stats)?);
            } else {
                println!("{}", stats_line(&stats));
            }
            true
        }
        Commands::All { force } => {
            settings.force = force;
            let mut success = true;
            if problem.generators_dir().join("gen.yaml").is_file() {
                success &= generate::generate(problem, &settings, cache)?;
            }
            success &= validate(problem, ValidatorKind::Input, &settings, cache)?;
            success &= validate(problem, ValidatorKind::Output, &settings, cache)?;
            let report = run_submissions(problem, &settings, cache)?;
            print_report(&report, cli.json, json)?;
            success && report.success
        }
    };
    Ok(success)
}

fn stats_header() -> String {
    format!(
        "{:<20} {:>4} {:>4} {:>3} {:>3} {:>6} {:>6} {:>3} {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>3}",
        "problem", "yaml", "gen", "in", "out", "sample", "secret", "bad", "AC", "WA", "TLE", "RTE", "c++", "java", "py"
    )
}

fn stats_line(stats: &ProblemStats) -> String {
    let flag = |present: bool| if present { "Y" } else { "-" };
    format!(
        "{:<20} {:>4} {:>4} {:>3} {:>3} {:>6} {:>6} {:>3} {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>3}",
        stats.name,
        flag(stats.problem_yaml),
        flag(stats.gen_yaml),
        stats.input_validators,
        stats.output_validators,
        stats.sample,
        stats.secret,
        stats.bad,
        stats.accepted,
        stats.wrong_answer,
        stats.time_limit_exceeded,
        stats.run_time_error,
        stats.accepted_cpp,
        stats.accepted_java,
        stats.accepted_python,
    )
}

fn print_report(
    report: &RunReport,
    as_json: bool,
    json: &mut Vec<serde_json::Value>,
) -> anyhow::Result<()> {
    if as_json {
        json.push(serde_json::to_value(report)?);
        return Ok(());
    }
    for submission in report.submissions.iter() {
        if let Some(error) = &submission.build_error {
            println!("{:<50} build failed: {}", submission.name, error);
        } else if !submission.passed() {
            println!(
                "{:<50} got {} but expected {}",
                submission.name, submission.verdict, submission.expected
            );
        }
    }
    if let Some(table) = &report.table {
        print!("{}", table);
    }
    Ok(())
}
