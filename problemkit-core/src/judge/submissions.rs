use std::time::Duration;

use serde_derive::Serialize;

use super::{common::run_submission, table::VerdictTable, SubmissionReport, Verdict, VerdictCount};
use crate::{
    compiler::CompilerCache,
    error::CoreError,
    package::{Problem, SubmissionEntry},
    run::pool::run_ordered,
    settings::{Settings, ValidationMode},
    validate::{get_validators, ValidatorKind},
};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub problem: String,
    pub submissions: Vec<SubmissionReport>,
    pub table: Option<VerdictTable>,
    /// Every submission got the verdict its directory promises.
    pub success: bool,
}

/// Judge every submission of `problem` against all testcases with answers.
///
/// Submissions run in parallel, each one on a single thread; a lone
/// submission gets all jobs for its testcases instead. Reports come back in
/// submission order.
pub fn run_submissions(
    problem: &Problem,
    settings: &Settings,
    cache: &CompilerCache,
) -> Result<RunReport, CoreError> {
    if settings.validation == ValidationMode::CustomInteractive {
        return Err(CoreError::Unsupported(
            "judging interactive problems".to_owned(),
        ));
    }

    let testcases = problem.testcases(true, false)?;
    let output_validators = if settings.validation == ValidationMode::Custom {
        let validators = get_validators(problem, ValidatorKind::Output, cache)?;
        if validators.is_empty() {
            log::warn!("{}: custom validation without output validators", problem.name);
        }
        validators
    } else {
        vec![]
    };
    let entries = if settings.submissions.is_empty() {
        problem.submissions()?
    } else {
        problem.named_submissions(&settings.submissions)?
    };
    log::info!(
        "{}: judging {} submissions on {} testcases",
        problem.name,
        entries.len(),
        testcases.len()
    );

    let (outer_jobs, inner_settings) = if entries.len() > 1 {
        (
            settings.jobs,
            Settings {
                jobs: 1,
                ..settings.clone()
            },
        )
    } else {
        (1, settings.clone())
    };

    let scratch = tempfile::Builder::new()
        .prefix("problemkit_run_")
        .tempdir()?;
    let results = run_ordered(outer_jobs, &entries, |idx, entry: &SubmissionEntry| {
        let run_command = match cache.build_program(&entry.path) {
            Ok(run_command) => run_command,
            Err(e) => {
                log::error!("{:<50} failed to build: {}", entry.name, e);
                return Ok(build_failure(entry, e.to_string()));
            }
        };
        run_submission(
            &entry.name,
            &run_command,
            &testcases,
            &inner_settings,
            &output_validators,
            entry.expected,
            &scratch.path().join(idx.to_string()),
        )
    });

    let mut submissions = vec![];
    for result in results {
        submissions.push(result?);
    }
    let success = submissions.iter().all(SubmissionReport::passed);

    let table = if settings.table {
        let names: Vec<String> = testcases.iter().map(|t| t.name.clone()).collect();
        Some(VerdictTable::build(
            &names,
            &submissions,
            settings.table_threshold,
        ))
    } else {
        None
    };

    Ok(RunReport {
        problem: problem.name.clone(),
        submissions,
        table,
        success,
    })
}

/// Report for a submission that never ran. Build failures count as run time
/// errors.
fn build_failure(entry: &SubmissionEntry, error: String) -> SubmissionReport {
    SubmissionReport {
        name: entry.name.clone(),
        expected: entry.expected,
        verdict: Verdict::RunTimeError,
        counts: VerdictCount::default(),
        outcomes: vec![],
        time_max: Duration::ZERO,
        time_total: Duration::ZERO,
        build_error: Some(error),
    }
}
