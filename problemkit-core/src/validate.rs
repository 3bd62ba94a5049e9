use std::{fmt, path::Path, str::FromStr, time::Duration};

use serde_derive::{Deserialize, Serialize};

use crate::{
    compiler::{CompilerCache, Language},
    error::CoreError,
    judge::{compare::AC_EXIT_CODE, ValidatorResult},
    package::Problem,
    run::{self, pool::run_ordered, ExecOptions, RunCommand},
    settings::{Settings, ValidationMode},
};

/// Flags every input and answer validator receives.
pub const VALIDATION_FLAGS: [&str; 2] = ["case_sensitive", "space_change_sensitive"];

const VALIDATOR_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidatorKind {
    Input,
    Output,
}

impl ValidatorKind {
    /// Extension of the file this kind checks.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Input => "in",
            Self::Output => "ans",
        }
    }
}

impl FromStr for ValidatorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            _ => Err(anyhow::anyhow!("Validator type must be input or output: {}", s)),
        }
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    pub name: String,
    pub command: RunCommand,
    pub language: Option<Language>,
}

impl Validator {
    /// checktestdata scripts read the file on stdin and signal success with
    /// exit code 0.
    pub fn is_checktestdata(&self) -> bool {
        self.language == Some(Language::Checktestdata)
    }

    fn accepts(&self, exit_code: Option<i32>) -> bool {
        exit_code == Some(AC_EXIT_CODE) || (self.is_checktestdata() && exit_code == Some(0))
    }
}

/// Build every validator of `kind`. A validator that fails to build fails
/// the whole set.
pub fn get_validators(
    problem: &Problem,
    kind: ValidatorKind,
    cache: &CompilerCache,
) -> Result<Vec<Validator>, CoreError> {
    let mut validators = vec![];
    for dir in problem.validator_dirs(kind) {
        for candidate in cache.build_directory(&dir, false)? {
            let command = candidate.build?;
            validators.push(Validator {
                name: candidate.name,
                language: Language::from_path(&candidate.path),
                command,
            });
        }
    }
    log::debug!(
        "{} validators: {:?}",
        kind,
        validators.iter().map(|v| &v.name).collect::<Vec<_>>()
    );
    Ok(validators)
}

/// Run `validators` on one testcase.
///
/// Input validation feeds `input` on stdin. Answer validation feeds
/// `answer` and, except for checktestdata, also passes
/// `<input> <answer> <feedback_dir>`. The remark of a failure names every
/// rejecting validator.
pub fn validate_testcase(
    input: &Path,
    answer: &Path,
    kind: ValidatorKind,
    validators: &[Validator],
    feedback_dir: &Path,
) -> Result<ValidatorResult, CoreError> {
    let data = match kind {
        ValidatorKind::Input => input,
        ValidatorKind::Output => answer,
    };
    let mut failed = vec![];
    for validator in validators {
        let command = if kind == ValidatorKind::Input || validator.is_checktestdata() {
            validator.command.with_args(VALIDATION_FLAGS)
        } else {
            validator
                .command
                .with_args([
                    input.to_string_lossy().into_owned(),
                    answer.to_string_lossy().into_owned(),
                    feedback_dir.to_string_lossy().into_owned(),
                ])
                .with_args(VALIDATION_FLAGS)
        };
        let result = run::execute(
            &command,
            &ExecOptions {
                stdin: Some(data),
                cwd: Some(feedback_dir),
                timeout: Some(VALIDATOR_TIMEOUT),
                ..Default::default()
            },
        )?;
        if result.timed_out || !validator.accepts(result.exit_code) {
            log::debug!(
                "{} rejected {:?}: exit code {:?}",
                validator.name,
                data,
                result.exit_code
            );
            failed.push(validator.name.clone());
        }
    }
    if failed.is_empty() {
        Ok(ValidatorResult::accept(""))
    } else {
        Ok(ValidatorResult::reject(failed.join(", ")))
    }
}

/// Validate every input, or for answers every testcase that has an answer
/// file.
///
/// Answer validation under custom interactive validation, an empty
/// validator set and an empty testcase set all succeed trivially.
pub fn validate(
    problem: &Problem,
    kind: ValidatorKind,
    settings: &Settings,
    cache: &CompilerCache,
) -> Result<bool, CoreError> {
    if kind == ValidatorKind::Output && settings.validation == ValidationMode::CustomInteractive {
        log::info!("{}: answer validation does not apply to interactive problems", problem.name);
        return Ok(true);
    }

    let validators = get_validators(problem, kind, cache)?;
    let testcases = problem.testcases(kind == ValidatorKind::Output, false)?;
    if validators.is_empty() || testcases.is_empty() {
        log::info!(
            "{}: {} validators, {} testcases, nothing to validate",
            problem.name,
            validators.len(),
            testcases.len()
        );
        return Ok(true);
    }

    let scratch = tempfile::Builder::new()
        .prefix("problemkit_validate_")
        .tempdir()?;
    let results = run_ordered(settings.jobs, &testcases, |idx, testcase| {
        let feedback_dir = scratch.path().join(idx.to_string());
        std::fs::create_dir_all(&feedback_dir)?;
        validate_testcase(
            &testcase.input,
            &testcase.answer,
            kind,
            &validators,
            &feedback_dir,
        )
    });

    let mut success = true;
    for (testcase, result) in testcases.iter().zip(results) {
        let result = result?;
        if result.passed {
            log::debug!("{}.{}: OK", testcase.name, kind.extension());
        } else {
            log::error!("{}.{}: FAILED {}", testcase.name, kind.extension(), result.remark);
            success = false;
        }
    }
    Ok(success)
}
