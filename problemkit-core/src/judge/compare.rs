use std::{borrow::Cow, path::Path, sync::OnceLock};

use regex::bytes::Regex;

use super::ValidatorResult;
use crate::{
    error::CoreError,
    package::Testcase,
    run::{self, ExecOptions},
    settings::CompareSettings,
    validate::Validator,
};

/// Exit code of a validator accepting its input.
pub const AC_EXIT_CODE: i32 = 42;
/// Exit code of a validator rejecting its input.
pub const WA_EXIT_CODE: i32 = 43;

static WORDS: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static SPACES: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn compiled(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex, CoreError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| CoreError::Internal(e.to_string()))
}

/// Words and the separators between them, all kept.
fn split_keeping_spaces(data: &[u8]) -> Result<Vec<&[u8]>, CoreError> {
    let words = compiled(&WORDS, r"(?-u)\b\S+\b")?;
    let mut tokens = vec![];
    let mut last = 0;
    for word in words.find_iter(data) {
        tokens.push(&data[last..word.start()]);
        tokens.push(word.as_bytes());
        last = word.end();
    }
    tokens.push(&data[last..]);
    Ok(tokens)
}

/// Split on runs of spaces. Newlines stay part of the tokens; an empty token
/// at either end is dropped.
fn split_ignoring_spaces(data: &[u8]) -> Result<Vec<&[u8]>, CoreError> {
    let spaces = compiled(&SPACES, r"(?-u) +")?;
    let mut words: Vec<&[u8]> = spaces.split(data).collect();
    if words.last().map_or(false, |word| word.is_empty()) {
        words.pop();
    }
    if words.first().map_or(false, |word| word.is_empty()) {
        words.remove(0);
    }
    Ok(words)
}

fn parse_float(token: &[u8]) -> Option<f64> {
    std::str::from_utf8(token).ok()?.trim().parse::<f64>().ok()
}

/// Compare a team's output to the expected answer, trying progressively more
/// lenient notions of equality.
///
/// Fails with [`CoreError::Internal`] when outputs compare equal after a
/// whitespace-preserving split although the byte comparison said they
/// differ.
pub fn default_output_validator(
    expected: &[u8],
    actual: &[u8],
    settings: &CompareSettings,
) -> Result<ValidatorResult, CoreError> {
    if expected == actual {
        return Ok(ValidatorResult::accept("exact"));
    }

    let (expected, actual): (Cow<[u8]>, Cow<[u8]>) = if settings.case_sensitive {
        (Cow::Borrowed(expected), Cow::Borrowed(actual))
    } else {
        let expected = expected.to_ascii_lowercase();
        let actual = actual.to_ascii_lowercase();
        if expected == actual {
            return Ok(ValidatorResult::accept("case"));
        }
        (Cow::Owned(expected), Cow::Owned(actual))
    };

    if settings.space_change_sensitive && !settings.has_float_tolerance() {
        return Ok(ValidatorResult::reject("wrong"));
    }

    let (words1, words2) = if settings.space_change_sensitive {
        (split_keeping_spaces(&expected)?, split_keeping_spaces(&actual)?)
    } else {
        (split_ignoring_spaces(&expected)?, split_ignoring_spaces(&actual)?)
    };

    if words1 == words2 {
        if settings.space_change_sensitive {
            return Err(CoreError::Internal(
                "outputs became equal after space sensitive splitting".to_owned(),
            ));
        }
        return Ok(ValidatorResult::accept("white space"));
    }

    if !settings.has_float_tolerance() || words1.len() != words2.len() {
        return Ok(ValidatorResult::reject("wrong"));
    }

    let mut peak_error = 0.0f64;
    for (w1, w2) in words1.iter().zip(words2.iter()) {
        if w1 == w2 {
            continue;
        }
        let (f1, f2) = match (parse_float(w1), parse_float(w2)) {
            (Some(f1), Some(f2)) => (f1, f2),
            _ => return Ok(ValidatorResult::reject("wrong")),
        };
        let error = (f1 - f2).abs();
        peak_error = peak_error.max(error);
        let within_abs = settings.floatabs.map_or(false, |abs| error <= abs);
        let within_rel = settings.floatrel.map_or(false, |rel| error <= rel * f1.abs());
        if !within_abs && !within_rel {
            return Ok(ValidatorResult::reject("wrong"));
        }
    }
    Ok(ValidatorResult::accept(format!("float: {:?}", peak_error)))
}

/// Run `validators` as `validator <in> <ans> <feedback_dir> [flags]` with the
/// team output on stdin.
///
/// All must accept. The first rejection fails with the validator's name as
/// remark; any other exit code is a [`CoreError::ValidatorFault`].
pub fn custom_output_validator(
    testcase: &Testcase,
    actual: &Path,
    flags: &[String],
    validators: &[Validator],
    feedback_dir: &Path,
) -> Result<ValidatorResult, CoreError> {
    for validator in validators {
        let command = validator
            .command
            .with_args([
                testcase.input.to_string_lossy().into_owned(),
                testcase.answer.to_string_lossy().into_owned(),
                feedback_dir.to_string_lossy().into_owned(),
            ])
            .with_args(flags.iter().cloned());
        let result = run::execute(
            &command,
            &ExecOptions {
                stdin: Some(actual),
                cwd: Some(feedback_dir),
                ..Default::default()
            },
        )?;
        match result.exit_code {
            Some(AC_EXIT_CODE) => continue,
            Some(WA_EXIT_CODE) => return Ok(ValidatorResult::reject(validator.name.clone())),
            exit_code => {
                log::error!(
                    "output validator {} exited with {:?} on {}",
                    validator.name,
                    exit_code,
                    testcase.name
                );
                return Err(CoreError::ValidatorFault {
                    validator: validator.name.clone(),
                    exit_code,
                });
            }
        }
    }
    Ok(ValidatorResult::accept(""))
}
