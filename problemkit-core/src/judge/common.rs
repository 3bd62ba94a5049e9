use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use super::{
    compare::{custom_output_validator, default_output_validator},
    SubmissionReport, TestcaseOutcome, Verdict, VerdictCount,
};
use crate::{
    error::CoreError,
    package::Testcase,
    run::{self, pool::run_ordered, RunCommand},
    settings::{Settings, ValidationMode},
    validate::Validator,
};

/// Run one testcase and decide its verdict: time limit first, then exit
/// status, then the configured output comparison.
pub fn process_testcase(
    run_command: &RunCommand,
    testcase: &Testcase,
    outfile: &Path,
    feedback_dir: &Path,
    settings: &Settings,
    output_validators: &[Validator],
) -> Result<TestcaseOutcome, CoreError> {
    let result = run::run_testcase(run_command, &testcase.input, outfile, settings.time_limit()?)?;

    let (verdict, remark) = if result.timed_out {
        (Verdict::TimeLimitExceeded, String::new())
    } else if result.exit_code != Some(0) {
        let remark = match (result.exit_code, result.exit_signal) {
            (_, Some(signal)) => format!("signal {}", signal),
            (Some(code), _) => format!("exit code {}", code),
            _ => String::new(),
        };
        (Verdict::RunTimeError, remark)
    } else {
        let check = match settings.validation {
            ValidationMode::Default => default_output_validator(
                &fs::read(&testcase.answer)?,
                &fs::read(outfile)?,
                &settings.compare_settings(),
            )?,
            ValidationMode::Custom => {
                fs::create_dir_all(feedback_dir)?;
                custom_output_validator(
                    testcase,
                    outfile,
                    &settings.validator_flag_args(),
                    output_validators,
                    feedback_dir,
                )?
            }
            ValidationMode::CustomInteractive => {
                return Err(CoreError::Unsupported(
                    "judging interactive problems".to_owned(),
                ))
            }
        };
        let verdict = if check.passed {
            Verdict::Accepted
        } else {
            Verdict::WrongAnswer
        };
        (verdict, check.remark)
    };

    let outcome = TestcaseOutcome {
        testcase: testcase.name.clone(),
        verdict,
        duration: result.duration,
        remark,
    };
    log::debug!(
        "{:<50} {:6.3}s {} {}",
        outcome.testcase,
        outcome.duration.as_secs_f64(),
        outcome.verdict,
        outcome.remark
    );
    Ok(outcome)
}

/// Judge one submission on `testcases`.
///
/// Testcases run on `settings.jobs` threads. In lazy mode the first time
/// limit or run time error in testcase order ends the run; testcases after
/// it are neither counted nor reported, whatever order they finished in.
pub fn run_submission(
    name: &str,
    run_command: &RunCommand,
    testcases: &[Testcase],
    settings: &Settings,
    output_validators: &[Validator],
    expected: Verdict,
    scratch_dir: &Path,
) -> Result<SubmissionReport, CoreError> {
    fs::create_dir_all(scratch_dir)?;
    let cutoff = AtomicUsize::new(usize::MAX);

    let results = run_ordered(settings.jobs, testcases, |idx, testcase| {
        if idx > cutoff.load(Ordering::SeqCst) {
            return None;
        }
        let outfile = scratch_dir.join(format!("{}.out", idx));
        let feedback_dir = scratch_dir.join(format!("{}.feedback", idx));
        let outcome = process_testcase(
            run_command,
            testcase,
            &outfile,
            &feedback_dir,
            settings,
            output_validators,
        );
        if let Ok(outcome) = &outcome {
            if settings.lazy && outcome.verdict.is_fatal() {
                cutoff.fetch_min(idx, Ordering::SeqCst);
            }
        }
        Some(outcome)
    });

    let mut counts = VerdictCount::default();
    let mut outcomes = vec![];
    let mut time_max = Duration::ZERO;
    let mut time_total = Duration::ZERO;
    for result in results {
        let outcome = match result {
            Some(outcome) => outcome?,
            None => break,
        };
        counts.add(outcome.verdict);
        time_total += outcome.duration;
        time_max = time_max.max(outcome.duration);
        let stop = settings.lazy && outcome.verdict.is_fatal();
        outcomes.push(outcome);
        if stop {
            break;
        }
    }

    let report = SubmissionReport {
        name: name.to_owned(),
        expected,
        verdict: counts.overall(),
        counts,
        outcomes,
        time_max,
        time_total,
        build_error: None,
    };
    let line = format!(
        "{:<50} m/+ {:6.3}s {:6.3}s {:<19} (expected {})",
        report.name,
        report.time_max.as_secs_f64(),
        report.time_total.as_secs_f64(),
        report.verdict.as_str(),
        report.expected
    );
    if report.passed() {
        log::info!("{}", line);
    } else {
        log::error!("{}", line);
    }
    Ok(report)
}

#[cfg(test)]
pub mod common_tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn sh(script: &str) -> RunCommand {
        RunCommand::new("sh", vec!["-c".to_owned(), script.to_owned()])
    }

    /// Testcases whose input is the line number and whose answer is its
    /// square.
    fn square_testcases(dir: &Path, count: usize) -> Vec<Testcase> {
        (1..=count)
            .map(|i| {
                let testcase = Testcase::from_input(dir, dir.join(format!("{:02}.in", i)));
                fs::write(&testcase.input, format!("{}\n", i)).unwrap();
                fs::write(&testcase.answer, format!("{}\n", i * i)).unwrap();
                testcase
            })
            .collect()
    }

    fn settings(jobs: usize, lazy: bool) -> Settings {
        Settings {
            timelimit: 0.5,
            jobs,
            lazy,
            ..Default::default()
        }
    }

    #[test]
    fn test_process_testcase_states() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let testcases = square_testcases(dir.path(), 1);
        let out = dir.path().join("out");
        let feedback = dir.path().join("feedback");
        let settings = settings(1, true);

        let judge = |command: RunCommand| {
            process_testcase(&command, &testcases[0], &out, &feedback, &settings, &[]).unwrap()
        };
        assert_eq!(judge(sh("read x; echo $((x*x))")).verdict, Verdict::Accepted);
        assert_eq!(judge(sh("echo 2")).verdict, Verdict::WrongAnswer);
        assert_eq!(judge(sh("echo 1; exit 3")).verdict, Verdict::RunTimeError);
        assert_eq!(judge(sh("exit 3")).remark, "exit code 3");
        // Timeouts win over the exit status.
        assert_eq!(judge(sh("sleep 2; exit 3")).verdict, Verdict::TimeLimitExceeded);
    }

    #[test]
    fn test_interactive_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let testcases = square_testcases(dir.path(), 1);
        let settings = Settings {
            validation: ValidationMode::CustomInteractive,
            ..settings(1, true)
        };
        let result = process_testcase(
            &sh("cat"),
            &testcases[0],
            &dir.path().join("out"),
            &dir.path().join("feedback"),
            &settings,
            &[],
        );
        assert!(matches!(result, Err(CoreError::Unsupported(_))));
    }

    #[test]
    fn test_run_submission_counts() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let testcases = square_testcases(dir.path(), 6);
        // Wrong on input 3 only.
        let command = sh("read x; if [ $x -eq 3 ]; then echo 0; else echo $((x*x)); fi");
        for jobs in [1, 4] {
            let report = run_submission(
                "wrong_answer/three.sh",
                &command,
                &testcases,
                &settings(jobs, true),
                &[],
                Verdict::WrongAnswer,
                &dir.path().join(format!("scratch{}", jobs)),
            )
            .unwrap();
            assert_eq!(report.verdict, Verdict::WrongAnswer);
            assert_eq!(report.counts.get(Verdict::Accepted), 5);
            assert_eq!(report.counts.get(Verdict::WrongAnswer), 1);
            assert_eq!(report.outcomes.len(), 6);
            assert_eq!(report.outcomes[2].testcase, "03");
            assert!(report.passed());
            assert!(report.time_max <= report.time_total);
        }
    }

    #[test]
    fn test_lazy_stops_at_first_fatal() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let testcases = square_testcases(dir.path(), 8);
        // Crashes from input 3 on, times out on input 2.
        let command = sh("read x; [ $x -eq 2 ] && sleep 2; [ $x -ge 3 ] && exit 1; echo $((x*x))");
        for jobs in [1, 4] {
            let report = run_submission(
                "time_limit_exceeded/slow.sh",
                &command,
                &testcases,
                &settings(jobs, true),
                &[],
                Verdict::TimeLimitExceeded,
                &dir.path().join(format!("lazy{}", jobs)),
            )
            .unwrap();
            assert_eq!(report.outcomes.len(), 2);
            assert_eq!(report.verdict, Verdict::TimeLimitExceeded);
            assert_eq!(report.counts.total(), 2);
        }

        let report = run_submission(
            "time_limit_exceeded/slow.sh",
            &command,
            &testcases,
            &settings(4, false),
            &[],
            Verdict::TimeLimitExceeded,
            &dir.path().join("eager"),
        )
        .unwrap();
        assert_eq!(report.outcomes.len(), 8);
        assert_eq!(report.counts.get(Verdict::RunTimeError), 6);
        assert_eq!(report.verdict, Verdict::RunTimeError);
        assert!(!report.passed());
    }

    #[test]
    fn test_no_testcases_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_submission(
            "accepted/a.sh",
            &sh("true"),
            &[],
            &settings(2, true),
            &[],
            Verdict::Accepted,
            dir.path(),
        )
        .unwrap();
        assert_eq!(report.verdict, Verdict::Accepted);
        assert!(report.outcomes.is_empty());
    }
}
