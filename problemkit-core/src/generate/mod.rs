pub mod seed;
pub mod tree;

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use serde_derive::Serialize;

use self::tree::{data_file, GeneratedTestcase, GeneratorConfig, Node};
use crate::{
    compiler::CompilerCache,
    error::CoreError,
    judge::compare::default_output_validator,
    package::{Problem, Testcase},
    run::{self, pool::run_ordered, ExecOptions, RunCommand},
    settings::{CompareSettings, Settings, ValidationMode},
    utils::{files_equal, move_file, prune_empty_dirs, PathLocks},
    validate::{get_validators, validate_testcase, Validator, ValidatorKind},
};

const TESTDATA_YAML: &str = "testdata.yaml";

/// Programs referenced from `gen.yaml`, built once up front.
type Built = BTreeMap<String, Result<RunCommand, String>>;

/// Moves freshly produced files into `data/`, refusing to clobber changed
/// files unless forced.
struct Publisher<'a> {
    data_dir: PathBuf,
    settings: &'a Settings,
    input_validators: Vec<Validator>,
    output_validators: Vec<Validator>,
    locks: PathLocks,
    scratch: &'a Path,
    nskip: AtomicUsize,
    nfail: AtomicUsize,
}

impl<'a> Publisher<'a> {
    fn fail(&self) {
        self.nfail.fetch_add(1, Ordering::SeqCst);
    }

    /// Validate `source` by extension, then move it to `target`.
    ///
    /// Returns whether `target` now holds the content of `source`.
    fn publish(&self, source: &Path, target: &Path, tries_msg: &str) -> Result<bool, CoreError> {
        let shown = target.strip_prefix(&self.data_dir).unwrap_or(target).display();
        let extension = source.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let kind = match extension {
            "in" => Some(ValidatorKind::Input),
            "ans" if self.settings.validation != ValidationMode::CustomInteractive => {
                Some(ValidatorKind::Output)
            }
            _ => None,
        };
        if let Some(kind) = kind {
            let input = match source.with_extension("in") {
                input if input.is_file() => input,
                _ => target.with_extension("in"),
            };
            let validators = match kind {
                ValidatorKind::Input => &self.input_validators,
                ValidatorKind::Output => &self.output_validators,
            };
            let feedback_dir = tempfile::tempdir_in(self.scratch)?;
            let result = validate_testcase(&input, source, kind, validators, feedback_dir.path())?;
            if !result.passed {
                log::error!("{}: {} validation FAILED: {}", shown, kind, result.remark);
                self.fail();
                return Ok(false);
            }
        }

        let lock = self.locks.get(target);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let existed = target.is_file();
        if existed {
            if files_equal(source, target)? {
                log::debug!("{}: unchanged", shown);
                return Ok(true);
            }
            if Testcase::from_input(&self.data_dir, target.to_owned()).is_sample()
                && !(self.settings.samples && self.settings.force)
            {
                log::warn!("SKIPPED: {}; supply -f --samples to overwrite", shown);
                self.nskip.fetch_add(1, Ordering::SeqCst);
                return Ok(false);
            }
            if !self.settings.force {
                log::warn!("SKIPPED: {}; supply -f to overwrite", shown);
                self.nskip.fetch_add(1, Ordering::SeqCst);
                return Ok(false);
            }
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        move_file(source, target)?;
        log::info!("{}: {}{}", if existed { "CHANGED" } else { "NEW" }, shown, tries_msg);
        Ok(true)
    }

    /// Publish a copy of `source`, leaving the original in place.
    fn publish_copy(&self, source: &Path, target: &Path) -> Result<bool, CoreError> {
        let staging = tempfile::tempdir_in(self.scratch)?;
        let file_name = source.file_name().unwrap_or_default();
        let copy = staging.path().join(file_name);
        fs::copy(source, &copy)?;
        // The answer validator looks for the input next to the answer.
        let input = source.with_extension("in");
        if copy.extension().map_or(false, |e| e == "ans") && input.is_file() {
            fs::copy(&input, copy.with_extension("in"))?;
        }
        self.publish(&copy, target, "")
    }
}

/// Everything a generation run shares between jobs.
struct Generation<'a> {
    problem: &'a Problem,
    settings: &'a Settings,
    config: GeneratorConfig,
    generators: Built,
    solutions: Built,
    visualizers: Built,
    submission: Option<RunCommand>,
    publisher: Publisher<'a>,
}

/// Generate the testdata of `problem` from `generators/gen.yaml`.
///
/// Returns whether every testcase was produced and published. A malformed
/// `gen.yaml` is an error; failures of single testcases are logged and
/// counted.
pub fn generate(
    problem: &Problem,
    settings: &Settings,
    cache: &CompilerCache,
) -> Result<bool, CoreError> {
    let config = GeneratorConfig::load(&problem.path)?;
    let scratch = tempfile::Builder::new()
        .prefix("problemkit_gen_")
        .tempdir()?;

    let interactive = settings.validation == ValidationMode::CustomInteractive;
    let mut generate_ans = config.generate_ans.unwrap_or(!interactive);
    if generate_ans && interactive {
        log::warn!("{}: answers are not generated for interactive problems", problem.name);
        generate_ans = false;
    }

    let mut failures = 0;
    let mut submission = None;
    if generate_ans {
        let path = match settings.submission.as_ref().or(config.submission.as_ref()) {
            Some(path) => Some(problem_path(problem, path)),
            None => {
                let fallback = problem.default_answer_submission()?;
                if let Some(path) = &fallback {
                    log::info!(
                        "No submission was specified in {}. Falling back to {:?}.",
                        tree::GEN_YAML,
                        path
                    );
                }
                fallback
            }
        };
        match path {
            Some(path) if !path.exists() => {
                log::error!("Submission not found: {:?}", path);
                failures += 1;
            }
            Some(path) => match cache.build_program(&path) {
                Ok(command) => submission = Some(command),
                Err(e) => {
                    log::error!("{}", e);
                    failures += 1;
                }
            },
            None => log::warn!("{}: no submissions found, answers are not generated", problem.name),
        }
    }

    let has_inputs = config.num_testcases > 0;
    let publisher = Publisher {
        data_dir: problem.data_dir(),
        settings,
        input_validators: if has_inputs {
            get_validators(problem, ValidatorKind::Input, cache)?
        } else {
            vec![]
        },
        output_validators: if generate_ans || has_inputs {
            get_validators(problem, ValidatorKind::Output, cache)?
        } else {
            vec![]
        },
        locks: PathLocks::default(),
        scratch: scratch.path(),
        nskip: AtomicUsize::new(0),
        nfail: AtomicUsize::new(failures),
    };

    let generators = build_all(cache, &problem.generators_dir(), &config.generators_used);
    let solutions = build_all(cache, &problem.path, &config.solutions_used);
    let visualizers = build_all(cache, &problem.path, &config.visualizers_used);
    let generation = Generation {
        problem,
        settings,
        config,
        generators,
        solutions,
        visualizers,
        submission,
        publisher,
    };

    generation.generate_inputs()?;
    generation.copy_manual_testcases()?;
    generation.write_testdata_yaml()?;
    if generate_ans && (generation.submission.is_some() || !generation.solutions.is_empty()) {
        generation.generate_answers()?;
    }
    generation.publish_includes()?;
    generation.run_visualizers()?;

    let nskip = generation.publisher.nskip.load(Ordering::SeqCst);
    let nfail = generation.publisher.nfail.load(Ordering::SeqCst);
    if nskip == 0 && nfail == 0 {
        log::info!("{}: Generate Done", problem.name);
    } else {
        log::warn!("{}: {} skipped, {} failed", problem.name, nskip, nfail);
    }
    Ok(nskip == 0 && nfail == 0)
}

impl<'a> Generation<'a> {
    fn data_dir(&self) -> PathBuf {
        self.problem.data_dir()
    }

    fn generate_inputs(&self) -> Result<(), CoreError> {
        let testcases = self.config.generated_testcases();
        let results = run_ordered(self.settings.jobs, &testcases, |idx, testcase| {
            let scratch = self.publisher.scratch.join(format!("gen-{}", idx));
            self.generate_testcase(testcase, &scratch)
        });
        for result in results {
            result?;
        }
        Ok(())
    }

    /// Run the invocation chain of `testcase` until an attempt succeeds, then
    /// publish every non-empty file the attempt left in `scratch`.
    fn generate_testcase(&self, testcase: &GeneratedTestcase, scratch: &Path) -> Result<(), CoreError> {
        let stdin_path = scratch.join(format!("{}.in", testcase.name));
        let stdout_path = scratch.join(format!("{}.in.stdout", testcase.name));
        let retries = self.config.retries.max(1);

        let mut succeeded = None;
        for retry in 0..retries {
            if scratch.exists() {
                fs::remove_dir_all(scratch)?;
            }
            fs::create_dir_all(scratch)?;
            if self.run_chain(testcase, retry, &stdin_path, &stdout_path, scratch)? {
                succeeded = Some(retry);
                break;
            }
        }
        let retry = match succeeded {
            Some(retry) => retry,
            None => {
                log::error!("{}: FAILED after {} tries", testcase.path.display(), retries);
                self.publisher.fail();
                return Ok(());
            }
        };
        let tries_msg = if retry == 0 {
            String::new()
        } else {
            format!(" after {} tries", retry + 1)
        };

        let mut files = vec![];
        for entry in fs::read_dir(scratch)? {
            let path = entry?.path();
            if path.is_file() && fs::metadata(&path)?.len() > 0 {
                files.push(path);
            }
        }
        // The input goes first: nothing else is published if it is rejected.
        files.sort_by_key(|path| (path != &stdin_path, path.clone()));

        let target_dir = self.data_dir().join(testcase.path.parent().unwrap_or(Path::new("")));
        for file in files {
            let target = target_dir.join(file.file_name().unwrap_or_default());
            let published = self.publisher.publish(&file, &target, &tries_msg)?;
            if !published && file == stdin_path {
                break;
            }
        }
        Ok(())
    }

    /// One attempt. Each invocation reads the previous one's stdout.
    fn run_chain(
        &self,
        testcase: &GeneratedTestcase,
        retry: u32,
        stdin_path: &Path,
        stdout_path: &Path,
        scratch: &Path,
    ) -> Result<bool, CoreError> {
        for invocation in testcase.chain.iter() {
            let generator = match self.generators.get(&invocation.generator) {
                Some(Ok(generator)) => generator,
                Some(Err(msg)) => {
                    log::error!("{}: {}", testcase.path.display(), msg);
                    return Ok(false);
                }
                None => {
                    return Err(CoreError::Internal(format!(
                        "generator {} was not built",
                        invocation.generator
                    )))
                }
            };
            let command = generator.with_args(invocation.arguments_for(retry, &testcase.name));
            let stdin = if stdin_path.is_file() { Some(stdin_path) } else { None };
            let result = run::execute(
                &command,
                &ExecOptions {
                    stdin,
                    stdout: Some(stdout_path),
                    cwd: Some(scratch),
                    timeout: Some(self.settings.generator_timeout),
                    ..Default::default()
                },
            );
            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    log::error!("{}: failed to run `{}`: {}", testcase.path.display(), command, e);
                    return Ok(false);
                }
            };
            fs::rename(stdout_path, stdin_path)?;
            if result.timed_out {
                log::error!(
                    "{}: TIMEOUT after {:?} in `{}`",
                    testcase.path.display(),
                    self.settings.generator_timeout,
                    command
                );
                return Ok(false);
            }
            if !result.success() {
                log::warn!(
                    "{}: `{}` exited with {:?}",
                    testcase.path.display(),
                    command,
                    result.exit_code
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Manual testcases naming a file under `generators/` get it copied,
    /// together with a sibling `.ans` if there is one.
    fn copy_manual_testcases(&self) -> Result<(), CoreError> {
        for testcase in self.config.manual_testcases() {
            let file = match &testcase.input {
                Some(file) => file,
                None => continue,
            };
            let source = self.problem.generators_dir().join(file);
            if !source.is_file() {
                log::error!("{}: manual testcase {:?} not found", testcase.path.display(), source);
                self.publisher.fail();
                continue;
            }
            let target = data_file(&self.data_dir(), &testcase.path, "in");
            if !self.publisher.publish_copy(&source, &target)? {
                continue;
            }
            let answer = source.with_extension("ans");
            if answer.is_file() {
                self.publisher
                    .publish_copy(&answer, &data_file(&self.data_dir(), &testcase.path, "ans"))?;
            }
        }
        Ok(())
    }

    fn write_testdata_yaml(&self) -> Result<(), CoreError> {
        for directory in self.config.directories() {
            let testdata = match &directory.testdata_yaml {
                Some(testdata) => testdata,
                None => continue,
            };
            let staging = tempfile::tempdir_in(self.publisher.scratch)?;
            let source = staging.path().join(TESTDATA_YAML);
            fs::write(&source, serde_yaml::to_string(testdata)?)?;
            let target = self.data_dir().join(&directory.path).join(TESTDATA_YAML);
            self.publisher.publish(&source, &target, "")?;
        }
        Ok(())
    }

    /// Answer every input in `data/` with its testcase's solution, or the
    /// answer submission when it has none.
    fn generate_answers(&self) -> Result<(), CoreError> {
        let testcases = self.problem.testcases(false, false)?;
        let solutions: BTreeMap<PathBuf, &String> = self
            .config
            .nodes()
            .into_iter()
            .filter(|node| !matches!(node, Node::Directory(_)))
            .filter_map(|node| {
                let solution = node.config().solution.as_ref()?;
                Some((data_file(&self.data_dir(), node.path(), "in"), solution))
            })
            .collect();

        let results = run_ordered(self.settings.jobs, &testcases, |idx, testcase| -> Result<(), CoreError> {
            let command = match solutions.get(&testcase.input) {
                Some(solution) => match self.solutions.get(*solution) {
                    Some(Ok(command)) => Some(command),
                    _ => None,
                },
                None => self.submission.as_ref(),
            };
            let command = match command {
                Some(command) => command,
                None => {
                    log::warn!("{}: no solution to generate the answer", testcase.name);
                    return Ok(());
                }
            };
            let scratch = self.publisher.scratch.join(format!("ans-{}", idx));
            if scratch.exists() {
                fs::remove_dir_all(&scratch)?;
            }
            fs::create_dir_all(&scratch)?;
            let outfile = scratch.join(testcase.answer.file_name().unwrap_or_default());
            if !produce_answer(command, testcase, &outfile, self.settings)? {
                self.publisher.fail();
                return Ok(());
            }
            // Next to the answer for the output validators.
            fs::copy(&testcase.input, outfile.with_extension("in"))?;
            self.publisher.publish(&outfile, &testcase.answer, "")?;
            Ok(())
        });
        results.into_iter().collect::<Result<Vec<()>, CoreError>>()?;
        Ok(())
    }

    /// Copy the testcases of included directories into the including one.
    fn publish_includes(&self) -> Result<(), CoreError> {
        let data_dir = self.data_dir();
        for directory in self.config.directories() {
            for include in directory.include.iter() {
                let included = match self.config.directory(include) {
                    Some(included) => included,
                    None => continue,
                };
                for path in included.testcase_paths() {
                    let relative = path.strip_prefix(&included.path).unwrap_or(&path);
                    let target = directory.path.join(relative);
                    for extension in ["in", "ans"] {
                        let source = data_file(&data_dir, &path, extension);
                        if !source.is_file() {
                            continue;
                        }
                        let published = self
                            .publisher
                            .publish_copy(&source, &data_file(&data_dir, &target, extension))?;
                        if !published && extension == "in" {
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Run `visualizer <in> <ans>` in the testcase's directory. Failures are
    /// only reported.
    fn run_visualizers(&self) -> Result<(), CoreError> {
        let data_dir = self.data_dir();
        for node in self.config.nodes() {
            if matches!(node, Node::Directory(_)) {
                continue;
            }
            let visualizer = match &node.config().visualizer {
                Some(visualizer) => visualizer,
                None => continue,
            };
            let command = match self.visualizers.get(visualizer) {
                Some(Ok(command)) => command,
                _ => continue,
            };
            let input = data_file(&data_dir, node.path(), "in");
            let answer = data_file(&data_dir, node.path(), "ans");
            if !input.is_file() || !answer.is_file() {
                continue;
            }
            let cwd = input.parent().unwrap_or(&data_dir);
            let result = run::execute(
                &command.with_args([
                    input.to_string_lossy().into_owned(),
                    answer.to_string_lossy().into_owned(),
                ]),
                &ExecOptions {
                    cwd: Some(cwd),
                    timeout: Some(self.settings.generator_timeout),
                    ..Default::default()
                },
            )?;
            if !result.success() {
                log::warn!("{}: visualizer {} failed", node.path().display(), visualizer);
            }
        }
        Ok(())
    }
}

/// Run `command` on the input of `testcase`, writing `outfile`. Returns
/// whether it finished in time and without error.
fn produce_answer(
    command: &RunCommand,
    testcase: &Testcase,
    outfile: &Path,
    settings: &Settings,
) -> Result<bool, CoreError> {
    let result = run::run_testcase(command, &testcase.input, outfile, settings.time_limit()?)?;
    if result.timed_out {
        log::error!("{}: TIMEOUT", testcase.name);
        return Ok(false);
    }
    if !result.success() {
        log::error!("{}: FAILED with exit code {:?}", testcase.name, result.exit_code);
        return Ok(false);
    }
    Ok(true)
}

/// Build every program in `names`, resolved against `base`. A leading `/`
/// means the problem root for solutions and visualizers.
fn build_all<'n>(
    cache: &CompilerCache,
    base: &Path,
    names: impl IntoIterator<Item = &'n String>,
) -> Built {
    names
        .into_iter()
        .map(|name| {
            let path = base.join(name.trim_start_matches('/'));
            let built = cache.build_program(&path).map_err(|e| {
                log::error!("{}", e);
                e.to_string()
            });
            (name.clone(), built)
        })
        .collect()
}

fn problem_path(problem: &Problem, path: &str) -> PathBuf {
    problem.path.join(path.trim_start_matches('/'))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnswerStats {
    pub new: usize,
    pub changed: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub failed: usize,
}

enum AnswerChange {
    New,
    Changed,
    Skipped,
    Unchanged,
    Failed,
}

/// Regenerate `.ans` files of every input in `data/` with one submission:
/// `settings.submission`, or else the first accepted one.
///
/// Answers that still match under lenient comparison are left alone;
/// differing ones are only replaced with `force`.
pub fn generate_answers(
    problem: &Problem,
    settings: &Settings,
    cache: &CompilerCache,
) -> Result<AnswerStats, CoreError> {
    let submission = match &settings.submission {
        Some(submission) => problem_path(problem, submission),
        None => problem.default_answer_submission()?.ok_or_else(|| {
            CoreError::AnyhowError(anyhow::anyhow!("No submission found for this problem!"))
        })?,
    };
    log::info!("Using {:?}", submission);
    let command = cache.build_program(&submission)?;
    let testcases = problem.testcases(false, false)?;
    let scratch = tempfile::Builder::new()
        .prefix("problemkit_ans_")
        .tempdir()?;
    let lenient = CompareSettings::default();

    let results = run_ordered(settings.jobs, &testcases, |idx, testcase| -> Result<AnswerChange, CoreError> {
        let outfile = scratch.path().join(format!("{}.out", idx));
        if !produce_answer(&command, testcase, &outfile, settings)? {
            return Ok(AnswerChange::Failed);
        }
        if !testcase.answer.is_file() {
            move_file(&outfile, &testcase.answer)?;
            log::info!("{}: NEW", testcase.name);
            return Ok(AnswerChange::New);
        }
        let same = default_output_validator(
            &fs::read(&testcase.answer)?,
            &fs::read(&outfile)?,
            &lenient,
        )?;
        if same.passed {
            return Ok(AnswerChange::Unchanged);
        }
        if settings.force {
            move_file(&outfile, &testcase.answer)?;
            log::info!("{}: CHANGED", testcase.name);
            Ok(AnswerChange::Changed)
        } else {
            log::warn!("{}: SKIPPED; supply -f to overwrite", testcase.name);
            Ok(AnswerChange::Skipped)
        }
    });

    let mut stats = AnswerStats::default();
    for result in results {
        match result? {
            AnswerChange::New => stats.new += 1,
            AnswerChange::Changed => stats.changed += 1,
            AnswerChange::Skipped => stats.skipped += 1,
            AnswerChange::Unchanged => stats.unchanged += 1,
            AnswerChange::Failed => stats.failed += 1,
        }
    }
    log::info!(
        "Done: {} new, {} changed, {} skipped, {} unchanged, {} failed",
        stats.new,
        stats.changed,
        stats.skipped,
        stats.unchanged,
        stats.failed
    );
    Ok(stats)
}

/// Remove every file `gen.yaml` accounts for and prune directories left
/// empty. Inputs placed in `data/` by hand stay.
pub fn clean(problem: &Problem) -> Result<bool, CoreError> {
    let config = GeneratorConfig::load(&problem.path)?;
    let data_dir = problem.data_dir();

    let mut paths: Vec<PathBuf> = vec![];
    for node in config.nodes() {
        match node {
            Node::Generated(testcase) => paths.push(testcase.path.clone()),
            Node::Manual(testcase) if testcase.input.is_some() => paths.push(testcase.path.clone()),
            _ => {}
        }
    }
    let mut files = vec![];
    for directory in config.directories() {
        for include in directory.include.iter() {
            if let Some(included) = config.directory(include) {
                for path in included.testcase_paths() {
                    let relative = path.strip_prefix(&included.path).unwrap_or(&path);
                    paths.push(directory.path.join(relative));
                }
            }
        }
        if directory.testdata_yaml.is_some() {
            files.push(data_dir.join(&directory.path).join(TESTDATA_YAML));
        }
    }
    for path in paths {
        files.push(data_file(&data_dir, &path, "in"));
        files.push(data_file(&data_dir, &path, "ans"));
    }

    for file in files {
        if file.is_file() {
            log::info!("REMOVE {}", file.display());
            fs::remove_file(&file)?;
        }
        if let Some(parent) = file.parent() {
            prune_empty_dirs(parent, &data_dir);
        }
    }
    Ok(true)
}
