pub mod icpc;

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_derive::{Deserialize, Serialize};
use walkdir::WalkDir;

use self::icpc::{ICPCPackageAgent, BAD_DIR, SAMPLE_DIR, SECRET_DIR};
use crate::{
    compiler::Language,
    error::{path_not_exist, CoreError},
    generate::tree::GEN_YAML,
    judge::Verdict,
    settings::PROBLEM_YAML,
    utils::is_executable,
    validate::ValidatorKind,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageType {
    #[default]
    ICPC,
}

impl PackageType {
    pub fn get_package_agent(&self) -> Box<dyn PackageAgent> {
        match self {
            Self::ICPC => Box::new(ICPCPackageAgent),
        }
    }
}

/// Where a package format keeps its parts.
pub trait PackageAgent {
    fn validate(&self, package_path: &Path) -> bool;
    /// Directories holding judged testcases, relative to the package root.
    fn testcase_dirs(&self, only_sample: bool) -> Vec<&'static str>;
    fn validator_dirs(&self, kind: ValidatorKind) -> Vec<&'static str>;
}

/// An `.in` file and its `.ans` sibling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Testcase {
    /// Path below `data/` without extension, e.g. `secret/1-small`.
    pub name: String,
    pub input: PathBuf,
    pub answer: PathBuf,
}

impl Testcase {
    pub fn from_input(data_dir: &Path, input: PathBuf) -> Self {
        let answer = input.with_extension("ans");
        let name = input
            .strip_prefix(data_dir)
            .unwrap_or(&input)
            .with_extension("")
            .to_string_lossy()
            .into_owned();
        Self {
            name,
            input,
            answer,
        }
    }

    pub fn is_sample(&self) -> bool {
        self.name.starts_with("sample/") || self.name == "sample"
    }
}

/// A submission file or directory with the verdict its directory promises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionEntry {
    /// `<outcome dir>/<file name>`.
    pub name: String,
    pub path: PathBuf,
    pub expected: Verdict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProblemStats {
    pub name: String,
    pub problem_yaml: bool,
    pub gen_yaml: bool,
    pub input_validators: usize,
    pub output_validators: usize,
    pub sample: usize,
    pub secret: usize,
    pub bad: usize,
    pub accepted: usize,
    pub wrong_answer: usize,
    pub time_limit_exceeded: usize,
    pub run_time_error: usize,
    pub accepted_cpp: usize,
    pub accepted_java: usize,
    pub accepted_python: usize,
}

/// A problem directory.
#[derive(Debug, Clone)]
pub struct Problem {
    pub name: String,
    pub path: PathBuf,
    pub package_type: PackageType,
}

impl Problem {
    pub fn new(path: &Path) -> Result<Self, CoreError> {
        let path = fs::canonicalize(path).map_err(|_| path_not_exist(path))?;
        let package_type = PackageType::default();
        if !package_type.get_package_agent().validate(&path) {
            return Err(CoreError::AnyhowError(anyhow::anyhow!(
                "{:?} does not look like a problem directory",
                path
            )));
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            path,
            package_type,
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path.join("data")
    }

    pub fn generators_dir(&self) -> PathBuf {
        self.path.join("generators")
    }

    pub fn validator_dirs(&self, kind: ValidatorKind) -> Vec<PathBuf> {
        self.package_type
            .get_package_agent()
            .validator_dirs(kind)
            .into_iter()
            .map(|dir| self.path.join(dir))
            .filter(|dir| dir.is_dir())
            .collect()
    }

    /// Testcases under `data/sample` and `data/secret`, sorted by name.
    ///
    /// With `needans`, inputs without an answer file are left out.
    pub fn testcases(&self, needans: bool, only_sample: bool) -> Result<Vec<Testcase>, CoreError> {
        let data_dir = self.data_dir();
        let mut testcases = vec![];
        for dir in self.package_type.get_package_agent().testcase_dirs(only_sample) {
            for input in find_files(&self.path.join(dir), &["in"])? {
                let testcase = Testcase::from_input(&data_dir, input);
                if needans && !testcase.answer.is_file() {
                    log::debug!("skipping {} without answer", testcase.name);
                    continue;
                }
                testcases.push(testcase);
            }
        }
        testcases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(testcases)
    }

    /// Submissions grouped by the verdict their directory promises, in
    /// severity order, then by name.
    pub fn submissions(&self) -> Result<Vec<SubmissionEntry>, CoreError> {
        let mut entries = vec![];
        for expected in Verdict::ALL {
            let dir = self.path.join("submissions").join(expected.dir_name());
            if !dir.is_dir() {
                continue;
            }
            let mut paths = vec![];
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() || Language::from_path(&path).is_some() || is_executable(&path) {
                    paths.push(path);
                } else {
                    log::debug!("ignoring non-program {:?}", path);
                }
            }
            paths.sort();
            for path in paths {
                let name = format!(
                    "{}/{}",
                    expected.dir_name(),
                    path.file_name().unwrap_or_default().to_string_lossy()
                );
                entries.push(SubmissionEntry {
                    name,
                    path,
                    expected,
                });
            }
        }
        Ok(entries)
    }

    /// Explicitly named submissions, expected to be accepted.
    pub fn named_submissions(&self, names: &[String]) -> Result<Vec<SubmissionEntry>, CoreError> {
        names
            .iter()
            .map(|name| {
                let path = self.path.join(name);
                if !path.exists() {
                    return Err(path_not_exist(&path));
                }
                Ok(SubmissionEntry {
                    name: path
                        .file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .into_owned(),
                    path,
                    expected: Verdict::Accepted,
                })
            })
            .collect()
    }

    /// The submission used to produce answers when none is named: the first
    /// accepted C++ submission, else the first accepted one.
    pub fn default_answer_submission(&self) -> Result<Option<PathBuf>, CoreError> {
        let accepted: Vec<PathBuf> = self
            .submissions()?
            .into_iter()
            .filter(|entry| entry.expected == Verdict::Accepted)
            .map(|entry| entry.path)
            .collect();
        let cpp = accepted
            .iter()
            .find(|path| Language::from_path(path) == Some(Language::Cpp));
        Ok(cpp.or_else(|| accepted.first()).cloned())
    }

    pub fn stats(&self) -> Result<ProblemStats, CoreError> {
        let mut stats = ProblemStats {
            name: self.name.clone(),
            problem_yaml: self.path.join(PROBLEM_YAML).is_file(),
            gen_yaml: self.path.join(GEN_YAML).is_file(),
            input_validators: count_entries(&self.validator_dirs(ValidatorKind::Input))?,
            output_validators: count_entries(&self.validator_dirs(ValidatorKind::Output))?,
            sample: find_files(&self.path.join(SAMPLE_DIR), &["in"])?.len(),
            secret: find_files(&self.path.join(SECRET_DIR), &["in"])?.len(),
            bad: find_files(&self.path.join(BAD_DIR), &["in", "ans"])?.len(),
            ..Default::default()
        };
        for entry in self.submissions()? {
            match entry.expected {
                Verdict::Accepted => {
                    stats.accepted += 1;
                    match Language::from_path(&entry.path) {
                        Some(Language::C | Language::Cpp) => stats.accepted_cpp += 1,
                        Some(Language::Java) => stats.accepted_java += 1,
                        Some(Language::Python2 | Language::Python3) => stats.accepted_python += 1,
                        _ => {}
                    }
                }
                Verdict::WrongAnswer => stats.wrong_answer += 1,
                Verdict::TimeLimitExceeded => stats.time_limit_exceeded += 1,
                Verdict::RunTimeError => stats.run_time_error += 1,
            }
        }
        Ok(stats)
    }
}

/// The problems to work on from `dir`: `dir` itself when it is a problem,
/// otherwise every problem directly inside it, as in a contest directory.
pub fn find_problems(dir: &Path) -> Result<Vec<Problem>, CoreError> {
    let agent = PackageType::default().get_package_agent();
    if agent.validate(dir) {
        return Ok(vec![Problem::new(dir)?]);
    }
    if !dir.is_dir() {
        return Err(path_not_exist(dir));
    }
    let mut paths = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() && agent.validate(&path) {
            paths.push(path);
        } else {
            log::debug!("{:?} is not a problem directory", path);
        }
    }
    paths.sort();
    paths.iter().map(|path| Problem::new(path)).collect()
}

/// Files below `dir` with one of `extensions`, sorted. A missing `dir` has
/// none.
pub fn find_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, CoreError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut files = vec![];
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| CoreError::AnyhowError(anyhow::anyhow!(e)))?;
        let matches = entry
            .path()
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extensions.contains(&extension))
            .unwrap_or(false);
        if entry.file_type().is_file() && matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn count_entries(dirs: &[PathBuf]) -> Result<usize, CoreError> {
    let mut count = 0;
    for dir in dirs {
        count += fs::read_dir(dir)?.count();
    }
    Ok(count)
}
