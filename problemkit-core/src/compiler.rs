use std::{
    collections::HashMap,
    fmt, fs,
    path::{Component, Path, PathBuf},
    process::Command,
    str::FromStr,
    sync::{Arc, Mutex},
};

use serde_derive::{Deserialize, Serialize};

use crate::{
    error::BuildError,
    run::{self, ExecOptions, RunCommand},
    utils::is_executable,
};

pub const DEFAULT_CHECKTESTDATA: &str = "checktestdata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    C,
    Cpp,
    Java,
    Python2,
    Python3,
    Rust,
    Shell,
    Checktestdata,
}

impl Language {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "c" => Some(Self::C),
            "cc" | "cpp" => Some(Self::Cpp),
            "java" => Some(Self::Java),
            "py2" => Some(Self::Python2),
            "py" | "py3" => Some(Self::Python3),
            "rs" => Some(Self::Rust),
            "sh" => Some(Self::Shell),
            "ctd" => Some(Self::Checktestdata),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self, Self::C | Self::Cpp | Self::Java | Self::Rust)
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" => Ok(Self::C),
            "cpp" | "c++" => Ok(Self::Cpp),
            "java" => Ok(Self::Java),
            "python2" => Ok(Self::Python2),
            "python" | "python3" => Ok(Self::Python3),
            "rust" => Ok(Self::Rust),
            "sh" => Ok(Self::Shell),
            "checktestdata" => Ok(Self::Checktestdata),
            _ => Err(anyhow::anyhow!("Language not found: {}", s)),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Compile step and run step of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub compile: Option<RunCommand>,
    /// Exists once compilation has succeeded.
    pub artifact: Option<PathBuf>,
    pub run: RunCommand,
}

/// A named program found in a program directory.
#[derive(Debug)]
pub struct Candidate {
    pub name: String,
    pub path: PathBuf,
    pub build: Result<RunCommand, BuildError>,
}

#[derive(Debug, Clone)]
enum BuildState {
    Built(RunCommand),
    Failed { code: Option<i32>, stderr: String },
}

/// Turns source paths into run commands, compiling every source at most once
/// per process.
///
/// Artifacts live under `build_root`, mirroring the source's absolute path.
#[derive(Debug)]
pub struct CompilerCache {
    build_root: PathBuf,
    checktestdata: String,
    builds: Mutex<HashMap<PathBuf, Arc<Mutex<Option<BuildState>>>>>,
}

impl CompilerCache {
    pub fn new(build_root: PathBuf) -> Self {
        Self {
            build_root,
            checktestdata: DEFAULT_CHECKTESTDATA.to_owned(),
            builds: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_checktestdata(mut self, checktestdata: impl Into<String>) -> Self {
        self.checktestdata = checktestdata.into();
        self
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Compile and run commands for `source`, without touching the disk.
    pub fn plan(&self, source: &Path) -> Result<BuildPlan, BuildError> {
        let language = Language::from_path(source).ok_or_else(|| BuildError::UnknownExtension {
            path: source.to_owned(),
        })?;
        let source_str = source.to_string_lossy().into_owned();
        let stem = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target_dir = self.mirror_dir(source);
        let exe = target_dir.join(&stem);
        let exe_str = exe.to_string_lossy().into_owned();

        let plan = match language {
            Language::C => BuildPlan {
                compile: Some(RunCommand::new(
                    "gcc",
                    vec![
                        "-std=c11".to_owned(),
                        "-Wall".to_owned(),
                        "-O2".to_owned(),
                        "-o".to_owned(),
                        exe_str.clone(),
                        source_str,
                        "-lm".to_owned(),
                    ],
                )),
                artifact: Some(exe),
                run: RunCommand::new(exe_str, vec![]),
            },
            Language::Cpp => BuildPlan {
                compile: Some(RunCommand::new(
                    "g++",
                    vec![
                        "-std=c++17".to_owned(),
                        "-Wall".to_owned(),
                        "-O2".to_owned(),
                        "-o".to_owned(),
                        exe_str.clone(),
                        source_str,
                    ],
                )),
                artifact: Some(exe),
                run: RunCommand::new(exe_str, vec![]),
            },
            Language::Rust => BuildPlan {
                compile: Some(RunCommand::new(
                    "rustc",
                    vec![
                        "--edition=2021".to_owned(),
                        "-O".to_owned(),
                        "-o".to_owned(),
                        exe_str.clone(),
                        source_str,
                    ],
                )),
                artifact: Some(exe),
                run: RunCommand::new(exe_str, vec![]),
            },
            Language::Java => {
                let class_dir = target_dir.to_string_lossy().into_owned();
                BuildPlan {
                    compile: Some(RunCommand::new(
                        "javac",
                        vec!["-d".to_owned(), class_dir.clone(), source_str],
                    )),
                    artifact: Some(target_dir.join(format!("{}.class", stem))),
                    run: RunCommand::new(
                        "java",
                        vec![
                            "-enableassertions".to_owned(),
                            "-Xss1532M".to_owned(),
                            "-cp".to_owned(),
                            class_dir,
                            stem,
                        ],
                    ),
                }
            }
            Language::Python2 => interpreted("python2", source_str),
            Language::Python3 => interpreted("python3", source_str),
            Language::Shell => interpreted("sh", source_str),
            Language::Checktestdata => interpreted(&self.checktestdata, source_str),
        };
        Ok(plan)
    }

    /// Run command for a single source file, compiling it on first use.
    ///
    /// Concurrent first requests for the same source wait on one build.
    pub fn build(&self, source: &Path) -> Result<RunCommand, BuildError> {
        let source = absolute(source)?;
        let plan = self.plan(&source)?;
        let slot = self.slot(&source);
        let mut state = slot.lock().unwrap_or_else(|e| e.into_inner());

        match state.as_ref() {
            Some(BuildState::Built(run)) => return Ok(run.clone()),
            Some(BuildState::Failed { code, stderr }) => {
                return Err(BuildError::CompileFailed {
                    path: source,
                    code: *code,
                    stderr: stderr.clone(),
                })
            }
            None => {}
        }

        if let (Some(compile), Some(artifact)) = (&plan.compile, &plan.artifact) {
            if artifact.exists() {
                log::debug!("Reusing build of {:?} at {:?}", source, artifact);
            } else {
                if let Some(parent) = artifact.parent() {
                    fs::create_dir_all(parent).map_err(|e| io_error(&source, e))?;
                }
                log::info!("Compiling {:?}", source);
                log::debug!("Compile command: {}", compile);
                let output = compile
                    .to_command()
                    .output()
                    .map_err(|e| io_error(&source, e))?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                    log::error!("Failed to build {:?}: {}", source, stderr);
                    *state = Some(BuildState::Failed {
                        code: output.status.code(),
                        stderr: stderr.clone(),
                    });
                    return Err(BuildError::CompileFailed {
                        path: source,
                        code: output.status.code(),
                        stderr,
                    });
                }
            }
        }

        *state = Some(BuildState::Built(plan.run.clone()));
        Ok(plan.run)
    }

    /// Run command for a program given as a file or as a directory.
    ///
    /// Extension-less executables are run as they are. A directory must
    /// resolve to exactly one program.
    pub fn build_program(&self, path: &Path) -> Result<RunCommand, BuildError> {
        if path.is_dir() {
            let mut candidates = self.build_directory(path, false)?;
            return match candidates.len() {
                1 => candidates.remove(0).build,
                n => Err(BuildError::DirectoryProgram {
                    path: path.to_owned(),
                    msg: format!("expected exactly one program, found {}", n),
                }),
            };
        }
        if Language::from_path(path).is_none() && is_executable(path) {
            return Ok(RunCommand::from_path(&absolute(path)?));
        }
        self.build(path)
    }

    /// Programs contained in `directory`.
    ///
    /// An executable `build` script is run once and must leave an executable
    /// `run` behind; otherwise an executable `run` is used directly; otherwise
    /// every source file and executable inside is a separate candidate, named
    /// `<dir>/<file>` when `include_dirname` is set.
    pub fn build_directory(
        &self,
        directory: &Path,
        include_dirname: bool,
    ) -> Result<Vec<Candidate>, BuildError> {
        let directory = absolute(directory)?;
        let dirname = directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let display_name = |name: &str| {
            if include_dirname {
                format!("{}/{}", dirname, name)
            } else {
                name.to_owned()
            }
        };

        let build_script = directory.join("build");
        let run_script = directory.join("run");
        if is_executable(&build_script) {
            let build = self.run_build_script(&directory);
            return Ok(vec![Candidate {
                name: display_name("run"),
                path: run_script,
                build,
            }]);
        }
        if is_executable(&run_script) {
            return Ok(vec![Candidate {
                name: display_name("run"),
                build: Ok(RunCommand::from_path(&run_script)),
                path: run_script,
            }]);
        }

        let mut paths = vec![];
        for entry in fs::read_dir(&directory).map_err(|e| io_error(&directory, e))? {
            let path = entry.map_err(|e| io_error(&directory, e))?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut candidates = vec![];
        for path in paths {
            let name = display_name(&path.file_name().unwrap_or_default().to_string_lossy());
            if Language::from_path(&path).is_some() {
                let build = self.build(&path);
                if let Err(e) = &build {
                    log::error!("{}: {}", name, e);
                }
                candidates.push(Candidate { name, path, build });
            } else if is_executable(&path) {
                candidates.push(Candidate {
                    name,
                    build: Ok(RunCommand::from_path(&path)),
                    path,
                });
            }
        }
        Ok(candidates)
    }

    fn run_build_script(&self, directory: &Path) -> Result<RunCommand, BuildError> {
        let slot = self.slot(directory);
        let mut state = slot.lock().unwrap_or_else(|e| e.into_inner());
        match state.as_ref() {
            Some(BuildState::Built(run)) => return Ok(run.clone()),
            Some(BuildState::Failed { code, stderr }) => {
                return Err(BuildError::CompileFailed {
                    path: directory.to_owned(),
                    code: *code,
                    stderr: stderr.clone(),
                })
            }
            None => {}
        }

        log::info!("Running build script in {:?}", directory);
        let result = run::execute(
            &RunCommand::from_path(&directory.join("build")),
            &ExecOptions {
                cwd: Some(directory),
                ..Default::default()
            },
        )
        .map_err(|e| BuildError::DirectoryProgram {
            path: directory.to_owned(),
            msg: e.to_string(),
        })?;
        if !result.success() {
            *state = Some(BuildState::Failed {
                code: result.exit_code,
                stderr: String::new(),
            });
            return Err(BuildError::CompileFailed {
                path: directory.to_owned(),
                code: result.exit_code,
                stderr: String::new(),
            });
        }

        let run_script = directory.join("run");
        if !is_executable(&run_script) {
            return Err(BuildError::DirectoryProgram {
                path: directory.to_owned(),
                msg: "build did not produce an executable run".to_owned(),
            });
        }
        let run = RunCommand::from_path(&run_script);
        *state = Some(BuildState::Built(run.clone()));
        Ok(run)
    }

    fn slot(&self, key: &Path) -> Arc<Mutex<Option<BuildState>>> {
        let mut builds = self.builds.lock().unwrap_or_else(|e| e.into_inner());
        builds.entry(key.to_owned()).or_default().clone()
    }

    fn mirror_dir(&self, source: &Path) -> PathBuf {
        let mut dir = self.build_root.clone();
        if let Some(parent) = source.parent() {
            for component in parent.components() {
                if let Component::Normal(part) = component {
                    dir.push(part);
                }
            }
        }
        dir
    }
}

fn interpreted(interpreter: &str, source: String) -> BuildPlan {
    BuildPlan {
        compile: None,
        artifact: None,
        run: RunCommand::new(interpreter, vec![source]),
    }
}

fn absolute(path: &Path) -> Result<PathBuf, BuildError> {
    fs::canonicalize(path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> BuildError {
    BuildError::IOError {
        path: path.to_owned(),
        source,
    }
}

/// Whether a compiler for `language` can be found on this machine.
pub fn compiler_available(language: Language) -> bool {
    let program = match language {
        Language::C => "gcc",
        Language::Cpp => "g++",
        Language::Java => "javac",
        Language::Rust => "rustc",
        _ => return true,
    };
    Command::new(program)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
