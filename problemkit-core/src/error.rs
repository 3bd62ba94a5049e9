use nix::errno::Errno;
use std::io;
use std::path::{Path, PathBuf};

/// Malformed generator specification. Aborts the whole generation run.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("gen.yaml not found: {0:?}")]
    NotFound(PathBuf),
    #[error("{path}: neither a testcase nor a directory")]
    UnknownShape { path: String },
    #[error("duplicate path: {0}")]
    DuplicatePath(String),
    #[error("{path}: numbered and named children cannot be mixed")]
    MixedNumbering { path: String },
    #[error("{path}: include of unknown directory {include}")]
    UnknownInclude { path: String, include: String },
    #[error("{path}: generator must not be an absolute path: {generator}")]
    AbsoluteGenerator { path: String, generator: String },
    #[error("{path}: {msg}")]
    Invalid { path: String, msg: String },
    #[error("gen.yaml is not valid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failure to turn a source path into a runnable command. Only the affected
/// program becomes unusable.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{path:?} has unknown extension")]
    UnknownExtension { path: PathBuf },
    #[error("failed to build {path:?}: exited with code {code:?}\n{stderr}")]
    CompileFailed {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{path:?}: {msg}")]
    DirectoryProgram { path: PathBuf, msg: String },
    #[error("failed to run compiler for {path:?}: {source}")]
    IOError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Build(#[from] BuildError),
    /// A validator exited with neither the accept nor the reject code.
    #[error("output validator {validator} misbehaved: exit code {exit_code:?}")]
    ValidatorFault {
        validator: String,
        exit_code: Option<i32>,
    },
    #[error("internal consistency failure: {0}")]
    Internal(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    IOError(#[from] io::Error),
    #[error("errno: {0}")]
    NixErrno(#[from] Errno),
    #[error("yaml error: {0}")]
    SerdeYamlError(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

pub fn path_not_exist(path: &Path) -> CoreError {
    CoreError::AnyhowError(anyhow::anyhow!("Path not exist: {:?}", path))
}
