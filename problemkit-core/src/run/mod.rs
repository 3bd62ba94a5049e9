use std::{
    fs::File,
    io,
    os::unix::process::{CommandExt, ExitStatusExt},
    path::Path,
    process::{Child, Command, Stdio},
    thread::sleep,
    time::{Duration, Instant},
};

use nix::errno::Errno;
use serde_derive::Serialize;
use wait_timeout::ChildExt;

use crate::error::CoreError;

pub mod executor;
pub mod killer;
pub mod pool;

pub use executor::RunCommand;

const SPAWN_RETRIES: u32 = 20;

/// Redirections and limits of one process run. Unset redirections are
/// discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions<'a> {
    pub stdin: Option<&'a Path>,
    pub stdout: Option<&'a Path>,
    pub stderr: Option<&'a Path>,
    pub cwd: Option<&'a Path>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub exit_signal: Option<i32>,
    pub duration: Duration,
    pub timed_out: bool,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Run `command` to completion or until `options.timeout` passes.
///
/// A timeout is not an error: the process group is killed and reaped, and
/// the result carries `timed_out = true` with no exit code.
pub fn execute(command: &RunCommand, options: &ExecOptions) -> Result<ExecResult, CoreError> {
    let mut cmd = command.to_command();
    cmd.stdin(redirect_in(options.stdin)?)
        .stdout(redirect_out(options.stdout)?)
        .stderr(redirect_out(options.stderr)?)
        .process_group(0);
    if let Some(cwd) = options.cwd {
        cmd.current_dir(cwd);
    }

    let begin_time = Instant::now();
    let mut child = spawn(&mut cmd)?;
    log::debug!("Spawned `{}` pid={}", command, child.id());

    let status = match options.timeout {
        Some(timeout) => match child.wait_timeout(timeout)? {
            Some(status) => Some(status),
            None => {
                log::debug!("Process pid={} timed out after {:?}", child.id(), timeout);
                killer::kill_and_reap(&mut child)?;
                None
            }
        },
        None => Some(child.wait()?),
    };
    let duration = begin_time.elapsed();

    let result = match status {
        Some(status) => ExecResult {
            exit_code: status.code(),
            exit_signal: status.signal(),
            duration,
            timed_out: false,
        },
        None => ExecResult {
            exit_code: None,
            exit_signal: None,
            duration,
            timed_out: true,
        },
    };
    log::debug!("`{}` finished: {:?}", command, result);
    Ok(result)
}

/// Judged run of `command` on one testcase input.
///
/// The process may run for twice `time_limit`, so that solutions close to
/// the bound are distinguishable from hung ones. Exceeding `time_limit`
/// alone is what marks the run as timed out.
pub fn run_testcase(
    command: &RunCommand,
    input: &Path,
    output: &Path,
    time_limit: Duration,
) -> Result<ExecResult, CoreError> {
    let hard_limit = time_limit.checked_mul(2).ok_or_else(|| {
        CoreError::AnyhowError(anyhow::anyhow!("time limit {:?} is too large", time_limit))
    })?;
    let mut result = execute(
        command,
        &ExecOptions {
            stdin: Some(input),
            stdout: Some(output),
            timeout: Some(hard_limit),
            ..Default::default()
        },
    )?;
    if result.duration > time_limit {
        result.timed_out = true;
    }
    Ok(result)
}

fn redirect_in(path: Option<&Path>) -> Result<Stdio, CoreError> {
    Ok(match path {
        Some(path) => Stdio::from(File::open(path)?),
        None => Stdio::null(),
    })
}

fn redirect_out(path: Option<&Path>) -> Result<Stdio, CoreError> {
    Ok(match path {
        Some(path) => Stdio::from(File::create(path)?),
        None => Stdio::null(),
    })
}

// A freshly written script can still be open for writing in a sibling fork,
// which makes exec fail with ETXTBSY for a short moment.
fn spawn(cmd: &mut Command) -> io::Result<Child> {
    let mut attempts = 0;
    loop {
        match cmd.spawn() {
            Err(e) if e.raw_os_error() == Some(Errno::ETXTBSY as i32) && attempts < SPAWN_RETRIES => {
                attempts += 1;
                sleep(Duration::from_millis(10));
            }
            spawned => return spawned,
        }
    }
}
