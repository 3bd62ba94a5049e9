use std::process::Child;

use log::{error, info};
use nix::{
    errno::Errno,
    sys::signal::{killpg, Signal},
    unistd::Pid,
};

use crate::error::CoreError;

/// Kill the whole process group led by `child` and reap it.
///
/// Children are spawned as group leaders, so anything they forked dies with
/// them.
pub fn kill_and_reap(child: &mut Child) -> Result<(), CoreError> {
    let pid = child.id();
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => info!("killer successfully killed process group:{}", pid),
        // Already gone.
        Err(Errno::ESRCH) => {}
        Err(e) => {
            error!("killer kill process group:{} failed: {}", pid, e);
            child.kill()?;
        }
    }
    child.wait()?;
    Ok(())
}

#[cfg(test)]
mod killer {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    #[test]
    fn test_kill_and_reap() {
        let mut child = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .expect("Failed to execute child");

        kill_and_reap(&mut child).unwrap();
        assert!(child.try_wait().unwrap().is_some());
    }
}
