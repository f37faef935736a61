//! Delivering termination requests to spawned process groups.
//!
//! Every command is spawned as the leader of its own process group, so
//! signals sent here also reach grandchildren (`npm run dev` -> `node`).

use std::time::Duration;
use tokio::process::Child;

/// Ask the process group led by `pid` to terminate (SIGTERM).
///
/// A group that no longer exists is not an error.
#[cfg(unix)]
pub fn terminate_group(pid: u32) -> std::io::Result<()> {
    send_to_group(pid, nix::sys::signal::Signal::SIGTERM)
}

/// Graceful termination is not available; callers fall back to a kill.
#[cfg(not(unix))]
pub fn terminate_group(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "graceful termination is not supported on this platform",
    ))
}

/// Kill the process group led by `pid` (SIGKILL).
#[cfg(unix)]
pub fn kill_group(pid: u32) -> std::io::Result<()> {
    send_to_group(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(not(unix))]
pub fn kill_group(_pid: u32) -> std::io::Result<()> {
    Ok(())
}

/// Whether any member of the process group led by `pid` is still alive.
///
/// The leader may already be gone while grandchildren that ignored a
/// termination request keep the group populated.
#[cfg(unix)]
pub fn group_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    !matches!(killpg(Pid::from_raw(pid as i32), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
pub fn group_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn send_to_group(pid: u32, signal: nix::sys::signal::Signal) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(std::io::Error::from(errno)),
    }
}

/// Kill a child and its process group, then reap it.
pub async fn kill_and_reap(child: &mut Child) -> std::io::Result<std::process::ExitStatus> {
    if let Some(pid) = child.id() {
        if let Err(e) = kill_group(pid) {
            tracing::debug!(pid, error = %e, "failed to kill process group");
        }
    }
    // The group kill already covers the leader on unix; this is the only
    // kill on other platforms. An already-exited child is fine here.
    let _ = child.start_kill();
    child.wait().await
}

/// Ask a child's process group to terminate, give it `grace` to exit, then
/// kill whatever is left and reap the child.
pub async fn terminate_and_reap(
    child: &mut Child,
    grace: Duration,
) -> std::io::Result<std::process::ExitStatus> {
    let Some(pid) = child.id() else {
        return child.wait().await;
    };

    if terminate_group(pid).is_ok() {
        if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
            // Members that outlived their leader do not get a second chance.
            let _ = kill_group(pid);
            return status;
        }
    }
    kill_and_reap(child).await
}
