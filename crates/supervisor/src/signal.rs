//! Platform termination primitives.

use std::io;

#[cfg(unix)]
pub(crate) fn request_termination(pid: u32, process_group: bool) -> io::Result<()> {
    send(pid, process_group, libc::SIGTERM)
}

#[cfg(unix)]
pub(crate) fn force_kill(pid: u32, process_group: bool) -> io::Result<()> {
    send(pid, process_group, libc::SIGKILL)
}

#[cfg(unix)]
fn send(pid: u32, process_group: bool, signal: libc::c_int) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: kill(2) takes plain integers and has no memory-safety preconditions.
    if process_group && unsafe { libc::kill(-pid, signal) } == 0 {
        return Ok(());
    }
    // SAFETY: as above.
    if unsafe { libc::kill(pid, signal) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(windows)]
pub(crate) fn request_termination(pid: u32, _process_group: bool) -> io::Result<()> {
    taskkill(pid, false)
}

#[cfg(windows)]
pub(crate) fn force_kill(pid: u32, _process_group: bool) -> io::Result<()> {
    taskkill(pid, true)
}

/// `/T` takes the console window's whole process tree with it.
#[cfg(windows)]
fn taskkill(pid: u32, force: bool) -> io::Result<()> {
    use std::process::{Command, Stdio};

    let mut command = Command::new("taskkill");
    command.args(["/PID", &pid.to_string(), "/T"]);
    if force {
        command.arg("/F");
    }

    let status = command
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {}", status)))
    }
}
