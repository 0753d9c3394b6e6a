// src/exec/signal.rs

//! Process-group signal delivery.
//!
//! This is the only OS-specific part of the execution layer. The supervisor
//! talks to a [`GroupSignaller`]; [`PlatformSignaller`] picks the
//! implementation for the target at build time.

use std::io;

use tokio::process::Command;

/// Delivers signals to the process group led by `pid`.
pub trait GroupSignaller: Send + Sync {
    /// Cooperative interrupt (SIGINT / CTRL_BREAK).
    fn interrupt(&self, pid: u32) -> io::Result<()>;

    /// Forceful termination of the whole group.
    fn kill(&self, pid: u32) -> io::Result<()>;
}

#[cfg(unix)]
pub type PlatformSignaller = unix::UnixGroupSignaller;

#[cfg(windows)]
pub type PlatformSignaller = win::WindowsGroupSignaller;

/// Make the spawned process the leader of a new process group so that
/// signals reach its descendants too.
#[cfg(unix)]
pub fn configure_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(windows)]
pub fn configure_process_group(cmd: &mut Command) {
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

fn checked_pid(pid: u32) -> io::Result<i32> {
    // 0 would address our own group and 1 is init.
    match i32::try_from(pid) {
        Ok(p) if p > 1 => Ok(p),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to signal process group {pid}"),
        )),
    }
}

#[cfg(unix)]
mod unix {
    use std::io;

    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    use tracing::debug;

    use super::{checked_pid, GroupSignaller};

    #[derive(Debug, Clone, Copy, Default)]
    pub struct UnixGroupSignaller;

    impl UnixGroupSignaller {
        fn send(&self, pid: u32, signal: Signal) -> io::Result<()> {
            let pgid = Pid::from_raw(checked_pid(pid)?);
            match killpg(pgid, signal) {
                Ok(()) => {
                    debug!(pid, ?signal, "signal sent to process group");
                    Ok(())
                }
                // Group already gone: nothing left to signal.
                Err(Errno::ESRCH) => {
                    debug!(pid, ?signal, "process group already exited");
                    Ok(())
                }
                Err(e) => Err(io::Error::from(e)),
            }
        }
    }

    impl GroupSignaller for UnixGroupSignaller {
        fn interrupt(&self, pid: u32) -> io::Result<()> {
            self.send(pid, Signal::SIGINT)
        }

        fn kill(&self, pid: u32) -> io::Result<()> {
            self.send(pid, Signal::SIGKILL)
        }
    }
}

#[cfg(windows)]
mod win {
    use std::io;
    use std::process::{Command, Stdio};

    use windows::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};
    use tracing::debug;

    use super::{checked_pid, GroupSignaller};

    #[derive(Debug, Clone, Copy, Default)]
    pub struct WindowsGroupSignaller;

    impl GroupSignaller for WindowsGroupSignaller {
        fn interrupt(&self, pid: u32) -> io::Result<()> {
            checked_pid(pid)?;
            // SAFETY: plain FFI call with a process group id; no pointers.
            unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid) }
                .map_err(|e| io::Error::other(e.to_string()))?;
            debug!(pid, "CTRL_BREAK sent to process group");
            Ok(())
        }

        fn kill(&self, pid: u32) -> io::Result<()> {
            checked_pid(pid)?;
            let status = Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/T", "/F"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()?;
            if status.success() {
                debug!(pid, "process tree killed");
                Ok(())
            } else {
                Err(io::Error::other(format!(
                    "taskkill exited with {status} for pid {pid}"
                )))
            }
        }
    }
}
