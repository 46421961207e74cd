use std::process::{Command as ProcessCommand, ExitStatus};

use anyhow::{Context, Result};

#[cfg(unix)]
use anyhow::anyhow;
#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// Restores the previous disposition of a signal when dropped.
#[cfg(unix)]
struct IgnoredSignal {
    signum: libc::c_int,
    previous: libc::sigaction,
}

#[cfg(unix)]
impl IgnoredSignal {
    fn new(signum: libc::c_int) -> Result<Self> {
        unsafe {
            let mut ignore: libc::sigaction = std::mem::zeroed();
            ignore.sa_sigaction = libc::SIG_IGN;
            libc::sigemptyset(&mut ignore.sa_mask);
            ignore.sa_flags = 0;

            let mut previous: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(signum, &ignore, &mut previous) != 0 {
                return Err(anyhow!("failed to ignore signal {signum}"));
            }
            Ok(Self { signum, previous })
        }
    }
}

#[cfg(unix)]
impl Drop for IgnoredSignal {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::sigaction(self.signum, &self.previous, std::ptr::null_mut());
        }
    }
}

/// Gives the terminal back to crly's process group once the player exits.
#[cfg(unix)]
struct ForegroundHandoff {
    tty_fd: libc::c_int,
    own_pgrp: libc::pid_t,
    handed_off: bool,
}

#[cfg(unix)]
impl ForegroundHandoff {
    fn give_to(&mut self, child_pgrp: libc::pid_t) {
        self.handed_off = unsafe { libc::tcsetpgrp(self.tty_fd, child_pgrp) == 0 };
    }
}

#[cfg(unix)]
impl Drop for ForegroundHandoff {
    fn drop(&mut self) {
        if self.handed_off {
            unsafe {
                let _ = libc::tcsetpgrp(self.tty_fd, self.own_pgrp);
            }
        }
    }
}

/// Undoes crly's own signal setup in the child: ignored dispositions survive
/// `exec`, and a player started with SIGINT ignored cannot be stopped.
#[cfg(unix)]
fn reset_child_signals(cmd: &mut ProcessCommand, own_group: bool) {
    unsafe {
        cmd.pre_exec(move || {
            libc::signal(libc::SIGINT, libc::SIG_DFL);
            libc::signal(libc::SIGQUIT, libc::SIG_DFL);
            libc::signal(libc::SIGTSTP, libc::SIG_DFL);
            libc::signal(libc::SIGTTOU, libc::SIG_DFL);
            if own_group && libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Runs `cmd` attached to the terminal. Ctrl-C while it runs reaches only the
/// child, so crly survives to record progress and release the playing lock.
#[cfg(unix)]
pub(super) fn run_in_foreground(cmd: ProcessCommand, label: &str) -> Result<ExitStatus> {
    let tty_fd = libc::STDIN_FILENO;
    let own_pgrp = unsafe { libc::tcgetpgrp(tty_fd) };
    if own_pgrp == -1 {
        return run_without_terminal(cmd, label);
    }
    run_with_terminal(cmd, label, tty_fd, own_pgrp)
}

#[cfg(unix)]
fn run_with_terminal(
    mut cmd: ProcessCommand,
    label: &str,
    tty_fd: libc::c_int,
    own_pgrp: libc::pid_t,
) -> Result<ExitStatus> {
    let _sigint = IgnoredSignal::new(libc::SIGINT)?;
    let _sigttou = IgnoredSignal::new(libc::SIGTTOU)?;
    let mut handoff = ForegroundHandoff {
        tty_fd,
        own_pgrp,
        handed_off: false,
    };
    reset_child_signals(&mut cmd, true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {label}"))?;
    handoff.give_to(child.id() as libc::pid_t);
    child
        .wait()
        .with_context(|| format!("failed waiting on {label}"))
}

/// No terminal to hand over: the child stays in crly's group, so both see
/// Ctrl-C and only crly ignores it.
#[cfg(unix)]
fn run_without_terminal(mut cmd: ProcessCommand, label: &str) -> Result<ExitStatus> {
    let _sigint = IgnoredSignal::new(libc::SIGINT)?;
    reset_child_signals(&mut cmd, false);
    cmd.status()
        .with_context(|| format!("failed to launch {label}"))
}

#[cfg(not(unix))]
pub(super) fn run_in_foreground(mut cmd: ProcessCommand, label: &str) -> Result<ExitStatus> {
    cmd.status()
        .with_context(|| format!("failed to launch {label}"))
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new(tag: &str) -> Self {
            let dir = env::temp_dir().join(format!("crly-proc-{tag}-{}", std::process::id()));
            fs::create_dir_all(&dir).expect("create temp dir");
            Self(dir)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn ignored_mask(status: &str) -> u64 {
        let line = status
            .lines()
            .find_map(|line| line.strip_prefix("SigIgn:"))
            .expect("SigIgn line");
        u64::from_str_radix(line.trim(), 16).expect("hex mask")
    }

    #[test]
    fn player_without_terminal_gets_default_sigint() {
        let dir = TempDir::new("sigign");
        let report = dir.0.join("status");
        let mut cmd = ProcessCommand::new("sh");
        cmd.arg("-c")
            .arg(format!("cat /proc/self/status > '{}'", report.display()));

        let status = run_without_terminal(cmd, "sh").expect("child should run");
        assert!(status.success());

        let mask = ignored_mask(&fs::read_to_string(&report).expect("read report"));
        let sigint_bit = 1u64 << (libc::SIGINT - 1);
        let sigquit_bit = 1u64 << (libc::SIGQUIT - 1);
        assert_eq!(mask & sigint_bit, 0, "SIGINT ignored in child: {mask:x}");
        assert_eq!(mask & sigquit_bit, 0, "SIGQUIT ignored in child: {mask:x}");
    }
}
