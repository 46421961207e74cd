use std::path::PathBuf;

use anyhow::{Result, bail};
use log::{debug, warn};

use crate::store::{State, Store};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LockStatus {
    Free,
    HeldBySelf,
    Held { pid: u32, show: Option<String> },
    Stale { pid: u32 },
}

pub(crate) fn lock_status<F>(state: &State, own_pid: u32, is_alive: F) -> LockStatus
where
    F: Fn(u32) -> bool,
{
    if !state.playing {
        return LockStatus::Free;
    }
    match state.pid {
        Some(pid) if pid == own_pid => LockStatus::HeldBySelf,
        Some(pid) if is_alive(pid) => LockStatus::Held {
            pid,
            show: state.show.clone(),
        },
        Some(pid) => LockStatus::Stale { pid },
        // Written by a build that did not record the owner; nobody can release it.
        None => LockStatus::Stale { pid: 0 },
    }
}

#[cfg(unix)]
pub(crate) fn process_is_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub(crate) fn process_is_alive(pid: u32) -> bool {
    pid != 0
}

fn held_message(pid: u32, show: Option<&str>) -> String {
    match show {
        Some(show) => format!("'{show}' is currently playing (pid {pid}); wait for it to finish"),
        None => format!("a show is currently playing (pid {pid}); wait for it to finish"),
    }
}

/// Fails when another live process holds the lock and clears a stale one.
pub(crate) fn ensure_not_locked(store: &mut Store, own_pid: u32) -> Result<()> {
    match lock_status(store.state(), own_pid, process_is_alive) {
        LockStatus::Free | LockStatus::HeldBySelf => Ok(()),
        LockStatus::Held { pid, show } => bail!(held_message(pid, show.as_deref())),
        LockStatus::Stale { pid } => {
            warn!("clearing stale playing lock left by pid {pid}");
            let state = store.state_mut();
            state.playing = false;
            state.pid = None;
            store.save()
        }
    }
}

pub(crate) fn acquire(store: &mut Store, own_pid: u32) -> Result<()> {
    ensure_not_locked(store, own_pid)?;
    let state = store.state_mut();
    state.playing = true;
    state.pid = Some(own_pid);
    store.save()?;
    debug!("playing lock acquired by pid {own_pid}");
    Ok(())
}

/// Returns whether the lock was released; a lock owned by another pid is left alone.
pub(crate) fn release(store: &mut Store, own_pid: u32) -> Result<bool> {
    let state = store.state_mut();
    if !state.playing || state.pid != Some(own_pid) {
        return Ok(false);
    }
    state.playing = false;
    state.pid = None;
    store.save()?;
    debug!("playing lock released by pid {own_pid}");
    Ok(true)
}

/// Releases the playing lock held by this process when dropped, whatever way `run` ends.
#[derive(Debug)]
pub(crate) struct ExitGuard {
    state_path: PathBuf,
    pid: u32,
}

impl ExitGuard {
    pub(crate) fn new(state_path: PathBuf, pid: u32) -> Self {
        Self { state_path, pid }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let released = Store::open_existing(&self.state_path).and_then(|store| match store {
            Some(mut store) => release(&mut store, self.pid),
            None => Ok(false),
        });
        if let Err(err) = released {
            warn!("failed to release playing lock: {err:#}");
        }
    }
}
