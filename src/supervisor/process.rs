//! Process-tree control for a supervised agent.
//!
//! On Unix the agent is spawned as the leader of a new process group, so the
//! whole tree it forks can be signalled at once with `killpg`. On Linux the
//! supervisor also registers as a child subreaper: descendants orphaned by
//! the agent are re-parented to us instead of init, which lets
//! `waitpid(-pgid)` reap them and makes "group gone" observable.
//!
//! A descendant can leave the group with `setsid` (Node's `detached: true`
//! does this). On Linux the tree is therefore also followed through `/proc`
//! parent links on every poll, and members found outside the group are
//! signalled and reaped individually.
//!
//! Elsewhere only the direct child can be killed.

#[cfg(target_os = "linux")]
use super::procfs;
use std::io;
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Pause between liveness checks while tearing down a tree.
const CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// A descendant that left the agent's process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Escapee {
    pid: i32,
    start: u64,
}

/// A spawned agent and the process group it leads.
pub(super) struct ProcessTree {
    child: Child,
    status: Option<ExitStatus>,
    escaped: Vec<Escapee>,
}

impl ProcessTree {
    /// Spawn `command` as the leader of its own process group.
    pub(super) fn spawn(command: &mut Command) -> io::Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            become_subreaper();
            command.process_group(0);
        }

        let child = command.spawn()?;
        Ok(Self {
            child,
            status: None,
            escaped: Vec::new(),
        })
    }

    pub(super) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Exit status of the leader, once reaped.
    pub(super) fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Non-blocking check on the leader.
    pub(super) fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?;
        }
        Ok(self.status)
    }

    /// Whether any process of the tree still exists (zombies included).
    pub(super) fn alive(&mut self) -> bool {
        let _ = self.try_wait();
        self.reap_members();
        self.track_escapees();
        #[cfg(unix)]
        {
            group_alive(self.pgid()) || !self.escaped.is_empty()
        }
        #[cfg(not(unix))]
        {
            self.status.is_none()
        }
    }

    /// Stop the whole tree: SIGTERM, then SIGKILL once `grace` has passed.
    pub(super) fn terminate(&mut self, grace: Duration) {
        #[cfg(unix)]
        {
            debug!(pgid = self.pgid(), "sending SIGTERM to process group");
            self.track_escapees();
            signal_group(self.pgid(), libc::SIGTERM);
            self.signal_escapees(libc::SIGTERM);

            let deadline = Instant::now() + grace;
            while Instant::now() < deadline {
                if !self.alive() {
                    return;
                }
                thread::sleep(CHECK_INTERVAL);
            }

            debug!(pgid = self.pgid(), "sending SIGKILL to process group");
            self.track_escapees();
            signal_group(self.pgid(), libc::SIGKILL);
            self.signal_escapees(libc::SIGKILL);
        }
        #[cfg(not(unix))]
        {
            let _ = grace;
            let _ = self.child.kill();
        }
    }

    /// Wait until the leader is reaped and no group member remains.
    ///
    /// Returns `false` if something is still alive after `timeout`.
    pub(super) fn reap(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.alive() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(CHECK_INTERVAL);
        }
    }

    /// The leader's pid, which is also the group id (`process_group(0)`).
    pub(super) fn pgid(&self) -> i32 {
        i32::try_from(self.child.id()).unwrap_or(i32::MAX)
    }

    /// Refresh the set of descendants living outside the process group.
    ///
    /// Walks parent links from the leader (while it is unreaped), the group
    /// members and already-known escapees. An escapee is forgotten only once
    /// it no longer exists: a zombie stays tracked until it is re-parented to
    /// us and reaped here.
    pub(super) fn track_escapees(&mut self) {
        #[cfg(target_os = "linux")]
        {
            let pgid = self.pgid();
            let procs = procfs::all();

            let mut tree: Vec<i32> = procs
                .iter()
                .filter(|p| p.pgrp == pgid)
                .map(|p| p.pid)
                .chain(self.escaped.iter().map(|e| e.pid))
                .collect();
            if self.status.is_none() {
                tree.push(pgid);
            }

            let mut grew = true;
            while grew {
                grew = false;
                for proc in &procs {
                    if tree.contains(&proc.ppid) && !tree.contains(&proc.pid) {
                        tree.push(proc.pid);
                        grew = true;
                    }
                }
            }

            for proc in &procs {
                let known = self.escaped.iter().any(|e| e.pid == proc.pid);
                if proc.pgrp != pgid && tree.contains(&proc.pid) && !known {
                    debug!(
                        pid = proc.pid,
                        pgrp = proc.pgrp,
                        pgid,
                        "agent descendant left the process group"
                    );
                    self.escaped.push(Escapee {
                        pid: proc.pid,
                        start: proc.start,
                    });
                }
            }

            self.escaped.retain(|escapee| {
                let mut status = 0;
                unsafe { libc::waitpid(escapee.pid, &mut status, libc::WNOHANG) };
                procfs::read(escapee.pid).is_some_and(|p| p.start == escapee.start)
            });
        }
    }

    /// Signal every tracked escapee that is still the process we saw.
    #[cfg(unix)]
    fn signal_escapees(&self, signal: libc::c_int) {
        #[cfg(target_os = "linux")]
        for escapee in &self.escaped {
            let live = procfs::read(escapee.pid)
                .is_some_and(|p| p.start == escapee.start && !p.is_zombie());
            if live {
                debug!(pid = escapee.pid, signal, "signalling escaped descendant");
                unsafe { libc::kill(escapee.pid, signal) };
            }
        }
        #[cfg(not(target_os = "linux"))]
        let _ = signal;
    }

    /// Reap exited group members that were re-parented to us.
    ///
    /// Only runs once the leader has been reaped through `Child`, so that
    /// `waitpid(-pgid)` can never steal the leader's exit status.
    fn reap_members(&mut self) {
        #[cfg(unix)]
        if self.status.is_some() {
            let pgid = self.pgid();
            loop {
                let mut status = 0;
                let rc = unsafe { libc::waitpid(-pgid, &mut status, libc::WNOHANG) };
                if rc <= 0 {
                    break;
                }
                debug!(pid = rc, pgid, "reaped process group member");
            }
        }
    }
}

#[cfg(unix)]
fn signal_group(pgid: i32, signal: libc::c_int) {
    let rc = unsafe { libc::killpg(pgid, signal) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            debug!(pgid, signal, error = %err, "killpg failed");
        }
    }
}

#[cfg(unix)]
fn group_alive(pgid: i32) -> bool {
    let rc = unsafe { libc::kill(-pgid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

/// Register this process as a child subreaper (Linux only, once).
#[cfg(target_os = "linux")]
pub(super) fn become_subreaper() {
    use std::sync::Once;
    static SUBREAPER: Once = Once::new();
    SUBREAPER.call_once(|| {
        let rc = unsafe { libc::prctl(libc::PR_SET_CHILD_SUBREAPER, 1, 0, 0, 0) };
        if rc != 0 {
            tracing::warn!(
                error = %io::Error::last_os_error(),
                "could not become child subreaper; orphaned agent helpers are reaped by init"
            );
        }
    });
}

#[cfg(all(unix, not(target_os = "linux")))]
pub(super) fn become_subreaper() {}
