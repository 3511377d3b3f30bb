//! SIGINT/SIGTERM handling for the CLI.
//!
//! The handler only sets a process-wide flag. A watcher thread forwards that
//! flag into the run's [`CancelToken`], which the supervisor polls. A second
//! signal while the first is still being handled exits at once with 130,
//! after SIGKILLing the agent's process group registered with
//! [`ActiveGroup`]. The agent runs in its own group, so a terminal's Ctrl-C
//! never reaches it.

use crate::supervisor::CancelToken;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Process group of the running agent, 0 when none.
static ACTIVE_GROUP: AtomicI32 = AtomicI32::new(0);

#[cfg(unix)]
extern "C" fn on_signal(_signal: libc::c_int) {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        kill_registered(&ACTIVE_GROUP);
        unsafe { libc::_exit(130) };
    }
}

/// SIGKILL the group registered in `slot`. Async-signal-safe.
#[cfg(unix)]
fn kill_registered(slot: &AtomicI32) {
    let pgid = slot.load(Ordering::SeqCst);
    if pgid > 0 {
        unsafe { libc::killpg(pgid, libc::SIGKILL) };
    }
}

/// Registers the agent's process group for the hard-exit path until dropped.
pub struct ActiveGroup {
    slot: &'static AtomicI32,
    pgid: i32,
}

impl ActiveGroup {
    pub fn register(pgid: i32) -> Self {
        Self::register_in(&ACTIVE_GROUP, pgid)
    }

    fn register_in(slot: &'static AtomicI32, pgid: i32) -> Self {
        slot.store(pgid, Ordering::SeqCst);
        Self { slot, pgid }
    }
}

impl Drop for ActiveGroup {
    fn drop(&mut self) {
        // A later registration owns the slot now.
        let _ = self
            .slot
            .compare_exchange(self.pgid, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}

/// Install the handler for SIGINT and SIGTERM.
pub fn install() {
    #[cfg(unix)]
    for signal in [libc::SIGINT, libc::SIGTERM] {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        let previous = unsafe { libc::signal(signal, handler) };
        if previous == libc::SIG_ERR {
            warn!(signal, error = %std::io::Error::last_os_error(), "failed to install signal handler");
        }
    }
}

/// Whether a stop signal has arrived.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Forwards a received signal into a cancel token until dropped.
pub struct SignalWatcher {
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    pub fn spawn(token: CancelToken, poll: Duration) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let stop = done.clone();

        let handle = thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                if interrupted() {
                    info!("stop signal received; cancelling run");
                    token.cancel();
                    return;
                }
                thread::sleep(poll);
            }
        });

        Self {
            done,
            handle: Some(handle),
        }
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[cfg(unix)]
    #[test]
    #[serial]
    fn sigterm_sets_the_flag() {
        reset();
        install();

        unsafe { libc::raise(libc::SIGTERM) };

        assert!(interrupted());
        reset();
    }

    #[test]
    #[serial]
    fn watcher_forwards_flag_to_token() {
        reset();
        let token = CancelToken::new();
        let watcher = SignalWatcher::spawn(token.clone(), Duration::from_millis(5));

        INTERRUPTED.store(true, Ordering::SeqCst);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !token.is_cancelled() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        drop(watcher);

        assert!(token.is_cancelled());
        reset();
    }

    #[test]
    fn group_registration_is_cleared_on_drop() {
        static SLOT: AtomicI32 = AtomicI32::new(0);

        let outer = ActiveGroup::register_in(&SLOT, 4242);
        assert_eq!(SLOT.load(Ordering::SeqCst), 4242);
        {
            let _inner = ActiveGroup::register_in(&SLOT, 4343);
            assert_eq!(SLOT.load(Ordering::SeqCst), 4343);
        }
        assert_eq!(SLOT.load(Ordering::SeqCst), 0);
        drop(outer);
        assert_eq!(SLOT.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[test]
    fn hard_exit_path_kills_registered_group() {
        static SLOT: AtomicI32 = AtomicI32::new(0);
        use std::os::unix::process::{CommandExt, ExitStatusExt};

        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let pgid = i32::try_from(child.id()).unwrap();
        let group = ActiveGroup::register_in(&SLOT, pgid);

        kill_registered(&SLOT);

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
        drop(group);
        assert_eq!(SLOT.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[serial]
    fn dropping_watcher_stops_it_quietly() {
        reset();
        let token = CancelToken::new();
        drop(SignalWatcher::spawn(token.clone(), Duration::from_millis(5)));
        assert!(!token.is_cancelled());
    }
}
