//! Run lock for an isotask base directory.
//!
//! Only one command may drive a base directory at a time: `run`, `rerun` and
//! `clean` take `<base>/run.lock` before touching state, so two runs never
//! interleave tasks or state writes.
//!
//! # Lock File
//!
//! The lock is created with **create_new** semantics (exclusive create) and
//! holds JSON metadata:
//! - `owner`: `user@HOST`
//! - `host`: hostname of the holder
//! - `pid`: process ID of the holder
//! - `created_at`: RFC3339 timestamp
//! - `action`: the command holding it (`run`, `rerun`, `clean`)
//!
//! A lock left behind by a crashed process on this host (its pid no longer
//! exists) is stale and is taken over. A lock held by a live process, or by
//! another host, is never broken automatically.
//!
//! # RAII Guard
//!
//! [`LockGuard`] removes the lock file when dropped.

mod guard;
mod metadata;
mod operations;


pub use guard::LockGuard;
pub use metadata::LockMetadata;
pub use operations::{acquire_run_lock, read_run_lock};
