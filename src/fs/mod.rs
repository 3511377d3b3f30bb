//! Filesystem utilities for isotask.
//!
//! State snapshots and task artifacts are written atomically so a crash never
//! leaves a half-written file behind for the next run to trip over.

pub mod atomic;

pub use atomic::{atomic_write, atomic_write_file, mark_read_only, remove_tree, reset_dir};
