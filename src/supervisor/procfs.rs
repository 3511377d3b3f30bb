//! Minimal `/proc/<pid>/stat` reader used to follow an agent's process tree
//! past its process group.

use std::fs;

/// The fields of `/proc/<pid>/stat` needed to follow a process tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ProcStat {
    pub pid: i32,
    pub state: char,
    pub ppid: i32,
    pub pgrp: i32,
    /// Start time in clock ticks since boot. Together with the pid this
    /// identifies one process even after its pid is recycled.
    pub start: u64,
}

impl ProcStat {
    pub fn is_zombie(&self) -> bool {
        matches!(self.state, 'Z' | 'X')
    }
}

/// Parse one `/proc/<pid>/stat` line.
///
/// The command name is parenthesized and may itself contain spaces or
/// parentheses, so fields are counted from the last `)`.
pub(super) fn parse_stat(line: &str) -> Option<ProcStat> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    let pid = line[..open].trim().parse().ok()?;
    let fields: Vec<&str> = line.get(close + 1..)?.split_whitespace().collect();

    Some(ProcStat {
        pid,
        state: fields.first()?.chars().next()?,
        ppid: fields.get(1)?.parse().ok()?,
        pgrp: fields.get(2)?.parse().ok()?,
        start: fields.get(19)?.parse().ok()?,
    })
}

pub(super) fn read(pid: i32) -> Option<ProcStat> {
    fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|line| parse_stat(&line))
}

/// Every process visible in `/proc`. Processes that exit mid-scan are skipped.
pub(super) fn all() -> Vec<ProcStat> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_str()?.parse::<i32>().ok())
        .filter_map(read)
        .collect()
}
