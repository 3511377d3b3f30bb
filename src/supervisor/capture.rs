//! Incremental output capture.
//!
//! One reader thread per pipe forwards lines over a channel; the supervision
//! loop owns [`OutputCapture`] and is its only writer. Lines reach the live
//! results files as soon as they arrive, so `results/<id>.result` can be
//! tailed while the agent runs.

use crate::context::RunContext;
use crate::error::{Result, RunnerError};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use tracing::warn;

/// In-memory tail kept per stream for the exit summary. The results files
/// always receive everything.
const MAX_CAPTURE_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn name(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

#[derive(Debug)]
pub(super) enum CaptureEvent {
    /// One line, including its trailing newline when the agent wrote one.
    Line(Stream, String),
    /// Reading the pipe failed; no more lines will come from this stream.
    ReadError(Stream, String),
}

/// Forward lines from `reader` until EOF or a read error.
pub(super) fn spawn_reader<R>(reader: R, stream: Stream, tx: Sender<CaptureEvent>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffered = BufReader::new(reader);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match buffered.read_until(b'\n', &mut raw) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw).into_owned();
                    if tx.send(CaptureEvent::Line(stream, line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(CaptureEvent::ReadError(stream, e.to_string()));
                    break;
                }
            }
        }
    })
}

/// Captured output of one execution plus its live results files.
pub(super) struct OutputCapture {
    stdout: String,
    stderr: String,
    stdout_file: Option<File>,
    stderr_file: Option<File>,
    stdout_path: PathBuf,
    stderr_path: PathBuf,
}

impl OutputCapture {
    /// Truncate (or create) `results/<id>.result` and `results/<id>.error`.
    pub(super) fn create(ctx: &RunContext, task_id: &str) -> Result<Self> {
        let stdout_path = ctx.result_file(task_id);
        let stderr_path = ctx.error_file(task_id);
        Ok(Self {
            stdout_file: Some(create_file(&stdout_path)?),
            stderr_file: Some(create_file(&stderr_path)?),
            stdout: String::new(),
            stderr: String::new(),
            stdout_path,
            stderr_path,
        })
    }

    pub(super) fn record(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Line(stream, line) => self.append(stream, &line),
            CaptureEvent::ReadError(stream, error) => {
                warn!(stream = stream.name(), %error, "output capture failed; keeping partial output");
            }
        }
    }

    /// Append a supervisor marker line to the stdout result.
    pub(super) fn append_marker(&mut self, marker: &str) {
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            self.append(Stream::Stdout, "\n");
        }
        self.append(Stream::Stdout, &format!("{}\n", marker));
    }

    /// Record a supervisor-side error in the stderr result.
    pub(super) fn append_error(&mut self, error: &str) {
        self.append(Stream::Stderr, &format!("{}\n", error));
    }

    pub(super) fn finish(self) -> (String, String) {
        (self.stdout, self.stderr)
    }

    fn append(&mut self, stream: Stream, text: &str) {
        let (buf, file, path) = match stream {
            Stream::Stdout => (&mut self.stdout, &mut self.stdout_file, &self.stdout_path),
            Stream::Stderr => (&mut self.stderr, &mut self.stderr_file, &self.stderr_path),
        };

        let failed = match file.as_mut() {
            Some(f) => f.write_all(text.as_bytes()).and_then(|_| f.flush()).err(),
            None => None,
        };
        if let Some(e) = failed {
            warn!(path = %path.display(), error = %e, "failed to write results file; disabling it");
            *file = None;
        }

        buf.push_str(text);
        trim_to_tail(buf, MAX_CAPTURE_BYTES);
    }
}

fn create_file(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to create results file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Drop bytes from the front so that at most `max` remain, on a char boundary.
fn trim_to_tail(buf: &mut String, max: usize) {
    if buf.len() <= max {
        return;
    }
    let mut cut = buf.len() - max;
    while !buf.is_char_boundary(cut) {
        cut += 1;
    }
    buf.drain(..cut);
}
