//! Load progress reporting.
//!
//! Reports observable progress during `threatload load` so users see how
//! many rows and batches are done. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use std::io::Write;

use threatload_core::ingest::BatchProgress;

/// A single progress event for a load run.
#[derive(Clone, Debug)]
pub enum LoadProgressEvent {
    /// Input file is being read; row count unknown yet.
    Reading { path: String },
    /// A batch has been submitted.
    Submitted(BatchProgress),
}

/// Reports load progress. Implementations write to stderr (human or JSON).
pub trait LoadProgressReporter: Send + Sync {
    fn report(&self, event: LoadProgressEvent);
}

/// Human-friendly progress on stderr: "load  batch 3 / 10  1,500 / 5,000 rows".
pub struct StderrProgress;

impl LoadProgressReporter for StderrProgress {
    fn report(&self, event: LoadProgressEvent) {
        let line = match &event {
            LoadProgressEvent::Reading { path } => format!("load  reading {}...\n", path),
            LoadProgressEvent::Submitted(p) => {
                let mut line = format!(
                    "load  batch {} / {}  {} / {} rows",
                    format_number(p.batch as u64),
                    format_number(p.total_batches as u64),
                    format_number(p.rows_done as u64),
                    format_number(p.total_rows as u64),
                );
                if p.rejected > 0 {
                    line.push_str(&format!("  ({} rejected)", format_number(p.rejected as u64)));
                }
                line.push('\n');
                line
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl LoadProgressReporter for JsonProgress {
    fn report(&self, event: LoadProgressEvent) {
        let obj = match &event {
            LoadProgressEvent::Reading { path } => serde_json::json!({
                "event": "progress",
                "phase": "reading",
                "path": path
            }),
            LoadProgressEvent::Submitted(p) => serde_json::json!({
                "event": "progress",
                "phase": "submitting",
                "batch": p.batch,
                "total_batches": p.total_batches,
                "rows_done": p.rows_done,
                "total_rows": p.total_rows,
                "rejected": p.rejected
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl LoadProgressReporter for NoProgress {
    fn report(&self, _event: LoadProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn LoadProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
