//! Pipeline progress reporting.
//!
//! Phase messages go to stderr with an elapsed `[mm:ss]` prefix so long runs
//! over big module sets stay observable. Detail lines are gated behind the
//! verbose flag. Structured events are mirrored through `tracing` so an
//! `EnvFilter` can redirect them.

use std::time::Instant;

/// Reports pipeline progress to stderr with elapsed time.
pub struct Progress {
    start: Instant,
    verbose: bool,
}

impl Progress {
    /// Create a progress reporter. `verbose` enables `verbose()` lines.
    pub fn new(verbose: bool) -> Self {
        Self {
            start: Instant::now(),
            verbose,
        }
    }

    /// Print a phase message with the elapsed-time prefix.
    pub fn log(&self, msg: impl AsRef<str>) {
        let elapsed = self.start.elapsed().as_secs();
        let line = msg.as_ref();
        eprintln!("[{:02}:{:02}] {}", elapsed / 60, elapsed % 60, line);
        tracing::info!(target: "gocpg", "{}", line);
    }

    /// Print only when verbose mode is enabled.
    pub fn verbose(&self, msg: impl AsRef<str>) {
        if self.verbose {
            self.log(msg);
        } else {
            tracing::debug!(target: "gocpg", "{}", msg.as_ref());
        }
    }

    /// Whether verbose output is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}
