//! Progress reporting with TTY detection.
//!
//! In a TTY the per-target messages drive an `indicatif` bar; when piped,
//! output falls back to plain lines so logs stay readable in CI.

use atty::Stream;
use indicatif::{ProgressBar, ProgressStyle};

use gantry::runner::ProgressSink;

/// Detects whether stdout is connected to a TTY.
pub fn is_tty() -> bool {
    atty::is(Stream::Stdout)
}

pub struct CliProgress {
    bar: Option<ProgressBar>,
}

impl CliProgress {
    /// Reporter over `total_targets` publish steps.
    pub fn new(total_targets: usize) -> Self {
        let bar = if is_tty() {
            let pb = ProgressBar::new(total_targets as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{pos}/{len}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            Some(pb)
        } else {
            None
        };
        Self { bar }
    }

    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for CliProgress {
    fn progress(&mut self, target_key: &str, message: &str) {
        match &self.bar {
            Some(bar) => {
                if message.starts_with("Starting") {
                    bar.inc(1);
                }
                bar.set_message(format!("{target_key}: {message}"));
            }
            None => println!("[{target_key}] {message}"),
        }
    }
}
