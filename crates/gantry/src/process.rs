//! External process execution with a hard deadline.
//!
//! Vendor CLIs are spawned with piped output and polled until they exit or
//! the per-target timeout elapses, at which point the child is killed and
//! the partial output returned with `timed_out` set.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

/// Run `argv[0]` with the remaining tokens as arguments. Spawn failures are
/// `Err`; a non-zero exit or timeout is a normal `CommandOutput`.
pub fn run_argv(argv: &[String], working_dir: &Path, timeout: Duration) -> Result<CommandOutput> {
    let Some((program, args)) = argv.split_first() else {
        bail!("cannot spawn an empty argv");
    };

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait().context("failed to poll command")? {
            Some(status) => {
                let (stdout, stderr) = drain_output(&mut child);
                return Ok(CommandOutput {
                    exit_code: status.code().unwrap_or(-1),
                    stdout,
                    stderr,
                    timed_out: false,
                    duration: start.elapsed(),
                });
            }
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();

                    let (stdout, mut stderr) = drain_output(&mut child);
                    stderr.push_str(&format!(
                        "\ncommand timed out after {}",
                        humantime::format_duration(timeout)
                    ));
                    return Ok(CommandOutput {
                        exit_code: -1,
                        stdout,
                        stderr,
                        timed_out: true,
                        duration: start.elapsed(),
                    });
                }

                std::thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

fn drain_output(child: &mut std::process::Child) -> (String, String) {
    let mut stdout_bytes = Vec::new();
    let mut stderr_bytes = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_end(&mut stdout_bytes);
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_end(&mut stderr_bytes);
    }
    (
        String::from_utf8_lossy(&stdout_bytes).to_string(),
        String::from_utf8_lossy(&stderr_bytes).to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn empty_argv_is_rejected() {
        let err = run_argv(&[], Path::new("."), Duration::from_secs(1)).expect_err("must fail");
        assert!(err.to_string().contains("empty argv"));
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_exit_code() {
        let out = run_argv(
            &argv(&["echo", "hello world"]),
            Path::new("."),
            Duration::from_secs(5),
        )
        .expect("run");
        assert_eq!(out.exit_code, 0);
        assert!(!out.timed_out);
        assert!(out.stdout.contains("hello world"));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_not_an_error() {
        let out = run_argv(
            &argv(&["sh", "-c", "echo oops >&2; exit 3"]),
            Path::new("."),
            Duration::from_secs(5),
        )
        .expect("run");
        assert_eq!(out.exit_code, 3);
        assert!(out.stderr.contains("oops"));
    }

    #[cfg(unix)]
    #[test]
    fn deadline_kills_the_child() {
        let out = run_argv(
            &argv(&["sleep", "10"]),
            Path::new("."),
            Duration::from_millis(100),
        )
        .expect("run");
        assert!(out.timed_out);
        assert!(out.stderr.contains("timed out"));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = run_argv(
            &argv(&["gantry-no-such-binary-61d2"]),
            Path::new("."),
            Duration::from_secs(1),
        )
        .expect_err("must fail");
        assert!(format!("{err:#}").contains("failed to spawn"));
    }
}
