//! Pluggable execution backend for target publishes.
//!
//! The run coordinator only ever sees an [`ExecutionOutcome`]: tool
//! failures, timeouts, and spawn errors all come back as data with
//! `success == false`. The default [`ProcessExecutor`] shells out to the
//! vendor CLI; tests inject scripted implementations instead.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;

use crate::process;
use crate::types::{TargetEntry, TargetOutputs, TargetSpec};

/// Normalized result of one external-tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub logs: Vec<String>,
    pub outputs: TargetOutputs,
}

impl ExecutionOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Invocation backend for a single target.
pub trait Executor {
    fn run(
        &self,
        target_key: &str,
        target: &TargetEntry,
        argv: &[String],
    ) -> Result<ExecutionOutcome>;
}

/// SteamCMD exits 7 on a successful no-op build; everything else follows
/// the usual zero-is-success convention.
const STEAM_BENIGN_EXIT: i32 = 7;

/// Default executor: spawns the vendor CLI with the configured timeout and
/// scrapes opportunistic outputs from whatever it printed.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    working_dir: PathBuf,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(working_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            working_dir,
            timeout,
        }
    }
}

impl Executor for ProcessExecutor {
    fn run(
        &self,
        _target_key: &str,
        target: &TargetEntry,
        argv: &[String],
    ) -> Result<ExecutionOutcome> {
        let output = match process::run_argv(argv, &self.working_dir, self.timeout) {
            Ok(output) => output,
            Err(err) => return Ok(ExecutionOutcome::failure(format!("{err:#}"))),
        };

        let mut logs: Vec<String> = Vec::new();
        logs.extend(output.stdout.lines().map(str::to_string));
        logs.extend(output.stderr.lines().map(str::to_string));

        let success = !output.timed_out
            && (output.exit_code == 0
                || (matches!(target.spec, TargetSpec::Depot(_))
                    && output.exit_code == STEAM_BENIGN_EXIT));

        let error = if success {
            None
        } else if output.timed_out {
            Some(format!(
                "command timed out after {}",
                humantime::format_duration(self.timeout)
            ))
        } else {
            Some(format!("exited with code {}", output.exit_code))
        };

        let combined = format!("{}\n{}", output.stdout, output.stderr);
        let outputs = extract_outputs(&target.spec, &combined);

        Ok(ExecutionOutcome {
            success,
            error,
            logs,
            outputs,
        })
    }
}

static MANIFEST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)manifest\s+id[:\s]+(\d+)").expect("manifest regex"));
static BYTES_UPLOADED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\d,]+)\s*bytes?").expect("bytes regex"));
static DEPLOY_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url regex"));
static DEPLOY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)deploy[_\s]*id[:\s]+([\w-]+)").expect("deploy id regex"));
static VERSION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)version\s*code[:\s]+(\d+)").expect("version code regex"));
static BUILD_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)build\s*(?:number|version)[:\s]+([\d.]+)").expect("build number regex")
});

/// Best-effort extraction of kind-specific values from tool output.
/// Missing values are absent fields, never errors.
pub fn extract_outputs(spec: &TargetSpec, text: &str) -> TargetOutputs {
    let mut outputs = TargetOutputs::default();
    match spec {
        TargetSpec::Depot(_) => {
            if let Some(caps) = MANIFEST_ID.captures(text) {
                outputs.manifest_id = Some(caps[1].to_string());
            }
            if let Some(caps) = BYTES_UPLOADED.captures(text) {
                outputs.bytes_uploaded = caps[1].replace(',', "").parse().ok();
            }
        }
        TargetSpec::Netlify(_)
        | TargetSpec::Vercel(_)
        | TargetSpec::GhPages(_)
        | TargetSpec::S3(_)
        | TargetSpec::CloudflarePages(_) => {
            if let Some(m) = DEPLOY_URL.find(text) {
                outputs.deploy_url = Some(m.as_str().to_string());
            }
            if let Some(caps) = DEPLOY_ID.captures(text) {
                outputs.deploy_id = Some(caps[1].to_string());
            }
        }
        TargetSpec::GooglePlay(_) => {
            if let Some(caps) = VERSION_CODE.captures(text) {
                outputs.version_code = Some(caps[1].to_string());
            }
        }
        TargetSpec::AppStore(_) => {
            if let Some(caps) = BUILD_NUMBER.captures(text) {
                outputs.build_number = Some(caps[1].to_string());
            }
        }
    }
    outputs
}

/// Render an argv as a single displayable command line, quoting tokens
/// that contain whitespace.
pub fn render_command(argv: &[String]) -> String {
    argv.iter()
        .map(|token| {
            if token.chars().any(char::is_whitespace) {
                format!("\"{token}\"")
            } else {
                token.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
