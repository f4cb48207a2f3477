//! Run coordination: the single-run invariant, the per-target loop, result
//! assembly, state bookkeeping, and retention pruning.
//!
//! The coordinator owns no tool knowledge. Argument synthesis is pure
//! (`args`), invocation is behind the [`Executor`] trait, and when no
//! executor is supplied the run degrades to dry-run synthesis. This is what
//! lets every protocol rule be tested without spawning a process.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::args::{self, BuildOverrides};
use crate::config::ConfigManager;
use crate::error::PublishError;
use crate::executor::{Executor, render_command};
use crate::history::{self, HistoryStore};
use crate::lock::{DEFAULT_STALE_AFTER, LockFile};
use crate::state::StateStore;
use crate::types::{
    Family, FamilySettings, MobileRunHeader, PublishRun, PublishState, PublishStatus, RunHeader,
    SteamRunHeader, TargetEntry, TargetOutputs, TargetResult, WebRunHeader,
};

/// Options for one `execute` call.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Restrict the run to these target keys. Disabled targets are silently
    /// excluded even when listed here.
    pub targets: Option<Vec<String>>,
    pub dry_run: bool,
    pub branch: Option<String>,
    pub build_description: Option<String>,
    pub app_version: Option<String>,
    /// Recorded on the run document; defaults to `"manual"`.
    pub triggered_by: Option<String>,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PublishOptions {
    fn overrides(&self) -> BuildOverrides {
        BuildOverrides {
            dry_run: self.dry_run,
            branch: self.branch.clone(),
            build_description: self.build_description.clone(),
            app_version: self.app_version.clone(),
        }
    }
}

/// Fire-and-forget progress reporting. Implementations must not fail; the
/// signature makes that structural.
pub trait ProgressSink {
    fn progress(&mut self, target_key: &str, message: &str);
}

/// Sink that discards everything.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&mut self, _target_key: &str, _message: &str) {}
}

/// Coordinator for one project's publisher namespace.
#[derive(Debug, Clone)]
pub struct Publisher {
    store: StateStore,
}

impl Publisher {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn open(project_path: &Path, family: Family) -> Self {
        Self::new(StateStore::new(project_path, family))
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn config_manager(&self) -> ConfigManager {
        ConfigManager::new(self.store.clone())
    }

    pub fn history(&self) -> HistoryStore {
        HistoryStore::new(self.store.clone())
    }

    /// Execute one publish across the enabled targets.
    ///
    /// With no `executor`, every target synthesizes a `succeeded` result
    /// whose sole log line is the command that would have run. Executor
    /// failures mark their target `failed` and the loop continues; only the
    /// two preconditions (uninitialized namespace, already-running publish)
    /// abort the call.
    pub fn execute(
        &self,
        options: &PublishOptions,
        executor: Option<&dyn Executor>,
        progress: &mut dyn ProgressSink,
    ) -> Result<PublishRun> {
        let (state, run_id, started_at) = self.begin()?;

        let outcome = self.run_targets(&state, &run_id, started_at, options, executor, progress);
        match outcome {
            Ok(run) => Ok(run),
            Err(err) => {
                // The flag must not survive an abort, whatever the cause.
                let _ = self.clear_running_flag();
                Err(err)
            }
        }
    }

    /// Entry critical section: reject double runs and flip the durable flag.
    fn begin(&self) -> Result<(PublishState, String, DateTime<Utc>)> {
        // Checked before the lock so an uninitialized project is not left
        // with a half-created namespace directory.
        if !self.store.exists() {
            return Err(
                PublishError::NotInitialized(self.store.namespace().to_path_buf()).into(),
            );
        }

        let lock = LockFile::acquire(self.store.namespace(), DEFAULT_STALE_AFTER)?;

        let mut state = self.read_state()?;
        if state.is_running {
            return Err(PublishError::AlreadyRunning {
                project_id: state.config.project_id.clone(),
                current: state
                    .current_target
                    .unwrap_or_else(|| "unknown".to_string()),
            }
            .into());
        }

        let started_at = now_ms();
        let run_id = new_run_id(started_at, &state.config.project_id);
        state.is_running = true;
        state.updated_at = started_at;
        self.store.write_state(&state)?;

        lock.set_run_id(&run_id)?;
        lock.release()?;
        Ok((state, run_id, started_at))
    }

    fn run_targets(
        &self,
        state: &PublishState,
        run_id: &str,
        started_at: DateTime<Utc>,
        options: &PublishOptions,
        executor: Option<&dyn Executor>,
        progress: &mut dyn ProgressSink,
    ) -> Result<PublishRun> {
        let config = state.config.clone();
        let overrides = options.overrides();

        let requested: Vec<TargetEntry> = config
            .targets
            .iter()
            .filter(|t| t.enabled)
            .filter(|t| match &options.targets {
                Some(keys) => keys.iter().any(|k| k == &t.key),
                None => true,
            })
            .cloned()
            .collect();

        let mut results: Vec<TargetResult> = Vec::new();
        let mut attempted: Vec<String> = Vec::new();

        for target in &requested {
            // Re-read so a concurrent cancel() is observed before the next
            // target starts.
            let mut live = self.read_state()?;
            if !live.is_running {
                progress.progress(&target.key, "Publish cancelled; stopping");
                break;
            }
            live.current_target = Some(target.key.clone());
            live.updated_at = now_ms();
            self.store.write_state(&live)?;

            attempted.push(target.key.clone());
            progress.progress(
                &target.key,
                &format!("Starting publish for {}", target.key),
            );

            let argv = args::build_argv(&config, target, &overrides);
            let target_started = now_ms();

            let result = match executor {
                None => {
                    progress.progress(&target.key, &format!("{} (dry-run)", target.key));
                    let completed = now_ms();
                    TargetResult {
                        target_key: target.key.clone(),
                        status: PublishStatus::Succeeded,
                        started_at: target_started,
                        completed_at: completed,
                        duration: duration_between(target_started, completed),
                        optional_outputs: TargetOutputs::default(),
                        error: None,
                        logs: vec![render_command(&argv)],
                    }
                }
                Some(executor) => {
                    let outcome = executor.run(&target.key, target, &argv);
                    let completed = now_ms();
                    let duration = duration_between(target_started, completed);
                    match outcome {
                        Ok(outcome) => TargetResult {
                            target_key: target.key.clone(),
                            status: if outcome.success {
                                PublishStatus::Succeeded
                            } else {
                                PublishStatus::Failed
                            },
                            started_at: target_started,
                            completed_at: completed,
                            duration,
                            optional_outputs: outcome.outputs,
                            error: outcome.error,
                            logs: outcome.logs,
                        },
                        Err(err) => {
                            let message = format!("{err:#}");
                            TargetResult {
                                target_key: target.key.clone(),
                                status: PublishStatus::Failed,
                                started_at: target_started,
                                completed_at: completed,
                                duration,
                                optional_outputs: TargetOutputs::default(),
                                error: Some(message.clone()),
                                logs: vec![format!("Error: {message}")],
                            }
                        }
                    }
                }
            };

            match (&result.status, &result.error) {
                (PublishStatus::Succeeded, _) => {
                    progress.progress(&target.key, &format!("Published {}", target.key));
                }
                (_, Some(error)) => {
                    progress.progress(
                        &target.key,
                        &format!("Failed to publish {}: {error}", target.key),
                    );
                }
                _ => {
                    progress.progress(&target.key, &format!("Finished {}", target.key));
                }
            }

            results.push(result);
        }

        let finished_at = now_ms();
        let run = PublishRun {
            id: run_id.to_string(),
            project_id: config.project_id.clone(),
            timestamp: started_at,
            duration: duration_between(started_at, finished_at),
            targets: attempted,
            triggered_by: options
                .triggered_by
                .clone()
                .unwrap_or_else(|| "manual".to_string()),
            header: run_header(&config.settings, &requested, &overrides),
            status: derive_overall_status(&results),
            results,
            tags: options.tags.clone(),
            metadata: options.metadata.clone(),
        };

        // Exit critical section: persist the run and settle the state.
        let lock = LockFile::acquire(self.store.namespace(), DEFAULT_STALE_AFTER)?;
        self.store.write_run(&run)?;

        let mut final_state = self.read_state()?;
        final_state.is_running = false;
        final_state.current_target = None;
        final_state.last_run_id = Some(run.id.clone());
        final_state.last_run_time = Some(started_at);
        final_state.total_runs += 1;
        final_state.updated_at = now_ms();
        self.store.write_state(&final_state)?;
        lock.release()?;

        let retention = config.publish_retention;
        if retention > 0 {
            history::prune_to(&self.store, retention as usize)
                .context("failed to prune old runs")?;
        }

        Ok(run)
    }

    /// Advisory cancellation: flips the durable flag so a new run may start.
    /// The in-flight vendor process, if any, is not touched; callers that
    /// must preempt it have to kill the child through their executor.
    pub fn cancel(&self) -> Result<bool> {
        let mut state = self.read_state()?;
        if !state.is_running {
            return Ok(false);
        }
        state.is_running = false;
        state.current_target = None;
        state.updated_at = now_ms();
        self.store.write_state(&state)?;
        Ok(true)
    }

    fn read_state(&self) -> Result<PublishState> {
        self.store.read()?.ok_or_else(|| {
            PublishError::NotInitialized(self.store.namespace().to_path_buf()).into()
        })
    }

    fn clear_running_flag(&self) -> Result<()> {
        if let Some(mut state) = self.store.read()? {
            if state.is_running {
                state.is_running = false;
                state.current_target = None;
                state.updated_at = now_ms();
                self.store.write_state(&state)?;
            }
        }
        Ok(())
    }
}

/// Current time truncated to the millisecond, the resolution of every
/// persisted timestamp. Working at wire resolution keeps a run document
/// equal to its deserialized form.
fn now_ms() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn duration_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Duration {
    Duration::from_millis((end - start).num_milliseconds().max(0) as u64)
}

fn run_header(
    settings: &FamilySettings,
    requested: &[TargetEntry],
    overrides: &BuildOverrides,
) -> RunHeader {
    match settings {
        FamilySettings::Steam(steam) => RunHeader::Steam(SteamRunHeader {
            app_id: steam.app_id.clone(),
            branch: overrides
                .branch
                .clone()
                .unwrap_or_else(|| steam.branch.clone()),
            build_description: overrides
                .build_description
                .clone()
                .or_else(|| steam.build_description.clone()),
            depots: requested.iter().map(|t| t.key.clone()).collect(),
        }),
        FamilySettings::Web(_) => RunHeader::Web(WebRunHeader::default()),
        FamilySettings::Mobile(mobile) => RunHeader::Mobile(MobileRunHeader {
            app_version: overrides
                .app_version
                .clone()
                .unwrap_or_else(|| mobile.app_version.clone()),
        }),
    }
}

/// 12-hex run id: prefix of `sha256(epoch_ms|project_id|random)`.
fn new_run_id(now: DateTime<Utc>, project_id: &str) -> String {
    let suffix: u64 = rand::random();
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}",
        now.timestamp_millis(),
        project_id,
        suffix
    ));
    let digest = hasher.finalize();
    hex::encode(digest)[..12].to_string()
}

/// Fold per-target results into a single run-level status.
pub fn derive_overall_status(results: &[TargetResult]) -> PublishStatus {
    if results.is_empty() {
        return PublishStatus::Pending;
    }
    if results.iter().all(|r| {
        matches!(
            r.status,
            PublishStatus::Succeeded | PublishStatus::Skipped
        )
    }) {
        return PublishStatus::Succeeded;
    }
    if results.iter().any(|r| {
        matches!(
            r.status,
            PublishStatus::Uploading | PublishStatus::Processing | PublishStatus::Building
        )
    }) {
        return PublishStatus::Uploading;
    }
    if results.iter().any(|r| r.status == PublishStatus::Cancelled) {
        return PublishStatus::Cancelled;
    }
    if results.iter().any(|r| r.status == PublishStatus::Failed) {
        return PublishStatus::Failed;
    }
    if results.iter().all(|r| r.status == PublishStatus::Pending) {
        return PublishStatus::Pending;
    }
    PublishStatus::Failed
}
