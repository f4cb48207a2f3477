//! Durable state layer: one namespace directory per project per family,
//! holding `config.json`, `state.json`, and one document per run under
//! `runs/`.
//!
//! Every write is a whole-file JSON serialization (pretty, 2-space indent,
//! declaration-order keys) through a tmp-file rename, so readers never see a
//! torn document. The store surfaces I/O failures to the caller and never
//! attempts repair.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::types::{Family, PublishConfig, PublishRun, PublishState};

pub const CONFIG_FILE: &str = "config.json";
pub const STATE_FILE: &str = "state.json";
pub const RUNS_DIR: &str = "runs";

/// Filesystem-backed store for one project's publisher namespace.
#[derive(Debug, Clone)]
pub struct StateStore {
    namespace: PathBuf,
}

impl StateStore {
    /// Store rooted at `<project_path>/.<family>-publisher/`.
    pub fn new(project_path: &Path, family: Family) -> Self {
        Self {
            namespace: project_path.join(family.namespace_dir()),
        }
    }

    pub fn namespace(&self) -> &Path {
        &self.namespace
    }

    pub fn config_path(&self) -> PathBuf {
        self.namespace.join(CONFIG_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.namespace.join(STATE_FILE)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.namespace.join(RUNS_DIR)
    }

    pub fn run_path(&self, id: &str) -> PathBuf {
        self.runs_dir().join(format!("{id}.json"))
    }

    pub fn exists(&self) -> bool {
        self.state_path().exists()
    }

    /// Create the namespace, its `runs/` subdirectory, and the initial
    /// config/state documents. Returns `false` without touching anything if
    /// the namespace is already initialized.
    pub fn init(&self, config: &PublishConfig) -> Result<bool> {
        if self.exists() {
            return Ok(false);
        }

        fs::create_dir_all(self.runs_dir()).with_context(|| {
            format!("failed to create runs dir {}", self.runs_dir().display())
        })?;

        let state = PublishState::new(config.clone(), Utc::now());
        atomic_write_json(&self.config_path(), config)?;
        atomic_write_json(&self.state_path(), &state)?;
        Ok(true)
    }

    /// Read the current state document, or `None` if the namespace was never
    /// initialized (or was destroyed).
    pub fn read(&self) -> Result<Option<PublishState>> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read state file {}", path.display()))?;
        let state: PublishState = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse state JSON {}", path.display()))?;
        Ok(Some(state))
    }

    /// Persist the state document, mirroring its embedded config to
    /// `config.json` so the two never drift.
    pub fn write_state(&self, state: &PublishState) -> Result<()> {
        atomic_write_json(&self.config_path(), &state.config)?;
        atomic_write_json(&self.state_path(), state)
    }

    pub fn write_run(&self, run: &PublishRun) -> Result<()> {
        let dir = self.runs_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create runs dir {}", dir.display()))?;
        atomic_write_json(&self.run_path(&run.id), run)
    }

    pub fn read_run(&self, id: &str) -> Result<Option<PublishRun>> {
        let path = self.run_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read run file {}", path.display()))?;
        let run: PublishRun = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse run JSON {}", path.display()))?;
        Ok(Some(run))
    }

    /// Ids of every persisted run document, in no particular order.
    pub fn list_run_ids(&self) -> Result<Vec<String>> {
        let dir = self.runs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to list runs dir {}", dir.display()))?
        {
            let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    pub fn remove_run(&self, id: &str) -> Result<bool> {
        let path = self.run_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("failed to remove run file {}", path.display()))?;
        Ok(true)
    }

    /// Recursively remove the namespace. Returns `false` if there was
    /// nothing to remove.
    pub fn destroy(&self) -> Result<bool> {
        if !self.namespace.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&self.namespace).with_context(|| {
            format!("failed to remove namespace {}", self.namespace.display())
        })?;
        Ok(true)
    }
}

/// Serialize `value` next to `path` and swap it into place, so a crash
/// mid-write can never leave a truncated document behind.
pub(crate) fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("failed to serialize document")?;
    let staging = path.with_extension("json.tmp");

    let mut file = fs::File::create(&staging)
        .with_context(|| format!("failed to stage write at {}", staging.display()))?;
    file.write_all(&json)
        .with_context(|| format!("failed to write {}", staging.display()))?;
    // The payload must be on disk before the rename makes it visible.
    file.sync_all().ok();
    drop(file);

    fs::rename(&staging, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;

    // The rename is only durable once the directory entry is synced.
    // Platforms that cannot open a directory for sync simply skip this.
    if let Some(parent) = path.parent()
        && let Ok(dir) = fs::File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}
