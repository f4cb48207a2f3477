//! Configuration management: validation, default-target factories, and the
//! persisted mutations (shallow-merge update, target add/remove/toggle).
//!
//! Validation never fails with an `Err` for content problems; it returns a
//! [`ValidationReport`] with blocking errors and advisory warnings. The
//! mutating operations require an initialized namespace and persist to both
//! `config.json` and `state.json` on every change.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};

use crate::error::PublishError;
use crate::state::StateStore;
use crate::types::{
    AppStoreConfig, CloudflarePagesConfig, DepotConfig, Family, FamilySettings, GhPagesConfig,
    GooglePlayConfig, NetlifyConfig, PublishConfig, PublishState, S3Config, TargetEntry,
    TargetSpec, VercelConfig,
};

/// Outcome of [`validate`]: errors block, warnings advise.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Check a candidate config against the family invariants.
pub fn validate(config: &PublishConfig) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if config.project_id.trim().is_empty() {
        errors.push("projectId must not be empty".to_string());
    }
    if config.project_path.as_os_str().is_empty() {
        errors.push("projectPath must not be empty".to_string());
    }

    if let FamilySettings::Steam(steam) = &config.settings {
        if steam.app_id.is_empty() {
            errors.push("appId must not be empty".to_string());
        } else if !steam.app_id.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(format!("appId must be numeric, got {:?}", steam.app_id));
        }
        if steam.steam_cmd_path.is_empty() {
            errors.push("steamCmdPath must not be empty".to_string());
        }
    }
    if let FamilySettings::Mobile(mobile) = &config.settings
        && mobile.app_version.is_empty()
    {
        errors.push("appVersion must not be empty".to_string());
    }

    if config.targets.is_empty() {
        errors.push("targets must not be empty".to_string());
    }

    let family = config.family();
    let mut seen_keys: Vec<&str> = Vec::new();
    for target in &config.targets {
        if target.key.is_empty() {
            errors.push("target key must not be empty".to_string());
        } else if seen_keys.contains(&target.key.as_str()) {
            errors.push(format!("duplicate target key {:?}", target.key));
        } else {
            seen_keys.push(&target.key);
        }

        if target.artifact_directory.is_empty() {
            errors.push(format!(
                "target {:?} has an empty artifactDirectory",
                target.key
            ));
        }

        if target.spec.family() != family {
            errors.push(format!(
                "target {:?} is a {} kind but the config is {}",
                target.key,
                target.spec.kind(),
                family
            ));
        }

        match &target.spec {
            TargetSpec::Depot(depot) => {
                if depot.depot_id.is_empty() {
                    errors.push(format!("target {:?} has an empty depot id", target.key));
                } else if !depot.depot_id.bytes().all(|b| b.is_ascii_digit()) {
                    errors.push(format!(
                        "target {:?} depot id must be numeric, got {:?}",
                        target.key, depot.depot_id
                    ));
                }
            }
            TargetSpec::GooglePlay(play) => {
                if play.package_name.is_empty() {
                    errors.push(format!("target {:?} requires a packageName", target.key));
                }
            }
            TargetSpec::AppStore(store) => {
                if store.bundle_id.as_deref().unwrap_or("").is_empty() {
                    errors.push(format!("target {:?} requires a bundleId", target.key));
                }
            }
            _ => {}
        }
    }

    if config.upload_timeout.is_zero() {
        errors.push("uploadTimeout must be positive".to_string());
    }

    if !config.targets.is_empty() && config.targets.iter().all(|t| !t.enabled) {
        warnings.push("no targets are enabled; a publish would attempt nothing".to_string());
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Freshly allocated default target list for a family. Credential fields
/// start empty and are flagged by [`validate`] until filled in.
pub fn default_targets(family: Family) -> Vec<TargetEntry> {
    match family {
        Family::Steam => ["1000001", "1000002", "1000003"]
            .iter()
            .map(|depot_id| TargetEntry {
                key: (*depot_id).to_string(),
                enabled: true,
                artifact_directory: format!("build/{depot_id}"),
                spec: TargetSpec::Depot(DepotConfig {
                    depot_id: (*depot_id).to_string(),
                    exclusions: Vec::new(),
                }),
            })
            .collect(),
        Family::Web => vec![
            TargetEntry {
                key: "netlify".to_string(),
                enabled: true,
                artifact_directory: "dist".to_string(),
                spec: TargetSpec::Netlify(NetlifyConfig {
                    site_id: String::new(),
                    auth_token: String::new(),
                    production: false,
                    functions_dir: None,
                    message: None,
                }),
            },
            TargetEntry {
                key: "vercel".to_string(),
                enabled: false,
                artifact_directory: "dist".to_string(),
                spec: TargetSpec::Vercel(VercelConfig {
                    token: String::new(),
                    production: false,
                }),
            },
            TargetEntry {
                key: "gh-pages".to_string(),
                enabled: false,
                artifact_directory: "dist".to_string(),
                spec: TargetSpec::GhPages(GhPagesConfig {
                    repo: String::new(),
                    branch: "gh-pages".to_string(),
                    message: None,
                    nojekyll: true,
                }),
            },
            TargetEntry {
                key: "s3".to_string(),
                enabled: false,
                artifact_directory: "dist".to_string(),
                spec: TargetSpec::S3(S3Config {
                    bucket: String::new(),
                    region: "us-east-1".to_string(),
                    prefix: None,
                    acl: None,
                    cache_control: None,
                }),
            },
            TargetEntry {
                key: "cloudflare-pages".to_string(),
                enabled: false,
                artifact_directory: "dist".to_string(),
                spec: TargetSpec::CloudflarePages(CloudflarePagesConfig {
                    project_name: String::new(),
                    branch: None,
                }),
            },
        ],
        Family::Mobile => vec![
            TargetEntry {
                key: "google-play".to_string(),
                enabled: true,
                artifact_directory: "build/android".to_string(),
                spec: TargetSpec::GooglePlay(GooglePlayConfig {
                    package_name: String::new(),
                    track: "internal".to_string(),
                    release_status: "completed".to_string(),
                    service_account_key: None,
                    mapping_file: None,
                    changes_not_sent_for_review: false,
                }),
            },
            TargetEntry {
                key: "app-store".to_string(),
                enabled: false,
                artifact_directory: "build/ios".to_string(),
                spec: TargetSpec::AppStore(AppStoreConfig {
                    api_key_id: String::new(),
                    api_issuer_id: String::new(),
                    private_key_path: None,
                    apple_id: None,
                    bundle_id: None,
                }),
            },
        ],
    }
}

/// Target kind names a family accepts, freshly allocated.
pub fn supported_target_kinds(family: Family) -> Vec<&'static str> {
    match family {
        Family::Steam => vec!["depot"],
        Family::Web => vec!["netlify", "vercel", "gh-pages", "s3", "cloudflare-pages"],
        Family::Mobile => vec!["google-play", "app-store"],
    }
}

/// Shallow-merge patch applied by [`ConfigManager::update`]. `None` leaves a
/// field untouched; family-specific fields are ignored when the stored
/// config belongs to a different family.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    pub project_id: Option<String>,
    pub targets: Option<Vec<TargetEntry>>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub upload_timeout: Option<Duration>,
    pub publish_retention: Option<u32>,
    pub app_id: Option<String>,
    pub steam_cmd_path: Option<String>,
    pub username: Option<String>,
    pub branch: Option<String>,
    pub build_description: Option<String>,
    pub if_changed: Option<bool>,
    pub preview: Option<bool>,
    pub app_version: Option<String>,
}

impl ConfigPatch {
    fn apply(&self, config: &mut PublishConfig) {
        if let Some(project_id) = &self.project_id {
            config.project_id = project_id.clone();
        }
        if let Some(targets) = &self.targets {
            config.targets = targets.clone();
        }
        if let Some(timeout) = self.upload_timeout {
            config.upload_timeout = timeout;
        }
        if let Some(retention) = self.publish_retention {
            config.publish_retention = retention;
        }

        match &mut config.settings {
            FamilySettings::Steam(steam) => {
                if let Some(app_id) = &self.app_id {
                    steam.app_id = app_id.clone();
                }
                if let Some(path) = &self.steam_cmd_path {
                    steam.steam_cmd_path = path.clone();
                }
                if let Some(username) = &self.username {
                    steam.username = Some(username.clone());
                }
                if let Some(branch) = &self.branch {
                    steam.branch = branch.clone();
                }
                if let Some(desc) = &self.build_description {
                    steam.build_description = Some(desc.clone());
                }
                if let Some(if_changed) = self.if_changed {
                    steam.if_changed = if_changed;
                }
                if let Some(preview) = self.preview {
                    steam.preview = preview;
                }
            }
            FamilySettings::Web(_) => {}
            FamilySettings::Mobile(mobile) => {
                if let Some(version) = &self.app_version {
                    mobile.app_version = version.clone();
                }
            }
        }
    }
}

/// Persisted config operations over one publisher namespace.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    store: StateStore,
}

impl ConfigManager {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    fn load(&self) -> Result<PublishState> {
        self.store.read()?.ok_or_else(|| {
            PublishError::NotInitialized(self.store.namespace().to_path_buf()).into()
        })
    }

    fn persist(&self, mut state: PublishState) -> Result<PublishState> {
        state.updated_at = Utc::now();
        self.store.write_state(&state)?;
        Ok(state)
    }

    pub fn config(&self) -> Result<PublishConfig> {
        Ok(self.load()?.config)
    }

    /// Shallow-merge `patch` into the stored config and persist.
    pub fn update(&self, patch: &ConfigPatch) -> Result<PublishConfig> {
        let mut state = self.load()?;
        patch.apply(&mut state.config);
        let state = self.persist(state)?;
        Ok(state.config)
    }

    /// Toggle a target. Returns the updated entry, or `None` when the key is
    /// unknown (nothing is persisted in that case).
    pub fn set_target_enabled(&self, key: &str, enabled: bool) -> Result<Option<TargetEntry>> {
        let mut state = self.load()?;
        let Some(target) = state.config.targets.iter_mut().find(|t| t.key == key) else {
            return Ok(None);
        };
        target.enabled = enabled;
        let updated = target.clone();
        self.persist(state)?;
        Ok(Some(updated))
    }

    /// Append a target. Returns `false` (no mutation) on a duplicate key.
    pub fn add_target(&self, entry: TargetEntry) -> Result<bool> {
        let mut state = self.load()?;
        if state.config.targets.iter().any(|t| t.key == entry.key) {
            return Ok(false);
        }
        state.config.targets.push(entry);
        self.persist(state)?;
        Ok(true)
    }

    /// Remove a target by key. Returns `false` when the key is unknown.
    pub fn remove_target(&self, key: &str) -> Result<bool> {
        let mut state = self.load()?;
        let before = state.config.targets.len();
        state.config.targets.retain(|t| t.key != key);
        if state.config.targets.len() == before {
            return Ok(false);
        }
        self.persist(state)?;
        Ok(true)
    }

    pub fn enabled_targets(&self) -> Result<Vec<TargetEntry>> {
        let state = self.load()?;
        Ok(state
            .config
            .targets
            .into_iter()
            .filter(|t| t.enabled)
            .collect())
    }
}
