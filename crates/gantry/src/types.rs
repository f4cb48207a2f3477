//! Core domain types for Gantry: configuration, durable state, and run
//! documents shared by all three publisher families.
//!
//! ## Serialization
//!
//! Every type that reaches disk serializes with camelCase keys, epoch
//! milliseconds for timestamps, and milliseconds for durations, so the JSON
//! documents under `.{family}-publisher/` are stable across releases.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

/// The three publisher families. Each owns an independent namespace
/// directory inside the project, so a project can carry all three at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Steam,
    Web,
    Mobile,
}

impl Family {
    /// Directory name of the publisher namespace inside the project root.
    pub fn namespace_dir(&self) -> &'static str {
        match self {
            Family::Steam => ".steam-publisher",
            Family::Web => ".web-publisher",
            Family::Mobile => ".mobile-publisher",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Family::Steam => "Steam",
            Family::Web => "Web",
            Family::Mobile => "Mobile",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "steam" => Ok(Family::Steam),
            "web" => Ok(Family::Web),
            "mobile" => Ok(Family::Mobile),
            other => Err(format!("unknown publisher family: {other}")),
        }
    }
}

/// Status lattice shared by runs and per-target results.
///
/// `Building` is only emitted by Web run steps, `Skipped` only by Steam;
/// the derivation rules in the run coordinator fold the lattice into a
/// single run-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Pending,
    Building,
    Uploading,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
    Skipped,
}

impl PublishStatus {
    /// Single-character icon used by the one-line and full formatters.
    pub fn icon(&self) -> char {
        match self {
            PublishStatus::Succeeded => '+',
            PublishStatus::Failed => 'x',
            PublishStatus::Cancelled => '-',
            _ => '?',
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PublishStatus::Succeeded
                | PublishStatus::Failed
                | PublishStatus::Cancelled
                | PublishStatus::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Pending => "pending",
            PublishStatus::Building => "building",
            PublishStatus::Uploading => "uploading",
            PublishStatus::Processing => "processing",
            PublishStatus::Succeeded => "succeeded",
            PublishStatus::Failed => "failed",
            PublishStatus::Cancelled => "cancelled",
            PublishStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PublishStatus::Pending),
            "building" => Ok(PublishStatus::Building),
            "uploading" => Ok(PublishStatus::Uploading),
            "processing" => Ok(PublishStatus::Processing),
            "succeeded" => Ok(PublishStatus::Succeeded),
            "failed" => Ok(PublishStatus::Failed),
            "cancelled" => Ok(PublishStatus::Cancelled),
            "skipped" => Ok(PublishStatus::Skipped),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// A single Steam depot: numeric id, content directory relative to the
/// project root, optional glob exclusion patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepotConfig {
    pub depot_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetlifyConfig {
    pub site_id: String,
    pub auth_token: String,
    #[serde(default)]
    pub production: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VercelConfig {
    pub token: String,
    #[serde(default)]
    pub production: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhPagesConfig {
    pub repo: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub nojekyll: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudflarePagesConfig {
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePlayConfig {
    pub package_name: String,
    pub track: String,
    pub release_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_key: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_file: Option<PathBuf>,
    #[serde(default)]
    pub changes_not_sent_for_review: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStoreConfig {
    pub api_key_id: String,
    pub api_issuer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apple_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
}

/// Kind-specific target configuration, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TargetSpec {
    Depot(DepotConfig),
    Netlify(NetlifyConfig),
    Vercel(VercelConfig),
    GhPages(GhPagesConfig),
    S3(S3Config),
    CloudflarePages(CloudflarePagesConfig),
    GooglePlay(GooglePlayConfig),
    AppStore(AppStoreConfig),
}

impl TargetSpec {
    /// The categorical kind name, matching the wire tag.
    pub fn kind(&self) -> &'static str {
        match self {
            TargetSpec::Depot(_) => "depot",
            TargetSpec::Netlify(_) => "netlify",
            TargetSpec::Vercel(_) => "vercel",
            TargetSpec::GhPages(_) => "gh-pages",
            TargetSpec::S3(_) => "s3",
            TargetSpec::CloudflarePages(_) => "cloudflare-pages",
            TargetSpec::GooglePlay(_) => "google-play",
            TargetSpec::AppStore(_) => "app-store",
        }
    }

    /// The family a target kind belongs to.
    pub fn family(&self) -> Family {
        match self {
            TargetSpec::Depot(_) => Family::Steam,
            TargetSpec::Netlify(_)
            | TargetSpec::Vercel(_)
            | TargetSpec::GhPages(_)
            | TargetSpec::S3(_)
            | TargetSpec::CloudflarePages(_) => Family::Web,
            TargetSpec::GooglePlay(_) | TargetSpec::AppStore(_) => Family::Mobile,
        }
    }
}

/// One publish destination: a Steam depot, a web hosting provider, or a
/// mobile store. Common fields up front, kind-specific config flattened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetEntry {
    pub key: String,
    pub enabled: bool,
    pub artifact_directory: String,
    #[serde(flatten)]
    pub spec: TargetSpec,
}

/// Steam-wide configuration fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SteamSettings {
    pub app_id: String,
    pub steam_cmd_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_description: Option<String>,
    pub if_changed: bool,
    pub preview: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSettings {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileSettings {
    pub app_version: String,
}

/// Family-wide configuration, tagged by `family` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum FamilySettings {
    Steam(SteamSettings),
    Web(WebSettings),
    Mobile(MobileSettings),
}

impl FamilySettings {
    pub fn family(&self) -> Family {
        match self {
            FamilySettings::Steam(_) => Family::Steam,
            FamilySettings::Web(_) => Family::Web,
            FamilySettings::Mobile(_) => Family::Mobile,
        }
    }

    pub fn as_steam(&self) -> Option<&SteamSettings> {
        match self {
            FamilySettings::Steam(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mobile(&self) -> Option<&MobileSettings> {
        match self {
            FamilySettings::Mobile(m) => Some(m),
            _ => None,
        }
    }
}

/// Validate a Steam App ID string: non-empty, purely numeric.
pub fn parse_app_id(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("app id must not be empty".to_string());
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("app id must be numeric, got {trimmed:?}"));
    }
    Ok(trimmed.to_string())
}

/// Per-project publisher configuration, one document per family namespace.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishConfig {
    pub project_id: String,
    pub project_path: PathBuf,
    #[serde(flatten)]
    pub settings: FamilySettings,
    pub targets: Vec<TargetEntry>,
    /// Per-target external-tool timeout.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub upload_timeout: Duration,
    /// Keep at most this many runs on disk; 0 keeps everything.
    pub publish_retention: u32,
}

impl PublishConfig {
    pub fn family(&self) -> Family {
        self.settings.family()
    }

    pub fn target(&self, key: &str) -> Option<&TargetEntry> {
        self.targets.iter().find(|t| t.key == key)
    }

    pub fn enabled_targets(&self) -> Vec<&TargetEntry> {
        self.targets.iter().filter(|t| t.enabled).collect()
    }
}

/// Durable per-project mutable state; embeds the current config so a state
/// document alone is enough to recover the publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishState {
    pub config: PublishConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_run_time: Option<DateTime<Utc>>,
    pub total_runs: u64,
    pub is_running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_target: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl PublishState {
    /// Fresh state for a newly initialized publisher.
    pub fn new(config: PublishConfig, now: DateTime<Utc>) -> Self {
        Self {
            config,
            last_run_id: None,
            last_run_time: None,
            total_runs: 0,
            is_running: false,
            current_target: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Kind-specific data opportunistically scraped from tool output. Absent
/// fields mean the tool never printed them; never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_uploaded: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
}

impl TargetOutputs {
    pub fn is_empty(&self) -> bool {
        self.manifest_id.is_none()
            && self.bytes_uploaded.is_none()
            && self.deploy_url.is_none()
            && self.deploy_id.is_none()
            && self.version_code.is_none()
            && self.build_number.is_none()
    }
}

/// Outcome of one attempted target within a run.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetResult {
    pub target_key: String,
    pub status: PublishStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub completed_at: DateTime<Utc>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "TargetOutputs::is_empty")]
    pub optional_outputs: TargetOutputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub logs: Vec<String>,
}

/// Family-specific header carried by every run document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum RunHeader {
    Steam(SteamRunHeader),
    Web(WebRunHeader),
    Mobile(MobileRunHeader),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SteamRunHeader {
    pub app_id: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_description: Option<String>,
    pub depots: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebRunHeader {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileRunHeader {
    pub app_version: String,
}

impl RunHeader {
    pub fn family(&self) -> Family {
        match self {
            RunHeader::Steam(_) => Family::Steam,
            RunHeader::Web(_) => Family::Web,
            RunHeader::Mobile(_) => Family::Mobile,
        }
    }
}

/// One execution of the publisher: immutable once written.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRun {
    /// 12 lowercase hex chars, prefix of a SHA-256 digest.
    pub id: String,
    pub project_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration: Duration,
    /// Target keys actually attempted, in execution order.
    pub targets: Vec<String>,
    pub triggered_by: String,
    #[serde(flatten)]
    pub header: RunHeader,
    pub results: Vec<TargetResult>,
    pub status: PublishStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PublishRun {
    pub fn is_successful(&self) -> bool {
        self.status == PublishStatus::Succeeded
    }

    pub fn failed_targets(&self) -> Vec<&TargetResult> {
        self.results
            .iter()
            .filter(|r| r.status == PublishStatus::Failed)
            .collect()
    }

    pub fn succeeded_targets(&self) -> Vec<&TargetResult> {
        self.results
            .iter()
            .filter(|r| r.status == PublishStatus::Succeeded)
            .collect()
    }

    pub fn target_result(&self, key: &str) -> Option<&TargetResult> {
        self.results.iter().find(|r| r.target_key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steam_config() -> PublishConfig {
        PublishConfig {
            project_id: "proj".to_string(),
            project_path: PathBuf::from("/tmp/proj"),
            settings: FamilySettings::Steam(SteamSettings {
                app_id: "480".to_string(),
                steam_cmd_path: "steamcmd".to_string(),
                username: None,
                branch: "default".to_string(),
                build_description: None,
                if_changed: false,
                preview: false,
            }),
            targets: vec![TargetEntry {
                key: "1000001".to_string(),
                enabled: true,
                artifact_directory: "build/1000001".to_string(),
                spec: TargetSpec::Depot(DepotConfig {
                    depot_id: "1000001".to_string(),
                    exclusions: vec!["*.pdb".to_string()],
                }),
            }],
            upload_timeout: Duration::from_secs(600),
            publish_retention: 0,
        }
    }

    #[test]
    fn family_namespace_dirs_are_distinct() {
        assert_eq!(Family::Steam.namespace_dir(), ".steam-publisher");
        assert_eq!(Family::Web.namespace_dir(), ".web-publisher");
        assert_eq!(Family::Mobile.namespace_dir(), ".mobile-publisher");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&PublishStatus::Succeeded).expect("serialize");
        assert_eq!(json, "\"succeeded\"");
        let rt: PublishStatus = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(rt, PublishStatus::Succeeded);
    }

    #[test]
    fn status_icons_match_formatter_contract() {
        assert_eq!(PublishStatus::Succeeded.icon(), '+');
        assert_eq!(PublishStatus::Failed.icon(), 'x');
        assert_eq!(PublishStatus::Cancelled.icon(), '-');
        assert_eq!(PublishStatus::Uploading.icon(), '?');
    }

    #[test]
    fn target_entry_flattens_kind_tag() {
        let entry = TargetEntry {
            key: "netlify".to_string(),
            enabled: true,
            artifact_directory: "dist".to_string(),
            spec: TargetSpec::Netlify(NetlifyConfig {
                site_id: "site-1".to_string(),
                auth_token: "tok".to_string(),
                production: true,
                functions_dir: None,
                message: None,
            }),
        };

        let json = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(json["kind"], "netlify");
        assert_eq!(json["artifactDirectory"], "dist");
        assert_eq!(json["siteId"], "site-1");

        let rt: TargetEntry = serde_json::from_value(json).expect("deserialize");
        assert_eq!(rt, entry);
    }

    #[test]
    fn kind_names_match_wire_tags() {
        let spec = TargetSpec::GhPages(GhPagesConfig {
            repo: "o/r".to_string(),
            branch: "gh-pages".to_string(),
            message: None,
            nojekyll: false,
        });
        assert_eq!(spec.kind(), "gh-pages");
        let json = serde_json::to_value(&spec).expect("serialize");
        assert_eq!(json["kind"], "gh-pages");
    }

    #[test]
    fn config_roundtrips_with_camel_case_wire_names() {
        let config = steam_config();
        let json = serde_json::to_value(&config).expect("serialize");
        assert_eq!(json["projectId"], "proj");
        assert_eq!(json["family"], "steam");
        assert_eq!(json["appId"], "480");
        assert_eq!(json["steamCmdPath"], "steamcmd");
        assert_eq!(json["uploadTimeout"], 600_000);
        assert_eq!(json["publishRetention"], 0);

        let rt: PublishConfig = serde_json::from_value(json).expect("deserialize");
        assert_eq!(rt, config);
    }

    #[test]
    fn state_timestamps_serialize_as_epoch_millis() {
        let now = Utc::now();
        let state = PublishState::new(steam_config(), now);
        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json["totalRuns"], 0);
        assert_eq!(json["isRunning"], false);
        assert_eq!(json["createdAt"], now.timestamp_millis());
        assert!(json.get("lastRunId").is_none());

        let rt: PublishState = serde_json::from_value(json).expect("deserialize");
        assert_eq!(rt.created_at.timestamp_millis(), now.timestamp_millis());
        assert!(rt.last_run_time.is_none());
    }

    #[test]
    fn parse_app_id_accepts_digits_only() {
        assert_eq!(parse_app_id("480").expect("valid"), "480");
        assert_eq!(parse_app_id(" 480 ").expect("trimmed"), "480");
        assert!(parse_app_id("").is_err());
        assert!(parse_app_id("48a").is_err());
        assert!(parse_app_id("-48").is_err());
    }

    #[test]
    fn empty_outputs_are_omitted_from_results() {
        let now = Utc::now();
        let result = TargetResult {
            target_key: "netlify".to_string(),
            status: PublishStatus::Succeeded,
            started_at: now,
            completed_at: now,
            duration: Duration::from_millis(1200),
            optional_outputs: TargetOutputs::default(),
            error: None,
            logs: vec!["line".to_string()],
        };

        let json = serde_json::to_value(&result).expect("serialize");
        assert!(json.get("optionalOutputs").is_none());
        assert_eq!(json["duration"], 1200);
    }

    #[test]
    fn run_header_flattens_family_fields() {
        let run = PublishRun {
            id: "abcdef012345".to_string(),
            project_id: "proj".to_string(),
            timestamp: Utc::now(),
            duration: Duration::from_millis(5),
            targets: vec!["1000001".to_string()],
            triggered_by: "manual".to_string(),
            header: RunHeader::Steam(SteamRunHeader {
                app_id: "480".to_string(),
                branch: "beta".to_string(),
                build_description: None,
                depots: vec!["1000001".to_string()],
            }),
            results: vec![],
            status: PublishStatus::Pending,
            tags: vec![],
            metadata: BTreeMap::new(),
        };

        let json = serde_json::to_value(&run).expect("serialize");
        assert_eq!(json["family"], "steam");
        assert_eq!(json["appId"], "480");
        assert_eq!(json["depots"][0], "1000001");
        assert_eq!(json["triggeredBy"], "manual");

        let rt: PublishRun = serde_json::from_value(json).expect("deserialize");
        assert_eq!(rt, run);
    }

    #[test]
    fn run_inspection_helpers_filter_by_status() {
        let now = Utc::now();
        let result = |key: &str, status| TargetResult {
            target_key: key.to_string(),
            status,
            started_at: now,
            completed_at: now,
            duration: Duration::ZERO,
            optional_outputs: TargetOutputs::default(),
            error: None,
            logs: vec![],
        };

        let run = PublishRun {
            id: "abcdef012345".to_string(),
            project_id: "proj".to_string(),
            timestamp: now,
            duration: Duration::ZERO,
            targets: vec!["a".to_string(), "b".to_string()],
            triggered_by: "manual".to_string(),
            header: RunHeader::Web(WebRunHeader::default()),
            results: vec![
                result("a", PublishStatus::Succeeded),
                result("b", PublishStatus::Failed),
            ],
            status: PublishStatus::Failed,
            tags: vec![],
            metadata: BTreeMap::new(),
        };

        assert!(!run.is_successful());
        assert_eq!(run.succeeded_targets().len(), 1);
        assert_eq!(run.failed_targets()[0].target_key, "b");
        assert!(run.target_result("a").is_some());
        assert!(run.target_result("zzz").is_none());
    }
}
