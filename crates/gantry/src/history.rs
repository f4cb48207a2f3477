//! Read path over persisted runs: enumeration, filtering, pagination,
//! aggregation, and retention pruning.
//!
//! Listings are always materialized from the run documents on disk and
//! sorted by `(timestamp desc, id desc)` before any filter applies, so the
//! ordering is a total order even when two runs share a millisecond.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PublishError;
use crate::state::StateStore;
use crate::types::{PublishRun, PublishStatus, RunHeader};

/// Filters for [`HistoryStore::list`]; all optional, AND-composed.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Inclusive lower bound on the run timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the run timestamp.
    pub until: Option<DateTime<Utc>>,
    /// Run must have attempted this target.
    pub target_key: Option<String>,
    pub status: Option<PublishStatus>,
    pub triggered_by: Option<String>,
    /// Case-insensitive substring over ids, identifiers, and log lines.
    pub search: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// One page of history: `total_count` is the post-filter, pre-pagination
/// count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub project_id: String,
    pub runs: Vec<PublishRun>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetStats {
    pub attempts: usize,
    pub succeeded: usize,
    /// Rounded integer percent over this target's attempts.
    pub success_rate: u32,
}

/// Aggregates over every persisted run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishStats {
    pub project_id: String,
    pub total_runs: usize,
    /// Individual target attempts across all runs.
    pub total_uploads: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub per_target: BTreeMap<String, TargetStats>,
    /// Average run duration, rounded to the millisecond.
    pub average_duration_ms: u64,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub first_run: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_run: Option<DateTime<Utc>>,
}

/// Query interface over one publisher namespace's runs.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    store: StateStore,
}

impl HistoryStore {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn get_run(&self, id: &str) -> Result<Option<PublishRun>> {
        self.store.read_run(id)
    }

    /// List runs matching `query`, newest first.
    pub fn list(&self, query: &HistoryQuery) -> Result<HistoryPage> {
        let project_id = self.project_id()?;
        let mut runs = load_all_sorted(&self.store)?;

        runs.retain(|run| matches(run, query));
        let total_count = runs.len();

        let runs: Vec<PublishRun> = runs
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        Ok(HistoryPage {
            project_id,
            runs,
            total_count,
        })
    }

    /// Aggregate statistics, or `None` when the publisher was never
    /// initialized.
    pub fn stats(&self) -> Result<Option<PublishStats>> {
        let Some(state) = self.store.read()? else {
            return Ok(None);
        };
        let runs = load_all_sorted(&self.store)?;

        let mut stats = PublishStats {
            project_id: state.config.project_id,
            total_runs: runs.len(),
            total_uploads: 0,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            per_target: BTreeMap::new(),
            average_duration_ms: 0,
            first_run: runs.last().map(|r| r.timestamp),
            last_run: runs.first().map(|r| r.timestamp),
        };

        let mut total_duration_ms: u128 = 0;
        for run in &runs {
            total_duration_ms += run.duration.as_millis();
            for result in &run.results {
                stats.total_uploads += 1;
                match result.status {
                    PublishStatus::Succeeded => stats.succeeded += 1,
                    PublishStatus::Failed => stats.failed += 1,
                    PublishStatus::Cancelled => stats.cancelled += 1,
                    _ => {}
                }
                let per_target = stats
                    .per_target
                    .entry(result.target_key.clone())
                    .or_default();
                per_target.attempts += 1;
                if result.status == PublishStatus::Succeeded {
                    per_target.succeeded += 1;
                }
            }
        }

        for per_target in stats.per_target.values_mut() {
            per_target.success_rate =
                ((per_target.succeeded as f64 * 100.0) / per_target.attempts as f64).round() as u32;
        }
        if !runs.is_empty() {
            stats.average_duration_ms =
                (total_duration_ms as f64 / runs.len() as f64).round() as u64;
        }

        Ok(Some(stats))
    }

    /// Keep the newest `keep` runs, delete the rest. Returns how many files
    /// were actually removed.
    pub fn prune(&self, keep: usize) -> Result<usize> {
        prune_to(&self.store, keep)
    }

    fn project_id(&self) -> Result<String> {
        let state = self.store.read()?.ok_or_else(|| {
            anyhow::Error::from(PublishError::NotInitialized(
                self.store.namespace().to_path_buf(),
            ))
        })?;
        Ok(state.config.project_id)
    }
}

pub(crate) fn prune_to(store: &StateStore, keep: usize) -> Result<usize> {
    let runs = load_all_sorted(store)?;
    let mut deleted = 0;
    for run in runs.iter().skip(keep) {
        if store.remove_run(&run.id)? {
            deleted += 1;
        }
    }
    Ok(deleted)
}

fn load_all_sorted(store: &StateStore) -> Result<Vec<PublishRun>> {
    let mut runs = Vec::new();
    for id in store.list_run_ids()? {
        if let Some(run) = store.read_run(&id)? {
            runs.push(run);
        }
    }
    runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    Ok(runs)
}

fn matches(run: &PublishRun, query: &HistoryQuery) -> bool {
    if let Some(since) = query.since
        && run.timestamp < since
    {
        return false;
    }
    if let Some(until) = query.until
        && run.timestamp > until
    {
        return false;
    }
    if let Some(target_key) = &query.target_key
        && !run.targets.iter().any(|t| t == target_key)
    {
        return false;
    }
    if let Some(status) = query.status
        && run.status != status
    {
        return false;
    }
    if let Some(triggered_by) = &query.triggered_by
        && &run.triggered_by != triggered_by
    {
        return false;
    }
    if let Some(search) = &query.search {
        let needle = search.to_lowercase();
        if !search_haystack(run)
            .iter()
            .any(|hay| hay.to_lowercase().contains(&needle))
        {
            return false;
        }
    }
    true
}

/// Every searchable string of a run: id, identifier fields, trigger,
/// description, target keys, and all result log lines.
fn search_haystack(run: &PublishRun) -> Vec<String> {
    let mut haystack = vec![run.id.clone(), run.triggered_by.clone()];
    haystack.extend(run.targets.iter().cloned());
    match &run.header {
        RunHeader::Steam(header) => {
            haystack.push(header.app_id.clone());
            haystack.push(header.branch.clone());
            if let Some(desc) = &header.build_description {
                haystack.push(desc.clone());
            }
            haystack.extend(header.depots.iter().cloned());
        }
        RunHeader::Web(_) => {}
        RunHeader::Mobile(header) => {
            haystack.push(header.app_version.clone());
        }
    }
    for result in &run.results {
        haystack.extend(result.logs.iter().cloned());
    }
    haystack
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;
    use crate::types::{
        DepotConfig, Family, FamilySettings, PublishConfig, SteamRunHeader, SteamSettings,
        TargetEntry, TargetOutputs, TargetResult, TargetSpec,
    };

    fn store(td: &tempfile::TempDir) -> StateStore {
        let store = StateStore::new(td.path(), Family::Steam);
        let config = PublishConfig {
            project_id: "proj".to_string(),
            project_path: td.path().to_path_buf(),
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
                artifact_directory: "build".to_string(),
                spec: TargetSpec::Depot(DepotConfig {
                    depot_id: "1000001".to_string(),
                    exclusions: vec![],
                }),
            }],
            upload_timeout: Duration::from_secs(600),
            publish_retention: 0,
        };
        store.init(&config).expect("init");
        store
    }

    fn run(
        id: &str,
        epoch_ms: i64,
        status: PublishStatus,
        triggered_by: &str,
        log: &str,
    ) -> PublishRun {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(epoch_ms).expect("timestamp");
        PublishRun {
            id: id.to_string(),
            project_id: "proj".to_string(),
            timestamp,
            duration: Duration::from_millis(100),
            targets: vec!["1000001".to_string()],
            triggered_by: triggered_by.to_string(),
            header: RunHeader::Steam(SteamRunHeader {
                app_id: "480".to_string(),
                branch: "default".to_string(),
                build_description: None,
                depots: vec!["1000001".to_string()],
            }),
            results: vec![TargetResult {
                target_key: "1000001".to_string(),
                status,
                started_at: timestamp,
                completed_at: timestamp,
                duration: Duration::from_millis(100),
                optional_outputs: TargetOutputs::default(),
                error: None,
                logs: vec![log.to_string()],
            }],
            status,
            tags: vec![],
            metadata: BTreeMap::new(),
        }
    }

    fn seed(store: &StateStore) -> HistoryStore {
        store
            .write_run(&run(
                "aaaaaaaaaaaa",
                1_000,
                PublishStatus::Succeeded,
                "manual",
                "uploaded fine",
            ))
            .expect("write a");
        store
            .write_run(&run(
                "bbbbbbbbbbbb",
                2_000,
                PublishStatus::Failed,
                "ci",
                "error: quota exceeded",
            ))
            .expect("write b");
        store
            .write_run(&run(
                "cccccccccccc",
                3_000,
                PublishStatus::Succeeded,
                "manual",
                "uploaded fine again",
            ))
            .expect("write c");
        HistoryStore::new(store.clone())
    }

    #[test]
    fn list_sorts_newest_first_with_id_tiebreak() {
        let td = tempdir().expect("tempdir");
        let store = store(&td);
        let history = seed(&store);

        // Same timestamp as run c: id decides.
        store
            .write_run(&run(
                "dddddddddddd",
                3_000,
                PublishStatus::Succeeded,
                "manual",
                "tiebreak",
            ))
            .expect("write d");

        let page = history.list(&HistoryQuery::default()).expect("list");
        assert_eq!(page.project_id, "proj");
        assert_eq!(page.total_count, 4);
        let ids: Vec<&str> = page.runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["dddddddddddd", "cccccccccccc", "bbbbbbbbbbbb", "aaaaaaaaaaaa"]
        );
    }

    #[test]
    fn pagination_applies_after_counting() {
        let td = tempdir().expect("tempdir");
        let history = seed(&store(&td));

        let page = history
            .list(&HistoryQuery {
                limit: Some(2),
                ..HistoryQuery::default()
            })
            .expect("list");
        assert_eq!(page.total_count, 3);
        assert_eq!(page.runs.len(), 2);
        assert_eq!(page.runs[0].id, "cccccccccccc");

        let page = history
            .list(&HistoryQuery {
                offset: 2,
                limit: Some(2),
                ..HistoryQuery::default()
            })
            .expect("list");
        assert_eq!(page.total_count, 3);
        assert_eq!(page.runs.len(), 1);
        assert_eq!(page.runs[0].id, "aaaaaaaaaaaa");
    }

    #[test]
    fn filters_compose_with_and() {
        let td = tempdir().expect("tempdir");
        let history = seed(&store(&td));

        let page = history
            .list(&HistoryQuery {
                status: Some(PublishStatus::Succeeded),
                triggered_by: Some("manual".to_string()),
                ..HistoryQuery::default()
            })
            .expect("list");
        assert_eq!(page.total_count, 2);

        let page = history
            .list(&HistoryQuery {
                status: Some(PublishStatus::Succeeded),
                triggered_by: Some("ci".to_string()),
                ..HistoryQuery::default()
            })
            .expect("list");
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn time_range_is_inclusive() {
        let td = tempdir().expect("tempdir");
        let history = seed(&store(&td));

        let page = history
            .list(&HistoryQuery {
                since: DateTime::<Utc>::from_timestamp_millis(2_000),
                until: DateTime::<Utc>::from_timestamp_millis(3_000),
                ..HistoryQuery::default()
            })
            .expect("list");
        let ids: Vec<&str> = page.runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["cccccccccccc", "bbbbbbbbbbbb"]);
    }

    #[test]
    fn target_key_filter_requires_membership() {
        let td = tempdir().expect("tempdir");
        let history = seed(&store(&td));

        let page = history
            .list(&HistoryQuery {
                target_key: Some("1000001".to_string()),
                ..HistoryQuery::default()
            })
            .expect("list");
        assert_eq!(page.total_count, 3);

        let page = history
            .list(&HistoryQuery {
                target_key: Some("netlify".to_string()),
                ..HistoryQuery::default()
            })
            .expect("list");
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn search_spans_ids_identifiers_and_logs() {
        let td = tempdir().expect("tempdir");
        let history = seed(&store(&td));

        // Case-insensitive over log lines.
        let page = history
            .list(&HistoryQuery {
                search: Some("QUOTA".to_string()),
                ..HistoryQuery::default()
            })
            .expect("list");
        assert_eq!(page.total_count, 1);
        assert_eq!(page.runs[0].id, "bbbbbbbbbbbb");

        // Over the app id.
        let page = history
            .list(&HistoryQuery {
                search: Some("480".to_string()),
                ..HistoryQuery::default()
            })
            .expect("list");
        assert_eq!(page.total_count, 3);

        // Over run ids.
        let page = history
            .list(&HistoryQuery {
                search: Some("cccccc".to_string()),
                ..HistoryQuery::default()
            })
            .expect("list");
        assert_eq!(page.total_count, 1);
    }

    #[test]
    fn stats_aggregate_attempts_and_rates() {
        let td = tempdir().expect("tempdir");
        let history = seed(&store(&td));

        let stats = history.stats().expect("stats").expect("initialized");
        assert_eq!(stats.project_id, "proj");
        assert_eq!(stats.total_runs, 3);
        assert_eq!(stats.total_uploads, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.cancelled, 0);
        assert_eq!(stats.average_duration_ms, 100);
        assert_eq!(
            stats.first_run.map(|t| t.timestamp_millis()),
            Some(1_000)
        );
        assert_eq!(stats.last_run.map(|t| t.timestamp_millis()), Some(3_000));

        let per_target = stats.per_target.get("1000001").expect("target stats");
        assert_eq!(per_target.attempts, 3);
        assert_eq!(per_target.succeeded, 2);
        assert_eq!(per_target.success_rate, 67);
    }

    #[test]
    fn stats_on_empty_history_are_zeroed() {
        let td = tempdir().expect("tempdir");
        let history = HistoryStore::new(store(&td));

        let stats = history.stats().expect("stats").expect("initialized");
        assert_eq!(stats.total_runs, 0);
        assert_eq!(stats.total_uploads, 0);
        assert_eq!(stats.average_duration_ms, 0);
        assert!(stats.first_run.is_none());
        assert!(stats.last_run.is_none());
    }

    #[test]
    fn stats_is_none_before_init() {
        let td = tempdir().expect("tempdir");
        let history = HistoryStore::new(StateStore::new(td.path(), Family::Web));
        assert!(history.stats().expect("stats").is_none());
    }

    #[test]
    fn prune_keeps_the_newest_runs() {
        let td = tempdir().expect("tempdir");
        let store = store(&td);
        let history = seed(&store);

        let deleted = history.prune(2).expect("prune");
        assert_eq!(deleted, 1);

        let page = history.list(&HistoryQuery::default()).expect("list");
        let ids: Vec<&str> = page.runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["cccccccccccc", "bbbbbbbbbbbb"]);
        assert!(!store.run_path("aaaaaaaaaaaa").exists());

        // Pruning below the current count is a no-op.
        assert_eq!(history.prune(5).expect("prune"), 0);
    }

    #[test]
    fn get_run_reads_single_documents() {
        let td = tempdir().expect("tempdir");
        let history = seed(&store(&td));

        assert!(history.get_run("aaaaaaaaaaaa").expect("get").is_some());
        assert!(history.get_run("zzzzzzzzzzzz").expect("get").is_none());
    }

    #[test]
    fn list_before_init_is_a_precondition_error() {
        let td = tempdir().expect("tempdir");
        let history = HistoryStore::new(StateStore::new(td.path(), Family::Steam));
        let err = history.list(&HistoryQuery::default()).expect_err("fail");
        assert!(matches!(
            err.downcast_ref::<PublishError>(),
            Some(PublishError::NotInitialized(_))
        ));
    }
}
