//! Text renderings of a run: one-line, full, and summary.

use std::fmt::Write as _;
use std::time::Duration;

use crate::types::{PublishRun, RunHeader, TargetResult};

fn short_id(id: &str) -> &str {
    &id[..id.len().min(7)]
}

fn seconds(duration: Duration) -> String {
    format!("{:.1}", duration.as_millis() as f64 / 1000.0)
}

/// The run's primary identifier: app id (Steam), project id (Web), or app
/// version (Mobile).
fn identifier(run: &PublishRun) -> &str {
    match &run.header {
        RunHeader::Steam(header) => &header.app_id,
        RunHeader::Web(_) => &run.project_id,
        RunHeader::Mobile(header) => &header.app_version,
    }
}

/// `"<short7id> [<icon>] <identifier> -> <targets> <durationSec>s"`
pub fn one_line(run: &PublishRun) -> String {
    format!(
        "{} [{}] {} -> {} {}s",
        short_id(&run.id),
        run.status.icon(),
        identifier(run),
        run.targets.join(","),
        seconds(run.duration),
    )
}

/// Multi-line rendering: header block followed by a per-target `Results:`
/// section with errors and scraped outputs.
pub fn full(run: &PublishRun) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run:       {}", run.id);
    let _ = writeln!(out, "Status:    {}", run.status);
    let _ = writeln!(out, "Project:   {}", run.project_id);
    match &run.header {
        RunHeader::Steam(header) => {
            let _ = writeln!(out, "App ID:    {}", header.app_id);
            let _ = writeln!(out, "Branch:    {}", header.branch);
            if let Some(desc) = &header.build_description {
                let _ = writeln!(out, "Desc:      {desc}");
            }
        }
        RunHeader::Web(_) => {}
        RunHeader::Mobile(header) => {
            let _ = writeln!(out, "Version:   {}", header.app_version);
        }
    }
    let _ = writeln!(out, "Triggered: {}", run.triggered_by);
    let _ = writeln!(out, "Started:   {}", run.timestamp.to_rfc3339());
    let _ = writeln!(out, "Duration:  {}s", seconds(run.duration));
    if !run.tags.is_empty() {
        let _ = writeln!(out, "Tags:      {}", run.tags.join(", "));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Results:");
    for result in &run.results {
        let _ = writeln!(
            out,
            "  [{}] {} {} {}s",
            result.status.icon(),
            result.target_key,
            result.status,
            seconds(result.duration),
        );
        if let Some(error) = &result.error {
            let _ = writeln!(out, "      error: {error}");
        }
        for line in output_lines(result) {
            let _ = writeln!(out, "      {line}");
        }
    }
    out
}

/// `"<family> Publish <short7id>: <S succeeded>[, <F failed>] (<N total>) <identifier>"`
/// with zero-count fragments omitted.
pub fn summary(run: &PublishRun) -> String {
    let succeeded = run.succeeded_targets().len();
    let failed = run.failed_targets().len();

    let mut counts: Vec<String> = Vec::new();
    if succeeded > 0 {
        counts.push(format!("{succeeded} succeeded"));
    }
    if failed > 0 {
        counts.push(format!("{failed} failed"));
    }
    let counts = if counts.is_empty() {
        String::new()
    } else {
        format!("{} ", counts.join(", "))
    };

    format!(
        "{} Publish {}: {}({} total) {}",
        run.header.family().display_name(),
        short_id(&run.id),
        counts,
        run.results.len(),
        identifier(run),
    )
}

fn output_lines(result: &TargetResult) -> Vec<String> {
    let outputs = &result.optional_outputs;
    let mut lines = Vec::new();
    if let Some(manifest_id) = &outputs.manifest_id {
        lines.push(format!("manifest id: {manifest_id}"));
    }
    if let Some(bytes) = outputs.bytes_uploaded {
        lines.push(format!("bytes uploaded: {bytes}"));
    }
    if let Some(url) = &outputs.deploy_url {
        lines.push(format!("deploy url: {url}"));
    }
    if let Some(deploy_id) = &outputs.deploy_id {
        lines.push(format!("deploy id: {deploy_id}"));
    }
    if let Some(version_code) = &outputs.version_code {
        lines.push(format!("version code: {version_code}"));
    }
    if let Some(build_number) = &outputs.build_number {
        lines.push(format!("build number: {build_number}"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::types::{
        MobileRunHeader, PublishStatus, SteamRunHeader, TargetOutputs, WebRunHeader,
    };

    fn result(key: &str, status: PublishStatus, error: Option<&str>) -> TargetResult {
        let now = Utc::now();
        TargetResult {
            target_key: key.to_string(),
            status,
            started_at: now,
            completed_at: now,
            duration: Duration::from_millis(500),
            optional_outputs: TargetOutputs::default(),
            error: error.map(str::to_string),
            logs: vec![],
        }
    }

    fn steam_run() -> PublishRun {
        PublishRun {
            id: "abcdef012345".to_string(),
            project_id: "proj".to_string(),
            timestamp: Utc::now(),
            duration: Duration::from_millis(1234),
            targets: vec!["1000001".to_string(), "1000002".to_string()],
            triggered_by: "manual".to_string(),
            header: RunHeader::Steam(SteamRunHeader {
                app_id: "480".to_string(),
                branch: "beta".to_string(),
                build_description: Some("nightly".to_string()),
                depots: vec!["1000001".to_string(), "1000002".to_string()],
            }),
            results: vec![
                result("1000001", PublishStatus::Succeeded, None),
                result("1000002", PublishStatus::Failed, Some("boom")),
            ],
            status: PublishStatus::Failed,
            tags: vec!["nightly".to_string()],
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn one_line_shape() {
        let line = one_line(&steam_run());
        assert_eq!(line, "abcdef0 [x] 480 -> 1000001,1000002 1.2s");
    }

    #[test]
    fn one_line_uses_family_identifier() {
        let mut run = steam_run();
        run.header = RunHeader::Mobile(MobileRunHeader {
            app_version: "1.2.3".to_string(),
        });
        run.status = PublishStatus::Succeeded;
        assert!(one_line(&run).contains("[+] 1.2.3 ->"));

        run.header = RunHeader::Web(WebRunHeader::default());
        assert!(one_line(&run).contains("[+] proj ->"));
    }

    #[test]
    fn full_lists_header_and_per_target_lines() {
        let mut run = steam_run();
        run.results[0].optional_outputs = TargetOutputs {
            manifest_id: Some("55".to_string()),
            bytes_uploaded: Some(1000),
            ..TargetOutputs::default()
        };

        let text = full(&run);
        assert!(text.contains("Run:       abcdef012345"));
        assert!(text.contains("Status:    failed"));
        assert!(text.contains("App ID:    480"));
        assert!(text.contains("Branch:    beta"));
        assert!(text.contains("Desc:      nightly"));
        assert!(text.contains("Tags:      nightly"));
        assert!(text.contains("Results:"));
        assert!(text.contains("[+] 1000001 succeeded 0.5s"));
        assert!(text.contains("manifest id: 55"));
        assert!(text.contains("bytes uploaded: 1000"));
        assert!(text.contains("[x] 1000002 failed 0.5s"));
        assert!(text.contains("error: boom"));
    }

    #[test]
    fn summary_omits_zero_fragments() {
        let run = steam_run();
        assert_eq!(
            summary(&run),
            "Steam Publish abcdef0: 1 succeeded, 1 failed (2 total) 480"
        );

        let mut all_good = run.clone();
        all_good.results = vec![
            result("1000001", PublishStatus::Succeeded, None),
            result("1000002", PublishStatus::Succeeded, None),
        ];
        assert_eq!(
            summary(&all_good),
            "Steam Publish abcdef0: 2 succeeded (2 total) 480"
        );

        let mut none = run;
        none.results = vec![];
        assert_eq!(summary(&none), "Steam Publish abcdef0: (0 total) 480");
    }
}
