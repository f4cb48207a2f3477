//! Pure argv synthesis for every target kind.
//!
//! Each builder maps `(config, target, overrides)` to the exact token vector
//! handed to the vendor CLI, with `argv[0]` being the program. Nothing here
//! touches the filesystem or spawns anything, which is what keeps the run
//! coordinator unit-testable without real tools.
//!
//! Paths are resolved against `config.projectPath` before emission.

use std::path::{Path, PathBuf};

use crate::types::{PublishConfig, SteamSettings, TargetEntry, TargetSpec};

/// Per-run overrides from the publish options.
#[derive(Debug, Clone, Default)]
pub struct BuildOverrides {
    pub dry_run: bool,
    pub branch: Option<String>,
    pub build_description: Option<String>,
    pub app_version: Option<String>,
}

impl BuildOverrides {
    fn effective_branch<'a>(&'a self, settings: &'a SteamSettings) -> &'a str {
        self.branch.as_deref().unwrap_or(&settings.branch)
    }

    fn effective_description<'a>(&'a self, settings: &'a SteamSettings) -> Option<&'a str> {
        self.build_description
            .as_deref()
            .or(settings.build_description.as_deref())
    }
}

/// Resolve a target's artifact directory absolutely against the project
/// root. Already-absolute directories pass through untouched.
pub fn resolve_artifact(project_path: &Path, artifact_directory: &str) -> PathBuf {
    let rel = Path::new(artifact_directory);
    if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        project_path.join(rel)
    }
}

/// Build the argv for one target. The first element is the program.
pub fn build_argv(
    config: &PublishConfig,
    target: &TargetEntry,
    overrides: &BuildOverrides,
) -> Vec<String> {
    let artifact = resolve_artifact(&config.project_path, &target.artifact_directory);
    let artifact = artifact.to_string_lossy().into_owned();

    match &target.spec {
        TargetSpec::Depot(depot) => {
            let Some(steam) = config.settings.as_steam() else {
                return vec!["deploy".to_string(), artifact];
            };

            let mut argv = vec![steam.steam_cmd_path.clone()];
            if let Some(username) = &steam.username {
                argv.push("+login".to_string());
                argv.push(username.clone());
            }
            argv.push("+app_build".to_string());
            argv.push("--app-id".to_string());
            argv.push(steam.app_id.clone());
            argv.push("--depot-id".to_string());
            argv.push(depot.depot_id.clone());
            argv.push("--content-dir".to_string());
            argv.push(artifact);

            let branch = overrides.effective_branch(steam);
            if branch != "default" {
                argv.push("--branch".to_string());
                argv.push(branch.to_string());
            }
            if let Some(desc) = overrides.effective_description(steam) {
                argv.push("--desc".to_string());
                argv.push(desc.to_string());
            }
            if overrides.dry_run || steam.preview {
                argv.push("--preview".to_string());
            }
            argv.push("+quit".to_string());
            argv
        }

        TargetSpec::Netlify(netlify) => {
            let mut argv = vec![
                "netlify".to_string(),
                "deploy".to_string(),
                "--dir".to_string(),
                artifact,
                "--site".to_string(),
                netlify.site_id.clone(),
                "--auth".to_string(),
                netlify.auth_token.clone(),
            ];
            if netlify.production && !overrides.dry_run {
                argv.push("--prod".to_string());
            }
            if let Some(functions) = &netlify.functions_dir {
                argv.push("--functions".to_string());
                argv.push(functions.clone());
            }
            if let Some(message) = &netlify.message {
                argv.push("--message".to_string());
                argv.push(message.clone());
            }
            if overrides.dry_run {
                argv.push("--build".to_string());
            }
            argv
        }

        TargetSpec::Vercel(vercel) => {
            let mut argv = vec![
                "vercel".to_string(),
                "deploy".to_string(),
                artifact,
                "--token".to_string(),
                vercel.token.clone(),
            ];
            if vercel.production && !overrides.dry_run {
                argv.push("--prod".to_string());
            }
            argv.push("--yes".to_string());
            argv
        }

        TargetSpec::GhPages(pages) => {
            let mut argv = vec![
                "gh".to_string(),
                "deploy".to_string(),
                "--dir".to_string(),
                artifact,
                "--branch".to_string(),
                pages.branch.clone(),
                "--repo".to_string(),
                pages.repo.clone(),
            ];
            if let Some(message) = &pages.message {
                argv.push("--message".to_string());
                argv.push(message.clone());
            }
            if pages.nojekyll {
                argv.push("--nojekyll".to_string());
            }
            argv
        }

        TargetSpec::S3(s3) => {
            let mut destination = format!("s3://{}/", s3.bucket);
            if let Some(prefix) = &s3.prefix {
                let trimmed = prefix.trim_matches('/');
                if !trimmed.is_empty() {
                    destination.push_str(trimmed);
                    destination.push('/');
                }
            }

            let mut argv = vec![
                "aws".to_string(),
                "s3".to_string(),
                "sync".to_string(),
                artifact,
                destination,
                "--region".to_string(),
                s3.region.clone(),
            ];
            if let Some(acl) = &s3.acl {
                argv.push("--acl".to_string());
                argv.push(acl.clone());
            }
            if let Some(cache_control) = &s3.cache_control {
                argv.push("--cache-control".to_string());
                argv.push(cache_control.clone());
            }
            if overrides.dry_run {
                argv.push("--dryrun".to_string());
            }
            argv.push("--delete".to_string());
            argv
        }

        TargetSpec::CloudflarePages(cf) => {
            let mut argv = vec![
                "wrangler".to_string(),
                "pages".to_string(),
                "deploy".to_string(),
                artifact,
                "--project-name".to_string(),
                cf.project_name.clone(),
            ];
            if let Some(branch) = &cf.branch {
                argv.push("--branch".to_string());
                argv.push(branch.clone());
            }
            argv
        }

        TargetSpec::GooglePlay(play) => {
            let mut argv = vec!["supply".to_string(), "upload".to_string()];
            if overrides.dry_run {
                argv.push("--dry-run".to_string());
            }
            argv.push("--package-name".to_string());
            argv.push(play.package_name.clone());
            argv.push("--track".to_string());
            argv.push(play.track.clone());
            argv.push("--release-status".to_string());
            argv.push(play.release_status.clone());
            if let Some(key) = &play.service_account_key {
                argv.push("--service-account-key".to_string());
                argv.push(key.to_string_lossy().into_owned());
            }
            if let Some(mapping) = &play.mapping_file {
                argv.push("--mapping-file".to_string());
                argv.push(mapping.to_string_lossy().into_owned());
            }
            if play.changes_not_sent_for_review {
                argv.push("--changes-not-sent-for-review".to_string());
            }
            let version = overrides
                .app_version
                .as_deref()
                .or(config.settings.as_mobile().map(|m| m.app_version.as_str()));
            if let Some(version) = version.filter(|v| !v.is_empty()) {
                argv.push("--version-name".to_string());
                argv.push(version.to_string());
            }
            argv.push("--artifact".to_string());
            argv.push(artifact);
            argv
        }

        TargetSpec::AppStore(store) => {
            let mut argv = vec!["xcrun".to_string(), "altool".to_string()];
            argv.push("--upload-app".to_string());
            if overrides.dry_run {
                argv.push("--validate-app".to_string());
            }
            argv.push("--type".to_string());
            argv.push("ios".to_string());
            argv.push("--file".to_string());
            argv.push(artifact);
            argv.push("--apiKey".to_string());
            argv.push(store.api_key_id.clone());
            argv.push("--apiIssuer".to_string());
            argv.push(store.api_issuer_id.clone());
            if let Some(apple_id) = &store.apple_id {
                argv.push("--apple-id".to_string());
                argv.push(apple_id.clone());
            }
            if let Some(bundle_id) = &store.bundle_id {
                argv.push("--bundle-id".to_string());
                argv.push(bundle_id.clone());
            }
            argv
        }
    }
}

/// Render a Steamworks `app_build` VDF script for the config's depots.
/// Disabled depots are omitted; the `Preview` flag reflects the effective
/// preview state (config or dry-run override).
pub fn app_build_script(config: &PublishConfig, overrides: &BuildOverrides) -> String {
    let Some(steam) = config.settings.as_steam() else {
        return String::new();
    };

    let preview = if overrides.dry_run || steam.preview {
        "1"
    } else {
        "0"
    };

    let mut vdf = String::new();
    vdf.push_str("\"AppBuild\"\n{\n");
    vdf.push_str(&format!("\t\"AppID\" \"{}\"\n", steam.app_id));
    if let Some(desc) = overrides.effective_description(steam) {
        vdf.push_str(&format!("\t\"Desc\" \"{desc}\"\n"));
    }
    let branch = overrides.effective_branch(steam);
    if branch != "default" {
        vdf.push_str(&format!("\t\"SetLive\" \"{branch}\"\n"));
    }
    vdf.push_str(&format!("\t\"Preview\" \"{preview}\"\n"));
    vdf.push_str("\t\"Depots\"\n\t{\n");

    for target in &config.targets {
        if !target.enabled {
            continue;
        }
        let TargetSpec::Depot(depot) = &target.spec else {
            continue;
        };
        let content_dir = resolve_artifact(&config.project_path, &target.artifact_directory);
        vdf.push_str(&format!("\t\t\"{}\"\n\t\t{{\n", depot.depot_id));
        vdf.push_str("\t\t\t\"FileMapping\"\n\t\t\t{\n");
        vdf.push_str(&format!(
            "\t\t\t\t\"LocalPath\" \"{}/*\"\n",
            content_dir.to_string_lossy()
        ));
        vdf.push_str("\t\t\t\t\"DepotPath\" \".\"\n");
        vdf.push_str("\t\t\t\t\"Recursive\" \"1\"\n");
        vdf.push_str("\t\t\t}\n");
        for pattern in &depot.exclusions {
            vdf.push_str(&format!("\t\t\t\"FileExclusion\" \"{pattern}\"\n"));
        }
        vdf.push_str("\t\t}\n");
    }

    vdf.push_str("\t}\n}\n");
    vdf
}
