use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use gantry::config::{self, ConfigManager};
use gantry::history::HistoryQuery;
use gantry::types::{
    Family, FamilySettings, MobileSettings, PublishConfig, PublishStatus, SteamSettings,
    WebSettings, parse_app_id,
};
use gantry::{ProcessExecutor, PublishOptions, Publisher, StateStore, format};

mod progress;

use progress::CliProgress;

#[derive(Parser, Debug)]
#[command(name = "gantry", version)]
#[command(about = "Publish pre-built game artifacts to Steam, web hosts, and mobile stores")]
struct Cli {
    /// Publisher family: steam, web, or mobile
    family: Family,

    /// Project directory that owns the publisher namespace
    #[arg(long, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the publisher namespace with a default target set.
    Init {
        /// Project identifier (defaults to the directory name)
        #[arg(long)]
        project_id: Option<String>,

        /// Steam App ID (steam family only)
        #[arg(long)]
        app_id: Option<String>,

        /// SteamCMD binary path (steam family only)
        #[arg(long, default_value = "steamcmd")]
        steamcmd_path: String,

        /// Steam branch to set live
        #[arg(long, default_value = "default")]
        branch: String,

        /// Steam login username
        #[arg(long)]
        username: Option<String>,

        /// App version (mobile family only)
        #[arg(long)]
        app_version: Option<String>,

        /// Per-target tool timeout (e.g. 10m, 600s)
        #[arg(long, default_value = "10m")]
        timeout: String,

        /// Keep at most this many runs on disk (0 keeps everything)
        #[arg(long, default_value_t = 0)]
        retention: u32,
    },

    /// Check the stored configuration against the family invariants.
    Validate,

    /// Inspect or mutate the target list.
    Targets {
        #[command(subcommand)]
        cmd: TargetCommands,
    },

    /// Execute a publish across the enabled targets.
    Publish {
        /// Synthesize results without invoking any vendor tool.
        #[arg(long)]
        dry_run: bool,

        /// Restrict to specific target keys (repeatable).
        #[arg(long = "target")]
        targets: Vec<String>,

        /// Steam branch override
        #[arg(long)]
        branch: Option<String>,

        /// Steam build description override
        #[arg(long = "desc")]
        build_description: Option<String>,

        /// Mobile app version override
        #[arg(long)]
        app_version: Option<String>,

        /// Recorded on the run document (defaults to "manual")
        #[arg(long)]
        triggered_by: Option<String>,
    },

    /// Flip the running flag so a new publish may start.
    Cancel,

    /// List past runs, newest first.
    History {
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Filter by run status (e.g. succeeded, failed)
        #[arg(long)]
        status: Option<String>,

        /// Filter to runs that attempted this target
        #[arg(long)]
        target: Option<String>,

        #[arg(long)]
        triggered_by: Option<String>,

        /// Case-insensitive substring search
        #[arg(long)]
        search: Option<String>,

        /// Emit the page as JSON instead of one-line summaries
        #[arg(long)]
        json: bool,
    },

    /// Print one run in full.
    Show {
        run_id: String,

        /// Emit the run document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Aggregate statistics over all runs.
    Stats {
        /// Emit the statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep the newest N runs and delete the rest.
    Prune {
        #[arg(long)]
        keep: usize,
    },

    /// Remove the publisher namespace entirely.
    Destroy {
        /// Required confirmation.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TargetCommands {
    /// List all configured targets.
    List,
    /// Enable a target by key.
    Enable { key: String },
    /// Disable a target by key.
    Disable { key: String },
    /// Remove a target by key.
    Remove { key: String },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let store = StateStore::new(&cli.project, cli.family);

    match cli.cmd {
        Commands::Init {
            project_id,
            app_id,
            steamcmd_path,
            branch,
            username,
            app_version,
            timeout,
            retention,
        } => {
            let settings = match cli.family {
                Family::Steam => {
                    let app_id = app_id.context("--app-id is required for the steam family")?;
                    let app_id = parse_app_id(&app_id).map_err(anyhow::Error::msg)?;
                    FamilySettings::Steam(SteamSettings {
                        app_id,
                        steam_cmd_path: steamcmd_path,
                        username,
                        branch,
                        build_description: None,
                        if_changed: false,
                        preview: false,
                    })
                }
                Family::Web => FamilySettings::Web(WebSettings::default()),
                Family::Mobile => {
                    let app_version =
                        app_version.context("--app-version is required for the mobile family")?;
                    FamilySettings::Mobile(MobileSettings { app_version })
                }
            };

            let project_id = match project_id {
                Some(id) => id,
                None => cli
                    .project
                    .canonicalize()
                    .unwrap_or_else(|_| cli.project.clone())
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "project".to_string()),
            };

            let config = PublishConfig {
                project_id,
                project_path: cli.project.clone(),
                settings,
                targets: config::default_targets(cli.family),
                upload_timeout: parse_timeout(&timeout)?,
                publish_retention: retention,
            };

            for warning in config::validate(&config).warnings {
                eprintln!("warning: {warning}");
            }

            if store.init(&config)? {
                println!(
                    "initialized {} publisher in {}",
                    cli.family,
                    store.namespace().display()
                );
            } else {
                println!(
                    "{} publisher already initialized in {}",
                    cli.family,
                    store.namespace().display()
                );
            }
        }

        Commands::Validate => {
            let manager = ConfigManager::new(store);
            let report = config::validate(&manager.config()?);
            for error in &report.errors {
                println!("error: {error}");
            }
            for warning in &report.warnings {
                println!("warning: {warning}");
            }
            if report.valid {
                println!("configuration is valid");
            } else {
                bail!("configuration is invalid ({} errors)", report.errors.len());
            }
        }

        Commands::Targets { cmd } => {
            let manager = ConfigManager::new(store);
            match cmd {
                TargetCommands::List => {
                    for target in manager.config()?.targets {
                        println!(
                            "{} {:<18} {:<16} {}",
                            if target.enabled { "*" } else { " " },
                            target.key,
                            target.spec.kind(),
                            target.artifact_directory,
                        );
                    }
                }
                TargetCommands::Enable { key } => match manager.set_target_enabled(&key, true)? {
                    Some(_) => println!("enabled {key}"),
                    None => bail!("no target with key {key:?}"),
                },
                TargetCommands::Disable { key } => match manager.set_target_enabled(&key, false)? {
                    Some(_) => println!("disabled {key}"),
                    None => bail!("no target with key {key:?}"),
                },
                TargetCommands::Remove { key } => {
                    if manager.remove_target(&key)? {
                        println!("removed {key}");
                    } else {
                        bail!("no target with key {key:?}");
                    }
                }
            }
        }

        Commands::Publish {
            dry_run,
            targets,
            branch,
            build_description,
            app_version,
            triggered_by,
        } => {
            let publisher = Publisher::new(store.clone());
            let manager = ConfigManager::new(store);
            let config = manager.config()?;

            let options = PublishOptions {
                targets: (!targets.is_empty()).then_some(targets),
                dry_run,
                branch,
                build_description,
                app_version,
                triggered_by,
                tags: Vec::new(),
                metadata: BTreeMap::new(),
            };

            let executor;
            let executor_ref: Option<&dyn gantry::Executor> = if dry_run {
                None
            } else {
                executor = ProcessExecutor::new(config.project_path.clone(), config.upload_timeout);
                Some(&executor)
            };

            let total = manager.enabled_targets()?.len();
            let mut progress = CliProgress::new(total);
            let run = publisher.execute(&options, executor_ref, &mut progress);
            progress.finish();
            let run = run?;

            println!("{}", format::summary(&run));
            if !run.is_successful() {
                for failed in run.failed_targets() {
                    println!(
                        "  {} failed: {}",
                        failed.target_key,
                        failed.error.as_deref().unwrap_or("unknown error")
                    );
                }
                bail!("publish finished with status {}", run.status);
            }
        }

        Commands::Cancel => {
            let publisher = Publisher::new(store);
            if publisher.cancel()? {
                println!("publish cancelled; note that an in-flight vendor process keeps running");
            } else {
                println!("no publish is running");
            }
        }

        Commands::History {
            limit,
            offset,
            status,
            target,
            triggered_by,
            search,
            json,
        } => {
            let publisher = Publisher::new(store);
            let status = status
                .map(|s| s.parse::<PublishStatus>().map_err(anyhow::Error::msg))
                .transpose()?;
            let page = publisher.history().list(&HistoryQuery {
                since: None,
                until: None,
                target_key: target,
                status,
                triggered_by,
                search,
                offset,
                limit,
            })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
                return Ok(());
            }

            for run in &page.runs {
                println!(
                    "{}  {}",
                    run.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    format::one_line(run)
                );
            }
            println!(
                "{} of {} runs for {}",
                page.runs.len(),
                page.total_count,
                page.project_id
            );
        }

        Commands::Show { run_id, json } => {
            let publisher = Publisher::new(store);
            match publisher.history().get_run(&run_id)? {
                Some(run) if json => println!("{}", serde_json::to_string_pretty(&run)?),
                Some(run) => print!("{}", format::full(&run)),
                None => bail!("no run with id {run_id:?}"),
            }
        }

        Commands::Stats { json } => {
            let publisher = Publisher::new(store);
            let Some(stats) = publisher.history().stats()? else {
                bail!("publisher is not initialized in {}", cli.project.display());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }
            println!("project:      {}", stats.project_id);
            println!("runs:         {}", stats.total_runs);
            println!("uploads:      {}", stats.total_uploads);
            println!(
                "statuses:     {} succeeded, {} failed, {} cancelled",
                stats.succeeded, stats.failed, stats.cancelled
            );
            println!("avg duration: {}ms", stats.average_duration_ms);
            for (key, target) in &stats.per_target {
                println!(
                    "  {:<18} {} attempts, {}% success",
                    key, target.attempts, target.success_rate
                );
            }
        }

        Commands::Prune { keep } => {
            let publisher = Publisher::new(store);
            let deleted = publisher.history().prune(keep)?;
            println!("deleted {deleted} runs");
        }

        Commands::Destroy { yes } => {
            if !yes {
                bail!("refusing to destroy without --yes");
            }
            if store.destroy()? {
                println!("removed {}", store.namespace().display());
            } else {
                println!("nothing to remove at {}", store.namespace().display());
            }
        }
    }

    Ok(())
}

fn parse_timeout(raw: &str) -> Result<Duration> {
    let timeout = humantime::parse_duration(raw)
        .with_context(|| format!("invalid timeout duration {raw:?}"))?;
    if timeout.is_zero() {
        bail!("timeout must be positive");
    }
    Ok(timeout)
}
