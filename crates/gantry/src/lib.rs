//! # Gantry
//!
//! Multi-target publishing of pre-built game artifacts to external
//! distribution services, driven by their vendor CLIs.
//!
//! Gantry manages three structurally identical publisher families — Steam
//! depots, static-site web hosts, and mobile app stores — each with durable
//! per-project configuration, single-run execution across its targets, a
//! queryable run history, and retention pruning.
//!
//! ## Features
//!
//! - **Durable state machine** — Config, mutable state, and immutable run
//!   documents live under a per-project namespace directory
//!   (`.steam-publisher/`, `.web-publisher/`, `.mobile-publisher/`) and are
//!   written atomically.
//! - **Single-run discipline** — A durable `isRunning` flag plus a lock file
//!   around the critical sections reject overlapping publishes outright; no
//!   queuing, no retry.
//! - **Pure argument builders** — Each target kind maps `(config, target,
//!   overrides)` to the exact vendor argv, so orchestration is testable
//!   without spawning anything.
//! - **Pluggable execution** — The [`executor::Executor`] trait separates
//!   orchestration from tool invocation; with no executor injected, a run
//!   degrades to dry-run synthesis.
//! - **History and statistics** — Runs are filterable, paginated, and
//!   aggregated per target, with retention keeping the newest N on disk.
//!
//! ## Pipeline
//!
//! The core flow is **init → configure → execute → inspect**:
//!
//! 1. [`state::StateStore::init`] creates the publisher namespace.
//! 2. [`config::ConfigManager`] validates and mutates the target list.
//! 3. [`runner::Publisher::execute`] iterates the enabled targets, invoking
//!    the injected executor (or synthesizing dry-run results), and persists
//!    one run document.
//! 4. [`history::HistoryStore`] lists, searches, and aggregates the runs;
//!    [`format`] renders them.
//!
//! ## Example
//!
//! ```ignore
//! use gantry::{Family, Publisher, PublishOptions, runner::NullProgress};
//!
//! let publisher = Publisher::open(project_dir, Family::Steam);
//! let run = publisher.execute(&PublishOptions::default(), None, &mut NullProgress)?;
//! assert!(run.is_successful());
//! ```
//!
//! ## Modules
//!
//! - [`types`] — Domain types: configs, targets, state, runs, statuses
//! - [`state`] — Namespace layout and atomic JSON persistence
//! - [`config`] — Validation, default targets, persisted config mutations
//! - [`args`] — Pure per-kind argv synthesis and the Steam VDF script
//! - [`process`] — External process execution with a hard deadline
//! - [`executor`] — Pluggable invocation backend and output scraping
//! - [`runner`] — Run coordination, status derivation, cancellation
//! - [`history`] — Run listing, filtering, statistics, pruning
//! - [`format`] — One-line, full, and summary run renderings
//! - [`lock`] — Lock file guarding the state critical sections
//! - [`error`] — Typed domain errors

pub mod args;
pub mod config;
pub mod error;
pub mod executor;
pub mod format;
pub mod history;
pub mod lock;
pub mod process;
pub mod runner;
pub mod state;
pub mod types;

pub use config::{ConfigManager, ConfigPatch, ValidationReport, validate};
pub use error::PublishError;
pub use executor::{ExecutionOutcome, Executor, ProcessExecutor};
pub use history::{HistoryPage, HistoryQuery, HistoryStore, PublishStats};
pub use runner::{NullProgress, ProgressSink, PublishOptions, Publisher};
pub use state::StateStore;
pub use types::{
    Family, PublishConfig, PublishRun, PublishState, PublishStatus, TargetEntry, TargetResult,
    TargetSpec,
};
