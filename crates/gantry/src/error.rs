//! Typed domain errors, surfaced through `anyhow` at the API boundary.
//!
//! Validation problems are never errors (they come back as a structured
//! [`crate::config::ValidationReport`]); unknown-target lookups are
//! `None`/`false` sentinels; executor failures live inside the target
//! result. What remains here is the small set of conditions that abort an
//! operation outright.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    /// An operation other than `init`/`validate` was called before `init`.
    #[error("publisher is not initialized at {}; run init first", .0.display())]
    NotInitialized(PathBuf),

    /// `execute` was called while a publish is already running.
    #[error("a publish is already running for project {project_id} (current target: {current})")]
    AlreadyRunning {
        project_id: String,
        current: String,
    },

    /// The on-disk lock could not be acquired.
    #[error("publish lock held by pid {pid} on {hostname} since {since}")]
    LockHeld {
        pid: u32,
        hostname: String,
        since: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_condition() {
        let err = PublishError::NotInitialized(PathBuf::from("/p/.steam-publisher"));
        assert!(err.to_string().contains("not initialized"));

        let err = PublishError::AlreadyRunning {
            project_id: "proj".to_string(),
            current: "1000001".to_string(),
        };
        assert!(err.to_string().contains("already running"));
        assert!(err.to_string().contains("proj"));
    }
}
