/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Fame error types so the upload pipeline,
    registry client, and CLI share diagnostics and exit codes.

  Security / Safety Notes:
    Error contexts never include bearer tokens or package
    contents; only app identities, filenames, and statuses.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for the binary entry point.

  Revision History:
    2024-11-04 COD  Established shared error definitions.
    2025-11-12 COD  Added package, dependency, and upload domains.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::fmt;
use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Fame operations.
pub type Result<T> = std::result::Result<T, SynfameError>;

/// App identity attached to precondition and upload failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRef {
    pub app_id: String,
    pub name: String,
}

impl AppRef {
    pub fn new(app_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AppRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.app_id)
    }
}

/// A single failed upload inside an aggregate failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub app: AppRef,
    pub file: String,
    pub detail: String,
}

/// Enumerates high-level error domains surfaced by Syn-Fame.
#[derive(Debug, Error)]
pub enum SynfameError {
    #[error("Package `{file}`: {reason}")]
    Format { file: String, reason: String },
    #[error("Dependency cycle between apps: {}", .apps.join(", "))]
    Cycle { apps: Vec<String> },
    #[error(
        "Apps not registered for country {country}: {}",
        join_apps(.missing)
    )]
    Precondition { country: String, missing: Vec<AppRef> },
    #[error("{} upload(s) failed: {}", .failed.len(), join_failures(.failed))]
    Upload { failed: Vec<FailedUpload> },
    #[error("Not signed in; provide an access token first")]
    NotAuthenticated,
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SynfameError {
    /// Build a package format error for the given file.
    pub fn format(file: impl Into<String>, reason: impl Into<String>) -> Self {
        SynfameError::Format {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SynfameError::Format { .. } => ExitCode::from(12),
            SynfameError::Cycle { .. } => ExitCode::from(13),
            SynfameError::Precondition { .. } => ExitCode::from(14),
            SynfameError::Upload { .. } => ExitCode::from(15),
            SynfameError::NotAuthenticated => ExitCode::from(16),
            SynfameError::Cancelled => ExitCode::from(17),
            SynfameError::Config(_) => ExitCode::from(20),
            SynfameError::Network(_) => ExitCode::from(30),
            SynfameError::Serialization(_) => ExitCode::from(31),
            SynfameError::Filesystem(_) => ExitCode::from(40),
            SynfameError::Io(_) => ExitCode::from(41),
        }
    }
}

fn join_apps(apps: &[AppRef]) -> String {
    apps.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_failures(failed: &[FailedUpload]) -> String {
    failed
        .iter()
        .map(|f| format!("{} from {}: {}", f.app, f.file, f.detail))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_message_names_every_app() {
        let err = SynfameError::Precondition {
            country: "DE".into(),
            missing: vec![
                AppRef::new("a-1", "Base"),
                AppRef::new("b-2", "Sales"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("country DE"));
        assert!(text.contains("Base (a-1)"));
        assert!(text.contains("Sales (b-2)"));
    }

    #[test]
    fn format_error_carries_filename() {
        let err = SynfameError::format("Base.app", "header mismatch");
        assert_eq!(err.to_string(), "Package `Base.app`: header mismatch");
    }

    #[test]
    fn exit_codes_are_distinct_per_category() {
        let cases = [
            (SynfameError::format("a.app", "bad"), 12),
            (SynfameError::Cycle { apps: Vec::new() }, 13),
            (SynfameError::NotAuthenticated, 16),
            (SynfameError::Cancelled, 17),
            (SynfameError::Config("x".into()), 20),
            (SynfameError::Network("x".into()), 30),
            (SynfameError::Io(std::io::Error::other("x")), 41),
        ];
        for (err, code) in cases {
            assert_eq!(err.exit_code(), ExitCode::from(code), "{err}");
        }
    }
}
