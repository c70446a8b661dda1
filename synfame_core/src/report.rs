/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::report
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Build and persist the JSON report of an upload run.

  Security / Safety Notes:
    Reports are written to operator-controlled paths and never
    contain package contents or credentials.

  Dependencies:
    serde for JSON serialization, chrono for timestamps.

  Operational Scope:
    Written by the CLI after every `upload` run, including
    failed and cancelled ones.

  Revision History:
    2024-11-04 COD  Authored manifest builder.
    2025-11-12 COD  Reworked into the upload run report.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Results kept in upload order for audit
    - Rich metadata for audit and observability
============================================================*/

use std::fs::File;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::batch::RejectedPackage;
use crate::error::{Result, SynfameError};
use crate::upload::UploadReport;

/// Full report document.
#[derive(Debug, Serialize)]
pub struct ReportDocument {
    pub metadata: ReportMetadata,
    pub rejected: Vec<RejectedPackage>,
    pub run: UploadReport,
}

/// Metadata block describing report context.
#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub generated_by: String,
    pub country_code: String,
    pub total_packages: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rejected_files: usize,
    pub cancelled: bool,
}

impl ReportDocument {
    pub fn new(run: UploadReport, rejected: Vec<RejectedPackage>) -> Self {
        let metadata = ReportMetadata {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            generated_by: "synfame_core".to_string(),
            country_code: run.country_code.clone(),
            total_packages: run.results.len(),
            uploaded: run.uploaded(),
            failed: run.failed(),
            skipped: run.skipped(),
            rejected_files: rejected.len(),
            cancelled: run.cancelled,
        };
        Self {
            metadata,
            rejected,
            run,
        }
    }
}

/// Persist the report to the given path.
pub fn write_report(document: &ReportDocument, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynfameError::Filesystem(format!(
                "Failed to create report directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let file = File::create(path).map_err(|err| {
        SynfameError::Filesystem(format!(
            "Failed to create report file {}: {err}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, document).map_err(|err| {
        SynfameError::Filesystem(format!("Failed to write report {}: {err}", path.display()))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_info::AppVersion;
    use crate::upload::{UploadOutcome, UploadResult};

    #[test]
    fn report_counts_and_serializes_outcomes() {
        let run = UploadReport {
            country_code: "DE".into(),
            results: vec![
                UploadResult {
                    app_id: "a".into(),
                    name: "Base".into(),
                    version: AppVersion::new(1, 0, 0, 0),
                    file_name: "Base.app".into(),
                    outcome: UploadOutcome::Failed {
                        detail: "status 500".into(),
                    },
                },
                UploadResult {
                    app_id: "b".into(),
                    name: "Ext".into(),
                    version: AppVersion::new(2, 1, 0, 0),
                    file_name: "Ext.app".into(),
                    outcome: UploadOutcome::Skipped {
                        reason: "run cancelled".into(),
                    },
                },
            ],
            cancelled: true,
        };
        let rejected = vec![RejectedPackage {
            file: "junk.app".into(),
            reason: "bad header".into(),
        }];
        let document = ReportDocument::new(run, rejected);
        assert_eq!(document.metadata.failed, 1);
        assert_eq!(document.metadata.skipped, 1);
        assert_eq!(document.metadata.rejected_files, 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        write_report(&document, &path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["metadata"]["country_code"], "DE");
        assert_eq!(written["run"]["results"][0]["outcome"]["status"], "failed");
        assert_eq!(written["run"]["results"][1]["version"], "2.1.0.0");
        assert_eq!(written["rejected"][0]["file"], "junk.app");
    }
}
