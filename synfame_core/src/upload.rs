/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::upload
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Upload an ordered, validated batch one package at a time,
    reporting progress and collecting a result per package.

  Security / Safety Notes:
    Package bytes are encoded in memory and handed to the
    registry; nothing is written to disk.

  Dependencies:
    base64 for package contents, tokio-util for cancellation.

  Operational Scope:
    Final stage of the upload pipeline.

  Revision History:
    2025-11-12 COD  Authored sequential upload driver.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Strictly sequential registry writes in dependency order
    - Per-item results; one failure never hides the rest
    - Cancellation honoured only between items
============================================================*/

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AppRef, FailedUpload, Result, SynfameError};
use crate::logger::Logger;
use crate::package_info::{AppVersion, PackageDescriptor};
use crate::registry::{AppRegistry, Availability, NewVersionBody};
use crate::types::FameAppVersion;

/// Identity of the package about to be, or just, uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub index: usize,
    pub total: usize,
    pub app_id: String,
    pub name: String,
    pub version: AppVersion,
}

/// Receives per-item progress from the driver.
pub trait ProgressSink: Send + Sync {
    fn started(&self, progress: &UploadProgress);
    fn finished(&self, progress: &UploadProgress, result: &UploadResult);
}

impl ProgressSink for Logger {
    fn started(&self, progress: &UploadProgress) {
        self.info(
            "UPLOAD",
            format!(
                "[{}/{}] {} {} ({})",
                progress.index + 1,
                progress.total,
                progress.name,
                progress.version,
                progress.app_id
            ),
        );
    }

    fn finished(&self, progress: &UploadProgress, result: &UploadResult) {
        match &result.outcome {
            UploadOutcome::Uploaded { .. } => self.info(
                "UPLOAD",
                format!("{} {} uploaded", progress.name, progress.version),
            ),
            UploadOutcome::Failed { detail } => self.error(
                "UPLOAD",
                format!("{} {} failed: {detail}", progress.name, progress.version),
            ),
            UploadOutcome::Skipped { reason } => self.warn(
                "UPLOAD",
                format!("{} {} skipped: {reason}", progress.name, progress.version),
            ),
        }
    }
}

/// Driver behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub availability: Availability,
    /// Stop after the first failed upload; the rest are marked skipped.
    pub halt_on_error: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            availability: Availability::Available,
            halt_on_error: false,
        }
    }
}

/// What happened to one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UploadOutcome {
    Uploaded { record: FameAppVersion },
    Failed { detail: String },
    Skipped { reason: String },
}

/// Per-package result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub app_id: String,
    pub name: String,
    pub version: AppVersion,
    pub file_name: String,
    pub outcome: UploadOutcome,
}

impl UploadResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, UploadOutcome::Uploaded { .. })
    }
}

/// Aggregate of one upload run, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub country_code: String,
    pub results: Vec<UploadResult>,
    pub cancelled: bool,
}

impl UploadReport {
    pub fn uploaded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::Skipped { .. }))
            .count()
    }

    /// Turn failures into an error; cancellation wins over failures.
    pub fn into_result(self) -> Result<Self> {
        if self.cancelled {
            return Err(SynfameError::Cancelled);
        }
        let failed: Vec<FailedUpload> = self
            .results
            .iter()
            .filter_map(|result| match &result.outcome {
                UploadOutcome::Failed { detail } => Some(FailedUpload {
                    app: AppRef::new(&result.app_id, &result.name),
                    file: result.file_name.clone(),
                    detail: detail.clone(),
                }),
                _ => None,
            })
            .collect();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(SynfameError::Upload { failed })
        }
    }
}

/// Upload `ordered` sequentially into `country_code`.
pub async fn upload<R>(
    ordered: &[PackageDescriptor],
    country_code: &str,
    registry: &R,
    sink: &dyn ProgressSink,
    options: UploadOptions,
    cancel: &CancellationToken,
) -> Result<UploadReport>
where
    R: AppRegistry + ?Sized,
{
    if !options.availability.allowed_on_upload() {
        return Err(SynfameError::Config(format!(
            "Not allowed value for initial availability: {}",
            options.availability
        )));
    }

    let total = ordered.len();
    let mut report = UploadReport {
        country_code: country_code.to_string(),
        results: Vec::with_capacity(total),
        cancelled: false,
    };
    let mut halted: Option<String> = None;

    for (index, package) in ordered.iter().enumerate() {
        let progress = UploadProgress {
            index,
            total,
            app_id: package.app_id.clone(),
            name: package.name.clone(),
            version: package.version,
        };

        let skip_reason = if cancel.is_cancelled() {
            report.cancelled = true;
            Some("run cancelled".to_string())
        } else {
            halted.clone()
        };

        let outcome = match skip_reason {
            Some(reason) => UploadOutcome::Skipped { reason },
            None => {
                sink.started(&progress);
                let body = NewVersionBody {
                    initial_availability: options.availability,
                    package_contents: STANDARD.encode(package.bytes()),
                };
                match registry
                    .add_version(&package.app_id, country_code, &body)
                    .await
                {
                    Ok(record) => UploadOutcome::Uploaded { record },
                    Err(err) => {
                        if options.halt_on_error {
                            halted = Some(format!("halted after {} failed", package.name));
                        }
                        UploadOutcome::Failed {
                            detail: err.to_string(),
                        }
                    }
                }
            }
        };

        let result = UploadResult {
            app_id: package.app_id.clone(),
            name: package.name.clone(),
            version: package.version,
            file_name: package.file_name.clone(),
            outcome,
        };
        sink.finished(&progress, &result);
        report.results.push(result);
    }

    Ok(report)
}
