/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::pipeline
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Run the batch upload end to end: authentication gate,
    directory scan, dependency ordering, precondition check,
    and sequential upload.

  Security / Safety Notes:
    Nothing uploads unless every package passed the
    precondition check.

  Dependencies:
    tokio-util for cancellation.

  Operational Scope:
    Called by the CLI `upload` and `plan` commands, or by any
    embedding caller holding a registry client.

  Revision History:
    2025-11-12 COD  Authored upload pipeline.
============================================================*/

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::batch::{RejectedPackage, UploadBatch};
use crate::error::{Result, SynfameError};
use crate::logger::Logger;
use crate::package_info::PackageDescriptor;
use crate::registry::AppRegistry;
use crate::upload::{self, ProgressSink, UploadOptions, UploadReport};
use crate::validate;

/// Ordered packages plus the files that could not be read.
#[derive(Debug)]
pub struct UploadPlan {
    pub ordered: Vec<PackageDescriptor>,
    pub rejected: Vec<RejectedPackage>,
}

/// Report of a run plus the files left out of it.
#[derive(Debug)]
pub struct RunOutcome {
    pub rejected: Vec<RejectedPackage>,
    pub report: UploadReport,
}

/// One configured upload pipeline.
pub struct Pipeline<'a, R: AppRegistry + ?Sized> {
    registry: &'a R,
    logger: &'a Logger,
    sink: &'a dyn ProgressSink,
    options: UploadOptions,
}

impl<'a, R: AppRegistry + ?Sized> Pipeline<'a, R> {
    /// Progress goes to the logger unless `with_sink` overrides it.
    pub fn new(registry: &'a R, logger: &'a Logger, options: UploadOptions) -> Self {
        Self {
            registry,
            logger,
            sink: logger,
            options,
        }
    }

    pub fn with_sink(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.sink = sink;
        self
    }

    /// Scan and order a directory without contacting the registry.
    pub fn plan(&self, dir: &Path) -> Result<UploadPlan> {
        let batch = UploadBatch::scan(dir, self.logger)?;
        let rejected = batch.rejected().to_vec();
        let ordered = batch.into_ordered()?;
        self.logger.info(
            "ORDER",
            format!(
                "Upload order: {}",
                ordered
                    .iter()
                    .map(|p| format!("{} {}", p.name, p.version))
                    .collect::<Vec<_>>()
                    .join(" -> ")
            ),
        );
        Ok(UploadPlan { ordered, rejected })
    }

    /// Upload every package in `dir` into `country_code`.
    pub async fn run(
        &self,
        dir: &Path,
        country_code: &str,
        cancel: &CancellationToken,
    ) -> Result<UploadReport> {
        Ok(self.run_detailed(dir, country_code, cancel).await?.report)
    }

    /// Like `run`, also returning the files the scan rejected.
    pub async fn run_detailed(
        &self,
        dir: &Path,
        country_code: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        if !self.registry.is_authenticated() {
            return Err(SynfameError::NotAuthenticated);
        }
        let country = normalize_country(country_code)?;

        let UploadPlan { ordered, rejected } = self.plan(dir)?;
        if ordered.is_empty() {
            self.logger.warn(
                "EMPTY",
                format!("No uploadable packages found in {}", dir.display()),
            );
            return Ok(RunOutcome {
                rejected,
                report: UploadReport {
                    country_code: country,
                    ..UploadReport::default()
                },
            });
        }

        validate::validate(&ordered, &country, self.registry, self.logger).await?;
        self.logger.info(
            "PRECHECK",
            format!("All {} app(s) registered in {country}", ordered.len()),
        );

        let report = upload::upload(
            &ordered,
            &country,
            self.registry,
            self.sink,
            self.options,
            cancel,
        )
        .await?;
        self.logger.info(
            "SUMMARY",
            format!(
                "uploaded={} failed={} skipped={}",
                report.uploaded(),
                report.failed(),
                report.skipped()
            ),
        );
        Ok(RunOutcome { rejected, report })
    }
}

/// Trim and upper-case a country code; only emptiness is rejected.
pub fn normalize_country(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SynfameError::Config("Country code is required".into()));
    }
    Ok(trimmed.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_codes_are_trimmed_and_uppercased() {
        assert_eq!(normalize_country(" de ").unwrap(), "DE");
        assert!(normalize_country("   ").is_err());
    }
}
