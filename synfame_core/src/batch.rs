/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::batch
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Scan a directory for `.app` packages and hold the batch in
    two lookups: by source filename and by embedded app ID.

  Security / Safety Notes:
    Reads files with user privileges; never follows into
    subdirectories.

  Dependencies:
    std::fs for the directory walk.

  Operational Scope:
    First stage of every upload or plan run.

  Revision History:
    2025-11-12 COD  Authored batch scanner.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic ordering for reproducible manifests
    - One bad file never aborts the scan of the rest
============================================================*/

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, SynfameError};
use crate::graph;
use crate::inspector;
use crate::logger::Logger;
use crate::package_info::PackageDescriptor;

/// A file the scan skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedPackage {
    pub file: String,
    pub reason: String,
}

/// Packages selected from one directory for one run.
#[derive(Debug, Default)]
pub struct UploadBatch {
    by_file: Vec<(String, PackageDescriptor)>,
    by_app_id: HashMap<String, String>,
    rejected: Vec<RejectedPackage>,
}

impl UploadBatch {
    /// Inspect every `.app` file directly inside `dir`, in filename order.
    pub fn scan(dir: &Path, logger: &Logger) -> Result<Self> {
        let mut batch = Self::default();
        for path in list_packages(dir)? {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            match inspector::load_package(&path) {
                Ok(package) => {
                    logger.debug(
                        "SCAN",
                        format!(
                            "{file_name}: {} {} by {} ({} dependencies)",
                            package.name,
                            package.version,
                            package.publisher,
                            package.dependencies.len()
                        ),
                    );
                    if let Err(err) = batch.insert(package) {
                        logger.warn("SCAN", err.to_string());
                        batch.reject(&file_name, &err);
                    }
                }
                Err(err) => {
                    logger.warn("SCAN", err.to_string());
                    batch.reject(&file_name, &err);
                }
            }
        }
        logger.info(
            "SCAN",
            format!(
                "{} package(s) accepted, {} rejected in {}",
                batch.len(),
                batch.rejected.len(),
                dir.display()
            ),
        );
        Ok(batch)
    }

    /// Build a batch from already inspected packages.
    pub fn from_packages(packages: Vec<PackageDescriptor>) -> Result<Self> {
        let mut batch = Self::default();
        for package in packages {
            batch.insert(package)?;
        }
        Ok(batch)
    }

    fn insert(&mut self, package: PackageDescriptor) -> Result<()> {
        let key = package.app_id.to_ascii_lowercase();
        if let Some(existing) = self.by_app_id.get(&key) {
            return Err(SynfameError::format(
                &package.file_name,
                format!("app {} already provided by {existing}", package.app_id),
            ));
        }
        self.by_app_id.insert(key, package.file_name.clone());
        self.by_file.push((package.file_name.clone(), package));
        Ok(())
    }

    fn reject(&mut self, file: &str, err: &SynfameError) {
        let reason = match err {
            SynfameError::Format { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        self.rejected.push(RejectedPackage {
            file: file.to_string(),
            reason,
        });
    }

    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }

    /// Files that could not be inspected.
    pub fn rejected(&self) -> &[RejectedPackage] {
        &self.rejected
    }

    /// Package loaded from `file`, if any.
    pub fn by_file(&self, file: &str) -> Option<&PackageDescriptor> {
        self.by_file
            .iter()
            .find(|(name, _)| name == file)
            .map(|(_, package)| package)
    }

    /// Package carrying `app_id`, if it is part of the batch.
    pub fn by_app_id(&self, app_id: &str) -> Option<&PackageDescriptor> {
        self.by_app_id
            .get(&app_id.to_ascii_lowercase())
            .and_then(|file| self.by_file(file))
    }

    /// Filenames in scan order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.by_file.iter().map(|(name, _)| name.as_str())
    }

    /// Consume the batch into dependency order.
    pub fn into_ordered(self) -> Result<Vec<PackageDescriptor>> {
        graph::sort(self.by_file.into_iter().map(|(_, package)| package).collect())
    }
}

fn list_packages(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|err| {
        SynfameError::Filesystem(format!("Failed to read directory {}: {err}", dir.display()))
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            SynfameError::Filesystem(format!("Failed to read directory {}: {err}", dir.display()))
        })?;
        let path = entry.path();
        let is_app = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("app"));
        if is_app && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
