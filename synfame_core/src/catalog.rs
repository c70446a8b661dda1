/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::catalog
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Validate an apps manifest (the JSON document listing apps
    offered to tenants) against its own required fields and
    against versions present in the registry.

  Security / Safety Notes:
    Read-only. Link reachability checks are opt-in.

  Dependencies:
    serde_json for the document, reqwest for link checks.

  Operational Scope:
    Backs the CLI `validate-manifest` command.

  Revision History:
    2025-11-12 COD  Authored apps manifest validation.
============================================================*/

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::api::version_filter;
use crate::error::{Result, SynfameError};
use crate::registry::AppRegistry;

/// The apps manifest document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppsManifest {
    pub links: BTreeMap<String, String>,
    pub apps: Vec<CatalogApp>,
}

/// One app entry in the manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogApp {
    pub id: Option<String>,
    pub initial_version: Option<String>,
    pub name: Option<String>,
    pub publisher: Option<String>,
    pub allowed_updates: Option<String>,
    pub publish_only: Option<bool>,
    pub block_uninstall: Option<bool>,
}

impl CatalogApp {
    fn identifier(&self) -> String {
        format!(
            "id={}, name={}",
            self.id.as_deref().unwrap_or("?"),
            self.name.as_deref().unwrap_or("?")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Links,
    Apps,
}

impl Section {
    fn title(self) -> &'static str {
        match self {
            Section::Links => "Links",
            Section::Apps => "Apps",
        }
    }
}

/// A single finding, attached to the entry it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub section: Section,
    /// Link name or app entry index.
    pub entry: String,
    pub message: String,
}

/// Findings of one validation run.
#[derive(Debug, Clone, Default)]
pub struct CatalogReport {
    pub problems: Vec<Problem>,
}

impl CatalogReport {
    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    /// Plain-text listing grouped by section.
    pub fn render(&self) -> String {
        if !self.has_problems() {
            return "No problems found.\n".into();
        }
        let mut out = String::new();
        for section in [Section::Links, Section::Apps] {
            let entries: Vec<&Problem> = self
                .problems
                .iter()
                .filter(|p| p.section == section)
                .collect();
            if entries.is_empty() {
                continue;
            }
            let _ = writeln!(out, "== {} ==", section.title());
            for problem in entries {
                let _ = writeln!(out, "  [{}] {}", problem.entry, problem.message);
            }
        }
        out
    }

    fn push(&mut self, section: Section, entry: impl Into<String>, message: impl Into<String>) {
        self.problems.push(Problem {
            section,
            entry: entry.into(),
            message: message.into(),
        });
    }
}

/// Knobs for one validation run.
pub struct CatalogCheck<'a, R: AppRegistry + ?Sized> {
    pub registry: &'a R,
    pub country_code: &'a str,
    /// When set, every link is fetched once.
    pub http: Option<&'a reqwest::Client>,
}

pub fn parse(raw: &str) -> Result<AppsManifest> {
    serde_json::from_str(raw)
        .map_err(|err| SynfameError::Serialization(format!("Invalid apps manifest: {err}")))
}

pub fn load(path: &Path) -> Result<AppsManifest> {
    let raw = fs::read_to_string(path).map_err(|err| {
        SynfameError::Filesystem(format!("Failed to read {}: {err}", path.display()))
    })?;
    parse(&raw)
}

/// First `major[.minor]` run of digits in `raw`; a missing minor is zero.
pub fn coerce_major_minor(raw: &str) -> Option<(u32, u32)> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    let mut parts = raw[start..].split('.');
    let leading = |part: &str| -> Option<u32> {
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    };
    let major = leading(parts.next()?)?;
    let minor = parts.next().and_then(leading).unwrap_or(0);
    Some((major, minor))
}

/// Non-blank value of an optional field.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// Run every check against `manifest`.
pub async fn validate<R: AppRegistry + ?Sized>(
    manifest: &AppsManifest,
    check: &CatalogCheck<'_, R>,
) -> CatalogReport {
    let mut report = CatalogReport::default();

    for (name, link) in &manifest.links {
        if link.contains("FIX") {
            report.push(
                Section::Links,
                name,
                format!("{name} seems to contain a placeholder."),
            );
        }
        if let Some(http) = check.http {
            match http.get(link).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => report.push(
                    Section::Links,
                    name,
                    format!("{name} couldn't be reached ({}).", response.status()),
                ),
                Err(err) => report.push(
                    Section::Links,
                    name,
                    format!("{name} couldn't be reached ({err})."),
                ),
            }
        }
    }

    for (index, app) in manifest.apps.iter().enumerate() {
        let entry = index.to_string();
        let identifier = app.identifier();
        let required = [
            ("id", present(&app.id)),
            ("initialVersion", present(&app.initial_version)),
            ("name", present(&app.name)),
            ("publisher", present(&app.publisher)),
            ("allowedUpdates", present(&app.allowed_updates)),
        ];
        for (field, value) in required {
            if value.is_none() {
                report.push(
                    Section::Apps,
                    &entry,
                    format!("\"{field}\" is missing ({identifier})"),
                );
            }
        }

        let (Some(id), Some(version)) = (present(&app.id), present(&app.initial_version)) else {
            continue;
        };
        let Some((major, minor)) = coerce_major_minor(version) else {
            report.push(
                Section::Apps,
                &entry,
                format!("Couldn't parse version `{version}` ({identifier})"),
            );
            continue;
        };
        let filter = version_filter(major, minor);
        match check
            .registry
            .list_versions(id, check.country_code, Some(&filter))
            .await
        {
            Ok(found) if !found.is_empty() => {}
            Ok(_) => report.push(
                Section::Apps,
                &entry,
                format!("Couldn't find version in the registry ({identifier})"),
            ),
            Err(_) => report.push(
                Section::Apps,
                &entry,
                format!("Couldn't find version in the registry (HTTP error) ({identifier})"),
            ),
        }
    }

    report
}
