/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::registry
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Define the registry seam the upload pipeline talks to:
    authentication gate, version listing, and version upload.

  Security / Safety Notes:
    Implementations own credentials; the pipeline never sees a
    token, only the authenticated/not-authenticated gate.

  Dependencies:
    async-trait for object-safe async methods.

  Operational Scope:
    Implemented by the HTTP client and by test doubles.

  Revision History:
    2025-11-12 COD  Introduced registry trait.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Narrow interfaces between pipeline and transport
============================================================*/

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynfameError};
use crate::types::FameAppVersion;

/// Availability requested for a newly added version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Availability {
    #[default]
    Available,
    Preview,
    Deprecated,
}

impl Availability {
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Available => "Available",
            Availability::Preview => "Preview",
            Availability::Deprecated => "Deprecated",
        }
    }

    /// Only `Available` and `Preview` may be requested on upload.
    pub fn allowed_on_upload(self) -> bool {
        matches!(self, Availability::Available | Availability::Preview)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = SynfameError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Availability::Available),
            "preview" => Ok(Availability::Preview),
            "deprecated" => Ok(Availability::Deprecated),
            other => Err(SynfameError::Config(format!(
                "Not allowed value for availability: `{other}`"
            ))),
        }
    }
}

/// Body of the "add version" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVersionBody {
    pub initial_availability: Availability,
    pub package_contents: String,
}

/// Operations the upload pipeline needs from the app registry.
#[async_trait]
pub trait AppRegistry: Send + Sync {
    /// Whether a usable credential is present.
    fn is_authenticated(&self) -> bool;

    /// List registered versions of an app in a country.
    async fn list_versions(
        &self,
        app_id: &str,
        country_code: &str,
        filter: Option<&str>,
    ) -> Result<Vec<FameAppVersion>>;

    /// Add a new version of an app in a country.
    async fn add_version(
        &self,
        app_id: &str,
        country_code: &str,
        body: &NewVersionBody,
    ) -> Result<FameAppVersion>;
}
