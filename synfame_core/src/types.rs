/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::types
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Wire models for the app management API and the directory
    user lookup API.

  Security / Safety Notes:
    Pure data containers; no I/O performed in this module.

  Dependencies:
    serde for (de)serialization.

  Operational Scope:
    Shared by the HTTP client, validators, and CLI output.

  Revision History:
    2025-11-12 COD  Authored API wire models.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Lenient decoding of optional server fields
    - Clear data contracts between modules
============================================================*/

use serde::{Deserialize, Serialize};

/// OData collection envelope: `{ "value": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FameApp {
    pub id: String,
    pub publisher: String,
    pub publisher_aad_tenant_id: String,
    pub publisher_contact_email: String,
    pub storage_location: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FameAppCountry {
    pub country_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FameAppPrincipal {
    pub id: String,
    #[serde(rename = "type")]
    pub principal_type: String,
    pub aad_tenant_id: String,
    pub roles: Vec<String>,
    /// Display name resolved through the directory, not sent by the API.
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FameAppDependency {
    pub version: String,
    pub app_id: String,
    pub publisher: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FameAppVersion {
    pub version: String,
    pub app_id: String,
    pub country_code: String,
    pub package_id: String,
    pub publisher: String,
    pub name: String,
    pub uploaded_on: String,
    pub availability: String,
    pub status: String,
    pub dependencies: Vec<FameAppDependency>,
    pub major_version: u32,
    pub minor_version: u32,
    pub build_version: u32,
    pub revision_version: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FameAppEnvironment {
    pub aad_tenant_id: String,
    pub version: String,
    pub app_id: String,
    pub country_code: String,
    pub application_family: String,
    pub location_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub environment_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FameAppEnvironmentHotfix {
    pub id: String,
    pub app_id: String,
    pub country_code: String,
    pub environment_aad_tenant_id: String,
    pub environment_application_family: String,
    pub environment_name: String,
    pub environment_type: String,
    pub target_app_version: String,
    pub run_after: String,
    pub status: String,
}

/// Body for scheduling a hotfix of an app onto one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotfixScheduleBody {
    pub environment_aad_tenant_id: String,
    pub target_app_version: String,
    pub run_after: String,
    pub environment_application_family: String,
    pub environment_name: String,
    pub environment_type: String,
}

impl HotfixScheduleBody {
    pub fn new(
        environment: &FameAppEnvironment,
        version: &FameAppVersion,
        run_after: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            environment_aad_tenant_id: environment.aad_tenant_id.clone(),
            target_app_version: version.version.clone(),
            run_after: run_after.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            environment_application_family: environment.application_family.clone(),
            environment_name: environment.name.clone(),
            environment_type: environment.environment_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphUser {
    pub business_phones: Vec<String>,
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub job_title: Option<String>,
    pub mail: Option<String>,
    pub mobile_phone: Option<String>,
    pub office_location: Option<String>,
    pub preferred_language: Option<String>,
    pub surname: Option<String>,
    pub user_principal_name: Option<String>,
    pub id: String,
}

/// Principal to grant roles on an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub principal_type: String,
    pub principal_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_list_decodes_with_missing_fields() {
        let raw = r#"{"value":[{"version":"1.0.0.0","appId":"a","countryCode":"DE",
            "majorVersion":1,"dependencies":[{"appId":"b","version":"2.0.0.0"}]}]}"#;
        let list: ValueList<FameAppVersion> = serde_json::from_str(raw).unwrap();
        assert_eq!(list.value.len(), 1);
        assert_eq!(list.value[0].country_code, "DE");
        assert_eq!(list.value[0].dependencies[0].app_id, "b");
        assert_eq!(list.value[0].status, "");
    }

    #[test]
    fn empty_envelope_decodes_to_empty_list() {
        let list: ValueList<FameAppCountry> = serde_json::from_str("{}").unwrap();
        assert!(list.value.is_empty());
    }
}
