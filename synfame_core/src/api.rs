/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::api
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    HTTP client for the app management API (apps, countries,
    principals, versions, environments, environment hotfixes)
    and the directory user lookup API.

  Security / Safety Notes:
    Bearer tokens are attached per request and never logged or
    echoed in errors. Write operations are sent exactly once.

  Dependencies:
    reqwest for HTTP, serde for payloads, urlencoding for path
    segments and OData filters.

  Operational Scope:
    Implements the registry seam for the upload pipeline and
    backs the CLI browse commands.

  Revision History:
    2024-11-04 COD  Implemented asynchronous RPC client.
    2025-11-12 COD  Re-targeted at the app management API.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Defensive retry logic with exponential backoff on reads
    - Structured response parsing with explicit error paths
    - Configurable timeouts
============================================================*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::time::sleep;
use urlencoding::encode;

use crate::cache::ExpiringCache;
use crate::config::ApiConfig;
use crate::error::{Result, SynfameError};
use crate::registry::{AppRegistry, Availability, NewVersionBody};
use crate::types::{
    FameApp, FameAppCountry, FameAppEnvironment, FameAppEnvironmentHotfix, FameAppPrincipal,
    FameAppVersion, GraphUser, HotfixScheduleBody, Principal, ValueList,
};

/// Cache key of the app ID to display name map.
pub const APP_NAMES_KEY: &str = "app_names";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Api {
    Apps,
    Graph,
}

/// Change requested on an existing version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionUpdate {
    Availability(Availability),
    DependencyCompatibility {
        dependency_app_id: String,
        incompatible_from_version: String,
    },
}

impl VersionUpdate {
    fn body(&self) -> Value {
        match self {
            VersionUpdate::Availability(availability) => json!({ "availability": availability }),
            VersionUpdate::DependencyCompatibility {
                dependency_app_id,
                incompatible_from_version,
            } => json!({
                "appId": dependency_app_id,
                "incompatibleFromVersion": incompatible_from_version,
            }),
        }
    }
}

/// Client for the app management and directory APIs.
pub struct FameClient {
    client: reqwest::Client,
    apps_url: String,
    graph_url: String,
    tenant_id: Option<String>,
    token: Option<String>,
    graph_token: Option<String>,
    max_retries: usize,
    cache: Mutex<ExpiringCache>,
    users: Mutex<HashMap<String, GraphUser>>,
}

impl FameClient {
    /// Construct a new client from configuration and resolved tokens.
    pub fn new(
        config: &ApiConfig,
        token: Option<String>,
        graph_token: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(concat!("Syn-Fame-Core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| SynfameError::Network(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            apps_url: config.base_url.trim_end_matches('/').to_string(),
            graph_url: config.graph_url.trim_end_matches('/').to_string(),
            tenant_id: config.tenant_id.clone(),
            token,
            graph_token,
            max_retries: config.max_retries.max(1),
            cache: Mutex::new(ExpiringCache::new()),
            users: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the client cache, e.g. with a previously seeded one.
    pub fn with_cache(mut self, cache: ExpiringCache) -> Self {
        self.cache = Mutex::new(cache);
        self
    }

    // ---- apps -------------------------------------------------------

    /// List apps, filling in display names from the cached name map.
    pub async fn list_apps(&self) -> Result<Vec<FameApp>> {
        let mut apps: Vec<FameApp> = self.get_list(Api::Apps, "").await?;
        let names = self.app_names();
        for app in apps.iter_mut() {
            if app.name.is_empty() {
                if let Some(name) = names.get(&app.id) {
                    app.name = name.clone();
                }
            }
        }
        Ok(apps)
    }

    pub async fn app_details(&self, app_id: &str) -> Result<FameApp> {
        self.get_json(Api::Apps, &format!("/{}", encode(app_id)))
            .await
    }

    /// Cached app ID to name map.
    pub fn app_names(&self) -> HashMap<String, String> {
        self.with_cache_mut(|cache| cache.get(APP_NAMES_KEY))
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// Merge names into the cached map; these entries do not expire.
    pub fn remember_app_names(&self, names: &HashMap<String, String>) {
        let mut merged = self.app_names();
        merged.extend(names.iter().map(|(k, v)| (k.clone(), v.clone())));
        let value = serde_json::to_value(merged).unwrap_or(Value::Null);
        self.with_cache_mut(|cache| cache.init([(APP_NAMES_KEY.to_string(), value)]));
    }

    /// Learn app names from the first named version in any country.
    pub async fn resolve_app_names(&self, apps: &[FameApp]) -> Result<HashMap<String, String>> {
        let mut names = HashMap::new();
        for app in apps {
            for country in self.list_countries(&app.id).await? {
                let versions = self
                    .list_versions(&app.id, &country.country_code, None)
                    .await?;
                if let Some(named) = versions.iter().rev().find(|v| !v.name.is_empty()) {
                    names.insert(app.id.clone(), named.name.clone());
                    break;
                }
            }
        }
        self.remember_app_names(&names);
        Ok(names)
    }

    // ---- countries --------------------------------------------------

    pub async fn list_countries(&self, app_id: &str) -> Result<Vec<FameAppCountry>> {
        self.get_list(Api::Apps, &format!("/{}/countries", encode(app_id)))
            .await
    }

    pub async fn add_country(&self, app_id: &str, country_code: &str) -> Result<FameAppCountry> {
        let path = format!("/{}/countries/{}", encode(app_id), encode(country_code));
        self.send_json(
            Method::PATCH,
            &path,
            &json!({ "countryCode": country_code }),
        )
        .await
    }

    // ---- principals -------------------------------------------------

    /// List principals with display names resolved through the directory.
    pub async fn list_principals(&self, app_id: &str) -> Result<Vec<FameAppPrincipal>> {
        let mut principals: Vec<FameAppPrincipal> = self
            .get_list(Api::Apps, &format!("/{}/principals", encode(app_id)))
            .await?;
        for principal in principals.iter_mut() {
            if let Some(name) = self.user_display_name(&principal.id).await {
                principal.name = name;
            }
        }
        Ok(principals)
    }

    /// Add or update a principal; the endpoint upserts.
    pub async fn put_principal(
        &self,
        app_id: &str,
        principal: &Principal,
        roles: &[String],
    ) -> Result<FameAppPrincipal> {
        let body = principal_body(principal, roles, self.tenant_id.as_deref())?;
        let path = format!(
            "/{}/principals/{}",
            encode(app_id),
            encode(&principal.principal_id)
        );
        self.send_json(Method::PATCH, &path, &body).await
    }

    pub async fn remove_principal(&self, app_id: &str, principal_id: &str) -> Result<()> {
        let path = format!("/{}/principals/{}", encode(app_id), encode(principal_id));
        self.send(Api::Apps, Method::DELETE, &path, None).await?;
        Ok(())
    }

    // ---- versions ---------------------------------------------------

    /// Versions from the cache when present, otherwise fetched.
    pub async fn cached_versions(
        &self,
        app_id: &str,
        country_code: &str,
        filter: Option<&str>,
    ) -> Result<Vec<FameAppVersion>> {
        let key = versions_key(app_id, country_code, filter);
        if let Some(value) = self.with_cache_mut(|cache| cache.get(&key)) {
            if let Ok(versions) = serde_json::from_value(value) {
                return Ok(versions);
            }
        }
        self.list_versions(app_id, country_code, filter).await
    }

    pub async fn version_details(
        &self,
        app_id: &str,
        country_code: &str,
        version: &str,
    ) -> Result<FameAppVersion> {
        self.get_json(Api::Apps, &version_path(app_id, country_code, Some(version)))
            .await
    }

    pub async fn update_version(
        &self,
        app_id: &str,
        country_code: &str,
        version: &str,
        update: &VersionUpdate,
    ) -> Result<FameAppVersion> {
        let path = version_path(app_id, country_code, Some(version));
        let result = self.send_json(Method::PATCH, &path, &update.body()).await;
        self.forget_versions(app_id, country_code);
        result
    }

    /// Download a version's package into `target_dir` as `{file_stem}.app`.
    pub async fn download_version(
        &self,
        app_id: &str,
        country_code: &str,
        version: &str,
        target_dir: &Path,
        file_stem: Option<&str>,
    ) -> Result<PathBuf> {
        let path = format!(
            "{}/getPackageContents",
            version_path(app_id, country_code, Some(version))
        );
        let response = self.send(Api::Apps, Method::POST, &path, None).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| SynfameError::Network(format!("Failed to read package body: {err}")))?;
        let stem = file_stem
            .map(str::to_string)
            .unwrap_or_else(|| format!("{app_id}-{version}"));
        tokio::fs::create_dir_all(target_dir).await.map_err(|err| {
            SynfameError::Filesystem(format!(
                "Failed to create {}: {err}",
                target_dir.display()
            ))
        })?;
        let target = target_dir.join(format!("{stem}.app"));
        tokio::fs::write(&target, &bytes).await.map_err(|err| {
            SynfameError::Filesystem(format!("Failed to write {}: {err}", target.display()))
        })?;
        Ok(target)
    }

    // ---- environments -----------------------------------------------

    pub async fn list_environments(
        &self,
        app_id: &str,
        country_code: &str,
        filter: Option<&str>,
    ) -> Result<Vec<FameAppEnvironment>> {
        let path = with_filter(
            format!(
                "/{}/countries/{}/environments",
                encode(app_id),
                encode(country_code)
            ),
            filter,
        );
        self.get_list(Api::Apps, &path).await
    }

    // ---- environment hotfixes ---------------------------------------

    pub async fn list_hotfixes(
        &self,
        app_id: &str,
        country_code: &str,
        environment_tenant_id: Option<&str>,
        environment_name: Option<&str>,
    ) -> Result<Vec<FameAppEnvironmentHotfix>> {
        let filter = hotfix_filter(environment_tenant_id, environment_name);
        let path = with_filter(hotfix_path(app_id, country_code, None), filter.as_deref());
        self.get_list(Api::Apps, &path).await
    }

    pub async fn hotfix_details(
        &self,
        app_id: &str,
        country_code: &str,
        id: &str,
    ) -> Result<FameAppEnvironmentHotfix> {
        self.get_json(Api::Apps, &hotfix_path(app_id, country_code, Some(id)))
            .await
    }

    pub async fn schedule_hotfix(
        &self,
        app_id: &str,
        country_code: &str,
        body: &HotfixScheduleBody,
    ) -> Result<FameAppEnvironmentHotfix> {
        let body = serde_json::to_value(body)
            .map_err(|err| SynfameError::Serialization(format!("Hotfix body: {err}")))?;
        self.send_json(Method::POST, &hotfix_path(app_id, country_code, None), &body)
            .await
    }

    pub async fn update_hotfix(
        &self,
        app_id: &str,
        country_code: &str,
        id: &str,
        body: &Value,
    ) -> Result<FameAppEnvironmentHotfix> {
        self.send_json(Method::PATCH, &hotfix_path(app_id, country_code, Some(id)), body)
            .await
    }

    // ---- directory users --------------------------------------------

    pub async fn list_users(&self, name_prefix: Option<&str>) -> Result<Vec<GraphUser>> {
        let filter = name_prefix
            .filter(|prefix| !prefix.trim().is_empty())
            .map(|prefix| format!("startswith(displayName,'{}')", prefix.replace('\'', "''")));
        let path = with_filter("/users".to_string(), filter.as_deref());
        self.get_list(Api::Graph, &path).await
    }

    pub async fn user_details(&self, user_id: &str) -> Result<GraphUser> {
        let user: GraphUser = self
            .get_json(Api::Graph, &format!("/users/{}", encode(user_id)))
            .await?;
        if let Ok(mut users) = self.users.lock() {
            users.insert(user_id.to_string(), user.clone());
        }
        Ok(user)
    }

    /// Display name of a directory user, memoised per client.
    pub async fn user_display_name(&self, user_id: &str) -> Option<String> {
        let known = self
            .users
            .lock()
            .ok()
            .and_then(|users| users.get(user_id).cloned());
        let user = match known {
            Some(user) => user,
            None => self.user_details(user_id).await.ok()?,
        };
        user.display_name
    }

    // ---- transport --------------------------------------------------

    fn with_cache_mut<T>(&self, f: impl FnOnce(&mut ExpiringCache) -> T) -> T {
        match self.cache.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn forget_versions(&self, app_id: &str, country_code: &str) {
        let key = versions_key(app_id, country_code, None);
        self.with_cache_mut(|cache| cache.remove(&key));
    }

    fn url(&self, api: Api, path: &str) -> String {
        match api {
            Api::Apps => format!("{}{}", self.apps_url, path),
            Api::Graph => format!("{}{}", self.graph_url, path),
        }
    }

    fn token(&self, api: Api) -> Option<&str> {
        match api {
            Api::Apps => self.token.as_deref(),
            Api::Graph => self.graph_token.as_deref(),
        }
    }

    async fn get_list<T: DeserializeOwned>(&self, api: Api, path: &str) -> Result<Vec<T>> {
        let list: ValueList<T> = self.get_json(api, path).await?;
        Ok(list.value)
    }

    async fn get_json<T: DeserializeOwned>(&self, api: Api, path: &str) -> Result<T> {
        let response = self.send(api, Method::GET, path, None).await?;
        decode(response, path).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<T> {
        let response = self.send(Api::Apps, method, path, Some(body)).await?;
        decode(response, path).await
    }

    async fn send(
        &self,
        api: Api,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let url = self.url(api, path);
        let retries = if method == Method::GET {
            self.max_retries
        } else {
            1
        };
        let mut attempt = 0;
        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(token) = self.token(api) {
                request = request.bearer_auth(token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let failure = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let detail = response.text().await.unwrap_or_default();
                    let message = format!(
                        "{method} {path} failed with status {status}: {}",
                        detail.trim()
                    );
                    if !is_transient(status) {
                        return Err(SynfameError::Network(message));
                    }
                    message
                }
                Err(err) => format!("{method} {path} failed: {err}"),
            };

            attempt += 1;
            if attempt >= retries {
                return Err(SynfameError::Network(format!(
                    "{failure} (after {attempt} attempt(s))"
                )));
            }
            let exponent = (attempt as u32).min(8);
            sleep(Duration::from_millis(200_u64.saturating_mul(1_u64 << exponent))).await;
        }
    }
}

#[async_trait]
impl AppRegistry for FameClient {
    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    async fn list_versions(
        &self,
        app_id: &str,
        country_code: &str,
        filter: Option<&str>,
    ) -> Result<Vec<FameAppVersion>> {
        let path = with_filter(version_path(app_id, country_code, None), filter);
        let versions: Vec<FameAppVersion> = self.get_list(Api::Apps, &path).await?;
        let key = versions_key(app_id, country_code, filter);
        if let Ok(value) = serde_json::to_value(&versions) {
            self.with_cache_mut(|cache| cache.put(key, value, None));
        }
        Ok(versions)
    }

    async fn add_version(
        &self,
        app_id: &str,
        country_code: &str,
        body: &NewVersionBody,
    ) -> Result<FameAppVersion> {
        if !body.initial_availability.allowed_on_upload() {
            return Err(SynfameError::Config(format!(
                "Not allowed value for initialAvailability: {}",
                body.initial_availability
            )));
        }
        let payload = serde_json::to_value(body)
            .map_err(|err| SynfameError::Serialization(format!("Version body: {err}")))?;
        let path = version_path(app_id, country_code, None);
        let result = self.send_json(Method::POST, &path, &payload).await;
        self.forget_versions(app_id, country_code);
        result
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response, path: &str) -> Result<T> {
    let raw = response
        .bytes()
        .await
        .map_err(|err| SynfameError::Network(format!("Failed to read response for {path}: {err}")))?;
    let raw: &[u8] = if raw.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &raw
    };
    serde_json::from_slice(raw).map_err(|err| {
        SynfameError::Serialization(format!("Failed to decode response for {path}: {err}"))
    })
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn version_path(app_id: &str, country_code: &str, version: Option<&str>) -> String {
    let base = format!(
        "/{}/countries/{}/versions",
        encode(app_id),
        encode(country_code)
    );
    match version {
        Some(version) => format!("{base}/{}", encode(version)),
        None => base,
    }
}

fn hotfix_path(app_id: &str, country_code: &str, id: Option<&str>) -> String {
    let base = format!(
        "/{}/countries/{}/environmentHotfixes",
        encode(app_id),
        encode(country_code)
    );
    match id {
        Some(id) => format!("{base}/{}", encode(id)),
        None => base,
    }
}

fn with_filter(path: String, filter: Option<&str>) -> String {
    match filter {
        Some(filter) if !filter.trim().is_empty() => format!("{path}?$filter={}", encode(filter)),
        _ => path,
    }
}

fn versions_key(app_id: &str, country_code: &str, filter: Option<&str>) -> String {
    format!(
        "versions/{}/{}/{}",
        app_id.to_ascii_lowercase(),
        country_code.to_ascii_uppercase(),
        filter.unwrap_or("")
    )
}

/// OData filter selecting versions by major and minor number.
pub fn version_filter(major: u32, minor: u32) -> String {
    format!("MajorVersion eq {major} and MinorVersion eq {minor}")
}

/// OData filter narrowing hotfixes to one environment.
pub fn hotfix_filter(tenant_id: Option<&str>, environment_name: Option<&str>) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(tenant) = tenant_id.filter(|t| !t.is_empty()) {
        clauses.push(format!("environmentAadTenantId eq {tenant}"));
    }
    if let Some(name) = environment_name.filter(|n| !n.is_empty()) {
        clauses.push(format!("environmentName eq '{name}'"));
    }
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" and "))
    }
}

/// Request body granting `roles` to a user or application principal.
pub fn principal_body(
    principal: &Principal,
    roles: &[String],
    tenant_id: Option<&str>,
) -> Result<Value> {
    match principal.principal_type.to_ascii_lowercase().as_str() {
        "user" => {
            let tenant = tenant_id.ok_or_else(|| {
                SynfameError::Config("api.tenant_id is required to add user principals".into())
            })?;
            Ok(json!({ "aadTenantId": tenant, "Type": "User", "roles": roles }))
        }
        "application" => Ok(json!({ "Type": "Application", "roles": roles })),
        other => Err(SynfameError::Config(format!(
            "Invalid principal type `{other}`"
        ))),
    }
}
