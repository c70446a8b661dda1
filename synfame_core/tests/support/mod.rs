#![allow(dead_code)]

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use synfame_core::error::{Result, SynfameError};
use synfame_core::inspector::{FILE_MAGIC, MANIFEST_ENTRY};
use synfame_core::registry::{AppRegistry, Availability, NewVersionBody};
use synfame_core::types::FameAppVersion;

/// Minimal description of a package to build on disk.
pub struct Pkg<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub version: &'a str,
    pub deps: &'a [&'a str],
}

pub fn manifest_xml(pkg: &Pkg<'_>) -> String {
    let deps: String = pkg
        .deps
        .iter()
        .map(|dep| {
            format!(
                r#"<Dependency Id="{dep}" Name="{dep}" Publisher="Synavera" MinVersion="1.0.0.0" />"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Package xmlns="http://schemas.microsoft.com/navx/2015/manifest">
  <App Id="{}" Name="{}" Publisher="Synavera" Version="{}" />
  <Dependencies>{deps}</Dependencies>
</Package>"#,
        pkg.id, pkg.name, pkg.version
    )
}

/// Bytes of a regular container wrapping the package's manifest.
pub fn container(pkg: &Pkg<'_>) -> Vec<u8> {
    let mut zip_bytes = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut zip_bytes);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file(MANIFEST_ENTRY, options).unwrap();
        zip.write_all(manifest_xml(pkg).as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    let mut bytes = FILE_MAGIC.to_vec();
    bytes.resize(36, 0);
    bytes.extend_from_slice(b"NAVX");
    bytes.extend(zip_bytes.into_inner());
    bytes
}

pub fn write_package(dir: &Path, file_name: &str, pkg: &Pkg<'_>) {
    std::fs::write(dir.join(file_name), container(pkg)).unwrap();
}

/// One recorded add-version call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCall {
    pub app_id: String,
    pub country_code: String,
    pub availability: Availability,
    /// Decoded package contents.
    pub contents: Vec<u8>,
}

/// In-memory registry recording every call.
#[derive(Default)]
pub struct MockRegistry {
    pub authenticated: bool,
    /// App IDs that have no versions in any country.
    pub unregistered: HashSet<String>,
    /// App IDs whose upload is refused.
    pub failing: HashSet<String>,
    pub list_calls: Mutex<Vec<String>>,
    pub add_calls: Mutex<Vec<AddCall>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            authenticated: true,
            ..Self::default()
        }
    }

    pub fn unregistered(mut self, app_id: &str) -> Self {
        self.unregistered.insert(app_id.to_string());
        self
    }

    pub fn failing(mut self, app_id: &str) -> Self {
        self.failing.insert(app_id.to_string());
        self
    }

    pub fn uploaded_ids(&self) -> Vec<String> {
        self.add_calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.app_id.clone())
            .collect()
    }
}

#[async_trait]
impl AppRegistry for MockRegistry {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn list_versions(
        &self,
        app_id: &str,
        country_code: &str,
        _filter: Option<&str>,
    ) -> Result<Vec<FameAppVersion>> {
        self.list_calls.lock().unwrap().push(app_id.to_string());
        if self.unregistered.contains(app_id) {
            return Ok(Vec::new());
        }
        Ok(vec![FameAppVersion {
            app_id: app_id.to_string(),
            country_code: country_code.to_string(),
            version: "1.0.0.0".into(),
            ..FameAppVersion::default()
        }])
    }

    async fn add_version(
        &self,
        app_id: &str,
        country_code: &str,
        body: &NewVersionBody,
    ) -> Result<FameAppVersion> {
        self.add_calls.lock().unwrap().push(AddCall {
            app_id: app_id.to_string(),
            country_code: country_code.to_string(),
            availability: body.initial_availability,
            contents: STANDARD.decode(&body.package_contents).unwrap_or_default(),
        });
        if self.failing.contains(app_id) {
            return Err(SynfameError::Network(format!(
                "POST versions for {app_id} failed with status 400 Bad Request"
            )));
        }
        Ok(FameAppVersion {
            app_id: app_id.to_string(),
            country_code: country_code.to_string(),
            status: "Published".into(),
            ..FameAppVersion::default()
        })
    }
}
