/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::inspector
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Read `.app` package containers, verify the container header
    and subtype, and extract app identity and dependencies from
    the embedded NavxManifest.xml.

  Security / Safety Notes:
    Extraction happens entirely in memory; no temporary files
    are written, so nothing can leak on a failed parse. Only
    the manifest entry is read from the embedded archive.

  Dependencies:
    zip for the embedded archive, quick-xml for the manifest.

  Operational Scope:
    Feeds the upload pipeline and the `inspect` diagnostics
    command.

  Revision History:
    2025-11-12 COD  Authored package inspector.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit header checks before any decoding
    - Per-file failures scoped to the offending file
    - No residue on disk
============================================================*/

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Result, SynfameError};
use crate::package_info::{AppVersion, DependencyRef, PackageDescriptor};

/// Leading bytes of every container file.
pub const FILE_MAGIC: [u8; 10] = [78, 65, 86, 88, 40, 0, 0, 0, 2, 0];
/// Subtype signature of a regular package (`NAVXPK\x03\x04`).
pub const REGULAR_SIGNATURE: [u8; 8] = [78, 65, 86, 88, 80, 75, 3, 4];
/// Subtype signature of a runtime package (`NAVX.NEA`).
pub const RUNTIME_SIGNATURE: [u8; 8] = [78, 65, 86, 88, 46, 78, 69, 65];
/// Name of the manifest entry inside the embedded archive.
pub const MANIFEST_ENTRY: &str = "NavxManifest.xml";

const SIGNATURE_RANGE: std::ops::Range<usize> = 36..44;
const PAYLOAD_OFFSET: usize = 40;

/// Container subtype as read from the signature bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Regular,
    Runtime,
    Unknown,
}

/// App identity and dependency list parsed from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppManifest {
    pub app_id: String,
    pub name: String,
    pub publisher: String,
    pub version: AppVersion,
    pub dependencies: Vec<DependencyRef>,
}

/// Result of inspecting an artifact on disk for diagnostics.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub manifest: AppManifest,
    pub xml: String,
}

/// Classify the container subtype. Callers check the header first.
pub fn container_kind(bytes: &[u8]) -> ContainerKind {
    match bytes.get(SIGNATURE_RANGE) {
        Some(sig) if sig == REGULAR_SIGNATURE => ContainerKind::Regular,
        Some(sig) if sig == RUNTIME_SIGNATURE => ContainerKind::Runtime,
        _ => ContainerKind::Unknown,
    }
}

/// Verify header magic and subtype of a container buffer.
pub fn check_container(file_name: &str, bytes: &[u8]) -> Result<()> {
    if bytes.get(..FILE_MAGIC.len()) != Some(&FILE_MAGIC[..]) {
        return Err(SynfameError::format(file_name, "header mismatch"));
    }
    match container_kind(bytes) {
        ContainerKind::Regular => Ok(()),
        ContainerKind::Runtime => Err(SynfameError::format(
            file_name,
            "runtime package not supported",
        )),
        ContainerKind::Unknown => Err(SynfameError::format(
            file_name,
            "unrecognized package variant",
        )),
    }
}

/// Extract the raw manifest XML from a regular container.
pub fn extract_manifest_xml(file_name: &str, bytes: &[u8]) -> Result<String> {
    check_container(file_name, bytes)?;
    read_manifest_entry(file_name, &bytes[PAYLOAD_OFFSET..])
}

/// Inspect a container, taking ownership of its bytes.
pub fn inspect(file_name: &str, bytes: Vec<u8>) -> Result<PackageDescriptor> {
    let xml = extract_manifest_xml(file_name, &bytes)?;
    let manifest = parse_manifest(file_name, &xml)?;
    Ok(PackageDescriptor::new(
        manifest.app_id,
        manifest.name,
        manifest.publisher,
        manifest.version,
        file_name.to_string(),
        manifest.dependencies,
        bytes,
    ))
}

/// Read and inspect a container file from disk.
pub fn load_package(path: &Path) -> Result<PackageDescriptor> {
    let file_name = display_name(path);
    let bytes = fs::read(path).map_err(|err| {
        SynfameError::Filesystem(format!("Failed to read package {}: {err}", path.display()))
    })?;
    inspect(&file_name, bytes)
}

/// Parse manifest XML that was already extracted.
pub fn inspect_manifest_xml(xml: &str) -> Result<AppManifest> {
    parse_manifest(MANIFEST_ENTRY, xml)
}

/// Inspect an artifact on disk: a `.app` container, an extracted
/// `.xml` manifest, or a plain archive holding the manifest entry.
pub fn inspect_path(path: &Path) -> Result<Inspection> {
    let file_name = display_name(path);
    let bytes = fs::read(path).map_err(|err| {
        SynfameError::Filesystem(format!("Failed to read {}: {err}", path.display()))
    })?;
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    let xml = match extension.as_deref() {
        Some("app") => extract_manifest_xml(&file_name, &bytes)?,
        Some("xml") => String::from_utf8(bytes).map_err(|err| {
            SynfameError::format(&file_name, format!("manifest is not UTF-8: {err}"))
        })?,
        _ => read_manifest_entry(&file_name, &bytes)?,
    };
    let manifest = parse_manifest(&file_name, &xml)?;
    Ok(Inspection { manifest, xml })
}

fn read_manifest_entry(file_name: &str, archive_bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes)).map_err(|err| {
        SynfameError::format(file_name, format!("embedded archive unreadable: {err}"))
    })?;
    let mut entry = match archive.by_name(MANIFEST_ENTRY) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(SynfameError::format(file_name, "manifest entry missing"))
        }
        Err(err) => {
            return Err(SynfameError::format(
                file_name,
                format!("manifest entry unreadable: {err}"),
            ))
        }
    };
    let mut xml = String::new();
    entry.read_to_string(&mut xml).map_err(|err| {
        SynfameError::format(file_name, format!("manifest entry unreadable: {err}"))
    })?;
    Ok(xml)
}

/// Parse `Package/App` attributes and every `Dependencies/Dependency`.
pub fn parse_manifest(file_name: &str, xml: &str) -> Result<AppManifest> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut app: Option<AppManifest> = None;
    let mut dependencies = Vec::new();

    loop {
        let event = reader.read_event().map_err(|err| {
            SynfameError::format(
                file_name,
                format!(
                    "manifest XML invalid at byte {}: {err}",
                    reader.buffer_position()
                ),
            )
        })?;
        match event {
            Event::Start(ref element) => {
                visit_element(file_name, element, &stack, &mut app, &mut dependencies)?;
                stack.push(element.local_name().as_ref().to_vec());
            }
            Event::Empty(ref element) => {
                visit_element(file_name, element, &stack, &mut app, &mut dependencies)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut manifest = app.ok_or_else(|| {
        SynfameError::format(file_name, "manifest has no Package/App element")
    })?;
    manifest.dependencies = dependencies;
    Ok(manifest)
}

fn visit_element(
    file_name: &str,
    element: &BytesStart<'_>,
    stack: &[Vec<u8>],
    app: &mut Option<AppManifest>,
    dependencies: &mut Vec<DependencyRef>,
) -> Result<()> {
    let local = element.local_name();
    let parent = stack.last().map(Vec::as_slice);
    match local.as_ref() {
        b"App" if app.is_none() && stack.len() == 1 && parent == Some(&b"Package"[..]) => {
            let attrs = Attributes::read(file_name, element)?;
            let version_raw = attrs.require(file_name, "App", "Version")?;
            let version = version_raw.parse::<AppVersion>().map_err(|err| {
                SynfameError::format(file_name, format!("App version invalid: {err}"))
            })?;
            *app = Some(AppManifest {
                app_id: attrs.require(file_name, "App", "Id")?,
                name: attrs.require(file_name, "App", "Name")?,
                publisher: attrs.require(file_name, "App", "Publisher")?,
                version,
                dependencies: Vec::new(),
            });
        }
        b"Dependency" if parent == Some(&b"Dependencies"[..]) => {
            let attrs = Attributes::read(file_name, element)?;
            dependencies.push(DependencyRef {
                app_id: attrs.require(file_name, "Dependency", "Id")?,
                name: attrs.get("Name").unwrap_or_default(),
                publisher: attrs.get("Publisher").unwrap_or_default(),
                version: attrs
                    .get("MinVersion")
                    .or_else(|| attrs.get("Version"))
                    .unwrap_or_default(),
            });
        }
        _ => {}
    }
    Ok(())
}

struct Attributes(Vec<(String, String)>);

impl Attributes {
    fn read(file_name: &str, element: &BytesStart<'_>) -> Result<Self> {
        let mut pairs = Vec::new();
        for attr in element.attributes() {
            let attr = attr.map_err(|err| {
                SynfameError::format(file_name, format!("manifest attribute invalid: {err}"))
            })?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| {
                    SynfameError::format(file_name, format!("manifest attribute invalid: {err}"))
                })?
                .into_owned();
            pairs.push((key, value));
        }
        Ok(Self(pairs))
    }

    fn get(&self, key: &str) -> Option<String> {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.trim().to_string())
    }

    fn require(&self, file_name: &str, element: &str, key: &str) -> Result<String> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(SynfameError::format(
                file_name,
                format!("manifest missing attribute {element}/@{key}"),
            )),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Package xmlns="http://schemas.microsoft.com/navx/2015/manifest">
  <App Id="8f1e6c2a-0000-4000-8000-000000000001" Name="Sales &amp; Ops" Publisher="Synavera" Version="24.1.7.2" />
  <IdRanges><IdRange MinObjectId="50000" MaxObjectId="50099" /></IdRanges>
  <Dependencies>
    <Dependency Id="8f1e6c2a-0000-4000-8000-0000000000aa" Name="Base" Publisher="Synavera" MinVersion="24.0.0.0" />
    <Dependency Id="8f1e6c2a-0000-4000-8000-0000000000bb" Name="Legacy" Publisher="Other" Version="1.2.0.0" />
  </Dependencies>
</Package>"#;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            for (name, body) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    fn container(manifest: &str) -> Vec<u8> {
        let mut bytes = FILE_MAGIC.to_vec();
        bytes.resize(36, 0);
        bytes.extend_from_slice(b"NAVX");
        bytes.extend(zip_with(&[(MANIFEST_ENTRY, manifest)]));
        bytes
    }

    #[test]
    fn regular_container_round_trips_manifest_fields() {
        let package = inspect("Sales.app", container(MANIFEST)).unwrap();
        assert_eq!(package.app_id, "8f1e6c2a-0000-4000-8000-000000000001");
        assert_eq!(package.name, "Sales & Ops");
        assert_eq!(package.publisher, "Synavera");
        assert_eq!(package.version, AppVersion::new(24, 1, 7, 2));
        assert_eq!(package.file_name, "Sales.app");
        assert_eq!(package.dependencies.len(), 2);
        assert_eq!(package.dependencies[0].name, "Base");
        assert_eq!(package.dependencies[0].version, "24.0.0.0");
        assert_eq!(package.dependencies[1].version, "1.2.0.0");
    }

    #[test]
    fn every_single_byte_header_corruption_is_rejected() {
        let pristine = container(MANIFEST);
        for idx in 0..FILE_MAGIC.len() {
            let mut corrupted = pristine.clone();
            corrupted[idx] = corrupted[idx].wrapping_add(1);
            match check_container("x.app", &corrupted) {
                Err(SynfameError::Format { reason, .. }) => assert_eq!(reason, "header mismatch"),
                other => panic!("byte {idx}: expected header mismatch, got {other:?}"),
            }
        }
    }

    #[test]
    fn runtime_and_unknown_variants_are_rejected() {
        let mut runtime = FILE_MAGIC.to_vec();
        runtime.resize(36, 0);
        runtime.extend_from_slice(&RUNTIME_SIGNATURE);
        runtime.extend_from_slice(&[0; 16]);
        let err = check_container("rt.app", &runtime).unwrap_err();
        assert!(err.to_string().contains("runtime package not supported"));

        let mut unknown = FILE_MAGIC.to_vec();
        unknown.resize(48, 7);
        let err = check_container("odd.app", &unknown).unwrap_err();
        assert!(err.to_string().contains("unrecognized package variant"));

        let err = check_container("short.app", &FILE_MAGIC[..4]).unwrap_err();
        assert!(err.to_string().contains("header mismatch"));
    }

    #[test]
    fn missing_manifest_entry_is_a_format_error() {
        let mut bytes = FILE_MAGIC.to_vec();
        bytes.resize(36, 0);
        bytes.extend_from_slice(b"NAVX");
        bytes.extend(zip_with(&[("src/Codeunit.al", "codeunit 50000 X {}")]));
        let err = inspect("empty.app", bytes).unwrap_err();
        assert!(err.to_string().contains("manifest entry missing"));
    }

    #[test]
    fn missing_app_attribute_is_reported() {
        let xml = r#"<Package><App Id="a" Name="n" Version="1.0.0.0" /></Package>"#;
        let err = inspect_manifest_xml(xml).unwrap_err();
        assert!(err.to_string().contains("App/@Publisher"));
    }

    #[test]
    fn dependencies_nested_under_app_are_read() {
        let xml = r#"<Package><App Id="a" Name="n" Publisher="p" Version="1.0">
            <Dependencies><Dependency Id="b" Name="B" Publisher="p" Version="2.0.0.0"/></Dependencies>
        </App></Package>"#;
        let manifest = inspect_manifest_xml(xml).unwrap();
        assert_eq!(manifest.dependencies.len(), 1);
        assert_eq!(manifest.dependencies[0].app_id, "b");
    }

    #[test]
    fn inspect_path_handles_each_artifact_shape() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("Sales.app");
        std::fs::write(&app, container(MANIFEST)).unwrap();
        let xml = dir.path().join("NavxManifest.xml");
        std::fs::write(&xml, MANIFEST).unwrap();
        let zip = dir.path().join("Sales.zip");
        std::fs::write(&zip, zip_with(&[(MANIFEST_ENTRY, MANIFEST)])).unwrap();

        for path in [&app, &xml, &zip] {
            let inspection = inspect_path(path).unwrap();
            assert_eq!(inspection.manifest.name, "Sales & Ops");
            assert!(inspection.xml.contains("<Dependencies>"));
        }
    }
}
