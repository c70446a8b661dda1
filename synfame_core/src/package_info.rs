/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::package_info
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Shared structures describing inspected app packages: the
    four-part version, dependency references, and the package
    descriptor handed through the upload pipeline.

  Security / Safety Notes:
    Pure data container; no I/O performed in this module.

  Dependencies:
    serde for report serialization.

  Operational Scope:
    Produced by the inspector, ordered by the graph sorter, and
    consumed by the validator and upload driver.

  Revision History:
    2024-11-04 COD  Introduced shared VersionInfo type.
    2025-11-12 COD  Reworked into package descriptor model.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Serializable structures for report output
============================================================*/

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Four-part app version (`major.minor.build.revision`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AppVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl AppVersion {
    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl FromStr for AppVersion {
    type Err = String;

    /// Missing trailing parts default to zero, so `1.2` reads as `1.2.0.0`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("empty version".into());
        }
        let mut parts = [0u32; 4];
        for (idx, piece) in trimmed.split('.').enumerate() {
            if idx >= 4 {
                return Err(format!("version `{trimmed}` has more than four parts"));
            }
            parts[idx] = piece
                .parse::<u32>()
                .map_err(|err| format!("invalid version part `{piece}` in `{trimmed}`: {err}"))?;
        }
        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl Serialize for AppVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reference to another app by ID. The target may be absent from the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyRef {
    pub app_id: String,
    pub name: String,
    pub publisher: String,
    pub version: String,
}

/// An inspected `.app` package, ready for ordering and upload.
#[derive(Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub app_id: String,
    pub name: String,
    pub publisher: String,
    pub version: AppVersion,
    pub file_name: String,
    pub dependencies: Vec<DependencyRef>,
    bytes: Vec<u8>,
}

impl PackageDescriptor {
    pub fn new(
        app_id: String,
        name: String,
        publisher: String,
        version: AppVersion,
        file_name: String,
        dependencies: Vec<DependencyRef>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            app_id,
            name,
            publisher,
            version,
            file_name,
            dependencies,
            bytes,
        }
    }

    /// Raw container bytes as read from disk.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for PackageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageDescriptor")
            .field("app_id", &self.app_id)
            .field("name", &self.name)
            .field("publisher", &self.publisher)
            .field("version", &self.version)
            .field("file_name", &self.file_name)
            .field("dependencies", &self.dependencies)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_and_short_versions() {
        assert_eq!(
            "24.1.17.3".parse::<AppVersion>().unwrap(),
            AppVersion::new(24, 1, 17, 3)
        );
        assert_eq!("2.5".parse::<AppVersion>().unwrap(), AppVersion::new(2, 5, 0, 0));
        assert!("1.2.3.4.5".parse::<AppVersion>().is_err());
        assert!("1.x".parse::<AppVersion>().is_err());
        assert!("".parse::<AppVersion>().is_err());
    }

    #[test]
    fn versions_order_numerically() {
        let older: AppVersion = "1.9.0.0".parse().unwrap();
        let newer: AppVersion = "1.10.0.0".parse().unwrap();
        assert!(older < newer);
        assert_eq!(newer.to_string(), "1.10.0.0");
    }
}
