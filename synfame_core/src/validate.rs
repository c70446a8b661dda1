/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::validate
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Confirm every package in an ordered batch is already
    registered in the target country before anything uploads.

  Security / Safety Notes:
    Read-only registry queries.

  Dependencies:
    Registry trait only.

  Operational Scope:
    Gate between ordering and upload in the pipeline.

  Revision History:
    2025-11-12 COD  Authored precondition gate.
============================================================*/

use crate::error::{AppRef, Result, SynfameError};
use crate::logger::Logger;
use crate::package_info::PackageDescriptor;
use crate::registry::AppRegistry;

/// Fail the whole batch unless each app has at least one version
/// registered under `country_code`. Query errors count as unregistered.
pub async fn validate<R>(
    ordered: &[PackageDescriptor],
    country_code: &str,
    registry: &R,
    logger: &Logger,
) -> Result<()>
where
    R: AppRegistry + ?Sized,
{
    let mut missing = Vec::new();
    for package in ordered {
        match registry
            .list_versions(&package.app_id, country_code, None)
            .await
        {
            Ok(versions) if !versions.is_empty() => {
                logger.debug(
                    "PRECHECK",
                    format!(
                        "{} ({}) has {} version(s) in {country_code}",
                        package.name,
                        package.app_id,
                        versions.len()
                    ),
                );
            }
            Ok(_) => {
                logger.error(
                    "PRECHECK",
                    format!(
                        "{} ({}) is not registered in {country_code}",
                        package.name, package.app_id
                    ),
                );
                missing.push(AppRef::new(&package.app_id, &package.name));
            }
            Err(err) => {
                logger.error(
                    "PRECHECK",
                    format!(
                        "{} ({}) could not be checked in {country_code}: {err}",
                        package.name, package.app_id
                    ),
                );
                missing.push(AppRef::new(&package.app_id, &package.name));
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SynfameError::Precondition {
            country: country_code.to_string(),
            missing,
        })
    }
}
