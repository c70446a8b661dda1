/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Fame Core. Uploads directories of app
    packages in dependency order and exposes the registry's
    browse and maintenance operations.

  Security / Safety Notes:
    Operates within user privileges. Access tokens are read
    from environment variables named in the configuration.

  Dependencies:
    clap for CLI parsing, chrono for timestamps, tokio for the
    runtime and Ctrl-C handling.

  Operational Scope:
    Invoked by operators or CI jobs publishing app packages.

  Revision History:
    2025-10-28 COD  Authored Core runtime.
    2025-11-12 COD  Re-targeted at app package publishing.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use synfame_core::api::{FameClient, VersionUpdate};
use synfame_core::catalog::{self, CatalogCheck};
use synfame_core::config::SynfameConfig;
use synfame_core::error::{Result, SynfameError};
use synfame_core::inspector;
use synfame_core::logger::Logger;
use synfame_core::pipeline::{normalize_country, Pipeline};
use synfame_core::registry::{AppRegistry, Availability};
use synfame_core::report::{write_report, ReportDocument};
use synfame_core::types::{HotfixScheduleBody, Principal};
use synfame_core::upload::UploadOptions;

/// Command-line arguments for Syn-Fame-Core.
#[derive(Debug, Parser)]
#[command(
    name = "synfame",
    version,
    author = "Synavera Systems",
    about = "Dependency-ordered app package publishing"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH", global = true)]
    log: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload every package in a directory, dependencies first.
    Upload {
        dir: PathBuf,
        #[arg(long)]
        country: Option<String>,
        /// Publish as Preview instead of the configured availability.
        #[arg(long, action = ArgAction::SetTrue)]
        preview: bool,
        /// Stop at the first failed upload.
        #[arg(long, action = ArgAction::SetTrue)]
        halt_on_error: bool,
        /// Report output path.
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
    /// Show the upload order without contacting the registry.
    Plan { dir: PathBuf },
    /// Print the identity and dependencies of a package, zip or manifest.
    Inspect {
        path: PathBuf,
        /// Print the raw manifest XML instead.
        #[arg(long, action = ArgAction::SetTrue)]
        xml: bool,
    },
    /// List apps.
    Apps {
        /// Resolve missing names from registered versions.
        #[arg(long, action = ArgAction::SetTrue)]
        resolve_names: bool,
    },
    /// List or add countries of an app.
    Countries {
        app: String,
        #[arg(long, value_name = "CC")]
        add: Option<String>,
    },
    /// List, grant, or revoke principals of an app.
    Principals {
        app: String,
        /// Principal ID to grant roles to.
        #[arg(long, value_name = "ID")]
        add: Option<String>,
        /// `user` or `application`.
        #[arg(long = "type", value_name = "TYPE", default_value = "user")]
        principal_type: String,
        #[arg(long = "role", value_name = "ROLE", action = ArgAction::Append)]
        roles: Vec<String>,
        #[arg(long, value_name = "ID", conflicts_with = "add")]
        remove: Option<String>,
    },
    /// List versions of an app, or change one.
    Versions {
        app: String,
        #[arg(long)]
        country: Option<String>,
        /// OData filter expression.
        #[arg(long)]
        filter: Option<String>,
        /// Version to show or update.
        #[arg(long = "version", value_name = "VERSION")]
        version: Option<String>,
        /// New availability for `--version`.
        #[arg(long, requires = "version")]
        availability: Option<String>,
        /// Dependency app ID whose compatibility is being limited.
        #[arg(long, value_name = "APP", requires_all = ["version", "incompatible_from"])]
        dependency: Option<String>,
        #[arg(long, value_name = "VERSION")]
        incompatible_from: Option<String>,
    },
    /// Download a version's package.
    Download {
        app: String,
        #[arg(long)]
        country: Option<String>,
        #[arg(long = "version", value_name = "VERSION")]
        version: String,
        #[arg(long, value_name = "DIR", default_value = ".")]
        out: PathBuf,
    },
    /// List environments an app is installed in.
    Environments {
        app: String,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        filter: Option<String>,
    },
    /// List, show, schedule, or update environment hotfixes.
    Hotfixes {
        app: String,
        #[arg(long)]
        country: Option<String>,
        #[arg(long, value_name = "ID")]
        tenant: Option<String>,
        #[arg(long, value_name = "NAME")]
        environment: Option<String>,
        /// Hotfix ID to show or update.
        #[arg(long)]
        id: Option<String>,
        /// Target version to schedule onto `--environment`.
        #[arg(long, value_name = "VERSION", requires = "environment")]
        schedule: Option<String>,
        /// Earliest start, RFC 3339. Defaults to now.
        #[arg(long, value_name = "TIME")]
        run_after: Option<String>,
        /// JSON body patched onto `--id`.
        #[arg(long, value_name = "JSON", requires = "id")]
        update: Option<String>,
    },
    /// Look up directory users.
    Users {
        /// Display name prefix.
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_name = "ID")]
        id: Option<String>,
    },
    /// Validate an apps manifest against the registry.
    ValidateManifest {
        file: PathBuf,
        #[arg(long)]
        country: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        check_links: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Fame-Core] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = SynfameConfig::load_from_optional_path(cli.config.as_deref())?;

    let started = Utc::now();
    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| Logger::session_path(&config.log_dir(), "fame", started));
    let logger = Logger::new(Some(log_path), cli.verbose)?;
    logger.info("INIT", "Syn-Fame Core awakening.");

    let outcome = dispatch(cli.command, &config, &logger, started).await;
    match &outcome {
        Ok(_) => logger.info("COMPLETE", "Run complete."),
        Err(err) => logger.error("FAIL", err.to_string()),
    }
    logger.finalize()?;
    outcome
}

async fn dispatch(
    command: Command,
    config: &SynfameConfig,
    logger: &Logger,
    started: DateTime<Utc>,
) -> Result<ExitCode> {
    match command {
        Command::Upload {
            dir,
            country,
            preview,
            halt_on_error,
            report,
        } => {
            let country = country_or_default(country, config)?;
            let client = client(config)?;
            let options = UploadOptions {
                availability: if preview {
                    Availability::Preview
                } else {
                    config.upload.availability
                },
                halt_on_error: halt_on_error || config.upload.halt_on_error,
            };
            let report_path = report.unwrap_or_else(|| {
                config
                    .report_dir()
                    .join(format!("upload_{}.json", started.format("%Y-%m-%d_%H-%M-%S")))
            });
            upload(&client, logger, options, &dir, &country, &report_path).await
        }
        Command::Plan { dir } => {
            let client = client(config)?;
            let plan = Pipeline::new(&client, logger, UploadOptions::default()).plan(&dir)?;
            for (index, package) in plan.ordered.iter().enumerate() {
                println!(
                    "{:>3}. {} {} ({}) [{}]",
                    index + 1,
                    package.name,
                    package.version,
                    package.app_id,
                    package.file_name
                );
            }
            for rejected in &plan.rejected {
                println!("  rejected {}: {}", rejected.file, rejected.reason);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Inspect { path, xml } => {
            let inspection = inspector::inspect_path(&path)?;
            if xml {
                println!("{}", inspection.xml);
            } else {
                let manifest = &inspection.manifest;
                println!(
                    "{} {} by {} ({})",
                    manifest.name, manifest.version, manifest.publisher, manifest.app_id
                );
                for dependency in &manifest.dependencies {
                    println!(
                        "  depends on {} {} ({})",
                        dependency.name, dependency.version, dependency.app_id
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Apps { resolve_names } => {
            let client = authenticated(config)?;
            let apps = client.list_apps().await?;
            if resolve_names {
                let names = client.resolve_app_names(&apps).await?;
                logger.info("APPS", format!("Resolved {} app name(s)", names.len()));
                print_json(&client.list_apps().await?)?;
            } else {
                print_json(&apps)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Countries { app, add } => {
            let client = authenticated(config)?;
            if let Some(code) = add {
                let code = normalize_country(&code)?;
                let added = client.add_country(&app, &code).await?;
                logger.info("COUNTRY", format!("Added {code} to {app}"));
                print_json(&added)?;
            } else {
                print_json(&client.list_countries(&app).await?)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Principals {
            app,
            add,
            principal_type,
            roles,
            remove,
        } => {
            let client = authenticated(config)?;
            if let Some(principal_id) = add {
                if roles.is_empty() {
                    return Err(SynfameError::Config(
                        "At least one --role is required".into(),
                    ));
                }
                let principal = Principal {
                    principal_type,
                    principal_id,
                };
                let updated = client.put_principal(&app, &principal, &roles).await?;
                logger.info(
                    "PRINCIPAL",
                    format!("Granted {} to {} on {app}", roles.join(","), principal.principal_id),
                );
                print_json(&updated)?;
            } else if let Some(principal_id) = remove {
                client.remove_principal(&app, &principal_id).await?;
                logger.info("PRINCIPAL", format!("Removed {principal_id} from {app}"));
            } else {
                print_json(&client.list_principals(&app).await?)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Versions {
            app,
            country,
            filter,
            version,
            availability,
            dependency,
            incompatible_from,
        } => {
            let country = country_or_default(country, config)?;
            let client = authenticated(config)?;
            let update = match (availability, dependency, incompatible_from) {
                (Some(raw), None, _) => Some(VersionUpdate::Availability(raw.parse()?)),
                (None, Some(dependency_app_id), Some(incompatible_from_version)) => {
                    Some(VersionUpdate::DependencyCompatibility {
                        dependency_app_id,
                        incompatible_from_version,
                    })
                }
                (None, None, None) => None,
                _ => {
                    return Err(SynfameError::Config(
                        "Use either --availability or --dependency with --incompatible-from"
                            .into(),
                    ))
                }
            };
            match (version, update) {
                (Some(version), Some(update)) => {
                    let updated = client
                        .update_version(&app, &country, &version, &update)
                        .await?;
                    logger.info("VERSION", format!("Updated {app} {version} in {country}"));
                    print_json(&updated)?;
                }
                (Some(version), None) => {
                    print_json(&client.version_details(&app, &country, &version).await?)?;
                }
                (None, _) => {
                    print_json(
                        &client
                            .cached_versions(&app, &country, filter.as_deref())
                            .await?,
                    )?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Download {
            app,
            country,
            version,
            out,
        } => {
            let country = country_or_default(country, config)?;
            let client = authenticated(config)?;
            let details = client.version_details(&app, &country, &version).await?;
            let stem = (!details.name.is_empty())
                .then(|| format!("{}_{}", details.name.replace(' ', "_"), details.version));
            let path = client
                .download_version(&app, &country, &version, &out, stem.as_deref())
                .await?;
            logger.info("DOWNLOAD", format!("Saved {}", path.display()));
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Environments {
            app,
            country,
            filter,
        } => {
            let country = country_or_default(country, config)?;
            let client = authenticated(config)?;
            print_json(
                &client
                    .list_environments(&app, &country, filter.as_deref())
                    .await?,
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Hotfixes {
            app,
            country,
            tenant,
            environment,
            id,
            schedule,
            run_after,
            update,
        } => {
            let country = country_or_default(country, config)?;
            let client = authenticated(config)?;
            if let Some(target) = schedule {
                let environment = environment.unwrap_or_default();
                let run_after = parse_run_after(run_after.as_deref())?;
                let filter = format!("name eq '{environment}'");
                let env = client
                    .list_environments(&app, &country, Some(&filter))
                    .await?
                    .into_iter()
                    .find(|env| {
                        tenant
                            .as_deref()
                            .map_or(true, |tenant| env.aad_tenant_id == tenant)
                    })
                    .ok_or_else(|| {
                        SynfameError::Config(format!(
                            "Environment `{environment}` not found for {app} in {country}"
                        ))
                    })?;
                let target = client.version_details(&app, &country, &target).await?;
                let body = HotfixScheduleBody::new(&env, &target, run_after);
                let scheduled = client.schedule_hotfix(&app, &country, &body).await?;
                logger.info(
                    "HOTFIX",
                    format!("Scheduled {} onto {environment}", target.version),
                );
                print_json(&scheduled)?;
            } else if let (Some(id), Some(raw)) = (id.as_deref(), update.as_deref()) {
                let body: serde_json::Value = serde_json::from_str(raw).map_err(|err| {
                    SynfameError::Serialization(format!("Invalid --update body: {err}"))
                })?;
                print_json(&client.update_hotfix(&app, &country, id, &body).await?)?;
            } else if let Some(id) = id {
                print_json(&client.hotfix_details(&app, &country, &id).await?)?;
            } else {
                print_json(
                    &client
                        .list_hotfixes(&app, &country, tenant.as_deref(), environment.as_deref())
                        .await?,
                )?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Users { name, id } => {
            let client = client(config)?;
            if let Some(id) = id {
                print_json(&client.user_details(&id).await?)?;
            } else {
                print_json(&client.list_users(name.as_deref()).await?)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::ValidateManifest {
            file,
            country,
            check_links,
        } => {
            let country = country_or_default(country, config)?;
            let client = authenticated(config)?;
            let manifest = catalog::load(&file)?;
            let http = reqwest::Client::new();
            let check = CatalogCheck {
                registry: &client,
                country_code: &country,
                http: check_links.then_some(&http),
            };
            let report = catalog::validate(&manifest, &check).await;
            print!("{}", report.render());
            if report.has_problems() {
                logger.warn(
                    "CATALOG",
                    format!("{} problem(s) in {}", report.problems.len(), file.display()),
                );
                Ok(ExitCode::from(1))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

async fn upload(
    client: &FameClient,
    logger: &Logger,
    options: UploadOptions,
    dir: &Path,
    country: &str,
    report_path: &Path,
) -> Result<ExitCode> {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if relay_interrupts(tokio::signal::ctrl_c, watcher).await {
            std::process::exit(130);
        }
    });

    let pipeline = Pipeline::new(client, logger, options);
    let outcome = pipeline.run_detailed(dir, country, &cancel).await?;

    let document = ReportDocument::new(outcome.report, outcome.rejected);
    write_report(&document, report_path)?;
    logger.info(
        "REPORT",
        format!("Report written to {}", report_path.display()),
    );
    println!(
        "→ {} uploaded, {} failed, {} skipped in {}",
        document.metadata.uploaded,
        document.metadata.failed,
        document.metadata.skipped,
        document.metadata.country_code
    );

    document.run.into_result()?;
    Ok(ExitCode::SUCCESS)
}

/// First interrupt cancels the token so the run stops after the current
/// package. Returns `true` once a second interrupt arrives, `false` if the
/// signal source fails first.
async fn relay_interrupts<F, Fut>(mut signal: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if signal().await.is_err() {
        return false;
    }
    eprintln!("→ Interrupt received; stopping after the current package (Ctrl-C again to abort)");
    cancel.cancel();
    signal().await.is_ok()
}

fn client(config: &SynfameConfig) -> Result<FameClient> {
    FameClient::new(&config.api, config.access_token(), config.graph_token())
}

fn authenticated(config: &SynfameConfig) -> Result<FameClient> {
    let client = client(config)?;
    if !client.is_authenticated() {
        return Err(SynfameError::NotAuthenticated);
    }
    Ok(client)
}

fn country_or_default(country: Option<String>, config: &SynfameConfig) -> Result<String> {
    let raw = country
        .or_else(|| config.default_country.clone())
        .ok_or_else(|| {
            SynfameError::Config("No --country given and no default_country configured".into())
        })?;
    normalize_country(&raw)
}

fn parse_run_after(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|time| time.with_timezone(&Utc))
            .map_err(|err| SynfameError::Config(format!("Invalid --run-after `{raw}`: {err}"))),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| SynfameError::Serialization(format!("Failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[tokio::test]
    async fn second_interrupt_aborts_after_first_cancels() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let aborted = relay_interrupts(
            || {
                calls += 1;
                std::future::ready(Ok(()))
            },
            cancel.clone(),
        )
        .await;
        assert!(aborted);
        assert!(cancel.is_cancelled());
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn failed_signal_source_leaves_the_run_alone() {
        let cancel = CancellationToken::new();
        let aborted = relay_interrupts(
            || std::future::ready(Err(io::Error::new(io::ErrorKind::Other, "no handler"))),
            cancel.clone(),
        )
        .await;
        assert!(!aborted);
        assert!(!cancel.is_cancelled());
    }
}
