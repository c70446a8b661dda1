mod support;

use std::sync::Mutex;

use synfame_core::batch::UploadBatch;
use synfame_core::error::SynfameError;
use synfame_core::logger::Logger;
use synfame_core::pipeline::Pipeline;
use synfame_core::registry::Availability;
use synfame_core::upload::{ProgressSink, UploadOptions, UploadOutcome, UploadProgress, UploadResult};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use support::{container, write_package, MockRegistry, Pkg};

const BASE: Pkg<'static> = Pkg {
    id: "base",
    name: "Base",
    version: "1.0.0.0",
    deps: &[],
};

fn pkg<'a>(id: &'a str, deps: &'a [&'a str]) -> Pkg<'a> {
    Pkg {
        id,
        name: id,
        version: "1.0.0.0",
        deps,
    }
}

#[tokio::test]
async fn unregistered_second_package_blocks_every_upload() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "a.app", &pkg("a", &[]));
    write_package(dir.path(), "b.app", &pkg("b", &[]));
    write_package(dir.path(), "c.app", &pkg("c", &[]));

    let registry = MockRegistry::new().unregistered("b");
    let logger = Logger::quiet();
    let pipeline = Pipeline::new(&registry, &logger, UploadOptions::default());
    let err = pipeline
        .run(dir.path(), "DE", &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        SynfameError::Precondition { country, missing } => {
            assert_eq!(country, "DE");
            assert_eq!(missing.len(), 1);
            assert_eq!(missing[0].app_id, "b");
        }
        other => panic!("expected precondition failure, got {other:?}"),
    }
    assert!(registry.add_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn independent_packages_keep_input_order_and_default_availability() {
    let dir = tempdir().unwrap();
    let first = pkg("first", &[]);
    let second = pkg("second", &[]);
    write_package(dir.path(), "1_first.app", &first);
    write_package(dir.path(), "2_second.app", &second);

    let registry = MockRegistry::new();
    let logger = Logger::quiet();
    let report = Pipeline::new(&registry, &logger, UploadOptions::default())
        .run(dir.path(), " de ", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.country_code, "DE");
    assert_eq!(report.uploaded(), 2);
    let calls = registry.add_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].app_id, "first");
    assert_eq!(calls[1].app_id, "second");
    for (call, pkg) in calls.iter().zip([&first, &second]) {
        assert_eq!(call.availability, Availability::Available);
        assert_eq!(call.country_code, "DE");
        assert_eq!(call.contents, container(pkg));
    }
}

#[tokio::test]
async fn dependency_uploads_before_dependent_regardless_of_file_order() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "a_app.app", &pkg("app", &["base"]));
    write_package(dir.path(), "b_base.app", &BASE);

    let registry = MockRegistry::new();
    let logger = Logger::quiet();
    let report = Pipeline::new(&registry, &logger, UploadOptions::default())
        .run(dir.path(), "US", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(registry.uploaded_ids(), vec!["base", "app"]);
    assert_eq!(report.results[0].name, "Base");
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn dependency_outside_the_batch_is_ignored() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "ext.app", &pkg("ext", &["system-application"]));

    let registry = MockRegistry::new();
    let logger = Logger::quiet();
    Pipeline::new(&registry, &logger, UploadOptions::default())
        .run(dir.path(), "US", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(registry.uploaded_ids(), vec!["ext"]);
    assert_eq!(*registry.list_calls.lock().unwrap(), vec!["ext".to_string()]);
}

#[tokio::test]
async fn one_failed_upload_does_not_stop_the_rest() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "a.app", &pkg("a", &[]));
    write_package(dir.path(), "b.app", &pkg("b", &[]));
    write_package(dir.path(), "c.app", &pkg("c", &[]));

    let registry = MockRegistry::new().failing("b");
    let logger = Logger::quiet();
    let report = Pipeline::new(&registry, &logger, UploadOptions::default())
        .run(dir.path(), "DE", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(registry.uploaded_ids(), vec!["a", "b", "c"]);
    assert_eq!((report.uploaded(), report.failed(), report.skipped()), (2, 1, 0));
    match report.into_result() {
        Err(SynfameError::Upload { failed }) => {
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].app.app_id, "b");
            assert_eq!(failed[0].file, "b.app");
            assert!(failed[0].detail.contains("400"));
        }
        other => panic!("expected upload failure, got {other:?}"),
    }
}

#[tokio::test]
async fn halt_on_error_skips_remaining_packages() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "a.app", &pkg("a", &[]));
    write_package(dir.path(), "b.app", &pkg("b", &[]));
    write_package(dir.path(), "c.app", &pkg("c", &[]));

    let registry = MockRegistry::new().failing("b");
    let logger = Logger::quiet();
    let options = UploadOptions {
        halt_on_error: true,
        ..UploadOptions::default()
    };
    let report = Pipeline::new(&registry, &logger, options)
        .run(dir.path(), "DE", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(registry.uploaded_ids(), vec!["a", "b"]);
    assert!(matches!(
        report.results[2].outcome,
        UploadOutcome::Skipped { .. }
    ));
    assert!(!report.cancelled);
}

/// Cancels the run once the first package has finished.
struct CancelAfterFirst {
    token: CancellationToken,
    seen: Mutex<Vec<String>>,
}

impl ProgressSink for CancelAfterFirst {
    fn started(&self, progress: &UploadProgress) {
        self.seen.lock().unwrap().push(progress.app_id.clone());
    }

    fn finished(&self, _progress: &UploadProgress, _result: &UploadResult) {
        self.token.cancel();
    }
}

#[tokio::test]
async fn cancellation_is_honoured_between_packages() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "a.app", &pkg("a", &[]));
    write_package(dir.path(), "b.app", &pkg("b", &[]));
    write_package(dir.path(), "c.app", &pkg("c", &[]));

    let token = CancellationToken::new();
    let sink = CancelAfterFirst {
        token: token.clone(),
        seen: Mutex::new(Vec::new()),
    };
    let registry = MockRegistry::new();
    let logger = Logger::quiet();
    let report = Pipeline::new(&registry, &logger, UploadOptions::default())
        .with_sink(&sink)
        .run(dir.path(), "DE", &token)
        .await
        .unwrap();

    assert_eq!(registry.uploaded_ids(), vec!["a"]);
    assert_eq!(*sink.seen.lock().unwrap(), vec!["a".to_string()]);
    assert!(report.cancelled);
    assert_eq!(report.skipped(), 2);
    assert!(matches!(report.into_result(), Err(SynfameError::Cancelled)));
}

#[tokio::test]
async fn unauthenticated_registry_is_refused_before_scanning() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "a.app", &pkg("a", &[]));

    let registry = MockRegistry::default();
    let logger = Logger::quiet();
    let err = Pipeline::new(&registry, &logger, UploadOptions::default())
        .run(dir.path(), "DE", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SynfameError::NotAuthenticated));
    assert!(registry.list_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cyclic_batch_fails_before_any_registry_call() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "a.app", &pkg("a", &["b"]));
    write_package(dir.path(), "b.app", &pkg("b", &["a"]));

    let registry = MockRegistry::new();
    let logger = Logger::quiet();
    let err = Pipeline::new(&registry, &logger, UploadOptions::default())
        .run(dir.path(), "DE", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SynfameError::Cycle { .. }));
    assert!(registry.list_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_directory_yields_empty_report() {
    let dir = tempdir().unwrap();
    let registry = MockRegistry::new();
    let logger = Logger::quiet();
    let report = Pipeline::new(&registry, &logger, UploadOptions::default())
        .run(dir.path(), "DE", &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.results.is_empty());
    assert!(registry.list_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn deprecated_availability_is_refused() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "a.app", &pkg("a", &[]));
    let registry = MockRegistry::new();
    let logger = Logger::quiet();
    let options = UploadOptions {
        availability: Availability::Deprecated,
        ..UploadOptions::default()
    };
    let err = Pipeline::new(&registry, &logger, options)
        .run(dir.path(), "DE", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SynfameError::Config(_)));
    assert!(registry.add_calls.lock().unwrap().is_empty());
}

#[test]
fn scan_rejects_bad_files_and_ignores_other_extensions() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "a.app", &pkg("a", &[]));
    write_package(dir.path(), "UPPER.APP", &pkg("upper", &[]));
    write_package(dir.path(), "dup.app", &pkg("A", &[]));
    std::fs::write(dir.path().join("junk.app"), b"not a package at all").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let batch = UploadBatch::scan(dir.path(), &Logger::quiet()).unwrap();
    assert_eq!(batch.files().collect::<Vec<_>>(), vec!["UPPER.APP", "a.app"]);
    assert_eq!(batch.by_app_id("UPPER").unwrap().file_name, "UPPER.APP");
    assert!(batch.by_file("notes.txt").is_none());

    let rejected = batch.rejected();
    assert_eq!(rejected.len(), 2);
    assert_eq!(rejected[0].file, "dup.app");
    assert!(rejected[0].reason.contains("already provided by a.app"));
    assert_eq!(rejected[1].file, "junk.app");
    assert_eq!(rejected[1].reason, "header mismatch");
}

#[test]
fn plan_orders_without_touching_the_registry() {
    let dir = tempdir().unwrap();
    write_package(dir.path(), "1.app", &pkg("top", &["mid"]));
    write_package(dir.path(), "2.app", &pkg("mid", &["base"]));
    write_package(dir.path(), "3.app", &BASE);

    let registry = MockRegistry::default();
    let logger = Logger::quiet();
    let plan = Pipeline::new(&registry, &logger, UploadOptions::default())
        .plan(dir.path())
        .unwrap();
    let order: Vec<_> = plan.ordered.iter().map(|p| p.app_id.as_str()).collect();
    assert_eq!(order, vec!["base", "mid", "top"]);
    assert!(registry.list_calls.lock().unwrap().is_empty());
}
