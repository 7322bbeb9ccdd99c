use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fnstage_cloud::client::{FunctionError, FunctionOp, GcloudClient};
use fnstage_cloud::executor::GcloudExecutor;
use fnstage_cloud::gcloud::GcloudError;
use fnstage_cloud::lifecycle::{
    DeleteOutcome, DeployOutcome, Lifecycle, LifecycleError, LifecycleOptions, StatusState,
};
use fnstage_cloud::platform::{
    Deletion, DeployRequest, DeployedFunction, FunctionPlatform, GcloudFunctions, RemoteState,
};
use fnstage_core::{
    FunctionDescriptor, ManifestStore, Prefix, ResourceId, TargetOrigin, TriggerKind,
};

/// In-memory Cloud Functions: a map of live function ids to URLs.
#[derive(Default)]
struct FakePlatform {
    live: Mutex<BTreeMap<String, String>>,
    failing: BTreeSet<String>,
    gcloud_missing: bool,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakePlatform {
    fn failing_on(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|s| (*s).to_owned()).collect(),
            ..Self::default()
        }
    }

    fn live_ids(&self) -> Vec<String> {
        self.live.lock().unwrap().keys().cloned().collect()
    }

    fn seed(&self, id: &str) {
        self.live
            .lock()
            .unwrap()
            .insert(id.to_owned(), format!("https://fake/{id}"));
    }

    async fn call(&self, id: &ResourceId, op: FunctionOp) -> Result<(), FunctionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.gcloud_missing {
            return Err(FunctionError::Unavailable {
                source: GcloudError::NotFound {
                    program: "gcloud".to_owned(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                },
            });
        }
        if self.failing.contains(id.as_str()) {
            return Err(FunctionError::Command {
                name: id.to_string(),
                op,
                source: GcloudError::CommandFailed {
                    args: vec![],
                    stderr: "INTERNAL: injected".to_owned(),
                },
            });
        }
        Ok(())
    }
}

impl FunctionPlatform for FakePlatform {
    async fn deploy_function(
        &self,
        request: DeployRequest<'_>,
    ) -> Result<DeployedFunction, FunctionError> {
        self.call(request.resource_id, FunctionOp::Deploy).await?;
        let url = format!("https://fake/{}", request.resource_id);
        self.live
            .lock()
            .unwrap()
            .insert(request.resource_id.to_string(), url.clone());
        Ok(DeployedFunction {
            resource_id: request.resource_id.clone(),
            url: Some(url),
        })
    }

    async fn delete_function(&self, id: &ResourceId) -> Result<Deletion, FunctionError> {
        self.call(id, FunctionOp::Delete).await?;
        Ok(match self.live.lock().unwrap().remove(id.as_str()) {
            Some(_) => Deletion::Deleted,
            None => Deletion::AlreadyAbsent,
        })
    }

    async fn function_status(&self, id: &ResourceId) -> Result<RemoteState, FunctionError> {
        self.call(id, FunctionOp::Describe).await?;
        Ok(match self.live.lock().unwrap().get(id.as_str()) {
            Some(url) => RemoteState::Active {
                url: Some(url.clone()),
            },
            None => RemoteState::Absent,
        })
    }
}

fn descriptor(name: &str) -> FunctionDescriptor {
    FunctionDescriptor {
        local_name: name.to_owned(),
        entry_point: "helloWorld".to_owned(),
        runtime: "nodejs20".to_owned(),
        trigger: TriggerKind::Http,
        source: PathBuf::from(format!("functions/{name}")),
        memory: None,
        timeout: None,
        gen2: false,
    }
}

fn descriptors(names: &[&str]) -> Vec<FunctionDescriptor> {
    names.iter().map(|n| descriptor(n)).collect()
}

fn prefix(p: &str) -> Prefix {
    Prefix::new(p).unwrap()
}

fn options(max_parallel: usize, fail_fast: bool) -> LifecycleOptions {
    LifecycleOptions {
        max_parallel,
        fail_fast,
    }
}

// ── Deploy / Delete properties ──

#[tokio::test]
async fn deploy_then_delete_end_to_end() {
    let platform = FakePlatform::default();
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::default());
    let fns = descriptors(&["func1", "func2"]);
    let p = prefix("myprefix");

    let report = lifecycle.deploy(&fns, &p).await.unwrap();
    assert!(report.is_success());
    let ids: Vec<_> = report.entries.iter().map(|e| e.resource_id.as_str()).collect();
    assert_eq!(ids, vec!["myprefix-func1", "myprefix-func2"]);
    assert_eq!(
        report.entries[0].outcome,
        DeployOutcome::Deployed {
            url: Some("https://fake/myprefix-func1".to_owned())
        }
    );
    assert_eq!(platform.live_ids(), vec!["myprefix-func1", "myprefix-func2"]);

    let status = lifecycle.status(&fns, &p).await.unwrap();
    assert_eq!(status.active().count(), 2);

    let report = lifecycle.delete(&fns, &p).await.unwrap();
    assert!(report.is_success());
    assert!(report
        .entries
        .iter()
        .all(|e| e.outcome == DeleteOutcome::Deleted));
    assert!(platform.live_ids().is_empty());

    let status = lifecycle.status(&fns, &p).await.unwrap();
    assert!(status
        .entries
        .iter()
        .all(|e| e.state == StatusState::Remote(RemoteState::Absent)));
}

#[tokio::test]
async fn deploy_twice_updates_in_place() {
    let platform = FakePlatform::default();
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::default());
    let fns = descriptors(&["a", "b"]);
    let p = prefix("stage");

    lifecycle.deploy(&fns, &p).await.unwrap();
    let first = platform.live_ids();
    let report = lifecycle.deploy(&fns, &p).await.unwrap();

    assert!(report.is_success());
    assert_eq!(platform.live_ids(), first);
}

#[tokio::test]
async fn prefixes_do_not_interfere() {
    let platform = FakePlatform::default();
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::default());
    let fns = descriptors(&["hello", "hello-world"]);

    lifecycle.deploy(&fns, &prefix("alice")).await.unwrap();
    lifecycle.deploy(&fns, &prefix("bob")).await.unwrap();
    assert_eq!(platform.live_ids().len(), 4);

    lifecycle.delete(&fns, &prefix("alice")).await.unwrap();

    assert_eq!(platform.live_ids(), vec!["bob-hello", "bob-hello-world"]);
}

#[tokio::test]
async fn delete_never_deployed_prefix_is_success() {
    let platform = FakePlatform::default();
    platform.seed("other-func1");
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::default());

    let report = lifecycle
        .delete(&descriptors(&["func1"]), &prefix("ghost"))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.entries[0].outcome, DeleteOutcome::AlreadyAbsent);
    assert_eq!(platform.live_ids(), vec!["other-func1"]);
}

#[tokio::test]
async fn empty_function_list_is_a_no_op() {
    let platform = FakePlatform::default();
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::default());

    let report = lifecycle.deploy(&[], &prefix("dev")).await.unwrap();

    assert!(report.entries.is_empty());
    assert!(report.is_success());
    assert_eq!(platform.calls.load(Ordering::SeqCst), 0);
}

// ── Failure policy ──

#[tokio::test]
async fn fail_soft_attempts_every_function() {
    let platform = FakePlatform::failing_on(&["dev-b"]);
    let lifecycle = Lifecycle::new(&platform, options(1, false));

    let report = lifecycle
        .deploy(&descriptors(&["a", "b", "c"]), &prefix("dev"))
        .await
        .unwrap();

    assert!(!report.is_success());
    let failed: Vec<_> = report.failures().map(|e| e.local_name.as_str()).collect();
    assert_eq!(failed, vec!["b"]);
    assert!(matches!(
        &report.entries[1].outcome,
        DeployOutcome::Failed { error } if error.contains("injected")
    ));
    assert_eq!(platform.live_ids(), vec!["dev-a", "dev-c"]);
}

#[tokio::test]
async fn fail_fast_skips_the_rest() {
    let platform = FakePlatform::failing_on(&["dev-b"]);
    let lifecycle = Lifecycle::new(&platform, options(1, true));

    let report = lifecycle
        .deploy(&descriptors(&["a", "b", "c", "d"]), &prefix("dev"))
        .await
        .unwrap();

    let outcomes: Vec<_> = report.entries.iter().map(|e| &e.outcome).collect();
    assert!(matches!(outcomes[0], DeployOutcome::Deployed { .. }));
    assert!(matches!(outcomes[1], DeployOutcome::Failed { .. }));
    assert_eq!(outcomes[2], &DeployOutcome::Skipped);
    assert_eq!(outcomes[3], &DeployOutcome::Skipped);
    assert_eq!(platform.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_gcloud_aborts_the_batch() {
    let platform = FakePlatform {
        gcloud_missing: true,
        ..FakePlatform::default()
    };
    let lifecycle = Lifecycle::new(&platform, options(1, false));

    let err = lifecycle
        .deploy(&descriptors(&["a", "b", "c"]), &prefix("dev"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::Submission {
            source: FunctionError::Unavailable { .. }
        }
    ));
    assert_eq!(platform.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn delete_failure_is_reported_per_function() {
    let platform = FakePlatform::failing_on(&["dev-b"]);
    platform.seed("dev-a");
    platform.seed("dev-b");
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::default());

    let report = lifecycle
        .delete(&descriptors(&["a", "b"]), &prefix("dev"))
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.entries[0].outcome, DeleteOutcome::Deleted);
    assert_eq!(report.failures().count(), 1);
    assert_eq!(platform.live_ids(), vec!["dev-b"]);
}

#[tokio::test]
async fn invalid_resource_id_fails_before_any_call() {
    let platform = FakePlatform::default();
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::default());
    let long = "f".repeat(60);

    let err = lifecycle
        .deploy(&descriptors(&["ok", long.as_str()]), &prefix("dev"))
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Descriptor(_)));
    assert_eq!(platform.calls.load(Ordering::SeqCst), 0);
}

// ── Concurrency ──

#[tokio::test(start_paused = true)]
async fn concurrency_is_bounded_and_order_preserved() {
    let platform = FakePlatform {
        delay: Duration::from_millis(50),
        ..FakePlatform::default()
    };
    let lifecycle = Lifecycle::new(&platform, options(2, false));
    let names = ["f1", "f2", "f3", "f4", "f5"];

    let report = lifecycle
        .deploy(&descriptors(&names), &prefix("dev"))
        .await
        .unwrap();

    assert_eq!(platform.peak.load(Ordering::SeqCst), 2);
    let order: Vec<_> = report.entries.iter().map(|e| e.local_name.as_str()).collect();
    assert_eq!(order, names);
}

#[tokio::test(start_paused = true)]
async fn zero_max_parallel_still_runs_sequentially() {
    let platform = FakePlatform {
        delay: Duration::from_millis(10),
        ..FakePlatform::default()
    };
    let lifecycle = Lifecycle::new(&platform, options(0, false));

    let report = lifecycle
        .deploy(&descriptors(&["a", "b"]), &prefix("dev"))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(platform.peak.load(Ordering::SeqCst), 1);
}

// ── Manifest ──

#[tokio::test]
async fn deploy_records_manifest_and_delete_prunes_it() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ManifestStore::in_project(tmp.path());
    let platform = FakePlatform::default();
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::default()).with_manifests(
        store.clone(),
        Some("proj".to_owned()),
        "us-central1",
    );
    let p = prefix("dev");

    lifecycle.deploy(&descriptors(&["a", "b"]), &p).await.unwrap();
    let manifest = store.load(&p).unwrap().unwrap();
    assert_eq!(manifest.resources.len(), 2);
    assert_eq!(manifest.gcp_project_id.as_deref(), Some("proj"));
    assert_eq!(
        manifest.resources[0].url.as_deref(),
        Some("https://fake/dev-a")
    );

    lifecycle.delete(&descriptors(&["a", "b"]), &p).await.unwrap();
    assert!(store.load(&p).unwrap().is_none());
}

#[tokio::test]
async fn delete_reaches_functions_removed_from_config() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ManifestStore::in_project(tmp.path());
    let platform = FakePlatform::default();
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::default()).with_manifests(
        store.clone(),
        None,
        "us-central1",
    );
    let p = prefix("dev");

    lifecycle
        .deploy(&descriptors(&["kept", "renamed"]), &p)
        .await
        .unwrap();

    let status = lifecycle.status(&descriptors(&["kept"]), &p).await.unwrap();
    assert_eq!(status.entries.len(), 2);
    assert_eq!(status.entries[1].origin, TargetOrigin::ManifestOnly);

    let report = lifecycle.delete(&descriptors(&["kept"]), &p).await.unwrap();

    assert!(report.is_success());
    let origins: Vec<_> = report
        .entries
        .iter()
        .map(|e| (e.resource_id.as_str(), e.origin))
        .collect();
    assert_eq!(
        origins,
        vec![
            ("dev-kept", TargetOrigin::Declared),
            ("dev-renamed", TargetOrigin::ManifestOnly),
        ]
    );
    assert!(platform.live_ids().is_empty());
}

#[tokio::test]
async fn failed_delete_stays_in_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ManifestStore::in_project(tmp.path());
    let p = prefix("dev");

    let healthy = FakePlatform::default();
    Lifecycle::new(&healthy, LifecycleOptions::default())
        .with_manifests(store.clone(), None, "r")
        .deploy(&descriptors(&["a", "b"]), &p)
        .await
        .unwrap();

    let flaky = FakePlatform::failing_on(&["dev-b"]);
    flaky.seed("dev-a");
    flaky.seed("dev-b");
    let report = Lifecycle::new(&flaky, LifecycleOptions::default())
        .with_manifests(store.clone(), None, "r")
        .delete(&[], &p)
        .await
        .unwrap();

    assert!(!report.is_success());
    let manifest = store.load(&p).unwrap().unwrap();
    let left: Vec<_> = manifest.resource_ids().map(|id| id.as_str()).collect();
    assert_eq!(left, vec!["dev-b"]);
}

// ── Source checks through the gcloud platform ──

mockall::mock! {
    Executor {}

    impl GcloudExecutor for Executor {
        async fn exec(&self, args: &[String]) -> Result<String, GcloudError>;
        async fn exec_streaming(&self, args: &[String]) -> Result<(), GcloudError>;
    }
}

#[tokio::test]
async fn missing_source_fails_only_its_own_function() {
    let tmp = tempfile::tempdir().unwrap();
    let present = tmp.path().join("functions/present");
    std::fs::create_dir_all(&present).unwrap();
    std::fs::write(present.join("index.js"), "exports.helloWorld = () => {};").unwrap();

    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| args.iter().any(|a| a == "dev-present"))
        .times(1)
        .returning(|_| Ok(r#"{"status":"ACTIVE"}"#.to_owned()));

    let platform = GcloudFunctions::new(GcloudClient::with_executor(mock), "proj", "r", tmp.path());
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::default());

    let report = lifecycle
        .deploy(&descriptors(&["absent", "present"]), &prefix("dev"))
        .await
        .unwrap();

    assert!(matches!(
        &report.entries[0].outcome,
        DeployOutcome::Failed { error } if error.contains("does not exist")
    ));
    assert_eq!(
        report.entries[1].outcome,
        DeployOutcome::Deployed { url: None }
    );
}

#[tokio::test]
async fn unknown_location_keeps_functions_in_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ManifestStore::in_project(tmp.path());
    let p = prefix("dev");

    let healthy = FakePlatform::default();
    Lifecycle::new(&healthy, LifecycleOptions::default())
        .with_manifests(store.clone(), None, "us-central1")
        .deploy(&descriptors(&["a"]), &p)
        .await
        .unwrap();

    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_| {
        Err(GcloudError::CommandFailed {
            args: vec![],
            stderr: "NOT_FOUND: Location projects/p/locations/us-centrall not found".to_owned(),
        })
    });
    let platform = GcloudFunctions::new(GcloudClient::with_executor(mock), "p", "us-centrall", tmp.path());
    let report = Lifecycle::new(&platform, LifecycleOptions::default())
        .with_manifests(store.clone(), None, "us-centrall")
        .delete(&descriptors(&["a"]), &p)
        .await
        .unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        report.entries[0].outcome,
        DeleteOutcome::Failed { .. }
    ));
    let manifest = store.load(&p).unwrap().unwrap();
    let left: Vec<_> = manifest.resource_ids().map(|id| id.as_str()).collect();
    assert_eq!(left, vec!["dev-a"]);
}
