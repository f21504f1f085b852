//! Job pipeline integration tests
//!
//! Drives jobs through the public driver API with the in-process runtime and
//! coordinator, plus one opt-in test against a real docker daemon.

use std::sync::Arc;
use std::time::Duration;

use provider_agent::collector::sha256_hex;
use provider_agent::coordinator::MockCoordinator;
use provider_agent::domain::{FAILURE_EXIT_CODE, Job};
use provider_agent::driver::{Driver, DriverConfig};
use provider_agent::executor::{ContainerExecutor, ExecutorConfig};
use provider_agent::journal::ResultJournal;
use provider_agent::runtime::{ContainerRuntime, ContainerSpec, DockerCli, MockBehavior, MockRuntime};
use tempfile::TempDir;

fn driver_with(runtime: Arc<dyn ContainerRuntime>, coordinator: Arc<MockCoordinator>, dir: &TempDir) -> Driver {
    let executor = ContainerExecutor::new(runtime, ExecutorConfig::new(dir.path().join("outputs")));
    let journal = ResultJournal::open(dir.path().join("state")).unwrap();
    Driver::new(DriverConfig::new(Duration::from_millis(10)), executor, coordinator, journal)
}

fn echo_job() -> Job {
    Job::new(
        "j1",
        "alpine",
        vec!["sh".into(), "-c".into(), "echo hi > /out/result.txt".into()],
    )
    .with_output("/result.txt")
}

/// j1 / alpine / `echo hi > /out/result.txt` yields one artifact for "hi\n"
#[tokio::test]
async fn test_echo_job_end_to_end() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(MockRuntime::new().with_image("alpine", MockBehavior::success(&[("/result.txt", b"hi\n")])));
    let coordinator = Arc::new(MockCoordinator::new().with_batch(vec![echo_job()]));
    let mut driver = driver_with(runtime, coordinator.clone(), &dir);

    let cycle = driver.run_cycle().await;
    assert_eq!(cycle.reported, 1);

    let submitted = coordinator.submitted();
    assert_eq!(submitted.len(), 1);
    let result = &submitted[0];
    assert_eq!(result.job_id, "j1");
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.artifacts.len(), 1);
    assert_eq!(result.artifacts[0].path, "/result.txt");
    assert_eq!(result.artifacts[0].sha256, sha256_hex(b"hi\n"));
    assert_eq!(result.artifacts[0].size, 3);
    assert_eq!(result.artifacts[0].local_uri, "/outputs/j1/result.txt");

    // Bytes on disk hash to the reported digest
    let on_disk = std::fs::read(dir.path().join("outputs/j1/result.txt")).unwrap();
    assert_eq!(sha256_hex(&on_disk), result.artifacts[0].sha256);
}

/// A nonexistent image yields the failure sentinel and a diagnostic
#[tokio::test]
async fn test_nonexistent_image_end_to_end() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(MockRuntime::new());
    let job = Job::new("j-missing", "does-not-exist:404", vec![]).with_output("/result.txt");
    let coordinator = Arc::new(MockCoordinator::new().with_batch(vec![job]));
    let mut driver = driver_with(runtime, coordinator.clone(), &dir);

    driver.run_cycle().await;

    let result = &coordinator.submitted()[0];
    assert_eq!(result.job_id, "j-missing");
    assert_eq!(result.exit_code, FAILURE_EXIT_CODE);
    assert!(result.artifacts.is_empty());
    assert!(!result.stderr_tail.is_empty());
    assert!(result.stderr_tail.contains("does-not-exist:404"));
}

/// Two declared outputs, one written: exit 0 with exactly one artifact
#[tokio::test]
async fn test_missing_declared_output_is_not_failure() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(MockRuntime::new().with_image("alpine", MockBehavior::success(&[("/a.txt", b"a")])));
    let job = Job::new("j2", "alpine", vec![]).with_output("/a.txt").with_output("/b.txt");
    let coordinator = Arc::new(MockCoordinator::new().with_batch(vec![job]));
    let mut driver = driver_with(runtime, coordinator.clone(), &dir);

    driver.run_cycle().await;

    let result = &coordinator.submitted()[0];
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.artifacts.len(), 1);
    assert_eq!(result.artifacts[0].path, "/a.txt");
}

/// A traversal in a declared output never reads outside the job directory
#[tokio::test]
async fn test_output_traversal_neutralized() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("outputs")).unwrap();
    std::fs::write(dir.path().join("outputs/other.txt"), b"another job's data").unwrap();
    let runtime = Arc::new(MockRuntime::new().with_image("alpine", MockBehavior::success(&[])));
    let job = Job::new("j3", "alpine", vec![]).with_output("/../other.txt");
    let coordinator = Arc::new(MockCoordinator::new().with_batch(vec![job]));
    let mut driver = driver_with(runtime, coordinator.clone(), &dir);

    driver.run_cycle().await;

    let result = &coordinator.submitted()[0];
    assert_eq!(result.exit_code, 0);
    assert!(result.artifacts.is_empty());
}

/// A job id with a traversal sequence is reported as failed, nothing is created
#[tokio::test]
async fn test_job_id_traversal_rejected() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(MockRuntime::new().with_image("alpine", MockBehavior::success(&[])));
    let job = Job::new("../../tmp", "alpine", vec![]);
    let coordinator = Arc::new(MockCoordinator::new().with_batch(vec![job]));
    let mut driver = driver_with(runtime.clone(), coordinator.clone(), &dir);

    driver.run_cycle().await;

    let result = &coordinator.submitted()[0];
    assert_eq!(result.exit_code, FAILURE_EXIT_CODE);
    assert!(runtime.created().is_empty());
}

/// Re-collecting an unchanged job yields identical results
#[tokio::test]
async fn test_reprocessing_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(MockRuntime::new().with_image("alpine", MockBehavior::success(&[("/result.txt", b"hi\n")])));
    let coordinator = Arc::new(MockCoordinator::new());
    let driver = driver_with(runtime, coordinator, &dir);

    let first = driver.process_job(&echo_job()).await;
    let second = driver.process_job(&echo_job()).await;

    assert_eq!(first.artifacts, second.artifacts);
}

/// A re-delivered job reports only what its latest run wrote
#[tokio::test]
async fn test_redelivered_job_reports_only_fresh_outputs() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(
        MockRuntime::new()
            .with_image("writer", MockBehavior::success(&[("/result.txt", b"first run")]))
            .with_image("silent", MockBehavior::success(&[])),
    );
    let driver = driver_with(runtime, Arc::new(MockCoordinator::new()), &dir);

    let first = driver
        .process_job(&Job::new("j1", "writer", vec![]).with_output("/result.txt"))
        .await;
    assert_eq!(first.artifacts.len(), 1);

    let second = driver
        .process_job(&Job::new("j1", "silent", vec![]).with_output("/result.txt"))
        .await;
    assert_eq!(second.exit_code, 0);
    assert!(second.artifacts.is_empty());
}

/// A container left behind by a crashed run does not block the job
#[tokio::test]
async fn test_leftover_container_does_not_block_job() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(MockRuntime::new().with_image("alpine", MockBehavior::success(&[("/result.txt", b"hi\n")])));
    runtime
        .create(&ContainerSpec {
            name: "job-j1".to_string(),
            image: "alpine".to_string(),
            cmd: vec![],
            mounts: vec![],
        })
        .await
        .unwrap();
    let driver = driver_with(runtime.clone(), Arc::new(MockCoordinator::new()), &dir);

    let result = driver.process_job(&echo_job()).await;

    assert_eq!(result.exit_code, 0, "stderr: {}", result.stderr_tail);
    assert_eq!(result.artifacts.len(), 1);
    assert_eq!(runtime.live_containers(), 0);
}

/// One bad job in a batch does not stop the rest
#[tokio::test]
async fn test_failure_does_not_abort_batch() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(
        MockRuntime::new()
            .with_image("alpine", MockBehavior::success(&[("/result.txt", b"hi\n")]))
            .with_image("broken", MockBehavior::FailWait("unexpected EOF".into())),
    );
    let coordinator = Arc::new(MockCoordinator::new().with_batch(vec![
        Job::new("first", "broken", vec![]),
        Job::new("second", "", vec![]),
        echo_job(),
    ]));
    let mut driver = driver_with(runtime, coordinator.clone(), &dir);

    let cycle = driver.run_cycle().await;

    assert_eq!(cycle.polled, 3);
    assert_eq!(cycle.failed, 2);
    assert_eq!(cycle.succeeded, 1);
    let exit_codes: Vec<i64> = coordinator.submitted().iter().map(|r| r.exit_code).collect();
    assert_eq!(exit_codes, vec![FAILURE_EXIT_CODE, FAILURE_EXIT_CODE, 0]);
}

/// Unreported results survive a restart and are replayed
#[tokio::test]
async fn test_unreported_result_replayed_after_restart() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(MockRuntime::new().with_image("alpine", MockBehavior::success(&[("/result.txt", b"hi\n")])));

    {
        let coordinator = Arc::new(
            MockCoordinator::new()
                .with_batch(vec![echo_job()])
                .with_failing_submissions(1),
        );
        let mut driver = driver_with(runtime.clone(), coordinator.clone(), &dir);
        let cycle = driver.run_cycle().await;
        assert_eq!(cycle.report_failures, 1);
    }

    let coordinator = Arc::new(MockCoordinator::new());
    let mut driver = driver_with(runtime, coordinator.clone(), &dir);
    assert_eq!(driver.journal().pending().len(), 1);

    let replay = driver.replay_pending().await;

    assert_eq!(replay.replayed, 1);
    assert_eq!(coordinator.submitted()[0].job_id, "j1");
    assert_eq!(coordinator.submitted()[0].artifacts[0].size, 3);
}

/// Requires a local docker daemon and the alpine image:
/// `cargo test -- --ignored test_docker_echo_job`
#[tokio::test]
#[ignore]
async fn test_docker_echo_job() {
    let dir = TempDir::new().unwrap();
    let runtime = Arc::new(DockerCli::default());
    runtime.ping().await.expect("docker daemon reachable");
    let coordinator = Arc::new(MockCoordinator::new());
    let driver = driver_with(runtime, coordinator, &dir);

    let job = Job::new(
        format!("it-{}", std::process::id()),
        "alpine",
        vec!["sh".into(), "-c".into(), "echo hi > /out/result.txt; exit 0".into()],
    )
    .with_output("/result.txt");
    let result = driver.process_job(&job).await;

    assert_eq!(result.exit_code, 0, "stderr: {}", result.stderr_tail);
    assert_eq!(result.artifacts.len(), 1);
    assert_eq!(result.artifacts[0].sha256, sha256_hex(b"hi\n"));
    assert_eq!(result.artifacts[0].size, 3);

    let failing = Job::new(format!("it-fail-{}", std::process::id()), "alpine", vec!["sh".into(), "-c".into(), "exit 7".into()]);
    assert_eq!(driver.process_job(&failing).await.exit_code, 7);
}
