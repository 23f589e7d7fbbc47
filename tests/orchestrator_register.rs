mod common;
use crate::common::{drain_hub, drain_reply, init_tracing, messages, with_timeout, Workspace};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use rebuildd::engine::RegisterOutcome;
use rebuildd::registry::{BuildStatus, Registry};
use rebuildd::transport::ServerEvent;
use rebuildd_test_utils::fake_toolchain::FakeToolchain;

type TestResult = Result<(), Box<dyn Error>>;

fn statuses(events: &[ServerEvent]) -> Vec<(String, BuildStatus)> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::RegistryUpdate(r) => Some((r.id.clone(), r.status)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn registering_new_program_builds_and_broadcasts() -> TestResult {
    init_tracing();
    let ws = Workspace::new();
    let location = ws.add_program("proj-a");

    let toolchain = FakeToolchain::new();
    toolchain.set_revision("proj-a", "r1");
    let orchestrator = ws.orchestrator(toolchain.clone());
    let mut hub_rx = orchestrator.hub().subscribe();
    let (reply, mut reply_rx) = mpsc::unbounded_channel();

    let outcome = with_timeout(orchestrator.register(&location.to_string_lossy(), &reply)).await;
    let RegisterOutcome::Completed(record) = outcome else {
        panic!("expected completed build, got {outcome:?}");
    };
    assert_eq!(record.name, "proj-a");
    assert_eq!(record.revision, "r1");
    assert_eq!(record.location.as_deref(), Some(location.as_path()));

    assert_eq!(
        statuses(&drain_hub(&mut hub_rx)),
        vec![
            ("proj-a/r1".to_string(), BuildStatus::Building),
            ("proj-a/r1".to_string(), BuildStatus::Completed),
        ]
    );

    let artifacts = ws.artifacts().join("proj-a").join("r1");
    assert!(artifacts.join("proj-a").is_file());
    assert!(artifacts.join("proj-a.o").is_file());

    let replies = drain_reply(&mut reply_rx);
    assert!(replies.iter().all(|e| matches!(
        e,
        ServerEvent::BuildOutput { program, .. } if program == "proj-a"
    )));
    assert!(messages(&replies).iter().any(|m| m.starts_with("build-tool: ")));

    // Persisted to disk.
    let mut reloaded = Registry::new(ws.registry_path());
    reloaded.setup(true);
    assert_eq!(
        reloaded.get_program("proj-a", "r1").map(|r| r.status),
        Some(BuildStatus::Completed)
    );
    Ok(())
}

#[tokio::test]
async fn registering_same_revision_twice_is_a_no_op() -> TestResult {
    init_tracing();
    let ws = Workspace::new();
    let location = ws.add_program("hello");

    let toolchain = FakeToolchain::new();
    toolchain.set_revision("hello", "r1");
    let orchestrator = ws.orchestrator(toolchain.clone());
    let (reply, mut reply_rx) = mpsc::unbounded_channel();
    let location = location.to_string_lossy().into_owned();

    let first = orchestrator.register(&location, &reply).await;
    assert!(matches!(first, RegisterOutcome::Completed(_)));
    drain_reply(&mut reply_rx);

    let mut hub_rx = orchestrator.hub().subscribe();
    let second = orchestrator.register(&location, &reply).await;
    assert!(matches!(second, RegisterOutcome::AlreadyRegistered(ref r) if r.status == BuildStatus::Completed));

    assert_eq!(toolchain.build_count("hello"), 1);
    assert_eq!(orchestrator.snapshot().len(), 1);
    assert!(drain_hub(&mut hub_rx).is_empty());
    assert!(
        messages(&drain_reply(&mut reply_rx))
            .iter()
            .any(|m| m.contains("already registered"))
    );
    Ok(())
}

#[tokio::test]
async fn missing_location_reports_and_changes_nothing() -> TestResult {
    let ws = Workspace::new();
    let orchestrator = ws.orchestrator(FakeToolchain::new());
    let (reply, mut reply_rx) = mpsc::unbounded_channel();
    let location = ws.root().join("src").join("ghost");

    let outcome = orchestrator.register(&location.to_string_lossy(), &reply).await;
    assert_eq!(outcome, RegisterOutcome::NotFound);
    assert!(orchestrator.snapshot().is_empty());

    let msgs = messages(&drain_reply(&mut reply_rx));
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].starts_with("no program found"));
    Ok(())
}

#[tokio::test]
async fn unversioned_location_reports_revision_failure() -> TestResult {
    let ws = Workspace::new();
    let location = ws.add_program("loose");
    let orchestrator = ws.orchestrator(FakeToolchain::new());
    let (reply, mut reply_rx) = mpsc::unbounded_channel();

    let outcome = orchestrator.register(&location.to_string_lossy(), &reply).await;
    assert_eq!(outcome, RegisterOutcome::RevisionUnavailable);
    assert!(orchestrator.snapshot().is_empty());
    assert!(
        messages(&drain_reply(&mut reply_rx))
            .iter()
            .any(|m| m.starts_with("failed to get revision"))
    );
    Ok(())
}

#[tokio::test]
async fn failing_build_is_recorded_and_error_relayed() -> TestResult {
    init_tracing();
    let ws = Workspace::new();
    let location = ws.add_program("broken");

    let toolchain = FakeToolchain::new();
    toolchain.set_revision("broken", "r1");
    toolchain.fail_build("broken", "broken.c:3: error: undeclared identifier");
    let orchestrator = ws.orchestrator(toolchain);
    let mut hub_rx = orchestrator.hub().subscribe();
    let (reply, mut reply_rx) = mpsc::unbounded_channel();

    let outcome = orchestrator.register(&location.to_string_lossy(), &reply).await;
    let RegisterOutcome::Failed(record) = outcome else {
        panic!("expected failed build, got {outcome:?}");
    };
    assert_eq!(record.status, BuildStatus::Failed);

    assert_eq!(
        statuses(&drain_hub(&mut hub_rx)),
        vec![
            ("broken/r1".to_string(), BuildStatus::Building),
            ("broken/r1".to_string(), BuildStatus::Failed),
        ]
    );
    assert!(
        messages(&drain_reply(&mut reply_rx))
            .iter()
            .any(|m| m.contains("undeclared identifier"))
    );
    assert!(!ws.artifacts().join("broken").join("r1").exists());
    Ok(())
}

#[tokio::test]
async fn pull_failure_is_relayed_but_build_proceeds() -> TestResult {
    let ws = Workspace::new();
    let location = ws.add_program("offline");

    let toolchain = FakeToolchain::new();
    toolchain.set_revision("offline", "r1");
    toolchain.fail_pull("offline");
    let orchestrator = ws.orchestrator(toolchain);
    let (reply, mut reply_rx) = mpsc::unbounded_channel();

    let outcome = orchestrator.register(&location.to_string_lossy(), &reply).await;
    assert!(matches!(outcome, RegisterOutcome::Completed(_)));
    assert!(
        messages(&drain_reply(&mut reply_rx))
            .iter()
            .any(|m| m.starts_with("git pull: "))
    );
    Ok(())
}

#[tokio::test]
async fn concurrent_registrations_of_same_pair_build_once() -> TestResult {
    init_tracing();
    let ws = Workspace::new();
    let location = ws.add_program("racer");

    let toolchain = FakeToolchain::new();
    toolchain.set_revision("racer", "r1");
    toolchain.hold_builds();
    let orchestrator = ws.orchestrator(toolchain.clone());
    let location = location.to_string_lossy().into_owned();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let orchestrator = Arc::clone(&orchestrator);
        let location = location.clone();
        handles.push(tokio::spawn(async move {
            let (reply, _reply_rx) = mpsc::unbounded_channel();
            orchestrator.register(&location, &reply).await
        }));
    }

    // Let every request reach the dedup check before the build is released.
    tokio::time::sleep(Duration::from_millis(100)).await;
    toolchain.release_builds();

    let mut completed = 0;
    let mut duplicates = 0;
    for handle in handles {
        match with_timeout(handle).await? {
            RegisterOutcome::Completed(_) => completed += 1,
            RegisterOutcome::AlreadyRegistered(_) => duplicates += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(completed, 1);
    assert_eq!(duplicates, 3);
    assert_eq!(toolchain.build_count("racer"), 1);
    Ok(())
}

#[tokio::test]
async fn interrupted_builds_are_recovered_as_failed() -> TestResult {
    let ws = Workspace::new();
    {
        let mut registry = Registry::new(ws.registry_path());
        registry.update("hello", "r1", BuildStatus::Building, None);
        registry.update("hello", "r0", BuildStatus::Completed, None);
        registry.save()?;
    }

    let orchestrator = ws.orchestrator(FakeToolchain::new());
    assert_eq!(orchestrator.recover_interrupted().await, 1);
    assert_eq!(
        orchestrator.get_program("hello", "r1").map(|r| r.status),
        Some(BuildStatus::Failed)
    );
    assert_eq!(
        orchestrator.get_program("hello", "r0").map(|r| r.status),
        Some(BuildStatus::Completed)
    );
    Ok(())
}

#[tokio::test]
async fn registration_waits_for_in_flight_build_of_same_program() -> TestResult {
    let ws = Workspace::new();
    let location = ws.add_program("hello");
    {
        let mut registry = Registry::new(ws.registry_path());
        registry.update("hello", "r1", BuildStatus::Building, Some(location.as_path()));
        registry.save()?;
    }

    let toolchain = FakeToolchain::new();
    toolchain.set_revision("hello", "r2");
    let orchestrator = ws.orchestrator(toolchain.clone());
    let (reply, mut reply_rx) = mpsc::unbounded_channel();

    let outcome = orchestrator.register(&location.to_string_lossy(), &reply).await;
    assert!(matches!(outcome, RegisterOutcome::Busy(ref r) if r.revision == "r1"));
    assert!(orchestrator.get_program("hello", "r2").is_none());
    assert_eq!(toolchain.build_count("hello"), 0);
    assert!(
        messages(&drain_reply(&mut reply_rx))
            .iter()
            .any(|m| m == "hello is already building revision r1")
    );
    Ok(())
}

#[tokio::test]
async fn location_without_basename_is_not_a_program() -> TestResult {
    let ws = Workspace::new();
    ws.add_program("hello");
    let toolchain = FakeToolchain::new();
    toolchain.set_revision("", "r1");
    let orchestrator = ws.orchestrator(toolchain.clone());

    for location in [
        "/".to_string(),
        ws.root().join("src").join("..").to_string_lossy().into_owned(),
    ] {
        let (reply, mut reply_rx) = mpsc::unbounded_channel();
        let outcome = orchestrator.register(&location, &reply).await;
        assert_eq!(outcome, RegisterOutcome::NotFound, "{location}");

        let msgs = messages(&drain_reply(&mut reply_rx));
        assert!(msgs[0].starts_with("no program found"), "{msgs:?}");
    }

    assert!(orchestrator.snapshot().is_empty());
    assert_eq!(toolchain.build_count(""), 0);
    assert!(!ws.artifacts().join("r1").exists());
    Ok(())
}
