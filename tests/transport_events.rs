use std::error::Error;
use std::path::PathBuf;

use serde_json::json;

use rebuildd::registry::{BuildStatus, ProgramRecord};
use rebuildd::transport::{ClientEvent, ServerEvent};

type TestResult = Result<(), Box<dyn Error>>;

fn record() -> ProgramRecord {
    ProgramRecord::new(
        "hello",
        "97dd2ae",
        BuildStatus::Completed,
        Some(PathBuf::from("/srv/src/hello")),
    )
}

#[test]
fn registry_update_is_event_plus_record() -> TestResult {
    let value = serde_json::to_value(ServerEvent::RegistryUpdate(record()))?;
    assert_eq!(
        value,
        json!({
            "event": "registry/update",
            "data": {
                "id": "hello/97dd2ae",
                "name": "hello",
                "revision": "97dd2ae",
                "status": "completed",
                "location": "/srv/src/hello",
            }
        })
    );
    Ok(())
}

#[test]
fn snapshot_carries_every_record() -> TestResult {
    let value = serde_json::to_value(ServerEvent::ProgramsRegistered(vec![record()]))?;
    assert_eq!(value["event"], "programs/registered");
    assert_eq!(value["data"].as_array().map(Vec::len), Some(1));

    let empty = serde_json::to_value(ServerEvent::ProgramsRegistered(Vec::new()))?;
    assert_eq!(empty, json!({ "event": "programs/registered", "data": [] }));
    Ok(())
}

#[test]
fn build_output_and_remove_shapes() -> TestResult {
    let output = serde_json::to_value(ServerEvent::BuildOutput {
        program: "hello".into(),
        msg: "build-tool: cc hello.c".into(),
    })?;
    assert_eq!(
        output,
        json!({
            "event": "build/output",
            "data": { "program": "hello", "msg": "build-tool: cc hello.c" }
        })
    );

    let removed = serde_json::to_value(ServerEvent::RegistryRemove {
        id: "hello/97dd2ae".into(),
    })?;
    assert_eq!(
        removed,
        json!({ "event": "registry/remove", "data": { "id": "hello/97dd2ae" } })
    );
    Ok(())
}

#[test]
fn register_request_parses() -> TestResult {
    let frame = r#"{"event":"program/register","data":{"location":"/srv/src/hello"}}"#;
    let event: ClientEvent = serde_json::from_str(frame)?;
    assert_eq!(
        event,
        ClientEvent::Register {
            location: "/srv/src/hello".into()
        }
    );
    Ok(())
}

#[test]
fn unknown_or_malformed_requests_are_rejected() {
    for frame in [
        r#"{"event":"program/unregister","data":{"location":"/x"}}"#,
        r#"{"event":"program/register","data":{}}"#,
        r#"{"event":"program/register"}"#,
        "not json",
    ] {
        assert!(
            serde_json::from_str::<ClientEvent>(frame).is_err(),
            "accepted {frame}"
        );
    }
}

#[test]
fn record_without_location_decodes() -> TestResult {
    let data = json!({
        "id": "hello/r1",
        "name": "hello",
        "revision": "r1",
        "status": "building",
    });
    let record: ProgramRecord = serde_json::from_value(data)?;
    assert_eq!(record.status, BuildStatus::Building);
    assert!(record.location.is_none());
    Ok(())
}
