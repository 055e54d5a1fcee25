//! JSONL file output and session context, end to end

use std::thread;

use anonpoetry_core::Address;
use anonpoetry_logging::{
    FileConfig, PoetrySubscriberBuilder, RotationStrategy, SessionContextGuard,
};
use serde_json::Value;

fn read_lines(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_events_carry_session_fields() {
    let dir = tempfile::tempdir().unwrap();
    let alice = Address::new([0xa1; 20]);

    let (subscriber, guard) = PoetrySubscriberBuilder::new()
        .with_console(false)
        .with_file_output(
            FileConfig::in_dir(dir.path())
                .with_prefix("session")
                .with_rotation(RotationStrategy::Never),
        )
        .build()
        .unwrap();

    let session_id = tracing::subscriber::with_default(subscriber, || {
        tracing::info!("outside any session");
        let _session = SessionContextGuard::new(&alice);
        tracing::info!(poem_id = 3u64, "Revealed poem");
        SessionContextGuard::current_session_id().unwrap()
    });
    drop(guard);

    let lines = read_lines(&dir.path().join("session.log"));
    assert_eq!(lines.len(), 2);

    let outside = &lines[0];
    assert_eq!(outside["message"], "outside any session");
    assert!(outside.get("span").is_none());

    let inside = &lines[1];
    assert_eq!(inside["message"], "Revealed poem");
    assert_eq!(inside["poem_id"], 3);
    assert_eq!(inside["span"]["name"], "session");
    assert_eq!(inside["span"]["subject"], alice.short_id());
    assert_eq!(inside["span"]["session_id"], session_id.to_string());
}

#[test]
fn test_level_filter_applies_to_file() {
    let dir = tempfile::tempdir().unwrap();

    let (subscriber, guard) = PoetrySubscriberBuilder::new()
        .with_console(false)
        .with_level("warn")
        .with_file_output(
            FileConfig::in_dir(dir.path()).with_rotation(RotationStrategy::Never),
        )
        .build()
        .unwrap();

    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!("dropped");
        tracing::info!("dropped too");
        tracing::warn!(poem_id = 1u64, "Could not reveal like count");
    });
    drop(guard);

    // RUST_LOG, when set, overrides the configured level
    if std::env::var_os("RUST_LOG").is_none() {
        let lines = read_lines(&dir.path().join("anonpoetry.log"));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "WARN");
    }
}

#[test]
fn test_session_context_is_per_thread() {
    let alice = Address::new([0xa1; 20]);
    let bob = Address::new([0xb0; 20]);

    let _session = SessionContextGuard::new(&alice);
    let other = thread::spawn(move || {
        assert!(SessionContextGuard::current().is_none());
        let _session = SessionContextGuard::new(&bob);
        SessionContextGuard::current_subject()
    })
    .join()
    .unwrap();

    assert_eq!(other, Some(bob));
    assert_eq!(SessionContextGuard::current_subject(), Some(alice));
}
