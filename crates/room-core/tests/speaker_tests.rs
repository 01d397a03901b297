//! Active speaker propagation tests
//!
//! Drives the hub's activity reports into connected rooms and asserts
//! how the speaking flag moves on both sides of a session.

use std::sync::Arc;
use std::time::Duration;

use mentorlink_room_core::credentials::StaticCredentialProvider;
use mentorlink_room_core::devices::SimulatedDevices;
use mentorlink_room_core::transport::{InProcConnector, InProcHub};
use mentorlink_room_core::{ParticipantId, RoomClient, RoomConfig, RoomEvent, RoomHandle};
use tokio::sync::broadcast;

async fn join(hub: &Arc<InProcHub>, session: &str, name: &str) -> RoomHandle {
    let client = RoomClient::new(
        RoomConfig::new("http://127.0.0.1:9/unused"),
        Arc::new(InProcConnector::new(hub.clone())),
        Arc::new(SimulatedDevices::new()),
    )
    .with_credential_provider(Arc::new(StaticCredentialProvider::new(
        hub.token_for(session, name),
        hub.url(),
    )));
    client
        .connect(session, name)
        .await
        .expect("connect should succeed")
}

/// Wait for the next speaking-set change and return the new set
async fn next_speakers(events: &mut broadcast::Receiver<RoomEvent>) -> Vec<ParticipantId> {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(RoomEvent::ActiveSpeakersChanged { speaking }) => return speaking,
                Ok(_) => continue,
                Err(e) => panic!("event stream ended while waiting for speakers: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for a speaker change")
}

#[tokio::test]
async fn test_speaking_follows_activity_reports() {
    let hub = InProcHub::new();
    let alice = join(&hub, "lesson", "alice").await;
    let bob = join(&hub, "lesson", "bob").await;
    let mut alice_events = alice.subscribe();
    let alice_id = alice.local_participant().id.clone();
    let bob_id = bob.local_participant().id.clone();

    hub.set_active_speakers("lesson", vec![bob_id.clone()]).await;

    let speaking = next_speakers(&mut alice_events).await;
    assert_eq!(speaking, vec![bob_id.clone()]);
    assert!(alice.is_speaking(&bob_id).await.expect("query"));
    assert!(!alice.is_speaking(&alice_id).await.expect("query"));

    let snapshot = alice.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.speaking, vec![bob_id.clone()]);

    alice.disconnect().await;
    bob.disconnect().await;
}

#[tokio::test]
async fn test_omission_flips_speaking_false_immediately() {
    let hub = InProcHub::new();
    let alice = join(&hub, "lesson", "alice").await;
    let bob = join(&hub, "lesson", "bob").await;
    let mut alice_events = alice.subscribe();
    let bob_id = bob.local_participant().id.clone();

    hub.set_active_speakers("lesson", vec![bob_id.clone()]).await;
    next_speakers(&mut alice_events).await;

    // The very next report omits bob; no decay, no grace period
    hub.set_active_speakers("lesson", vec![]).await;
    let speaking = next_speakers(&mut alice_events).await;
    assert!(speaking.is_empty());
    assert!(!alice.is_speaking(&bob_id).await.expect("query"));

    alice.disconnect().await;
    bob.disconnect().await;
}

#[tokio::test]
async fn test_local_and_remote_speakers_derived_identically() {
    let hub = InProcHub::new();
    let alice = join(&hub, "lesson", "alice").await;
    let bob = join(&hub, "lesson", "bob").await;
    let mut alice_events = alice.subscribe();
    let mut bob_events = bob.subscribe();
    let alice_id = alice.local_participant().id.clone();
    let bob_id = bob.local_participant().id.clone();

    // Both parties speak at once; each side flags both ids
    hub.set_active_speakers("lesson", vec![alice_id.clone(), bob_id.clone()])
        .await;

    let seen_by_alice = next_speakers(&mut alice_events).await;
    let seen_by_bob = next_speakers(&mut bob_events).await;
    assert_eq!(seen_by_alice, seen_by_bob);

    assert!(alice.is_speaking(&alice_id).await.expect("query"));
    assert!(alice.is_speaking(&bob_id).await.expect("query"));
    assert!(bob.is_speaking(&alice_id).await.expect("query"));
    assert!(bob.is_speaking(&bob_id).await.expect("query"));

    alice.disconnect().await;
    bob.disconnect().await;
}

#[tokio::test]
async fn test_duplicate_report_emits_nothing() {
    let hub = InProcHub::new();
    let alice = join(&hub, "lesson", "alice").await;
    let bob = join(&hub, "lesson", "bob").await;
    let mut alice_events = alice.subscribe();
    let bob_id = bob.local_participant().id.clone();

    hub.set_active_speakers("lesson", vec![bob_id.clone()]).await;
    next_speakers(&mut alice_events).await;

    // Same set again: subscribers hear nothing new
    hub.set_active_speakers("lesson", vec![bob_id.clone()]).await;
    let quiet = tokio::time::timeout(Duration::from_millis(150), async {
        loop {
            match alice_events.recv().await {
                Ok(RoomEvent::ActiveSpeakersChanged { .. }) => return (),
                Ok(_) => continue,
                Err(_) => std::future::pending::<()>().await,
            }
        }
    })
    .await;
    assert!(quiet.is_err(), "an identical report must not emit an event");

    alice.disconnect().await;
    bob.disconnect().await;
}

#[tokio::test]
async fn test_speaker_forgotten_when_they_leave() {
    let hub = InProcHub::new();
    let alice = join(&hub, "lesson", "alice").await;
    let bob = join(&hub, "lesson", "bob").await;
    let mut alice_events = alice.subscribe();
    let bob_id = bob.local_participant().id.clone();

    hub.set_active_speakers("lesson", vec![bob_id.clone()]).await;
    next_speakers(&mut alice_events).await;

    bob.disconnect().await;

    let speaking = next_speakers(&mut alice_events).await;
    assert!(
        speaking.is_empty(),
        "a departed participant cannot stay marked as speaking"
    );
    assert!(!alice.is_speaking(&bob_id).await.expect("query"));

    alice.disconnect().await;
}
