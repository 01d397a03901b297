//! Data channel messaging tests
//!
//! Exercises the chat path end to end: local echo, remote delivery,
//! the wire envelope, size limits, and resilience to malformed inbound
//! payloads. A raw transport session is used as the far end where the
//! test needs to see or forge actual payload bytes.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mentorlink_room_core::credentials::StaticCredentialProvider;
use mentorlink_room_core::devices::SimulatedDevices;
use mentorlink_room_core::transport::{
    InProcConnector, InProcHub, TransportConnector, TransportEvent, TransportSession,
};
use mentorlink_room_core::{
    RoomClient, RoomConfig, RoomError, RoomEvent, RoomHandle, TransportOptions,
};
use tokio::sync::broadcast;

async fn join(
    hub: &Arc<InProcHub>,
    session: &str,
    name: &str,
    config: RoomConfig,
) -> RoomHandle {
    let client = RoomClient::new(
        config,
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

fn config() -> RoomConfig {
    RoomConfig::new("http://127.0.0.1:9/unused")
}

/// Join the room as a bare transport session, bypassing the room layer
async fn raw_probe(hub: &Arc<InProcHub>, session: &str, name: &str) -> TransportSession {
    InProcConnector::new(hub.clone())
        .connect(
            &hub.url(),
            &hub.token_for(session, name),
            &TransportOptions::default(),
        )
        .await
        .expect("probe connect")
}

async fn next_message(events: &mut broadcast::Receiver<RoomEvent>) -> RoomEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(event @ RoomEvent::MessageReceived { .. }) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event stream ended while waiting for a message: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for a message")
}

#[tokio::test]
async fn test_local_echo_is_ordered_and_sequenced() {
    let hub = InProcHub::new();
    let alice = join(&hub, "lesson", "alice", config()).await;
    let mut events = alice.subscribe();
    let alice_id = alice.local_participant().id.clone();

    let first = alice.send_message("x").await.expect("send x");
    let second = alice.send_message("y").await.expect("send y");

    assert_eq!(first.sender_id, alice_id);
    assert_eq!(first.text, "x");
    assert!(
        first.sequence < second.sequence,
        "sequences must be strictly increasing"
    );

    // The echoes also arrive on the event stream, in send order
    match next_message(&mut events).await {
        RoomEvent::MessageReceived { message } => {
            assert_eq!(message.text, "x");
            assert_eq!(message.sequence, first.sequence);
        }
        _ => unreachable!(),
    }
    match next_message(&mut events).await {
        RoomEvent::MessageReceived { message } => {
            assert_eq!(message.text, "y");
            assert_eq!(message.sequence, second.sequence);
        }
        _ => unreachable!(),
    }

    alice.disconnect().await;
}

#[tokio::test]
async fn test_remote_delivery_preserves_sender_order() {
    let hub = InProcHub::new();
    let alice = join(&hub, "lesson", "alice", config()).await;
    let bob = join(&hub, "lesson", "bob", config()).await;
    let mut bob_events = bob.subscribe();
    let alice_id = alice.local_participant().id.clone();

    for text in ["one", "two", "three"] {
        alice.send_message(text).await.expect("send");
    }

    let mut last_sequence = 0;
    for expected in ["one", "two", "three"] {
        match next_message(&mut bob_events).await {
            RoomEvent::MessageReceived { message } => {
                assert_eq!(message.text, expected, "messages must arrive in send order");
                assert_eq!(
                    message.sender_id, alice_id,
                    "attribution comes from the transport"
                );
                assert!(message.sequence > last_sequence);
                last_sequence = message.sequence;
            }
            _ => unreachable!(),
        }
    }

    alice.disconnect().await;
    bob.disconnect().await;
}

#[tokio::test]
async fn test_wire_format_is_the_message_envelope() {
    let hub = InProcHub::new();
    let alice = join(&hub, "lesson", "alice", config()).await;
    let alice_id = alice.local_participant().id.clone();
    let mut probe = raw_probe(&hub, "lesson", "probe").await;

    alice.send_message("hi there").await.expect("send");

    let event = tokio::time::timeout(Duration::from_secs(2), probe.events.recv())
        .await
        .expect("timed out waiting for payload")
        .expect("probe queue open");
    match event {
        TransportEvent::DataReceived {
            participant_id,
            payload,
        } => {
            assert_eq!(participant_id, alice_id);
            assert_eq!(payload.as_ref(), br#"{"message":"hi there"}"#);
        }
        other => panic!("expected DataReceived, got {:?}", other),
    }

    alice.disconnect().await;
}

#[tokio::test]
async fn test_oversized_message_rejected_without_burning_a_sequence() {
    let hub = InProcHub::new();
    let alice = join(
        &hub,
        "lesson",
        "alice",
        config().with_max_message_bytes(8),
    )
    .await;

    let result = alice.send_message("this is far too long").await;
    match result {
        Err(RoomError::MessageTooLarge { actual, max }) => {
            assert_eq!(max, 8);
            assert!(actual > max);
        }
        other => panic!("expected MessageTooLarge, got {:?}", other),
    }

    // The rejection consumed nothing: the next send is sequence 1
    let echo = alice.send_message("ok").await.expect("small send");
    assert_eq!(echo.sequence, 1);

    alice.disconnect().await;
}

#[tokio::test]
async fn test_malformed_inbound_payloads_are_dropped() {
    let hub = InProcHub::new();
    let alice = join(&hub, "lesson", "alice", config()).await;
    let mut events = alice.subscribe();
    let probe = raw_probe(&hub, "lesson", "probe").await;

    // Garbage, then a wrong-shape object, then a real message
    probe
        .transport
        .send_data(Bytes::from_static(b"not json"))
        .await
        .expect("send garbage");
    probe
        .transport
        .send_data(Bytes::from_static(br#"{"payload":"wrong key"}"#))
        .await
        .expect("send wrong shape");
    probe
        .transport
        .send_data(Bytes::from_static(br#"{"message":"still works"}"#))
        .await
        .expect("send valid");

    match next_message(&mut events).await {
        RoomEvent::MessageReceived { message } => {
            assert_eq!(
                message.text, "still works",
                "malformed payloads must be dropped, not surfaced"
            );
            assert_eq!(message.sender_id, probe.local.id);
        }
        _ => unreachable!(),
    }

    alice.disconnect().await;
}

#[tokio::test]
async fn test_send_after_disconnect_fails() {
    let hub = InProcHub::new();
    let alice = join(&hub, "lesson", "alice", config()).await;

    alice.disconnect().await;

    let result = alice.send_message("anyone there?").await;
    assert!(matches!(result, Err(RoomError::NotConnected)));
}
