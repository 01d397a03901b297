//! A full mentoring session between two participants in one process.
//!
//! Both ends run against an in-process hub, so there is nothing to set
//! up: connect, publish, chat, watch speaker changes, toggle a camera,
//! and leave.
//!
//! Run with:
//!   cargo run -p mentorlink-room-core --example mentor_pair
//!
//! Set RUST_LOG=mentorlink_room_core=debug to watch the session tasks.

use std::sync::Arc;
use std::time::Duration;

use mentorlink_room_core::credentials::StaticCredentialProvider;
use mentorlink_room_core::devices::SimulatedDevices;
use mentorlink_room_core::transport::{InProcConnector, InProcHub};
use mentorlink_room_core::{
    RoomClient, RoomConfig, RoomEvent, RoomHandle, TrackSource,
};
use tokio::sync::broadcast;
use tokio::time::sleep;

const SESSION: &str = "algebra-tuesday";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mentorlink_room_core=info".parse()?),
        )
        .init();

    let hub = InProcHub::new();

    println!("== connecting both participants ==");
    let dana = connect(&hub, "dana").await?;
    let sam = connect(&hub, "sam").await?;

    let dana_view = watch_events("DANA", &dana);
    let sam_view = watch_events("SAM", &sam);

    println!("\n== going on camera ==");
    dana.publish_local(TrackSource::Camera).await?;
    dana.publish_local(TrackSource::Microphone).await?;
    sam.publish_local(TrackSource::Camera).await?;
    sam.publish_local(TrackSource::Microphone).await?;
    sleep(Duration::from_millis(100)).await;

    println!("\n== chatting ==");
    dana.send_message("Hi Sam, ready to look at quadratics?").await?;
    sam.send_message("Yes! I got stuck on problem 3.").await?;
    sleep(Duration::from_millis(100)).await;

    println!("\n== speaking ==");
    hub.set_active_speakers(SESSION, vec![dana.local_participant().id.clone()])
        .await;
    sleep(Duration::from_millis(100)).await;
    hub.set_active_speakers(SESSION, vec![sam.local_participant().id.clone()])
        .await;
    sleep(Duration::from_millis(100)).await;
    hub.set_active_speakers(SESSION, vec![]).await;
    sleep(Duration::from_millis(100)).await;

    println!("\n== dana steps away from the camera, then returns ==");
    dana.set_local_enabled(TrackSource::Camera, false).await?;
    sleep(Duration::from_millis(100)).await;
    dana.set_local_enabled(TrackSource::Camera, true).await?;
    sleep(Duration::from_millis(100)).await;

    let snapshot = sam.snapshot().await?;
    println!(
        "\nsam's view: {} participants, {} live tracks",
        snapshot.participants.len(),
        snapshot.publications.len()
    );

    println!("\n== leaving ==");
    sam.disconnect().await;
    dana.disconnect().await;

    let _ = tokio::join!(dana_view, sam_view);
    println!("\ndone.");
    Ok(())
}

/// Connect one participant to the session on the hub.
///
/// The hub mints the token directly; a real deployment would point
/// `RoomConfig::credential_endpoint` at its credential service and skip
/// the provider override.
async fn connect(hub: &Arc<InProcHub>, name: &str) -> anyhow::Result<RoomHandle> {
    let client = RoomClient::new(
        RoomConfig::new("http://localhost:8080/session/token"),
        Arc::new(InProcConnector::new(hub.clone())),
        Arc::new(SimulatedDevices::new()),
    )
    .with_credential_provider(Arc::new(StaticCredentialProvider::new(
        hub.token_for(SESSION, name),
        hub.url(),
    )));

    let room = client.connect(SESSION, name).await?;
    println!("[{}] connected as {}", name.to_uppercase(), room.local_participant().id);
    Ok(room)
}

/// Print one side's view of the room until the session ends
fn watch_events(tag: &'static str, room: &RoomHandle) -> tokio::task::JoinHandle<()> {
    let mut events = room.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    println!("[{}] {}", tag, describe(&event));
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    println!("[{}] (fell behind, {} events lost)", tag, missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn describe(event: &RoomEvent) -> String {
    match event {
        RoomEvent::ParticipantJoined { participant } => {
            format!("{} joined", participant.display_name)
        }
        RoomEvent::ParticipantLeft { participant_id } => {
            format!("{} left", participant_id)
        }
        RoomEvent::TrackPublished { publication } => {
            format!("{} {} is live", publication.participant_id, publication.source)
        }
        RoomEvent::TrackUnpublished {
            participant_id,
            source,
        } => format!("{} {} stopped", participant_id, source),
        RoomEvent::ActiveSpeakersChanged { speaking } => {
            if speaking.is_empty() {
                "nobody is speaking".to_string()
            } else {
                format!(
                    "speaking: {}",
                    speaking
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
        RoomEvent::MessageReceived { message } => {
            format!("chat from {}: {}", message.sender_id, message.text)
        }
        RoomEvent::Disconnected { reason } => format!("session ended ({})", reason),
    }
}
