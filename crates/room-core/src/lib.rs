//! Session, track, and message lifecycle management for MentorLink
//! one-to-one video mentoring.
//!
//! This crate sits between an opaque real-time transport and the UI. It
//! owns everything in between:
//!
//! - Credential exchange and transport establishment with a deadline
//! - Local track publication, device toggling, and guaranteed release
//! - Remote participant and track bookkeeping
//! - Active speaker state from transport activity reports
//! - Ordered chat messages over the transport's data channel
//! - Exactly-once teardown on every exit path
//!
//! The architecture is a single session task per connection: commands
//! from [`RoomHandle`] and events from the transport land on one queue
//! pair and are processed strictly in order, so session state never
//! races itself.
//!
//! # Quick start
//!
//! Production deployments plug in a real transport connector and device
//! layer; this example runs entirely in-process.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mentorlink_room_core::{RoomClient, RoomConfig, RoomEvent, TrackSource};
//! use mentorlink_room_core::credentials::StaticCredentialProvider;
//! use mentorlink_room_core::devices::SimulatedDevices;
//! use mentorlink_room_core::transport::{InProcConnector, InProcHub};
//!
//! # async fn run() -> mentorlink_room_core::Result<()> {
//! let hub = InProcHub::new();
//! let client = RoomClient::new(
//!     RoomConfig::new("http://localhost:8080/session/token"),
//!     Arc::new(InProcConnector::new(hub.clone())),
//!     Arc::new(SimulatedDevices::new()),
//! )
//! .with_credential_provider(Arc::new(StaticCredentialProvider::new(
//!     hub.token_for("algebra-1on1", "alice"),
//!     hub.url(),
//! )));
//!
//! let room = client.connect("algebra-1on1", "alice").await?;
//! let mut events = room.subscribe();
//!
//! room.publish_local(TrackSource::Camera).await?;
//! room.publish_local(TrackSource::Microphone).await?;
//! room.send_message("hello!").await?;
//! room.disconnect().await;
//!
//! // The stream always ends with a Disconnected event
//! while let Ok(event) = events.recv().await {
//!     if matches!(event, RoomEvent::Disconnected { .. }) {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod devices;
pub mod errors;
pub mod events;
pub mod room;
pub mod transport;
pub mod types;

pub use config::{RoomConfig, TransportOptions};
pub use errors::{Result, RoomError};
pub use events::RoomEvent;
pub use room::{RoomClient, RoomHandle};
pub use types::{
    ChatMessage, DisconnectReason, Participant, ParticipantId, RoomSnapshot, SessionId,
    SessionState, TrackHandle, TrackPublication, TrackSource,
};
