//! Transport abstraction
//!
//! The real-time transport (ICE negotiation, SRTP, congestion control)
//! is deliberately opaque to this crate. The room layer sees it through
//! two traits: a [`TransportConnector`] that opens sessions from a
//! credential, and a [`Transport`] handle for in-session operations.
//!
//! Everything the transport wants to tell us arrives on one ordered
//! event queue as [`TransportEvent`] values. There are no callbacks to
//! register and no per-event-type subscriptions; the session task drains
//! the queue and dispatches on the variant.

pub mod inproc;

pub use inproc::{InProcConnector, InProcHub};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::TransportOptions;
use crate::types::{Participant, ParticipantId, TrackHandle, TrackSource};

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors produced by transport implementations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect refused: {0}")]
    ConnectRefused(String),

    #[error("transport closed")]
    Closed,

    #[error("publish rejected: {0}")]
    PublishRejected(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Events a transport session pushes to the room layer.
///
/// Delivered in the order the transport observed them. Initial roster
/// state is NOT delivered here; it comes back from
/// [`TransportConnector::connect`] so the room can replay it through the
/// same handlers that take these events.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A remote participant joined the session
    Joined { participant: Participant },

    /// A remote participant left
    Left { participant_id: ParticipantId },

    /// A remote track is now subscribable
    TrackAvailable {
        participant_id: ParticipantId,
        source: TrackSource,
        handle: TrackHandle,
    },

    /// A remote track went away
    TrackRemoved {
        participant_id: ParticipantId,
        source: TrackSource,
    },

    /// Periodic snapshot of who is audibly speaking right now.
    /// Anyone absent from the list is not speaking as of this report.
    Activity { speaking: Vec<ParticipantId> },

    /// Payload delivered on the reliable ordered data channel. Sender
    /// attribution comes from here, never from the payload itself.
    DataReceived {
        participant_id: ParticipantId,
        payload: Bytes,
    },

    /// The transport dropped and the session cannot continue
    Disconnected { reason: String },
}

/// A remote track that already existed when we joined
#[derive(Debug, Clone)]
pub struct RemoteTrack {
    pub source: TrackSource,
    pub handle: TrackHandle,
}

/// A participant already present when we joined, with their tracks
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub participant: Participant,
    pub tracks: Vec<RemoteTrack>,
}

/// Everything a successful connect hands back.
#[derive(Debug)]
pub struct TransportSession {
    /// In-session operations
    pub transport: Arc<dyn Transport>,

    /// The single inbound event queue
    pub events: mpsc::Receiver<TransportEvent>,

    /// The identity the transport assigned to this client
    pub local: Participant,

    /// Participants already in the session at join time
    pub roster: Vec<RosterEntry>,
}

/// Opens transport sessions from a credential.
///
/// `connect` may be raced against a deadline and dropped mid-flight;
/// implementations must not leak a half-open session when their connect
/// future is cancelled.
#[async_trait]
pub trait TransportConnector: Send + Sync + fmt::Debug {
    async fn connect(
        &self,
        url: &str,
        token: &str,
        options: &TransportOptions,
    ) -> TransportResult<TransportSession>;
}

/// An established transport session.
///
/// All methods are in-session operations; after `close` they fail with
/// [`TransportError::Closed`].
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Announce a local track to the session
    async fn publish_track(
        &self,
        source: TrackSource,
        handle: &TrackHandle,
    ) -> TransportResult<()>;

    /// Withdraw a previously published local track
    async fn unpublish_track(&self, source: TrackSource) -> TransportResult<()>;

    /// Send bytes on the reliable ordered data channel
    async fn send_data(&self, payload: Bytes) -> TransportResult<()>;

    /// Close the session. Idempotent.
    async fn close(&self) -> TransportResult<()>;

    /// Whether the session has been closed or has dropped
    fn is_closed(&self) -> bool;
}
