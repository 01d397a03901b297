//! Core public types
//!
//! The identifiers, states, and records that cross the crate boundary:
//! session and participant identity, track publications, chat messages,
//! and the consistent [`RoomSnapshot`] view the UI reads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one connect attempt.
///
/// A reconnect is a new session with a new id; ids are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(format!("sess_{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier the transport assigns to a participant at join time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a session.
///
/// Transitions run strictly forward: Idle -> Connecting -> Connected ->
/// Disconnected or Failed. There is no path back into Connecting; a
/// retry is a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Nothing requested yet, or credential exchange still pending
    Idle,
    /// Credential accepted, transport establishment in progress
    Connecting,
    /// Live session
    Connected,
    /// Ended by the local user (terminal)
    Disconnected,
    /// Ended by an error (terminal)
    Failed,
}

impl SessionState {
    /// Terminal states are never left
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Disconnected | SessionState::Failed)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Which piece of local hardware a track comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrackSource {
    Camera,
    Microphone,
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSource::Camera => write!(f, "camera"),
            TrackSource::Microphone => write!(f, "microphone"),
        }
    }
}

/// Opaque handle to a live media resource.
///
/// Local handles are minted by the device layer at acquisition; remote
/// handles arrive from the transport. A released handle is never reused,
/// so handle equality distinguishes a fresh acquisition from a stale one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackHandle(pub String);

impl TrackHandle {
    /// Mint a fresh handle
    pub fn new() -> Self {
        Self(format!("trk_{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for TrackHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A party in the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    /// True for the participant this client joined as
    pub is_local: bool,
}

/// A live track attached to a participant.
///
/// At most one publication exists per (participant, source) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPublication {
    pub participant_id: ParticipantId,
    pub source: TrackSource,
    pub handle: TrackHandle,
    pub enabled: bool,
}

/// A chat message, local echo or remote delivery.
///
/// `sequence` counts messages as this session observed them, across both
/// directions. It is strictly increasing within a session and exists so
/// ordering can be asserted; it is not carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_id: ParticipantId,
    pub text: String,
    /// Send time for local messages, receipt time for remote ones
    pub sent_at: DateTime<Utc>,
    pub sequence: u64,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The local user asked to leave
    UserInitiated,
    /// The transport dropped or reported a fatal error
    TransportFailed(String),
}

impl DisconnectReason {
    /// Failure-initiated teardown lands in `SessionState::Failed`
    pub fn is_failure(&self) -> bool {
        matches!(self, DisconnectReason::TransportFailed(_))
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::UserInitiated => write!(f, "user initiated"),
            DisconnectReason::TransportFailed(reason) => {
                write!(f, "transport failed: {}", reason)
            }
        }
    }
}

/// Consistent view of the session at one instant.
///
/// Taken on the session task, so it can never show a publication whose
/// participant has already left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub session_id: SessionId,
    pub state: SessionState,
    pub participants: Vec<Participant>,
    pub publications: Vec<TrackPublication>,
    /// Participants currently speaking, per the latest activity report
    pub speaking: Vec<ParticipantId>,
}

impl RoomSnapshot {
    /// Publications belonging to one participant
    pub fn publications_of(&self, id: &ParticipantId) -> Vec<&TrackPublication> {
        self.publications
            .iter()
            .filter(|p| &p.participant_id == id)
            .collect()
    }

    /// Look up one publication by its key
    pub fn publication(
        &self,
        id: &ParticipantId,
        source: TrackSource,
    ) -> Option<&TrackPublication> {
        self.publications
            .iter()
            .find(|p| &p.participant_id == id && p.source == source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_creation() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();

        assert!(id1.as_str().starts_with("sess_"));
        assert_ne!(id1, id2, "session ids must be unique");
    }

    #[test]
    fn test_track_handle_freshness() {
        let h1 = TrackHandle::new();
        let h2 = TrackHandle::new();

        assert!(h1.as_str().starts_with("trk_"));
        assert_ne!(h1, h2, "handles must never repeat");
    }

    #[test]
    fn test_session_state_terminality() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Connecting.is_terminal());
        assert!(!SessionState::Connected.is_terminal());
        assert!(SessionState::Disconnected.is_terminal());
        assert!(SessionState::Failed.is_terminal());
    }

    #[test]
    fn test_snapshot_lookup() {
        let alice = ParticipantId::new("alice");
        let snapshot = RoomSnapshot {
            session_id: SessionId::new(),
            state: SessionState::Connected,
            participants: vec![Participant {
                id: alice.clone(),
                display_name: "Alice".to_string(),
                is_local: true,
            }],
            publications: vec![TrackPublication {
                participant_id: alice.clone(),
                source: TrackSource::Camera,
                handle: TrackHandle::new(),
                enabled: true,
            }],
            speaking: vec![],
        };

        assert_eq!(snapshot.publications_of(&alice).len(), 1);
        assert!(snapshot.publication(&alice, TrackSource::Camera).is_some());
        assert!(snapshot
            .publication(&alice, TrackSource::Microphone)
            .is_none());
    }
}
