//! Public room events
//!
//! Everything the UI needs to react to arrives as a [`RoomEvent`] on the
//! stream returned by `RoomHandle::subscribe`. Events for local and
//! remote tracks share the same variants; compare the participant id
//! against `RoomHandle::local_participant` to tell them apart.

use serde::{Deserialize, Serialize};

use crate::types::{
    ChatMessage, DisconnectReason, Participant, ParticipantId, TrackPublication, TrackSource,
};

/// Events emitted over the room event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoomEvent {
    /// A participant entered the session
    ParticipantJoined { participant: Participant },

    /// A participant left. Their publications were removed first; the
    /// matching `TrackUnpublished` events precede this one.
    ParticipantLeft { participant_id: ParticipantId },

    /// A track went live, locally published or remotely subscribed
    TrackPublished { publication: TrackPublication },

    /// A track was withdrawn
    TrackUnpublished {
        participant_id: ParticipantId,
        source: TrackSource,
    },

    /// The set of currently speaking participants changed
    ActiveSpeakersChanged { speaking: Vec<ParticipantId> },

    /// A chat message was sent (local echo) or received
    MessageReceived { message: ChatMessage },

    /// The session ended. No further events follow this one.
    Disconnected { reason: DisconnectReason },
}

impl RoomEvent {
    /// The participant this event concerns, when it concerns exactly one
    pub fn participant_id(&self) -> Option<&ParticipantId> {
        match self {
            RoomEvent::ParticipantJoined { participant } => Some(&participant.id),
            RoomEvent::ParticipantLeft { participant_id } => Some(participant_id),
            RoomEvent::TrackPublished { publication } => Some(&publication.participant_id),
            RoomEvent::TrackUnpublished { participant_id, .. } => Some(participant_id),
            RoomEvent::MessageReceived { message } => Some(&message.sender_id),
            RoomEvent::ActiveSpeakersChanged { .. } => None,
            RoomEvent::Disconnected { .. } => None,
        }
    }

    /// True for track publication changes
    pub fn is_track_event(&self) -> bool {
        matches!(
            self,
            RoomEvent::TrackPublished { .. } | RoomEvent::TrackUnpublished { .. }
        )
    }

    /// True for the final event of a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, RoomEvent::Disconnected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id_helper() {
        let event = RoomEvent::ParticipantLeft {
            participant_id: ParticipantId::new("p1"),
        };
        assert_eq!(event.participant_id(), Some(&ParticipantId::new("p1")));

        let event = RoomEvent::ActiveSpeakersChanged { speaking: vec![] };
        assert_eq!(event.participant_id(), None);
    }

    #[test]
    fn test_terminal_event() {
        let event = RoomEvent::Disconnected {
            reason: DisconnectReason::UserInitiated,
        };
        assert!(event.is_terminal());
        assert!(!event.is_track_event());
    }
}
