//! Public room handle

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::errors::{Result, RoomError};
use crate::events::RoomEvent;
use crate::room::commands::RoomCommand;
use crate::types::{
    ChatMessage, Participant, ParticipantId, RoomSnapshot, SessionId, SessionState, TrackSource,
};

/// A connected mentoring session.
///
/// Cheap to clone; every clone drives the same underlying session.
/// Commands are serialized by the session task, so concurrent calls from
/// different clones (or different tasks) never corrupt state. When the
/// last clone is dropped without an explicit [`disconnect`], the session
/// tears itself down as if the user had left.
///
/// [`disconnect`]: RoomHandle::disconnect
#[derive(Debug, Clone)]
pub struct RoomHandle {
    session_id: SessionId,
    local: Participant,
    commands: mpsc::Sender<RoomCommand>,
    state: watch::Receiver<SessionState>,
    events: broadcast::Sender<RoomEvent>,
}

impl RoomHandle {
    pub(crate) fn new(
        session_id: SessionId,
        local: Participant,
        commands: mpsc::Sender<RoomCommand>,
        state: watch::Receiver<SessionState>,
        events: broadcast::Sender<RoomEvent>,
    ) -> Self {
        Self {
            session_id,
            local,
            commands,
            state,
            events,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The participant this client joined as
    pub fn local_participant(&self) -> &Participant {
        &self.local
    }

    /// Current session state. Terminal states stick.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribe to the room event stream.
    ///
    /// Events start from the moment of subscription; use [`snapshot`]
    /// for everything that happened before. A subscriber that falls too
    /// far behind loses the oldest events rather than blocking the
    /// session.
    ///
    /// [`snapshot`]: RoomHandle::snapshot
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Acquire the device behind `source` and publish the track.
    ///
    /// Returns once the track is live, or with the error that stopped
    /// it: [`RoomError::DeviceUnavailable`] when the hardware could not
    /// be acquired (the session keeps running; call again to retry), or
    /// [`RoomError::PublishFailed`] when the transport refused the track
    /// after the automatic retry. Publishing an already-published source
    /// succeeds immediately.
    pub async fn publish_local(&self, source: TrackSource) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(RoomCommand::PublishLocal {
            source,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RoomError::NotConnected)?
    }

    /// Withdraw the local publication for `source` and release its
    /// device. A no-op when nothing is published.
    pub async fn unpublish_local(&self, source: TrackSource) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(RoomCommand::UnpublishLocal {
            source,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RoomError::NotConnected)?
    }

    /// Toggle a local source.
    ///
    /// Disabling fully releases the hardware (the camera light goes
    /// off); enabling after a disable acquires it fresh and publishes a
    /// new track with a new handle. Toggling to the state the source is
    /// already in is a no-op.
    pub async fn set_local_enabled(&self, source: TrackSource, enabled: bool) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(RoomCommand::SetLocalEnabled {
            source,
            enabled,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RoomError::NotConnected)?
    }

    /// Send a chat message to the other participant.
    ///
    /// On success the returned message is the local echo, already
    /// emitted to subscribers as [`RoomEvent::MessageReceived`]. Message
    /// order is preserved per sender; there is no total order across the
    /// two directions.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<ChatMessage> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(RoomCommand::SendMessage {
            text: text.into(),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RoomError::NotConnected)?
    }

    /// A consistent view of participants, publications, and speakers,
    /// taken on the session task between events.
    pub async fn snapshot(&self) -> Result<RoomSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(RoomCommand::Snapshot { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(|_| RoomError::NotConnected)
    }

    /// Whether `participant` is speaking per the latest activity report
    pub async fn is_speaking(&self, participant: &ParticipantId) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(RoomCommand::IsSpeaking {
            participant_id: participant.clone(),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RoomError::NotConnected)
    }

    /// Leave the session.
    ///
    /// Idempotent and infallible: extra calls, concurrent calls, and
    /// calls racing a transport failure all collapse into the one
    /// teardown. Returns once teardown has completed and the session is
    /// in its terminal state.
    pub async fn disconnect(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(RoomCommand::Disconnect { reply: reply_tx })
            .await
            .is_err()
        {
            // Session task already gone; teardown already happened.
            return;
        }
        let _ = reply_rx.await;
    }

    async fn send_command(&self, command: RoomCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RoomError::NotConnected)
    }
}
