//! Commands accepted by the session task
//!
//! Every user-facing call on `RoomHandle` becomes one of these, carrying
//! a oneshot for the reply. The command queue and the transport event
//! queue feed the same task, which is what serializes all session state.

use tokio::sync::oneshot;

use crate::errors::Result;
use crate::types::{ChatMessage, ParticipantId, RoomSnapshot, TrackSource};

#[derive(Debug)]
pub(crate) enum RoomCommand {
    /// Acquire the device behind `source` and publish it
    PublishLocal {
        source: TrackSource,
        reply: oneshot::Sender<Result<()>>,
    },

    /// Withdraw the local publication for `source` and release its device
    UnpublishLocal {
        source: TrackSource,
        reply: oneshot::Sender<Result<()>>,
    },

    /// Toggle a local source. Disable is a full unpublish plus device
    /// release; enable is a fresh acquisition.
    SetLocalEnabled {
        source: TrackSource,
        enabled: bool,
        reply: oneshot::Sender<Result<()>>,
    },

    /// Send a chat message; replies with the local echo
    SendMessage {
        text: String,
        reply: oneshot::Sender<Result<ChatMessage>>,
    },

    /// Consistent view of the session right now
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },

    /// Whether a participant is speaking per the latest activity report
    IsSpeaking {
        participant_id: ParticipantId,
        reply: oneshot::Sender<bool>,
    },

    /// Tear the session down. Replies once teardown has completed.
    Disconnect { reply: oneshot::Sender<()> },
}
