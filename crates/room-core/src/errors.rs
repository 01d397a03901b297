use std::time::Duration;
use thiserror::Error;

use crate::types::TrackSource;

/// Result type for room operations
pub type Result<T> = std::result::Result<T, RoomError>;

/// Errors surfaced by the room layer.
///
/// Variants are grouped by what they mean for the session: credential and
/// connect errors end the connect attempt before a session exists, media
/// errors leave the session running, and a transport disconnect tears the
/// whole session down.
#[derive(Debug, Error)]
pub enum RoomError {
    /// The credential endpoint was unreachable or answered non-success.
    /// Nothing was started; the session never left Idle.
    #[error("Credential request failed: {reason}")]
    CredentialFailed {
        /// HTTP status when the endpoint answered, None when unreachable
        status: Option<u16>,
        reason: String,
    },

    /// The transport refused or aborted session establishment.
    #[error("Transport connect failed: {reason}")]
    ConnectFailed { reason: String },

    /// Session establishment did not finish inside the configured bound.
    #[error("Transport connect timed out after {elapsed:?}")]
    ConnectTimeout { elapsed: Duration },

    /// Local hardware could not be acquired. Scoped to one source; the
    /// session keeps running and the caller decides whether to retry.
    //
    // `r#source` is the same identifier as `source`; the raw spelling stops
    // thiserror from treating the field as an `Error::source()` cause, which
    // TrackSource is not.
    #[error("Device unavailable for {source}: {reason}")]
    DeviceUnavailable {
        r#source: TrackSource,
        reason: String,
    },

    /// The transport rejected a local publication, including the one
    /// automatic retry. The acquired device has already been released.
    #[error("Publishing {source} failed: {reason}")]
    PublishFailed {
        r#source: TrackSource,
        reason: String,
    },

    /// The transport dropped mid-session. Teardown has been triggered.
    #[error("Transport disconnected: {reason}")]
    TransportDisconnected { reason: String },

    /// A command arrived after the session ended.
    #[error("Session is not connected")]
    NotConnected,

    /// A pending operation was abandoned by a later command or disconnect.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// The command does not apply to the current track or session state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Outgoing chat message exceeds the configured limit.
    #[error("Message of {actual} bytes exceeds the {max} byte limit")]
    MessageTooLarge { actual: usize, max: usize },

    /// An inbound or outbound payload did not match the wire format.
    #[error("Invalid message payload: {0}")]
    InvalidPayload(String),

    /// Something that should not happen, happened.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoomError {
    /// True for errors that end (or preclude) the session itself.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            RoomError::ConnectFailed { .. }
                | RoomError::ConnectTimeout { .. }
                | RoomError::TransportDisconnected { .. }
        )
    }

    /// True for errors scoped to local media; the session survives them.
    pub fn is_media_error(&self) -> bool {
        matches!(
            self,
            RoomError::DeviceUnavailable { .. } | RoomError::PublishFailed { .. }
        )
    }

    /// True when the failure happened before anything was established.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, RoomError::CredentialFailed { .. })
    }
}

impl From<serde_json::Error> for RoomError {
    fn from(err: serde_json::Error) -> Self {
        RoomError::InvalidPayload(err.to_string())
    }
}
