//! Session lifecycle
//!
//! A session runs on one dedicated task (see [`actor`]) fed by two
//! queues: commands from the [`RoomHandle`] and events from the
//! transport. That task owns every piece of mutable session state, which
//! is what makes the lifecycle guarantees cheap to keep: state
//! transitions are monotonic, teardown runs exactly once, and no
//! command ever observes a half-applied event.
//!
//! [`RoomClient`] is the entry point: configure it once with a transport
//! connector and a device layer, then connect sessions from it.

mod actor;
mod commands;
mod connector;
mod handle;
mod messenger;
mod registry;
mod speakers;
mod tracks;

pub use handle::RoomHandle;

use std::sync::Arc;

use crate::config::RoomConfig;
use crate::credentials::{CredentialProvider, HttpCredentialProvider};
use crate::devices::MediaDevices;
use crate::errors::Result;
use crate::transport::TransportConnector;

/// Entry point for joining mentoring sessions.
///
/// Holds the pieces every session needs: configuration, a credential
/// provider (HTTP against `credential_endpoint` by default), the
/// transport connector, and the device layer. One client can connect
/// any number of sequential or concurrent sessions; each gets its own
/// [`RoomHandle`].
#[derive(Debug, Clone)]
pub struct RoomClient {
    config: RoomConfig,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn TransportConnector>,
    devices: Arc<dyn MediaDevices>,
}

impl RoomClient {
    pub fn new(
        config: RoomConfig,
        connector: Arc<dyn TransportConnector>,
        devices: Arc<dyn MediaDevices>,
    ) -> Self {
        let credentials: Arc<dyn CredentialProvider> = Arc::new(HttpCredentialProvider::new(
            config.credential_endpoint.clone(),
        ));
        Self {
            config,
            credentials,
            connector,
            devices,
        }
    }

    /// Swap the credential provider, e.g. for a pre-fetched token
    pub fn with_credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = provider;
        self
    }

    /// Join `session_name` as `participant_name`.
    ///
    /// Runs the full establishment sequence: credential exchange (a
    /// failure leaves nothing behind), transport open bounded by
    /// `connect_timeout`, then the session task. The returned handle is
    /// live; participants and tracks that existed before we joined are
    /// already in its snapshot.
    pub async fn connect(&self, session_name: &str, participant_name: &str) -> Result<RoomHandle> {
        connector::connect(
            self.config.clone(),
            session_name,
            participant_name,
            self.credentials.clone(),
            self.connector.clone(),
            self.devices.clone(),
        )
        .await
    }
}
