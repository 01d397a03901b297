//! Session establishment
//!
//! Connect runs in three legs: credential exchange, transport open under
//! a deadline, then session task spawn. A failure in the first leg means
//! nothing was started; a failure in the second closes whatever was
//! partially opened before the error surfaces. Media is never touched
//! here; publishing starts only when the caller asks for it.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};

use crate::config::RoomConfig;
use crate::credentials::CredentialProvider;
use crate::devices::MediaDevices;
use crate::errors::{Result, RoomError};
use crate::room::actor::RoomActor;
use crate::room::handle::RoomHandle;
use crate::transport::{TransportConnector, TransportSession};
use crate::types::{SessionId, SessionState};

const COMMAND_CHANNEL_CAPACITY: usize = 100;

pub(crate) async fn connect(
    config: RoomConfig,
    session_name: &str,
    participant_name: &str,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn TransportConnector>,
    devices: Arc<dyn MediaDevices>,
) -> Result<RoomHandle> {
    let session_id = SessionId::new();
    let (state_tx, state_rx) = watch::channel(SessionState::Idle);

    info!(
        "connecting {} to '{}' as '{}'",
        session_id, session_name, participant_name
    );

    // Credential first. Failing here leaves the session Idle: no
    // transport was touched, there is nothing to tear down.
    let credential = credentials.issue(session_name, participant_name).await?;

    let _ = state_tx.send(SessionState::Connecting);

    let opened = tokio::time::timeout(
        config.connect_timeout,
        connector.connect(&credential.transport_url, &credential.token, &config.transport),
    )
    .await;

    let session = match opened {
        Err(_) => {
            // The connect future was dropped at the deadline; the
            // connector contract says it cleans up after cancellation.
            let _ = state_tx.send(SessionState::Failed);
            warn!("transport connect for {} timed out", session_id);
            return Err(RoomError::ConnectTimeout {
                elapsed: config.connect_timeout,
            });
        }
        Ok(Err(e)) => {
            let _ = state_tx.send(SessionState::Failed);
            warn!("transport connect for {} failed: {}", session_id, e);
            return Err(RoomError::ConnectFailed {
                reason: e.to_string(),
            });
        }
        Ok(Ok(session)) => session,
    };

    let TransportSession {
        transport,
        events: transport_events,
        local,
        roster,
    } = session;

    let _ = state_tx.send(SessionState::Connected);
    info!("{} connected as {}", session_id, local.id);

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (notices_tx, notices_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (events_tx, _) = broadcast::channel(config.event_buffer);

    let mut actor = RoomActor::new(
        session_id.clone(),
        local.clone(),
        config,
        transport,
        devices,
        state_tx,
        events_tx.clone(),
        notices_tx,
    );
    actor.ingest_roster(roster);

    let handle = RoomHandle::new(session_id, local, commands_tx, state_rx, events_tx);
    tokio::spawn(actor.run(commands_rx, transport_events, notices_rx));
    Ok(handle)
}
