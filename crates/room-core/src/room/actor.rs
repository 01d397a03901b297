//! The session task
//!
//! All mutable session state lives on one task. Commands from the
//! handle, events from the transport, and acquisition notices all land
//! here, are processed one at a time, and never race each other. The
//! task exits after teardown, which is also the only place a terminal
//! session state is ever set.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::RoomConfig;
use crate::devices::MediaDevices;
use crate::errors::{Result, RoomError};
use crate::events::RoomEvent;
use crate::room::commands::RoomCommand;
use crate::room::messenger::Messenger;
use crate::room::registry::{ParticipantRegistry, PublicationUpsert};
use crate::room::speakers::SpeakerMonitor;
use crate::room::tracks::{spawn_acquisition, LocalNotice, LocalSlot, LocalTracks};
use crate::transport::{RosterEntry, Transport, TransportError, TransportEvent};
use crate::types::{
    ChatMessage, DisconnectReason, Participant, ParticipantId, RoomSnapshot, SessionId,
    SessionState, TrackHandle, TrackPublication, TrackSource,
};

pub(crate) struct RoomActor {
    session_id: SessionId,
    local: Participant,
    config: RoomConfig,
    transport: Arc<dyn Transport>,
    devices: Arc<dyn MediaDevices>,

    registry: ParticipantRegistry,
    local_tracks: LocalTracks,
    speakers: SpeakerMonitor,
    messenger: Messenger,

    state_tx: watch::Sender<SessionState>,
    events_tx: broadcast::Sender<RoomEvent>,
    notices_tx: mpsc::Sender<LocalNotice>,

    torn_down: bool,
}

impl RoomActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        local: Participant,
        config: RoomConfig,
        transport: Arc<dyn Transport>,
        devices: Arc<dyn MediaDevices>,
        state_tx: watch::Sender<SessionState>,
        events_tx: broadcast::Sender<RoomEvent>,
        notices_tx: mpsc::Sender<LocalNotice>,
    ) -> Self {
        let max_message_bytes = config.max_message_bytes;
        let mut registry = ParticipantRegistry::new();
        registry.join(local.clone());

        Self {
            session_id,
            local,
            config,
            transport,
            devices,
            registry,
            local_tracks: LocalTracks::new(),
            speakers: SpeakerMonitor::new(),
            messenger: Messenger::new(max_message_bytes),
            state_tx,
            events_tx,
            notices_tx,
            torn_down: false,
        }
    }

    /// Feed the join-time roster through the same handlers live events
    /// take, so a participant who was already here is indistinguishable
    /// from one who joins a moment later.
    pub fn ingest_roster(&mut self, roster: Vec<RosterEntry>) {
        for entry in roster {
            let id = entry.participant.id.clone();
            self.on_join(entry.participant);
            for track in entry.tracks {
                self.on_track_available(id.clone(), track.source, track.handle);
            }
        }
    }

    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<RoomCommand>,
        mut transport_events: mpsc::Receiver<TransportEvent>,
        mut notices: mpsc::Receiver<LocalNotice>,
    ) {
        debug!("session task for {} started", self.session_id);
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        self.handle_command(command).await;
                        if self.torn_down {
                            break;
                        }
                    }
                    // Every handle is gone; nobody can disconnect us later.
                    None => {
                        self.teardown(DisconnectReason::UserInitiated).await;
                        break;
                    }
                },
                event = transport_events.recv() => match event {
                    Some(event) => {
                        self.handle_transport_event(event).await;
                        if self.torn_down {
                            break;
                        }
                    }
                    // Transport dropped its sender without a Disconnected event.
                    None => {
                        self.teardown(DisconnectReason::TransportFailed(
                            "event channel closed".to_string(),
                        ))
                        .await;
                        break;
                    }
                },
                Some(notice) = notices.recv() => {
                    self.handle_local_notice(notice).await;
                }
            }
        }

        // Acquisition tasks may still be in flight. Stop the notice
        // channel (late senders release their own handles once sends
        // fail) and release any handle already queued up.
        notices.close();
        while let Some(notice) = notices.recv().await {
            if let LocalNotice::Published { source, handle, .. } = notice {
                debug!("releasing {} handle from a late acquisition", source);
                self.devices.release(&handle).await;
            }
        }
        debug!("session task for {} exited", self.session_id);
    }

    async fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::PublishLocal { source, reply } => {
                self.start_publish(source, reply);
            }
            RoomCommand::UnpublishLocal { source, reply } => {
                let result = self.disable_local(source).await;
                let _ = reply.send(result);
            }
            RoomCommand::SetLocalEnabled {
                source,
                enabled,
                reply,
            } => {
                if enabled {
                    if self.local_tracks.is_published(source) {
                        let _ = reply.send(Ok(()));
                    } else {
                        self.start_publish(source, reply);
                    }
                } else {
                    let result = self.disable_local(source).await;
                    let _ = reply.send(result);
                }
            }
            RoomCommand::SendMessage { text, reply } => {
                let result = self.send_message(&text).await;
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::IsSpeaking {
                participant_id,
                reply,
            } => {
                let _ = reply.send(self.speakers.is_speaking(&participant_id));
            }
            RoomCommand::Disconnect { reply } => {
                self.teardown(DisconnectReason::UserInitiated).await;
                let _ = reply.send(());
            }
        }
    }

    /// Kick off acquisition + publication for a local source. The reply
    /// is parked in the slot and answered when the attempt resolves.
    fn start_publish(&mut self, source: TrackSource, reply: oneshot::Sender<Result<()>>) {
        match self.local_tracks.take(source) {
            LocalSlot::Published { handle } => {
                self.local_tracks
                    .set(source, LocalSlot::Published { handle });
                let _ = reply.send(Ok(()));
            }
            slot @ LocalSlot::Acquiring { .. } => {
                self.local_tracks.set(source, slot);
                let _ = reply.send(Err(RoomError::InvalidState(format!(
                    "{} acquisition already in flight",
                    source
                ))));
            }
            LocalSlot::Empty => {
                let attempt = self.local_tracks.next_attempt();
                let (cancel_tx, cancel_rx) = watch::channel(false);
                debug!(
                    "starting {} acquisition (attempt {}) for {}",
                    source, attempt, self.session_id
                );
                spawn_acquisition(
                    attempt,
                    source,
                    self.devices.clone(),
                    self.transport.clone(),
                    self.config.publish_retry_backoff,
                    cancel_rx,
                    self.notices_tx.clone(),
                );
                self.local_tracks.set(
                    source,
                    LocalSlot::Acquiring {
                        attempt,
                        cancel: cancel_tx,
                        reply,
                    },
                );
            }
        }
    }

    /// Disable a local source: withdraw the publication and release the
    /// device. Disabling an empty slot is a no-op; disabling an in-flight
    /// acquisition cancels it.
    async fn disable_local(&mut self, source: TrackSource) -> Result<()> {
        match self.local_tracks.take(source) {
            LocalSlot::Empty => Ok(()),
            LocalSlot::Acquiring { cancel, reply, .. } => {
                let _ = cancel.send(true);
                let _ = reply.send(Err(RoomError::Cancelled(format!(
                    "{} publish cancelled by disable",
                    source
                ))));
                debug!("cancelled in-flight {} acquisition", source);
                Ok(())
            }
            LocalSlot::Published { handle } => {
                if let Err(e) = self.transport.unpublish_track(source).await {
                    debug!("unpublish of {} reported: {}", source, e);
                }
                self.devices.release(&handle).await;
                self.registry.remove_publication(&self.local.id, source);
                self.emit(RoomEvent::TrackUnpublished {
                    participant_id: self.local.id.clone(),
                    source,
                });
                info!("local {} unpublished and released", source);
                Ok(())
            }
        }
    }

    async fn send_message(&mut self, text: &str) -> Result<ChatMessage> {
        let (payload, message) = self.messenger.outgoing(&self.local.id, text)?;
        self.transport
            .send_data(payload)
            .await
            .map_err(|e| match e {
                TransportError::Closed => RoomError::NotConnected,
                other => RoomError::Internal(format!("data channel send failed: {}", other)),
            })?;
        self.emit(RoomEvent::MessageReceived {
            message: message.clone(),
        });
        Ok(message)
    }

    async fn handle_local_notice(&mut self, notice: LocalNotice) {
        match notice {
            LocalNotice::Published {
                attempt,
                source,
                handle,
            } => match self.local_tracks.finish_attempt(source, attempt) {
                Some(reply) => {
                    let publication = TrackPublication {
                        participant_id: self.local.id.clone(),
                        source,
                        handle: handle.clone(),
                        enabled: true,
                    };
                    self.registry.upsert_publication(publication.clone());
                    self.local_tracks
                        .set(source, LocalSlot::Published { handle });
                    let _ = reply.send(Ok(()));
                    info!("local {} published for {}", source, self.session_id);
                    self.emit(RoomEvent::TrackPublished { publication });
                }
                // The attempt was cancelled or replaced after the task
                // published; undo its side effects. The transport slot is
                // only withdrawn when nothing newer has claimed it, since
                // a newer attempt's publish overwrites this one.
                None => {
                    debug!("stale publish of {} resolved late, undoing", source);
                    if self.local_tracks.is_empty(source) {
                        let _ = self.transport.unpublish_track(source).await;
                    }
                    self.devices.release(&handle).await;
                }
            },
            LocalNotice::Failed {
                attempt,
                source,
                error,
            } => {
                if let Some(reply) = self.local_tracks.finish_attempt(source, attempt) {
                    warn!("local {} publish failed: {}", source, error);
                    let _ = reply.send(Err(error));
                } else {
                    debug!("stale failure for {} ignored: {}", source, error);
                }
            }
            LocalNotice::Cancelled { attempt, source } => {
                // The slot was already emptied by whoever cancelled.
                debug!("{} acquisition attempt {} confirmed cancelled", source, attempt);
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Joined { participant } => self.on_join(participant),
            TransportEvent::Left { participant_id } => self.on_leave(&participant_id),
            TransportEvent::TrackAvailable {
                participant_id,
                source,
                handle,
            } => self.on_track_available(participant_id, source, handle),
            TransportEvent::TrackRemoved {
                participant_id,
                source,
            } => self.on_track_removed(&participant_id, source),
            TransportEvent::Activity { speaking } => self.on_activity(speaking),
            TransportEvent::DataReceived {
                participant_id,
                payload,
            } => self.on_data(&participant_id, &payload),
            TransportEvent::Disconnected { reason } => {
                warn!("transport for {} disconnected: {}", self.session_id, reason);
                self.teardown(DisconnectReason::TransportFailed(reason)).await;
            }
        }
    }

    fn on_join(&mut self, participant: Participant) {
        let id = participant.id.clone();
        if self.registry.join(participant.clone()) {
            info!("{} joined {}", id, self.session_id);
            self.emit(RoomEvent::ParticipantJoined { participant });
        }
    }

    fn on_leave(&mut self, id: &ParticipantId) {
        let Some((participant, removed)) = self.registry.leave(id) else {
            debug!("leave for unknown participant {} ignored", id);
            return;
        };
        // Publications fall before the participant does, so event
        // consumers never hold a publication without its owner.
        for publication in removed {
            self.emit(RoomEvent::TrackUnpublished {
                participant_id: publication.participant_id,
                source: publication.source,
            });
        }
        if self.speakers.forget(id) {
            self.emit(RoomEvent::ActiveSpeakersChanged {
                speaking: self.speakers.speaking(),
            });
        }
        info!("{} left {}", participant.id, self.session_id);
        self.emit(RoomEvent::ParticipantLeft {
            participant_id: participant.id,
        });
    }

    fn on_track_available(
        &mut self,
        participant_id: ParticipantId,
        source: TrackSource,
        handle: TrackHandle,
    ) {
        let publication = TrackPublication {
            participant_id: participant_id.clone(),
            source,
            handle,
            enabled: true,
        };
        match self.registry.upsert_publication(publication.clone()) {
            PublicationUpsert::Inserted | PublicationUpsert::Updated => {
                debug!("{} {} now available", participant_id, source);
                self.emit(RoomEvent::TrackPublished { publication });
            }
            PublicationUpsert::Unchanged => {
                debug!("duplicate {} announcement from {} ignored", source, participant_id);
            }
            PublicationUpsert::UnknownParticipant => {
                warn!(
                    "track {} for unknown participant {} dropped",
                    source, participant_id
                );
            }
        }
    }

    fn on_track_removed(&mut self, participant_id: &ParticipantId, source: TrackSource) {
        if self.registry.remove_publication(participant_id, source).is_some() {
            debug!("{} {} removed", participant_id, source);
            self.emit(RoomEvent::TrackUnpublished {
                participant_id: participant_id.clone(),
                source,
            });
        }
    }

    fn on_activity(&mut self, speaking: Vec<ParticipantId>) {
        if self.speakers.apply(speaking) {
            self.emit(RoomEvent::ActiveSpeakersChanged {
                speaking: self.speakers.speaking(),
            });
        }
    }

    fn on_data(&mut self, participant_id: &ParticipantId, payload: &[u8]) {
        match self.messenger.incoming(participant_id, payload) {
            Ok(message) => self.emit(RoomEvent::MessageReceived { message }),
            Err(e) => warn!("dropping malformed payload from {}: {}", participant_id, e),
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            session_id: self.session_id.clone(),
            state: *self.state_tx.borrow(),
            participants: self.registry.participants(),
            publications: self.registry.publications(),
            speaking: self.speakers.speaking(),
        }
    }

    /// Tear the session down. Runs at most once; later triggers fall out
    /// at the guard. Order: local media, then presence state, then the
    /// transport, then the terminal state and the final event.
    async fn teardown(&mut self, reason: DisconnectReason) {
        if self.torn_down {
            debug!("teardown for {} already ran", self.session_id);
            return;
        }
        self.torn_down = true;
        info!("tearing down {} ({})", self.session_id, reason);

        for (source, slot) in self.local_tracks.drain() {
            match slot {
                LocalSlot::Empty => {}
                LocalSlot::Acquiring { cancel, reply, .. } => {
                    let _ = cancel.send(true);
                    let _ = reply.send(Err(RoomError::Cancelled(format!(
                        "{} publish cancelled by disconnect",
                        source
                    ))));
                }
                LocalSlot::Published { handle } => {
                    if let Err(e) = self.transport.unpublish_track(source).await {
                        debug!("unpublish of {} during teardown: {}", source, e);
                    }
                    self.devices.release(&handle).await;
                }
            }
        }

        self.registry.clear();
        self.speakers.clear();

        if let Err(e) = self.transport.close().await {
            debug!("transport close during teardown: {}", e);
        }

        let terminal = if reason.is_failure() {
            SessionState::Failed
        } else {
            SessionState::Disconnected
        };
        let _ = self.state_tx.send(terminal);
        self.emit(RoomEvent::Disconnected { reason });
        info!("session {} is now {}", self.session_id, terminal);
    }

    fn emit(&self, event: RoomEvent) {
        // Err means no subscribers right now; events are fire-and-forget.
        let _ = self.events_tx.send(event);
    }
}
