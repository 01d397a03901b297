//! In-process transport
//!
//! Routes sessions between participants living in the same process. An
//! [`InProcHub`] plays the server role: it owns the rooms, fans joins,
//! tracks, data payloads, and activity reports out to every other member,
//! and honors the same token/URL contract a real transport would. Each
//! client connects through an [`InProcConnector`] bound to the hub.
//!
//! No media flows; tracks are bookkept by handle. This is the transport
//! behind the integration tests and the demo binaries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    RemoteTrack, RosterEntry, Transport, TransportConnector, TransportError, TransportEvent,
    TransportResult, TransportSession,
};
use crate::config::TransportOptions;
use crate::types::{Participant, ParticipantId, TrackHandle, TrackSource};

const EVENT_CHANNEL_CAPACITY: usize = 100;

const TOKEN_PREFIX: &str = "inproc";

/// One member of a room, as the hub sees them
#[derive(Debug)]
struct Member {
    id: ParticipantId,
    display_name: String,
    sender: mpsc::Sender<TransportEvent>,
    tracks: HashMap<TrackSource, TrackHandle>,
}

impl Member {
    /// How this member appears to everyone else
    fn as_remote(&self) -> Participant {
        Participant {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            is_local: false,
        }
    }
}

#[derive(Debug, Default)]
struct Room {
    members: HashMap<ParticipantId, Member>,
}

impl Room {
    /// Deliver an event to every member except `from`. Slow consumers
    /// lose events rather than wedging the hub.
    fn fanout(&self, from: Option<&ParticipantId>, event: TransportEvent) {
        for (id, member) in &self.members {
            if Some(id) == from {
                continue;
            }
            if member.sender.try_send(event.clone()).is_err() {
                warn!("dropping transport event for slow or gone member {}", id);
            }
        }
    }
}

/// In-process media server.
///
/// Rooms are keyed by session name and live for the lifetime of the hub.
/// The hub also mints the tokens its connector accepts, standing in for
/// the credential backend in tests and demos.
#[derive(Debug, Default)]
pub struct InProcHub {
    rooms: DashMap<String, Arc<Mutex<Room>>>,
    publish_failures: AtomicUsize,
    refuse_connects: AtomicUsize,
}

impl InProcHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Token the connector will accept for `session_name` as
    /// `participant_name`
    pub fn token_for(&self, session_name: &str, participant_name: &str) -> String {
        format!("{}:{}:{}", TOKEN_PREFIX, session_name, participant_name)
    }

    /// URL accepted by connectors bound to this hub
    pub fn url(&self) -> String {
        format!("{}://hub", TOKEN_PREFIX)
    }

    fn room(&self, session_name: &str) -> Arc<Mutex<Room>> {
        self.rooms
            .entry(session_name.to_string())
            .or_default()
            .clone()
    }

    async fn join(self: &Arc<Self>, session_name: &str, display_name: &str) -> TransportSession {
        let id = ParticipantId::new(format!("part_{}", Uuid::new_v4()));
        let (sender, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let room = self.room(session_name);
        let mut guard = room.lock().await;

        let roster = guard
            .members
            .values()
            .map(|member| RosterEntry {
                participant: member.as_remote(),
                tracks: member
                    .tracks
                    .iter()
                    .map(|(source, handle)| RemoteTrack {
                        source: *source,
                        handle: handle.clone(),
                    })
                    .collect(),
            })
            .collect();

        let member = Member {
            id: id.clone(),
            display_name: display_name.to_string(),
            sender,
            tracks: HashMap::new(),
        };
        guard.fanout(
            None,
            TransportEvent::Joined {
                participant: member.as_remote(),
            },
        );
        guard.members.insert(id.clone(), member);
        drop(guard);

        debug!("{} joined in-proc room '{}'", id, session_name);

        let transport: Arc<dyn Transport> = Arc::new(InProcTransport {
            hub: self.clone(),
            session_name: session_name.to_string(),
            local_id: id.clone(),
            closed: AtomicBool::new(false),
        });

        TransportSession {
            transport,
            events,
            local: Participant {
                id,
                display_name: display_name.to_string(),
                is_local: true,
            },
            roster,
        }
    }

    async fn publish(
        &self,
        session_name: &str,
        from: &ParticipantId,
        source: TrackSource,
        handle: &TrackHandle,
    ) -> TransportResult<()> {
        if self
            .publish_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::PublishRejected(
                "scripted rejection".to_string(),
            ));
        }

        let room = self.room(session_name);
        let mut guard = room.lock().await;
        match guard.members.get_mut(from) {
            Some(member) => {
                member.tracks.insert(source, handle.clone());
            }
            None => return Err(TransportError::Closed),
        }
        guard.fanout(
            Some(from),
            TransportEvent::TrackAvailable {
                participant_id: from.clone(),
                source,
                handle: handle.clone(),
            },
        );
        Ok(())
    }

    async fn unpublish(&self, session_name: &str, from: &ParticipantId, source: TrackSource) {
        let room = self.room(session_name);
        let mut guard = room.lock().await;
        let removed = guard
            .members
            .get_mut(from)
            .and_then(|member| member.tracks.remove(&source))
            .is_some();
        if removed {
            guard.fanout(
                Some(from),
                TransportEvent::TrackRemoved {
                    participant_id: from.clone(),
                    source,
                },
            );
        }
    }

    async fn send_data(
        &self,
        session_name: &str,
        from: &ParticipantId,
        payload: Bytes,
    ) -> TransportResult<()> {
        let room = self.room(session_name);
        let guard = room.lock().await;
        if !guard.members.contains_key(from) {
            return Err(TransportError::Closed);
        }
        guard.fanout(
            Some(from),
            TransportEvent::DataReceived {
                participant_id: from.clone(),
                payload,
            },
        );
        Ok(())
    }

    async fn leave(&self, session_name: &str, id: &ParticipantId) {
        let room = self.room(session_name);
        let mut guard = room.lock().await;
        if guard.members.remove(id).is_some() {
            guard.fanout(
                None,
                TransportEvent::Left {
                    participant_id: id.clone(),
                },
            );
            debug!("{} left in-proc room '{}'", id, session_name);
        }
    }

    // ========== TEST & DEMO CONTROLS ==========

    /// Reject the next `count` publish_track calls hub-wide
    pub fn fail_publishes(&self, count: usize) {
        self.publish_failures.store(count, Ordering::SeqCst);
    }

    /// Refuse the next `count` connect attempts
    pub fn refuse_connects(&self, count: usize) {
        self.refuse_connects.store(count, Ordering::SeqCst);
    }

    /// Report who is audibly speaking in a room right now. Delivered to
    /// every member, the speakers included.
    pub async fn set_active_speakers(&self, session_name: &str, speaking: Vec<ParticipantId>) {
        let room = self.room(session_name);
        let guard = room.lock().await;
        guard.fanout(None, TransportEvent::Activity { speaking });
    }

    /// Sever one member as a network failure would: they get a
    /// `Disconnected` event, everyone else sees them leave.
    pub async fn drop_participant(&self, session_name: &str, id: &ParticipantId, reason: &str) {
        let room = self.room(session_name);
        let mut guard = room.lock().await;
        let Some(member) = guard.members.remove(id) else {
            return;
        };
        if member
            .sender
            .try_send(TransportEvent::Disconnected {
                reason: reason.to_string(),
            })
            .is_err()
        {
            warn!("dropped member {} was not listening", id);
        }
        guard.fanout(
            None,
            TransportEvent::Left {
                participant_id: id.clone(),
            },
        );
    }

    /// Kill a whole room, as a server crash would
    pub async fn fail_session(&self, session_name: &str, reason: &str) {
        let room = self.room(session_name);
        let mut guard = room.lock().await;
        guard.fanout(
            None,
            TransportEvent::Disconnected {
                reason: reason.to_string(),
            },
        );
        guard.members.clear();
    }
}

/// Connector for sessions hosted on an [`InProcHub`]
#[derive(Debug, Clone)]
pub struct InProcConnector {
    hub: Arc<InProcHub>,
}

impl InProcConnector {
    pub fn new(hub: Arc<InProcHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl TransportConnector for InProcConnector {
    async fn connect(
        &self,
        url: &str,
        token: &str,
        options: &TransportOptions,
    ) -> TransportResult<TransportSession> {
        if self
            .hub
            .refuse_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::ConnectRefused(
                "scripted refusal".to_string(),
            ));
        }

        if !url.starts_with(TOKEN_PREFIX) {
            return Err(TransportError::ConnectRefused(format!(
                "unsupported url: {}",
                url
            )));
        }

        let mut parts = token.splitn(3, ':');
        let (session_name, display_name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(TOKEN_PREFIX), Some(session), Some(name)) => (session, name),
            _ => {
                return Err(TransportError::ConnectRefused(
                    "unrecognized token".to_string(),
                ))
            }
        };

        debug!(
            "in-proc connect to '{}' as '{}' (adaptive_quality={}, multicast_fanout={})",
            session_name, display_name, options.adaptive_quality, options.multicast_fanout
        );

        Ok(self.hub.join(session_name, display_name).await)
    }
}

/// Client-side handle to a hub room
#[derive(Debug)]
pub struct InProcTransport {
    hub: Arc<InProcHub>,
    session_name: String,
    local_id: ParticipantId,
    closed: AtomicBool,
}

#[async_trait]
impl Transport for InProcTransport {
    async fn publish_track(
        &self,
        source: TrackSource,
        handle: &TrackHandle,
    ) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.hub
            .publish(&self.session_name, &self.local_id, source, handle)
            .await
    }

    async fn unpublish_track(&self, source: TrackSource) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.hub
            .unpublish(&self.session_name, &self.local_id, source)
            .await;
        Ok(())
    }

    async fn send_data(&self, payload: Bytes) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.hub
            .send_data(&self.session_name, &self.local_id, payload)
            .await
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.hub.leave(&self.session_name, &self.local_id).await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
