//! Local track lifecycle
//!
//! Each local source is Empty, Acquiring, or Published. Disabling is a
//! full teardown of the publication and the device handle; re-enabling
//! starts over with a fresh acquisition and a fresh handle.
//!
//! Device acquisition is the one slow call in the crate, so it runs on
//! its own task and reports back through the session task's notice
//! queue. The session task cancels an acquisition by flipping a watch
//! flag; the task sees the flag at its next checkpoint and releases
//! whatever it already holds. The device wait itself is not interrupted
//! mid-call, so a cancel that lands while the hardware is spinning up
//! still gets the acquired handle released. Once a publish has landed,
//! the outcome always travels back to the session task, which undoes it
//! if the slot has since moved on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::devices::MediaDevices;
use crate::errors::{Result, RoomError};
use crate::transport::Transport;
use crate::types::{TrackHandle, TrackSource};

/// Outcome of one acquisition attempt, delivered to the session task
#[derive(Debug)]
pub(crate) enum LocalNotice {
    /// Acquired and published; the slot should move to Published
    Published {
        attempt: u64,
        source: TrackSource,
        handle: TrackHandle,
    },

    /// Acquisition or publication failed; everything acquired has been
    /// released already
    Failed {
        attempt: u64,
        source: TrackSource,
        error: RoomError,
    },

    /// The attempt saw its cancel flag and cleaned up after itself
    Cancelled { attempt: u64, source: TrackSource },
}

/// Where one local source currently stands
#[derive(Debug)]
pub(crate) enum LocalSlot {
    Empty,
    Acquiring {
        attempt: u64,
        cancel: watch::Sender<bool>,
        reply: oneshot::Sender<Result<()>>,
    },
    Published {
        handle: TrackHandle,
    },
}

/// Per-source slots plus the attempt counter that keeps stale
/// acquisition results from being applied.
#[derive(Debug, Default)]
pub(crate) struct LocalTracks {
    slots: HashMap<TrackSource, LocalSlot>,
    attempts: u64,
}

impl LocalTracks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot for `source`, leaving Empty behind
    pub fn take(&mut self, source: TrackSource) -> LocalSlot {
        self.slots.remove(&source).unwrap_or(LocalSlot::Empty)
    }

    pub fn set(&mut self, source: TrackSource, slot: LocalSlot) {
        self.slots.insert(source, slot);
    }

    pub fn is_published(&self, source: TrackSource) -> bool {
        matches!(self.slots.get(&source), Some(LocalSlot::Published { .. }))
    }

    pub fn is_empty(&self, source: TrackSource) -> bool {
        matches!(self.slots.get(&source), None | Some(LocalSlot::Empty))
    }

    pub fn next_attempt(&mut self) -> u64 {
        self.attempts += 1;
        self.attempts
    }

    /// Resolve an acquisition outcome against the current slot. Returns
    /// the pending reply when the notice matches the in-flight attempt
    /// (slot is left Empty for the caller to fill); None for stale
    /// notices from attempts that were since cancelled or replaced.
    pub fn finish_attempt(
        &mut self,
        source: TrackSource,
        attempt: u64,
    ) -> Option<oneshot::Sender<Result<()>>> {
        match self.take(source) {
            LocalSlot::Acquiring {
                attempt: current,
                reply,
                ..
            } if current == attempt => Some(reply),
            other => {
                self.set(source, other);
                None
            }
        }
    }

    /// Empty every slot, handing them back for teardown
    pub fn drain(&mut self) -> Vec<(TrackSource, LocalSlot)> {
        self.slots.drain().collect()
    }
}

/// Run one acquisition attempt off the session task: acquire the device,
/// publish it (retrying once after `retry_backoff`), and report the
/// outcome. Every exit path either hands the handle over or releases it.
pub(crate) fn spawn_acquisition(
    attempt: u64,
    source: TrackSource,
    devices: Arc<dyn MediaDevices>,
    transport: Arc<dyn Transport>,
    retry_backoff: Duration,
    cancel: watch::Receiver<bool>,
    notices: mpsc::Sender<LocalNotice>,
) {
    tokio::spawn(async move {
        let cancelled = || *cancel.borrow();

        let handle = match devices.acquire(source).await {
            Ok(handle) => handle,
            Err(e) => {
                if cancelled() {
                    let _ = notices.send(LocalNotice::Cancelled { attempt, source }).await;
                } else {
                    let error = RoomError::DeviceUnavailable {
                        source,
                        reason: e.to_string(),
                    };
                    let _ = notices
                        .send(LocalNotice::Failed {
                            attempt,
                            source,
                            error,
                        })
                        .await;
                }
                return;
            }
        };

        if cancelled() {
            debug!("{} acquisition cancelled after acquire, releasing", source);
            devices.release(&handle).await;
            let _ = notices.send(LocalNotice::Cancelled { attempt, source }).await;
            return;
        }

        let mut last_error = String::new();
        for delay in [None, Some(retry_backoff)] {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
                if cancelled() {
                    break;
                }
            }
            match transport.publish_track(source, &handle).await {
                Ok(()) => {
                    // The session task owns the outcome from here; it
                    // undoes the publish if the slot has moved on.
                    let delivered = notices
                        .send(LocalNotice::Published {
                            attempt,
                            source,
                            handle: handle.clone(),
                        })
                        .await;
                    if delivered.is_err() {
                        // Session task already exited; nothing will
                        // ever own this handle.
                        devices.release(&handle).await;
                    }
                    return;
                }
                Err(e) => {
                    warn!("publish attempt for {} failed: {}", source, e);
                    last_error = e.to_string();
                }
            }
        }

        devices.release(&handle).await;
        if cancelled() {
            let _ = notices.send(LocalNotice::Cancelled { attempt, source }).await;
        } else {
            let _ = notices
                .send(LocalNotice::Failed {
                    attempt,
                    source,
                    error: RoomError::PublishFailed {
                        source,
                        reason: last_error,
                    },
                })
                .await;
        }
    });
}
