//! Local media device access
//!
//! Cameras and microphones sit behind the [`MediaDevices`] trait. The
//! contract that matters to the rest of the crate: `acquire` may be slow
//! (OS permission prompts, hardware spin-up), so the room never runs it
//! on the session task, and an acquisition whose result is no longer
//! wanted must still be released by whoever holds it.

pub mod simulated;

pub use simulated::SimulatedDevices;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{TrackHandle, TrackSource};

/// Result type for device operations
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Errors from device acquisition
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("permission denied for {0}")]
    PermissionDenied(TrackSource),

    #[error("{0} is in use by another application")]
    Busy(TrackSource),

    #[error("no {0} present")]
    NotFound(TrackSource),

    #[error("device failure: {0}")]
    Hardware(String),
}

/// Access to local capture hardware.
///
/// `acquire` turns the device on and returns a live handle; `release`
/// turns it off. Handles are single-use: once released, a handle is dead
/// and re-enabling a source goes through a fresh `acquire`.
#[async_trait]
pub trait MediaDevices: Send + Sync + fmt::Debug {
    /// Turn on the device behind `source` and return a live handle.
    async fn acquire(&self, source: TrackSource) -> DeviceResult<TrackHandle>;

    /// Turn off the device behind `handle`. Idempotent; releasing an
    /// unknown or already-released handle is a no-op.
    async fn release(&self, handle: &TrackHandle);
}
