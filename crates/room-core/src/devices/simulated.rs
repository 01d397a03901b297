//! Deterministic device layer for tests and demos
//!
//! `SimulatedDevices` mints handles instead of touching hardware and
//! keeps full acquire/release accounting, so tests can assert that every
//! acquisition was released exactly once. Failures and slow acquisition
//! are scripted per call.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{DeviceError, DeviceResult, MediaDevices};
use crate::types::{TrackHandle, TrackSource};

#[derive(Debug, Default)]
struct SimulatedInner {
    /// Injected delay in milliseconds before each acquisition completes
    acquire_delay_ms: AtomicU64,
    /// Scripted failures, consumed one per acquire call
    fail_queue: Mutex<VecDeque<DeviceError>>,
    /// Handles acquired and not yet released
    live: Mutex<HashSet<TrackHandle>>,
    acquired_total: AtomicUsize,
    released_total: AtomicUsize,
}

/// In-memory [`MediaDevices`] implementation.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDevices {
    inner: Arc<SimulatedInner>,
}

impl SimulatedDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every subsequent acquisition by `delay`. Used to hold an
    /// acquisition in flight while a cancel or disconnect races it.
    pub fn set_acquire_delay(&self, delay: Duration) {
        self.inner
            .acquire_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Script the next acquisition to fail with `error`. Multiple calls
    /// queue up, one failure per acquire.
    pub async fn fail_next_acquire(&self, error: DeviceError) {
        self.inner.fail_queue.lock().await.push_back(error);
    }

    /// Handles currently acquired and not released
    pub async fn live_handles(&self) -> usize {
        self.inner.live.lock().await.len()
    }

    /// Total successful acquisitions so far
    pub fn acquired_count(&self) -> usize {
        self.inner.acquired_total.load(Ordering::SeqCst)
    }

    /// Total releases of live handles so far. Never exceeds
    /// `acquired_count`; double releases do not bump it.
    pub fn released_count(&self) -> usize {
        self.inner.released_total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevices for SimulatedDevices {
    async fn acquire(&self, source: TrackSource) -> DeviceResult<TrackHandle> {
        let delay_ms = self.inner.acquire_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if let Some(error) = self.inner.fail_queue.lock().await.pop_front() {
            debug!("simulated {} acquisition failing: {}", source, error);
            return Err(error);
        }

        let handle = TrackHandle::new();
        self.inner.live.lock().await.insert(handle.clone());
        self.inner.acquired_total.fetch_add(1, Ordering::SeqCst);
        debug!("simulated {} acquired as {}", source, handle);
        Ok(handle)
    }

    async fn release(&self, handle: &TrackHandle) {
        if self.inner.live.lock().await.remove(handle) {
            self.inner.released_total.fetch_add(1, Ordering::SeqCst);
            debug!("simulated handle {} released", handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_release_accounting() {
        let devices = SimulatedDevices::new();
        let handle = devices.acquire(TrackSource::Camera).await.unwrap();
        assert_eq!(devices.live_handles().await, 1);

        devices.release(&handle).await;
        assert_eq!(devices.live_handles().await, 0);
        assert_eq!(devices.acquired_count(), 1);
        assert_eq!(devices.released_count(), 1);

        // Double release must not count twice
        devices.release(&handle).await;
        assert_eq!(devices.released_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let devices = SimulatedDevices::new();
        devices
            .fail_next_acquire(DeviceError::Busy(TrackSource::Microphone))
            .await;

        let result = devices.acquire(TrackSource::Microphone).await;
        assert!(matches!(result, Err(DeviceError::Busy(_))));

        // The failure was consumed; the next acquire succeeds
        assert!(devices.acquire(TrackSource::Microphone).await.is_ok());
    }

    #[tokio::test]
    async fn test_fresh_handles() {
        let devices = SimulatedDevices::new();
        let first = devices.acquire(TrackSource::Camera).await.unwrap();
        devices.release(&first).await;
        let second = devices.acquire(TrackSource::Camera).await.unwrap();
        assert_ne!(first, second, "released handles are never reused");
    }
}
