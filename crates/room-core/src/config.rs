//! Room configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options handed to the transport when opening a session.
///
/// The transport interprets these; the room layer only carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportOptions {
    /// Let the transport adapt outgoing quality to network conditions
    pub adaptive_quality: bool,

    /// Route media through server-side fanout instead of full-mesh links
    pub multicast_fanout: bool,

    /// How often the transport samples audio levels for activity reports
    pub speaker_interval: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            adaptive_quality: true,
            multicast_fanout: true,
            speaker_interval: Duration::from_millis(300),
        }
    }
}

/// Configuration for connecting and running a session.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// HTTP endpoint that issues session credentials
    pub credential_endpoint: String,

    /// Bound on transport establishment, credential exchange excluded
    pub connect_timeout: Duration,

    /// Delay before the single automatic publish retry
    pub publish_retry_backoff: Duration,

    /// Capacity of the public event stream; slow subscribers that fall
    /// further behind than this lose events, never block the session
    pub event_buffer: usize,

    /// Largest accepted outgoing chat message, in bytes of text
    pub max_message_bytes: usize,

    /// Transport tuning
    pub transport: TransportOptions,
}

impl RoomConfig {
    pub fn new(credential_endpoint: impl Into<String>) -> Self {
        Self {
            credential_endpoint: credential_endpoint.into(),
            connect_timeout: Duration::from_secs(10),
            publish_retry_backoff: Duration::from_millis(250),
            event_buffer: 100,
            max_message_bytes: 16 * 1024,
            transport: TransportOptions::default(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_publish_retry_backoff(mut self, backoff: Duration) -> Self {
        self.publish_retry_backoff = backoff;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn with_max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max;
        self
    }

    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }
}
