//! In-process transport over `tokio::sync::mpsc`.
//!
//! [`MemoryTransport`] is the session side; [`BrokerHandle`] is held by
//! whatever plays the broker, typically a task spawned in a test.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{DEFAULT_FRAME_MAX, FrameTransport};
use crate::{error::TransportError, frame::Frame, properties::FieldTable};

/// Session side of an in-process frame pipe.
#[derive(Debug)]
pub struct MemoryTransport {
    to_broker: mpsc::Sender<Frame>,
    from_broker: mpsc::Receiver<Frame>,
    channel_max: u16,
    frame_max: u32,
    server_properties: FieldTable,
}

/// Broker side of an in-process frame pipe.
#[derive(Debug)]
pub struct BrokerHandle {
    to_client: mpsc::Sender<Frame>,
    from_client: mpsc::Receiver<Frame>,
}

/// Builder for a [`MemoryTransport`] and its paired [`BrokerHandle`].
///
/// Both directions default to a capacity of 64 frames. The channel and frame
/// limits default to 0 (protocol maximum) and [`DEFAULT_FRAME_MAX`].
///
/// ```
/// use amqp_session::transport::MemoryTransport;
///
/// let (_transport, _broker) = MemoryTransport::builder()
///     .capacity(16)
///     .channel_max(32)
///     .build();
/// ```
#[derive(Debug)]
pub struct MemoryTransportBuilder {
    capacity: usize,
    channel_max: u16,
    frame_max: u32,
    server_properties: FieldTable,
}

impl Default for MemoryTransportBuilder {
    fn default() -> Self {
        Self {
            capacity: 64,
            channel_max: 0,
            frame_max: DEFAULT_FRAME_MAX,
            server_properties: FieldTable::new(),
        }
    }
}

impl MemoryTransportBuilder {
    /// Set the capacity of each direction.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        debug_assert!(capacity > 0, "capacity must be greater than zero");
        self.capacity = capacity.max(1);
        self
    }

    /// Set the channel limit reported to the session.
    #[must_use]
    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.channel_max = channel_max;
        self
    }

    /// Set the frame size limit reported to the session.
    #[must_use]
    pub fn frame_max(mut self, frame_max: u32) -> Self {
        self.frame_max = frame_max;
        self
    }

    /// Set the server properties reported to the session.
    #[must_use]
    pub fn server_properties(mut self, properties: FieldTable) -> Self {
        self.server_properties = properties;
        self
    }

    /// Create the connected pair.
    #[must_use]
    pub fn build(self) -> (MemoryTransport, BrokerHandle) {
        let (to_broker, from_client) = mpsc::channel(self.capacity);
        let (to_client, from_broker) = mpsc::channel(self.capacity);
        (
            MemoryTransport {
                to_broker,
                from_broker,
                channel_max: self.channel_max,
                frame_max: self.frame_max,
                server_properties: self.server_properties,
            },
            BrokerHandle {
                to_client,
                from_client,
            },
        )
    }
}

impl MemoryTransport {
    /// Start configuring a connected pair.
    #[must_use]
    pub fn builder() -> MemoryTransportBuilder { MemoryTransportBuilder::default() }

    /// Create a connected pair with default settings.
    #[must_use]
    pub fn pair() -> (Self, BrokerHandle) { MemoryTransportBuilder::default().build() }
}

#[async_trait]
impl FrameTransport for MemoryTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.to_broker
            .send(frame)
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    async fn receive(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<Frame>, TransportError> {
        let frame = match timeout {
            None => self.from_broker.recv().await,
            Some(limit) => match tokio::time::timeout(limit, self.from_broker.recv()).await {
                Ok(frame) => frame,
                Err(_) => return Ok(None),
            },
        };
        frame.map(Some).ok_or(TransportError::Disconnected)
    }

    fn channel_max(&self) -> u16 { self.channel_max }

    fn frame_max(&self) -> u32 { self.frame_max }

    fn server_properties(&self) -> FieldTable { self.server_properties.clone() }
}

impl BrokerHandle {
    /// Send a frame to the session.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Disconnected`] once the session side has
    /// been dropped.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.to_client
            .send(frame)
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    /// Receive the next frame written by the session, or `None` once the
    /// session side has been dropped.
    pub async fn recv(&mut self) -> Option<Frame> { self.from_client.recv().await }
}
