//! A transport that replays a fixed script of broker frames.

use std::{collections::VecDeque, time::Duration};

use amqp_session::{
    ChannelId,
    FieldTable,
    Frame,
    FrameTransport,
    TransportError,
    transport::DEFAULT_FRAME_MAX,
};
use async_trait::async_trait;

/// In-memory [`FrameTransport`] driven by a queue of scripted frames.
///
/// Every `receive` call is counted, whether or not it yields a frame. Once
/// the script is exhausted a bounded read reports a timeout and an unbounded
/// read reports [`TransportError::Disconnected`], so a test that waits for a
/// frame it never scripted fails instead of hanging.
#[derive(Debug)]
pub struct ScriptedTransport {
    inbound: VecDeque<Frame>,
    sent: Vec<Frame>,
    reads: usize,
    released: Vec<ChannelId>,
    fail_sends: bool,
    channel_max: u16,
    frame_max: u32,
    server_properties: FieldTable,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            inbound: VecDeque::new(),
            sent: Vec::new(),
            reads: 0,
            released: Vec::new(),
            fail_sends: false,
            channel_max: 0,
            frame_max: DEFAULT_FRAME_MAX,
            server_properties: FieldTable::new(),
        }
    }
}

impl ScriptedTransport {
    /// Create a transport with an empty script.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create a transport that will deliver `frames` in order.
    #[must_use]
    pub fn with_frames(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            inbound: frames.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Set the negotiated channel limit.
    #[must_use]
    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.channel_max = channel_max;
        self
    }

    /// Set the negotiated frame size limit.
    #[must_use]
    pub fn frame_max(mut self, frame_max: u32) -> Self {
        self.frame_max = frame_max;
        self
    }

    /// Set the advertised server properties.
    #[must_use]
    pub fn server_properties(mut self, properties: FieldTable) -> Self {
        self.server_properties = properties;
        self
    }

    /// Append frames to the script.
    pub fn script(&mut self, frames: impl IntoIterator<Item = Frame>) {
        self.inbound.extend(frames);
    }

    /// Make every subsequent `send` fail with
    /// [`TransportError::Disconnected`].
    pub fn fail_sends(&mut self, fail: bool) { self.fail_sends = fail; }

    /// Frames written by the session, oldest first.
    #[must_use]
    pub fn sent(&self) -> &[Frame] { &self.sent }

    /// Take and clear the frames written so far.
    pub fn take_sent(&mut self) -> Vec<Frame> { std::mem::take(&mut self.sent) }

    /// Number of `receive` calls made.
    #[must_use]
    pub fn reads(&self) -> usize { self.reads }

    /// Scripted frames not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize { self.inbound.len() }

    /// Channels passed to `release_buffers_if_idle`, in call order.
    #[must_use]
    pub fn released(&self) -> &[ChannelId] { &self.released }
}

#[async_trait]
impl FrameTransport for ScriptedTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::Disconnected);
        }
        self.sent.push(frame);
        Ok(())
    }

    async fn receive(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<Frame>, TransportError> {
        self.reads += 1;
        match self.inbound.pop_front() {
            Some(frame) => Ok(Some(frame)),
            None if timeout.is_some() => Ok(None),
            None => Err(TransportError::Disconnected),
        }
    }

    fn channel_max(&self) -> u16 { self.channel_max }

    fn frame_max(&self) -> u32 { self.frame_max }

    fn server_properties(&self) -> FieldTable { self.server_properties.clone() }

    fn release_buffers_if_idle(&mut self, channel: ChannelId) { self.released.push(channel); }
}
