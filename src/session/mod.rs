//! The session: one connection's channels, parked frames and consumers.
//!
//! A [`Session`] is driven through `&mut self` methods; the only suspension
//! points are transport reads and writes. No background task is spawned, so
//! sharing a session between tasks requires an external mutex around it.
//!
//! The implementation is split by concern:
//!
//! - `rpc`: request/reply exchanges, frame waits and close detection
//! - `channels`: channel acquisition, release and close handshakes
//! - `confirm`: publishing and publisher-confirm tracking
//! - `content`: reading a content header and body off a channel
//! - `consume`: consumers, direct reply-to and message polling

mod channels;
mod confirm;
mod consume;
mod content;
mod rpc;

pub use confirm::{PublishOptions, PublishToken};
pub use consume::ConsumeOptions;
use log::debug;

use crate::{
    broker_version::BrokerVersion,
    channel::{ChannelPool, ChannelState},
    config::SessionConfig,
    consumer::ConsumerRegistry,
    error::{Result, SessionError},
    frame::ChannelId,
    frame_queue::FrameQueue,
    transport::{FrameTransport, RpcReply},
};

/// Client-side state for one broker connection.
#[derive(Debug)]
pub struct Session<T> {
    transport: T,
    config: SessionConfig,
    pool: ChannelPool,
    queue: FrameQueue,
    consumers: ConsumerRegistry,
    connected: bool,
    broker_version: BrokerVersion,
}

/// Builder for [`Session`].
///
/// ```no_run
/// use amqp_session::{Session, transport::{MemoryTransport, RpcReply}};
///
/// # async fn demo() -> amqp_session::Result<()> {
/// let (transport, _broker) = MemoryTransport::pair();
/// let session = Session::builder()
///     .publisher_confirms(false)
///     .establish(transport, RpcReply::Normal)
///     .await?;
/// assert!(session.is_connected());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Start from [`SessionConfig::default`].
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable or disable publisher confirms on newly opened channels.
    #[must_use]
    pub fn publisher_confirms(mut self, enabled: bool) -> Self {
        self.config.publisher_confirms = enabled;
        self
    }

    /// Set the pseudo-queue name that triggers direct reply-to.
    #[must_use]
    pub fn direct_reply_queue(mut self, queue: impl Into<String>) -> Self {
        self.config.direct_reply_queue = queue.into();
        self
    }

    /// Wrap an authenticated transport in a session.
    ///
    /// `login_reply` is the outcome of the transport's login handshake and is
    /// checked as an RPC reply on channel 0.
    ///
    /// # Errors
    ///
    /// Returns the error mapped from `login_reply` when the login failed.
    pub async fn establish<T: FrameTransport>(
        self,
        transport: T,
        login_reply: RpcReply,
    ) -> Result<Session<T>> {
        let mut session = Session {
            transport,
            config: self.config,
            pool: ChannelPool::new(),
            queue: FrameQueue::new(),
            consumers: ConsumerRegistry::new(),
            connected: true,
            broker_version: BrokerVersion::UNKNOWN,
        };
        session.check_rpc_reply(0, login_reply).await?;
        session.broker_version =
            BrokerVersion::from_server_properties(&session.transport.server_properties());
        debug!(
            "session established: broker_version={}, channel_max={}, frame_max={}",
            session.broker_version,
            session.transport.channel_max(),
            session.transport.frame_max()
        );
        Ok(session)
    }
}

impl Session<()> {
    /// Start configuring a session.
    #[must_use]
    pub fn builder() -> SessionBuilder { SessionBuilder::new() }
}

impl<T: FrameTransport> Session<T> {
    /// Returns `false` once the connection has been closed by either side.
    #[must_use]
    pub fn is_connected(&self) -> bool { self.connected }

    /// Broker version advertised at establishment.
    #[must_use]
    pub fn broker_version(&self) -> BrokerVersion { self.broker_version }

    #[must_use]
    pub fn config(&self) -> &SessionConfig { &self.config }

    /// Bookkeeping for channel `id`, if it has ever been allocated.
    #[must_use]
    pub fn channel_state(&self, id: ChannelId) -> Option<&ChannelState> { self.pool.state(id) }

    /// Frames read ahead of the operation that needs them.
    #[must_use]
    pub fn frame_queue(&self) -> &FrameQueue { &self.queue }

    /// Registered consumers.
    #[must_use]
    pub fn consumers(&self) -> &ConsumerRegistry { &self.consumers }

    #[must_use]
    pub fn transport(&self) -> &T { &self.transport }

    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    /// Consume the session, returning its transport.
    #[must_use]
    pub fn into_transport(self) -> T { self.transport }

    /// Fail fast once the connection is gone.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConnectionClosed`] when disconnected.
    pub fn check_is_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(SessionError::ConnectionClosed)
        }
    }
}

#[cfg(test)]
mod tests;
