//! Reading message content straight off a channel.

use super::{Session, rpc::required};
use crate::{
    content::ContentAssembly,
    error::Result,
    frame::ChannelId,
    message::BasicMessage,
    transport::FrameTransport,
};

impl<T: FrameTransport> Session<T> {
    /// Read the content header and body frames that follow a content-bearing
    /// method on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SessionError::ProtocolViolation`] when the next frame
    /// is not a header, when a non-body frame interrupts the body, or when the
    /// body exceeds its declared size.
    pub async fn read_content(&mut self, channel: ChannelId) -> Result<BasicMessage> {
        let header = required(self.next_frame_on_channel(channel, None).await?)?;
        let mut assembly = ContentAssembly::from_header(header)?;
        while !assembly.is_complete() {
            let fragment = required(self.next_frame_on_channel(channel, None).await?)?;
            assembly.push(fragment)?;
        }
        Ok(assembly.into_message())
    }
}
