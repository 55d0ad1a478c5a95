//! Platform client seam consumed by the forwarding loop.
//!
//! The loop never talks to Telegram directly; it goes through
//! [`ChannelClient`] so tests can run against an in-memory double. The
//! grammers-backed implementation lives in [`crate::telegram`].

use std::sync::Arc;

use crate::error::Result;

/// Media attachment of a fetched message, with its optional caption.
#[derive(Debug, Clone)]
pub struct MediaPart<M> {
    pub handle: M,
    pub caption: Option<String>,
}

/// A message fetched from a source channel. Immutable once fetched.
#[derive(Debug, Clone)]
pub struct ChannelMessage<M> {
    pub id: i32,
    pub text: Option<String>,
    pub media: Option<MediaPart<M>>,
}

impl<M> ChannelMessage<M> {
    pub fn caption(&self) -> Option<&str> {
        self.media.as_ref().and_then(|m| m.caption.as_deref())
    }
}

/// Capabilities the forwarder needs from the platform.
///
/// `Media` is the platform's opaque attachment handle; the loop only
/// hands it back when re-sending, never inspects it.
#[allow(async_fn_in_trait)]
pub trait ChannelClient {
    type Media;

    /// Display title of a channel.
    async fn channel_title(&self, channel: i64) -> Result<String>;

    /// Id of the newest message in a channel, if any.
    async fn latest_message_id(&self, channel: i64) -> Result<Option<i32>>;

    /// All messages with id strictly greater than `min_id`, newest first.
    async fn messages_after(
        &self,
        channel: i64,
        min_id: i32,
    ) -> Result<Vec<ChannelMessage<Self::Media>>>;

    async fn send_text(&self, destination: i64, text: &str) -> Result<()>;

    async fn send_media(&self, destination: i64, media: &Self::Media, caption: &str)
        -> Result<()>;

    /// Raw forward of an existing message, preserving its origin.
    async fn forward_message(&self, destination: i64, message_id: i32, source: i64) -> Result<()>;
}

/// Shared handles delegate to the underlying client.
impl<T: ChannelClient> ChannelClient for Arc<T> {
    type Media = T::Media;

    async fn channel_title(&self, channel: i64) -> Result<String> {
        (**self).channel_title(channel).await
    }

    async fn latest_message_id(&self, channel: i64) -> Result<Option<i32>> {
        (**self).latest_message_id(channel).await
    }

    async fn messages_after(
        &self,
        channel: i64,
        min_id: i32,
    ) -> Result<Vec<ChannelMessage<Self::Media>>> {
        (**self).messages_after(channel, min_id).await
    }

    async fn send_text(&self, destination: i64, text: &str) -> Result<()> {
        (**self).send_text(destination, text).await
    }

    async fn send_media(
        &self,
        destination: i64,
        media: &Self::Media,
        caption: &str,
    ) -> Result<()> {
        (**self).send_media(destination, media, caption).await
    }

    async fn forward_message(&self, destination: i64, message_id: i32, source: i64) -> Result<()> {
        (**self).forward_message(destination, message_id, source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_reads_through_media() {
        let message = ChannelMessage::<()> {
            id: 1,
            text: None,
            media: Some(MediaPart {
                handle: (),
                caption: Some("a caption".to_string()),
            }),
        };
        assert_eq!(message.caption(), Some("a caption"));
    }

    #[test]
    fn caption_is_none_without_media() {
        let message = ChannelMessage::<()> {
            id: 1,
            text: Some("hi".to_string()),
            media: None,
        };
        assert_eq!(message.caption(), None);
    }
}
