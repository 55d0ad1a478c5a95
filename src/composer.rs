//! Outbound message composition
//!
//! Decides how a qualifying message is reconstructed at the destination
//! and prefixes the provenance header.

use crate::client::ChannelMessage;

/// Delivery plan for one qualifying message.
#[derive(Debug, PartialEq, Eq)]
pub enum Outbound<'a, M> {
    /// Plain text message.
    Text(String),
    /// Re-send the media with a new caption.
    Media { handle: &'a M, caption: String },
    /// Raw forward of the original message.
    Forward { message_id: i32 },
}

/// Provenance header prepended to reconstructed messages.
pub fn header(title: &str) -> String {
    format!("New Post From [{}]", title)
}

/// Decide how a fetched message is rebuilt at the destination.
///
/// A message with neither text nor media is forwarded raw, without the
/// header; that branch keeps the original message untouched.
pub fn compose<'a, M>(message: &'a ChannelMessage<M>, title: &str) -> Outbound<'a, M> {
    let header = header(title);
    let text = message.text.as_deref().filter(|t| !t.is_empty());

    match (&message.media, text) {
        (Some(media), Some(text)) => Outbound::Media {
            handle: &media.handle,
            caption: format!("{}\n\n{}", header, text),
        },
        (None, Some(text)) => Outbound::Text(format!("{}\n\n{}", header, text)),
        (Some(media), None) => {
            let caption = match media.caption.as_deref().filter(|c| !c.is_empty()) {
                Some(caption) => format!("{}\n\n{}", header, caption),
                None => header,
            };
            Outbound::Media {
                handle: &media.handle,
                caption,
            }
        }
        (None, None) => Outbound::Forward {
            message_id: message.id,
        },
    }
}
