//! grammers-backed implementation of the platform client seam
//!
//! Channel ids are resolved to peers through the dialog list (the
//! channel must be visible to the signed-in account) and cached for the
//! lifetime of the client.

use std::collections::HashMap;
use std::sync::Mutex;

use grammers_client::media::Media;
use grammers_client::message::{InputMessage, Message};
use grammers_client::peer::Peer;
use grammers_client::Client;

use grammers_session::types::PeerRef;

use crate::client::{ChannelClient, ChannelMessage, MediaPart};
use crate::error::{Error, Result};

pub struct TelegramChannelClient {
    client: Client,
    peers: Mutex<HashMap<i64, Peer>>,
}

impl TelegramChannelClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            peers: Mutex::new(HashMap::new()),
        }
    }

    async fn resolve_peer(&self, channel: i64) -> Result<Peer> {
        if let Some(peer) = self.peers.lock().expect("peer cache lock").get(&channel) {
            return Ok(peer.clone());
        }

        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await.transpose() {
            let dialog = dialog.map_err(Error::from)?;
            if peer_id(&dialog.peer) == channel {
                let peer = dialog.peer.clone();
                self.peers
                    .lock()
                    .expect("peer cache lock")
                    .insert(channel, peer.clone());
                return Ok(peer);
            }
        }

        Err(Error::ChannelNotFound(channel))
    }

    async fn resolve_peer_ref(&self, channel: i64) -> Result<PeerRef> {
        let peer = self.resolve_peer(channel).await?;
        peer.to_ref()
            .await
            .map_err(|e| Error::Telegram(e.to_string()))?
            .ok_or(Error::ChannelNotFound(channel))
    }
}

/// Raw id of a peer, regardless of its kind.
fn peer_id(peer: &Peer) -> i64 {
    match peer {
        Peer::User(u) => u.raw.id(),
        Peer::Group(g) => match &g.raw {
            grammers_tl_types::enums::Chat::Empty(c) => c.id,
            grammers_tl_types::enums::Chat::Chat(c) => c.id,
            grammers_tl_types::enums::Chat::Forbidden(c) => c.id,
            grammers_tl_types::enums::Chat::Channel(c) => c.id,
            grammers_tl_types::enums::Chat::ChannelForbidden(c) => c.id,
        },
        Peer::Channel(c) => c.raw.id,
    }
}

/// Get the display name for a peer
fn peer_name(peer: &Peer) -> String {
    peer.name()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Map a fetched grammers message onto the loop's message model.
///
/// Telegram stores a media caption in the same text field as a plain
/// message body, so captioned media surfaces as text + media here.
fn convert(message: &Message) -> ChannelMessage<Media> {
    let text = Some(message.text().to_string()).filter(|t| !t.is_empty());
    let media = message.media().map(|handle| MediaPart {
        handle,
        caption: None,
    });

    ChannelMessage {
        id: message.id(),
        text,
        media,
    }
}

impl ChannelClient for TelegramChannelClient {
    type Media = Media;

    async fn channel_title(&self, channel: i64) -> Result<String> {
        let peer = self.resolve_peer(channel).await?;
        Ok(peer_name(&peer))
    }

    async fn latest_message_id(&self, channel: i64) -> Result<Option<i32>> {
        let peer = self.resolve_peer_ref(channel).await?;

        let mut iter = self.client.iter_messages(peer).limit(1);
        match iter.next().await.transpose() {
            Some(message) => Ok(Some(message.map_err(Error::from)?.id())),
            None => Ok(None),
        }
    }

    async fn messages_after(
        &self,
        channel: i64,
        min_id: i32,
    ) -> Result<Vec<ChannelMessage<Media>>> {
        let peer = self.resolve_peer_ref(channel).await?;

        // Newest first; stop at the already-processed boundary.
        let mut fetched = Vec::new();
        let mut iter = self.client.iter_messages(peer);
        while let Some(message) = iter.next().await.transpose() {
            let message = message.map_err(Error::from)?;
            if message.id() <= min_id {
                break;
            }
            fetched.push(convert(&message));
        }

        Ok(fetched)
    }

    async fn send_text(&self, destination: i64, text: &str) -> Result<()> {
        let peer = self.resolve_peer_ref(destination).await?;
        self.client
            .send_message(peer, text)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn send_media(&self, destination: i64, media: &Media, caption: &str) -> Result<()> {
        let peer = self.resolve_peer_ref(destination).await?;
        self.client
            .send_message(peer, InputMessage::new().text(caption).copy_media(media))
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn forward_message(&self, destination: i64, message_id: i32, source: i64) -> Result<()> {
        let destination = self.resolve_peer_ref(destination).await?;
        let source = self.resolve_peer_ref(source).await?;
        self.client
            .forward_messages(destination, &[message_id], source)
            .await
            .map_err(Error::from)?;
        Ok(())
    }
}
