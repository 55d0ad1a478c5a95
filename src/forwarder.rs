//! The polling/forward loop
//!
//! Seeds a per-channel last-seen message id, then sweeps every source
//! channel in order: fetch messages above the last-seen id, filter by
//! keyword, compose and deliver the qualifying ones, and advance the
//! last-seen id. One failing channel or message never stops the loop.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::signal;
use tracing::{error, info, warn};

use crate::client::{ChannelClient, ChannelMessage};
use crate::composer::{compose, Outbound};
use crate::config::Config;
use crate::metrics;

pub struct Forwarder<C: ChannelClient> {
    client: C,
    sources: Vec<i64>,
    destination: i64,
    keywords: Vec<String>,
    poll_interval: Duration,
    last_seen: HashMap<i64, i32>,
}

impl<C: ChannelClient> Forwarder<C> {
    pub fn new(
        client: C,
        sources: Vec<i64>,
        destination: i64,
        keywords: Vec<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            sources,
            destination,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            poll_interval,
            last_seen: HashMap::new(),
        }
    }

    pub fn from_config(client: C, config: &Config) -> Self {
        Self::new(
            client,
            config.sources.clone(),
            config.destination,
            config.keywords.clone(),
            config.poll_interval,
        )
    }

    /// Last-seen message id for a source channel, if seeded.
    pub fn last_seen(&self, channel: i64) -> Option<i32> {
        self.last_seen.get(&channel).copied()
    }

    /// Record the newest message id of every source so polling starts
    /// from "now". A channel that fails here stays unseeded and is
    /// caught up by the next sweep instead.
    pub async fn seed(&mut self) {
        for channel in self.sources.clone() {
            match self.client.channel_title(channel).await {
                Ok(title) => info!(channel, %title, "resolved source channel"),
                Err(e) => warn!(channel, "failed to resolve source channel: {}", e),
            }
        }

        for channel in self.sources.clone() {
            match self.client.latest_message_id(channel).await {
                Ok(Some(id)) => {
                    self.last_seen.insert(channel, id);
                }
                Ok(None) => {
                    // Empty channel: anything that arrives later is new.
                    self.last_seen.insert(channel, 0);
                }
                Err(e) => warn!(channel, "failed to seed last message id: {}", e),
            }
        }
    }

    /// One polling pass over every source channel. Returns the number of
    /// messages forwarded.
    pub async fn sweep(&mut self) -> usize {
        let mut forwarded = 0;

        for channel in self.sources.clone() {
            let min_id = match self.last_seen.get(&channel) {
                Some(&id) => id,
                None => {
                    // Seeding failed at startup; catch up from the current
                    // newest message instead of replaying the channel's
                    // whole visible history.
                    match self.client.latest_message_id(channel).await {
                        Ok(latest) => {
                            self.last_seen.insert(channel, latest.unwrap_or(0));
                        }
                        Err(e) => warn!(channel, "channel still unseeded: {}", e),
                    }
                    continue;
                }
            };

            let messages = match self.client.messages_after(channel, min_id).await {
                Ok(messages) => messages,
                Err(e) => {
                    metrics::record_fetch_error(channel);
                    error!(channel, "failed to fetch messages: {}", e);
                    continue;
                }
            };

            // Fetched newest first; process in chronological order.
            for message in messages.into_iter().rev() {
                let id = message.id;
                if self.qualifies(&message) && self.deliver(&message, channel).await {
                    forwarded += 1;
                }
                let entry = self.last_seen.entry(channel).or_insert(0);
                *entry = (*entry).max(id);
            }
        }

        forwarded
    }

    /// Poll forever, sleeping `poll_interval` between sweeps.
    /// Stops cleanly on Ctrl-C.
    pub async fn run(&mut self) {
        info!(
            sources = self.sources.len(),
            destination = self.destination,
            "forwarder started"
        );

        loop {
            let start = Instant::now();
            let forwarded = self.sweep().await;
            metrics::record_sweep(start.elapsed());
            if forwarded > 0 {
                info!(forwarded, "sweep complete");
            }

            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Keyword filter: case-insensitive substring match against the text
    /// or the media caption. An empty keyword set matches everything.
    fn qualifies(&self, message: &ChannelMessage<C::Media>) -> bool {
        if self.keywords.is_empty() {
            return true;
        }

        let matches = |field: Option<&str>| {
            field
                .map(|value| {
                    let value = value.to_lowercase();
                    self.keywords.iter().any(|keyword| value.contains(keyword))
                })
                .unwrap_or(false)
        };

        matches(message.text.as_deref()) || matches(message.caption())
    }

    /// Send one qualifying message. Flood waits are honored and the send
    /// retried; any other failure drops the message. Returns whether the
    /// message reached the destination.
    async fn deliver(&self, message: &ChannelMessage<C::Media>, source: i64) -> bool {
        let title = match self.client.channel_title(source).await {
            Ok(title) => title,
            Err(e) => {
                metrics::record_dropped(source);
                error!(channel = source, "failed to resolve source title: {}", e);
                return false;
            }
        };

        let outbound = compose(message, &title);

        loop {
            let result = match &outbound {
                Outbound::Text(text) => self.client.send_text(self.destination, text).await,
                Outbound::Media { handle, caption } => {
                    self.client
                        .send_media(self.destination, handle, caption)
                        .await
                }
                Outbound::Forward { message_id } => {
                    self.client
                        .forward_message(self.destination, *message_id, source)
                        .await
                }
            };

            match result {
                Ok(()) => {
                    metrics::record_forwarded(source);
                    return true;
                }
                Err(crate::error::Error::FloodWait(seconds)) => {
                    metrics::record_flood_wait(seconds);
                    warn!(channel = source, seconds, "rate limited, waiting before retry");
                    tokio::time::sleep(Duration::from_secs(seconds)).await;
                }
                Err(e) => {
                    metrics::record_dropped(source);
                    error!(
                        channel = source,
                        "failed to forward message {}: {}", message.id, e
                    );
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MediaPart;
    use crate::error::Result;

    // Filter-only double; the delivery paths are covered by the
    // integration tests with a recording fake.
    struct NullClient;

    impl ChannelClient for NullClient {
        type Media = ();

        async fn channel_title(&self, _channel: i64) -> Result<String> {
            Ok("title".to_string())
        }

        async fn latest_message_id(&self, _channel: i64) -> Result<Option<i32>> {
            Ok(None)
        }

        async fn messages_after(
            &self,
            _channel: i64,
            _min_id: i32,
        ) -> Result<Vec<ChannelMessage<()>>> {
            Ok(Vec::new())
        }

        async fn send_text(&self, _destination: i64, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn send_media(&self, _destination: i64, _media: &(), _caption: &str) -> Result<()> {
            Ok(())
        }

        async fn forward_message(
            &self,
            _destination: i64,
            _message_id: i32,
            _source: i64,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn forwarder_with_keywords(keywords: &[&str]) -> Forwarder<NullClient> {
        Forwarder::new(
            NullClient,
            vec![1],
            2,
            keywords.iter().map(|k| k.to_string()).collect(),
            Duration::from_secs(5),
        )
    }

    fn text(id: i32, text: &str) -> ChannelMessage<()> {
        ChannelMessage {
            id,
            text: Some(text.to_string()),
            media: None,
        }
    }

    #[test]
    fn keyword_matches_are_case_insensitive() {
        let forwarder = forwarder_with_keywords(&["sale"]);
        assert!(forwarder.qualifies(&text(1, "Big Sale Today")));
        assert!(!forwarder.qualifies(&text(2, "Big event")));
    }

    #[test]
    fn uppercase_keywords_are_normalized() {
        let forwarder = forwarder_with_keywords(&["SALE"]);
        assert!(forwarder.qualifies(&text(1, "weekend sale")));
    }

    #[test]
    fn empty_keyword_set_matches_everything() {
        let forwarder = forwarder_with_keywords(&[]);
        assert!(forwarder.qualifies(&text(1, "anything")));
        assert!(forwarder.qualifies(&ChannelMessage {
            id: 2,
            text: None,
            media: None,
        }));
    }

    #[test]
    fn caption_matches_independently_of_text() {
        let forwarder = forwarder_with_keywords(&["sale"]);
        let message = ChannelMessage {
            id: 1,
            text: None,
            media: Some(MediaPart {
                handle: (),
                caption: Some("Flash SALE now".to_string()),
            }),
        };
        assert!(forwarder.qualifies(&message));

        let no_match = ChannelMessage {
            id: 2,
            text: None,
            media: Some(MediaPart {
                handle: (),
                caption: Some("just a photo".to_string()),
            }),
        };
        assert!(!forwarder.qualifies(&no_match));
    }

    #[test]
    fn message_without_text_or_caption_needs_no_keywords() {
        let forwarder = forwarder_with_keywords(&["sale"]);
        let bare = ChannelMessage {
            id: 1,
            text: None,
            media: Some(MediaPart {
                handle: (),
                caption: None,
            }),
        };
        assert!(!forwarder.qualifies(&bare));
    }
}
