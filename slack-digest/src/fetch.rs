use log::{debug, warn};

use crate::api::rate_limit::RateLimitedClient;
use crate::api::slack::SlackApi;
use crate::cancel::CancelToken;
use crate::error::DigestError;
use crate::models::slack::HistoryRequest;
use crate::models::{compare_ts, Channel, Message, MessageStore};
use crate::window::Bounds;

pub const PAGE_LIMIT: u32 = 500;

/// Pages a channel's history backward from the end of the window.
pub struct ChannelFetcher<'a, A> {
    client: &'a RateLimitedClient<A>,
    cancel: &'a CancelToken,
}

impl<'a, A: SlackApi> ChannelFetcher<'a, A> {
    pub fn new(client: &'a RateLimitedClient<A>, cancel: &'a CancelToken) -> Self {
        Self { client, cancel }
    }

    /// Returns every message of the window plus, in arrival order, the
    /// human replies that still need attaching to their thread roots.
    pub async fn fetch(
        &self,
        channel: &Channel,
        bounds: Bounds,
    ) -> Result<(MessageStore, Vec<Message>), DigestError> {
        let oldest = bounds.oldest.to_string();
        let mut cursor = bounds.latest.to_string();
        let mut store = MessageStore::new();
        let mut replies = Vec::new();
        let mut pages = 0;

        loop {
            self.cancel.check()?;
            pages += 1;
            debug!("#{}: requesting page {pages} before {cursor}", channel.name);

            let request = HistoryRequest::page(&channel.id, &oldest, &cursor, PAGE_LIMIT);
            let page = self.client.fetch_history(&request).await?;

            let mut oldest_seen: Option<String> = None;
            for raw in page.messages {
                let message = Message::from_raw(&channel.id, raw);

                if oldest_seen
                    .as_deref()
                    .map_or(true, |seen| compare_ts(&message.ts, seen).is_lt())
                {
                    oldest_seen = Some(message.ts.clone());
                }

                let queued = (!message.from_bot() && message.thread_root().is_some())
                    .then(|| message.clone());

                if let Some(previous) = store.insert(message) {
                    warn!(
                        "#{}: duplicate message timestamp {}, keeping the latest copy",
                        channel.name, previous.ts
                    );
                    replies.retain(|reply: &Message| reply.ts != previous.ts);
                }
                replies.extend(queued);
            }

            if !page.has_more {
                break;
            }

            match oldest_seen {
                Some(ts) if compare_ts(&ts, &cursor).is_lt() => cursor = ts,
                _ => {
                    warn!(
                        "#{}: history reports more pages but the cursor did not move, stopping",
                        channel.name
                    );
                    break;
                }
            }
        }

        debug!(
            "#{}: {} messages, {} replies over {pages} pages",
            channel.name,
            store.len(),
            replies.len()
        );
        Ok((store, replies))
    }
}
