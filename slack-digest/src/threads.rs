use log::debug;

use crate::api::rate_limit::RateLimitedClient;
use crate::api::slack::SlackApi;
use crate::error::DigestError;
use crate::models::slack::HistoryRequest;
use crate::models::{compare_ts, Channel, Message, MessageStore};

/// Links replies to their thread roots, fetching roots that fell outside
/// the window one at a time.
pub struct ThreadReconstructor<'a, A> {
    client: &'a RateLimitedClient<A>,
}

impl<'a, A: SlackApi> ThreadReconstructor<'a, A> {
    pub fn new(client: &'a RateLimitedClient<A>) -> Self {
        Self { client }
    }

    /// Attaches every reply to exactly one root in `store`, then puts each
    /// root's replies in chronological order.
    pub async fn attach(
        &self,
        channel: &Channel,
        store: &mut MessageStore,
        replies: Vec<Message>,
    ) -> Result<(), DigestError> {
        let mut lookups = 0;

        for reply in replies {
            let Some(root) = reply.thread_root().map(str::to_string) else {
                continue;
            };

            if !store.contains(&root) {
                let message = self.fetch_root(channel, &root).await?;
                lookups += 1;
                store.insert(message);
            }

            match store.get_mut(&root) {
                Some(root_message) => root_message.replies.push(reply),
                None => {
                    return Err(DigestError::ThreadIntegrity {
                        channel: channel.name.clone(),
                        root,
                    })
                }
            }
        }

        for message in store.iter_mut() {
            message.replies.sort_by(|a, b| compare_ts(&a.ts, &b.ts));
        }

        debug!("#{}: fetched {lookups} thread roots outside the window", channel.name);
        Ok(())
    }

    async fn fetch_root(&self, channel: &Channel, root: &str) -> Result<Message, DigestError> {
        let page = self
            .client
            .fetch_history(&HistoryRequest::point(&channel.id, root))
            .await?;

        page.messages
            .into_iter()
            .next()
            .filter(|message| message.ts == root)
            .map(|message| Message::from_raw(&channel.id, message))
            .ok_or_else(|| DigestError::ThreadIntegrity {
                channel: channel.name.clone(),
                root: root.to_string(),
            })
    }
}
