pub mod slack;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use slack::{RawMessage, Reaction};

pub const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

#[derive(Debug, Clone)]
pub struct Message {
    pub channel_id: String,
    pub ts: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub text: String,
    pub subtype: Option<String>,
    pub thread_ts: Option<String>,
    pub reactions: Vec<Reaction>,
    /// Only populated on thread roots.
    pub replies: Vec<Message>,
    reaction_count: OnceLock<u64>,
}

impl Message {
    pub fn from_raw(channel_id: &str, raw: RawMessage) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            ts: raw.ts,
            user_id: raw.user,
            username: raw.username,
            text: raw.text,
            subtype: raw.subtype,
            thread_ts: raw.thread_ts,
            reactions: raw.reactions,
            replies: Vec::new(),
            reaction_count: OnceLock::new(),
        }
    }

    pub fn from_bot(&self) -> bool {
        self.subtype.as_deref() == Some(BOT_MESSAGE_SUBTYPE)
    }

    /// Timestamp of the thread this message replies to, if it is a reply.
    pub fn thread_root(&self) -> Option<&str> {
        self.thread_ts
            .as_deref()
            .filter(|root| *root != self.ts.as_str())
    }

    pub fn reaction_count(&self) -> u64 {
        *self
            .reaction_count
            .get_or_init(|| self.reactions.iter().map(|reaction| reaction.count).sum())
    }

    /// Sum of the direct replies' own reactions. Threads are one level deep.
    pub fn threaded_reaction_count(&self) -> u64 {
        self.replies.iter().map(Message::reaction_count).sum()
    }

    pub fn reply_count(&self) -> usize {
        self.replies.len()
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        let (secs, micros) = parse_ts(&self.ts)?;
        DateTime::from_timestamp(secs, micros * 1_000)
    }
}

fn parse_ts(ts: &str) -> Option<(i64, u32)> {
    let (secs, fraction) = ts.split_once('.').unwrap_or((ts, ""));
    let secs = secs.parse().ok()?;
    let micros: String = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(6)
        .collect();
    Some((secs, micros.parse().ok()?))
}

/// Orders message timestamps numerically, falling back to string order
/// for anything that does not parse.
pub fn compare_ts(a: &str, b: &str) -> Ordering {
    match (parse_ts(a), parse_ts(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Messages of one channel keyed by timestamp, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `message`, returning the message it replaced if the
    /// timestamp was already present. A replaced message keeps its slot.
    pub fn insert(&mut self, message: Message) -> Option<Message> {
        match self.index.get(&message.ts) {
            Some(&slot) => Some(std::mem::replace(&mut self.messages[slot], message)),
            None => {
                self.index.insert(message.ts.clone(), self.messages.len());
                self.messages.push(message);
                None
            }
        }
    }

    pub fn contains(&self, ts: &str) -> bool {
        self.index.contains_key(ts)
    }

    pub fn get(&self, ts: &str) -> Option<&Message> {
        self.index.get(ts).map(|&slot| &self.messages[slot])
    }

    pub fn get_mut(&mut self, ts: &str) -> Option<&mut Message> {
        self.index.get(ts).map(|&slot| &mut self.messages[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Message> {
        self.messages.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.index.clear();
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    /// Working set of the current fetch cycle.
    #[serde(skip)]
    pub messages: MessageStore,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            messages: MessageStore::new(),
        }
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }
}

impl From<slack::ChannelInfo> for Channel {
    fn from(info: slack::ChannelInfo) -> Self {
        Channel::new(info.id, info.name)
    }
}
