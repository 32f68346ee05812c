use log::debug;
use regex::Regex;

use crate::error::DigestError;
use crate::models::{Channel, Message};

/// Engagement thresholds a message or thread must reach to be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub reactions: u64,
    pub replies: usize,
    pub thread_reactions: u64,
}

impl Thresholds {
    /// `thread_reactions` defaults to twice the reaction threshold.
    pub fn new(
        reactions: u64,
        replies: usize,
        thread_reactions: Option<u64>,
    ) -> Result<Self, DigestError> {
        if reactions < 1 {
            return Err(DigestError::configuration("--reactions must be at least 1"));
        }
        if replies < 1 {
            return Err(DigestError::configuration("--replies must be at least 1"));
        }
        let thread_reactions = thread_reactions.unwrap_or(reactions.saturating_mul(2));
        if thread_reactions < 1 {
            return Err(DigestError::configuration(
                "--thread-reactions must be at least 1",
            ));
        }

        Ok(Self {
            reactions,
            replies,
            thread_reactions,
        })
    }
}

/// Channel selection by name.
///
/// An allow-list match always includes a channel and a deny-list match
/// excludes it. Channels matching neither are included only when no
/// allow-list is configured and their name does not carry the opt-in
/// marker.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
    marker: Option<String>,
}

impl ChannelFilter {
    /// Patterns are regular expressions anchored at the start of the name.
    pub fn new<S: AsRef<str>>(
        allow: &[S],
        deny: &[S],
        marker: Option<String>,
    ) -> Result<Self, DigestError> {
        Ok(Self {
            allow: compile_patterns(allow)?,
            deny: compile_patterns(deny)?,
            marker: marker.filter(|marker| !marker.is_empty()),
        })
    }

    pub fn includes(&self, name: &str) -> bool {
        if self.allow.iter().any(|pattern| pattern.is_match(name)) {
            return true;
        }
        if self.deny.iter().any(|pattern| pattern.is_match(name)) {
            return false;
        }
        let marked = self
            .marker
            .as_deref()
            .is_some_and(|marker| name.contains(marker));

        self.allow.is_empty() && !marked
    }

    pub fn filter_channels(&self, channels: Vec<Channel>) -> Vec<Channel> {
        channels
            .into_iter()
            .filter(|channel| {
                let included = self.includes(&channel.name);
                if !included {
                    debug!("skipping #{}", channel.name);
                }
                included
            })
            .collect()
    }
}

fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>, DigestError> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.as_ref();
            Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
                DigestError::configuration(format!("invalid channel pattern '{pattern}': {e}"))
            })
        })
        .collect()
}

/// Messages whose own reactions reach the threshold.
pub fn filter_messages<'m>(
    messages: impl IntoIterator<Item = &'m Message>,
    reaction_threshold: u64,
) -> Vec<&'m Message> {
    messages
        .into_iter()
        .filter(|message| message.reaction_count() >= reaction_threshold)
        .collect()
}

/// Thread roots with enough replies or enough reactions across replies.
pub fn filter_threads<'m>(
    messages: impl IntoIterator<Item = &'m Message>,
    reply_threshold: usize,
    thread_reaction_threshold: u64,
) -> Vec<&'m Message> {
    messages
        .into_iter()
        .filter(|message| {
            message.reply_count() >= reply_threshold
                || message.threaded_reaction_count() >= thread_reaction_threshold
        })
        .collect()
}
