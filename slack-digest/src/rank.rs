use crate::models::Message;

/// Stable descending sort: equal keys keep their input order.
pub fn rank_by<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

pub fn rank_messages(messages: &mut [&Message]) {
    rank_by(messages, |message| message.reaction_count());
}

pub fn rank_threads(threads: &mut [&Message]) {
    rank_by(threads, |message| message.threaded_reaction_count());
}
