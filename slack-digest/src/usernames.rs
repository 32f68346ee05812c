use std::collections::BTreeSet;

use log::info;
use regex::Regex;
use scraper::{Html, Selector};

use crate::api::rate_limit::RateLimitedClient;
use crate::api::slack::SlackApi;
use crate::error::DigestError;

/// `ada`, `@ada` and ` @ada ` all become `@ada`.
pub fn normalize_username(name: &str) -> String {
    format!("@{}", name.trim().trim_start_matches('@'))
}

/// Normalized users that are not excluded, first occurrence order.
pub fn recipients<S: AsRef<str>>(users: &[S], exclude: &[S]) -> Vec<String> {
    let excluded: BTreeSet<String> = exclude
        .iter()
        .map(|name| normalize_username(name.as_ref()))
        .collect();
    let mut seen = BTreeSet::new();

    users
        .iter()
        .map(|name| normalize_username(name.as_ref()))
        .filter(|name| name.len() > 1 && !excluded.contains(name))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Mentions found inside `<ts-rocket>` elements of a page, deduplicated
/// and sorted case-insensitively. Each text node is matched on its own.
pub fn extract_usernames(html: &str) -> anyhow::Result<Vec<String>> {
    let rocket = Selector::parse("ts-rocket")
        .map_err(|e| anyhow::anyhow!("invalid selector: {e}"))?;
    let mention = Regex::new(r"@[a-zA-Z.]+(?: [A-Z][a-z]+)?")?;

    let document = Html::parse_document(html);
    let mut found = BTreeSet::new();
    for section in document.select(&rocket) {
        for text in section.text() {
            found.extend(mention.find_iter(text).map(|m| m.as_str().to_string()));
        }
    }

    let mut usernames: Vec<String> = found.into_iter().collect();
    usernames.sort_by_key(|name| name.to_lowercase());
    Ok(usernames)
}

/// Sends `text` as a direct message to each recipient. In a dry run the
/// recipients are only listed. Returns the number of users notified.
pub async fn notify<A: SlackApi>(
    client: &RateLimitedClient<A>,
    recipients: &[String],
    text: &str,
    dry: bool,
) -> Result<usize, DigestError> {
    for recipient in recipients {
        if dry {
            println!("would notify {recipient}");
            continue;
        }
        client.post_message(recipient, text, true).await?;
        info!("notified {recipient}");
    }
    Ok(recipients.len())
}
