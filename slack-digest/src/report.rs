use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Local, NaiveDate, Offset};
use log::info;
use tempfile::NamedTempFile;

use crate::error::DigestError;
use crate::models::Message;

pub const WRAP_WIDTH: usize = 80;
pub const MESSAGES_REPORT: &str = "messages";
pub const THREADS_REPORT: &str = "threads";

const SEPARATOR: char = '-';
const BOX_SYMBOL: char = '=';

/// A ranked message with everything needed to print it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub channel: String,
    pub ts: String,
    pub author: String,
    pub permalink: String,
    pub text: String,
    pub reactions: u64,
    pub replies: usize,
    pub thread_reactions: u64,
    pub posted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl DigestEntry {
    pub fn new(channel: &str, message: &Message, author: String, permalink: String) -> Self {
        Self {
            channel: channel.to_string(),
            ts: message.ts.clone(),
            author,
            permalink,
            text: message.text.clone(),
            reactions: message.reaction_count(),
            replies: message.reply_count(),
            thread_reactions: message.threaded_reaction_count(),
            posted_at: message.posted_at(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportRenderer {
    width: usize,
    offset: FixedOffset,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new(Local::now().offset().fix())
    }
}

impl ReportRenderer {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            width: WRAP_WIDTH,
            offset,
        }
    }

    fn separator(&self) -> String {
        SEPARATOR.to_string().repeat(self.width)
    }

    /// Minute-truncated local time of the entry.
    pub fn format_time(&self, entry: &DigestEntry) -> String {
        entry
            .posted_at
            .map(|posted| {
                posted
                    .with_timezone(&self.offset)
                    .format("%Y-%m-%d %H:%M:00")
                    .to_string()
            })
            .unwrap_or_default()
    }

    pub fn channel_header(&self, name: &str) -> String {
        let edge = BOX_SYMBOL.to_string().repeat(2);
        let title = format!("{edge}  {name}  {edge}");
        let border = BOX_SYMBOL.to_string().repeat(title.chars().count());
        format!("{border}\n{title}\n{border}\n\n")
    }

    fn block(&self, entry: &DigestEntry, with_channel: bool, counts: &str) -> String {
        let separator = self.separator();
        let location = if with_channel {
            format!(" in #{}", entry.channel)
        } else {
            String::new()
        };

        format!(
            "{separator}\n{}\n@{}{location} wrote on {}\n{counts}\n{separator}\n{}\n",
            entry.permalink,
            entry.author,
            self.format_time(entry),
            wrap_text(&entry.text, self.width),
        )
    }

    pub fn message_block(&self, entry: &DigestEntry, with_channel: bool) -> String {
        self.block(
            entry,
            with_channel,
            &format!("{} reactions", entry.reactions),
        )
    }

    pub fn thread_block(&self, entry: &DigestEntry, with_channel: bool) -> String {
        self.block(
            entry,
            with_channel,
            &format!(
                "{} replies, {} reactions in thread",
                entry.replies, entry.thread_reactions
            ),
        )
    }

    fn threads_section(&self, threads: &[DigestEntry], with_channel: bool) -> String {
        let mut out = format!("Threaded messages: {}\n", threads.len());
        for entry in threads {
            out.push_str(&self.thread_block(entry, with_channel));
            out.push('\n');
        }
        out
    }

    /// One channel: header, ranked messages, then ranked threads.
    pub fn channel_report(
        &self,
        channel: &str,
        messages: &[DigestEntry],
        threads: &[DigestEntry],
    ) -> String {
        let mut out = self.channel_header(channel);
        for entry in messages {
            out.push_str(&self.message_block(entry, false));
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.threads_section(threads, false));
        out
    }

    pub fn consolidated_messages(&self, messages: &[DigestEntry]) -> String {
        let mut out = self.channel_header("Messages");
        out.push_str(&format!("Messages: {}\n\n", messages.len()));
        for entry in messages {
            out.push_str(&self.message_block(entry, true));
            out.push('\n');
        }
        out
    }

    pub fn consolidated_threads(&self, threads: &[DigestEntry]) -> String {
        let mut out = self.channel_header("Threads");
        out.push_str(&self.threads_section(threads, true));
        out
    }
}

/// Word-wraps each line of `text` to `width` columns. Whitespace is kept
/// as written and words longer than a line are split.
pub fn wrap_text(text: &str, width: usize) -> String {
    text.split('\n')
        .map(|line| wrap_line(line, width.max(1)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn wrap_line(line: &str, width: usize) -> String {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for chunk in chunks(line) {
        let chunk_len = chunk.chars().count();

        if current_len + chunk_len <= width {
            current.push_str(chunk);
            current_len += chunk_len;
            continue;
        }

        if chunk_len <= width {
            lines.push(std::mem::take(&mut current));
            current.push_str(chunk);
            current_len = chunk_len;
            continue;
        }

        let mut rest = chunk;
        let mut rest_len = chunk_len;
        while current_len + rest_len > width {
            let room = width - current_len;
            let split = rest.char_indices().nth(room).map_or(rest.len(), |(i, _)| i);
            current.push_str(&rest[..split]);
            lines.push(std::mem::take(&mut current));
            current_len = 0;
            rest = &rest[split..];
            rest_len -= room;
        }
        current.push_str(rest);
        current_len = rest_len;
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Splits a line into alternating runs of whitespace and non-whitespace.
fn chunks(line: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut previous: Option<bool> = None;

    for (i, c) in line.char_indices() {
        let space = c.is_whitespace();
        if previous.is_some_and(|was_space| was_space != space) {
            chunks.push(&line[start..i]);
            start = i;
        }
        previous = Some(space);
    }
    if start < line.len() {
        chunks.push(&line[start..]);
    }
    chunks
}

/// Destination of finished reports. Each call publishes one complete report.
pub trait ReportSink: Send + Sync {
    fn publish(&self, name: &str, contents: &str) -> Result<(), DigestError>;
}

/// Writes `<directory>/<name>.txt`, going through a temporary file so a
/// report is either fully written or absent.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    directory: PathBuf,
}

impl ReportWriter {
    /// Reports of a run go to a directory named by the run date.
    pub fn create(base: &Path, date: NaiveDate) -> Result<Self, DigestError> {
        let directory = base.join(date.format("%Y-%m-%d").to_string());
        fs::create_dir_all(&directory).map_err(|e| DigestError::io(&directory, e))?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.txt"))
    }
}

impl ReportSink for ReportWriter {
    fn publish(&self, name: &str, contents: &str) -> Result<(), DigestError> {
        let path = self.path_for(name);
        let mut file =
            NamedTempFile::new_in(&self.directory).map_err(|e| DigestError::io(&path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| DigestError::io(&path, e))?;
        file.persist(&path)
            .map_err(|e| DigestError::io(&path, e.error))?;

        info!("wrote {}", path.display());
        Ok(())
    }
}

/// Prints reports instead of writing them, for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn publish(&self, name: &str, contents: &str) -> Result<(), DigestError> {
        println!("### {name}\n{contents}");
        Ok(())
    }
}
