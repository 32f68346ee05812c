use std::{fmt, path::PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Slack API token
    #[arg(long, env = "SLACK_API_TOKEN", default_value = "", hide_env_values = true, global = true)]
    pub token: String,

    /// Slack Web API base URL
    #[arg(long, env = "SLACK_API_URL", default_value = "", global = true)]
    pub api_url: String,

    /// Log verbosity
    #[arg(short, long, value_name = "LEVEL", default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a digest of reacted-to posts and long threads
    Digest(DigestArgs),
    /// Notify a set of users about their potential inclusion in a newsletter
    Notify(NotifyArgs),
    /// Extract the list of mentioned user names from a published post
    ExtractUsernames(ExtractArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct DigestArgs {
    /// Fetch messages from N weeks ago
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub week: u32,

    /// Fetch messages from the given date, overriding the week start
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,

    /// Fetch messages up to the given date, overriding the week end
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<NaiveDate>,

    /// Only examine the given channel(s) (regular expressions allowed)
    #[arg(long = "channel", visible_alias = "channels", value_name = "CHANNEL", num_args = 1..)]
    pub channels: Vec<String>,

    /// Only examine the channel(s) listed in the file
    #[arg(long, value_name = "FILE")]
    pub channel_list: Option<PathBuf>,

    /// Specifically exclude the given channel(s) (regular expressions allowed)
    #[arg(long, value_name = "CHANNEL", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Specifically exclude the channel(s) listed in the file
    #[arg(long, value_name = "FILE")]
    pub exclude_list: Option<PathBuf>,

    /// Reactions needed for a message to be retained
    #[arg(long, value_name = "THRESHOLD", default_value_t = 3)]
    pub reactions: u64,

    /// Replies needed for a thread to be retained
    #[arg(long, value_name = "THRESHOLD", default_value_t = 10)]
    pub replies: usize,

    /// In-thread reactions needed for a thread to be retained (default: twice --reactions)
    #[arg(long, value_name = "THRESHOLD")]
    pub thread_reactions: Option<u64>,

    /// Write one report per channel instead of consolidated messages/threads reports
    #[arg(long)]
    pub split_by_channels: bool,

    /// Print reports instead of writing them
    #[arg(long)]
    pub dry: bool,

    /// Skip a channel whose threads cannot be rebuilt instead of aborting the run
    #[arg(long)]
    pub isolate_channels: bool,

    /// Channels processed concurrently
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Name fragment of opt-in channels, excluded unless explicitly listed
    #[arg(long)]
    pub marker: Option<String>,

    /// Directory receiving the dated report folder
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct NotifyArgs {
    /// Notify the given user(s)
    #[arg(long = "users", visible_alias = "user", value_name = "USER", num_args = 1.., required = true)]
    pub users: Vec<String>,

    /// Users not to notify
    #[arg(long, value_name = "USER", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Users not to notify, listed in the file
    #[arg(long, value_name = "FILE")]
    pub exclude_list: Option<PathBuf>,

    /// Direct message sent to each user
    #[arg(
        long,
        default_value = "One of your posts may be featured in this week's newsletter!"
    )]
    pub message: String,

    /// List recipients without sending anything
    #[arg(long)]
    pub dry: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ExtractArgs {
    /// URL of the post to extract the names from
    pub post: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl From<LogLevel> for LevelFilter {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Off => write!(f, "off"),
        }
    }
}
