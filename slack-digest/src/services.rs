use crate::api::rate_limit::RateLimitedClient;
use crate::api::slack::SlackClient;
use crate::cancel::CancelToken;
use crate::cli::{Args, Command, DigestArgs, ExtractArgs, NotifyArgs};
use crate::digest::{DigestOptions, DigestOrchestrator, FailurePolicy, OutputMode};
use crate::filter::{ChannelFilter, Thresholds};
use crate::models::Channel;
use crate::report::{ReportSink, ReportWriter, StdoutSink};
use crate::settings::{self, client_config, merge_settings_with_args, Settings};
use crate::usernames;
use crate::window::Window;

use anyhow::{Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use owo_colors::OwoColorize;
use std::fs;
use std::future::Future;
use std::io;
use std::path::Path;
use std::process;

pub async fn run(args: Args) -> Result<()> {
    let settings = settings::load_settings().context("Failed to load settings")?;
    let args = merge_settings_with_args(&args, &settings);

    match &args.command {
        Command::Digest(digest) => run_digest(&args, digest, &settings).await,
        Command::Notify(notify) => run_notify(&args, notify, &settings).await,
        Command::ExtractUsernames(extract) => run_extract(extract).await,
    }
}

/// Whitespace separated entries, any number per line.
fn read_list(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read list file {}", path.display()))?;
    Ok(contents.split_whitespace().map(str::to_string).collect())
}

fn with_list_file(mut entries: Vec<String>, path: Option<&Path>) -> Result<Vec<String>> {
    if let Some(path) = path {
        entries.extend(read_list(path)?);
    }
    Ok(entries)
}

/// The first interrupt cancels the run, a second one asks for an
/// immediate exit. Returns whether that second interrupt arrived.
async fn watch_interrupts<F, Fut>(cancel: CancelToken, mut interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    warn!("cancellation requested, stopping after the current page (ctrl-c again to quit)");
    cancel.cancel();

    interrupt().await.is_ok()
}

async fn run_digest(args: &Args, digest: &DigestArgs, settings: &Settings) -> Result<()> {
    let today = Local::now().date_naive();
    let window = Window::resolve(today, digest.week, digest.start, digest.end)?;
    let bounds = window.bounds(&Local)?;
    let thresholds = Thresholds::new(digest.reactions, digest.replies, digest.thread_reactions)?;

    let allow = with_list_file(digest.channels.clone(), digest.channel_list.as_deref())?;
    let deny = with_list_file(digest.exclude.clone(), digest.exclude_list.as_deref())?;
    let filter = ChannelFilter::new(&allow, &deny, digest.marker.clone())?;
    let config = client_config(args, settings)?;

    println!(
        "Looking for messages from {} to {}",
        window.start.format("%Y-%m-%d"),
        window.end.format("%Y-%m-%d")
    );

    let cancel = CancelToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if watch_interrupts(cancel, tokio::signal::ctrl_c).await {
                eprintln!("Interrupted");
                process::exit(130);
            }
        }
    });

    let client = RateLimitedClient::new(SlackClient::new(&config)?, config.retry)
        .with_cancel(cancel.clone());
    let listed = client.list_channels().await?;
    let mut channels = filter.filter_channels(listed.into_iter().map(Channel::from).collect());
    println!("Found {} channels", channels.len().to_string().bright_cyan());
    if channels.is_empty() {
        return Ok(());
    }

    let sink: Box<dyn ReportSink> = if digest.dry {
        Box::new(StdoutSink)
    } else {
        let writer = ReportWriter::create(&digest.output_dir, today)?;
        debug!("writing reports to {}", writer.directory().display());
        Box::new(writer)
    };

    let progress = ProgressBar::new(channels.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "{spinner} [{bar:40}] {pos}/{len} channels",
    )?);

    let options = DigestOptions {
        bounds,
        thresholds,
        mode: if digest.split_by_channels {
            OutputMode::SplitByChannels
        } else {
            OutputMode::Consolidated
        },
        policy: if digest.isolate_channels {
            FailurePolicy::SkipChannel
        } else {
            FailurePolicy::AbortRun
        },
        jobs: digest.jobs.unwrap_or(1),
    };

    let orchestrator =
        DigestOrchestrator::new(&client, options, cancel).with_progress(progress.clone());
    let result = orchestrator.run(&mut channels, sink.as_ref()).await;
    progress.finish_and_clear();
    let totals = result?;

    if totals.examined_channels > 1 {
        println!(
            "\n{} Found {} potential messages and {} long threads across {} channels and {} messages",
            "✓".bright_green(),
            totals.filtered_messages.to_string().bright_cyan(),
            totals.total_threads.to_string().bright_cyan(),
            totals.reported_channels.to_string().bright_cyan(),
            totals.total_messages.to_string().bright_cyan()
        );
    }
    if totals.skipped_channels > 0 {
        println!(
            "{} Skipped {} channels with unresolvable threads",
            "⚠".yellow(),
            totals.skipped_channels
        );
    }
    debug!(
        "{} users resolved, {} rate-limit waits",
        orchestrator.users().len(),
        client.backoff_waits()
    );

    Ok(())
}

async fn run_notify(args: &Args, notify: &NotifyArgs, settings: &Settings) -> Result<()> {
    let exclude = with_list_file(notify.exclude.clone(), notify.exclude_list.as_deref())?;
    let recipients = usernames::recipients(&notify.users, &exclude);
    if recipients.is_empty() {
        anyhow::bail!("At least one user not excluded is required.");
    }

    let config = client_config(args, settings)?;
    let client = RateLimitedClient::new(SlackClient::new(&config)?, config.retry);
    let notified = usernames::notify(&client, &recipients, &notify.message, notify.dry).await?;

    if !notify.dry {
        println!("{} Notified {} users", "✓".bright_green(), notified);
    }
    Ok(())
}

async fn run_extract(extract: &ExtractArgs) -> Result<()> {
    let response = reqwest::get(&extract.post)
        .await
        .with_context(|| format!("Failed to fetch {}", extract.post))?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("cannot fetch post with status {}", status);
    }

    let body = response.text().await?;
    for username in usernames::extract_usernames(&body)? {
        println!("{username}");
    }
    Ok(())
}
