use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use log::{debug, info, warn};

use crate::api::rate_limit::RateLimitedClient;
use crate::api::slack::SlackApi;
use crate::cancel::CancelToken;
use crate::error::DigestError;
use crate::fetch::ChannelFetcher;
use crate::filter::{filter_messages, filter_threads, Thresholds};
use crate::models::{Channel, Message};
use crate::rank::{rank_by, rank_messages, rank_threads};
use crate::report::{DigestEntry, ReportRenderer, ReportSink, MESSAGES_REPORT, THREADS_REPORT};
use crate::threads::ThreadReconstructor;
use crate::users::UserDirectory;
use crate::window::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    FetchingChannel,
    Reconstructing,
    Filtering,
    Rendering,
    Finalizing,
    Done,
}

/// What a thread integrity failure takes down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    AbortRun,
    SkipChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One report per channel.
    SplitByChannels,
    /// A `messages` and a `threads` report spanning all channels.
    Consolidated,
}

#[derive(Debug, Clone)]
pub struct DigestOptions {
    pub bounds: Bounds,
    pub thresholds: Thresholds,
    pub mode: OutputMode,
    pub policy: FailurePolicy,
    /// Channels processed concurrently.
    pub jobs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub examined_channels: usize,
    pub reported_channels: usize,
    pub skipped_channels: usize,
    pub total_messages: usize,
    pub filtered_messages: usize,
    pub total_threads: usize,
}

impl RunTotals {
    fn record(&mut self, digest: &ChannelDigest) {
        self.total_messages += digest.total_messages;
        if digest.is_empty() {
            return;
        }
        self.reported_channels += 1;
        self.filtered_messages += digest.messages.len();
        self.total_threads += digest.threads.len();
    }
}

/// Ranked, annotated output of one channel.
#[derive(Debug, Clone)]
pub struct ChannelDigest {
    pub channel: String,
    pub total_messages: usize,
    pub messages: Vec<DigestEntry>,
    pub threads: Vec<DigestEntry>,
}

impl ChannelDigest {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.threads.is_empty()
    }
}

/// Drives fetch, reconstruction, filtering, ranking and rendering for each
/// channel, then the consolidated reports if requested.
pub struct DigestOrchestrator<'a, A> {
    client: &'a RateLimitedClient<A>,
    users: UserDirectory<'a, A>,
    renderer: ReportRenderer,
    options: DigestOptions,
    cancel: CancelToken,
    progress: ProgressBar,
}

impl<'a, A: SlackApi> DigestOrchestrator<'a, A> {
    pub fn new(client: &'a RateLimitedClient<A>, options: DigestOptions, cancel: CancelToken) -> Self {
        Self {
            client,
            users: UserDirectory::new(client),
            renderer: ReportRenderer::default(),
            options,
            cancel,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_renderer(mut self, renderer: ReportRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn users(&self) -> &UserDirectory<'a, A> {
        &self.users
    }

    fn enter(&self, scope: &str, stage: Stage) {
        debug!("{scope}: {stage:?}");
    }

    pub async fn run(
        &self,
        channels: &mut [Channel],
        sink: &dyn ReportSink,
    ) -> Result<RunTotals, DigestError> {
        let mut totals = RunTotals::default();
        let mut all_messages = Vec::new();
        let mut all_threads = Vec::new();

        let mut results = stream::iter(channels.iter_mut())
            .map(|channel| self.process_channel(channel, sink))
            .buffered(self.options.jobs.max(1));

        while let Some(result) = results.next().await {
            totals.examined_channels += 1;
            match result {
                Ok(digest) => {
                    totals.record(&digest);
                    if self.options.mode == OutputMode::Consolidated {
                        all_messages.extend(digest.messages);
                        all_threads.extend(digest.threads);
                    }
                }
                Err(DigestError::ThreadIntegrity { channel, root })
                    if self.options.policy == FailurePolicy::SkipChannel =>
                {
                    warn!("skipping #{channel}: thread root {root} could not be resolved");
                    totals.skipped_channels += 1;
                }
                Err(e) => return Err(e),
            }
        }

        self.enter("run", Stage::Finalizing);
        if self.options.mode == OutputMode::Consolidated
            && !(all_messages.is_empty() && all_threads.is_empty())
        {
            rank_by(&mut all_messages, |entry: &DigestEntry| entry.reactions);
            rank_by(&mut all_threads, |entry: &DigestEntry| entry.thread_reactions);
            let messages = self.renderer.consolidated_messages(&all_messages);
            let threads = self.renderer.consolidated_threads(&all_threads);
            sink.publish(MESSAGES_REPORT, &messages)?;
            sink.publish(THREADS_REPORT, &threads)?;
        }

        self.enter("run", Stage::Done);
        Ok(totals)
    }

    async fn process_channel(
        &self,
        channel: &mut Channel,
        sink: &dyn ReportSink,
    ) -> Result<ChannelDigest, DigestError> {
        let result = self.digest_channel(channel).await;
        channel.reset();
        let digest = result?;
        self.progress.inc(1);

        if digest.is_empty() {
            self.enter(&format!("#{}", digest.channel), Stage::Idle);
            return Ok(digest);
        }

        let summary = format!(
            "{}: {} potential messages, {} long threads from {} total messages",
            digest.channel,
            digest.messages.len(),
            digest.threads.len(),
            digest.total_messages
        );
        info!("{summary}");
        self.progress.println(format!("\t{summary}"));

        if self.options.mode == OutputMode::SplitByChannels {
            self.enter(&format!("#{}", digest.channel), Stage::Rendering);
            self.cancel.check()?;
            let report =
                self.renderer
                    .channel_report(&digest.channel, &digest.messages, &digest.threads);
            sink.publish(&digest.channel, &report)?;
        }

        self.enter(&format!("#{}", digest.channel), Stage::Idle);
        Ok(digest)
    }

    /// Fetches one channel's window and returns its ranked entries. The
    /// channel's message store is left filled for the caller to reset.
    pub async fn digest_channel(&self, channel: &mut Channel) -> Result<ChannelDigest, DigestError> {
        let scope = format!("#{}", channel.name);
        self.cancel.check()?;

        self.enter(&scope, Stage::FetchingChannel);
        let (mut store, replies) = ChannelFetcher::new(self.client, &self.cancel)
            .fetch(channel, self.options.bounds)
            .await?;

        self.enter(&scope, Stage::Reconstructing);
        ThreadReconstructor::new(self.client)
            .attach(channel, &mut store, replies)
            .await?;
        channel.messages = store;

        self.enter(&scope, Stage::Filtering);
        let thresholds = self.options.thresholds;
        let mut messages = filter_messages(channel.messages.iter(), thresholds.reactions);
        let mut threads = filter_threads(
            channel.messages.iter(),
            thresholds.replies,
            thresholds.thread_reactions,
        );
        rank_messages(&mut messages);
        rank_threads(&mut threads);

        Ok(ChannelDigest {
            channel: channel.name.clone(),
            total_messages: channel.messages.len(),
            messages: self.annotate(channel, &messages).await,
            threads: self.annotate(channel, &threads).await,
        })
    }

    async fn annotate(&self, channel: &Channel, messages: &[&Message]) -> Vec<DigestEntry> {
        let mut entries = Vec::with_capacity(messages.len());

        for message in messages {
            let author = match &message.user_id {
                Some(user_id) => self.users.resolve(user_id).await,
                None => message.username.clone().unwrap_or_default(),
            };

            let permalink = match self.client.fetch_permalink(&channel.id, &message.ts).await {
                Ok(permalink) => permalink,
                Err(e) => {
                    warn!("#{}: no permalink for {}: {e}", channel.name, message.ts);
                    String::new()
                }
            };

            entries.push(DigestEntry::new(&channel.name, message, author, permalink));
        }

        entries
    }
}
