use std::collections::{HashMap, VecDeque};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate};
use slack_digest::api::rate_limit::{RateLimitedClient, RetryPolicy};
use slack_digest::api::slack::SlackApi;
use slack_digest::api::ApiFailure;
use slack_digest::cancel::CancelToken;
use slack_digest::digest::{DigestOptions, DigestOrchestrator, FailurePolicy, OutputMode};
use slack_digest::error::DigestError;
use slack_digest::filter::Thresholds;
use slack_digest::models::slack::{
    ChannelPage, HistoryPage, HistoryRequest, RawMessage, Reaction, UserProfile,
};
use slack_digest::models::Channel;
use slack_digest::report::{ReportRenderer, ReportWriter};
use slack_digest::window::Bounds;
use tempfile::TempDir;

const BOUNDS: Bounds = Bounds {
    oldest: 1_000,
    latest: 2_000,
};

/// A workspace of channels held in memory, keyed by channel id.
#[derive(Default)]
struct Workspace {
    pages: Mutex<HashMap<String, VecDeque<HistoryPage>>>,
    roots: Mutex<HashMap<(String, String), RawMessage>>,
    page_requests: AtomicUsize,
    root_lookups: AtomicUsize,
}

impl Workspace {
    fn page(&self, channel: &str, messages: Vec<RawMessage>, has_more: bool) {
        self.pages
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .push_back(HistoryPage { messages, has_more });
    }

    fn root(&self, channel: &str, message: RawMessage) {
        self.roots
            .lock()
            .unwrap()
            .insert((channel.to_string(), message.ts.clone()), message);
    }
}

#[async_trait]
impl SlackApi for Workspace {
    async fn list_channels(&self, _cursor: Option<&str>) -> Result<ChannelPage, ApiFailure> {
        Ok(ChannelPage::default())
    }

    async fn fetch_history(&self, request: &HistoryRequest) -> Result<HistoryPage, ApiFailure> {
        if request.inclusive {
            self.root_lookups.fetch_add(1, Ordering::SeqCst);
            let key = (
                request.channel.clone(),
                request.latest.clone().unwrap_or_default(),
            );
            let messages = self.roots.lock().unwrap().get(&key).cloned();
            return Ok(HistoryPage {
                messages: messages.into_iter().collect(),
                has_more: false,
            });
        }

        self.page_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get_mut(&request.channel)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default())
    }

    async fn fetch_permalink(&self, channel_id: &str, ts: &str) -> Result<String, ApiFailure> {
        Ok(format!("https://team.slack.com/archives/{channel_id}/p{ts}"))
    }

    async fn fetch_user_profile(&self, user_id: &str) -> Result<UserProfile, ApiFailure> {
        match user_id {
            "U1" => Ok(UserProfile {
                real_name: "Ada Lovelace".to_string(),
                display_name: "ada".to_string(),
            }),
            "U2" => Ok(UserProfile {
                real_name: "Grace Hopper".to_string(),
                display_name: String::new(),
            }),
            _ => Err(ApiFailure::Failed("user_not_found".to_string())),
        }
    }

    async fn post_message(&self, _: &str, _: &str, _: bool) -> Result<(), ApiFailure> {
        Ok(())
    }
}

fn message(ts: &str, user: &str, text: &str, reactions: u64) -> RawMessage {
    RawMessage {
        ts: ts.to_string(),
        user: Some(user.to_string()),
        text: text.to_string(),
        reactions: if reactions > 0 {
            vec![Reaction {
                name: "tada".to_string(),
                count: reactions,
            }]
        } else {
            Vec::new()
        },
        ..RawMessage::default()
    }
}

fn reply(ts: &str, root: &str) -> RawMessage {
    RawMessage {
        thread_ts: Some(root.to_string()),
        ..message(ts, "U2", "+1", 0)
    }
}

/// Five top-level messages, one well reacted, one carrying a 12-reply thread.
fn general(workspace: &Workspace) {
    let mut messages = vec![
        message("1900.000100", "U1", "Release notes are out", 4),
        message("1800.000100", "U2", "lunch?", 1),
        RawMessage {
            thread_ts: Some("1500.000100".to_string()),
            ..message("1500.000100", "U1", "Which editor do you use?", 0)
        },
        message("1400.000100", "U2", "morning", 0),
        message("1300.000100", "U1", "build is green", 2),
    ];
    messages.extend((0..12).map(|i| reply(&format!("{}.000100", 1510 + i), "1500.000100")));
    workspace.page("C1", messages, false);
}

fn client(workspace: Workspace) -> RateLimitedClient<Workspace> {
    RateLimitedClient::new(
        workspace,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        },
    )
}

fn options(mode: OutputMode, policy: FailurePolicy) -> DigestOptions {
    DigestOptions {
        bounds: BOUNDS,
        thresholds: Thresholds::new(3, 10, None).unwrap(),
        mode,
        policy,
        jobs: 2,
    }
}

fn orchestrator<'a>(
    client: &'a RateLimitedClient<Workspace>,
    options: DigestOptions,
    cancel: CancelToken,
) -> DigestOrchestrator<'a, Workspace> {
    DigestOrchestrator::new(client, options, cancel)
        .with_renderer(ReportRenderer::new(FixedOffset::east_opt(0).unwrap()))
}

fn writer(temp_dir: &TempDir) -> ReportWriter {
    let date = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
    ReportWriter::create(temp_dir.path(), date).unwrap()
}

#[tokio::test]
async fn split_report_lists_reacted_message_then_long_thread() {
    let workspace = Workspace::default();
    general(&workspace);
    let client = client(workspace);
    let temp_dir = tempfile::tempdir().unwrap();
    let writer = writer(&temp_dir);
    let mut channels = vec![Channel::new("C1", "general")];

    let totals = orchestrator(
        &client,
        options(OutputMode::SplitByChannels, FailurePolicy::AbortRun),
        CancelToken::new(),
    )
    .run(&mut channels, &writer)
    .await
    .unwrap();

    assert_eq!(totals.examined_channels, 1);
    assert_eq!(totals.reported_channels, 1);
    assert_eq!(totals.filtered_messages, 1);
    assert_eq!(totals.total_threads, 1);
    assert_eq!(totals.total_messages, 17);

    let report = fs::read_to_string(temp_dir.path().join("2024-01-08/general.txt")).unwrap();
    assert!(report.starts_with("===============\n==  general  ==\n"));
    assert!(report.contains("Threaded messages: 1\n"));
    assert!(report.contains("@ada wrote on 1970-01-01 00:31:00\n4 reactions\n"));
    assert!(report.contains("12 replies, 0 reactions in thread"));

    let message_at = report.find("Release notes are out").unwrap();
    let thread_at = report.find("Which editor do you use?").unwrap();
    assert!(message_at < thread_at);
    assert!(!report.contains("lunch?"));

    assert!(channels[0].messages.is_empty());
}

#[tokio::test]
async fn history_is_paged_until_exhausted() {
    let workspace = Workspace::default();
    workspace.page(
        "C1",
        vec![
            message("1900.000100", "U1", "a", 0),
            message("1800.000100", "U1", "b", 0),
        ],
        true,
    );
    workspace.page("C1", vec![message("1700.000100", "U1", "c", 0)], false);
    let client = client(workspace);
    let mut channel = Channel::new("C1", "general");

    let digest = orchestrator(
        &client,
        options(OutputMode::SplitByChannels, FailurePolicy::AbortRun),
        CancelToken::new(),
    )
    .digest_channel(&mut channel)
    .await
    .unwrap();

    assert_eq!(digest.total_messages, 3);
    assert!(digest.is_empty());
    assert_eq!(client.api().page_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn root_before_the_window_is_looked_up_once() {
    let workspace = Workspace::default();
    let mut replies: Vec<RawMessage> = (0..10)
        .map(|i| reply(&format!("{}.000100", 1100 + i), "900.000100"))
        .collect();
    replies.reverse();
    workspace.page("C1", replies, false);
    workspace.root("C1", message("900.000100", "U1", "Old question", 0));
    let client = client(workspace);
    let mut channel = Channel::new("C1", "general");

    let digest = orchestrator(
        &client,
        options(OutputMode::SplitByChannels, FailurePolicy::AbortRun),
        CancelToken::new(),
    )
    .digest_channel(&mut channel)
    .await
    .unwrap();

    assert_eq!(client.api().root_lookups.load(Ordering::SeqCst), 1);
    assert_eq!(digest.threads.len(), 1);
    assert_eq!(digest.threads[0].ts, "900.000100");
    assert_eq!(digest.threads[0].replies, 10);
    assert_eq!(digest.threads[0].author, "ada");
}

fn broken_and_general() -> Workspace {
    let workspace = Workspace::default();
    workspace.page("C0", vec![reply("1200.000100", "800.000100")], false);
    general(&workspace);
    workspace
}

#[tokio::test]
async fn unresolvable_root_aborts_the_run_by_default() {
    let client = client(broken_and_general());
    let temp_dir = tempfile::tempdir().unwrap();
    let writer = writer(&temp_dir);
    let mut channels = vec![Channel::new("C0", "broken"), Channel::new("C1", "general")];

    let result = orchestrator(
        &client,
        options(OutputMode::Consolidated, FailurePolicy::AbortRun),
        CancelToken::new(),
    )
    .run(&mut channels, &writer)
    .await;

    match result {
        Err(DigestError::ThreadIntegrity { channel, root }) => {
            assert_eq!(channel, "broken");
            assert_eq!(root, "800.000100");
        }
        other => panic!("expected a thread integrity failure, got {other:?}"),
    }
    assert!(!writer.path_for("messages").exists());
    assert!(!writer.path_for("threads").exists());
}

#[tokio::test]
async fn unresolvable_root_only_skips_its_channel_when_isolated() {
    let client = client(broken_and_general());
    let temp_dir = tempfile::tempdir().unwrap();
    let writer = writer(&temp_dir);
    let mut channels = vec![Channel::new("C0", "broken"), Channel::new("C1", "general")];

    let totals = orchestrator(
        &client,
        options(OutputMode::SplitByChannels, FailurePolicy::SkipChannel),
        CancelToken::new(),
    )
    .run(&mut channels, &writer)
    .await
    .unwrap();

    assert_eq!(totals.examined_channels, 2);
    assert_eq!(totals.skipped_channels, 1);
    assert_eq!(totals.reported_channels, 1);
    assert!(writer.path_for("general").exists());
    assert!(!writer.path_for("broken").exists());
}

#[tokio::test]
async fn cancelled_run_writes_nothing() {
    let workspace = Workspace::default();
    general(&workspace);
    let client = client(workspace);
    let temp_dir = tempfile::tempdir().unwrap();
    let writer = writer(&temp_dir);
    let mut channels = vec![Channel::new("C1", "general")];
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = orchestrator(
        &client,
        options(OutputMode::SplitByChannels, FailurePolicy::AbortRun),
        cancel,
    )
    .run(&mut channels, &writer)
    .await;

    assert!(matches!(result, Err(DigestError::Cancelled)));
    assert_eq!(client.api().page_requests.load(Ordering::SeqCst), 0);
    assert_eq!(fs::read_dir(writer.directory()).unwrap().count(), 0);
}

#[tokio::test]
async fn consolidated_reports_span_channels() {
    let workspace = Workspace::default();
    general(&workspace);
    workspace.page(
        "C2",
        vec![message("1600.000100", "U2", "Conference talk accepted", 9)],
        false,
    );
    let client = client(workspace);
    let temp_dir = tempfile::tempdir().unwrap();
    let writer = writer(&temp_dir);
    let mut channels = vec![Channel::new("C1", "general"), Channel::new("C2", "random")];

    let totals = orchestrator(
        &client,
        options(OutputMode::Consolidated, FailurePolicy::AbortRun),
        CancelToken::new(),
    )
    .run(&mut channels, &writer)
    .await
    .unwrap();

    assert_eq!(totals.reported_channels, 2);
    assert_eq!(totals.filtered_messages, 2);
    assert!(!writer.path_for("general").exists());

    let messages = fs::read_to_string(writer.path_for("messages")).unwrap();
    let talk = messages.find("Conference talk accepted").unwrap();
    let release = messages.find("Release notes are out").unwrap();
    assert!(talk < release);
    assert!(messages.contains("@Grace Hopper in #random wrote on"));
    assert!(messages.contains("Messages: 2\n"));

    let threads = fs::read_to_string(writer.path_for("threads")).unwrap();
    assert!(threads.contains("Threaded messages: 1\n"));
    assert!(threads.contains("@ada in #general wrote on"));
}
