use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::slack::SlackApi;
use crate::api::ApiFailure;
use crate::models::slack::*;

/// In-memory Slack used by the unit tests. History pages are served in
/// the order they were queued; point lookups are answered from `roots`.
#[derive(Default)]
pub(crate) struct ScriptedSlack {
    failures: Mutex<VecDeque<ApiFailure>>,
    pages: Mutex<VecDeque<HistoryPage>>,
    channel_pages: Mutex<VecDeque<ChannelPage>>,
    roots: Mutex<HashMap<String, RawMessage>>,
    profiles: Mutex<HashMap<String, UserProfile>>,
    history_requests: Mutex<Vec<HistoryRequest>>,
    channel_cursors: Mutex<Vec<Option<String>>>,
    profile_lookups: AtomicUsize,
    calls: AtomicUsize,
}

pub(crate) fn message(ts: &str, user: &str, text: &str) -> RawMessage {
    RawMessage {
        ts: ts.to_string(),
        user: Some(user.to_string()),
        text: text.to_string(),
        ..RawMessage::default()
    }
}

pub(crate) fn reply(ts: &str, root: &str, user: &str) -> RawMessage {
    RawMessage {
        thread_ts: Some(root.to_string()),
        ..message(ts, user, "reply")
    }
}

impl ScriptedSlack {
    pub(crate) fn fail_next(&self, failure: ApiFailure) {
        self.failures.lock().unwrap().push_back(failure);
    }

    pub(crate) fn add_page(&self, messages: Vec<RawMessage>, has_more: bool) {
        self.pages
            .lock()
            .unwrap()
            .push_back(HistoryPage { messages, has_more });
    }

    pub(crate) fn add_channel_page(&self, channels: &[(&str, &str)], next_cursor: Option<&str>) {
        self.channel_pages.lock().unwrap().push_back(ChannelPage {
            channels: channels
                .iter()
                .map(|(id, name)| ChannelInfo {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
            next_cursor: next_cursor.map(str::to_string),
        });
    }

    pub(crate) fn add_root(&self, root: RawMessage) {
        self.roots.lock().unwrap().insert(root.ts.clone(), root);
    }

    pub(crate) fn add_profile(&self, user_id: &str, real_name: &str, display_name: &str) {
        self.profiles.lock().unwrap().insert(
            user_id.to_string(),
            UserProfile {
                real_name: real_name.to_string(),
                display_name: display_name.to_string(),
            },
        );
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn profile_lookups(&self) -> usize {
        self.profile_lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn history_requests(&self) -> Vec<HistoryRequest> {
        self.history_requests.lock().unwrap().clone()
    }

    pub(crate) fn channel_cursors(&self) -> Vec<Option<String>> {
        self.channel_cursors.lock().unwrap().clone()
    }

    fn begin_call(&self) -> Result<(), ApiFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SlackApi for ScriptedSlack {
    async fn list_channels(&self, cursor: Option<&str>) -> Result<ChannelPage, ApiFailure> {
        self.begin_call()?;
        self.channel_cursors
            .lock()
            .unwrap()
            .push(cursor.map(str::to_string));
        Ok(self
            .channel_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn fetch_history(&self, request: &HistoryRequest) -> Result<HistoryPage, ApiFailure> {
        self.begin_call()?;
        self.history_requests.lock().unwrap().push(request.clone());

        if request.inclusive {
            let roots = self.roots.lock().unwrap();
            let messages = request
                .latest
                .as_ref()
                .and_then(|ts| roots.get(ts))
                .cloned()
                .into_iter()
                .collect();
            return Ok(HistoryPage {
                messages,
                has_more: false,
            });
        }

        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn fetch_permalink(&self, channel_id: &str, ts: &str) -> Result<String, ApiFailure> {
        self.begin_call()?;
        Ok(format!("https://example.slack.com/archives/{channel_id}/p{ts}"))
    }

    async fn fetch_user_profile(&self, user_id: &str) -> Result<UserProfile, ApiFailure> {
        self.begin_call()?;
        self.profile_lookups.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.profiles
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| ApiFailure::Failed("user_not_found".to_string()))
    }

    async fn post_message(
        &self,
        _channel: &str,
        _text: &str,
        _as_user: bool,
    ) -> Result<(), ApiFailure> {
        self.begin_call()
    }
}
