use crate::api::{ApiFailure, ClientConfig};
use crate::models::slack::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Remote capabilities the digest consumes. Implementations make exactly
/// one request per call and never retry.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn list_channels(&self, cursor: Option<&str>) -> Result<ChannelPage, ApiFailure>;
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<HistoryPage, ApiFailure>;
    async fn fetch_permalink(&self, channel_id: &str, ts: &str) -> Result<String, ApiFailure>;
    async fn fetch_user_profile(&self, user_id: &str) -> Result<UserProfile, ApiFailure>;
    async fn post_message(&self, channel: &str, text: &str, as_user: bool)
        -> Result<(), ApiFailure>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    channels: Vec<ChannelInfo>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<RawMessage>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct PermalinkResponse {
    permalink: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    user: UserInfo,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    profile: UserProfile,
}

pub struct SlackClient {
    client: Client,
    base_url: String,
}

impl SlackClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", config.token))
                .context("Slack token contains invalid header characters")?,
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("failed to create Slack http client")?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiFailure> {
        debug!("calling {method}");
        let response = request
            .send()
            .await
            .map_err(|e| ApiFailure::Failed(format!("request error: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiFailure::RateLimited);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiFailure::Failed(format!("cannot read response body: {e}")))?;

        if !status.is_success() {
            return Err(ApiFailure::Failed(format!("status {status}: {body}")));
        }

        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|e| ApiFailure::Failed(format!("malformed response ({e}): {body}")))?;

        if !envelope.ok {
            return match envelope.error.as_deref() {
                Some("ratelimited") => Err(ApiFailure::RateLimited),
                error => Err(ApiFailure::Failed(format!(
                    "{}: {}",
                    error.unwrap_or("unknown error"),
                    body
                ))),
            };
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiFailure::Failed(format!("unexpected response ({e}): {body}")))
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn list_channels(&self, cursor: Option<&str>) -> Result<ChannelPage, ApiFailure> {
        let mut query = vec![
            ("exclude_archived", "true"),
            ("types", "public_channel"),
            ("limit", "200"),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let request = self.client.get(self.url("conversations.list")).query(&query);
        let response: ChannelListResponse = self.send("conversations.list", request).await?;

        Ok(ChannelPage {
            channels: response.channels,
            next_cursor: response
                .response_metadata
                .map(|metadata| metadata.next_cursor)
                .filter(|cursor| !cursor.is_empty()),
        })
    }

    async fn fetch_history(&self, request: &HistoryRequest) -> Result<HistoryPage, ApiFailure> {
        let mut query = vec![
            ("channel", request.channel.clone()),
            ("inclusive", request.inclusive.to_string()),
            ("limit", request.limit.to_string()),
        ];
        if let Some(oldest) = &request.oldest {
            query.push(("oldest", oldest.clone()));
        }
        if let Some(latest) = &request.latest {
            query.push(("latest", latest.clone()));
        }

        let http = self.client.get(self.url("conversations.history")).query(&query);
        let response: HistoryResponse = self.send("conversations.history", http).await?;

        Ok(HistoryPage {
            messages: response.messages,
            has_more: response.has_more,
        })
    }

    async fn fetch_permalink(&self, channel_id: &str, ts: &str) -> Result<String, ApiFailure> {
        let request = self
            .client
            .get(self.url("chat.getPermalink"))
            .query(&[("channel", channel_id), ("message_ts", ts)]);
        let response: PermalinkResponse = self.send("chat.getPermalink", request).await?;
        Ok(response.permalink)
    }

    async fn fetch_user_profile(&self, user_id: &str) -> Result<UserProfile, ApiFailure> {
        let request = self
            .client
            .get(self.url("users.info"))
            .query(&[("user", user_id)]);
        let response: UserInfoResponse = self.send("users.info", request).await?;
        Ok(response.user.profile)
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        as_user: bool,
    ) -> Result<(), ApiFailure> {
        let body = serde_json::json!({
            "channel": channel,
            "text": text,
            "as_user": as_user,
        });

        let request = self.client.post(self.url("chat.postMessage")).json(&body);
        let _: Envelope = self.send("chat.postMessage", request).await?;
        Ok(())
    }
}
