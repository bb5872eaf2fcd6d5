//! Slack Web API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::error::ChatError;
use super::traits::ChatClient;
use super::types::{MessageBlock, PostedMessage};
use crate::config::ChatConfig;
use crate::credentials::{AccessToken, AuthorizedUser};

/// Scopes requested for the app itself.
const BOT_SCOPES: &str = "commands";
/// Scopes requested on behalf of the requester.
const USER_SCOPES: &str = "chat:write,users:read";

/// The OAuth page a requester must visit to authorize the app.
pub fn authorize_url(authorize_base: &str, client_id: &str) -> String {
    format!(
        "{}?client_id={}&scope={}&user_scope={}",
        authorize_base,
        urlencoding::encode(client_id),
        urlencoding::encode(BOT_SCOPES),
        urlencoding::encode(USER_SCOPES),
    )
}

pub struct SlackClient {
    client: Client,
    api_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: Value,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    channel: String,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<SlackProfile>,
}

#[derive(Debug, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthResponse {
    authed_user: AuthedUser,
}

#[derive(Debug, Deserialize)]
struct AuthedUser {
    id: String,
    #[serde(default)]
    access_token: Option<String>,
}

impl SlackClient {
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Build the client and check that the Web API is reachable.
    pub async fn connect(config: &ChatConfig) -> Result<Self, ChatError> {
        let client = Self::new(config)?;
        let response = client
            .client
            .post(client.method_url("api.test"))
            .send()
            .await?;
        client.unwrap_envelope("api.test", response).await?;
        debug!(api_url = %client.api_url, "Slack API reachable");
        Ok(client)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_url, method)
    }

    async fn unwrap_envelope(
        &self,
        method: &str,
        response: reqwest::Response,
    ) -> Result<Value, ChatError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(format!("{}: {}", method, e)))?;
        if !envelope.ok {
            return Err(ChatError::api(
                method,
                envelope.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        Ok(envelope.rest)
    }

    async fn call(
        &self,
        method: &str,
        token: &AccessToken,
        body: Value,
    ) -> Result<Value, ChatError> {
        debug!(method, "Slack API call");
        let response = self
            .client
            .post(self.method_url(method))
            .bearer_auth(token.expose())
            .json(&body)
            .send()
            .await?;
        self.unwrap_envelope(method, response).await
    }

    fn blocks_json(blocks: &[MessageBlock]) -> Value {
        Value::Array(blocks.iter().map(MessageBlock::to_json).collect())
    }
}

fn parse<T: for<'de> Deserialize<'de>>(method: &str, value: Value) -> Result<T, ChatError> {
    serde_json::from_value(value).map_err(|e| ChatError::Parse(format!("{}: {}", method, e)))
}

#[async_trait]
impl ChatClient for SlackClient {
    fn name(&self) -> &str {
        "slack"
    }

    async fn post_message(
        &self,
        token: &AccessToken,
        conversation_id: &str,
        blocks: &[MessageBlock],
    ) -> Result<PostedMessage, ChatError> {
        let body = json!({
            "channel": conversation_id,
            "text": MessageBlock::fallback_text(blocks),
            "blocks": Self::blocks_json(blocks),
        });
        let value = self.call("chat.postMessage", token, body).await?;
        let posted: PostMessageResponse = parse("chat.postMessage", value)?;
        Ok(PostedMessage {
            conversation_id: posted.channel,
            message_ref: posted.ts,
        })
    }

    async fn update_message(
        &self,
        token: &AccessToken,
        conversation_id: &str,
        message_ref: &str,
        blocks: &[MessageBlock],
    ) -> Result<(), ChatError> {
        let body = json!({
            "channel": conversation_id,
            "ts": message_ref,
            "text": MessageBlock::fallback_text(blocks),
            "blocks": Self::blocks_json(blocks),
        });
        self.call("chat.update", token, body).await?;
        Ok(())
    }

    async fn user_display_name(
        &self,
        token: &AccessToken,
        user_id: &str,
    ) -> Result<String, ChatError> {
        let response = self
            .client
            .get(self.method_url("users.info"))
            .bearer_auth(token.expose())
            .query(&[("user", user_id)])
            .send()
            .await?;
        let value = self.unwrap_envelope("users.info", response).await?;
        let info: UserInfoResponse = parse("users.info", value)?;

        let display = info
            .user
            .profile
            .and_then(|p| p.display_name)
            .filter(|name| !name.is_empty())
            .or(info.user.real_name.filter(|name| !name.is_empty()))
            .unwrap_or(info.user.name);
        Ok(display)
    }

    async fn respond(&self, response_url: &str, text: &str) -> Result<(), ChatError> {
        let response = self
            .client
            .post(response_url)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthorizedUser, ChatError> {
        let response = self
            .client
            .post(self.method_url("oauth.v2.access"))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await?;
        let value = self.unwrap_envelope("oauth.v2.access", response).await?;
        let oauth: OAuthResponse = parse("oauth.v2.access", value)?;

        let token = oauth.authed_user.access_token.ok_or_else(|| {
            ChatError::api("oauth.v2.access", "missing user access token")
        })?;
        Ok(AuthorizedUser::new(
            oauth.authed_user.id,
            AccessToken::new(token),
        ))
    }
}
