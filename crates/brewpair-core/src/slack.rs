use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::error::{BrewError, Result};
use crate::models::{ConversationId, GroupId, MemberId};
use crate::provider::{ConversationProvider, MembershipProvider};

const DEFAULT_BASE_URL: &str = "https://slack.com/api";

/// How many history messages to pull when probing a conversation for
/// follow-up activity. Enough to look past the bot's own invitation.
const ACTIVITY_SCAN_LIMIT: usize = 20;

/// Blocking Slack Web API gateway implementing both provider traits.
/// Dry-run mode suppresses `chat.postMessage` only; reads and
/// `conversations.open` still run, so the full pairing logic is exercised.
pub struct SlackGateway {
    base_url: String,
    http: Client,
    dry_run: bool,
}

impl std::fmt::Debug for SlackGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackGateway")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl SlackGateway {
    pub fn new(api_token: &str, timeout_ms: u64, dry_run: bool) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {api_token}"))
            .map_err(|e| BrewError::Configuration(format!("invalid slack.api_token: {e}")))?;
        headers.insert(AUTHORIZATION, value);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
            dry_run,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One Web API call. Slack signals failure inside a 200 response via
    /// `ok: false` plus an error code.
    fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value> {
        let payload = self.call_unchecked(method, params)?;
        envelope_error(method, &payload)?;
        Ok(payload)
    }

    /// Same call without the envelope check, for callers that inspect the
    /// Slack error code themselves.
    fn call_unchecked(&self, method: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{method}", self.base_url);
        Ok(self.http.get(url).query(params).send()?.json::<Value>()?)
    }

    fn post(&self, method: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{method}", self.base_url);
        let payload = self.http.post(url).json(body).send()?.json::<Value>()?;
        envelope_error(method, &payload)?;
        Ok(payload)
    }

    fn open_conversation(&self, members: &[MemberId]) -> Result<ConversationId> {
        let users = members
            .iter()
            .map(MemberId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let payload = self.post("conversations.open", &json!({ "users": users }))?;
        payload
            .pointer("/channel/id")
            .and_then(Value::as_str)
            .map(|id| ConversationId(id.to_string()))
            .ok_or_else(|| {
                BrewError::Provider("conversations.open returned no channel id".to_string())
            })
    }
}

fn envelope_error(method: &str, payload: &Value) -> Result<()> {
    if payload.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    let code = error_code(payload).unwrap_or("unknown_error");
    Err(BrewError::Provider(format!("{method} failed: {code}")))
}

fn error_code(payload: &Value) -> Option<&str> {
    payload.get("error").and_then(Value::as_str)
}

fn next_cursor(payload: &Value) -> Option<String> {
    payload
        .pointer("/response_metadata/next_cursor")
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(ToString::to_string)
}

fn collect_strings(payload: &Value, pointer: &str) -> Vec<String> {
    payload
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Bot-authored entries (our own invitation included) do not count as
/// follow-up activity.
fn any_non_bot_message(messages: &[Value]) -> bool {
    messages.iter().any(|message| {
        message.get("bot_id").is_none()
            && message.get("subtype").and_then(Value::as_str) != Some("bot_message")
    })
}

impl MembershipProvider for SlackGateway {
    fn list_active_members(&self, group: &GroupId) -> Result<Vec<MemberId>> {
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![("channel", group.0.as_str())];
            if let Some(cursor) = cursor.as_deref() {
                params.push(("cursor", cursor));
            }
            let payload = self.call("conversations.members", &params)?;
            members.extend(
                collect_strings(&payload, "/members")
                    .into_iter()
                    .map(MemberId),
            );
            cursor = next_cursor(&payload);
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!(group = %group.0, count = members.len(), "listed channel members");
        Ok(members)
    }

    fn list_groups_of(&self, member: &MemberId) -> Result<BTreeSet<GroupId>> {
        let mut groups = BTreeSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("user", member.as_str()),
                ("types", "public_channel"),
                ("exclude_archived", "true"),
            ];
            if let Some(cursor) = cursor.as_deref() {
                params.push(("cursor", cursor));
            }
            let payload = self.call_unchecked("users.conversations", &params)?;
            // Channel visibility is an optional capability: a token without
            // the scope falls back to uniform distance.
            if error_code(&payload) == Some("missing_scope") {
                tracing::warn!(member = %member, "no channel-listing scope, treating group set as empty");
                return Ok(BTreeSet::new());
            }
            envelope_error("users.conversations", &payload)?;
            groups.extend(
                payload
                    .pointer("/channels")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(|channel| channel.get("id").and_then(Value::as_str))
                    .map(|id| GroupId(id.to_string())),
            );
            cursor = next_cursor(&payload);
            if cursor.is_none() {
                break;
            }
        }

        Ok(groups)
    }
}

impl ConversationProvider for SlackGateway {
    fn create_conversation(&self, members: &[MemberId]) -> Result<ConversationId> {
        self.open_conversation(members)
    }

    fn send_message(&self, conversation: &ConversationId, text: &str) -> Result<()> {
        if self.dry_run {
            tracing::info!(conversation = %conversation, "dry run, message suppressed");
            return Ok(());
        }
        self.post(
            "chat.postMessage",
            &json!({ "channel": conversation.0, "text": text }),
        )?;
        Ok(())
    }

    fn has_activity_since(
        &self,
        conversation: &ConversationId,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let oldest = format!("{}", since.timestamp());
        let limit = ACTIVITY_SCAN_LIMIT.to_string();
        let payload = self.call(
            "conversations.history",
            &[
                ("channel", conversation.0.as_str()),
                ("oldest", oldest.as_str()),
                ("limit", limit.as_str()),
            ],
        )?;
        let messages = payload
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(any_non_bot_message(&messages))
    }
}
