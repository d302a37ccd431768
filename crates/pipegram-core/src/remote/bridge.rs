use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::RemoteError;
use crate::session::SessionRecord;
use crate::util::http::{build_client, USER_AGENT};
use crate::util::truncate_string;

use super::types::{MediaInfo, Profile, StoryItem, ThreadMessages, ThreadSummary, UserSummary};
use super::{RemoteClient, RemotePlatform, VideoTarget};

/// Error body returned by the bridge on non-2xx responses.
#[derive(Debug, Deserialize)]
struct BridgeErrorBody {
    error: Option<String>,
    kind: Option<String>,
}

/// Shared HTTP plumbing for the platform and every client it restores.
struct BridgeHttp {
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl BridgeHttp {
    async fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut req = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(
                "Bridge {} returned {}: {}",
                path,
                status,
                truncate_string(&text, 300, "...")
            );
            return Err(error_from_response(status.as_u16(), &text));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| RemoteError::Parse(format!("bridge {path}: {e}")))
    }

    fn transport_error(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout(self.timeout_secs)
        } else {
            RemoteError::Http(e)
        }
    }
}

/// Turn a failed bridge response into a typed error.
fn error_from_response(status: u16, text: &str) -> RemoteError {
    let body: Option<BridgeErrorBody> = serde_json::from_str(text).ok();
    let (message, kind) = match body {
        Some(b) => (b.error, b.kind),
        None => (None, None),
    };
    let message = message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                format!("bridge returned status {status}")
            } else {
                truncate_string(text.trim(), 300, "...")
            }
        });

    match kind.as_deref() {
        None if status == 429 => RemoteError::RateLimited(message),
        kind => RemoteError::from_kind(kind, status, message),
    }
}

fn expect_array(capability: &str, value: Value) -> Result<Vec<Value>, RemoteError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(RemoteError::Parse(format!(
            "{capability}: expected an array, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn thread_id_of(capability: &str, value: &Value) -> Result<String, RemoteError> {
    let id = match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => value.get("thread_id").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }),
        _ => None,
    };
    id.ok_or_else(|| RemoteError::Parse(format!("{capability}: missing thread_id")))
}

/// Remote platform reached through a sidecar bridge service.
pub struct BridgePlatform {
    http: Arc<BridgeHttp>,
}

impl BridgePlatform {
    pub fn new(config: &BridgeConfig) -> Result<Self, RemoteError> {
        let client = build_client(Duration::from_secs(config.timeout_secs), USER_AGENT)?;
        Ok(Self {
            http: Arc::new(BridgeHttp {
                base_url: config.url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone().filter(|k| !k.is_empty()),
                timeout_secs: config.timeout_secs,
                client,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }
}

#[async_trait]
impl RemotePlatform for BridgePlatform {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
        proxy: Option<&str>,
    ) -> Result<SessionRecord, RemoteError> {
        let body = json!({
            "username": username,
            "password": password,
            "proxy": proxy,
        });
        let resp = self.http.post("login", &body).await?;

        match resp.get("settings") {
            Some(Value::Object(settings)) => {
                info!("Bridge login succeeded for {}", username);
                Ok(SessionRecord::new(username, settings.clone())
                    .with_proxy(proxy.map(|p| p.to_string())))
            }
            _ => Err(RemoteError::Parse(
                "login: response has no settings object".to_string(),
            )),
        }
    }

    async fn restore(&self, record: &SessionRecord) -> Result<Arc<dyn RemoteClient>, RemoteError> {
        if !record.has_settings() {
            return Err(RemoteError::InvalidSession(format!(
                "no settings stored for {}",
                record.username
            )));
        }
        debug!("Restored bridge client for {}", record.username);
        Ok(Arc::new(BridgeClient {
            http: self.http.clone(),
            record: record.clone(),
        }))
    }
}

/// Client bound to one stored session; every call ships the session along.
pub struct BridgeClient {
    http: Arc<BridgeHttp>,
    record: SessionRecord,
}

impl BridgeClient {
    async fn call(&self, capability: &str, args: Value) -> Result<Value, RemoteError> {
        let body = json!({
            "session": self.record,
            "args": args,
        });
        let resp = self.http.post(&format!("call/{capability}"), &body).await?;
        Ok(match resp {
            Value::Object(mut map) => map.remove("result").unwrap_or(Value::Null),
            _ => Value::Null,
        })
    }

    async fn publish(&self, capability: &str, args: Value) -> Result<MediaInfo, RemoteError> {
        let result = self.call(capability, args).await?;
        if !result.is_object() {
            return Err(RemoteError::Parse(format!(
                "{capability}: expected a media object"
            )));
        }
        Ok(MediaInfo::from_raw(&result))
    }
}

#[async_trait]
impl RemoteClient for BridgeClient {
    async fn verify(&self) -> Result<(), RemoteError> {
        self.call("verify", json!({})).await.map(|_| ())
    }

    async fn current_user(&self) -> Result<UserSummary, RemoteError> {
        let result = self.call("current_user", json!({})).await?;
        Ok(UserSummary::from_raw(&result))
    }

    async fn publish_photo(&self, image: &[u8], caption: &str) -> Result<MediaInfo, RemoteError> {
        self.publish(
            "publish_photo",
            json!({ "media": STANDARD.encode(image), "caption": caption }),
        )
        .await
    }

    async fn publish_photo_story(&self, image: &[u8]) -> Result<MediaInfo, RemoteError> {
        self.publish(
            "publish_photo_story",
            json!({ "media": STANDARD.encode(image) }),
        )
        .await
    }

    async fn publish_video(
        &self,
        video: &[u8],
        caption: &str,
        target: VideoTarget,
    ) -> Result<MediaInfo, RemoteError> {
        self.publish(
            "publish_video",
            json!({
                "media": STANDARD.encode(video),
                "caption": caption,
                "target": target,
            }),
        )
        .await
    }

    async fn send_text_message(
        &self,
        to_username: &str,
        text: &str,
    ) -> Result<String, RemoteError> {
        let result = self
            .call(
                "send_text_message",
                json!({ "to_username": to_username, "text": text }),
            )
            .await?;
        thread_id_of("send_text_message", &result)
    }

    async fn send_photo_message(
        &self,
        to_username: &str,
        image: &[u8],
    ) -> Result<String, RemoteError> {
        let result = self
            .call(
                "send_photo_message",
                json!({ "to_username": to_username, "media": STANDARD.encode(image) }),
            )
            .await?;
        thread_id_of("send_photo_message", &result)
    }

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, RemoteError> {
        let result = self.call("list_threads", json!({})).await?;
        Ok(expect_array("list_threads", result)?
            .iter()
            .map(ThreadSummary::from_raw)
            .collect())
    }

    async fn thread_messages(&self, thread_id: &str) -> Result<ThreadMessages, RemoteError> {
        let result = self
            .call("thread_messages", json!({ "thread_id": thread_id }))
            .await?;
        let messages = match result {
            Value::Object(mut map) => map.remove("messages").unwrap_or(Value::Array(Vec::new())),
            other => other,
        };
        Ok(ThreadMessages {
            thread_id: thread_id.to_string(),
            messages: expect_array("thread_messages", messages)?,
        })
    }

    async fn get_profile(&self, target_username: &str) -> Result<Profile, RemoteError> {
        let result = self
            .call("get_profile", json!({ "target_username": target_username }))
            .await?;
        if !result.is_object() {
            return Err(RemoteError::NotFound(format!(
                "user {target_username} not found"
            )));
        }
        Ok(Profile::from_raw(&result))
    }

    async fn list_stories(&self, target_username: &str) -> Result<Vec<StoryItem>, RemoteError> {
        let result = self
            .call("list_stories", json!({ "target_username": target_username }))
            .await?;

        // Either a bare item list or `{username, items}` with the canonical owner name.
        let (owner, items) = match result {
            Value::Object(mut map) => {
                let owner = map
                    .get("username")
                    .and_then(|v| v.as_str())
                    .unwrap_or(target_username)
                    .to_string();
                (owner, map.remove("items").unwrap_or(Value::Array(Vec::new())))
            }
            other => (target_username.to_string(), other),
        };

        Ok(expect_array("list_stories", items)?
            .iter()
            .map(|item| StoryItem::from_raw(&owner, item))
            .collect())
    }

    async fn set_biography(&self, biography: &str) -> Result<(), RemoteError> {
        self.call("set_biography", json!({ "biography": biography }))
            .await
            .map(|_| ())
    }

    async fn change_profile_picture(&self, image: &[u8]) -> Result<(), RemoteError> {
        self.call(
            "change_profile_picture",
            json!({ "media": STANDARD.encode(image) }),
        )
        .await
        .map(|_| ())
    }
}
