//! Plain data returned by the remote-client collaborator.
//!
//! Raw platform payloads are loosely typed; the `from_raw` constructors pick
//! out the fields the HTTP surface exposes and tolerate missing ones.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Read a string field that the platform sometimes encodes as a number.
fn str_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn u64_field(raw: &Value, key: &str) -> u64 {
    raw.get(key).and_then(|v| v.as_u64()).unwrap_or(0)
}

fn epoch_to_rfc3339(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk: Option<String>,
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
}

impl UserSummary {
    pub fn from_raw(raw: &Value) -> Self {
        Self {
            pk: str_field(raw, "pk"),
            username: str_field(raw, "username").unwrap_or_default(),
            full_name: str_field(raw, "full_name").unwrap_or_default(),
            profile_pic_url: str_field(raw, "profile_pic_url"),
        }
    }
}

/// A media item created by a publish call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    #[serde(default)]
    pub pk: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub media_type: Option<u64>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub caption_text: Option<String>,
}

impl MediaInfo {
    pub fn from_raw(raw: &Value) -> Self {
        let caption_text = str_field(raw, "caption_text").or_else(|| {
            raw.get("caption")
                .and_then(|c| c.get("text"))
                .and_then(|t| t.as_str())
                .map(|s| s.to_string())
        });
        Self {
            id: str_field(raw, "id")
                .or_else(|| str_field(raw, "pk"))
                .unwrap_or_default(),
            pk: str_field(raw, "pk"),
            code: str_field(raw, "code"),
            media_type: raw.get("media_type").and_then(|v| v.as_u64()),
            product_type: str_field(raw, "product_type").filter(|s| !s.is_empty()),
            caption_text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub thread_title: Option<String>,
    pub users: Vec<UserSummary>,
    pub last_message: Option<String>,
    pub last_message_timestamp: Option<Value>,
}

impl ThreadSummary {
    pub fn from_raw(raw: &Value) -> Self {
        let users = raw
            .get("users")
            .and_then(|v| v.as_array())
            .map(|users| {
                users
                    .iter()
                    .map(|u| {
                        let mut user = UserSummary::from_raw(u);
                        user.pk = None;
                        user
                    })
                    .collect()
            })
            .unwrap_or_default();

        let last = raw.get("last_permanent_item");
        Self {
            thread_id: str_field(raw, "thread_id").unwrap_or_default(),
            thread_title: str_field(raw, "thread_title"),
            users,
            last_message: last.and_then(|item| str_field(item, "text")),
            last_message_timestamp: last
                .and_then(|item| item.get("timestamp"))
                .filter(|ts| !ts.is_null())
                .cloned(),
        }
    }
}

/// Messages of one direct thread, passed through as the platform returns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessages {
    pub thread_id: String,
    pub messages: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub pk: Option<String>,
    pub username: String,
    pub full_name: String,
    pub biography: String,
    pub external_url: Option<String>,
    pub follower_count: u64,
    pub following_count: u64,
    pub media_count: u64,
    pub is_private: bool,
    pub is_verified: bool,
    pub profile_pic_url: Option<String>,
}

impl Profile {
    pub fn from_raw(raw: &Value) -> Self {
        Self {
            pk: str_field(raw, "pk"),
            username: str_field(raw, "username").unwrap_or_default(),
            full_name: str_field(raw, "full_name").unwrap_or_default(),
            biography: str_field(raw, "biography").unwrap_or_default(),
            external_url: str_field(raw, "external_url").filter(|s| !s.is_empty()),
            follower_count: u64_field(raw, "follower_count"),
            following_count: u64_field(raw, "following_count"),
            media_count: u64_field(raw, "media_count"),
            is_private: raw.get("is_private").and_then(|v| v.as_bool()).unwrap_or(false),
            is_verified: raw.get("is_verified").and_then(|v| v.as_bool()).unwrap_or(false),
            profile_pic_url: str_field(raw, "profile_pic_url_hd")
                .or_else(|| str_field(raw, "profile_pic_url")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryMediaType {
    Photo,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryItem {
    pub id: Option<String>,
    pub username: String,
    pub media_type: StoryMediaType,
    pub media_url: Option<String>,
    pub taken_at: Option<String>,
}

impl StoryItem {
    /// Shape a raw story item. `media_type == 1` is a photo, anything else a video.
    pub fn from_raw(owner: &str, raw: &Value) -> Self {
        let is_photo = raw.get("media_type").and_then(|v| v.as_u64()) == Some(1);
        let media_url = if is_photo {
            raw.pointer("/image_versions2/candidates/0/url")
        } else {
            raw.pointer("/video_versions/0/url")
        }
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

        Self {
            id: str_field(raw, "id").or_else(|| str_field(raw, "pk")),
            username: owner.to_string(),
            media_type: if is_photo {
                StoryMediaType::Photo
            } else {
                StoryMediaType::Video
            },
            media_url,
            taken_at: raw
                .get("taken_at")
                .and_then(|v| v.as_i64())
                .and_then(epoch_to_rfc3339),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_thread_summary_from_raw() {
        let raw = json!({
            "thread_id": "340282366841710300949128",
            "thread_title": "bob",
            "users": [
                {"pk": 42, "username": "bob", "full_name": "Bob B", "profile_pic_url": "https://cdn/p.jpg"}
            ],
            "last_permanent_item": {"text": "hi there", "timestamp": 1723312800000000i64}
        });
        let thread = ThreadSummary::from_raw(&raw);
        assert_eq!(thread.thread_id, "340282366841710300949128");
        assert_eq!(thread.thread_title.as_deref(), Some("bob"));
        assert_eq!(thread.users.len(), 1);
        assert_eq!(thread.users[0].username, "bob");
        assert_eq!(thread.last_message.as_deref(), Some("hi there"));
        assert_eq!(thread.last_message_timestamp, Some(json!(1723312800000000i64)));

        let value = serde_json::to_value(&thread).unwrap();
        assert!(value["users"][0].get("pk").is_none());
    }

    #[test]
    fn test_thread_without_last_item() {
        let thread = ThreadSummary::from_raw(&json!({"thread_id": "1", "users": []}));
        assert!(thread.last_message.is_none());
        assert!(thread.last_message_timestamp.is_none());
        assert!(thread.thread_title.is_none());
    }

    #[test]
    fn test_story_item_photo_and_video() {
        let photo = json!({
            "id": "1_2",
            "media_type": 1,
            "taken_at": 1723312800,
            "image_versions2": {"candidates": [{"url": "https://cdn/a.jpg"}, {"url": "https://cdn/b.jpg"}]}
        });
        let story = StoryItem::from_raw("target", &photo);
        assert_eq!(story.media_type, StoryMediaType::Photo);
        assert_eq!(story.media_url.as_deref(), Some("https://cdn/a.jpg"));
        assert_eq!(story.taken_at.as_deref(), Some("2024-08-10T18:00:00.000Z"));
        assert_eq!(story.username, "target");

        let video = json!({
            "pk": 99,
            "media_type": 2,
            "taken_at": 0,
            "video_versions": [{"url": "https://cdn/v.mp4"}]
        });
        let story = StoryItem::from_raw("target", &video);
        assert_eq!(story.media_type, StoryMediaType::Video);
        assert_eq!(story.media_url.as_deref(), Some("https://cdn/v.mp4"));
        assert_eq!(story.id.as_deref(), Some("99"));
        assert_eq!(story.taken_at.as_deref(), Some("1970-01-01T00:00:00.000Z"));

        let value = serde_json::to_value(&story).unwrap();
        assert_eq!(value["media_type"], "video");
    }

    #[test]
    fn test_story_item_missing_media() {
        let story = StoryItem::from_raw("t", &json!({"media_type": 1}));
        assert!(story.media_url.is_none());
        assert!(story.taken_at.is_none());
    }

    #[test]
    fn test_profile_from_raw() {
        let raw = json!({
            "pk": "123",
            "username": "target",
            "full_name": "Target User",
            "biography": "bio",
            "external_url": "",
            "follower_count": 10,
            "following_count": 5,
            "media_count": 3,
            "is_private": true,
            "profile_pic_url": "https://cdn/small.jpg",
            "profile_pic_url_hd": "https://cdn/hd.jpg"
        });
        let profile = Profile::from_raw(&raw);
        assert_eq!(profile.pk.as_deref(), Some("123"));
        assert_eq!(profile.follower_count, 10);
        assert!(profile.is_private);
        assert!(!profile.is_verified);
        assert!(profile.external_url.is_none());
        assert_eq!(profile.profile_pic_url.as_deref(), Some("https://cdn/hd.jpg"));
    }

    #[test]
    fn test_media_info_from_raw() {
        let info = MediaInfo::from_raw(&json!({
            "pk": 3141,
            "id": "3141_42",
            "code": "C0de",
            "media_type": 2,
            "product_type": "clips",
            "caption": {"text": "hello"}
        }));
        assert_eq!(info.id, "3141_42");
        assert_eq!(info.pk.as_deref(), Some("3141"));
        assert_eq!(info.media_type, Some(2));
        assert_eq!(info.product_type.as_deref(), Some("clips"));
        assert_eq!(info.caption_text.as_deref(), Some("hello"));

        let info = MediaInfo::from_raw(&json!({"pk": 7}));
        assert_eq!(info.id, "7");
    }

    #[test]
    fn test_user_summary_numeric_pk() {
        let user = UserSummary::from_raw(&json!({"pk": 5, "username": "u"}));
        assert_eq!(user.pk.as_deref(), Some("5"));
        assert_eq!(user.full_name, "");
        assert!(user.profile_pic_url.is_none());
    }
}
