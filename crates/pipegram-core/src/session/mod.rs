pub mod store;
pub mod cache;

#[cfg(feature = "file-backend")]
pub mod file_store;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use cache::ClientCache;
pub use store::SessionStore;

#[cfg(feature = "file-backend")]
pub use file_store::FileSessionStore;

/// Durable state of one authenticated account.
///
/// `settings` belongs to the remote-client collaborator and is stored and
/// returned untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub username: String,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl SessionRecord {
    pub fn new(username: impl Into<String>, settings: Map<String, Value>) -> Self {
        Self {
            username: username.into(),
            proxy: None,
            settings,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    /// Build a record from an imported session blob.
    ///
    /// A blob shaped like an exported record (object-valued `settings`) keeps
    /// its settings and proxy; any other object becomes the settings verbatim.
    /// Returns `None` when the blob is not a JSON object.
    pub fn from_import(username: impl Into<String>, blob: Value) -> Option<Self> {
        let Value::Object(mut map) = blob else {
            return None;
        };

        let record = match map.remove("settings") {
            Some(Value::Object(settings)) => {
                let proxy = map
                    .get("proxy")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                Self::new(username, settings).with_proxy(proxy)
            }
            Some(other) => {
                map.insert("settings".to_string(), other);
                Self::new(username, map)
            }
            None => Self::new(username, map),
        };
        Some(record)
    }

    /// Whether the collaborator left any state to restore from.
    pub fn has_settings(&self) -> bool {
        !self.settings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serde_layout() {
        let mut settings = Map::new();
        settings.insert("cookies".to_string(), json!({"sessionid": "abc"}));
        let record = SessionRecord::new("alice", settings)
            .with_proxy(Some("http://proxy:8080".to_string()));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["username"], "alice");
        assert_eq!(value["proxy"], "http://proxy:8080");
        assert_eq!(value["settings"]["cookies"]["sessionid"], "abc");

        let parsed: SessionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let parsed: SessionRecord = serde_json::from_str(r#"{"username": "bob"}"#).unwrap();
        assert_eq!(parsed.username, "bob");
        assert!(parsed.proxy.is_none());
        assert!(!parsed.has_settings());
    }

    #[test]
    fn test_blank_proxy_is_dropped() {
        let record = SessionRecord::new("a", Map::new()).with_proxy(Some("  ".to_string()));
        assert!(record.proxy.is_none());
    }

    #[test]
    fn test_import_exported_record() {
        let blob = json!({
            "username": "someone-else",
            "proxy": "socks5://p:1080",
            "settings": {"uuids": {"phone_id": "x"}}
        });
        let record = SessionRecord::from_import("alice", blob).unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.proxy.as_deref(), Some("socks5://p:1080"));
        assert_eq!(record.settings["uuids"]["phone_id"], "x");
        assert!(!record.settings.contains_key("username"));
    }

    #[test]
    fn test_import_raw_settings_verbatim() {
        let blob = json!({"cookies": {"ds_user_id": "1"}, "device_settings": {"app_version": "1"}});
        let record = SessionRecord::from_import("alice", blob.clone()).unwrap();
        assert_eq!(Value::Object(record.settings), blob);
        assert!(record.proxy.is_none());
    }

    #[test]
    fn test_import_non_object_settings_kept_verbatim() {
        let blob = json!({"settings": "opaque", "other": 1});
        let record = SessionRecord::from_import("alice", blob.clone()).unwrap();
        assert_eq!(Value::Object(record.settings), blob);
    }

    #[test]
    fn test_import_rejects_non_object() {
        assert!(SessionRecord::from_import("alice", json!("string")).is_none());
        assert!(SessionRecord::from_import("alice", json!([1, 2])).is_none());
    }
}
