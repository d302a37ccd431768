use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::util::{ensure_dir, is_safe_identifier};

use super::store::SessionStore;
use super::SessionRecord;

const EXTENSION: &str = "json";

/// File-based session store: one pretty-printed JSON file per username.
pub struct FileSessionStore {
    sessions_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(sessions_dir: &Path) -> std::io::Result<Self> {
        let sessions_dir = ensure_dir(sessions_dir)?;
        Ok(Self { sessions_dir })
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    fn session_path(&self, username: &str) -> Result<PathBuf, SessionError> {
        if !is_safe_identifier(username) {
            return Err(SessionError::InvalidKey(username.to_string()));
        }
        Ok(self.sessions_dir.join(format!("{}.{}", username, EXTENSION)))
    }

    fn temp_path(&self, username: &str) -> PathBuf {
        self.sessions_dir.join(format!(
            "{}.{}.{}.tmp",
            username,
            EXTENSION,
            uuid::Uuid::new_v4().simple()
        ))
    }

    /// Parse file contents. Files without a `username` field predate the
    /// record layout and hold bare collaborator settings.
    fn parse(username: &str, bytes: &[u8]) -> Result<SessionRecord, SessionError> {
        let corrupt = |source| SessionError::Corrupt {
            key: username.to_string(),
            source,
        };

        let value: Value = serde_json::from_slice(bytes).map_err(corrupt)?;
        let is_record = match &value {
            Value::Object(map) => map.contains_key("username"),
            _ => false,
        };

        if is_record {
            let mut record: SessionRecord = serde_json::from_value(value).map_err(corrupt)?;
            record.username = username.to_string();
            return Ok(record);
        }

        match SessionRecord::from_import(username, value) {
            Some(record) => Ok(record),
            None => Err(corrupt(<serde_json::Error as serde::de::Error>::custom(
                "session file is not a JSON object",
            ))),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let username = record.username.as_str();
        let path = self.session_path(username)?;
        let json = serde_json::to_vec_pretty(record).map_err(|source| SessionError::Encode {
            key: username.to_string(),
            source,
        })?;

        let tmp = self.temp_path(username);
        let result = (|| -> std::io::Result<()> {
            std::fs::create_dir_all(&self.sessions_dir)?;
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            std::fs::rename(&tmp, &path)
        })();

        if let Err(source) = result {
            if let Err(e) = std::fs::remove_file(&tmp) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove temp session file {}: {}", tmp.display(), e);
                }
            }
            return Err(SessionError::Write {
                key: username.to_string(),
                source,
            });
        }

        debug!("Saved session {}", username);
        Ok(())
    }

    fn load(&self, username: &str) -> Result<Option<SessionRecord>, SessionError> {
        let path = self.session_path(username)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SessionError::Read {
                    key: username.to_string(),
                    source,
                })
            }
        };
        Self::parse(username, &bytes).map(Some)
    }

    fn exists(&self, username: &str) -> bool {
        self.session_path(username)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    fn delete(&self, username: &str) -> Result<bool, SessionError> {
        let path = self.session_path(username)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted session {}", username);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SessionError::Write {
                key: username.to_string(),
                source,
            }),
        }
    }

    fn list(&self) -> Result<Vec<String>, SessionError> {
        let entries = match std::fs::read_dir(&self.sessions_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SessionError::Read {
                    key: self.sessions_dir.display().to_string(),
                    source,
                })
            }
        };

        let mut usernames: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?;
                is_safe_identifier(stem).then(|| stem.to_string())
            })
            .collect();
        usernames.sort();
        Ok(usernames)
    }
}
