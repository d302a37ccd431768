use crate::error::SessionError;
use crate::session::SessionRecord;

/// Trait for session storage backends.
///
/// Implementations hold no in-process locks: concurrent saves for the same
/// username resolve last-writer-wins, different usernames never interfere.
pub trait SessionStore: Send + Sync {
    /// Write or fully replace the record for `record.username`.
    fn save(&self, record: &SessionRecord) -> Result<(), SessionError>;

    /// Load a record. `Ok(None)` means no session exists.
    fn load(&self, username: &str) -> Result<Option<SessionRecord>, SessionError>;

    /// Check for a record without deserializing it.
    fn exists(&self, username: &str) -> bool;

    /// Remove a record. Returns whether one was present.
    fn delete(&self, username: &str) -> Result<bool, SessionError>;

    /// List stored usernames, sorted.
    fn list(&self) -> Result<Vec<String>, SessionError>;
}
