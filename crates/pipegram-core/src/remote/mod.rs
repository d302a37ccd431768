pub mod bridge;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::session::SessionRecord;

pub use bridge::BridgePlatform;
pub use types::{
    MediaInfo, Profile, StoryItem, StoryMediaType, ThreadMessages, ThreadSummary, UserSummary,
};

/// Where a published video lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoTarget {
    Feed,
    Story,
    Reel,
}

/// Entry point to the social platform: authenticates and restores sessions.
#[async_trait]
pub trait RemotePlatform: Send + Sync {
    /// Get the platform name (used in logs).
    fn name(&self) -> &str;

    /// Authenticate with credentials and return the session to persist.
    async fn login(
        &self,
        username: &str,
        password: &str,
        proxy: Option<&str>,
    ) -> Result<SessionRecord, RemoteError>;

    /// Build a client from a stored session. Fails when the record carries no
    /// settings to restore from.
    async fn restore(&self, record: &SessionRecord) -> Result<Arc<dyn RemoteClient>, RemoteError>;
}

/// An authenticated client bound to one account.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Confirm the session is still accepted by the platform.
    async fn verify(&self) -> Result<(), RemoteError>;

    async fn current_user(&self) -> Result<UserSummary, RemoteError>;

    async fn publish_photo(&self, image: &[u8], caption: &str) -> Result<MediaInfo, RemoteError>;

    async fn publish_photo_story(&self, image: &[u8]) -> Result<MediaInfo, RemoteError>;

    async fn publish_video(
        &self,
        video: &[u8],
        caption: &str,
        target: VideoTarget,
    ) -> Result<MediaInfo, RemoteError>;

    /// Send a text message and return the thread id.
    async fn send_text_message(&self, to_username: &str, text: &str)
        -> Result<String, RemoteError>;

    /// Send a photo message and return the thread id.
    async fn send_photo_message(&self, to_username: &str, image: &[u8])
        -> Result<String, RemoteError>;

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, RemoteError>;

    async fn thread_messages(&self, thread_id: &str) -> Result<ThreadMessages, RemoteError>;

    async fn get_profile(&self, target_username: &str) -> Result<Profile, RemoteError>;

    async fn list_stories(&self, target_username: &str) -> Result<Vec<StoryItem>, RemoteError>;

    async fn set_biography(&self, biography: &str) -> Result<(), RemoteError>;

    async fn change_profile_picture(&self, image: &[u8]) -> Result<(), RemoteError>;
}
