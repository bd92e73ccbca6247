//! Social-network client abstraction.
//!
//! The bot treats the network as two things: a notification source (mentions)
//! and a status sink (replies). Both sit behind the [`StatusNetwork`] trait so
//! tests can run against a mock.

pub mod mastodon;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

pub use mastodon::MastodonClient;

/// An account as seen in notification payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
}

/// A status (post) on the network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub account: Account,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
}

/// An inbound notification event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Notification {
    pub fn is_mention(&self) -> bool {
        self.kind == "mention"
    }
}

/// Notification source + status sink.
#[async_trait]
pub trait StatusNetwork: Send + Sync {
    /// Resolve the bot's own account.
    async fn verify_credentials(&self) -> Result<Account, NetworkError>;

    /// Fetch notifications newer than `since_id`, newest first.
    async fn notifications_since(
        &self,
        since_id: Option<&str>,
    ) -> Result<Vec<Notification>, NetworkError>;

    /// Fetch a single status by id (used for reply-chain walks).
    async fn get_status(&self, id: &str) -> Result<Status, NetworkError>;

    /// Post a status, optionally as a reply. Returns the created status.
    async fn post_status(
        &self,
        text: &str,
        in_reply_to_id: Option<&str>,
        visibility: &str,
    ) -> Result<Status, NetworkError>;
}
