//! Mastodon REST client over reqwest.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::NetworkError;
use crate::network::{Account, Notification, Status, StatusNetwork};

/// How many notifications to request per poll.
const NOTIFICATION_PAGE_SIZE: u32 = 40;

/// Mastodon-compatible API client.
pub struct MastodonClient {
    base_url: String,
    token: SecretString,
    client: reqwest::Client,
}

impl MastodonClient {
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(self.token.expose_secret())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, NetworkError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NetworkError::Api {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl StatusNetwork for MastodonClient {
    async fn verify_credentials(&self) -> Result<Account, NetworkError> {
        let resp = self
            .authorized(self.client.get(self.api_url("accounts/verify_credentials")))
            .send()
            .await
            .map_err(|e| NetworkError::Request(e.to_string()))?;
        Self::read_json(resp).await
    }

    async fn notifications_since(
        &self,
        since_id: Option<&str>,
    ) -> Result<Vec<Notification>, NetworkError> {
        let mut req = self
            .client
            .get(self.api_url("notifications"))
            .query(&[("limit", NOTIFICATION_PAGE_SIZE.to_string())]);
        if let Some(id) = since_id {
            req = req.query(&[("since_id", id)]);
        }
        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| NetworkError::Request(e.to_string()))?;
        Self::read_json(resp).await
    }

    async fn get_status(&self, id: &str) -> Result<Status, NetworkError> {
        let resp = self
            .authorized(self.client.get(self.api_url(&format!("statuses/{id}"))))
            .send()
            .await
            .map_err(|e| NetworkError::Request(e.to_string()))?;
        Self::read_json(resp).await
    }

    async fn post_status(
        &self,
        text: &str,
        in_reply_to_id: Option<&str>,
        visibility: &str,
    ) -> Result<Status, NetworkError> {
        let body = serde_json::json!({
            "status": text,
            "in_reply_to_id": in_reply_to_id,
            "visibility": visibility,
        });
        let resp = self
            .authorized(self.client.post(self.api_url("statuses")).json(&body))
            .send()
            .await
            .map_err(|e| NetworkError::Request(e.to_string()))?;
        Self::read_json(resp).await
    }
}
