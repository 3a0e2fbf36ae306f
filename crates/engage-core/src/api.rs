//! ============================================================================
//! ApiClient - HTTP Wrapper for the Engagement Service
//! ============================================================================
//! Thin request/response layer shared by the linking flow, account cache,
//! and the content/posting/analytics clients. Maps transport failures and
//! non-2xx responses into the `EngageError` taxonomy, extracting the
//! service's `detail` field when one is present.
//! ============================================================================

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::EngageConfig;
use crate::linking::LinkBackend;
use crate::types::{
    AuthResponse, Credentials, EngageError, LinkRequest, LinkResult, LinkStatus, LinkedAccount,
};

/// HTTP client bound to one engagement service, optionally authenticated
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    access_token: Option<String>,
}

impl ApiClient {
    /// Create a client from config; `access_token` comes from the session
    /// store and is attached as a bearer header on every request
    pub fn new(config: &EngageConfig, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            access_token,
        }
    }

    /// Swap the bearer token (e.g. after a fresh login)
    pub fn set_access_token(&mut self, access_token: Option<String>) {
        self.access_token = access_token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, EngageError> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EngageError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.detail)
                .unwrap_or_default();
            debug!(status = status.as_u16(), detail, "service rejected request");
            return Err(EngageError::RejectedByService {
                status: status.as_u16(),
                detail,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| EngageError::ServiceUnavailable(format!("invalid response body: {}", e)))
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngageError> {
        self.execute(self.http.get(self.url(path))).await
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, EngageError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.http.post(self.url(path)).json(body)).await
    }

    pub(crate) async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngageError> {
        self.execute(self.http.post(self.url(path))).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngageError> {
        self.execute(self.http.delete(self.url(path))).await
    }

    // ========================================================================
    // Session endpoints
    // ========================================================================

    /// Authenticate the dashboard user (OAuth2 password grant, form-encoded)
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, EngageError> {
        let params = [("username", username), ("password", password)];
        self.execute(self.http.post(self.url("/user/auth/login")).form(&params))
            .await
    }

    /// Create a dashboard account; the service answers with a ready session
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthResponse, EngageError> {
        let body = serde_json::json!({
            "email": email,
            "username": username,
            "password": password,
            "name": name,
        });
        self.post("/user/auth/register", &body).await
    }

    /// Invalidate the session token server-side. A client without a token
    /// has nothing to invalidate.
    pub async fn logout(&self) -> Result<(), EngageError> {
        let token = match &self.access_token {
            Some(token) => token.clone(),
            None => return Ok(()),
        };
        let _: serde_json::Value = self
            .post("/user/auth/logout", &serde_json::json!({ "token": token }))
            .await?;
        debug!("session token invalidated");
        Ok(())
    }
}

// ============================================================================
// Link Backend Implementation
// ============================================================================

#[async_trait]
impl LinkBackend for ApiClient {
    async fn begin_link(&self) -> Result<LinkRequest, EngageError> {
        let response: BeginLinkResponse = self.post_empty("/user/auth/external/request").await?;
        debug!(request_id = response.request_id, "link request created");
        Ok(LinkRequest::new(response.request_id))
    }

    async fn link_status(&self, request_id: &str) -> Result<LinkStatus, EngageError> {
        self.get(&format!("/user/auth/external/status/{}", request_id))
            .await
    }

    async fn complete_link(
        &self,
        request_id: &str,
        credentials: &Credentials,
    ) -> Result<LinkResult, EngageError> {
        self.post(
            &format!("/user/auth/external/authenticate/{}", request_id),
            credentials,
        )
        .await
    }

    async fn linked_accounts(&self) -> Result<Vec<LinkedAccount>, EngageError> {
        self.get("/user/linked-accounts").await
    }

    async fn remove_account(&self, username: &str) -> Result<bool, EngageError> {
        let response: RemoveAccountResponse = self
            .delete(&format!("/user/linked-accounts/{}", username))
            .await?;
        Ok(response.success)
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: String,
}

#[derive(Deserialize)]
struct BeginLinkResponse {
    request_id: String,
}

#[derive(Deserialize)]
struct RemoveAccountResponse {
    success: bool,
}
