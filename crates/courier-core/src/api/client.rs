use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use courier_types::TokenPair;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::debug_trace::DebugTrace;
use super::error::{ApiError, ApiErrorKind, ApiResult, classify_reqwest_error};
use crate::config::{ApiSettings, DEFAULT_BASE_URL};
use crate::session::CredentialStore;

pub const USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

const REFRESH_PATH: &str = "/api/auth/refresh";

/// Authenticated client for the courier backend.
///
/// Cloning is cheap; clones share the connection pool and the session store.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    credentials: Arc<CredentialStore>,
    refresh_on_unauthorized: bool,
    cancel: CancellationToken,
}

/// One outgoing call. The body is encoded up front so a retry resends the same bytes.
pub(crate) struct ApiRequest<'a> {
    method: Method,
    path: &'a str,
    body: Option<Vec<u8>>,
    authenticated: bool,
}

impl<'a> ApiRequest<'a> {
    pub(crate) fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            body: None,
            authenticated: true,
        }
    }

    pub(crate) fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ApiResult<Self> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ApiError::encoding(format!("Failed to encode request body: {e}")))?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Sends without a bearer header (login and refresh).
    pub(crate) fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

impl ApiClient {
    /// Creates a client bound to `credentials`.
    ///
    /// # Panics
    /// - In test builds (`#[cfg(test)]`), panics if `base_url` is the production API.
    /// - At runtime, panics if `COURIER_BLOCK_REAL_API=1` and `base_url` is the production API.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &ApiSettings, credentials: Arc<CredentialStore>) -> Result<Self> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();

        // Compile-time guard for unit tests
        #[cfg(test)]
        assert!(
            base_url != DEFAULT_BASE_URL,
            "Tests must not use the production courier API!\n\
             Point ApiSettings::base_url at a mock server (e.g., wiremock)."
        );

        // Runtime guard for integration tests (set COURIER_BLOCK_REAL_API=1 in test harness)
        #[cfg(not(test))]
        assert!(
            !(std::env::var("COURIER_BLOCK_REAL_API").is_ok_and(|v| v == "1")
                && base_url == DEFAULT_BASE_URL),
            "COURIER_BLOCK_REAL_API=1 but trying to use the production courier API!\n\
             Set COURIER_BASE_URL to a mock server."
        );

        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            http,
            credentials,
            refresh_on_unauthorized: settings.refresh_on_unauthorized,
            cancel: CancellationToken::new(),
        })
    }

    /// Returns a client whose requests are abandoned once `owner` is cancelled.
    ///
    /// A cancelled request resolves to `ApiErrorKind::Cancelled`; whatever the
    /// server sends afterwards is dropped.
    #[must_use]
    pub fn scoped(&self, owner: &CancellationToken) -> Self {
        Self {
            cancel: owner.child_token(),
            ..self.clone()
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends `request` and decodes a JSON body.
    pub(crate) async fn execute<T: DeserializeOwned>(&self, request: ApiRequest<'_>) -> ApiResult<T> {
        let body = self.send_guarded(&request).await?;
        decode_body(request.path, &body)
    }

    /// Sends `request` and ignores the body.
    pub(crate) async fn execute_unit(&self, request: ApiRequest<'_>) -> ApiResult<()> {
        self.send_guarded(&request).await.map(drop)
    }

    async fn send_guarded(&self, request: &ApiRequest<'_>) -> ApiResult<Vec<u8>> {
        if self.cancel.is_cancelled() {
            return Err(ApiError::cancelled());
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::debug!(method = %request.method, path = request.path, "Request cancelled by owner");
                Err(ApiError::cancelled())
            }
            result = self.send_with_refresh(request) => result,
        }
    }

    /// Sends once; on 401 with refresh enabled, rotates tokens and sends exactly one more time.
    async fn send_with_refresh(&self, request: &ApiRequest<'_>) -> ApiResult<Vec<u8>> {
        let err = match self.send_once(request).await {
            Err(err)
                if err.is_unauthorized()
                    && request.authenticated
                    && self.refresh_on_unauthorized =>
            {
                err
            }
            other => return other,
        };

        let Some(refresh_token) = self.credentials.refresh_token() else {
            tracing::debug!(path = request.path, "401 without a refresh token; not retrying");
            return Err(err);
        };

        tracing::info!(path = request.path, "Access token rejected; refreshing once");
        if !self.rotate_tokens(&refresh_token).await? {
            tracing::info!(path = request.path, "Session changed during refresh; not retrying");
            return Err(err);
        }
        self.send_once(request).await
    }

    /// Exchanges `refresh_token` for new tokens and stores them in one transaction.
    ///
    /// Returns false when the session moved on (logout or another rotation)
    /// while the refresh was in flight; the new tokens are then discarded.
    async fn rotate_tokens(&self, refresh_token: &str) -> ApiResult<bool> {
        let pair = self.refresh(refresh_token).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Token refresh failed");
        })?;

        let store = Arc::clone(&self.credentials);
        let expected = refresh_token.to_string();
        tokio::task::spawn_blocking(move || store.apply_refresh(&expected, &pair))
            .await
            .map_err(|e| {
                ApiError::new(ApiErrorKind::Persistence, format!("Token update aborted: {e}"))
            })?
            .map_err(|e| {
                ApiError::new(ApiErrorKind::Persistence, e.to_string())
                    .with_details(format!("{:#}", anyhow::Error::new(e)))
            })
    }

    /// Calls the refresh endpoint without touching the store.
    ///
    /// # Errors
    /// Returns the usual `ApiError` kinds.
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RefreshBody<'a> {
            refresh_token: &'a str,
        }

        let request = ApiRequest::new(Method::POST, REFRESH_PATH)
            .json(&RefreshBody { refresh_token })?
            .unauthenticated();
        let body = self.send_once(&request).await?;
        decode_body(REFRESH_PATH, &body)
    }

    async fn send_once(&self, request: &ApiRequest<'_>) -> ApiResult<Vec<u8>> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header(ACCEPT, "application/json");

        if request.authenticated {
            // Read per request so a rotated token applies to the very next call.
            match self.credentials.access_token() {
                Some(token) => builder = builder.bearer_auth(token),
                None => tracing::debug!(path = request.path, "No access token; sending without credentials"),
            }
        }

        let trace =
            DebugTrace::from_env(request.method.as_str(), request.path, request.authenticated);
        if let Some(body) = &request.body {
            if let Some(trace) = &trace {
                trace.write_request(body);
            }
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let started = Instant::now();
        let response = builder.send().await.map_err(|e| {
            let err = classify_reqwest_error(&e);
            tracing::warn!(method = %request.method, path = request.path, error = %err, "Request failed");
            err
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(&e))?
            .to_vec();

        tracing::debug!(
            method = %request.method,
            path = request.path,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "API response"
        );
        if let Some(trace) = &trace {
            trace.write_response(status.as_u16(), &body);
        }

        if !status.is_success() {
            return Err(ApiError::http_status(
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }
        Ok(body)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("refresh_on_unauthorized", &self.refresh_on_unauthorized)
            .finish_non_exhaustive()
    }
}

fn decode_body<T: DeserializeOwned>(path: &str, body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(path, error = %e, "Response did not match the expected shape");
        ApiError::deserialization(format!("Unexpected response from {path}: {e}"))
            .with_details(String::from_utf8_lossy(body).into_owned())
    })
}
