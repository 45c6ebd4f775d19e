pub mod client;
pub mod error;
pub mod models;

pub use client::{Assembla, AssemblaConfig, DEFAULT_API_URL, DEFAULT_WEB_URL};
pub use error::{ApiError, Result};
pub use models::{
    AttachmentFile, Document, Milestone, NewTicket, Ticket, TicketComment, TicketUpdate, User,
};

use reqwest::multipart::Form;
use reqwest::{redirect, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

const API_KEY_HEADER: &str = "X-Api-Key";
const API_SECRET_HEADER: &str = "X-Api-Secret";
const MAX_REDIRECTS: usize = 3;

/// Timeout applied to ticket calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Key/secret pair sent as headers on every request.
#[derive(Clone, Debug)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    credentials: Option<ApiCredentials>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let mut raw = base_url.as_ref().trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).map_err(ApiError::InvalidUrl)?;

        let client = Client::builder()
            .user_agent(format!("assembla-cli/{}", env!("CARGO_PKG_VERSION")))
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(ApiError::RequestFailed)?;

        Ok(Self {
            client,
            base_url: url,
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some(ApiCredentials {
            key: key.into(),
            secret: secret.into(),
        });
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, Option::<&()>::None).await
    }

    /// GET for collection endpoints. Assembla answers an empty collection
    /// with `204 No Content`, which decodes to an empty list.
    pub async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let req = self.prepare(Method::GET, path)?;
        let response = self.execute(req).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        let body = response.bytes().await.map_err(ApiError::RequestFailed)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&body).map_err(|e| {
            error!("Failed to parse JSON list: {}", e);
            ApiError::InvalidResponse(e.to_string())
        })
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let mut req = self.prepare(method, path)?;
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = self.execute(req).await?;
        Self::decode(response).await
    }

    /// Sends a request whose successful reply carries no meaningful body.
    pub async fn request_empty<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<()> {
        let mut req = self.prepare(method, path)?;
        if let Some(body) = body {
            req = req.json(body);
        }

        self.execute(req).await?;
        Ok(())
    }

    pub async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let req = self.prepare(Method::POST, path)?.multipart(form);
        let response = self.execute(req).await?;
        Self::decode(response).await
    }

    fn prepare(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let joined = self
            .base_url
            .join(path.strip_prefix('/').unwrap_or(path))
            .map_err(ApiError::InvalidUrl)?;

        debug!(method = %method, url = %joined, "Sending request");

        let req = self
            .client
            .request(method, joined)
            .timeout(self.timeout);
        Ok(self.apply_auth(req))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(ApiError::RequestFailed)?;
        let status = response.status();

        match status {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ApiError::AuthenticationFailed {
                    message: "Invalid API key or secret".to_string(),
                })
            }
            StatusCode::NOT_FOUND => Err(ApiError::NotFound {
                resource: response.url().path().to_string(),
            }),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Bad request".to_string());
                Err(ApiError::BadRequest { message })
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60);
                Err(ApiError::RateLimitExceeded { retry_after })
            }
            _ => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| format!("Unexpected status: {}", status));
                Err(ApiError::ServerError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            error!("Failed to parse JSON response: {}", e);
            ApiError::InvalidResponse(e.to_string())
        })
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(ApiCredentials { key, secret }) => request
                .header(API_KEY_HEADER, key)
                .header(API_SECRET_HEADER, secret),
            None => request,
        }
    }
}
