//! HTTP gateway to the record service.

use crate::gateway::{PutOutcome, RecordGateway, RemoteRecord, ServerInfo};
use crate::session::Session;
use crate::{LockboxError, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct CredentialsBody<'a> {
    login: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`RecordGateway`] over JSON/HTTP.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    session: Session,
}

impl HttpGateway {
    /// Create a gateway with the default timeout.
    pub fn new(base_url: &str, session: Session) -> Result<Self> {
        Self::with_timeout(base_url, session, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, session: Session, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LockboxError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request carrying the session's bearer token.
    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self
            .session
            .token()
            .ok_or_else(|| LockboxError::Authorization("not logged in".to_string()))?;
        Ok(self.client.request(method, self.url(path)).bearer_auth(token))
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "request to record service failed");
            network_error(e)
        })?;
        debug!(path = response.url().path(), status = %response.status(), "record service response");
        Ok(response)
    }

    async fn auth_request(&self, path: &str, login: &str, password: &str) -> Result<Response> {
        let body = CredentialsBody { login, password };
        Self::send(self.client.post(self.url(path)).json(&body)).await
    }
}

fn network_error(e: reqwest::Error) -> LockboxError {
    LockboxError::Network(e.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await.map_err(network_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| LockboxError::UnexpectedResponse(format!("Invalid response body: {}", e)))
}

/// Server-supplied message, falling back to the status line.
async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    }
}

async fn unexpected(response: Response) -> LockboxError {
    let status = response.status();
    let message = error_message(response).await;
    LockboxError::UnexpectedResponse(format!("{}: {}", status, message))
}

#[async_trait]
impl RecordGateway for HttpGateway {
    async fn list_records(&self) -> Result<Vec<RemoteRecord>> {
        let response = Self::send(self.authorized(Method::GET, "/records")?).await?;
        match response.status() {
            StatusCode::OK => decode(response).await,
            StatusCode::UNAUTHORIZED => Err(LockboxError::Authorization(
                error_message(response).await,
            )),
            _ => Err(unexpected(response).await),
        }
    }

    async fn get_record(&self, id: Uuid) -> Result<RemoteRecord> {
        let path = format!("/records/{}", id);
        let response = Self::send(self.authorized(Method::GET, &path)?).await?;
        match response.status() {
            StatusCode::OK => decode(response).await,
            StatusCode::NOT_FOUND => Err(LockboxError::NotFound(format!("record {}", id))),
            StatusCode::UNAUTHORIZED => Err(LockboxError::Authorization(
                error_message(response).await,
            )),
            _ => Err(unexpected(response).await),
        }
    }

    async fn put_record(&self, record: &RemoteRecord) -> Result<PutOutcome> {
        let path = format!("/records/{}", record.id);
        let request = self.authorized(Method::PUT, &path)?.json(record);
        let response = Self::send(request).await?;
        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(PutOutcome::Accepted),
            // A record the server no longer holds cannot take a later version.
            StatusCode::CONFLICT | StatusCode::NOT_FOUND => Ok(PutOutcome::Conflict),
            StatusCode::BAD_REQUEST => {
                Err(LockboxError::Validation(error_message(response).await))
            }
            StatusCode::UNAUTHORIZED => Err(LockboxError::Authorization(
                error_message(response).await,
            )),
            _ => Err(unexpected(response).await),
        }
    }

    async fn delete_record(&self, id: Uuid) -> Result<()> {
        let path = format!("/records/{}", id);
        let response = Self::send(self.authorized(Method::DELETE, &path)?).await?;
        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::UNAUTHORIZED => Err(LockboxError::Authorization(
                error_message(response).await,
            )),
            _ => Err(unexpected(response).await),
        }
    }

    async fn register(&self, login: &str, password: &str) -> Result<String> {
        let response = self.auth_request("/register", login, password).await?;
        match response.status() {
            StatusCode::OK => Ok(decode::<TokenBody>(response).await?.token),
            StatusCode::BAD_REQUEST => {
                Err(LockboxError::Validation(error_message(response).await))
            }
            StatusCode::CONFLICT => Err(LockboxError::LoginTaken),
            _ => Err(unexpected(response).await),
        }
    }

    async fn login(&self, login: &str, password: &str) -> Result<String> {
        let response = self.auth_request("/login", login, password).await?;
        match response.status() {
            StatusCode::OK => Ok(decode::<TokenBody>(response).await?.token),
            StatusCode::BAD_REQUEST => {
                Err(LockboxError::Validation(error_message(response).await))
            }
            StatusCode::UNAUTHORIZED => Err(LockboxError::Authorization(
                error_message(response).await,
            )),
            _ => Err(unexpected(response).await),
        }
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        let response = Self::send(self.client.get(self.url("/version"))).await?;
        match response.status() {
            StatusCode::OK => decode(response).await,
            _ => Err(unexpected(response).await),
        }
    }
}
