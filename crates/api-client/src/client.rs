//! PhotoChain API client.
//!
//! Async HTTP client using `reqwest`. Image and failure-simulation calls
//! carry the session's bearer token; chain reads and mining do not.

use std::sync::Arc;
use std::time::Duration;

use photochain_protocol::constants::{
    CHAIN_PATH, GET_IMAGE_PATH, IMAGE_FIELD, LOGIN_PATH, MINE_PATH, PROCESS_IMAGE_PATH,
    REGISTER_PATH, SIMULATE_FAILURE_PATH, UPLOAD_IMAGE_PATH,
};
use photochain_protocol::{
    ChainAck, ChainSnapshot, ErrorBody, FailureKind, LoginRequest, LoginResponse, MineAck,
    RegisterResponse, SimulateFailureRequest, UploadReceipt,
};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::file::CandidateFile;
use crate::session::{Session, SessionStore};

/// Client for the user and blockchain services of one backend node.
#[derive(Clone)]
pub struct PhotoApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl PhotoApiClient {
    /// Creates a client for `base_url` using the transport's default timeouts.
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http(http, base_url, session))
    }

    /// Creates a client whose requests time out after `timeout`.
    pub fn with_timeout(
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http(http, base_url, session))
    }

    /// Wraps an existing `reqwest` client.
    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    // -----------------------------------------------------------------------
    // Image pipeline
    // -----------------------------------------------------------------------

    /// Stores the image in the user service.
    pub async fn upload_image(&self, file: &CandidateFile) -> Result<UploadReceipt, ApiError> {
        let req = self
            .http
            .post(self.url(UPLOAD_IMAGE_PATH))
            .multipart(image_form(file)?);
        let receipt: UploadReceipt = self.send_json(self.authorized(req)?).await?;
        debug!(image_id = ?receipt.image_id, "image stored");
        Ok(receipt)
    }

    /// Submits the same image to the blockchain service as a pending transaction.
    pub async fn register_on_chain(&self, file: &CandidateFile) -> Result<ChainAck, ApiError> {
        let req = self
            .http
            .post(self.url(PROCESS_IMAGE_PATH))
            .multipart(image_form(file)?);
        self.send_json(self.authorized(req)?).await
    }

    /// Mines pending transactions into a block.
    pub async fn mine_block(&self) -> Result<MineAck, ApiError> {
        let ack: MineAck = self.send_json(self.http.get(self.url(MINE_PATH))).await?;
        if let Some(block) = &ack.block {
            debug!(index = block.index, hash = %block.hash, "block mined");
        }
        Ok(ack)
    }

    /// Fetches the whole chain.
    pub async fn fetch_chain(&self) -> Result<ChainSnapshot, ApiError> {
        self.send_json(self.http.get(self.url(CHAIN_PATH))).await
    }

    /// Asks the node at `node_url` to simulate a failure.
    ///
    /// Nodes are separate hosts, so this does not use the client's base URL.
    pub async fn simulate_failure_at(
        &self,
        node_url: &str,
        kind: FailureKind,
    ) -> Result<ChainAck, ApiError> {
        let url = format!(
            "{}{}",
            node_url.trim_end_matches('/'),
            SIMULATE_FAILURE_PATH
        );
        let req = self.http.post(url).json(&SimulateFailureRequest { kind });
        let ack: ChainAck = self.send_json(self.authorized(req)?).await?;
        info!(node = node_url, kind = %kind, "failure simulated");
        Ok(ack)
    }

    /// Downloads a stored image by id.
    pub async fn get_image(&self, image_id: i64) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/{image_id}", self.url(GET_IMAGE_PATH));
        let resp = self.authorized(self.http.get(url))?.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        Ok(resp.bytes().await?.to_vec())
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    /// Creates an account. Does not log in.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<RegisterResponse, ApiError> {
        let req = self
            .http
            .post(self.url(REGISTER_PATH))
            .json(&credentials(username, password));
        self.send_json(req).await
    }

    /// Logs in and stores the returned token in the session store.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let req = self
            .http
            .post(self.url(LOGIN_PATH))
            .json(&credentials(username, password));
        let resp: LoginResponse = self.send_json(req).await?;

        let session = Session {
            username: resp.username.unwrap_or_else(|| username.to_string()),
            token: resp.token,
        };
        self.session.save(session.clone())?;
        info!(user = %session.username, "logged in");
        Ok(session)
    }

    /// Drops the local session. The backend keeps no server-side state.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.session.clear()?;
        info!("logged out");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Adds `Authorization: Bearer <token>` when a session exists.
    ///
    /// A missing token is not an error here; the backend answers 401.
    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        match self.session.token() {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| ApiError::InvalidToken)?;
                Ok(req.header(AUTHORIZATION, value))
            }
            None => Ok(req),
        }
    }

    /// Sends a request and decodes a JSON success body.
    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Builds the multipart form both image endpoints expect.
fn image_form(file: &CandidateFile) -> Result<Form, ApiError> {
    let part = Part::bytes(file.data.clone())
        .file_name(file.name.clone())
        .mime_str(&file.mime_type)?;
    Ok(Form::new().part(IMAGE_FIELD, part))
}

fn credentials(username: &str, password: &str) -> LoginRequest {
    LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
    }
}

/// Maps a non-2xx response to [`ApiError::Api`], preferring the JSON `message`.
fn api_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.summary())
        .unwrap_or_else(|| body.trim().to_string());
    ApiError::Api {
        status: status.as_u16(),
        message,
    }
}
