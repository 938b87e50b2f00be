//! `reqwest` client for the console API auth endpoints. Request bodies carry
//! passwords, codes and tokens, so they are never logged.

use super::{AuthBackend, AuthGrant, BackendError, Credentials, LoginResponse, LoginWire};
use crate::APP_USER_AGENT;
use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const LOGIN_PATH: &str = "auth/login";
const VERIFY_TWO_FACTOR_PATH: &str = "auth/verify-2fa";
const LOGOUT_PATH: &str = "auth/logout";

#[derive(Clone, Debug)]
pub struct HttpAuthBackend {
    client: Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl HttpAuthBackend {
    /// # Errors
    /// Returns an error if `api_url` is not a valid base URL or the HTTP client
    /// cannot be built.
    pub fn new(api_url: &str) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(api_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(path)?)
    }
}

/// Relative joins drop the last path segment unless the base ends in `/`.
fn normalize_base_url(api_url: &str) -> Result<Url, url::ParseError> {
    let trimmed = api_url.trim();
    if trimmed.ends_with('/') {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("{trimmed}/"))
    }
}

async fn error_for_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    Err(BackendError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Transport failures stay `Network`; a body that does not decode is `InvalidResponse`.
async fn read_wire(response: Response) -> Result<LoginWire, BackendError> {
    let body = error_for_status(response).await?.text().await?;
    LoginWire::from_body(&body)
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    #[instrument(skip_all, fields(username = %credentials.username))]
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, BackendError> {
        let url = self.endpoint(LOGIN_PATH)?;
        let body = json!({
            "username": credentials.username,
            "password": credentials.password.expose_secret(),
        });

        let response = self.client.post(url).json(&body).send().await?;
        let wire = read_wire(response).await?;
        debug!("login response received");
        wire.into_login_response()
    }

    #[instrument(skip_all)]
    async fn verify_two_factor(
        &self,
        temp_token: &SecretString,
        code: &str,
    ) -> Result<AuthGrant, BackendError> {
        let url = self.endpoint(VERIFY_TWO_FACTOR_PATH)?;
        let body = json!({
            "tempToken": temp_token.expose_secret(),
            "code": code,
        });

        let response = self.client.post(url).json(&body).send().await?;
        let wire = read_wire(response).await?;
        wire.into_grant()
    }

    #[instrument(skip_all)]
    async fn logout(&self, token: Option<&SecretString>) -> Result<(), BackendError> {
        let url = self.endpoint(LOGOUT_PATH)?;
        let mut request = self.client.post(url);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }
        error_for_status(request.send().await?).await?;
        Ok(())
    }
}
