//! Remote authentication API contract. Credential checks, TOTP validation and
//! token issuance all happen behind this trait; the session core only sees the
//! typed results.
//!
//! The wire format signals the outcome through optional fields (`success`, `requireTwoFactor`,
//! `token`); [`LoginWire`] turns that into the tagged [`LoginResponse`] so the
//! orchestrator can match exhaustively.

mod http;

pub use http::HttpAuthBackend;

use crate::session::types::{
    null_as_default, TwoFactorChallenge, User, UserId, DEFAULT_SETUP_REASON,
};
use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Login form input. The password never leaves this struct unredacted except
/// when serialized into the request body.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// A bearer token plus its user, as issued after full authentication.
#[derive(Clone, Debug)]
pub struct AuthGrant {
    pub token: SecretString,
    pub user: User,
}

#[derive(Clone, Debug)]
pub enum LoginResponse {
    Authenticated(AuthGrant),
    TwoFactorRequired(TwoFactorChallenge),
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// # Errors
    /// Returns an error on invalid credentials or transport failure.
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, BackendError>;

    /// # Errors
    /// Returns an error on a wrong code, an expired temporary token or transport failure.
    async fn verify_two_factor(
        &self,
        temp_token: &SecretString,
        code: &str,
    ) -> Result<AuthGrant, BackendError>;

    /// Best effort; callers log failures and carry on.
    ///
    /// # Errors
    /// Returns an error if the remote session could not be invalidated.
    async fn logout(&self, token: Option<&SecretString>) -> Result<(), BackendError>;
}

/// Raw login/verify body as the API sends it.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct LoginWire {
    #[serde(deserialize_with = "null_as_default")]
    success: bool,
    #[serde(deserialize_with = "null_as_default")]
    require_two_factor: bool,
    token: Option<String>,
    user: Option<User>,
    temp_token: Option<String>,
    user_id: Option<UserId>,
    message: Option<String>,
    qr_code_url: Option<String>,
    manual_entry_key: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    is_new_setup: bool,
    setup_reason: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    requires_new_configuration: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

impl LoginWire {
    pub(crate) fn from_body(body: &str) -> Result<Self, BackendError> {
        serde_json::from_str(body).map_err(|err| BackendError::InvalidResponse(err.to_string()))
    }

    fn failure_message(&self, fallback: &str) -> String {
        self.message
            .clone()
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub(crate) fn into_grant(self) -> Result<AuthGrant, BackendError> {
        if !self.success {
            return Err(BackendError::InvalidResponse(
                self.failure_message("authentication was not successful"),
            ));
        }
        match (non_empty(self.token), self.user) {
            (Some(token), Some(user)) => Ok(AuthGrant {
                token: SecretString::from(token),
                user,
            }),
            _ => Err(BackendError::InvalidResponse(
                "response carries no token or user".to_string(),
            )),
        }
    }

    pub(crate) fn into_login_response(self) -> Result<LoginResponse, BackendError> {
        if !self.success {
            return Err(BackendError::InvalidResponse(
                self.failure_message("login was not successful"),
            ));
        }
        if !self.require_two_factor {
            return self.into_grant().map(LoginResponse::Authenticated);
        }

        // An empty temp token is kept as-is; the orchestrator refuses it.
        Ok(LoginResponse::TwoFactorRequired(TwoFactorChallenge {
            temp_token: SecretString::from(self.temp_token.unwrap_or_default()),
            user_id: self.user_id,
            message: non_empty(self.message),
            qr_code_url: non_empty(self.qr_code_url),
            manual_entry_key: non_empty(self.manual_entry_key),
            is_new_setup: self.is_new_setup,
            setup_reason: non_empty(self.setup_reason)
                .unwrap_or_else(|| DEFAULT_SETUP_REASON.to_string()),
            requires_new_configuration: self.requires_new_configuration,
        }))
    }
}
