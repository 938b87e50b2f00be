//! Session and user types. Token material is held as `SecretString` so it never
//! shows up in `Debug` output or logs.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use time::OffsetDateTime;

/// Default two-factor setup reason when the API does not send one.
pub const DEFAULT_SETUP_REASON: &str = "STANDARD";

/// User identifier. The API sends either a number or a string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawUserId", into = "String")]
pub struct UserId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserId {
    Number(i64),
    Text(String),
}

impl From<RawUserId> for UserId {
    fn from(raw: RawUserId) -> Self {
        match raw {
            RawUserId::Number(value) => Self(value.to_string()),
            RawUserId::Text(value) => Self(value),
        }
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl UserId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// The API sends `null` for empty optional values; treat it like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permissions: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Discriminant of [`Session`], used for comparisons and redirect snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Anonymous,
    TwoFactorPending,
    Authenticated,
    Expired,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Anonymous => "anonymous",
            Self::TwoFactorPending => "two_factor_pending",
            Self::Authenticated => "authenticated",
            Self::Expired => "expired",
        };
        formatter.write_str(label)
    }
}

/// Credentials accepted, second factor outstanding.
#[derive(Clone, Debug)]
pub struct TwoFactorChallenge {
    /// Never empty; the orchestrator rejects login responses without one.
    pub temp_token: SecretString,
    pub user_id: Option<UserId>,
    pub message: Option<String>,
    /// First-time TOTP setups may omit the QR code on purpose.
    pub qr_code_url: Option<String>,
    pub manual_entry_key: Option<String>,
    pub is_new_setup: bool,
    pub setup_reason: String,
    pub requires_new_configuration: bool,
}

impl TwoFactorChallenge {
    #[must_use]
    pub fn has_qr_code(&self) -> bool {
        self.qr_code_url.is_some()
    }
}

/// A fully authenticated session. The user is owned here and dropped on any
/// transition out of `Authenticated`.
#[derive(Clone, Debug)]
pub struct AuthenticatedSession {
    pub user: User,
    pub token: SecretString,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone, Debug, Default)]
pub enum Session {
    #[default]
    Anonymous,
    TwoFactorPending(TwoFactorChallenge),
    Authenticated(AuthenticatedSession),
    /// Transient marker while forced-expiry side effects run; normalized to
    /// `Anonymous` before the transition returns.
    Expired,
}

impl Session {
    #[must_use]
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Anonymous => SessionKind::Anonymous,
            Self::TwoFactorPending(_) => SessionKind::TwoFactorPending,
            Self::Authenticated(_) => SessionKind::Authenticated,
            Self::Expired => SessionKind::Expired,
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(session) => Some(&session.user),
            _ => None,
        }
    }

    #[must_use]
    pub fn challenge(&self) -> Option<&TwoFactorChallenge> {
        match self {
            Self::TwoFactorPending(challenge) => Some(challenge),
            _ => None,
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        match self {
            Self::Authenticated(session) => Some(session.expires_at),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_numbers_and_strings() {
        let numeric: UserId = serde_json::from_str("7").expect("numeric id");
        let text: UserId = serde_json::from_str("\"u-7\"").expect("string id");
        assert_eq!(numeric.as_str(), "7");
        assert_eq!(text.as_str(), "u-7");
    }

    #[test]
    fn user_deserializes_camel_case_with_optional_role() {
        let user: User = serde_json::from_str(
            r#"{"id":1,"username":"admin","firstName":"Ada","lastName":"L","role":{"name":"ADMIN","permissions":["ADMIN"]}}"#,
        )
        .expect("user");
        assert_eq!(user.first_name, "Ada");
        let role = user.role.expect("role");
        assert!(role.permissions.contains("ADMIN"));

        let bare: User =
            serde_json::from_str(r#"{"id":"2","username":"clerk"}"#).expect("bare user");
        assert!(bare.role.is_none());
        assert!(bare.first_name.is_empty());
    }

    #[test]
    fn null_optional_fields_fall_back_to_defaults() {
        let user: User = serde_json::from_str(
            r#"{"id":3,"username":"bursar","firstName":null,"lastName":null,"role":{"name":"BURSAR","permissions":null}}"#,
        )
        .expect("user with nulls");
        assert!(user.first_name.is_empty());
        assert!(user.last_name.is_empty());
        let role = user.role.expect("role");
        assert_eq!(role.name, "BURSAR");
        assert!(role.permissions.is_empty());

        let no_role: User =
            serde_json::from_str(r#"{"id":4,"username":"guest","role":null}"#).expect("null role");
        assert!(no_role.role.is_none());
    }

    #[test]
    fn session_accessors_only_expose_the_active_variant() {
        let pending = Session::TwoFactorPending(TwoFactorChallenge {
            temp_token: SecretString::from("T1"),
            user_id: Some(UserId::from(7)),
            message: None,
            qr_code_url: None,
            manual_entry_key: None,
            is_new_setup: false,
            setup_reason: DEFAULT_SETUP_REASON.to_string(),
            requires_new_configuration: false,
        });
        assert_eq!(pending.kind(), SessionKind::TwoFactorPending);
        assert!(pending.user().is_none());
        assert!(pending.expires_at().is_none());
        assert!(pending.challenge().is_some_and(|c| !c.has_qr_code()));
        assert_eq!(Session::default().kind(), SessionKind::Anonymous);
    }
}
