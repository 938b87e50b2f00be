pub mod login;
pub mod logout;
pub mod status;
pub mod watch;

// Internal "interpreter" for `Action`.
mod run;

use crate::cli::globals::GlobalArgs;
use crate::session::Session;
use time::format_description::well_known::Rfc3339;

#[derive(Debug)]
pub enum Action {
    Status(GlobalArgs),
    Login(login::Args),
    Logout(GlobalArgs),
    Watch(GlobalArgs),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

/// One-line human summary of a session for terminal output.
#[must_use]
pub fn describe(session: &Session) -> String {
    match session {
        Session::Anonymous | Session::Expired => "signed out".to_string(),
        Session::TwoFactorPending(challenge) => {
            let mut line = format!(
                "two-factor verification pending ({})",
                challenge.setup_reason
            );
            if let Some(user_id) = &challenge.user_id {
                line.push_str(&format!(", user id {user_id}"));
            }
            line
        }
        Session::Authenticated(session) => {
            let expires_at = session
                .expires_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| session.expires_at.to_string());
            let role = session
                .user
                .role
                .as_ref()
                .map_or("no role", |role| role.name.as_str());
            format!(
                "signed in as {} ({role}), token expires {expires_at}",
                session.user.username
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AuthenticatedSession, Role, User, UserId};
    use secrecy::SecretString;
    use time::OffsetDateTime;

    #[test]
    fn test_describe_authenticated() {
        let session = Session::Authenticated(AuthenticatedSession {
            user: User {
                id: UserId::from(1),
                username: "admin".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                role: Some(Role {
                    name: "ADMIN".to_string(),
                    permissions: ["ADMIN".to_string()].into_iter().collect(),
                }),
            },
            token: SecretString::from("tok"),
            expires_at: OffsetDateTime::UNIX_EPOCH,
        });
        assert_eq!(
            describe(&session),
            "signed in as admin (ADMIN), token expires 1970-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_describe_signed_out() {
        assert_eq!(describe(&Session::Anonymous), "signed out");
        assert_eq!(describe(&Session::Expired), "signed out");
    }
}
