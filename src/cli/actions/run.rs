use crate::cli::actions::{login, logout, status, watch, Action};
use anyhow::Result;

// Single dispatch point for all CLI actions.
/// Execute the provided action.
///
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Status(globals) => status::execute(globals).await,
        Action::Login(args) => login::execute(args).await,
        Action::Logout(globals) => logout::execute(globals).await,
        Action::Watch(globals) => watch::execute(globals).await,
    }
}
