use crate::cli::globals::GlobalArgs;
use anyhow::Result;
use tracing::debug;

/// # Errors
/// Returns an error if the session cannot be wired up. Remote logout failures
/// are logged and do not fail the command.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let session = globals.orchestrator()?;
    session.initialize();

    if !session.session().is_authenticated() {
        debug!("no stored session, clearing local state only");
    }
    session.logout().await;
    println!("signed out");

    session.shutdown();
    Ok(())
}
