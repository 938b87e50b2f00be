use crate::cli::{actions::describe, globals::GlobalArgs};
use anyhow::Result;

/// Hydrate from the token file and print the result.
/// # Errors
/// Returns an error if the session cannot be wired up.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let session = globals.orchestrator()?;
    session.initialize();

    println!("{}", describe(&session.session()));

    session.shutdown();
    Ok(())
}
