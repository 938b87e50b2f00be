use crate::cli::{actions::describe, globals::GlobalArgs};
use crate::session::{NavigateOptions, Navigator, RedirectDriver, SessionKind};
use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

/// Stands in for the console router: every navigation becomes the new
/// current location.
struct LocationNavigator {
    location: watch::Sender<String>,
}

impl Navigator for LocationNavigator {
    fn navigate(&self, path: &str, options: NavigateOptions) {
        info!(path, replace = options.replace, "navigate");
        self.location.send_replace(path.to_string());
    }
}

/// Hold the stored session open until it expires, is signed out, or the
/// process is interrupted.
/// # Errors
/// Returns an error if the session cannot be wired up.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let session = globals.orchestrator()?;
    session.initialize();

    if !session.session().is_authenticated() {
        println!("{}", describe(&session.session()));
        session.shutdown();
        return Ok(());
    }
    println!("{}", describe(&session.session()));

    let routes = session.settings().routes.clone();
    let (location_tx, location_rx) = watch::channel(routes.login.clone());
    let driver = RedirectDriver::new(
        routes,
        LocationNavigator {
            location: location_tx,
        },
    );
    let driver_task = tokio::spawn(driver.run(session.subscribe(), location_rx));

    let mut sessions = session.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
                let kind = sessions.borrow_and_update().session.kind();
                if matches!(kind, SessionKind::Anonymous | SessionKind::TwoFactorPending) {
                    println!("session ended: {kind}");
                    break;
                }
            }
        }
    }

    session.shutdown();
    driver_task.abort();
    Ok(())
}
