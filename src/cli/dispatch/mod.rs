use crate::cli::{
    actions::{login, Action},
    commands::{
        ARG_API_URL, ARG_CHECK_INTERVAL, ARG_CODE, ARG_PASSWORD, ARG_TOKEN_FILE, ARG_USERNAME,
    },
    globals::GlobalArgs,
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::time::Duration;

fn globals(matches: &clap::ArgMatches) -> Result<GlobalArgs> {
    let api_url = matches
        .get_one::<String>(ARG_API_URL)
        .cloned()
        .context("missing required argument: --api-url")?;

    let mut globals = GlobalArgs::new(api_url);
    if let Some(token_file) = matches.get_one::<String>(ARG_TOKEN_FILE) {
        globals.token_file = token_file.into();
    }
    if let Some(seconds) = matches.get_one::<u64>(ARG_CHECK_INTERVAL) {
        globals.check_interval = Duration::from_secs(*seconds);
    }
    Ok(globals)
}

/// # Errors
/// Returns an error if required arguments are missing or the subcommand is unknown.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let globals = globals(matches)?;

    match matches.subcommand() {
        Some(("status", _)) => Ok(Action::Status(globals)),
        Some(("login", sub_m)) => {
            let username = sub_m
                .get_one::<String>(ARG_USERNAME)
                .cloned()
                .context("missing required argument: --username")?;
            let password = sub_m
                .get_one::<String>(ARG_PASSWORD)
                .cloned()
                .map(SecretString::from)
                .context("missing required argument: --password")?;
            let code = sub_m.get_one::<String>(ARG_CODE).cloned();

            Ok(Action::Login(login::Args {
                globals,
                username,
                password,
                code,
            }))
        }
        Some(("logout", _)) => Ok(Action::Logout(globals)),
        Some(("watch", _)) => Ok(Action::Watch(globals)),
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}
