pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_API_URL: &str = "api-url";
pub const ARG_TOKEN_FILE: &str = "token-file";
pub const ARG_CHECK_INTERVAL: &str = "check-interval";
pub const ARG_USERNAME: &str = "username";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_CODE: &str = "code";

pub const DEFAULT_TOKEN_FILE: &str = ".gatehouse/session.json";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("gatehouse")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_API_URL)
                .long("api-url")
                .help("Console API base URL, example: https://school.tld/api")
                .env("GATEHOUSE_API_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_FILE)
                .long("token-file")
                .help("Where the signed-in session is kept between runs")
                .env("GATEHOUSE_TOKEN_FILE")
                .default_value(DEFAULT_TOKEN_FILE),
        )
        .arg(
            Arg::new(ARG_CHECK_INTERVAL)
                .long("check-interval")
                .help("Seconds between token expiry checks")
                .env("GATEHOUSE_CHECK_INTERVAL")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .subcommand(Command::new("status").about("Show the current session"))
        .subcommand(
            Command::new("login")
                .about("Sign in, completing two-factor verification when required")
                .arg(
                    Arg::new(ARG_USERNAME)
                        .short('u')
                        .long("username")
                        .help("Account username")
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_PASSWORD)
                        .short('p')
                        .long("password")
                        .help("Account password")
                        .env("GATEHOUSE_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_CODE)
                        .short('c')
                        .long("code")
                        .help("TOTP code; prompted for when omitted and two-factor is required"),
                ),
        )
        .subcommand(Command::new("logout").about("Sign out and forget the stored session"))
        .subcommand(
            Command::new("watch")
                .about("Keep the session open and follow redirects until it expires"),
        );

    logging::with_args(command)
}
