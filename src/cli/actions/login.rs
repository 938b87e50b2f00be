use crate::backend::Credentials;
use crate::cli::{actions::describe, globals::GlobalArgs};
use crate::session::{SessionKind, SessionOrchestrator};
use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub username: String,
    pub password: SecretString,
    pub code: Option<String>,
}

/// Sign in and, when the API asks for it, verify the second factor.
/// # Errors
/// Returns an error if sign-in or verification fails.
pub async fn execute(args: Args) -> Result<()> {
    let session = args.globals.orchestrator()?;
    session.initialize();

    let result = sign_in(&session, &args).await;
    session.shutdown();
    result?;

    println!("{}", describe(&session.session()));
    Ok(())
}

async fn sign_in(session: &SessionOrchestrator, args: &Args) -> Result<()> {
    let credentials = Credentials::new(args.username.clone(), args.password.clone());
    let kind = session
        .login(&credentials)
        .await
        .context("login failed")?;

    if kind != Some(SessionKind::TwoFactorPending) {
        return Ok(());
    }

    if let Some(challenge) = session.session().challenge() {
        if let Some(message) = &challenge.message {
            println!("{message}");
        }
        if challenge.is_new_setup || challenge.requires_new_configuration {
            if let Some(url) = &challenge.qr_code_url {
                println!("Scan this QR code with your authenticator app: {url}");
            }
            if let Some(key) = &challenge.manual_entry_key {
                println!("Or enter this key manually: {key}");
            }
        }
    }

    let code = match &args.code {
        Some(code) => code.clone(),
        None => prompt_code().await?,
    };
    if code.is_empty() {
        bail!("two-factor code is required");
    }

    session
        .verify_two_factor(&code)
        .await
        .context("two-factor verification failed")?;
    Ok(())
}

async fn prompt_code() -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Two-factor code: ").await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read two-factor code")?;
    Ok(line.trim().to_string())
}
