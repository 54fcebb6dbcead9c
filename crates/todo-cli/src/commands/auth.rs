//! Authentication commands.

use super::{prompt_line, prompt_password};
use crate::app::App;
use crate::output::{self, OutputFormat, Reported};
use anyhow::Result;

/// Credentials from flags, falling back to prompts.
async fn credentials(email: Option<String>, password: Option<String>) -> Result<(String, String)> {
    let email = match email {
        Some(email) => email,
        None => prompt_line("Email: ").await?,
    };
    let password = match password {
        Some(password) => password,
        None => prompt_password("Password: ").await?,
    };
    Ok((email, password))
}

pub async fn signup(
    mut app: App,
    email: Option<String>,
    password: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    app.restore().await?;
    let (email, password) = credentials(email, password).await?;

    let result = app.sessions.sign_up(&email, &password).await;
    output::flush_notices(&mut app.notices, format);
    result.map_err(|_| Reported.into())
}

pub async fn login(
    mut app: App,
    email: Option<String>,
    password: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    if let Some(session) = app.restore().await? {
        let who = session.email.as_deref().unwrap_or(&session.user_id);
        output::print_success(&format!("Already signed in as {}", who), format);
        return Ok(());
    }

    let (email, password) = credentials(email, password).await?;
    let result = app.sessions.sign_in(&email, &password).await;
    output::flush_notices(&mut app.notices, format);
    result.map(|_| ()).map_err(|_| Reported.into())
}

pub async fn logout(mut app: App, format: OutputFormat) -> Result<()> {
    if app.restore().await?.is_none() {
        output::print_success("Not signed in", format);
        return Ok(());
    }

    let result = app.sessions.sign_out().await;
    if result.is_ok() {
        app.sync.stop().await;
    }
    output::flush_notices(&mut app.notices, format);
    result.map_err(|_| Reported.into())
}

pub async fn status(app: App, format: OutputFormat) -> Result<()> {
    let session = app.restore().await?;

    match format {
        OutputFormat::Text => match &session {
            Some(session) => {
                output::print_row("Auth", "signed in");
                output::print_row("User ID", &session.user_id);
                output::print_row("Email", session.email.as_deref().unwrap_or("unknown"));
            }
            None => output::print_row("Auth", "not signed in"),
        },
        OutputFormat::Json => {
            let json = serde_json::json!({
                "authenticated": session.is_some(),
                "user_id": session.as_ref().map(|s| &s.user_id),
                "email": session.as_ref().and_then(|s| s.email.as_ref()),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}
