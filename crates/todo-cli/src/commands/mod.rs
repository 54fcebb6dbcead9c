//! CLI command implementations.

mod auth;
mod shell;
mod todos;

pub use auth::{login, logout, signup, status};
pub use shell::shell;
pub use todos::{add, delete, list, toggle};

use anyhow::Result;
use std::io::{self, Write};

/// Read one line from stdin without blocking the runtime.
async fn prompt_line(label: &str) -> Result<String> {
    let label = label.to_string();
    let line = tokio::task::spawn_blocking(move || -> io::Result<String> {
        print!("{}", label);
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await??;
    Ok(line)
}

/// Read a password without echo.
async fn prompt_password(label: &str) -> Result<String> {
    let label = label.to_string();
    let password = tokio::task::spawn_blocking(move || rpassword::prompt_password(label)).await??;
    Ok(password)
}
