//! todo-sync - a live-synced todo list in the terminal.

mod app;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use todo_config_and_utils::{init_logging, Config, Paths};
use tracing::{debug, error};

/// Personal todo list backed by a hosted database, kept live across sessions.
#[derive(Parser)]
#[command(name = "todo-sync")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account (does not sign in)
    Signup {
        #[arg(long, env = "TODO_SYNC_EMAIL")]
        email: Option<String>,
        #[arg(long, env = "TODO_SYNC_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in with email and password
    Login {
        #[arg(long, env = "TODO_SYNC_EMAIL")]
        email: Option<String>,
        #[arg(long, env = "TODO_SYNC_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show who is signed in
    Status,

    /// List todos, newest first
    List,

    /// Add a todo
    Add {
        /// Todo title
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Toggle a todo between open and done
    Toggle {
        /// List position, id, or id prefix
        id: String,
    },

    /// Delete a todo
    Delete {
        /// List position, id, or id prefix
        id: String,
    },

    /// Interactive live view (default)
    Shell,
}

async fn run(cli: Cli) -> Result<()> {
    let paths = Paths::new()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging("cli", level, Some(paths.log_file()));
    debug!(config_file = %paths.config_file().display(), "Configuration loaded");

    let app = app::App::build(&config, &paths)?;
    let format = cli.format;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Signup { email, password } => {
            commands::signup(app, email, password, format).await
        }
        Commands::Login { email, password } => commands::login(app, email, password, format).await,
        Commands::Logout => commands::logout(app, format).await,
        Commands::Status => commands::status(app, format).await,
        Commands::List => commands::list(app, format).await,
        Commands::Add { title } => commands::add(app, title, format).await,
        Commands::Toggle { id } => commands::toggle(app, &id, format).await,
        Commands::Delete { id } => commands::delete(app, &id, format).await,
        Commands::Shell => commands::shell(app, format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        if e.downcast_ref::<output::Reported>().is_none() {
            error!(error = %e, "Command failed");
            output::print_error(&format!("{:#}", e), format);
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_shell() {
        let cli = Cli::parse_from(["todo-sync"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.format, output::OutputFormat::Text);
    }

    #[test]
    fn test_add_joins_words() {
        let cli = Cli::parse_from(["todo-sync", "--format", "json", "add", "Buy", "milk"]);
        match cli.command {
            Some(Commands::Add { title }) => assert_eq!(title.join(" "), "Buy milk"),
            _ => panic!("expected add"),
        }
        assert_eq!(cli.format, output::OutputFormat::Json);
    }
}
