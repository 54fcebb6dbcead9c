//! Output formatting for the CLI.

use clap::ValueEnum;
use serde_json::json;
use std::io::IsTerminal;
use todo_config_and_utils::{Notice, NoticeLevel, NoticeReceiver};
use todo_sync::Todo;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Returned once a failure has already been printed; `main` only sets the exit code.
#[derive(Debug, thiserror::Error)]
#[error("command failed")]
pub struct Reported;

const STRIKE: &str = "\x1b[9m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub fn print_success(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => println!("{}", json!({"status": "success", "message": message})),
    }
}

pub fn print_error(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => eprintln!("{}", json!({"status": "error", "message": message})),
    }
}

pub fn print_notice(notice: &Notice, format: OutputFormat) {
    match notice.level {
        NoticeLevel::Success => print_success(&notice.message, format),
        NoticeLevel::Error => print_error(&notice.message, format),
    }
}

/// Print every queued notice. Returns `true` if any was an error.
pub fn flush_notices(notices: &mut NoticeReceiver, format: OutputFormat) -> bool {
    let mut failed = false;
    while let Ok(notice) = notices.try_recv() {
        failed |= notice.is_error();
        print_notice(&notice, format);
    }
    failed
}

/// One list line: `  2. [x] Buy milk  (3f2b8c1e)`.
///
/// Completed titles are struck through when `styled`.
pub fn todo_line(index: usize, todo: &Todo, styled: bool) -> String {
    let mark = if todo.completed { "x" } else { " " };
    let title = if todo.completed && styled {
        format!("{STRIKE}{DIM}{}{RESET}", todo.title)
    } else {
        todo.title.clone()
    };
    format!("{:>3}. [{}] {}  ({})", index + 1, mark, title, todo.short_id())
}

pub fn print_todos(todos: &[Todo], format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            if todos.is_empty() {
                println!("No todos yet!");
                return;
            }
            let styled = std::io::stdout().is_terminal();
            for (index, todo) in todos.iter().enumerate() {
                println!("{}", todo_line(index, todo, styled));
            }
        }
        OutputFormat::Json => match serde_json::to_string(todos) {
            Ok(json) => println!("{}", json),
            Err(e) => print_error(&e.to_string(), format),
        },
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("{:<10}{}", format!("{}:", label), value);
}
