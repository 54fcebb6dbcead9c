//! One-shot todo commands.
//!
//! Each command scopes the synchronizer to the restored session, fetches
//! when it needs to resolve an id, and awaits the mutation it spawns.

use crate::app::App;
use crate::output::{self, OutputFormat, Reported};
use anyhow::{bail, Result};
use todo_sync::{SyncResult, Todo};
use uuid::Uuid;

/// Await a spawned mutation and print its notices.
async fn finish(
    app: &mut App,
    handle: tokio::task::JoinHandle<SyncResult<()>>,
    format: OutputFormat,
) -> Result<()> {
    let result = handle.await?;
    output::flush_notices(&mut app.notices, format);
    result.map_err(|_| Reported.into())
}

async fn fetch(app: &mut App, format: OutputFormat) -> Result<Vec<Todo>> {
    let result = app.sync.fetch().await;
    output::flush_notices(&mut app.notices, format);
    result.map_err(|_| Reported)?;
    Ok(app.sync.list().snapshot())
}

pub async fn list(mut app: App, format: OutputFormat) -> Result<()> {
    app.require_session().await?;
    let todos = fetch(&mut app, format).await?;
    output::print_todos(&todos, format);
    Ok(())
}

pub async fn add(mut app: App, words: Vec<String>, format: OutputFormat) -> Result<()> {
    app.require_session().await?;

    let mut draft = words.join(" ");
    match app.sync.submit_draft(&mut draft) {
        Some(handle) => finish(&mut app, handle, format).await,
        None => bail!("Nothing to add: the title is blank"),
    }
}

pub async fn toggle(mut app: App, reference: &str, format: OutputFormat) -> Result<()> {
    app.require_session().await?;
    let todos = fetch(&mut app, format).await?;
    let todo = resolve(&todos, reference)?;

    let handle = app.sync.toggle(&todo);
    finish(&mut app, handle, format).await?;

    let verb = if todo.completed { "Reopened" } else { "Completed" };
    output::print_success(&format!("{}: {}", verb, todo.title), format);
    Ok(())
}

pub async fn delete(mut app: App, reference: &str, format: OutputFormat) -> Result<()> {
    app.require_session().await?;
    let todos = fetch(&mut app, format).await?;
    let todo = resolve(&todos, reference)?;

    let handle = app.sync.delete(todo.id);
    finish(&mut app, handle, format).await
}

/// Find a todo by list position (1-based), full id, or unique id prefix.
pub(crate) fn resolve(todos: &[Todo], reference: &str) -> Result<Todo> {
    let reference = reference.trim();

    if let Ok(position) = reference.parse::<usize>() {
        if position >= 1 && position <= todos.len() && reference.len() < 8 {
            return Ok(todos[position - 1].clone());
        }
    }

    if let Ok(id) = Uuid::parse_str(reference) {
        return match todos.iter().find(|t| t.id == id) {
            Some(todo) => Ok(todo.clone()),
            None => bail!("No todo with id {}", id),
        };
    }

    let needle = reference.replace('-', "").to_lowercase();
    if needle.is_empty() {
        bail!("Missing todo id");
    }
    let matches: Vec<&Todo> = todos
        .iter()
        .filter(|t| t.id.simple().to_string().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [todo] => Ok((*todo).clone()),
        [] => bail!("No todo matches '{}'", reference),
        many => bail!("'{}' matches {} todos; use more of the id", reference, many.len()),
    }
}
