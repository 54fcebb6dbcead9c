//! Interactive live view.
//!
//! One event loop over terminal input, auth events, list updates and
//! notices. The view follows the session: auth prompt while signed out,
//! the live todo list while signed in.

use super::prompt_password;
use crate::app::App;
use crate::commands::todos::resolve;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_session::{AuthEvent, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum View {
    Loading,
    SignedOut,
    Todos(Session),
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    SignUp(&'a str),
    SignIn(&'a str),
    SignOut,
    Add(&'a str),
    Toggle(&'a str),
    Delete(&'a str),
    Refresh,
    List,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "" => Input::Empty,
        "signup" => Input::SignUp(rest),
        "login" => Input::SignIn(rest),
        "logout" => Input::SignOut,
        "add" | "a" => Input::Add(rest),
        "toggle" | "t" => Input::Toggle(rest),
        "delete" | "d" | "rm" => Input::Delete(rest),
        "refresh" | "r" => Input::Refresh,
        "list" | "ls" => Input::List,
        "help" | "?" => Input::Help,
        "quit" | "q" | "exit" => Input::Quit,
        other => Input::Unknown(other),
    }
}

const SIGNED_OUT_HELP: &str = "Commands: signup <email>, login <email>, quit";
const TODOS_HELP: &str =
    "Commands: add <title>, toggle <n>, delete <n>, refresh, list, logout, quit";

pub async fn shell(app: App, format: OutputFormat) -> Result<()> {
    let App {
        sessions,
        sync,
        mut notices,
    } = app;

    let (auth_tx, mut auth_rx) = mpsc::unbounded_channel::<AuthEvent>();
    let subscription = sessions.on_auth_state_change(move |event| {
        let _ = auth_tx.send(event.clone());
    });

    let mut view = View::Loading;
    println!("Loading...");
    if let Err(e) = sessions.restore().await {
        warn!(error = %e, "Session restore failed");
    }

    let mut list_rx = sync.list().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(event) = auth_rx.recv() => {
                debug!(event = event.name(), "Shell auth event");
                match (&event, event.session()) {
                    (AuthEvent::TokenRefreshed(_), Some(_)) => {
                        if let Ok(token) = sessions.access_token().await {
                            sync.set_access_token(&token).await;
                        }
                    }
                    (_, Some(session)) => {
                        if view != View::Todos(session.clone()) {
                            // The first fetch finishes before the list is shown.
                            if let Err(e) = sync.start(&session.user_id).await {
                                warn!(error = %e, "Todo sync failed to start");
                            }
                            view = View::Todos(session.clone());
                            render(&view, &sync, format);
                            list_rx.mark_unchanged();
                        }
                    }
                    (_, None) => {
                        sync.stop().await;
                        if view != View::SignedOut {
                            view = View::SignedOut;
                            render(&view, &sync, format);
                        }
                    }
                }
            }
            Ok(()) = list_rx.changed() => {
                if matches!(view, View::Todos(_)) {
                    render(&view, &sync, format);
                }
            }
            Some(notice) = notices.recv() => {
                output::print_notice(&notice, format);
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Failed to read input");
                        break;
                    }
                };

                match parse_input(&line) {
                    Input::Quit => break,
                    Input::Empty => {}
                    Input::Help => println!(
                        "{}",
                        if matches!(view, View::Todos(_)) { TODOS_HELP } else { SIGNED_OUT_HELP }
                    ),
                    input => handle(input, &view, &sessions, &sync, format).await,
                }
            }
        }
    }

    info!("Shell exiting");
    sync.stop().await;
    drop(subscription);
    Ok(())
}

async fn handle(
    input: Input<'_>,
    view: &View,
    sessions: &auth_session::SessionManager,
    sync: &todo_sync::TodoSynchronizer,
    format: OutputFormat,
) {
    match (view, input) {
        (View::SignedOut, Input::SignUp(email)) => {
            if let Ok(password) = prompt_password("Password: ").await {
                // Outcome arrives as a notice.
                let _ = sessions.sign_up(email, &password).await;
            }
        }
        (View::SignedOut, Input::SignIn(email)) => {
            if let Ok(password) = prompt_password("Password: ").await {
                let _ = sessions.sign_in(email, &password).await;
            }
        }
        (View::Todos(_), Input::SignOut) => {
            let _ = sessions.sign_out().await;
        }
        (View::Todos(_), Input::Add(title)) => {
            let mut draft = title.to_string();
            // Fire and forget; the change feed brings the result.
            let _ = sync.submit_draft(&mut draft);
        }
        (View::Todos(_), Input::Toggle(reference)) => {
            match resolve(&sync.list().snapshot(), reference) {
                Ok(todo) => drop(sync.toggle(&todo)),
                Err(e) => output::print_error(&e.to_string(), format),
            }
        }
        (View::Todos(_), Input::Delete(reference)) => {
            match resolve(&sync.list().snapshot(), reference) {
                Ok(todo) => drop(sync.delete(todo.id)),
                Err(e) => output::print_error(&e.to_string(), format),
            }
        }
        (View::Todos(session), Input::Refresh) => {
            // A feed that gave up reconnecting is reopened here.
            if sync.is_live().await {
                let _ = sync.fetch().await;
            } else if let Err(e) = sync.start(&session.user_id).await {
                warn!(error = %e, "Todo sync failed to restart");
            }
        }
        (View::Todos(_), Input::List) => render(view, sync, format),
        (View::Loading, _) => output::print_error("Still loading", format),
        (_, Input::Unknown(command)) => {
            output::print_error(&format!("Unknown command '{}'. Type 'help'", command), format)
        }
        (_, _) => output::print_error("Not available here. Type 'help'", format),
    }
}

fn render(view: &View, sync: &todo_sync::TodoSynchronizer, format: OutputFormat) {
    match view {
        View::Loading => println!("Loading..."),
        View::SignedOut => {
            if format == OutputFormat::Text {
                println!();
                println!("Sign in to see your todos.");
                println!("{}", SIGNED_OUT_HELP);
            } else {
                println!("{}", serde_json::json!({"view": "auth"}));
            }
        }
        View::Todos(session) => {
            if format == OutputFormat::Text {
                println!();
                println!(
                    "Todo List ({})",
                    session.email.as_deref().unwrap_or(&session.user_id)
                );
            }
            output::print_todos(&sync.list().snapshot(), format);
        }
    }
}
