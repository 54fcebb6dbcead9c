//! Session Manager for the todo-sync client.
//!
//! Tracks who is signed in, persists platform tokens between runs, and tells
//! subscribers about every identity change:
//! - Startup restore of a persisted session (verify or refresh once)
//! - Email/password sign-up, sign-in and sign-out
//! - Access tokens on demand, refreshed when expired
//! - Explicit FSM-based auth state

mod auth_fsm;
mod backend;
mod error;
mod events;
mod manager;

pub use auth_fsm::auth_machine;
pub use auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, AuthState, AuthView};
pub use backend::AuthBackend;
pub use error::{AuthError, AuthResult};
pub use events::{AuthCallback, AuthEvent, AuthSubscription};
pub use manager::{Session, SessionManager, MISSING_CREDENTIALS, SIGNED_IN, SIGNED_OUT, SIGNED_UP};
