//! Authentication state machine using rust-fsm.
//!
//! ```text
//! Loading ──SessionRestored──► Authenticated
//!    │ ──NoSession──────────► Unauthenticated
//!    └──SessionExpired──────► Refreshing
//!
//! Unauthenticated ──SignInAttempt──► SigningIn ──SignInSuccess──► Authenticated
//!                                              ──SignInFailed───► Unauthenticated
//! Unauthenticated ──SignUpAttempt──► SigningUp ──SignUpComplete/Failed──► Unauthenticated
//!
//! Authenticated ──SignOutRequested──► SigningOut ──SignOutComplete──► Unauthenticated
//!                                                ──SignOutFailed────► Authenticated
//! Authenticated ──TokenExpired──────► Refreshing ──RefreshSuccess───► Authenticated
//!                                                ──RefreshFailed────► Unauthenticated
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Loading)

    Loading => {
        // Stored token verified with the server
        SessionRestored => Authenticated,
        // Stored token expired, one refresh attempt follows
        SessionExpired => Refreshing,
        NoSession => Unauthenticated
    },
    Unauthenticated => {
        SignInAttempt => SigningIn,
        SignUpAttempt => SigningUp
    },
    SigningUp => {
        SignUpComplete => Unauthenticated,
        SignUpFailed => Unauthenticated
    },
    SigningIn => {
        SignInSuccess => Authenticated,
        SignInFailed => Unauthenticated
    },
    Authenticated => {
        SignOutRequested => SigningOut,
        TokenExpired => Refreshing
    },
    SigningOut => {
        SignOutComplete => Unauthenticated,
        // Platform refused; the session stays
        SignOutFailed => Authenticated
    },
    Refreshing => {
        RefreshSuccess => Authenticated,
        RefreshFailed => Unauthenticated
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Public view of the FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Loading,
    Unauthenticated,
    SigningUp,
    SigningIn,
    Authenticated,
    SigningOut,
    Refreshing,
}

/// Which screen the front-end should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthView {
    Loading,
    Unauthenticated,
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    /// In-flight states that resolve on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthState::Loading
                | AuthState::SigningUp
                | AuthState::SigningIn
                | AuthState::SigningOut
                | AuthState::Refreshing
        )
    }

    /// A user stays on screen while signing out or refreshing.
    pub fn view(&self) -> AuthView {
        match self {
            AuthState::Loading => AuthView::Loading,
            AuthState::Unauthenticated | AuthState::SigningUp | AuthState::SigningIn => {
                AuthView::Unauthenticated
            }
            AuthState::Authenticated | AuthState::SigningOut | AuthState::Refreshing => {
                AuthView::Authenticated
            }
        }
    }
}

impl From<&AuthMachineState> for AuthState {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Loading => AuthState::Loading,
            AuthMachineState::Unauthenticated => AuthState::Unauthenticated,
            AuthMachineState::SigningUp => AuthState::SigningUp,
            AuthMachineState::SigningIn => AuthState::SigningIn,
            AuthMachineState::Authenticated => AuthState::Authenticated,
            AuthMachineState::SigningOut => AuthState::SigningOut,
            AuthMachineState::Refreshing => AuthState::Refreshing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> AuthMachine {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NoSession).unwrap();
        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        machine.consume(&AuthMachineInput::SignInSuccess).unwrap();
        machine
    }

    #[test]
    fn test_initial_state_is_loading() {
        let machine = AuthMachine::new();
        assert_eq!(*machine.state(), AuthMachineState::Loading);
    }

    #[test]
    fn test_startup_paths() {
        let mut restored = AuthMachine::new();
        restored.consume(&AuthMachineInput::SessionRestored).unwrap();
        assert_eq!(*restored.state(), AuthMachineState::Authenticated);

        let mut empty = AuthMachine::new();
        empty.consume(&AuthMachineInput::NoSession).unwrap();
        assert_eq!(*empty.state(), AuthMachineState::Unauthenticated);

        let mut expired = AuthMachine::new();
        expired.consume(&AuthMachineInput::SessionExpired).unwrap();
        assert_eq!(*expired.state(), AuthMachineState::Refreshing);
        expired.consume(&AuthMachineInput::RefreshFailed).unwrap();
        assert_eq!(*expired.state(), AuthMachineState::Unauthenticated);
    }

    #[test]
    fn test_sign_in_flow() {
        let machine = signed_in();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);
    }

    #[test]
    fn test_sign_in_failure_returns_to_unauthenticated() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NoSession).unwrap();
        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        machine.consume(&AuthMachineInput::SignInFailed).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Unauthenticated);
    }

    #[test]
    fn test_sign_up_never_authenticates() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NoSession).unwrap();
        machine.consume(&AuthMachineInput::SignUpAttempt).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SigningUp);

        assert!(machine.consume(&AuthMachineInput::SignInSuccess).is_err());
        machine.consume(&AuthMachineInput::SignUpComplete).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Unauthenticated);
    }

    #[test]
    fn test_sign_out_success_and_failure() {
        let mut machine = signed_in();
        machine.consume(&AuthMachineInput::SignOutRequested).unwrap();
        machine.consume(&AuthMachineInput::SignOutFailed).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);

        machine.consume(&AuthMachineInput::SignOutRequested).unwrap();
        machine.consume(&AuthMachineInput::SignOutComplete).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Unauthenticated);
    }

    #[test]
    fn test_refresh_from_authenticated() {
        let mut machine = signed_in();
        machine.consume(&AuthMachineInput::TokenExpired).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Refreshing);
        machine.consume(&AuthMachineInput::RefreshSuccess).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut machine = AuthMachine::new();
        assert!(machine.consume(&AuthMachineInput::SignInAttempt).is_err());

        let mut machine = signed_in();
        assert!(machine.consume(&AuthMachineInput::SignInAttempt).is_err());
        assert!(machine.consume(&AuthMachineInput::SignUpAttempt).is_err());

        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::NoSession).unwrap();
        assert!(machine.consume(&AuthMachineInput::SignOutRequested).is_err());
        assert!(machine.consume(&AuthMachineInput::TokenExpired).is_err());
    }

    #[test]
    fn test_views() {
        assert_eq!(AuthState::Loading.view(), AuthView::Loading);
        assert_eq!(AuthState::SigningIn.view(), AuthView::Unauthenticated);
        assert_eq!(AuthState::SigningUp.view(), AuthView::Unauthenticated);
        assert_eq!(AuthState::Refreshing.view(), AuthView::Authenticated);
        assert_eq!(AuthState::SigningOut.view(), AuthView::Authenticated);
        assert!(AuthState::Authenticated.is_authenticated());
        assert!(!AuthState::Authenticated.is_transient());
        assert!(AuthState::Refreshing.is_transient());
    }

    #[test]
    fn test_state_conversion() {
        assert_eq!(
            AuthState::from(&AuthMachineState::SigningOut),
            AuthState::SigningOut
        );
        assert_eq!(AuthState::from(&AuthMachineState::Loading), AuthState::Loading);
    }
}
