//! GoTrue endpoints.

use crate::client::PlatformClient;
use crate::error::PlatformResult;
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// The user object GoTrue returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens issued by a password or refresh grant.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: i64,
    /// Absolute expiry (unix seconds), when the server includes it.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Sign-up answers with a bare user when email confirmation is pending and
/// with a full session when the project auto-confirms.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(AuthSession),
    User(AuthUser),
}

impl PlatformClient {
    /// `POST /auth/v1/signup?redirect_to=…`
    ///
    /// Any session issued by an auto-confirming project is discarded; callers
    /// sign in explicitly afterwards.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> PlatformResult<AuthUser> {
        let url = self.endpoint("/auth/v1/signup");
        tracing::debug!(email, "signing up");

        let request = self
            .request(Method::POST, &url, None)
            .query(&[("redirect_to", redirect_to)])
            .json(&Credentials { email, password });
        let response = self.send(request, "sign_up").await?;

        let body = response.text().await?;
        let user = match serde_json::from_str::<SignUpResponse>(&body)? {
            SignUpResponse::Session(session) => session.user,
            SignUpResponse::User(user) => user,
        };
        Ok(user)
    }

    /// `POST /auth/v1/token?grant_type=password`
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> PlatformResult<AuthSession> {
        let url = self.endpoint("/auth/v1/token");
        tracing::debug!(email, "password sign-in");

        let request = self
            .request(Method::POST, &url, None)
            .query(&[("grant_type", "password")])
            .json(&Credentials { email, password });
        let session: AuthSession = self.send(request, "sign_in").await?.json().await?;

        tracing::info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    /// `POST /auth/v1/token?grant_type=refresh_token`
    pub async fn refresh_session(&self, refresh_token: &str) -> PlatformResult<AuthSession> {
        let url = self.endpoint("/auth/v1/token");

        let request = self
            .request(Method::POST, &url, None)
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshRequest { refresh_token });
        let session: AuthSession = self.send(request, "refresh").await?.json().await?;

        tracing::info!(user_id = %session.user.id, "session refreshed");
        Ok(session)
    }

    /// `GET /auth/v1/user`, used to check a stored token is still honoured.
    pub async fn get_user(&self, access_token: &str) -> PlatformResult<AuthUser> {
        let url = self.endpoint("/auth/v1/user");
        let request = self.request(Method::GET, &url, Some(access_token));
        Ok(self.send(request, "get_user").await?.json().await?)
    }

    /// `POST /auth/v1/logout`. Revokes the refresh token server-side.
    pub async fn sign_out(&self, access_token: &str) -> PlatformResult<()> {
        let url = self.endpoint("/auth/v1/logout");
        let request = self.request(Method::POST, &url, Some(access_token));
        self.send(request, "sign_out").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_response_shapes() {
        let pending: SignUpResponse =
            serde_json::from_str(r#"{"id":"u1","email":"a@b.c","confirmation_sent_at":"x"}"#)
                .unwrap();
        assert!(matches!(pending, SignUpResponse::User(u) if u.id == "u1"));

        let confirmed: SignUpResponse = serde_json::from_str(
            r#"{"access_token":"at","refresh_token":"rt","expires_in":3600,
                "token_type":"bearer","user":{"id":"u2","email":"d@e.f"}}"#,
        )
        .unwrap();
        assert!(matches!(confirmed, SignUpResponse::Session(s) if s.user.id == "u2"));
    }

    #[test]
    fn test_session_without_expires_at() {
        let session: AuthSession = serde_json::from_str(
            r#"{"access_token":"at","refresh_token":"rt","expires_in":60,"user":{"id":"u"}}"#,
        )
        .unwrap();
        assert_eq!(session.expires_at, None);
        assert_eq!(session.user.email, None);
    }
}
