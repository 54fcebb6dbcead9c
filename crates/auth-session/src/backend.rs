//! The auth calls the Session Manager needs from the platform.

use async_trait::async_trait;
use supabase_platform::{AuthSession, AuthUser, PlatformClient, PlatformResult};

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, redirect_to: &str)
        -> PlatformResult<AuthUser>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> PlatformResult<AuthSession>;

    async fn refresh_session(&self, refresh_token: &str) -> PlatformResult<AuthSession>;

    async fn get_user(&self, access_token: &str) -> PlatformResult<AuthUser>;

    async fn sign_out(&self, access_token: &str) -> PlatformResult<()>;
}

#[async_trait]
impl AuthBackend for PlatformClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> PlatformResult<AuthUser> {
        PlatformClient::sign_up(self, email, password, redirect_to).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> PlatformResult<AuthSession> {
        PlatformClient::sign_in_with_password(self, email, password).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> PlatformResult<AuthSession> {
        PlatformClient::refresh_session(self, refresh_token).await
    }

    async fn get_user(&self, access_token: &str) -> PlatformResult<AuthUser> {
        PlatformClient::get_user(self, access_token).await
    }

    async fn sign_out(&self, access_token: &str) -> PlatformResult<()> {
        PlatformClient::sign_out(self, access_token).await
    }
}
