use async_trait::async_trait;
use auth_session::{AuthResult, SessionManager};

/// Supplies a usable access token for each remote call.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> AuthResult<String>;
}

#[async_trait]
impl TokenSource for SessionManager {
    async fn access_token(&self) -> AuthResult<String> {
        SessionManager::access_token(self).await
    }
}
