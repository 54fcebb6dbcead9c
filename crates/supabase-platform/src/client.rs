use crate::error::{extract_error_message, PlatformError, PlatformResult};
use reqwest::{RequestBuilder, Response};
use url::Url;

/// Realtime protocol version advertised on connect.
const REALTIME_VSN: &str = "1.0.0";

/// Connection to one Supabase project.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    api_url: String,
    publishable_key: String,
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl PlatformClient {
    /// `api_url` is the project root, e.g. `https://xyz.supabase.co`.
    pub fn new(api_url: &str, publishable_key: &str) -> PlatformResult<Self> {
        Self::with_http_client(reqwest::Client::new(), api_url, publishable_key)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        api_url: &str,
        publishable_key: &str,
    ) -> PlatformResult<Self> {
        let parsed = Url::parse(api_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PlatformError::Config(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }
        if publishable_key.trim().is_empty() {
            return Err(PlatformError::Config(
                "publishable key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn publishable_key(&self) -> &str {
        &self.publishable_key
    }

    /// Websocket endpoint for the realtime change feed.
    ///
    /// `https://x.supabase.co` becomes
    /// `wss://x.supabase.co/realtime/v1/websocket?apikey=<key>&vsn=1.0.0`.
    pub fn realtime_url(&self) -> PlatformResult<Url> {
        let mut url = Url::parse(&self.api_url)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| PlatformError::Config(format!("cannot derive {scheme} URL")))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.publishable_key)
            .append_pair("vsn", REALTIME_VSN);
        Ok(url)
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Request with the `apikey` header and, when given, a bearer token.
    ///
    /// Without a user token the publishable key doubles as the bearer, which
    /// is what the platform expects for anonymous calls.
    pub(crate) fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        access_token: Option<&str>,
    ) -> RequestBuilder {
        let bearer = access_token.unwrap_or(&self.publishable_key);
        self.http
            .request(method, url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }

    /// Send and turn non-success statuses into [`PlatformError::Api`].
    pub(crate) async fn send(&self, request: RequestBuilder, what: &str) -> PlatformResult<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(operation = what, error = %e, "request failed");
            PlatformError::Http(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(status, &body);
        tracing::warn!(
            operation = what,
            status = status.as_u16(),
            body_len = body.len(),
            message = %message,
            "platform returned an error"
        );

        Err(PlatformError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
