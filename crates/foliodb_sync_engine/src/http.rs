//! HTTP transport and credential handling.
//!
//! The HTTP client itself is a trait so callers can plug in whichever
//! library they ship with. Credentials are supplied through
//! [`CredentialProvider`] and attached as an `Authorization` header on
//! every request; they are never embedded in the server URL, so rotating
//! a token requires no transport rebuild.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use foliodb_sync_protocol::{
    self as protocol, HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest,
    PushResponse,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Supplies the bearer token for outgoing requests.
///
/// Resolved on every request, so an updated token takes effect on the
/// next call without reconnecting.
pub trait CredentialProvider: Send + Sync {
    /// Returns the current bearer token.
    fn token(&self) -> SyncResult<String>;
}

/// A credential provider holding a replaceable token.
#[derive(Default)]
pub struct StaticCredentials {
    token: RwLock<String>,
}

impl StaticCredentials {
    /// Creates a provider with an initial token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(token.into()),
        }
    }

    /// Replaces the token. In-flight requests keep the old one; the next
    /// request picks up the new one.
    pub fn rotate(&self, token: impl Into<String>) {
        *self.token.write() = token.into();
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> SyncResult<String> {
        Ok(self.token.read().clone())
    }
}

/// Minimal HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    fn post(&self, url: &str, headers: &[(&str, String)], body: Vec<u8>)
        -> Result<Vec<u8>, String>;

    /// Returns true while the client is usable.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based sync transport with CBOR bodies.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
    credentials: Arc<dyn CredentialProvider>,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport for `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        client: C,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            credentials,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the most recent transport error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn post_cbor<Req, Res>(&self, endpoint: &str, request: &Req) -> SyncResult<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let body = protocol::encode(request)?;
        let token = self.credentials.token()?;
        let headers = [("Authorization", format!("Bearer {token}"))];

        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.client.post(&url, &headers, body).map_err(|err| {
            *self.last_error.write() = Some(err.clone());
            self.connected.store(false, Ordering::SeqCst);
            SyncError::transport_retryable(err)
        })?;

        *self.last_error.write() = None;
        Ok(protocol::decode(&response)?)
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn handshake(&self, request: &HandshakeRequest) -> SyncResult<HandshakeResponse> {
        // A handshake re-establishes the connection after an earlier
        // failure, so the next cycle can recover on its own.
        self.connected.store(true, Ordering::SeqCst);
        self.post_cbor("/sync/handshake", request)
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.post_cbor("/sync/pull", request)
    }

    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.post_cbor("/sync/push", request)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// A server that can be called in-process, without a network.
pub trait LoopbackServer {
    /// Handles a POST and returns the response body.
    fn handle_post(
        &self,
        path: &str,
        authorization: Option<&str>,
        body: &[u8],
    ) -> Result<Vec<u8>, String>;
}

/// Routes requests directly to a [`LoopbackServer`], mainly for tests.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a client bound to `server`.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: Vec<u8>,
    ) -> Result<Vec<u8>, String> {
        let path = url.find("/sync/").map(|i| &url[i..]).unwrap_or(url);
        let authorization = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.as_str());
        self.server.handle_post(path, authorization, &body)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct TestClient {
        response: Mutex<Option<Vec<u8>>>,
        seen_headers: Mutex<Vec<(String, String)>>,
        seen_urls: Mutex<Vec<String>>,
        healthy: AtomicBool,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                healthy: AtomicBool::new(true),
                ..Self::default()
            }
        }

        fn set_response(&self, response: Vec<u8>) {
            *self.response.lock() = Some(response);
        }
    }

    impl HttpClient for &TestClient {
        fn post(
            &self,
            url: &str,
            headers: &[(&str, String)],
            _body: Vec<u8>,
        ) -> Result<Vec<u8>, String> {
            self.seen_urls.lock().push(url.to_string());
            self.seen_headers.lock().extend(
                headers
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.clone())),
            );
            self.response.lock().clone().ok_or_else(|| "no response".to_string())
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn credentials_travel_in_headers_not_urls() {
        let client = TestClient::new();
        client.set_response(HandshakeResponse::success(7).encode().unwrap());

        let credentials = Arc::new(StaticCredentials::new("secret-token"));
        let transport = HttpTransport::new("https://sync.example.com", &client, credentials);

        let response = transport
            .handshake(&HandshakeRequest::new("client", 0))
            .unwrap();
        assert_eq!(response.server_cursor, 7);

        let urls = client.seen_urls.lock();
        assert_eq!(urls[0], "https://sync.example.com/sync/handshake");
        assert!(!urls[0].contains("secret-token"));

        let headers = client.seen_headers.lock();
        assert_eq!(
            headers[0],
            ("Authorization".to_string(), "Bearer secret-token".to_string())
        );
    }

    #[test]
    fn rotated_token_applies_to_next_request() {
        let client = TestClient::new();
        client.set_response(HandshakeResponse::success(0).encode().unwrap());

        let credentials = Arc::new(StaticCredentials::new("first"));
        let transport =
            HttpTransport::new("https://sync.example.com", &client, credentials.clone());

        let request = HandshakeRequest::new("client", 0);
        transport.handshake(&request).unwrap();
        credentials.rotate("second");
        transport.handshake(&request).unwrap();

        let headers = client.seen_headers.lock();
        assert_eq!(headers[0].1, "Bearer first");
        assert_eq!(headers[1].1, "Bearer second");
    }

    #[test]
    fn failed_post_marks_transport_disconnected() {
        let client = TestClient::new();
        // No response scripted: the post fails.
        let transport = HttpTransport::new(
            "https://sync.example.com",
            &client,
            Arc::new(StaticCredentials::new("t")),
        );

        let err = transport
            .handshake(&HandshakeRequest::new("client", 0))
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!transport.is_connected());
        assert_eq!(transport.last_error().as_deref(), Some("no response"));
    }
}
