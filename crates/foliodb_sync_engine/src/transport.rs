//! Transport abstraction for replication.

use crate::error::{SyncError, SyncResult};
use foliodb_sync_protocol::{
    HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest, PushResponse,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Carries replication messages to and from a sync server.
///
/// Abstracting the wire lets replication run over HTTP, a loopback server
/// in tests, or anything else that can move CBOR frames.
pub trait SyncTransport: Send + Sync {
    /// Performs the handshake.
    fn handshake(&self, request: &HandshakeRequest) -> SyncResult<HandshakeResponse>;

    /// Pulls operations from the server.
    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse>;

    /// Pushes operations to the server.
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Returns true while the transport is usable.
    fn is_connected(&self) -> bool;

    /// Closes the transport.
    fn close(&self) -> SyncResult<()>;
}

/// A scripted transport for tests.
#[derive(Default)]
pub struct MockTransport {
    connected: AtomicBool,
    handshake_response: Mutex<Option<HandshakeResponse>>,
    pull_responses: Mutex<Vec<PullResponse>>,
    push_response: Mutex<Option<PushResponse>>,
    pushed: Mutex<Vec<PushRequest>>,
}

impl MockTransport {
    /// Creates a connected mock with no scripted responses.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            handshake_response: Mutex::new(None),
            pull_responses: Mutex::new(Vec::new()),
            push_response: Mutex::new(None),
            pushed: Mutex::new(Vec::new()),
        }
    }

    /// Scripts the handshake response.
    pub fn set_handshake_response(&self, response: HandshakeResponse) {
        *self.handshake_response.lock() = Some(response);
    }

    /// Queues a pull response; responses are served in order, and the
    /// last one repeats.
    pub fn enqueue_pull_response(&self, response: PullResponse) {
        self.pull_responses.lock().push(response);
    }

    /// Scripts the push response.
    pub fn set_push_response(&self, response: PushResponse) {
        *self.push_response.lock() = Some(response);
    }

    /// Returns the push requests seen so far.
    pub fn pushed_requests(&self) -> Vec<PushRequest> {
        self.pushed.lock().clone()
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl SyncTransport for MockTransport {
    fn handshake(&self, _request: &HandshakeRequest) -> SyncResult<HandshakeResponse> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.handshake_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Protocol("no scripted handshake response".into()))
    }

    fn pull(&self, _request: &PullRequest) -> SyncResult<PullResponse> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let mut responses = self.pull_responses.lock();
        if responses.is_empty() {
            return Err(SyncError::Protocol("no scripted pull response".into()));
        }
        if responses.len() == 1 {
            Ok(responses[0].clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.pushed.lock().push(request.clone());
        self.push_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Protocol("no scripted push response".into()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_tracks_connection_state() {
        let transport = MockTransport::new();
        assert!(transport.is_connected());
        transport.close().unwrap();
        assert!(!transport.is_connected());

        let request = HandshakeRequest::new("client", 0);
        assert!(matches!(
            transport.handshake(&request),
            Err(SyncError::NotConnected)
        ));
    }

    #[test]
    fn mock_serves_scripted_responses() {
        let transport = MockTransport::new();
        transport.set_handshake_response(HandshakeResponse::success(5));
        transport.enqueue_pull_response(PullResponse::new(vec![], 5, false));

        let response = transport
            .handshake(&HandshakeRequest::new("client", 0))
            .unwrap();
        assert_eq!(response.server_cursor, 5);

        let pull = transport.pull(&PullRequest::new(0, 10)).unwrap();
        assert!(pull.operations.is_empty());
    }

    #[test]
    fn mock_records_pushes() {
        let transport = MockTransport::new();
        transport.set_push_response(PushResponse::success(1));

        transport.push(&PushRequest::new(vec![])).unwrap();
        assert_eq!(transport.pushed_requests().len(), 1);
    }
}
