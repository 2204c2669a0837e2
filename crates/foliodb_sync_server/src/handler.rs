//! Request handlers for the sync endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::oplog::ServerLog;
use foliodb_sync_protocol::{
    HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest, PushResponse,
    PROTOCOL_VERSION,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared state for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Operation log shared across all handlers.
    pub log: Arc<ServerLog>,
    /// Last cursor reported by each client.
    sessions: RwLock<HashMap<String, u64>>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, log: Arc<ServerLog>) -> Self {
        Self {
            config,
            log,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn register_session(&self, client_id: &str, cursor: u64) {
        self.sessions.write().insert(client_id.to_owned(), cursor);
    }

    /// Returns the last cursor a client reported, if it handshook.
    pub fn session_cursor(&self, client_id: &str) -> Option<u64> {
        self.sessions.read().get(client_id).copied()
    }
}

/// Handler for sync requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a handshake request.
    pub fn handle_handshake(&self, request: HandshakeRequest) -> ServerResult<HandshakeResponse> {
        if request.protocol_version != PROTOCOL_VERSION {
            return Ok(HandshakeResponse::error(format!(
                "unsupported protocol version: {}",
                request.protocol_version
            )));
        }
        if request.client_id.is_empty() {
            return Ok(HandshakeResponse::error("empty client id"));
        }

        self.context
            .register_session(&request.client_id, request.last_cursor);
        tracing::debug!(client_id = %request.client_id, cursor = request.last_cursor, "handshake");

        Ok(HandshakeResponse::success(self.context.log.cursor()))
    }

    /// Handles a pull request.
    pub fn handle_pull(&self, request: PullRequest) -> ServerResult<PullResponse> {
        let limit = request.limit.min(self.context.config.max_pull_batch);

        let operations = self.context.log.operations_since(request.cursor, limit);
        let has_more = self.context.log.has_more_after(request.cursor, limit);
        let new_cursor = operations
            .last()
            .map(|op| op.op_id)
            .unwrap_or(request.cursor);

        Ok(PullResponse::new(operations, new_cursor, has_more))
    }

    /// Handles a push request.
    pub fn handle_push(&self, request: PushRequest) -> ServerResult<PushResponse> {
        if request.operations.len() > self.context.config.max_push_batch as usize {
            return Err(ServerError::InvalidRequest(format!(
                "too many operations: {} > {}",
                request.operations.len(),
                self.context.config.max_push_batch
            )));
        }

        let (new_cursor, conflicts) = self
            .context
            .log
            .append(request.operations, self.context.config.conflict_policy)?;

        if conflicts.is_empty() {
            Ok(PushResponse::success(new_cursor))
        } else {
            tracing::debug!(count = conflicts.len(), "push resolved conflicts");
            Ok(PushResponse::with_conflicts(new_cursor, conflicts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foliodb_core::{encode_document, Document, DocumentId, Revision};
    use foliodb_sync_protocol::ReplicationOp;

    fn make_op(id: &str) -> ReplicationOp {
        let doc_id = DocumentId::new(id).unwrap();
        let rev = Revision::new(1, "aa");
        let doc = Document::with_id(doc_id.clone(), "title", "body").with_rev(rev.clone());
        ReplicationOp::put(0, doc_id, rev, encode_document(&doc).unwrap())
    }

    fn create_handler() -> RequestHandler {
        let log = Arc::new(ServerLog::new().unwrap());
        let context = Arc::new(HandlerContext::new(ServerConfig::default(), log));
        RequestHandler::new(context)
    }

    #[test]
    fn handshake_success() {
        let handler = create_handler();
        let request = HandshakeRequest::new("client-a", 0);

        let response = handler.handle_handshake(request).unwrap();
        assert!(response.success);
        assert_eq!(response.server_cursor, 0);
    }

    #[test]
    fn handshake_bad_version() {
        let handler = create_handler();
        let request = HandshakeRequest {
            client_id: "client-a".into(),
            protocol_version: 99,
            last_cursor: 0,
        };

        let response = handler.handle_handshake(request).unwrap();
        assert!(!response.success);
        assert!(response.error.is_some());
    }

    #[test]
    fn pull_empty() {
        let handler = create_handler();
        let response = handler.handle_pull(PullRequest::new(0, 10)).unwrap();

        assert!(response.operations.is_empty());
        assert_eq!(response.new_cursor, 0);
        assert!(!response.has_more);
    }

    #[test]
    fn push_then_pull() {
        let handler = create_handler();

        let push = handler
            .handle_push(PushRequest::new(vec![make_op("doc-a"), make_op("doc-b")]))
            .unwrap();
        assert!(push.success);
        assert_eq!(push.new_cursor, 2);

        let pull = handler.handle_pull(PullRequest::new(0, 10)).unwrap();
        assert_eq!(pull.operations.len(), 2);
        assert_eq!(pull.new_cursor, 2);
        assert!(!pull.has_more);
    }

    #[test]
    fn pull_respects_batch_limit() {
        let log = Arc::new(ServerLog::new().unwrap());
        let config = ServerConfig::default().with_max_pull_batch(2);
        let handler = RequestHandler::new(Arc::new(HandlerContext::new(config, log)));

        let ops = (0..5).map(|i| make_op(&format!("doc-{i}"))).collect();
        handler.handle_push(PushRequest::new(ops)).unwrap();

        let pull = handler.handle_pull(PullRequest::new(0, 100)).unwrap();
        assert_eq!(pull.operations.len(), 2);
        assert!(pull.has_more);
    }

    #[test]
    fn oversized_push_is_rejected() {
        let log = Arc::new(ServerLog::new().unwrap());
        let config = ServerConfig::default().with_max_push_batch(1);
        let handler = RequestHandler::new(Arc::new(HandlerContext::new(config, log)));

        let result = handler.handle_push(PushRequest::new(vec![make_op("a"), make_op("b")]));
        assert!(result.is_err());
    }
}
