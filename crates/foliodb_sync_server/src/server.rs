//! Main sync server.

use crate::auth::{AuthConfig, TokenValidator};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::oplog::ServerLog;
use foliodb_sync_protocol::{
    HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest, PushResponse,
};
use std::sync::Arc;

/// The sync server.
///
/// Handles handshake, pull, and push requests against a shared
/// operation log. [`SyncServer::handle_post`] routes a raw CBOR body
/// by endpoint path, which is how an HTTP front end (or the loopback
/// transport in tests) drives it.
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
    validator: Option<TokenValidator>,
}

impl SyncServer {
    /// Creates a new sync server with an empty log.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let log = Arc::new(ServerLog::new()?);
        Self::with_log(config, log)
    }

    /// Creates a sync server over an existing log.
    pub fn with_log(config: ServerConfig, log: Arc<ServerLog>) -> ServerResult<Self> {
        let validator = match (&config.require_auth, &config.auth_secret) {
            (true, Some(secret)) => Some(TokenValidator::new(AuthConfig::new(secret.clone()))),
            (true, None) => {
                return Err(ServerError::InvalidRequest(
                    "auth required but no secret configured".into(),
                ))
            }
            _ => None,
        };

        let context = Arc::new(HandlerContext::new(config, log));
        let handler = RequestHandler::new(Arc::clone(&context));
        Ok(Self {
            handler,
            context,
            validator,
        })
    }

    /// Handles a handshake request.
    pub fn handle_handshake(&self, request: HandshakeRequest) -> ServerResult<HandshakeResponse> {
        self.handler.handle_handshake(request)
    }

    /// Handles a pull request.
    pub fn handle_pull(&self, request: PullRequest) -> ServerResult<PullResponse> {
        self.handler.handle_pull(request)
    }

    /// Handles a push request.
    pub fn handle_push(&self, request: PushRequest) -> ServerResult<PushResponse> {
        self.handler.handle_push(request)
    }

    /// Routes a raw request body by endpoint path.
    ///
    /// `authorization` is the value of the `Authorization` header, if
    /// present. When the server requires auth it must carry a bearer
    /// token issued by [`TokenValidator::create_token`].
    pub fn handle_post(
        &self,
        path: &str,
        authorization: Option<&str>,
        body: &[u8],
    ) -> ServerResult<Vec<u8>> {
        self.authorize(authorization)?;

        match path {
            "/sync/handshake" => {
                let request = HandshakeRequest::decode(body)?;
                Ok(self.handle_handshake(request)?.encode()?)
            }
            "/sync/pull" => {
                let request = PullRequest::decode(body)?;
                Ok(self.handle_pull(request)?.encode()?)
            }
            "/sync/push" => {
                let request = PushRequest::decode(body)?;
                Ok(self.handle_push(request)?.encode()?)
            }
            other => Err(ServerError::UnknownEndpoint(other.to_owned())),
        }
    }

    fn authorize(&self, authorization: Option<&str>) -> ServerResult<()> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let header = authorization
            .ok_or_else(|| ServerError::NotAuthorized("missing authorization header".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServerError::NotAuthorized("expected bearer token".into()))?;
        let client_id = validator.validate_token(token)?;
        tracing::trace!(client_id = %client_id, "authorized request");
        Ok(())
    }

    /// Issues a token for a client, when auth is enabled.
    pub fn issue_token(&self, client_id: &str) -> ServerResult<String> {
        let validator = self
            .validator
            .as_ref()
            .ok_or_else(|| ServerError::InvalidRequest("auth is not enabled".into()))?;
        validator.create_token(client_id)
    }

    /// Returns the current server cursor.
    pub fn cursor(&self) -> u64 {
        self.context.log.cursor()
    }

    /// Returns the number of operations in the log.
    pub fn operation_count(&self) -> usize {
        self.context.log.len()
    }

    /// The server's operation log.
    pub fn log(&self) -> &Arc<ServerLog> {
        &self.context.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foliodb_core::{encode_document, Document, DocumentId, Revision};
    use foliodb_sync_protocol::{ReplicationOp, PROTOCOL_VERSION};

    fn make_op(id: &str) -> ReplicationOp {
        let doc_id = DocumentId::new(id).unwrap();
        let rev = Revision::new(1, "aa");
        let doc = Document::with_id(doc_id.clone(), "title", "body").with_rev(rev.clone());
        ReplicationOp::put(0, doc_id, rev, encode_document(&doc).unwrap())
    }

    #[test]
    fn server_lifecycle() {
        let server = SyncServer::new(ServerConfig::default()).unwrap();
        assert_eq!(server.cursor(), 0);
        assert_eq!(server.operation_count(), 0);
    }

    #[test]
    fn full_sync_flow_over_post() {
        let server = SyncServer::new(ServerConfig::default()).unwrap();

        let handshake = HandshakeRequest::new("client-a", 0).encode().unwrap();
        let response = server.handle_post("/sync/handshake", None, &handshake).unwrap();
        let handshake = HandshakeResponse::decode(&response).unwrap();
        assert!(handshake.success);
        assert_eq!(handshake.protocol_version, PROTOCOL_VERSION);

        let push = PushRequest::new(vec![make_op("doc-a")]).encode().unwrap();
        let response = server.handle_post("/sync/push", None, &push).unwrap();
        let push = PushResponse::decode(&response).unwrap();
        assert!(push.success);
        assert_eq!(push.new_cursor, 1);

        let pull = PullRequest::new(0, 10).encode().unwrap();
        let response = server.handle_post("/sync/pull", None, &pull).unwrap();
        let pull = PullResponse::decode(&response).unwrap();
        assert_eq!(pull.operations.len(), 1);
    }

    #[test]
    fn unknown_endpoint() {
        let server = SyncServer::new(ServerConfig::default()).unwrap();
        let result = server.handle_post("/sync/nothing", None, &[]);
        assert!(matches!(result, Err(ServerError::UnknownEndpoint(_))));
    }

    #[test]
    fn auth_required_rejects_missing_token() {
        let config = ServerConfig::default().with_auth(b"secret".to_vec());
        let server = SyncServer::new(config).unwrap();

        let handshake = HandshakeRequest::new("client-a", 0).encode().unwrap();
        let result = server.handle_post("/sync/handshake", None, &handshake);
        assert!(matches!(result, Err(ServerError::NotAuthorized(_))));
    }

    #[test]
    fn auth_accepts_issued_bearer_token() {
        let config = ServerConfig::default().with_auth(b"secret".to_vec());
        let server = SyncServer::new(config).unwrap();

        let token = server.issue_token("client-a").unwrap();
        let header = format!("Bearer {token}");
        let handshake = HandshakeRequest::new("client-a", 0).encode().unwrap();
        let response = server
            .handle_post("/sync/handshake", Some(&header), &handshake)
            .unwrap();
        assert!(HandshakeResponse::decode(&response).unwrap().success);
    }

    #[test]
    fn auth_rejects_forged_token() {
        let config = ServerConfig::default().with_auth(b"secret".to_vec());
        let server = SyncServer::new(config).unwrap();

        let other = SyncServer::new(ServerConfig::default().with_auth(b"other".to_vec())).unwrap();
        let token = other.issue_token("client-a").unwrap();
        let header = format!("Bearer {token}");
        let handshake = HandshakeRequest::new("client-a", 0).encode().unwrap();
        let result = server.handle_post("/sync/handshake", Some(&header), &handshake);
        assert!(matches!(result, Err(ServerError::NotAuthorized(_))));
    }
}
