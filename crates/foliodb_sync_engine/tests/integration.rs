//! End-to-end replication tests: two stores syncing through a shared
//! server over the loopback transport.

use std::sync::Arc;
use std::time::Duration;

use foliodb_core::{NewDocument, Store};
use foliodb_sync_engine::{
    CredentialProvider, HttpTransport, LoopbackClient, LoopbackServer, ManualSync,
    ManualSyncStatus, Replicator, RetryConfig, StaticCredentials, StoreApplier, SyncConfig,
    SyncError,
};
use foliodb_sync_protocol::ConflictPolicy;
use foliodb_sync_server::{ServerConfig, SyncServer};

/// Routes loopback requests into an in-process [`SyncServer`].
struct Loopback(Arc<SyncServer>);

impl LoopbackServer for Loopback {
    fn handle_post(
        &self,
        path: &str,
        authorization: Option<&str>,
        body: &[u8],
    ) -> Result<Vec<u8>, String> {
        self.0
            .handle_post(path, authorization, body)
            .map_err(|e| e.to_string())
    }
}

type LoopbackReplicator = Replicator<HttpTransport<LoopbackClient<Loopback>>, StoreApplier>;

fn new_client(
    server: &Arc<SyncServer>,
    client_id: &str,
    credentials: Arc<StaticCredentials>,
) -> (Arc<Store>, LoopbackReplicator) {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let applier = StoreApplier::new(Arc::clone(&store), ConflictPolicy::default()).unwrap();

    let provider: Arc<dyn CredentialProvider> = credentials;
    let transport = HttpTransport::new(
        "http://sync.test",
        LoopbackClient::new(Loopback(Arc::clone(server))),
        provider,
    );

    let config = SyncConfig::new("http://sync.test", client_id)
        .with_retry(RetryConfig::no_retry())
        .with_status_hold(Duration::from_millis(50));

    (store, Replicator::new(config, transport, applier))
}

fn open_server() -> Arc<SyncServer> {
    Arc::new(SyncServer::new(ServerConfig::default()).unwrap())
}

#[test]
fn document_replicates_between_clients() {
    let server = open_server();
    let creds = Arc::new(StaticCredentials::new("anything"));
    let (store_a, repl_a) = new_client(&server, "client-a", Arc::clone(&creds));
    let (store_b, repl_b) = new_client(&server, "client-b", creds);

    let doc = store_a
        .insert(NewDocument::new("Shopping list", "milk, eggs"))
        .unwrap();

    let cycle = repl_a.sync().unwrap();
    assert_eq!(cycle.pushed, 1);

    let cycle = repl_b.sync().unwrap();
    assert_eq!(cycle.pulled, 1);

    let replica = store_b.get(doc.id()).unwrap();
    assert_eq!(replica.title, "Shopping list");
    assert_eq!(replica.rev(), doc.rev());
}

#[test]
fn second_sync_cycle_is_a_no_op() {
    let server = open_server();
    let creds = Arc::new(StaticCredentials::new("anything"));
    let (store_a, repl_a) = new_client(&server, "client-a", creds);

    store_a
        .insert(NewDocument::new("once", "only pushed once"))
        .unwrap();
    repl_a.sync().unwrap();

    let cycle = repl_a.sync().unwrap();
    assert_eq!(cycle.pushed, 0);
    assert_eq!(cycle.pulled, 0);
    assert_eq!(server.operation_count(), 1);
}

#[test]
fn deletes_propagate() {
    let server = open_server();
    let creds = Arc::new(StaticCredentials::new("anything"));
    let (store_a, repl_a) = new_client(&server, "client-a", Arc::clone(&creds));
    let (store_b, repl_b) = new_client(&server, "client-b", creds);

    let doc = store_a
        .insert(NewDocument::new("ephemeral", "soon gone"))
        .unwrap();
    repl_a.sync().unwrap();
    repl_b.sync().unwrap();
    assert!(store_b.get(doc.id()).is_ok());

    store_a.delete(doc.id(), doc.rev().unwrap()).unwrap();
    repl_a.sync().unwrap();
    repl_b.sync().unwrap();

    assert!(store_b.get(doc.id()).is_err());
}

#[test]
fn attachments_replicate_with_documents() {
    let server = open_server();
    let creds = Arc::new(StaticCredentials::new("anything"));
    let (store_a, repl_a) = new_client(&server, "client-a", Arc::clone(&creds));
    let (store_b, repl_b) = new_client(&server, "client-b", creds);

    let doc = store_a
        .insert(NewDocument::new("illustrated", "has a picture"))
        .unwrap();
    let doc = store_a
        .put_attachment(
            doc.id(),
            doc.rev().unwrap(),
            "photo.png",
            "image/png",
            vec![0x89, 0x50, 0x4E, 0x47],
        )
        .unwrap();

    repl_a.sync().unwrap();
    repl_b.sync().unwrap();

    let replica = store_b.get(doc.id()).unwrap();
    assert_eq!(replica.attachment_names(), vec!["photo.png".to_owned()]);
    let attachment = store_b.get_attachment(doc.id(), "photo.png").unwrap();
    assert_eq!(attachment.data.unwrap(), vec![0x89, 0x50, 0x4E, 0x47]);
}

#[test]
fn divergent_edits_converge_deterministically() {
    let server = open_server();
    let creds = Arc::new(StaticCredentials::new("anything"));
    let (store_a, repl_a) = new_client(&server, "client-a", Arc::clone(&creds));
    let (store_b, repl_b) = new_client(&server, "client-b", creds);

    let doc = store_a
        .insert(NewDocument::new("draft", "original text"))
        .unwrap();
    repl_a.sync().unwrap();
    repl_b.sync().unwrap();

    // Both sides edit generation 1 without seeing each other.
    let mut edit_a = store_a.get(doc.id()).unwrap();
    edit_a.title = "draft (from a)".into();
    store_a.update(edit_a).unwrap();

    let mut edit_b = store_b.get(doc.id()).unwrap();
    edit_b.title = "draft (from b)".into();
    store_b.update(edit_b).unwrap();

    repl_a.sync().unwrap();
    repl_b.sync().unwrap();
    repl_a.sync().unwrap();

    let final_a = store_a.get(doc.id()).unwrap();
    let final_b = store_b.get(doc.id()).unwrap();
    assert_eq!(final_a.rev(), final_b.rev());
    assert_eq!(final_a.title, final_b.title);
    assert_eq!(final_a.rev().unwrap().generation(), 2);
}

#[test]
fn manual_sync_reports_status_transitions() {
    let server = open_server();
    let creds = Arc::new(StaticCredentials::new("anything"));
    let (store_a, repl_a) = new_client(&server, "client-a", creds);

    store_a.insert(NewDocument::new("note", "body")).unwrap();

    let manual = ManualSync::new(Arc::new(repl_a));
    assert_eq!(manual.status(), ManualSyncStatus::Idle);

    let cycle = manual.trigger().unwrap();
    assert_eq!(cycle.pushed, 1);
    assert!(matches!(manual.status(), ManualSyncStatus::Finished(_)));

    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(manual.status(), ManualSyncStatus::Idle);
}

#[test]
fn server_auth_accepts_valid_and_rejects_rotated_out_tokens() {
    let server = Arc::new(
        SyncServer::new(ServerConfig::default().with_auth(b"shared-secret".to_vec())).unwrap(),
    );
    let token = server.issue_token("client-a").unwrap();
    let creds = Arc::new(StaticCredentials::new(token));
    let (store_a, repl_a) = new_client(&server, "client-a", Arc::clone(&creds));

    store_a.insert(NewDocument::new("private", "body")).unwrap();
    repl_a.sync().unwrap();
    assert_eq!(server.operation_count(), 1);

    // A revoked credential stops the next cycle; rotating in a fresh
    // token restores service without rebuilding the transport.
    creds.rotate("not-a-token");
    store_a.insert(NewDocument::new("second", "body")).unwrap();
    assert!(matches!(
        repl_a.sync(),
        Err(SyncError::Transport { .. })
    ));

    let fresh = server.issue_token("client-a").unwrap();
    creds.rotate(fresh);
    let cycle = repl_a.sync().unwrap();
    assert_eq!(cycle.pushed, 1);
}
