//! End-to-end tests: a real `ApiClient` against the in-memory reference
//! server bound to an ephemeral port.

use mats_core::models::{Graph, GraphId, Node, NodeId, Position, TechniqueNote, UserId};
use mats_core::{ApiClient, EditorConfig, LocalStore};
use mats_editor::{messages, Editor, Entities, Session};
use mats_server::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

struct TestServer {
    base_url: String,
    _shutdown: broadcast::Sender<()>,
}

async fn spawn_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = broadcast::channel(1);
    tokio::spawn(mats_server::http::serve(listener, Arc::new(AppState::new()), rx));
    TestServer {
        base_url: format!("http://{}/api", addr),
        _shutdown: tx,
    }
}

async fn signed_in(server: &TestServer, store: &LocalStore) -> Session {
    let client = ApiClient::with_base_url(&server.base_url).unwrap();
    let mut session = Session::restore(store.clone(), client).await;
    session
        .register("Ana", "ana@example.com", "secret")
        .await
        .unwrap();
    session
}

async fn editor_for(session: &Session) -> Editor {
    let mut editor = Editor::new(
        Arc::new(session.client().clone()),
        session.store().clone(),
        EditorConfig::default(),
    )
    .with_user(session.user().cloned());
    editor.load_all().await.unwrap();
    editor
}

/// Signed-in editor on a fresh graph holding "Closed guard" and "Armbar".
async fn editor_with_graph(session: &Session) -> (Editor, GraphId, NodeId, NodeId) {
    let mut editor = editor_for(session).await;
    let graph = editor.create_graph("Guard").await.unwrap();
    editor.select_graph(graph.id).unwrap();
    let a = editor.create_node("Closed guard").await.unwrap();
    let b = editor.create_node("Armbar").await.unwrap();
    (editor, graph.id, a.id, b.id)
}

#[tokio::test]
async fn test_session_survives_restart_until_logout() {
    let server = spawn_server().await;
    let store = LocalStore::temporary().unwrap();

    let fresh = Session::restore(
        store.clone(),
        ApiClient::with_base_url(&server.base_url).unwrap(),
    )
    .await;
    assert!(!fresh.is_authenticated());

    let session = signed_in(&server, &store).await;
    let user = session.user().cloned().unwrap();
    assert_eq!(user.email, "ana@example.com");

    let mut restored = Session::restore(
        store.clone(),
        ApiClient::with_base_url(&server.base_url).unwrap(),
    )
    .await;
    assert_eq!(restored.user(), Some(&user));

    restored.logout().unwrap();
    assert!(store.load_token().is_none());
}

#[tokio::test]
async fn test_rejected_stored_token_is_cleared() {
    let server = spawn_server().await;
    let store = LocalStore::temporary().unwrap();
    store.save_token("not-a-real-token").unwrap();

    let session = Session::restore(
        store.clone(),
        ApiClient::with_base_url(&server.base_url).unwrap(),
    )
    .await;

    assert!(!session.is_authenticated());
    assert!(session.client().token().is_none());
    assert!(store.load_token().is_none());
}

#[tokio::test]
async fn test_duplicate_edge_shows_duplicate_message() {
    let server = spawn_server().await;
    let store = LocalStore::temporary().unwrap();
    let session = signed_in(&server, &store).await;
    let (mut editor, _, a, b) = editor_with_graph(&session).await;

    editor.connect(a, b).await.unwrap();
    assert!(editor.connect(a, b).await.is_err());

    assert_eq!(editor.banner().unwrap().message, messages::EDGE_DUPLICATE);
    assert!(editor.pending_edges().is_empty());
    let between = editor
        .view()
        .edges
        .iter()
        .filter(|e| e.source == a && e.target == b)
        .count();
    assert_eq!(between, 1);
}

#[tokio::test]
async fn test_positions_round_trip_through_local_store() {
    let server = spawn_server().await;
    let store = LocalStore::temporary().unwrap();
    let session = signed_in(&server, &store).await;
    let (mut editor, graph, a, b) = editor_with_graph(&session).await;

    editor.move_node(a, Position::new(10.0, 20.0)).unwrap();
    editor.move_node(b, Position::new(300.0, 40.0)).unwrap();
    editor.flush().await;
    drop(editor);

    let mut reopened = editor_for(&session).await;
    reopened.select_graph(graph).unwrap();
    assert_eq!(reopened.view().node(a).unwrap().position, Position::new(10.0, 20.0));
    assert_eq!(reopened.view().node(b).unwrap().position, Position::new(300.0, 40.0));
}

#[tokio::test]
async fn test_technique_note_round_trip() {
    let server = spawn_server().await;
    let store = LocalStore::temporary().unwrap();
    let session = signed_in(&server, &store).await;
    let (mut editor, graph, a, b) = editor_with_graph(&session).await;

    let panel = editor.open_technique(b).await.unwrap();
    assert_eq!(panel.draft, TechniqueNote::default());

    editor.open_technique(a).await.unwrap();
    editor.edit_video_url("https://x").unwrap();
    editor.edit_steps("1) grip").unwrap();
    editor.save_technique_now().await.unwrap();

    let mut reopened = editor_for(&session).await;
    reopened.select_graph(graph).unwrap();
    let panel = reopened.open_technique(a).await.unwrap();
    assert_eq!(panel.draft, TechniqueNote::new("https://x", "1) grip"));
    assert!(reopened.banner().is_none());
}

#[tokio::test]
async fn test_deleting_node_cascades_on_both_sides() {
    let server = spawn_server().await;
    let store = LocalStore::temporary().unwrap();
    let session = signed_in(&server, &store).await;
    let (mut editor, graph, a, b) = editor_with_graph(&session).await;
    let c = editor.create_node("Triangle").await.unwrap().id;
    editor.connect(a, b).await.unwrap();
    editor.connect(b, c).await.unwrap();

    let report = editor.delete_nodes(&[b]).await;
    assert_eq!(report.failed, 0);
    assert!(editor.view().edges.is_empty());

    editor.load_all().await.unwrap();
    editor.select_graph(graph).unwrap();
    assert!(editor.view().edges.is_empty());
    assert_eq!(editor.view().nodes.len(), 2);
}

#[tokio::test]
async fn test_unreachable_server_shows_network_message() {
    let client = ApiClient::with_base_url("http://127.0.0.1:9/api")
        .unwrap()
        .with_token("t");
    let store = LocalStore::temporary().unwrap();
    let mut editor = Editor::new(Arc::new(client), store, EditorConfig::default());
    editor.hydrate(Entities {
        users: Vec::new(),
        graphs: vec![Graph {
            id: GraphId(1),
            title: "Guard".to_string(),
            user_id: UserId(1),
        }],
        nodes: vec![
            Node {
                id: NodeId(1),
                name: "Closed guard".to_string(),
                graph_id: GraphId(1),
            },
            Node {
                id: NodeId(2),
                name: "Armbar".to_string(),
                graph_id: GraphId(1),
            },
        ],
        edges: Vec::new(),
    });
    editor.select_graph(GraphId(1)).unwrap();

    assert!(editor.connect(NodeId(1), NodeId(2)).await.is_err());

    assert_eq!(editor.banner().unwrap().message, messages::EDGE_NETWORK);
    assert!(editor.view().edges.is_empty());
    // The failed reload left the cached techniques in place.
    assert_eq!(editor.view().nodes.len(), 2);
}
