use docbench_client::{Client, ClientConfig, Credentials, LoadBalancing};
use docbench_common::{CursorRequest, DocDbError, DocumentOutcome};
use serde_json::json;

// Helper: build a ClientConfig aimed at the given mockito server URL (strips the http:// prefix).
fn config_for(server_url: &str) -> ClientConfig {
    let addr = server_url.trim_start_matches("http://").to_string();
    ClientConfig { hosts: vec![addr], database: "bench".to_string(), ..Default::default() }
}

// Helper: a client pointed at localhost:8529 for tests that never actually connect.
fn localhost_client() -> Client {
    Client::new(ClientConfig { database: "bench".to_string(), ..Default::default() }).unwrap()
}

fn doc(value: serde_json::Value) -> docbench_common::Document {
    value.as_object().unwrap().clone()
}

#[test]
fn test_client_rejects_empty_host_list() {
    let result = Client::new(ClientConfig { hosts: vec![], ..Default::default() });
    assert!(matches!(result, Err(DocDbError::BadRequest(_))));
}

#[test]
fn test_build_url() {
    let client = localhost_client();
    assert_eq!(client.build_url("/_api/version"), "http://127.0.0.1:8529/_api/version");
}

#[test]
fn test_build_db_url() {
    let client = localhost_client();
    assert_eq!(
        client.build_db_url("/_api/document/docs"),
        "http://127.0.0.1:8529/_db/bench/_api/document/docs"
    );
}

#[test]
fn test_build_url_with_tls() {
    let client = Client::new(ClientConfig { use_tls: true, ..Default::default() }).unwrap();
    assert_eq!(client.build_url("/_api/version"), "https://127.0.0.1:8529/_api/version");
}

// --- load balancing ---

#[test]
fn test_no_load_balancing_always_uses_first_host() {
    let client = Client::new(ClientConfig {
        hosts: vec!["a:1".to_string(), "b:2".to_string()],
        ..Default::default()
    })
    .unwrap();
    for _ in 0..4 {
        assert_eq!(client.host(), "a:1");
    }
}

#[test]
fn test_round_robin_rotates_hosts() {
    let client = Client::new(ClientConfig {
        hosts: vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()],
        load_balancing: LoadBalancing::RoundRobin,
        ..Default::default()
    })
    .unwrap();
    let picked: Vec<String> = (0..6).map(|_| client.host().to_string()).collect();
    assert_eq!(picked, ["a:1", "b:2", "c:3", "a:1", "b:2", "c:3"]);
}

#[test]
fn test_one_random_sticks_to_one_host() {
    let client = Client::new(ClientConfig {
        hosts: vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()],
        load_balancing: LoadBalancing::OneRandom,
        ..Default::default()
    })
    .unwrap();
    let first = client.host().to_string();
    assert!(client.hosts().contains(&first));
    for _ in 0..5 {
        assert_eq!(client.host(), first);
    }
}

// --- requests ---

#[tokio::test]
async fn test_version_sends_basic_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/_api/version")
        .match_header("authorization", "Basic cm9vdDpzZWNyZXQ=")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"server":"docbench","version":"3.11.0","license":"community"}"#)
        .create_async()
        .await;

    let mut config = config_for(&server.url());
    config.credentials = Some(Credentials { user: "root".to_string(), password: Some("secret".to_string()) });
    let client = Client::new(config).unwrap();

    let version = client.version().await.unwrap();
    assert_eq!(version.version, "3.11.0");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_document_maps_404_to_not_found() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/_db/bench/_api/document/docs/missing")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":true,"code":404,"errorNum":1202,"errorMessage":"document not found"}"#)
        .create_async()
        .await;

    let client = Client::new(config_for(&server.url())).unwrap();
    let result = client.get_document("docs", "missing").await;
    assert_eq!(result, Err(DocDbError::NotFound("document not found".to_string())));
}

#[tokio::test]
async fn test_insert_document_maps_409_to_conflict() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/_db/bench/_api/document/docs")
        .with_status(409)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":true,"code":409,"errorNum":1210,"errorMessage":"unique constraint violated"}"#)
        .create_async()
        .await;

    let client = Client::new(config_for(&server.url())).unwrap();
    let result = client.insert_document("docs", &doc(json!({"_key": "k"}))).await;
    assert!(matches!(result, Err(DocDbError::Conflict(m)) if m == "unique constraint violated"));
}

#[tokio::test]
async fn test_error_without_envelope_uses_status_text() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/_api/version")
        .with_status(503)
        .with_body("upstream gone")
        .create_async()
        .await;

    let client = Client::new(config_for(&server.url())).unwrap();
    match client.version().await {
        Err(DocDbError::HttpError(503, message)) => assert!(message.contains("503")),
        other => panic!("expected HttpError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_network_error_when_nothing_listens() {
    let client = Client::new(ClientConfig { hosts: vec!["127.0.0.1:1".to_string()], ..Default::default() }).unwrap();
    assert!(matches!(client.version().await, Err(DocDbError::NetworkError(_))));
}

#[tokio::test]
async fn test_get_documents_returns_per_position_outcomes() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("PUT", "/_db/bench/_api/document/docs")
        .match_query(mockito::Matcher::UrlEncoded("onlyget".into(), "true".into()))
        .match_body(mockito::Matcher::Json(json!(["a", "b"])))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"_key":"a","v":1},{"error":true,"errorNum":1202,"errorMessage":"document not found"}]"#)
        .create_async()
        .await;

    let client = Client::new(config_for(&server.url())).unwrap();
    let outcomes = client
        .get_documents("docs", &["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].is_ok());
    assert!(matches!(&outcomes[1], DocumentOutcome::Failed(e) if e.error_num == 1202));
}

#[tokio::test]
async fn test_import_documents_sends_collection_and_type() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/_db/bench/_api/import")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("collection".into(), "docs".into()),
            mockito::Matcher::UrlEncoded("type".into(), "list".into()),
        ]))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":false,"created":2,"errors":0,"empty":0,"updated":0,"ignored":0}"#)
        .create_async()
        .await;

    let client = Client::new(config_for(&server.url())).unwrap();
    let result = client
        .import_documents("docs", &[doc(json!({"_key": "a"})), doc(json!({"_key": "b"}))])
        .await
        .unwrap();
    assert_eq!(result.created, 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_query_follows_cursor_pages() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/_db/bench/_api/cursor")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result":[1,2],"hasMore":true,"id":"17"}"#)
        .create_async()
        .await;
    server
        .mock("PUT", "/_db/bench/_api/cursor/17")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result":[3],"hasMore":false}"#)
        .create_async()
        .await;

    let client = Client::new(config_for(&server.url())).unwrap();
    let result = client
        .query(&CursorRequest { query: "FOR i IN 1..3 RETURN i".to_string(), batch_size: Some(2), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(result, vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn test_query_continuation_stays_on_cursor_host() {
    let mut first = mockito::Server::new_async().await;
    let mut second = mockito::Server::new_async().await;
    first
        .mock("POST", "/_db/bench/_api/cursor")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result":[1],"hasMore":true,"id":"17"}"#)
        .create_async()
        .await;
    let continuation = first
        .mock("PUT", "/_db/bench/_api/cursor/17")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result":[2],"hasMore":false}"#)
        .create_async()
        .await;
    let elsewhere = second
        .mock("PUT", "/_db/bench/_api/cursor/17")
        .with_status(404)
        .expect(0)
        .create_async()
        .await;

    let config = ClientConfig {
        hosts: vec![
            first.url().trim_start_matches("http://").to_string(),
            second.url().trim_start_matches("http://").to_string(),
        ],
        database: "bench".to_string(),
        load_balancing: LoadBalancing::RoundRobin,
        ..Default::default()
    };
    let client = Client::new(config).unwrap();
    let result = client
        .query(&CursorRequest { query: "FOR i IN 1..2 RETURN i".to_string(), batch_size: Some(1), ..Default::default() })
        .await
        .unwrap();

    assert_eq!(result, vec![json!(1), json!(2)]);
    continuation.assert_async().await;
    elsewhere.assert_async().await;
    // The next request moves on to the second host.
    assert!(client.build_url("/").contains(&second.host_with_port()));
}

#[tokio::test]
async fn test_query_with_more_but_no_id_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/_db/bench/_api/cursor")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result":[1],"hasMore":true}"#)
        .create_async()
        .await;

    let client = Client::new(config_for(&server.url())).unwrap();
    let result = client.query(&CursorRequest { query: "RETURN 1".to_string(), ..Default::default() }).await;
    assert!(matches!(result, Err(DocDbError::Decode(_))));
}

#[tokio::test]
async fn test_collection_exists_distinguishes_404() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/_db/bench/_api/collection/present")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name":"present","type":2}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/_db/bench/_api/collection/absent")
        .with_status(404)
        .create_async()
        .await;

    let client = Client::new(config_for(&server.url())).unwrap();
    assert!(client.collection_exists("present").await.unwrap());
    assert!(!client.collection_exists("absent").await.unwrap());
}

#[tokio::test]
async fn test_acquire_host_list_replaces_hosts() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/_api/cluster/endpoints")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"endpoints":[{"endpoint":"tcp://10.0.0.1:8529"},{"endpoint":"ssl://10.0.0.2:8529"}]}"#)
        .create_async()
        .await;

    let mut client = Client::new(config_for(&server.url())).unwrap();
    client.acquire_host_list().await.unwrap();
    assert_eq!(client.hosts(), ["10.0.0.1:8529".to_string(), "10.0.0.2:8529".to_string()]);
}

#[tokio::test]
async fn test_replace_vertex_path() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/_db/bench/_api/gharial/g/vertex/v/k1")
        .with_status(202)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":false,"vertex":{"_key":"k1"}}"#)
        .create_async()
        .await;

    let client = Client::new(config_for(&server.url())).unwrap();
    client.replace_vertex("g", "v", "k1", &doc(json!({"_key": "k1"}))).await.unwrap();
    mock.assert_async().await;
}
