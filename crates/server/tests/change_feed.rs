//! Change feed paging, status tips, and the auth boundary.

mod common;

use ::common::protocol::{ChangesResponse, HealthResponse, StatusResponse};

async fn seed_docs(server: &common::TestServer, count: usize) {
    for i in 0..count {
        server
            .put(&format!("/api/docs/doc{i}"))
            .json(&serde_json::json!({ "content": format!("content {i}") }))
            .send()
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn paging_covers_the_feed_without_gaps() {
    let server = common::spawn().await;
    seed_docs(&server, 7).await;

    let mut since = 0;
    let mut seen = Vec::new();
    loop {
        let page: ChangesResponse = server
            .get(&format!("/api/changes?since={since}&limit=3"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if page.results.is_empty() {
            assert_eq!(page.last_seq, since);
            break;
        }
        for change in &page.results {
            seen.push(change.seq);
        }
        since = page.last_seq;
    }

    assert_eq!(seen.len(), 7);
    assert!(seen.windows(2).all(|w| w[1] == w[0] + 1), "gaps: {seen:?}");
}

#[tokio::test]
async fn status_reports_tips() {
    let server = common::spawn().await;

    let empty: StatusResponse = server
        .get("/api/status")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(empty.ok);
    assert_eq!(empty.vault_id, "default");
    assert_eq!(empty.last_seq, 0);
    assert_eq!(empty.last_attachment_seq, 0);

    seed_docs(&server, 3).await;

    let status: StatusResponse = server
        .get("/api/status")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.last_seq, 3);
}

#[tokio::test]
async fn feed_is_per_vault() {
    let server = common::spawn().await;
    server
        .put("/api/docs/doc?vault_id=alpha")
        .json(&serde_json::json!({ "content": "a" }))
        .send()
        .await
        .unwrap();

    let beta: ChangesResponse = server
        .get("/api/changes?vault_id=beta")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(beta.results.is_empty());

    let alpha: ChangesResponse = server
        .get("/api/changes?vault_id=alpha")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alpha.results.len(), 1);
    assert_eq!(alpha.results[0].id, "doc");
}

#[tokio::test]
async fn invalid_params_are_400() {
    let server = common::spawn().await;

    for path in [
        "/api/changes?since=-1",
        "/api/changes?limit=0",
        "/api/changes?limit=1001",
    ] {
        let response = server.get(path).send().await.unwrap();
        assert_eq!(
            response.status(),
            reqwest::StatusCode::BAD_REQUEST,
            "{path}"
        );
    }
}

#[tokio::test]
async fn protected_routes_need_a_bearer() {
    let server = common::spawn().await;

    let response = server
        .client
        .get(server.url("/api/changes"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let response = server
        .client
        .get(server.url("/api/changes"))
        .bearer_auth("wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let server = common::spawn().await;
    let health: HealthResponse = server
        .client
        .get(server.url("/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[tokio::test]
async fn minted_keys_open_the_api() {
    let server = common::spawn().await;

    let minted: serde_json::Value = server
        .client
        .post(server.url("/api/auth/new"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let key = minted["key"].as_str().unwrap();

    let response = server
        .client
        .get(server.url("/api/status"))
        .bearer_auth(key)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn url_encoded_doc_ids_round_trip() {
    let server = common::spawn().await;

    server
        .put("/api/docs/notes%2Fdeep%2Ffile")
        .json(&serde_json::json!({ "content": "nested" }))
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = server
        .get("/api/docs/notes%2Fdeep%2Ffile")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["_id"], "notes/deep/file");
    assert_eq!(body["content"], "nested");
}
