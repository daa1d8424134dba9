//! Bulk upsert behavior: ordering, merge-on-conflict, and escalation.

mod common;

use ::common::protocol::{BulkDocInput, BulkDocResult, BulkDocsRequest, DocBody, PutDocResponse};
use ::common::revision;

async fn put_doc(server: &common::TestServer, id: &str, content: &str) -> PutDocResponse {
    server
        .put(&format!("/api/docs/{id}"))
        .json(&serde_json::json!({ "content": content }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn bulk(
    server: &common::TestServer,
    docs: Vec<BulkDocInput>,
) -> Vec<BulkDocResult> {
    server
        .post("/api/docs/bulk_docs")
        .json(&BulkDocsRequest { docs })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn bulk_creates_and_updates() {
    let server = common::spawn().await;

    let results = bulk(
        &server,
        vec![BulkDocInput {
            id: "notes/new".into(),
            content: Some("hello".into()),
            ..Default::default()
        }],
    )
    .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].ok, Some(true));
    let rev1 = results[0].rev.clone().unwrap();
    assert_eq!(revision::generation(&rev1), Some(1));

    // Matching rev advances.
    let results = bulk(
        &server,
        vec![BulkDocInput {
            id: "notes/new".into(),
            rev: Some(rev1),
            content: Some("hello again".into()),
            ..Default::default()
        }],
    )
    .await;
    assert_eq!(results[0].ok, Some(true));
    assert_eq!(
        revision::generation(results[0].rev.as_deref().unwrap()),
        Some(2)
    );
}

#[tokio::test]
async fn bulk_results_match_input_order() {
    let server = common::spawn().await;

    let docs: Vec<BulkDocInput> = (0..5)
        .map(|i| BulkDocInput {
            id: format!("doc{i}"),
            content: Some(format!("content {i}")),
            ..Default::default()
        })
        .collect();

    let results = bulk(&server, docs).await;
    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.id, format!("doc{i}"));
        assert_eq!(result.ok, Some(true));
    }
}

#[tokio::test]
async fn stale_rev_with_base_auto_merges() {
    let server = common::spawn().await;

    // rev 1: the base both sides saw.
    let created = put_doc(&server, "doc", "A\nB\nC").await;
    // rev 2: another device already changed C.
    let updated: PutDocResponse = server
        .put("/api/docs/doc")
        .json(&serde_json::json!({ "_rev": created.rev, "content": "A\nB\nC2" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // This device pushes a B edit against the stale rev 1, carrying its
    // base snapshot.
    let results = bulk(
        &server,
        vec![BulkDocInput {
            id: "doc".into(),
            rev: Some(created.rev),
            content: Some("A\nB2\nC".into()),
            base_content: Some("A\nB\nC".into()),
            ..Default::default()
        }],
    )
    .await;

    let result = &results[0];
    assert_eq!(result.ok, Some(true), "expected merge, got {result:?}");
    assert_eq!(result.merged, Some(true));
    let rev = result.rev.as_deref().unwrap();
    assert_eq!(revision::generation(rev), Some(3));
    assert!(revision::is_newer(rev, &updated.rev));

    let body: DocBody = server
        .get("/api/docs/doc")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.content.as_deref(), Some("A\nB2\nC2"));
}

#[tokio::test]
async fn divergent_edits_report_conflict_regions() {
    let server = common::spawn().await;

    let created = put_doc(&server, "doc", "A\nB\nC").await;
    server
        .put("/api/docs/doc")
        .json(&serde_json::json!({ "_rev": created.rev, "content": "A\nREMOTE\nC" }))
        .send()
        .await
        .unwrap();

    let results = bulk(
        &server,
        vec![BulkDocInput {
            id: "doc".into(),
            rev: Some(created.rev),
            content: Some("A\nLOCAL\nC".into()),
            base_content: Some("A\nB\nC".into()),
            ..Default::default()
        }],
    )
    .await;

    let result = &results[0];
    assert!(result.is_conflict(), "expected conflict, got {result:?}");
    assert_eq!(result.current_content.as_deref(), Some("A\nREMOTE\nC"));
    let regions = result.conflicts.as_ref().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].local_lines, vec!["REMOTE".to_owned()]);
    assert_eq!(regions[0].remote_lines, vec!["LOCAL".to_owned()]);
}

#[tokio::test]
async fn missing_base_revision_escalates_to_full_sync() {
    let server = common::spawn().await;

    let created = put_doc(&server, "doc", "server content").await;
    server
        .put("/api/docs/doc")
        .json(&serde_json::json!({ "_rev": created.rev, "content": "newer" }))
        .send()
        .await
        .unwrap();

    // A rev the server never stored, and no base supplied.
    let results = bulk(
        &server,
        vec![BulkDocInput {
            id: "doc".into(),
            rev: Some("1-neverseenbefore".into()),
            content: Some("local content".into()),
            ..Default::default()
        }],
    )
    .await;

    let result = &results[0];
    assert!(result.is_conflict());
    assert_eq!(result.reason.as_deref(), Some("base_revision_not_found"));
    assert_eq!(result.requires_full_sync, Some(true));
    assert!(result.current_rev.is_some());
}

#[tokio::test]
async fn stale_rev_without_base_recovers_it_from_revisions() {
    let server = common::spawn().await;

    let created = put_doc(&server, "doc", "A\nB\nC").await;
    server
        .put("/api/docs/doc")
        .json(&serde_json::json!({ "_rev": created.rev, "content": "A\nB\nC2" }))
        .send()
        .await
        .unwrap();

    // No _base_content, but the named rev is still on the revisions table,
    // so the server can reconstruct the base itself.
    let results = bulk(
        &server,
        vec![BulkDocInput {
            id: "doc".into(),
            rev: Some(created.rev),
            content: Some("A\nB2\nC".into()),
            ..Default::default()
        }],
    )
    .await;

    assert_eq!(results[0].merged, Some(true), "got {:?}", results[0]);
}

#[tokio::test]
async fn bulk_deletion_tombstones() {
    let server = common::spawn().await;
    let created = put_doc(&server, "doc", "bye").await;

    let results = bulk(
        &server,
        vec![BulkDocInput {
            id: "doc".into(),
            rev: Some(created.rev),
            deleted: Some(true),
            ..Default::default()
        }],
    )
    .await;
    assert_eq!(results[0].ok, Some(true));

    let body: DocBody = server
        .get("/api/docs/doc")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.deleted, Some(true));
    assert!(body.content.is_none());
}

#[tokio::test]
async fn put_with_stale_rev_is_409() {
    let server = common::spawn().await;
    let created = put_doc(&server, "doc", "v1").await;
    server
        .put("/api/docs/doc")
        .json(&serde_json::json!({ "_rev": created.rev, "content": "v2" }))
        .send()
        .await
        .unwrap();

    let response = server
        .put("/api/docs/doc")
        .json(&serde_json::json!({ "_rev": created.rev, "content": "v3" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
    assert!(body["current_rev"].as_str().unwrap().starts_with("2-"));
}
