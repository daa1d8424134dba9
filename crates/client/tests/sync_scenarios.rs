//! End-to-end document sync against a real in-process server.

mod common;

use common::{build_client, spawn_server};
use vaultsync_client::conflict::{Resolution, ScriptedPrompt};
use vaultsync_client::settings::DocMetadata;
use vaultsync_client::sync::SyncStatus;
use vaultsync_client::MemoryVault;
use vaultsync_client::Vault;

fn assert_success(status: &SyncStatus) {
    assert!(
        matches!(status, SyncStatus::Success { .. }),
        "expected success, got {status:?}"
    );
}

#[tokio::test]
async fn fresh_client_pulls_everything() {
    let server = spawn_server().await;
    server.put_doc("notes/alpha", None, "alpha body").await;
    server.put_doc("notes/deep/beta", None, "beta body").await;
    let tip = server.doc_tip().await;

    let mut client = build_client(
        &server.base,
        MemoryVault::new(),
        ScriptedPrompt::default(),
        |_| {},
        &[],
    )
    .await;

    let report = client.service.perform_sync().await;
    assert_success(&report.status);
    assert_eq!(report.stats.pulled, 2);
    assert_eq!(
        client.vault.read_text("notes/alpha.md").await.unwrap().as_deref(),
        Some("alpha body")
    );
    assert_eq!(
        client
            .vault
            .read_text("notes/deep/beta.md")
            .await
            .unwrap()
            .as_deref(),
        Some("beta body")
    );
    assert_eq!(client.service.settings().last_seq, tip);
    assert!(client.prompt.requests().is_empty());

    // Steady state: a second run sees no changes on either side.
    let report = client.service.perform_sync().await;
    assert!(
        matches!(&report.status, SyncStatus::Success { message } if message == "No changes"),
        "got {:?}",
        report.status
    );
}

#[tokio::test]
async fn local_edits_push_and_round_trip() {
    let server = spawn_server().await;

    let vault = MemoryVault::new();
    vault.seed("journal.md", "first entry");

    let mut client = build_client(
        &server.base,
        vault,
        ScriptedPrompt::default(),
        |_| {},
        &[],
    )
    .await;

    let report = client.service.perform_sync().await;
    assert_success(&report.status);
    assert_eq!(report.stats.pushed, 1);

    let doc = server.get_doc("journal").await;
    assert_eq!(doc["content"], "first entry");
    assert!(doc["_rev"].as_str().unwrap().starts_with("1-"));

    // Edit and push again: the rev advances instead of conflicting.
    client.vault.write_text("journal.md", "second entry").await.unwrap();
    let report = client.service.perform_sync().await;
    assert_success(&report.status);
    let doc = server.get_doc("journal").await;
    assert_eq!(doc["content"], "second entry");
    assert!(doc["_rev"].as_str().unwrap().starts_with("2-"));
}

#[tokio::test]
async fn pull_merges_disjoint_edits_without_prompting() {
    let server = spawn_server().await;

    let vault = MemoryVault::new();
    vault.seed("note.md", "one\ntwo\nthree");

    let mut client = build_client(
        &server.base,
        vault,
        ScriptedPrompt::default(),
        |_| {},
        &[],
    )
    .await;

    // Establish shared history: push rev 1 and save the base.
    assert_success(&client.service.perform_sync().await.status);
    let rev1 = server.get_doc("note").await["_rev"].as_str().unwrap().to_owned();

    // Another device edits line three...
    server.put_doc("note", Some(&rev1), "one\ntwo\nTHREE").await;
    // ...while this device edits line one.
    client.vault.write_text("note.md", "ONE\ntwo\nthree").await.unwrap();

    let report = client.service.perform_sync().await;
    assert_success(&report.status);
    assert!(client.prompt.requests().is_empty(), "no prompt expected");

    // Both deltas survive locally and on the server.
    assert_eq!(
        client.vault.read_text("note.md").await.unwrap().as_deref(),
        Some("ONE\ntwo\nTHREE")
    );
    let doc = server.get_doc("note").await;
    assert_eq!(doc["content"], "ONE\ntwo\nTHREE");
}

#[tokio::test]
async fn push_conflict_resolved_with_local() {
    let server = spawn_server().await;

    // History the client saw (rev 1), then a divergent remote edit (rev 2).
    let rev1 = server.put_doc("notes/conflict", None, "Base content").await;
    server
        .put_doc("notes/conflict", Some(&rev1), "Remote content")
        .await;
    let tip = server.doc_tip().await;

    let vault = MemoryVault::new();
    vault.seed("notes/conflict.md", "Local content");

    let mut client = build_client(
        &server.base,
        vault,
        ScriptedPrompt::new([Resolution::UseLocal]),
        |settings| {
            // Cursor already at the tip: this run is push-only.
            settings.last_seq = tip;
            settings.metadata_cache.insert(
                "notes/conflict.md".into(),
                DocMetadata {
                    path: "notes/conflict.md".into(),
                    rev: rev1.clone(),
                    last_modified: 0,
                },
            );
        },
        &[],
    )
    .await;

    let report = client.service.perform_sync().await;
    assert_success(&report.status);
    assert_eq!(report.stats.conflicts, 1);

    // The prompt saw both sides.
    let requests = client.prompt.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "notes/conflict.md");
    assert_eq!(requests[0].local_content.as_deref(), Some("Local content"));
    assert_eq!(requests[0].remote_content.as_deref(), Some("Remote content"));

    // Force push won: server adopted the local body, file untouched.
    let doc = server.get_doc("notes/conflict").await;
    assert_eq!(doc["content"], "Local content");
    assert!(doc["_rev"].as_str().unwrap().starts_with("3-"));
    assert_eq!(
        client
            .vault
            .read_text("notes/conflict.md")
            .await
            .unwrap()
            .as_deref(),
        Some("Local content")
    );
}

#[tokio::test]
async fn push_conflict_resolved_with_remote() {
    let server = spawn_server().await;

    let rev1 = server.put_doc("notes/conflict", None, "Base content").await;
    let rev2 = server
        .put_doc("notes/conflict", Some(&rev1), "Remote version")
        .await;
    let tip = server.doc_tip().await;

    let vault = MemoryVault::new();
    vault.seed("notes/conflict.md", "Local content");

    let mut client = build_client(
        &server.base,
        vault,
        ScriptedPrompt::new([Resolution::UseRemote]),
        |settings| {
            settings.last_seq = tip;
            settings.metadata_cache.insert(
                "notes/conflict.md".into(),
                DocMetadata {
                    path: "notes/conflict.md".into(),
                    rev: rev1.clone(),
                    last_modified: 0,
                },
            );
        },
        &[],
    )
    .await;

    let report = client.service.perform_sync().await;
    assert_success(&report.status);

    // The server kept rev 2; the local file adopted it.
    let doc = server.get_doc("notes/conflict").await;
    assert_eq!(doc["_rev"], rev2.as_str());
    assert_eq!(
        client
            .vault
            .read_text("notes/conflict.md")
            .await
            .unwrap()
            .as_deref(),
        Some("Remote version")
    );

    // Nothing left to push: the next run is a no-op.
    let report = client.service.perform_sync().await;
    assert!(
        matches!(&report.status, SyncStatus::Success { message } if message == "No changes"),
        "got {:?}",
        report.status
    );
}

#[tokio::test]
async fn stale_push_auto_merges_on_the_server() {
    let server = spawn_server().await;

    let rev1 = server.put_doc("doc", None, "A\nB\nC").await;
    server.put_doc("doc", Some(&rev1), "A\nB\nC2").await;
    let tip = server.doc_tip().await;

    let vault = MemoryVault::new();
    vault.seed("doc.md", "A\nB2\nC");

    let mut client = build_client(
        &server.base,
        vault,
        ScriptedPrompt::default(),
        |settings| {
            settings.last_seq = tip;
            settings.metadata_cache.insert(
                "doc.md".into(),
                DocMetadata {
                    path: "doc.md".into(),
                    rev: rev1.clone(),
                    last_modified: 0,
                },
            );
        },
        &[("doc.md", "A\nB\nC")],
    )
    .await;

    let report = client.service.perform_sync().await;
    assert_success(&report.status);
    assert!(client.prompt.requests().is_empty(), "merge must not prompt");

    // Server holds the union of both edits; the client adopted it.
    let doc = server.get_doc("doc").await;
    assert_eq!(doc["content"], "A\nB2\nC2");
    assert!(doc["_rev"].as_str().unwrap().starts_with("3-"));
    assert_eq!(
        client.vault.read_text("doc.md").await.unwrap().as_deref(),
        Some("A\nB2\nC2")
    );
}

#[tokio::test]
async fn unknown_base_revision_escalates_to_reset() {
    let server = spawn_server().await;

    let rev1 = server.put_doc("doc", None, "server v1").await;
    server.put_doc("doc", Some(&rev1), "server v2").await;
    let tip = server.doc_tip().await;

    let vault = MemoryVault::new();
    vault.seed("doc.md", "local content");

    let mut client = build_client(
        &server.base,
        vault,
        ScriptedPrompt::new([Resolution::FullReset]),
        |settings| {
            settings.last_seq = tip;
            settings.metadata_cache.insert(
                "doc.md".into(),
                DocMetadata {
                    path: "doc.md".into(),
                    // A revision the server never issued and cannot look up.
                    rev: "1-neverstored".into(),
                    last_modified: 0,
                },
            );
        },
        &[],
    )
    .await;

    let report = client.service.perform_sync().await;
    assert!(
        matches!(&report.status, SyncStatus::Error { message } if message.contains("full sync")),
        "got {:?}",
        report.status
    );

    let requests = client.prompt.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].requires_full_sync);

    // State was wiped, files were not.
    assert_eq!(client.service.settings().last_seq, 0);
    assert!(client.service.settings().metadata_cache.is_empty());
    assert!(client.vault.contains("doc.md"));
}

#[tokio::test]
async fn cancelled_pull_conflict_parks_the_cursor() {
    let server = spawn_server().await;

    let vault = MemoryVault::new();
    vault.seed("note.md", "shared line");

    // One cancel for the pull conflict, one for the push conflict the same
    // run still attempts afterwards.
    let mut client = build_client(
        &server.base,
        vault,
        ScriptedPrompt::new([Resolution::Cancel, Resolution::Cancel]),
        |_| {},
        &[],
    )
    .await;

    // Push rev 1 and remember the cursor.
    assert_success(&client.service.perform_sync().await.status);
    let synced_seq = client.service.settings().last_seq;
    let rev1 = server.get_doc("note").await["_rev"].as_str().unwrap().to_owned();

    // Remote rewrites everything; local rewrites everything differently.
    // The saved base ("shared line") makes this a genuine conflict.
    server.put_doc("note", Some(&rev1), "remote rewrite").await;
    client.vault.write_text("note.md", "local rewrite").await.unwrap();

    let report = client.service.perform_sync().await;
    assert_eq!(report.stats.conflicts, 2);
    // Cursor did not advance past the cancelled change.
    assert_eq!(client.service.settings().last_seq, synced_seq);
    // The local file and the server are both untouched.
    assert_eq!(
        client.vault.read_text("note.md").await.unwrap().as_deref(),
        Some("local rewrite")
    );
    assert_eq!(server.get_doc("note").await["content"], "remote rewrite");
}

#[tokio::test]
async fn remote_delete_of_clean_file_applies() {
    let server = spawn_server().await;
    let rev1 = server.put_doc("gone", None, "to be deleted").await;

    let mut client = build_client(
        &server.base,
        MemoryVault::new(),
        ScriptedPrompt::default(),
        |_| {},
        &[],
    )
    .await;
    assert_success(&client.service.perform_sync().await.status);
    assert!(client.vault.contains("gone.md"));

    server.delete_doc("gone", &rev1).await;

    let report = client.service.perform_sync().await;
    assert_success(&report.status);
    assert!(!client.vault.contains("gone.md"));
    assert!(client.prompt.requests().is_empty());
}

#[tokio::test]
async fn remote_delete_of_edited_file_prompts() {
    let server = spawn_server().await;
    let rev1 = server.put_doc("keep", None, "original").await;

    let mut client = build_client(
        &server.base,
        MemoryVault::new(),
        ScriptedPrompt::new([Resolution::UseLocal]),
        |_| {},
        &[],
    )
    .await;
    assert_success(&client.service.perform_sync().await.status);

    // Edit locally, delete remotely.
    client.vault.write_text("keep.md", "local edits").await.unwrap();
    server.delete_doc("keep", &rev1).await;

    let report = client.service.perform_sync().await;
    assert_success(&report.status);

    let requests = client.prompt.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].remote_deleted);

    // UseLocal keeps the file and the push phase recreates the doc.
    assert!(client.vault.contains("keep.md"));
    let doc = server.get_doc("keep").await;
    assert_eq!(doc["content"], "local edits");
    assert_ne!(doc["_deleted"], true);
}

#[tokio::test]
async fn local_deletion_tombstones_on_the_server() {
    let server = spawn_server().await;

    let vault = MemoryVault::new();
    vault.seed("temp.md", "scratch");

    let mut client = build_client(
        &server.base,
        vault,
        ScriptedPrompt::default(),
        |_| {},
        &[],
    )
    .await;
    assert_success(&client.service.perform_sync().await.status);

    client.vault.delete("temp.md").await.unwrap();
    let report = client.service.perform_sync().await;
    assert_success(&report.status);

    let doc = server.get_doc("temp").await;
    assert_eq!(doc["_deleted"], true);
    assert!(client.service.settings().metadata_cache.is_empty());
}

#[tokio::test]
async fn unreachable_server_is_one_error() {
    // Nothing listens here; every request exhausts its retries.
    let vault = MemoryVault::new();
    vault.seed("note.md", "content");

    let mut client = build_client(
        "http://127.0.0.1:9",
        vault,
        ScriptedPrompt::default(),
        |_| {},
        &[],
    )
    .await;

    let report = client.service.perform_sync().await;
    assert!(
        matches!(report.status, SyncStatus::Error { .. }),
        "got {:?}",
        report.status
    );
    assert_eq!(report.stats.errors, 1);
}

#[tokio::test]
async fn cursor_never_decreases() {
    let server = spawn_server().await;
    server.put_doc("a", None, "1").await;

    let mut client = build_client(
        &server.base,
        MemoryVault::new(),
        ScriptedPrompt::default(),
        |_| {},
        &[],
    )
    .await;

    let mut previous = 0;
    for round in 0..3 {
        server.put_doc(&format!("extra{round}"), None, "x").await;
        let report = client.service.perform_sync().await;
        assert_success(&report.status);
        let seq = client.service.settings().last_seq;
        assert!(seq >= previous, "cursor went backwards: {seq} < {previous}");
        previous = seq;
    }
}
