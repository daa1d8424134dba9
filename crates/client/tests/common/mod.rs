//! Shared harness: a real server on an ephemeral port plus a client wired
//! to an in-memory vault and a scripted conflict prompt.

#![allow(dead_code)]

use std::sync::Arc;

use vaultsync_client::conflict::ScriptedPrompt;
use vaultsync_client::{
    BaseContentStore, MemoryVault, RetryPolicy, Settings, SettingsStore, SyncService, Transport,
};
use vaultsync_server::{router, State};

pub const TEST_KEY: &str = "test-key";

pub struct TestServer {
    pub base: String,
    pub http: reqwest::Client,
}

pub async fn spawn_server() -> TestServer {
    let state = State::ephemeral(Some(TEST_KEY.to_owned()))
        .await
        .expect("ephemeral server state");
    let app = router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    TestServer {
        base: format!("http://{addr}"),
        http: reqwest::Client::new(),
    }
}

impl TestServer {
    /// PUT a document as if from another device; returns the new rev.
    pub async fn put_doc(&self, id: &str, rev: Option<&str>, content: &str) -> String {
        let mut body = serde_json::json!({ "content": content });
        if let Some(rev) = rev {
            body["_rev"] = serde_json::Value::String(rev.to_owned());
        }
        let response: serde_json::Value = self
            .http
            .put(format!("{}/api/docs/{}", self.base, encode(id)))
            .bearer_auth(TEST_KEY)
            .json(&body)
            .send()
            .await
            .expect("put doc")
            .json()
            .await
            .expect("put doc body");
        response["rev"]
            .as_str()
            .unwrap_or_else(|| panic!("no rev in {response}"))
            .to_owned()
    }

    pub async fn get_doc(&self, id: &str) -> serde_json::Value {
        self.http
            .get(format!("{}/api/docs/{}", self.base, encode(id)))
            .bearer_auth(TEST_KEY)
            .send()
            .await
            .expect("get doc")
            .json()
            .await
            .expect("doc body")
    }

    pub async fn delete_doc(&self, id: &str, rev: &str) {
        let response = self
            .http
            .delete(format!(
                "{}/api/docs/{}?rev={rev}",
                self.base,
                encode(id)
            ))
            .bearer_auth(TEST_KEY)
            .send()
            .await
            .expect("delete doc");
        assert!(response.status().is_success(), "{}", response.status());
    }

    pub async fn upload_attachment(&self, path: &str, bytes: &[u8]) -> serde_json::Value {
        self.http
            .put(format!("{}/api/attachments/{}", self.base, encode(path)))
            .bearer_auth(TEST_KEY)
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .expect("upload")
            .json()
            .await
            .expect("upload body")
    }

    pub async fn attachment_meta(&self, id: &str) -> serde_json::Value {
        self.http
            .get(format!("{}/api/attachments/{}", self.base, encode(id)))
            .bearer_auth(TEST_KEY)
            .send()
            .await
            .expect("meta")
            .json()
            .await
            .expect("meta body")
    }

    /// Current document-feed tip for the default vault.
    pub async fn doc_tip(&self) -> i64 {
        let status: serde_json::Value = self
            .http
            .get(format!("{}/api/status", self.base))
            .bearer_auth(TEST_KEY)
            .send()
            .await
            .expect("status")
            .json()
            .await
            .expect("status body");
        status["last_seq"].as_i64().expect("last_seq")
    }
}

fn encode(raw: &str) -> String {
    raw.replace(':', "%3A").replace('/', "%2F")
}

pub struct TestClient {
    pub vault: MemoryVault,
    pub prompt: Arc<ScriptedPrompt>,
    pub service: SyncService,
    _settings_dir: tempfile::TempDir,
}

/// Build a client against `server`. `tweak` adjusts the settings (cursors,
/// seeded metadata, toggles) before the service is constructed;
/// `base_seeds` pre-populates the base-content store.
pub async fn build_client(
    server_url: &str,
    vault: MemoryVault,
    prompt: ScriptedPrompt,
    tweak: impl FnOnce(&mut Settings),
    base_seeds: &[(&str, &str)],
) -> TestClient {
    let settings_dir = tempfile::tempdir().expect("settings dir");
    let settings_store = SettingsStore::new(settings_dir.path().join("settings.json"));

    let mut settings = Settings {
        server_url: server_url.to_owned(),
        api_key: TEST_KEY.to_owned(),
        ..Default::default()
    };
    tweak(&mut settings);

    let base_store = BaseContentStore::in_memory().await;
    for (path, content) in base_seeds {
        base_store.set(path, content).await;
    }

    let prompt = Arc::new(prompt);
    let service = SyncService::new(
        settings,
        settings_store,
        Arc::new(vault.clone()),
        prompt.clone(),
        base_store,
        Transport::new(RetryPolicy::immediate()),
    )
    .expect("sync service");

    TestClient {
        vault,
        prompt,
        service,
        _settings_dir: settings_dir,
    }
}
