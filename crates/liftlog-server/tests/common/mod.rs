//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use liftlog_extract::WorkoutExtractor;
use liftlog_llm::{MockChatBackend, MockMirror, MockProvisioner, MockReply, MockStructuredBackend};
use liftlog_server::{AppState, Server, ServerConfig};
use liftlog_store::LiftlogStore;

/// Client token every test request presents.
pub const TEST_CLIENT: &str = "test-client";

/// Collaborators a test server is built from.
pub struct TestSetup {
    pub replies: Vec<MockReply>,
    pub provisioner: MockProvisioner,
    pub extraction: Option<MockStructuredBackend>,
    pub with_store: bool,
}

impl Default for TestSetup {
    fn default() -> Self {
        Self {
            replies: vec![MockReply::chunks(["Test ", "response"])],
            provisioner: MockProvisioner::new(),
            extraction: None,
            with_store: true,
        }
    }
}

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// The auth token for the server.
    pub token: String,
    /// HTTP client carrying the test client cookie.
    pub client: Client,
    /// Conversation mirror, for asserting on mirrored turns.
    pub mirror: Arc<MockMirror>,
    /// Shared state the server runs with.
    pub state: AppState,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
    /// Temporary directory for export files.
    pub temp_dir: TempDir,
}

impl TestServer {
    /// Start a new test server with default mocks and an in-memory store.
    pub async fn start() -> Result<Self> {
        Self::start_with(TestSetup::default()).await
    }

    /// Start a server whose chat backend answers with the given replies.
    pub async fn start_with_replies(replies: Vec<MockReply>) -> Result<Self> {
        Self::start_with(TestSetup {
            replies,
            ..Default::default()
        })
        .await
    }

    pub async fn start_with(setup: TestSetup) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let token = "test-token".to_string();

        // Find an available port
        let addr = find_available_port().await?;

        let config = ServerConfig::new(Some(token.clone()))
            .with_bind_address(addr)
            .with_request_logging(false)
            .with_stats_dir(temp_dir.path().join("workout_stats"));

        let mirror = Arc::new(MockMirror::new());
        let mut state = AppState::new(
            config,
            Arc::new(MockChatBackend::new(setup.replies)),
            Arc::new(setup.provisioner),
        )
        .with_mirror(mirror.clone());
        if setup.with_store {
            state = state.with_store(Arc::new(LiftlogStore::open_in_memory()?));
        }
        if let Some(backend) = setup.extraction {
            state = state.with_extractor(WorkoutExtractor::new(Arc::new(backend)));
        }

        // Start server in background
        let server = Server::from_state(state.clone());
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("liftlog_client={TEST_CLIENT}"))?,
        );
        let client = Client::builder().default_headers(headers).build()?;

        // Wait for server to be ready
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            token,
            client,
            mirror,
            state,
            _handle: handle,
            temp_dir,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get an authenticated GET request builder.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Get an authenticated POST request builder.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Get an authenticated DELETE request builder.
    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Ask a question and return the decoded SSE payloads.
    pub async fn ask(&self, question: &str) -> Result<Vec<Value>> {
        let body = self
            .get("/ask")
            .query(&[("question", question)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_sse(&body)
    }

    /// Wait until queued background jobs have run.
    pub async fn settle(&self) {
        for _ in 0..200 {
            if self.state.workers.pending() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Decode the `data:` lines of an SSE body.
pub fn parse_sse(body: &str) -> Result<Vec<Value>> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| Ok(serde_json::from_str(data.trim())?))
        .collect()
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
