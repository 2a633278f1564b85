//! Test doubles for the HTTP and socket collaborators

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::agent::{AgentContext, AgentNotice};
use crate::http::{HttpClient, HttpError};
use crate::socket::{SocketConnector, SocketHandle};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
    pub token: Option<String>,
}

/// Replays queued responses in order and records every request
#[derive(Default)]
pub(crate) struct ScriptedHttpClient {
    responses: Mutex<VecDeque<Result<Value, HttpError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, response: Result<Value, HttpError>) -> &Self {
        self.responses.lock().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    fn next(&self, request: RecordedRequest) -> Result<Value, HttpError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::Request("no scripted response".into())))
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn get_json(&self, url: &str, token: Option<&str>) -> Result<Value, HttpError> {
        self.next(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            body: None,
            token: token.map(str::to_string),
        })
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        token: Option<&str>,
    ) -> Result<Value, HttpError> {
        self.next(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            body: Some(body.clone()),
            token: token.map(str::to_string),
        })
    }
}

struct RecordedConnection {
    url: String,
    shutdown: mpsc::UnboundedReceiver<()>,
    closes: usize,
}

/// Records connect calls without touching the network
#[derive(Default)]
pub(crate) struct RecordingConnector {
    connections: Mutex<Vec<RecordedConnection>>,
}

impl RecordingConnector {
    pub fn urls(&self) -> Vec<String> {
        self.connections
            .lock()
            .iter()
            .map(|c| c.url.clone())
            .collect()
    }

    /// Close requests received so far by the `index`th connection
    pub fn close_requests(&self, index: usize) -> usize {
        let mut connections = self.connections.lock();
        let Some(connection) = connections.get_mut(index) else {
            return 0;
        };
        while connection.shutdown.try_recv().is_ok() {
            connection.closes += 1;
        }
        connection.closes
    }
}

impl SocketConnector for RecordingConnector {
    fn connect(
        &self,
        url: &str,
        _agent: &str,
        _events: mpsc::UnboundedSender<AgentNotice>,
    ) -> SocketHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.lock().push(RecordedConnection {
            url: url.to_string(),
            shutdown: rx,
            closes: 0,
        });
        SocketHandle::new(url, tx)
    }
}

pub(crate) fn agent_context() -> (
    AgentContext,
    mpsc::UnboundedReceiver<AgentNotice>,
    Arc<RecordingConnector>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sockets = Arc::new(RecordingConnector::default());
    let ctx = AgentContext::new(tx, sockets.clone());
    (ctx, rx, sockets)
}
