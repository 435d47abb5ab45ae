//! Shared fakes for the integration tests
//!
//! `ScriptedTransport` answers each action with a canned envelope (run through
//! the real envelope decoder) and records every request it sees. A responder
//! can stand in for a canned envelope when the answer depends on the request
//! (paging by offset, say).
//! `PanickingTransport` fails the test if the client ever reaches it.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use ckan_explorer::error::{ClientError, Result};
use ckan_explorer::query::{Action, CatalogRequest, ParamValue};
use ckan_explorer::transport::{envelope, ByteStream, CatalogResponse, Transport};
use ckan_explorer::CatalogClient;
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// How `fetch` behaves
#[derive(Clone)]
pub enum Body {
    /// All chunks, then end of stream
    Complete(Vec<&'static [u8]>),
    /// These chunks, then nothing ever again
    Stalls(Vec<&'static [u8]>),
}

type Responder = dyn Fn(&CatalogRequest) -> Value + Send + Sync;

#[derive(Default)]
pub struct ScriptedTransport {
    envelopes: HashMap<&'static str, (u16, Vec<u8>)>,
    responders: HashMap<&'static str, Arc<Responder>>,
    /// Calls never answer
    stalls: bool,
    body: Option<Body>,
    requests: Mutex<Vec<CatalogRequest>>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{"success": true, "result": result}` for `action`
    pub fn success(self, action: Action, result: Value) -> Self {
        self.envelope(action, 200, json!({"success": true, "result": result}))
    }

    pub fn failure(self, action: Action, status: u16, error_type: &str, message: &str) -> Self {
        self.envelope(
            action,
            status,
            json!({
                "success": false,
                "error": {"__type": error_type, "message": message}
            }),
        )
    }

    pub fn envelope(self, action: Action, status: u16, body: Value) -> Self {
        self.raw(action, status, body.to_string().into_bytes())
    }

    pub fn raw(mut self, action: Action, status: u16, body: Vec<u8>) -> Self {
        self.envelopes.insert(action.name(), (status, body));
        self
    }

    /// Success envelope around whatever `f` builds from the request
    pub fn respond<F>(mut self, action: Action, f: F) -> Self
    where
        F: Fn(&CatalogRequest) -> Value + Send + Sync + 'static,
    {
        self.responders.insert(action.name(), Arc::new(f));
        self
    }

    pub fn stalls(mut self) -> Self {
        self.stalls = true;
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn requests(&self) -> Vec<CatalogRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn into_client(self) -> (Arc<Self>, CatalogClient) {
        let transport = Arc::new(self);
        let client = CatalogClient::with_transport(transport.clone());
        (transport, client)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, request: &CatalogRequest) -> CatalogResponse {
        self.requests.lock().unwrap().push(request.clone());
        if self.stalls {
            std::future::pending::<()>().await;
        }
        if let Some(respond) = self.responders.get(request.action().name()) {
            let body = json!({"success": true, "result": respond(request)});
            return envelope::decode(200, body.to_string().as_bytes());
        }
        match self.envelopes.get(request.action().name()) {
            Some((status, body)) => envelope::decode(*status, body),
            None => CatalogResponse::Failure(ClientError::Transport(format!(
                "no script for {}",
                request.action()
            ))),
        }
    }

    async fn fetch(&self, url: &str) -> Result<ByteStream> {
        self.fetched.lock().unwrap().push(url.to_string());
        let to_stream = |chunks: Vec<&'static [u8]>| {
            stream::iter(
                chunks
                    .into_iter()
                    .map(|c| Ok(Bytes::from_static(c)))
                    .collect::<Vec<_>>(),
            )
        };
        match self.body.clone() {
            Some(Body::Complete(chunks)) => Ok(to_stream(chunks).boxed()),
            Some(Body::Stalls(chunks)) => Ok(to_stream(chunks).chain(stream::pending()).boxed()),
            None => Err(ClientError::Transport(format!("HTTP 404 fetching {}", url))),
        }
    }
}

/// Any use is a test failure
pub struct PanickingTransport;

#[async_trait]
impl Transport for PanickingTransport {
    async fn call(&self, request: &CatalogRequest) -> CatalogResponse {
        panic!("transport invoked for {}", request.action());
    }

    async fn fetch(&self, url: &str) -> Result<ByteStream> {
        panic!("fetch invoked for {}", url);
    }
}

pub fn panicking_client() -> CatalogClient {
    CatalogClient::with_transport(Arc::new(PanickingTransport))
}

pub fn param(request: &CatalogRequest, name: &str) -> Option<String> {
    request.get(name).map(ParamValue::render)
}

/// Integer parameter, `default` when absent
pub fn int_param(request: &CatalogRequest, name: &str, default: usize) -> usize {
    param(request, name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn package(name: &str, title: &str) -> Value {
    json!({
        "id": format!("{}-id", name),
        "name": name,
        "title": title,
        "notes": "",
        "organization": {"id": "org-1", "name": "city-of-x", "title": "City of X"},
        "metadata_modified": "2024-03-01T12:30:00.123456",
        "tags": [{"name": "climate"}],
        "num_resources": 1,
        "resources": [{
            "id": format!("{}-res", name),
            "package_id": format!("{}-id", name),
            "name": "data.csv",
            "format": "CSV",
            "url": format!("https://files.example.org/{}.csv", name),
            "size": 2048
        }]
    })
}
