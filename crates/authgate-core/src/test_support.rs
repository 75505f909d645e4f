//! Scripted transport for protocol tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::api::{AuthError, HttpResponse, RequestSpec, Transport};
use crate::auth::{LoginController, LoginPresenter};

#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<HttpResponse, AuthError>>>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<Vec<RequestSpec>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: StatusCode, body: Value) {
        self.push(path, Ok(HttpResponse::new(status, body.to_string())));
    }

    pub fn fail(&self, path: &str, message: &str) {
        self.push(path, Err(AuthError::Transport(message.to_string())));
    }

    fn push(&self, path: &str, result: Result<HttpResponse, AuthError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(result);
    }

    /// Calls to `path` block until `release` is called for them
    pub fn hold(&self, path: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(path.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, path: &str, calls: usize) {
        if let Some(gate) = self.gates.lock().unwrap().get(path) {
            gate.add_permits(calls);
        }
    }

    pub fn calls(&self) -> Vec<RequestSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, AuthError> {
        self.calls.lock().unwrap().push(request.clone());

        let gate = self.gates.lock().unwrap().get(&request.path).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        self.responses
            .lock()
            .unwrap()
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(HttpResponse::new(StatusCode::NOT_FOUND, "")))
    }
}

pub fn object(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

/// Keeps every controller it is handed, like an open dialog would
#[derive(Default)]
pub struct HoldingPresenter {
    pub open: Mutex<Vec<LoginController>>,
}

impl HoldingPresenter {
    pub fn take(&self) -> Option<LoginController> {
        self.open.lock().unwrap().pop()
    }

    pub fn count(&self) -> usize {
        self.open.lock().unwrap().len()
    }
}

impl LoginPresenter for HoldingPresenter {
    fn present(&self, controller: LoginController) {
        self.open.lock().unwrap().push(controller);
    }
}
