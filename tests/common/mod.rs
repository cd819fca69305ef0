#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use policy_gateway::config::ApiConfig;
use policy_gateway::gateway::{
    GatewayError, PolicyDates, PolicyRecord, PolicySession, SessionOpener, SshCredentials,
};
use policy_gateway::{app, AppState};

/// How the fake upstream should misbehave, if at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    None,
    AuthRejected,
    TunnelDown,
    QueryFails,
}

/// In-memory stand-in for the SSH tunnel + MySQL pair. Records every open and
/// close so tests can check that no session is left behind.
pub struct FakeGateway {
    table: Arc<Mutex<Vec<PolicyRecord>>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
    failure: Failure,
}

impl FakeGateway {
    pub fn new(rows: Vec<Value>) -> Arc<Self> {
        Self::with_failure(rows, Failure::None)
    }

    pub fn with_failure(rows: Vec<Value>, failure: Failure) -> Arc<Self> {
        let table = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(map) => map,
                other => panic!("fixture rows must be objects, got {}", other),
            })
            .collect();

        Arc::new(Self {
            table: Arc::new(Mutex::new(table)),
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            updates: Arc::new(AtomicUsize::new(0)),
            failure,
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn row(&self, id: i64) -> Option<PolicyRecord> {
        self.table
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.get("id").and_then(Value::as_i64) == Some(id))
            .cloned()
    }
}

#[async_trait]
impl SessionOpener for FakeGateway {
    async fn open(&self, _credentials: &SshCredentials) -> Result<Box<dyn PolicySession>, GatewayError> {
        match self.failure {
            Failure::AuthRejected => {
                return Err(GatewayError::AuthenticationRejected {
                    user: "deploy".to_string(),
                })
            }
            Failure::TunnelDown => return Err(GatewayError::Tunnel("connection refused".to_string())),
            _ => {}
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            table: Arc::clone(&self.table),
            closed: Arc::clone(&self.closed),
            updates: Arc::clone(&self.updates),
            fail_queries: self.failure == Failure::QueryFails,
        }))
    }
}

struct FakeSession {
    table: Arc<Mutex<Vec<PolicyRecord>>>,
    closed: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
    fail_queries: bool,
}

impl FakeSession {
    fn check(&self) -> Result<(), GatewayError> {
        if self.fail_queries {
            Err(GatewayError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PolicySession for FakeSession {
    async fn recent_policies(&mut self, limit: u32) -> Result<Vec<PolicyRecord>, GatewayError> {
        self.check()?;
        let mut rows = self.table.lock().unwrap().clone();
        rows.sort_by_key(|row| std::cmp::Reverse(row.get("id").and_then(Value::as_i64)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn find_policy(&mut self, policy_id: &str) -> Result<Option<PolicyRecord>, GatewayError> {
        self.check()?;
        Ok(self
            .table
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.get("policy_id").and_then(Value::as_str) == Some(policy_id))
            .cloned())
    }

    async fn update_policy_dates(
        &mut self,
        policy_id: &str,
        dates: &PolicyDates,
    ) -> Result<u64, GatewayError> {
        self.check()?;
        self.updates.fetch_add(1, Ordering::SeqCst);

        let mut matched = 0;
        for row in self.table.lock().unwrap().iter_mut() {
            if row.get("policy_id").and_then(Value::as_str) == Some(policy_id) {
                row.insert("policy_start".into(), json!(dates.policy_start));
                row.insert("policy_end".into(), json!(dates.policy_end));
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn policy(id: i64, policy_id: &str) -> Value {
    json!({
        "id": id,
        "policy_id": policy_id,
        "policy_start": "2023-01-01",
        "policy_end": "2024-01-01",
        "product": "home"
    })
}

pub fn router(gateway: Arc<FakeGateway>) -> Router {
    app(AppState::new(gateway), &ApiConfig::default())
}

/// Request builder with the three credential headers already set.
pub fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    with_credentials(method, uri, "/keys/id_ed25519", "passphrase")
}

pub fn with_credentials(
    method: &str,
    uri: &str,
    cert_location: &str,
    password: &str,
) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Cert-Location", cert_location)
        .header("X-SSH-User", "deploy")
        .header("X-SSH-Password", password)
}

pub fn json_body(value: Value) -> Body {
    Body::from(value.to_string())
}

/// Send one request and decode the JSON response body.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response is JSON")
    };
    (status, body)
}
