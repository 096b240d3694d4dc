#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::{Value, json};
use tableau_core::TableauControlPlane;
use tableau_core::client::{HttpSettings, RetryPolicy};
use tableau_core::config::TableauSettings;
use tableau_core::credentials::CredentialCache;

pub const API_VERSION: &str = "3.22";

#[derive(Clone)]
pub struct Canned {
    pub status: StatusCode,
    pub body: String,
}

impl Canned {
    pub fn json(value: &Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: value.to_string(),
        }
    }

    pub fn status(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// Records every request the fake Tableau server receives.
#[derive(Default)]
pub struct Recorded {
    pub signins: AtomicUsize,
    pub metadata_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub read_metadata_calls: AtomicUsize,
    pub auth_headers: Mutex<Vec<String>>,
    pub signin_bodies: Mutex<Vec<Value>>,
    pub metadata_bodies: Mutex<Vec<Value>>,
    pub query_bodies: Mutex<Vec<Value>>,
}

pub struct FakeTableau {
    pub recorded: Recorded,
    signin: Mutex<Option<Canned>>,
    metadata: Mutex<Canned>,
    query: Mutex<Canned>,
    read_metadata: Mutex<Canned>,
    query_failures: Mutex<Vec<Canned>>,
}

impl FakeTableau {
    fn new() -> Self {
        Self {
            recorded: Recorded::default(),
            signin: Mutex::new(None),
            metadata: Mutex::new(Canned::json(&superstore_dictionary())),
            query: Mutex::new(Canned::json(&region_rows(10))),
            read_metadata: Mutex::new(Canned::json(&superstore_data_model())),
            query_failures: Mutex::new(Vec::new()),
        }
    }

    pub fn set_signin(&self, canned: Canned) {
        *self.signin.lock().unwrap() = Some(canned);
    }

    pub fn set_metadata(&self, canned: Canned) {
        *self.metadata.lock().unwrap() = canned;
    }

    pub fn set_query(&self, canned: Canned) {
        *self.query.lock().unwrap() = canned;
    }

    pub fn set_read_metadata(&self, canned: Canned) {
        *self.read_metadata.lock().unwrap() = canned;
    }

    /// Queues responses served before the regular query response.
    pub fn fail_queries_with(&self, failures: Vec<Canned>) {
        *self.query_failures.lock().unwrap() = failures;
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn record_auth(&self, headers: &HeaderMap) {
        let value = headers
            .get("x-tableau-auth")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.recorded.auth_headers.lock().unwrap().push(value);
    }
}

fn respond(canned: Canned) -> Response {
    (
        canned.status,
        [(header::CONTENT_TYPE, "application/json")],
        canned.body,
    )
        .into_response()
}

async fn signin(State(fake): State<Arc<FakeTableau>>, body: String) -> Response {
    let n = fake.recorded.signins.fetch_add(1, Ordering::SeqCst) + 1;
    fake.recorded
        .signin_bodies
        .lock()
        .unwrap()
        .push(serde_json::from_str(&body).unwrap_or(Value::Null));
    let canned = fake.signin.lock().unwrap().clone();
    respond(canned.unwrap_or_else(|| {
        Canned::json(&json!({
            "credentials": {
                "site": {"id": "site-id", "contentUrl": "analytics"},
                "user": {"id": "user-id"},
                "token": format!("session-{n}")
            }
        }))
    }))
}

async fn metadata(
    State(fake): State<Arc<FakeTableau>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    fake.recorded.metadata_calls.fetch_add(1, Ordering::SeqCst);
    fake.record_auth(&headers);
    fake.recorded
        .metadata_bodies
        .lock()
        .unwrap()
        .push(serde_json::from_str(&body).unwrap_or(Value::Null));
    respond(fake.metadata.lock().unwrap().clone())
}

async fn query(State(fake): State<Arc<FakeTableau>>, headers: HeaderMap, body: String) -> Response {
    fake.recorded.query_calls.fetch_add(1, Ordering::SeqCst);
    fake.record_auth(&headers);
    fake.recorded
        .query_bodies
        .lock()
        .unwrap()
        .push(serde_json::from_str(&body).unwrap_or(Value::Null));
    let failure = {
        let mut failures = fake.query_failures.lock().unwrap();
        if failures.is_empty() {
            None
        } else {
            Some(failures.remove(0))
        }
    };
    respond(failure.unwrap_or_else(|| fake.query.lock().unwrap().clone()))
}

async fn read_metadata(State(fake): State<Arc<FakeTableau>>, headers: HeaderMap) -> Response {
    fake.recorded.read_metadata_calls.fetch_add(1, Ordering::SeqCst);
    fake.record_auth(&headers);
    respond(fake.read_metadata.lock().unwrap().clone())
}

/// Starts the fake server and returns it with its base URL.
pub async fn spawn_fake() -> (Arc<FakeTableau>, String) {
    let fake = Arc::new(FakeTableau::new());
    let app = Router::new()
        .route(&format!("/api/{API_VERSION}/auth/signin"), post(signin))
        .route("/api/metadata/graphql", post(metadata))
        .route("/api/v1/vizql-data-service/query-datasource", post(query))
        .route("/api/v1/vizql-data-service/read-metadata", post(read_metadata))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake tableau");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake tableau server");
    });
    (fake, format!("http://{addr}"))
}

pub fn settings(domain: &str) -> TableauSettings {
    TableauSettings {
        domain: domain.to_string(),
        site: "analytics".to_string(),
        api_version: API_VERSION.to_string(),
        user: "agent@example.com".to_string(),
        jwt_client_id: "client-id".to_string(),
        jwt_secret_id: "secret-id".to_string(),
        jwt_secret: "top-secret".to_string(),
        jwt_scopes: vec![
            "tableau:content:read".to_string(),
            "tableau:viz_data_service:read".to_string(),
        ],
    }
}

pub fn http_settings() -> HttpSettings {
    HttpSettings::new(Duration::from_secs(5))
        .with_retry(RetryPolicy::new(3, Duration::from_millis(5)))
}

pub async fn control_plane() -> (Arc<FakeTableau>, TableauControlPlane) {
    let (fake, base) = spawn_fake().await;
    let control = TableauControlPlane::new(settings(&base), http_settings(), CredentialCache::new())
        .expect("control plane");
    (fake, control)
}

pub fn superstore_dictionary() -> Value {
    json!({
        "data": {
            "publishedDatasources": [{
                "name": "Superstore Datasource",
                "description": "Orders and returns",
                "owner": {"name": "Ana Analyst"},
                "fields": [
                    {"name": "Region", "description": "Sales region", "isHidden": false},
                    {"name": "Sales", "description": null, "isHidden": false},
                    {"name": "Row ID", "description": "", "isHidden": true}
                ]
            }]
        }
    })
}

pub fn superstore_data_model() -> Value {
    json!({
        "data": [
            {
                "fieldName": "Region",
                "fieldCaption": "Region",
                "dataType": "STRING",
                "logicalTableId": "Orders_ECFCA1FB690A41FE803BC071773BA862"
            },
            {
                "fieldName": "Sales",
                "fieldCaption": "Sales",
                "dataType": "REAL",
                "defaultAggregation": "SUM",
                "logicalTableId": "Orders_ECFCA1FB690A41FE803BC071773BA862"
            }
        ]
    })
}

pub fn region_rows(count: usize) -> Value {
    let regions = ["Central", "East", "South", "West"];
    let rows: Vec<Value> = (0..count)
        .map(|index| json!({"Region": format!("{}-{index}", regions[index % regions.len()])}))
        .collect();
    json!({ "data": rows })
}
