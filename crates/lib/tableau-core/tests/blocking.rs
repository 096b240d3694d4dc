mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{Canned, FakeTableau, http_settings, spawn_fake};
use serde_json::json;
use tableau_core::TableauError;
use tableau_core::client::metadata::MetadataClient;
use tokio::runtime::Runtime;

const LUID: &str = "2c4e7b8a-5f1e-4f6c-9a9e-0d1c2b3a4f5e";

/// The fake keeps serving on the runtime's worker threads after `block_on`
/// returns, so the calling thread is outside any runtime.
fn fake_on_background_runtime() -> (Runtime, Arc<FakeTableau>, String) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("runtime");
    let (fake, base) = runtime.block_on(spawn_fake());
    (runtime, fake, base)
}

#[test]
fn blocking_fetch_returns_the_dictionary() {
    let (_runtime, fake, base) = fake_on_background_runtime();
    let client = MetadataClient::from_settings(http_settings()).expect("client");

    let dictionary = client
        .get_data_dictionary_blocking("session-token", &base, LUID)
        .expect("dictionary");

    assert_eq!(dictionary.name.as_deref(), Some("Superstore Datasource"));
    assert_eq!(dictionary.fields.len(), 3);
    assert_eq!(FakeTableau::count(&fake.recorded.metadata_calls), 1);
    assert_eq!(fake.recorded.auth_headers.lock().unwrap()[0], "session-token");
    let bodies = fake.recorded.metadata_bodies.lock().unwrap().clone();
    assert_eq!(bodies[0]["variables"]["luid"], json!(LUID));
}

#[test]
fn blocking_fetch_reports_upstream_errors() {
    let (_runtime, fake, base) = fake_on_background_runtime();
    fake.set_metadata(Canned::status(StatusCode::FORBIDDEN, "{\"error\":\"denied\"}"));
    let client = MetadataClient::from_settings(http_settings()).expect("client");

    let err = client
        .get_data_dictionary_blocking("session-token", &base, LUID)
        .expect_err("should fail");

    assert!(matches!(err, TableauError::MetadataApi { status: 403, .. }));
    assert!(err.body().unwrap_or_default().contains("denied"));
}
