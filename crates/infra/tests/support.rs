//! Shared helpers for infra integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tokenrelay_domain::{ClientConfig, OAuthSettings, RetrySettings};

/// Install a test-writer subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Swagger 2 description with two operations.
pub fn employer_description() -> Value {
    json!({
        "swagger": "2.0",
        "host": "placeholder.invalid",
        "schemes": ["https"],
        "paths": {
            "/employer": {"get": {"operationId": "getEmployerInfo"}},
            "/campaigns/{campaignId}": {
                "get": {
                    "operationId": "getCampaign",
                    "parameters": [{"name": "campaignId", "in": "path", "required": true}]
                }
            }
        }
    })
}

/// Write the description to `dir` and return its path.
pub fn write_description(dir: &Path) -> PathBuf {
    let path = dir.join("api.json");
    std::fs::write(&path, employer_description().to_string()).expect("description written");
    path
}

/// Configuration pointing both the token endpoint and the API at `server_uri`.
pub fn config_for(server_uri: &str, spec: &Path) -> ClientConfig {
    let mut oauth =
        OAuthSettings::new("client-1".to_string(), "secret-1".to_string(), server_uri.to_string());
    oauth.refresh_token = Some("seed-refresh".to_string());

    ClientConfig {
        oauth,
        retry: RetrySettings { wait_unit_ms: 10, request_timeout_ms: 2_000, ..Default::default() },
        api_base_url: Some(server_uri.to_string()),
        spec_location: Some(spec.display().to_string()),
    }
}
