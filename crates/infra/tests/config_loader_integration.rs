//! Integration tests for configuration loader
//!
//! Tests layer precedence end to end: explicit values over the environment,
//! the environment over a file, a file over the fallbacks.

use std::collections::HashMap;
use std::io::Write;

use tempfile::NamedTempFile;
use tokenrelay_domain::NotFoundPolicy;
use tokenrelay_infra::config::{self, PartialConfig};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    move |key| map.get(key).cloned()
}

fn config_file(extension: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write to temp file");
    file
}

#[test]
fn test_full_precedence_chain() {
    let file = config_file(
        "toml",
        r#"
client_id = "from-file"
client_secret = "file-secret"
base_site = "https://file.example.com"
retry_budget = 7
retry_wait_ms = 250
"#,
    );

    let lookup = env(&[
        ("TOKENRELAY_CLIENT_ID", "from-env"),
        ("TOKENRELAY_RETRY_BUDGET", "5"),
        ("TOKENRELAY_NOT_FOUND_POLICY", "fail"),
    ]);
    let explicit = PartialConfig { retry_budget: Some(1), ..PartialConfig::default() };

    let resolved = config::load_with(explicit, Some(file.path()), lookup).unwrap();

    assert_eq!(resolved.oauth.client_id, "from-env");
    assert_eq!(resolved.oauth.client_secret, "file-secret");
    assert_eq!(resolved.oauth.base_site, "https://file.example.com");
    assert_eq!(resolved.retry.budget, 1);
    assert_eq!(resolved.retry.wait_unit_ms, 250);
    assert_eq!(resolved.retry.not_found, NotFoundPolicy::Fail);
    assert_eq!(resolved.oauth.access_token_path, "/oauth/token");
    assert_eq!(resolved.oauth.redirect_uri, "http://localhost:4321");
    assert_eq!(resolved.retry.request_timeout_ms, 30_000);
}

#[test]
fn test_file_named_by_environment() {
    let file = config_file(
        "json",
        r#"{
            "client_id": "json-id",
            "client_secret": "json-secret",
            "base_site": "https://json.example.com",
            "spec_location": "https://json.example.com/swagger.json"
        }"#,
    );
    let path = file.path().display().to_string();
    let lookup = env(&[("TOKENRELAY_CONFIG", path.as_str())]);

    let resolved = config::load_with(PartialConfig::default(), None, lookup).unwrap();

    assert_eq!(resolved.oauth.client_id, "json-id");
    assert_eq!(resolved.spec_location.as_deref(), Some("https://json.example.com/swagger.json"));
    assert_eq!(resolved.oauth.refresh_token, None);
}

#[test]
fn test_missing_required_field_is_config_error() {
    let lookup = env(&[("TOKENRELAY_CLIENT_ID", "only-id")]);
    let err = config::load_with(PartialConfig::default(), None, lookup).unwrap_err();
    assert!(err.to_string().contains("client_secret"));
}

#[test]
fn test_missing_config_file_is_error() {
    let lookup = env(&[("TOKENRELAY_CONFIG", "/definitely/not/here.toml")]);
    assert!(config::load_with(PartialConfig::default(), None, lookup).is_err());
}

#[test]
fn test_invalid_environment_number_is_error() {
    let lookup = env(&[
        ("TOKENRELAY_CLIENT_ID", "id"),
        ("TOKENRELAY_CLIENT_SECRET", "secret"),
        ("TOKENRELAY_BASE_SITE", "https://auth.example.com"),
        ("TOKENRELAY_RETRY_BUDGET", "three"),
    ]);
    assert!(config::load_with(PartialConfig::default(), None, lookup).is_err());
}
