//! API description loading and operation resolution
//!
//! Reads an OpenAPI 3 (`servers`, `paths`) or Swagger 2 (`schemes`, `host`,
//! `basePath`, `paths`) JSON document and turns
//! `{operation_id, params}` into a concrete [`ApiRequest`].
//!
//! Parameters named in the path template are substituted; parameters
//! declared `in: header` become headers, a declared `in: body` parameter
//! becomes the JSON body, and everything else is sent as query.

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::errors::SpecError;
use super::request::ApiRequest;

const METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Where a declared parameter travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
}

impl ParamLocation {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "path" => Some(Self::Path),
            "query" | "formData" => Some(Self::Query),
            "header" => Some(Self::Header),
            "body" => Some(Self::Body),
            _ => None,
        }
    }
}

/// One operation of the description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSpec {
    pub id: String,
    pub method: Method,
    /// Path template, e.g. `/v1/campaigns/{campaignId}`.
    pub path: String,
    pub params: BTreeMap<String, ParamLocation>,
}

impl OperationSpec {
    /// Names between braces in the path template, in order.
    #[must_use]
    pub fn path_param_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.path.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else { break };
            names.push(&after[..close]);
            rest = &after[close + 1..];
        }
        names
    }
}

/// Caller's view of one operation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationRequest {
    pub operation_id: String,
    pub params: BTreeMap<String, Value>,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl OperationRequest {
    #[must_use]
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self { operation_id: operation_id.into(), ..Self::default() }
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Operation catalog parsed from an API description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSpec {
    base_url: Option<String>,
    operations: BTreeMap<String, OperationSpec>,
}

impl ApiSpec {
    /// Parse an already-decoded description document.
    ///
    /// Operations without an `operationId` cannot be addressed and are
    /// skipped.
    ///
    /// # Errors
    /// Returns `SpecError::Invalid` when `paths` is missing or malformed.
    pub fn from_value(doc: &Value) -> Result<Self, SpecError> {
        let paths = doc
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| SpecError::Invalid("missing `paths` object".to_string()))?;

        let mut operations = BTreeMap::new();
        for (path, item) in paths {
            let item = item
                .as_object()
                .ok_or_else(|| SpecError::Invalid(format!("path item {path} is not an object")))?;
            let shared = declared_params(item.get("parameters"));

            for (key, operation) in item {
                if !METHODS.contains(&key.as_str()) {
                    continue;
                }
                let Some(id) = operation.get("operationId").and_then(Value::as_str) else {
                    debug!(%path, method = %key, "skipping operation without operationId");
                    continue;
                };
                let method = Method::from_bytes(key.to_ascii_uppercase().as_bytes())
                    .map_err(|e| SpecError::Invalid(format!("{key} {path}: {e}")))?;

                let mut params = shared.clone();
                params.extend(declared_params(operation.get("parameters")));

                operations.insert(
                    id.to_string(),
                    OperationSpec { id: id.to_string(), method, path: path.clone(), params },
                );
            }
        }

        Ok(Self { base_url: base_url_of(doc), operations })
    }

    /// Load a JSON description from the local filesystem.
    ///
    /// # Errors
    /// Returns `SpecError::Load` when the file cannot be read or decoded.
    pub async fn from_path(path: &Path) -> Result<Self, SpecError> {
        let location = path.display().to_string();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SpecError::Load { location: location.clone(), message: e.to_string() })?;
        let doc: Value = serde_json::from_str(&contents)
            .map_err(|e| SpecError::Load { location: location.clone(), message: e.to_string() })?;

        info!(location = %location, "API description loaded");
        Self::from_value(&doc)
    }

    /// Fetch a JSON description over HTTP.
    ///
    /// # Errors
    /// Returns `SpecError::Load` on network failure, a non-success status or
    /// a body that is not JSON.
    pub async fn from_url(url: &str) -> Result<Self, SpecError> {
        let load_error =
            |message: String| SpecError::Load { location: url.to_string(), message };

        let response = reqwest::get(url).await.map_err(|e| load_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(load_error(format!("status {status}")));
        }
        let doc: Value = response.json().await.map_err(|e| load_error(e.to_string()))?;

        info!(location = %url, "API description loaded");
        Self::from_value(&doc)
    }

    /// Load from an `http(s)://` URL or a local path.
    ///
    /// # Errors
    /// See [`ApiSpec::from_url`] and [`ApiSpec::from_path`].
    pub async fn load(location: &str) -> Result<Self, SpecError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::from_url(location).await
        } else {
            Self::from_path(Path::new(location)).await
        }
    }

    /// Server address declared by the document, if absolute.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Sorted operation ids.
    #[must_use]
    pub fn operations(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn operation(&self, id: &str) -> Option<&OperationSpec> {
        self.operations.get(id)
    }

    /// Build the concrete request for `call`.
    ///
    /// `base_override` replaces the document's server address entirely.
    ///
    /// # Errors
    /// - `UnknownOperation` for an id the document does not declare
    /// - `MissingPathParam` when a templated segment has no value
    /// - `NoBaseUrl` when neither the document nor the caller gives a server
    /// - `InvalidUrl` when the base address does not parse
    pub fn resolve(
        &self,
        call: &OperationRequest,
        base_override: Option<&str>,
    ) -> Result<ApiRequest, SpecError> {
        let operation = self
            .operations
            .get(&call.operation_id)
            .ok_or_else(|| SpecError::UnknownOperation(call.operation_id.clone()))?;
        let base = base_override
            .or(self.base_url.as_deref())
            .ok_or_else(|| SpecError::NoBaseUrl(operation.id.clone()))?;

        let path_names = operation.path_param_names();
        let mut values = BTreeMap::new();
        for name in &path_names {
            let value = call.params.get(*name).and_then(param_text).ok_or_else(|| {
                SpecError::MissingPathParam {
                    operation: operation.id.clone(),
                    name: (*name).to_string(),
                }
            })?;
            values.insert(format!("{{{name}}}"), value);
        }

        // Substitute per segment so a value containing `/` stays one segment.
        let segments: Vec<String> = operation
            .path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                values
                    .iter()
                    .fold(segment.to_string(), |acc, (placeholder, value)| acc.replace(placeholder, value))
            })
            .collect();

        let mut url = Url::parse(base)
            .map_err(|e| SpecError::InvalidUrl { url: base.to_string(), message: e.to_string() })?;
        url.path_segments_mut()
            .map_err(|()| SpecError::InvalidUrl {
                url: base.to_string(),
                message: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(&segments);

        let mut request = ApiRequest::new(operation.method.clone(), url.to_string());
        request.operation_id = Some(operation.id.clone());
        request.headers.clone_from(&call.headers);
        request.body.clone_from(&call.body);

        for (name, value) in &call.params {
            if path_names.contains(&name.as_str()) {
                continue;
            }
            match operation.params.get(name) {
                Some(ParamLocation::Header) => {
                    if let Some(text) = param_text(value) {
                        request.headers.entry(name.clone()).or_insert(text);
                    }
                }
                Some(ParamLocation::Body) => {
                    if request.body.is_none() {
                        request.body = Some(value.clone());
                    }
                }
                Some(ParamLocation::Path | ParamLocation::Query) | None => {
                    push_query(&mut request.query, name, value);
                }
            }
        }

        Ok(request)
    }
}

fn declared_params(raw: Option<&Value>) -> BTreeMap<String, ParamLocation> {
    raw.and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|param| {
            let name = param.get("name")?.as_str()?;
            let location = ParamLocation::parse(param.get("in")?.as_str()?)?;
            Some((name.to_string(), location))
        })
        .collect()
}

fn base_url_of(doc: &Value) -> Option<String> {
    if let Some(url) = doc
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .and_then(|server| server.get("url"))
        .and_then(Value::as_str)
    {
        return Url::parse(url).ok().map(|_| url.trim_end_matches('/').to_string());
    }

    let host = doc.get("host").and_then(Value::as_str)?;
    let scheme = doc
        .get("schemes")
        .and_then(Value::as_array)
        .and_then(|schemes| schemes.first())
        .and_then(Value::as_str)
        .unwrap_or("https");
    let base_path = doc.get("basePath").and_then(Value::as_str).unwrap_or("");
    Some(format!("{scheme}://{host}{}", base_path.trim_end_matches('/')))
}

fn param_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => {
            Some(items.iter().filter_map(param_text).collect::<Vec<_>>().join(","))
        }
        other => Some(other.to_string()),
    }
}

fn push_query(query: &mut Vec<(String, String)>, name: &str, value: &Value) {
    if let Some(text) = param_text(value) {
        query.push((name.to_string(), text));
    }
}
