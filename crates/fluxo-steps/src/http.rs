//! HTTP request step.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::debug;

use fluxo_core::{ExecutionContext, Step, StepError, StepValue, Tools};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Performs a single HTTP request described by interpolated options:
/// `url` (required), `method` (default GET), `headers`, `body`,
/// `timeoutSeconds`.
///
/// The response body becomes the step result and, unless
/// `options.output == false`, the context output as `{ "body": ... }`. A
/// `{name}-metadata` global records status, headers, url, method and
/// timestamp for later interpolation.
pub struct HttpRequestStep {
    client: reqwest::Client,
}

impl HttpRequestStep {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for HttpRequestStep {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request and record the response body"
    }

    async fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        options: &Value,
        _tools: &Tools,
    ) -> Result<StepValue, StepError> {
        let url = options
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::Options("http_request requires a url".into()))?;
        let method = options
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET");
        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| StepError::Options(format!("unsupported HTTP method '{}'", method)))?;
        let timeout = options
            .get("timeoutSeconds")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);

        let mut request = self
            .client
            .request(method.clone(), url)
            .timeout(Duration::from_secs(timeout));
        if let Some(Value::Object(headers)) = options.get("headers") {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key, value);
                }
            }
        }
        if let Some(body) = options.get("body") {
            request = request.json(body);
        }

        debug!(%method, url, "sending http request");
        let response = request.send().await.map_err(|e| StepError::Http {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        })?;

        let status = response.status();
        let response_headers = header_map(response.headers());
        let text = response.text().await.map_err(|e| StepError::Http {
            message: e.to_string(),
            status: Some(status.as_u16()),
        })?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            return Err(StepError::Http {
                message: format!("request to {} returned {}", url, status),
                status: Some(status.as_u16()),
            });
        }

        Ok(response_value(
            options,
            method.as_str(),
            url,
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            response_headers,
            body,
        ))
    }
}

fn header_map(headers: &reqwest::header::HeaderMap) -> Value {
    let map: Map<String, Value> = headers
        .iter()
        .map(|(key, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (key.as_str().to_string(), Value::String(value))
        })
        .collect();
    Value::Object(map)
}

/// Maps a successful response onto the step value: the body is the result
/// and, unless `options.output == false`, the context output as
/// `{ "body": ... }`; response metadata goes to the `{name}-metadata` global.
fn response_value(
    options: &Value,
    method: &str,
    url: &str,
    status: u16,
    status_text: &str,
    headers: Value,
    body: Value,
) -> StepValue {
    let metadata = json!({
        "status": status,
        "statusText": status_text,
        "headers": headers,
        "url": url,
        "method": method,
        "timestamp": Utc::now().to_rfc3339(),
    });
    let mut value = StepValue::result(body.clone())
        .with_metadata(metadata)
        .with_meta(json!({"status": status}));
    if options.get("output").and_then(Value::as_bool) != Some(false) {
        value = value.with_output(json!({"body": body}));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_url_is_a_configuration_error() {
        let mut ctx = ExecutionContext::new(Value::Null);
        let err = HttpRequestStep::new()
            .execute(&mut ctx, &json!({"method": "GET"}), &Tools::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "ConfigurationError");
    }

    #[test]
    fn test_response_metadata_and_output_default() {
        let value = response_value(
            &json!({"url": "http://localhost/orders"}),
            "POST",
            "http://localhost/orders",
            201,
            "Created",
            json!({"content-type": "application/json"}),
            json!({"id": 9}),
        );

        assert_eq!(value.result, Some(json!({"id": 9})));
        // output defaults to {body: ...} when not explicitly disabled
        assert_eq!(value.output, Some(json!({"body": {"id": 9}})));

        let metadata = value.metadata.unwrap();
        assert_eq!(metadata["status"], json!(201));
        assert_eq!(metadata["statusText"], json!("Created"));
        assert_eq!(metadata["url"], json!("http://localhost/orders"));
        assert_eq!(metadata["method"], json!("POST"));
        assert_eq!(metadata["headers"]["content-type"], json!("application/json"));
        assert!(metadata["timestamp"].is_string());
    }

    #[test]
    fn test_output_false_keeps_body_as_result_only() {
        let value = response_value(
            &json!({"url": "http://localhost/x", "output": false}),
            "GET",
            "http://localhost/x",
            200,
            "OK",
            json!({}),
            json!({"ok": true}),
        );
        assert_eq!(value.result, Some(json!({"ok": true})));
        assert!(value.output.is_none());
        assert!(value.metadata.is_some());
    }

    #[tokio::test]
    async fn test_bad_method_is_rejected() {
        let mut ctx = ExecutionContext::new(Value::Null);
        let err = HttpRequestStep::new()
            .execute(
                &mut ctx,
                &json!({"url": "http://localhost/x", "method": "NOT A METHOD"}),
                &Tools::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Options(_)));
    }
}
