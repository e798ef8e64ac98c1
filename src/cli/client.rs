use anyhow::{anyhow, Context};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Thin HTTP client for the resource API
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request; non-2xx replies become errors carrying the server's message
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> anyhow::Result<Option<Value>> {
        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response.text().await.context("failed to read response body")?;
        let body: Option<Value> = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).with_context(|| format!("invalid JSON from server: {}", text))?)
        };

        if status.is_success() {
            return Ok(body);
        }

        Err(anyhow!(describe_failure(status, body.as_ref())))
    }
}

/// "404 NOT_FOUND: Book not found" from an error envelope
fn describe_failure(status: StatusCode, body: Option<&Value>) -> String {
    let message = body
        .and_then(|b| b.get("error"))
        .and_then(Value::as_str)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"));

    match body.and_then(|b| b.get("code")).and_then(Value::as_str) {
        Some(code) => format!("{} {}: {}", status.as_u16(), code, message),
        None => format!("{}: {}", status.as_u16(), message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_paths() {
        let client = ApiClient::new("http://localhost:3000/", None).unwrap();
        assert_eq!(client.url("/books/1"), "http://localhost:3000/books/1");
        assert_eq!(client.url("health"), "http://localhost:3000/health");
    }

    #[test]
    fn failures_use_the_envelope() {
        let body = json!({"success": false, "error": "Book not found", "code": "NOT_FOUND"});
        assert_eq!(
            describe_failure(StatusCode::NOT_FOUND, Some(&body)),
            "404 NOT_FOUND: Book not found"
        );
        assert_eq!(describe_failure(StatusCode::BAD_GATEWAY, None), "502: Bad Gateway");
    }
}
