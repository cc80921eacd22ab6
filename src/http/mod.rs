// Blocking HTTP plumbing shared by the provider clients

#[cfg(test)]
mod tests;

use anyhow::{Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// A ureq agent with a global timeout.
///
/// Non-2xx responses are returned as bodies rather than errors so provider error
/// messages (`{"error": ...}`) can be surfaced to the user.
#[inline]
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Bearer credential for hosted APIs
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key from the named environment variable
    #[inline]
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(Self(value.trim().to_string())),
            Ok(_) => Err(anyhow!("Environment variable {} is empty", var)),
            Err(_) => Err(anyhow!("Environment variable {} is not set", var)),
        }
    }

    fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for ApiKey {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// POST a JSON body and decode a JSON response. One attempt, no retries.
#[inline]
pub fn post_json<Req, Resp>(
    agent: &ureq::Agent,
    url: &Url,
    api_key: Option<&ApiKey>,
    body: &Req,
) -> Result<Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let request_json = serde_json::to_string(body)
        .map_err(|e| anyhow!("Failed to serialize request for {}: {}", url, e))?;

    debug!("POST {} ({} bytes)", url, request_json.len());

    let mut request = agent
        .post(url.as_str())
        .header("Content-Type", "application/json");
    if let Some(key) = api_key {
        request = request.header("Authorization", key.header_value());
    }

    let mut response = request
        .send(&request_json)
        .map_err(|e| describe_transport_error(url, &e))?;

    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| anyhow!("Failed to read response body from {}: {}", url, e))?;

    if !(200..300).contains(&status) {
        let message = extract_error_message(&body);
        warn!("Request to {} failed with HTTP {}: {}", url, status, message);
        return Err(anyhow!("HTTP {} from {}: {}", status, url, message));
    }

    serde_json::from_str(&body)
        .map_err(|e| anyhow!("Malformed response from {}: {}", url, e))
}

/// GET a URL and return the body on success
#[inline]
pub fn get_text(agent: &ureq::Agent, url: &Url) -> Result<String> {
    debug!("GET {}", url);

    let mut response = agent
        .get(url.as_str())
        .call()
        .map_err(|e| describe_transport_error(url, &e))?;

    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| anyhow!("Failed to read response body from {}: {}", url, e))?;

    if !(200..300).contains(&status) {
        return Err(anyhow!(
            "HTTP {} from {}: {}",
            status,
            url,
            extract_error_message(&body)
        ));
    }

    Ok(body)
}

fn describe_transport_error(url: &Url, error: &ureq::Error) -> anyhow::Error {
    match error {
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
            anyhow!("Could not connect to {}: {}", url, error)
        }
        ureq::Error::Timeout(_) => anyhow!("Request to {} timed out: {}", url, error),
        _ => anyhow!("Request to {} failed: {}", url, error),
    }
}

/// Pull a human-readable message out of an error body.
///
/// Ollama answers `{"error": "..."}`, OpenAI-compatible APIs `{"error": {"message": "..."}}`.
pub(crate) fn extract_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        let error = value.get("error")?;
        error
            .as_str()
            .or_else(|| error.get("message").and_then(serde_json::Value::as_str))
            .map(str::to_string)
    });

    message.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "empty response body".to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    })
}
