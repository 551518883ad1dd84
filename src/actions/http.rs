//! `httpRequest` executor

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::{Map, Value};

use crate::common::config::HttpConfig;
use crate::common::{Error, Result};
use crate::engine::{ActionExecutor, ExecutionFailure, Outcome, RunnerDetails};
use crate::suite::{HttpRequest, StepAction};

/// Sends HTTP requests with a shared client
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn send(&self, request: &HttpRequest) -> std::result::Result<Outcome, ExecutionFailure> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes()).map_err(|_| {
            ExecutionFailure::new(format!("invalid HTTP method '{}'", request.method))
        })?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.request_headers {
            builder = builder.header(name, value);
        }
        if !request.request_params.is_empty() {
            builder = builder.query(&request.request_params);
        }
        if let Some(body) = &request.request_data {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExecutionFailure::new(format!("request to {} failed: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_lowercase(),
                    Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
                )
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| ExecutionFailure::new(format!("failed to read response body: {}", e)))?;

        Ok(Outcome::Response {
            status,
            headers,
            body: parse_body(&text),
        })
    }
}

/// JSON when the body parses, the raw text otherwise, null when empty
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait::async_trait]
impl ActionExecutor for HttpExecutor {
    async fn execute(
        &self,
        action: &StepAction,
        _details: &RunnerDetails,
    ) -> std::result::Result<Outcome, ExecutionFailure> {
        match action {
            StepAction::HttpRequest(request) => self.send(request).await,
            other => Err(ExecutionFailure::new(format!(
                "http executor cannot run {}",
                other.kind()
            ))),
        }
    }
}
