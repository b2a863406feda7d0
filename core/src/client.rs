//! Transport: request building and status checking against the entity API.
//!
//! # Design
//! `ApiClient` holds the base URL and the host's `HttpExecutor`. Each call is
//! split in two: a `build_*` method produces an `HttpRequest` (pure, testable
//! without I/O) and `get`/`post` hand it to the executor and interpret the
//! status. GET eagerly parses JSON; POST returns the
//! raw response so the caller decides how to read it.

use serde_json::Value;

use crate::error::TransportError;
use crate::http::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse};
use crate::multipart::MultipartForm;

/// Body of a POST request.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Serialized as JSON with a JSON content type.
    Json(Value),
    /// Sent as an opaque, pre-encoded multipart body.
    Form(MultipartForm),
}

impl Payload {
    pub fn is_json(&self) -> bool {
        matches!(self, Payload::Json(_))
    }
}

/// Single-attempt client for the entity backend.
#[derive(Debug, Clone)]
pub struct ApiClient<E> {
    base_url: String,
    executor: E,
}

impl<E: HttpExecutor> ApiClient<E> {
    pub fn new(base_url: &str, executor: E) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            executor,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub fn build_get(&self, endpoint: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: self.url(endpoint),
            headers: vec![("accept".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    pub fn build_post(&self, endpoint: &str, payload: &Payload) -> Result<HttpRequest, TransportError> {
        let (content_type, body) = match payload {
            Payload::Json(value) => {
                let body = serde_json::to_vec(value).map_err(|e| TransportError::Encode(e.to_string()))?;
                ("application/json".to_string(), body)
            }
            Payload::Form(form) => (form.content_type(), form.encode()),
        };
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.url(endpoint),
            headers: vec![("content-type".to_string(), content_type)],
            body: Some(body),
        })
    }

    /// GET `endpoint` and parse the JSON body.
    pub fn get(&mut self, endpoint: &str) -> Result<Value, TransportError> {
        let request = self.build_get(endpoint);
        let response = self.send(request)?;
        response.json()
    }

    /// POST `payload` to `endpoint` and hand back the unparsed response.
    pub fn post(&mut self, endpoint: &str, payload: &Payload) -> Result<HttpResponse, TransportError> {
        let request = self.build_post(endpoint, payload)?;
        self.send(request)
    }

    fn send(&mut self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = request.method;
        let url = request.url.clone();
        tracing::debug!(method = method.as_str(), url = %url, "request");
        let response = self.executor.execute(request).map_err(|err| {
            tracing::warn!(method = method.as_str(), url = %url, error = %err, "request failed");
            err
        })?;
        check_status(response).map_err(|err| {
            tracing::warn!(method = method.as_str(), url = %url, error = %err, "unsuccessful status");
            err
        })
    }
}

/// Map non-2xx responses to `TransportError::Status`.
fn check_status(response: HttpResponse) -> Result<HttpResponse, TransportError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(TransportError::Status {
        status: response.status,
        body: response.text(),
    })
}
