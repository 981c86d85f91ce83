use std::collections::BTreeMap;
use std::fmt;

use futures_util::stream::BoxStream;
use salvo::http::{HeaderMap, ParseError, StatusCode};
use salvo::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Failed to read request body: {0}")]
    Body(#[from] ParseError),

    #[error("Streamed GraphQL responses are not supported by this adapter")]
    UnsupportedBody,

    #[error("Failed to write response body: {0}")]
    Write(#[from] salvo::Error),
}

/// Framework-neutral request handed to the execution engine.
#[derive(Debug, Clone, Default)]
pub struct EngineRequest {
    /// Upper-case HTTP verb.
    pub method: String,
    /// Lower-case header names. Repeated headers are joined with `", "`.
    pub headers: BTreeMap<String, String>,
    /// Raw query string including the leading `?`, or empty.
    pub search: String,
    pub body: Vec<u8>,
}

impl EngineRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the `Accept` header lists `mime`.
    pub fn accepts(&self, mime: &str) -> bool {
        self.header("accept").is_some_and(|accept| {
            accept
                .split(',')
                .filter_map(|part| part.split(';').next())
                .any(|part| part.trim().eq_ignore_ascii_case(mime))
        })
    }
}

pub enum EngineBody {
    Complete(String),
    Chunked(BoxStream<'static, String>),
}

impl fmt::Debug for EngineBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineBody::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            EngineBody::Chunked(_) => f.write_str("Chunked"),
        }
    }
}

#[derive(Debug)]
pub struct EngineResponse {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: EngineBody,
}

impl EngineResponse {
    pub fn complete(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            headers: HeaderMap::new(),
            body: EngineBody::Complete(body.into()),
        }
    }
}

/// Translate a Salvo request into the engine's request shape.
///
/// Header values that are not valid text are dropped. Bodies larger than
/// `max_body_size` bytes fail with [`AdapterError::Body`].
pub async fn to_engine_request(
    req: &mut Request,
    max_body_size: usize,
) -> Result<EngineRequest, AdapterError> {
    let mut headers = BTreeMap::new();
    for name in req.headers().keys() {
        let values: Vec<&str> = req
            .headers()
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        if !values.is_empty() {
            headers.insert(name.as_str().to_string(), values.join(", "));
        }
    }

    let search = req
        .uri()
        .query()
        .map(|query| format!("?{query}"))
        .unwrap_or_default();
    let method = req.method().as_str().to_ascii_uppercase();
    let body = req.payload_with_max_size(max_body_size).await?.to_vec();

    Ok(EngineRequest {
        method,
        headers,
        search,
        body,
    })
}

/// Copy an engine response onto the Salvo response.
///
/// Only complete bodies are supported. A chunked body is an error and leaves
/// the response without a body.
pub fn from_engine_response(res: &mut Response, resp: EngineResponse) -> Result<(), AdapterError> {
    let EngineResponse {
        status,
        headers,
        body,
    } = resp;

    for (name, value) in headers.iter() {
        res.headers_mut().append(name.clone(), value.clone());
    }
    res.status_code(status.unwrap_or(StatusCode::OK));

    match body {
        EngineBody::Complete(text) => {
            res.write_body(text)?;
            Ok(())
        }
        EngineBody::Chunked(_) => Err(AdapterError::UnsupportedBody),
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod adapter_tests;
