//! HTTP client for the OTLP/HTTP exporters.
//!
//! # Responsibilities
//! - Send encoded OTLP requests with `reqwest`
//! - Report every collector response, success or not, back to the exporter
//!
//! # Design Decisions
//! - The SDK batch workers poll exports with a plain executor, outside Tokio;
//!   each request is spawned onto the runtime captured at pipeline start
//! - Non-2xx responses are returned as responses so the exporter reports the
//!   status code, which drives retry classification

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use opentelemetry_http::{HttpClient, HttpError};
use tokio::runtime::Handle;

/// `reqwest` client bound to a Tokio runtime.
#[derive(Debug, Clone)]
pub struct RuntimeHttpClient {
    client: reqwest::Client,
    runtime: Handle,
}

impl RuntimeHttpClient {
    pub fn new(client: reqwest::Client, runtime: Handle) -> Self {
        Self { client, runtime }
    }
}

#[async_trait]
impl HttpClient for RuntimeHttpClient {
    async fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
        let client = self.client.clone();
        let request = reqwest::Request::try_from(request)?;

        let sent = self.runtime.spawn(async move {
            let response = client.execute(request).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, body))
        });

        let (status, headers, body) = sent.await??;
        let mut response = Response::builder().status(status).body(body)?;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
