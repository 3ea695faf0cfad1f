//! The seam between request builders and the network.
//!
//! # Design
//! A `Transport` performs exactly one round-trip per call and never looks at
//! the status code; classifying 4xx/5xx is the builder's job. Every call gets
//! a `CancellationToken` and the request deadline. `UreqTransport` cannot
//! interrupt a blocking socket from another thread, so it maps the deadline
//! onto ureq's per-request timeout and checks the token before and after the
//! call.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use ureq::http::Response;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, Body, RequestBuilder};

use crate::cancel::{remaining, CancellationToken};
use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Sends a resolved request and returns whatever the server answered.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<HttpResponse, TransportError>;
}

/// The transport shared by every builder that was not given its own.
///
/// Built once from [`ClientConfig::from_env`] and never mutated afterward.
pub fn default_transport() -> Arc<dyn Transport> {
    static DEFAULT: OnceLock<Arc<dyn Transport>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| Arc::new(UreqTransport::new(&ClientConfig::from_env()))))
}

/// Blocking transport backed by a `ureq::Agent`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    timeout: Option<Duration>,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build()
            .new_agent();
        Self {
            agent,
            timeout: config.timeout,
        }
    }

    /// The shorter of the agent timeout and the time left until `deadline`.
    fn effective_timeout(&self, deadline: Option<Instant>) -> Option<Duration> {
        match (self.timeout, remaining(deadline)) {
            (Some(agent), Some(remaining)) => Some(agent.min(remaining)),
            (agent, remaining) => agent.or(remaining),
        }
    }

    fn without_body(
        &self,
        builder: RequestBuilder<WithoutBody>,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<Response<Body>, ureq::Error> {
        let builder = prepare(builder, request, timeout);
        match &request.body {
            // Query bodies ride along on GET and DELETE too.
            Some(body) => builder.force_send_body().send(body.as_slice()),
            None => builder.call(),
        }
    }

    fn with_body(
        &self,
        builder: RequestBuilder<WithBody>,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<Response<Body>, ureq::Error> {
        let builder = prepare(builder, request, timeout);
        match &request.body {
            Some(body) => builder.send(body.as_slice()),
            None => builder.send_empty(),
        }
    }
}

impl Transport for UreqTransport {
    fn send(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<HttpResponse, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let timeout = self.effective_timeout(deadline);
        let url = request.url.as_str();

        let result = match request.method {
            HttpMethod::Get => self.without_body(self.agent.get(url), request, timeout),
            HttpMethod::Head => self.without_body(self.agent.head(url), request, timeout),
            HttpMethod::Delete => self.without_body(self.agent.delete(url), request, timeout),
            HttpMethod::Post => self.with_body(self.agent.post(url), request, timeout),
            HttpMethod::Put => self.with_body(self.agent.put(url), request, timeout),
            HttpMethod::Patch => self.with_body(self.agent.patch(url), request, timeout),
        };

        match result.and_then(read_response) {
            Ok(response) => Ok(response),
            Err(_) if cancel.is_cancelled() => Err(TransportError::Cancelled),
            Err(ureq::Error::Timeout(_)) => Err(TransportError::TimedOut),
            Err(e) => Err(TransportError::Network(e.to_string())),
        }
    }
}

fn prepare<B>(
    mut builder: RequestBuilder<B>,
    request: &HttpRequest,
    timeout: Option<Duration>,
) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    match timeout {
        Some(timeout) => builder.config().timeout_global(Some(timeout)).build(),
        None => builder,
    }
}

fn read_response(mut response: Response<Body>) -> Result<HttpResponse, ureq::Error> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = response.body_mut().read_to_vec()?;
    Ok(HttpResponse { status, headers, body })
}
