//! Fluent, stateful request builder.
//!
//! # Design
//! A `RequestBuilder` owns everything about one pending request and is
//! mutated in place by chained calls that return `&mut Self`. Nothing touches
//! the network until a verb method (`get`, `post`, ...) runs; that call
//! resolves the body, builds an `HttpRequest`, hands it to the transport under
//! an optional timeout and stores both the request and the response on the
//! builder. A verb can be called again: it re-serializes the current state and
//! overwrites the previous request/response.
//!
//! The outgoing body is chosen by precedence: form values, then the
//! structured query, then the raw body.
//!
//! `param` and `params` swallow URL parse errors so they can sit in a chain;
//! a bad URL is reported when a verb builds the request.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use ::url::form_urlencoded;
use ::url::{ParseError, Url};
use uuid::Uuid;

use crate::cancel::{remaining, CancellationToken, TimeoutGuard};
use crate::config::USER_AGENT;
use crate::error::Error;
use crate::http::{first_header, set_header, HttpMethod, HttpRequest, HttpResponse};
use crate::path::resolve_path;
use crate::query::{Aggregation, Direction, Filter, QueryBuilder};
use crate::transport::{default_transport, Transport};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Credentials for the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Basic { username: String, password: String },
}

impl Credentials {
    fn header_value(&self) -> String {
        match self {
            Credentials::Bearer(token) => format!("Bearer {token}"),
            Credentials::Basic { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
            }
        }
    }
}

impl From<&str> for Credentials {
    fn from(token: &str) -> Self {
        Credentials::Bearer(token.to_string())
    }
}

impl From<String> for Credentials {
    fn from(token: String) -> Self {
        Credentials::Bearer(token)
    }
}

impl<U, P> From<(U, P)> for Credentials
where
    U: Into<String>,
    P: Into<String>,
{
    fn from((username, password): (U, P)) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Stands in for the missing scheme and host while a relative reference is
/// edited.
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Parse `raw` for query-string editing. The flag is set when `raw` is a
/// relative reference resolved against [`RELATIVE_BASE`].
fn parse_editable(raw: &str) -> Option<(Url, bool)> {
    match Url::parse(raw) {
        Ok(parsed) => Some((parsed, false)),
        Err(ParseError::RelativeUrlWithoutBase) if is_relative_reference(raw) => {
            let base = Url::parse(RELATIVE_BASE).ok()?;
            let parsed = Url::options().base_url(Some(&base)).parse(raw).ok()?;
            Some((parsed, true))
        }
        Err(_) => None,
    }
}

/// A path-only reference: no scheme, no authority, and no colon in the
/// first segment (`:x` or `a:b/c` are malformed, not relative).
fn is_relative_reference(raw: &str) -> bool {
    let first = raw.split(['/', '?', '#']).next().unwrap_or_default();
    !raw.starts_with("//") && !first.contains(':')
}

/// Path, query and fragment of `parsed`, without the placeholder origin.
fn relative_form(parsed: &Url, rooted: bool) -> String {
    let path = parsed.path();
    let mut out = if rooted {
        path.to_string()
    } else {
        path.strip_prefix('/').unwrap_or(path).to_string()
    };
    if let Some(query) = parsed.query() {
        out.push('?');
        out.push_str(query);
    }
    if let Some(fragment) = parsed.fragment() {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// Start a request at `base` joined with `paths`.
pub fn url<I, S>(base: &str, paths: I) -> RequestBuilder
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    RequestBuilder::new(base, paths)
}

/// One pending HTTP request.
pub struct RequestBuilder {
    id: Uuid,
    url: String,
    created_at: DateTime<Utc>,
    headers: Vec<(String, String)>,
    form: Option<Vec<(String, String)>>,
    query: Option<QueryBuilder>,
    body: Option<Vec<u8>>,
    timeout: Option<Duration>,
    request: Option<HttpRequest>,
    response: Option<HttpResponse>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("created_at", &self.created_at)
            .field("headers", &self.headers)
            .field("form", &self.form)
            .field("query", &self.query)
            .field("body", &self.body.as_ref().map(Vec::len))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    pub fn new<I, S>(base: &str, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_transport(base, paths, default_transport())
    }

    pub fn with_transport<I, S>(base: &str, paths: I, transport: Arc<dyn Transport>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let url = resolve_path([base.to_string(), resolve_path(paths)]);
        Self {
            id: Uuid::new_v4(),
            url,
            created_at: Utc::now(),
            headers: vec![
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            form: None,
            query: None,
            body: None,
            timeout: None,
            request: None,
            response: None,
            transport,
        }
    }

    /// A new builder rooted at this builder's URL plus `paths`. Only the URL
    /// and the transport carry over.
    pub fn path<I, S>(&self, paths: I) -> RequestBuilder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_transport(&self.url, paths, Arc::clone(&self.transport))
    }

    // --- headers and body ---

    /// Append a header value; existing values for `key` are kept.
    pub fn header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// `auth("token")` sends a bearer token, `auth(("user", "pass"))` basic
    /// credentials.
    pub fn auth(&mut self, credentials: impl Into<Credentials>) -> &mut Self {
        let value = credentials.into().header_value();
        self.header("Authorization", value)
    }

    pub fn body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    pub fn form(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.form
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    /// Bound the next actions to `timeout`. `Duration::ZERO` means no bound.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    // --- query DSL ---

    fn query_mut(&mut self) -> &mut QueryBuilder {
        self.query.get_or_insert_with(QueryBuilder::new)
    }

    pub fn filter(&mut self, filter: impl Into<Filter>) -> &mut Self {
        self.query_mut().filter(filter);
        self
    }

    pub fn aggregate(&mut self, aggregation: impl Into<Aggregation>) -> &mut Self {
        self.query_mut().aggregate(aggregation);
        self
    }

    pub fn sort(
        &mut self,
        field: impl Into<String>,
        direction: impl Into<Option<Direction>>,
    ) -> &mut Self {
        self.query_mut().sort(field, direction);
        self
    }

    pub fn count(&mut self) -> &mut Self {
        self.query_mut().count();
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.query_mut().limit(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.query_mut().offset(offset);
        self
    }

    pub fn highlight(&mut self, field: impl Into<String>) -> &mut Self {
        self.query_mut().highlight(field);
        self
    }

    // --- query string ---

    /// Set a query-string parameter, replacing any existing values.
    ///
    /// Works on absolute URLs and relative references; leaves the URL
    /// untouched if it is malformed.
    pub fn param(&mut self, key: &str, value: &str) -> &mut Self {
        let Some((mut parsed, relative)) = parse_editable(&self.url) else {
            return self;
        };

        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut replaced = false;
        for (k, v) in parsed.query_pairs() {
            if k != key {
                pairs.push((k.into_owned(), v.into_owned()));
            } else if !replaced {
                pairs.push((key.to_string(), value.to_string()));
                replaced = true;
            }
        }
        if !replaced {
            pairs.push((key.to_string(), value.to_string()));
        }

        parsed.query_pairs_mut().clear().extend_pairs(&pairs);
        self.url = if relative {
            relative_form(&parsed, self.url.starts_with('/'))
        } else {
            parsed.to_string()
        };
        self
    }

    /// Decoded query-string parameters, or `None` if the URL is malformed.
    pub fn params(&self) -> Option<BTreeMap<String, Vec<String>>> {
        let (parsed, _) = parse_editable(&self.url)?;
        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in parsed.query_pairs() {
            params.entry(k.into_owned()).or_default().push(v.into_owned());
        }
        Some(params)
    }

    // --- accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url_str(&self) -> &str {
        &self.url
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of the named header.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        first_header(&self.headers, name)
    }

    pub fn query(&self) -> Option<&QueryBuilder> {
        self.query.as_ref()
    }

    pub fn form_values(&self) -> Option<&[(String, String)]> {
        self.form.as_deref()
    }

    pub fn raw_body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn timeout_value(&self) -> Option<Duration> {
        self.timeout
    }

    /// The request sent by the last action.
    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_ref()
    }

    /// The response received by the last action, kept for error statuses too.
    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    // --- actions ---

    pub fn get(&mut self) -> Result<(), Error> {
        self.action(HttpMethod::Get)
    }

    pub fn head(&mut self) -> Result<(), Error> {
        self.action(HttpMethod::Head)
    }

    pub fn post(&mut self) -> Result<(), Error> {
        self.action(HttpMethod::Post)
    }

    pub fn put(&mut self) -> Result<(), Error> {
        self.action(HttpMethod::Put)
    }

    pub fn patch(&mut self) -> Result<(), Error> {
        self.action(HttpMethod::Patch)
    }

    pub fn delete(&mut self) -> Result<(), Error> {
        self.action(HttpMethod::Delete)
    }

    /// Deserialize the last response body as JSON.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let response = self.response.as_ref().ok_or(Error::NoResponse)?;
        serde_json::from_slice(&response.body).map_err(Error::Decode)
    }

    fn action(&mut self, method: HttpMethod) -> Result<(), Error> {
        self.request = None;
        self.response = None;

        let request = self.build_request(method)?;
        self.request = Some(request.clone());

        let timeout = self.timeout.filter(|timeout| !timeout.is_zero());
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let token = CancellationToken::new();
        // Disarmed on drop, whichever way this function returns.
        let _guard = timeout.map(|timeout| TimeoutGuard::arm(token.clone(), timeout));

        tracing::debug!(id = %self.id, method = %method, url = %request.url, "sending request");
        let result = self.transport.send(&request, &token, deadline);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if let Some(after) = timeout {
                    if token.is_cancelled() || remaining(deadline) == Some(Duration::ZERO) {
                        tracing::warn!(
                            id = %self.id,
                            url = %request.url,
                            ?after,
                            "request timed out"
                        );
                        return Err(Error::Timeout { after });
                    }
                }
                tracing::debug!(id = %self.id, error = %e, "transport failed");
                return Err(e.into());
            }
        };

        let status = response.status;
        tracing::debug!(id = %self.id, status, "received response");
        self.response = Some(response);

        if status >= 400 {
            return Err(Error::UnexpectedResponse { status });
        }
        Ok(())
    }

    /// Resolve body and headers into an outgoing request without sending it.
    ///
    /// A form body switches the request's `Content-Type`; the builder's own
    /// headers are left as they are.
    pub fn build_request(&self, method: HttpMethod) -> Result<HttpRequest, Error> {
        let mut headers = self.headers.clone();
        let body = match (&self.form, &self.query) {
            (Some(form), _) if !form.is_empty() => {
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(form)
                    .finish();
                set_header(&mut headers, "Content-Type", FORM_CONTENT_TYPE);
                Some(encoded.into_bytes())
            }
            (_, Some(query)) => Some(query.to_json().map_err(Error::Serialization)?),
            _ => self.body.clone(),
        };

        let url = Url::parse(&self.url).map_err(|source| Error::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;

        Ok(HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        })
    }
}
