//! Fluent client for REST APIs that take structured queries as JSON bodies.
//!
//! # Overview
//! A [`RequestBuilder`] collects headers, form fields, a raw body, a
//! structured [`QueryBuilder`] and a timeout through chained calls, then a
//! verb method (`get`, `post`, ...) serializes that state into one HTTP
//! request, sends it through a [`Transport`] and keeps the request and
//! response for inspection.
//!
//! ```no_run
//! use wedeploy_core::{aggregation, filter, url, Direction};
//!
//! let mut movies = url("http://data.example.com", ["movies"]);
//! movies
//!     .filter(filter::gt("year", 1990))
//!     .sort("rating", Direction::Desc)
//!     .aggregate(aggregation::avg("avg_rating", "rating"))
//!     .limit(10);
//! movies.get()?;
//! let found: serde_json::Value = movies.decode_json()?;
//! # Ok::<(), wedeploy_core::Error>(())
//! ```
//!
//! # Design
//! - Builders are single-owner and mutated in place; `path` forks a new one.
//! - Body precedence is form values, then the query, then the raw body.
//! - Status codes of 400 and above become [`Error::UnexpectedResponse`] while
//!   the response stays readable on the builder.
//! - Timeouts arm a timer that cancels a per-request [`CancellationToken`];
//!   the timer is torn down before the action returns.

pub mod aggregation;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod path;
pub mod query;
pub mod transport;

pub use cancel::{CancellationToken, TimeoutGuard};
pub use client::{url, Credentials, RequestBuilder};
pub use config::{ClientConfig, USER_AGENT, VERSION};
pub use error::{Error, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use path::resolve_path;
pub use query::{Aggregation, Direction, Filter, QueryBuilder, QueryType, Sort};
pub use transport::{default_transport, Transport, UreqTransport};
