//! Verify query serialization and request building against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Query vectors compare serialized strings exactly, since the key order of a
//! query body is part of its wire format. Request vectors go through
//! `build_request`, so nothing is sent.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use wedeploy_core::{
    CancellationToken, Direction, HttpMethod, HttpRequest, HttpResponse, QueryBuilder,
    RequestBuilder, Transport, TransportError,
};

struct Offline;

impl Transport for Offline {
    fn send(
        &self,
        _: &HttpRequest,
        _: &CancellationToken,
        _: Option<Instant>,
    ) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Network("offline".to_string()))
    }
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "HEAD" => HttpMethod::Head,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn str_arg(args: &[Value], i: usize) -> &str {
    args[i].as_str().unwrap()
}

fn apply(query: &mut QueryBuilder, step: &Value) {
    let args = step["args"].as_array().unwrap();
    match step["op"].as_str().unwrap() {
        "filter" => match args.len() {
            1 => query.filter(str_arg(args, 0)),
            2 => query.filter((str_arg(args, 0), args[1].clone())),
            3 => query.filter((str_arg(args, 0), str_arg(args, 1), args[2].clone())),
            n => panic!("filter takes 1-3 args, got {n}"),
        },
        "sort" => {
            let direction = match args.get(1).and_then(Value::as_str) {
                Some("desc") => Some(Direction::Desc),
                Some("asc") => Some(Direction::Asc),
                _ => None,
            };
            query.sort(str_arg(args, 0), direction)
        }
        "aggregate" => match args.len() {
            2 => query.aggregate((str_arg(args, 0), str_arg(args, 1))),
            3 => query.aggregate((str_arg(args, 0), str_arg(args, 1), str_arg(args, 2))),
            n => panic!("aggregate takes 2-3 args, got {n}"),
        },
        "count" => query.count(),
        "limit" => query.limit(args[0].as_u64().unwrap()),
        "offset" => query.offset(args[0].as_u64().unwrap()),
        "highlight" => query.highlight(str_arg(args, 0)),
        other => panic!("unknown op: {other}"),
    };
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|pair| {
                    let key = pair[0].as_str().unwrap().to_string();
                    let value = pair[1].as_str().unwrap().to_string();
                    (key, value)
                })
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Query bodies
// ---------------------------------------------------------------------------

#[test]
fn query_test_vectors() {
    let raw = include_str!("../../test-vectors/query.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let mut query = QueryBuilder::new();
        for step in case["steps"].as_array().unwrap() {
            apply(&mut query, step);
        }

        let body = String::from_utf8(query.to_json().unwrap()).unwrap();
        assert_eq!(body, case["expected"].as_str().unwrap(), "{name}: body");
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/request.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let paths: Vec<&str> = case["paths"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p.as_str().unwrap())
            .collect();
        let base = case["base"].as_str().unwrap();
        let mut req = RequestBuilder::with_transport(base, paths, Arc::new(Offline));

        for (key, value) in pairs(&case["params"]) {
            req.param(&key, &value);
        }
        for (key, value) in pairs(&case["form"]) {
            req.form(key, value);
        }
        for filter in case["filters"].as_array().into_iter().flatten() {
            let field = filter[0].as_str().unwrap();
            let operator = filter[1].as_str().unwrap();
            req.filter((field, operator, filter[2].clone()));
        }
        if let Some(limit) = case["limit"].as_u64() {
            req.limit(limit);
        }
        if let Some(body) = case["body"].as_str() {
            req.body(body);
        }

        let method = parse_method(case["method"].as_str().unwrap());
        let request = req.build_request(method).unwrap();
        let expected = &case["expected_request"];

        assert_eq!(request.method, method, "{name}: method");
        assert_eq!(request.url, expected["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(
            request.header("Content-Type"),
            expected["content_type"].as_str(),
            "{name}: content type"
        );
        let body = request.body.as_deref().map(|b| std::str::from_utf8(b).unwrap());
        assert_eq!(body, expected["body"].as_str(), "{name}: body");
        assert!(req.request().is_none(), "{name}: nothing sent");
    }
}
