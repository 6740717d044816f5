//! HTTP response helpers.

use crate::resolve::{ResolveError, Resolved};
use crate::utils::mime::types::{JSON, OCTET_STREAM, PLAIN};
use anyhow::Result;
use tiny_http::{Header, Method, Request, Response, StatusCode};

pub fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

/// Respond with a resolved record body.
pub fn respond_resolved(request: Request, resolved: Resolved) -> Result<()> {
    let Resolved {
        content_type,
        body,
        record_id,
    } = resolved;
    let headers = [
        content_type_header(&content_type),
        dynamic_header("X-Record-Id", &record_id),
    ];
    send(request, 200, headers.into_iter().flatten(), body)
}

/// Respond with the status of a failed resolution.
pub fn respond_error(request: Request, error: &ResolveError) -> Result<()> {
    send_text(request, error.status(), format!("{error}\n"))
}

pub fn respond_json(request: Request, status: u16, body: &serde_json::Value) -> Result<()> {
    let body = serde_json::to_vec_pretty(body)?;
    send(request, status, [make_header("Content-Type", JSON)], body)
}

pub fn respond_unavailable(request: Request) -> Result<()> {
    send_text(request, 503, "server is shutting down\n".to_owned())
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_text(request, 405, "only GET and HEAD are supported\n".to_owned())
}

fn send_text(request: Request, status: u16, body: String) -> Result<()> {
    send(request, status, [make_header("Content-Type", PLAIN)], body.into_bytes())
}

/// Send a response. For `HEAD` requests tiny_http keeps the headers and drops the body.
fn send(
    request: Request,
    status: u16,
    headers: impl IntoIterator<Item = Header>,
    body: Vec<u8>,
) -> Result<()> {
    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    for header in headers {
        response.add_header(header);
    }
    request.respond(response)?;
    Ok(())
}

/// Header from static parts; both are ASCII literals.
fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).unwrap()
}

/// Header from a value taken out of a record; `None` when not representable.
fn dynamic_header(key: &'static str, value: &str) -> Option<Header> {
    Header::from_bytes(key, value).ok()
}

/// Content type from a record, falling back to `application/octet-stream`.
fn content_type_header(value: &str) -> Option<Header> {
    dynamic_header("Content-Type", value).or_else(|| Some(make_header("Content-Type", OCTET_STREAM)))
}
