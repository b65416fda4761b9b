//! HTTP utilities for request/response handling and CORS

use lambda_http::http::response::Builder;
use lambda_http::{Body, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// CORS origin header for all responses
pub fn get_cors_origin_header() -> (&'static str, &'static str) {
    ("Access-Control-Allow-Origin", "*")
}

/// Full CORS headers for OPTIONS preflight responses only
pub fn get_cors_preflight_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Access-Control-Allow-Origin", "*"),
        (
            "Access-Control-Allow-Headers",
            "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token",
        ),
        ("Access-Control-Allow-Methods", "POST,OPTIONS"),
        ("Access-Control-Expose-Headers", "Content-Disposition,X-Offer-Number"),
        ("Access-Control-Max-Age", "86400"),
    ]
}

/// The builder only fails on invalid header values, which are all static here.
fn finish(builder: Builder, body: Body) -> Response<Body> {
    builder.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build response");
        let mut fallback = Response::new(Body::Empty);
        *fallback.status_mut() = lambda_http::http::StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

/// Build an error response with consistent formatting
pub fn error_response(
    status: u16,
    error: &str,
    details: &str,
    suggestion: Option<&str>,
) -> Response<Body> {
    let mut body = json!({
        "error": error,
        "details": details,
    });

    if let Some(suggestion) = suggestion {
        body["suggestion"] = json!(suggestion);
    }

    let (key, value) = get_cors_origin_header();
    let builder = Response::builder()
        .status(status)
        .header(key, value)
        .header("Content-Type", "application/json");
    finish(builder, body.to_string().into())
}

/// Build a successful response with CORS headers
pub fn success_response(status: u16, body: &str) -> Response<Body> {
    let (key, value) = get_cors_origin_header();
    let builder = Response::builder()
        .status(status)
        .header(key, value)
        .header("Content-Type", "application/json");
    finish(builder, body.to_string().into())
}

/// Binary download. API Gateway base64-encodes `Body::Binary` on the way out.
pub fn document_response(bytes: Vec<u8>, content_type: &str, filename: &str, offer_number: u64) -> Response<Body> {
    let (key, value) = get_cors_origin_header();
    let builder = Response::builder()
        .status(200)
        .header(key, value)
        .header("Content-Type", content_type)
        .header("Content-Disposition", format!("attachment; filename=\"{}\"", filename))
        .header("X-Offer-Number", offer_number.to_string());
    finish(builder, Body::Binary(bytes))
}

/// Handle CORS preflight requests
pub fn handle_options() -> Response<Body> {
    let mut builder = Response::builder().status(200);

    for (key, value) in get_cors_preflight_headers() {
        builder = builder.header(key, value);
    }

    finish(builder.header("Content-Type", "application/json"), Body::Empty)
}

pub fn parse_json_body(body: &Body) -> Result<Value, Response<Body>> {
    let body_str = match body {
        Body::Empty => "{}",
        Body::Text(s) => s,
        Body::Binary(b) => match std::str::from_utf8(b) {
            Ok(s) => s,
            Err(_) => return Err(error_response(400, "Invalid request body", "Could not parse request body as UTF-8", None)),
        },
        _ => "{}",
    };

    serde_json::from_str(body_str)
        .map_err(|_| error_response(400, "Invalid JSON", "Could not parse request body as JSON", None))
}

/// Deserialize the whole body into a request type.
pub fn parse_request<T>(body: &Body) -> Result<T, Response<Body>>
where
    T: DeserializeOwned,
{
    let json = parse_json_body(body)?;
    serde_json::from_value(json)
        .map_err(|e| error_response(400, "Invalid request", &e.to_string(), None))
}
