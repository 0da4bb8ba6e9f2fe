use lambda_http::{
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
            CONTENT_TYPE, VARY,
        },
        HeaderValue, StatusCode,
    },
    Body, Response,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::ApiError;

const ALLOWED_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type,Authorization";

pub fn json(status: StatusCode, value: &Value) -> Response<Body> {
    let mut response = Response::new(Body::from(value.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Build a `{success: true, ...}` envelope from the given fields
pub fn success(status: StatusCode, fields: Value) -> Response<Body> {
    let mut envelope = Map::new();
    envelope.insert("success".to_string(), Value::Bool(true));
    if let Value::Object(fields) = fields {
        envelope.extend(fields);
    }
    json(status, &Value::Object(envelope))
}

pub fn not_found() -> Response<Body> {
    json(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "success": false, "message": "Route not found" }),
    )
}

/// Parse a JSON request body. An empty body is treated as `{}`.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(raw).map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e)))
}

pub fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(format!("Failed to serialize: {}", e)))
}

/// Answer a CORS preflight
pub fn preflight(origin: Option<&str>, config: &Config) -> Response<Body> {
    let mut response = Response::new(Body::Empty);
    *response.status_mut() = StatusCode::NO_CONTENT;
    let mut response = with_cors(response, origin, config);
    if allowed_origin(origin, config).is_some() {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("3600"));
    }
    response
}

/// Attach CORS headers when the request origin is on the allow-list
pub fn with_cors(mut response: Response<Body>, origin: Option<&str>, config: &Config) -> Response<Body> {
    let headers = response.headers_mut();
    headers.insert(VARY, HeaderValue::from_static("Origin"));
    if let Some(value) = allowed_origin(origin, config) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    } else if let Some(origin) = origin {
        tracing::warn!(origin = %origin, "Origin not in allow-list, omitting CORS headers");
    }
    response
}

fn allowed_origin(origin: Option<&str>, config: &Config) -> Option<HeaderValue> {
    origin
        .filter(|origin| config.is_origin_allowed(origin))
        .and_then(|origin| HeaderValue::from_str(origin).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "TOKEN_SECRET" => Some("0123456789abcdef0123456789abcdef".to_string()),
            "ALLOWED_ORIGINS" => Some("https://proti-go.vercel.app".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        quantity: Option<i64>,
    }

    #[test]
    fn test_success_envelope_merges_fields() {
        let response = success(StatusCode::CREATED, serde_json::json!({ "message": "ok", "count": 2 }));
        assert_eq!(response.status(), 201);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "message": "ok", "count": 2 }));
    }

    #[test]
    fn test_parse_body_empty_is_object() {
        let parsed: Sample = parse_body(b"").unwrap();
        assert_eq!(parsed, Sample { quantity: None });
        assert!(matches!(parse_body::<Sample>(b"not json"), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_allowed_origin_is_echoed() {
        let response = with_cors(not_found(), Some("https://proti-go.vercel.app"), &config());
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://proti-go.vercel.app"
        );
    }

    #[test]
    fn test_unknown_origin_gets_no_cors_headers() {
        let response = with_cors(not_found(), Some("https://evil.example"), &config());
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

        let response = preflight(Some("https://evil.example"), &config());
        assert_eq!(response.status(), 204);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).is_none());
    }

    #[test]
    fn test_preflight_for_allowed_origin() {
        let response = preflight(Some("https://proti-go.vercel.app"), &config());
        assert_eq!(response.status(), 204);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            ALLOWED_METHODS
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            ALLOWED_HEADERS
        );
    }
}
