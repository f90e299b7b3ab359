//! Ledger routes
//!
//! - `POST /sign/{hash}?algorithm=&async=` (authenticated)
//! - `GET /verify/{hash}?algorithm=`
//! - `GET /download/{hash}?algorithm=`
//! - `GET /params/{hash}`
//!
//! Only signing is authenticated; the other routes read public records.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{debug, error};

use crate::auth::Credentials;
use crate::ledger::{Accept, Download, SignOutcome, SignRequest};
use crate::server::AppState;
use crate::types::LedgerError;

/// Attachment name used for token downloads
pub const TOKEN_FILENAME: &str = "signaturetoken.gtts";

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// JSON error body for a ledger error
pub fn error_response(err: &LedgerError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        error!(code = err.code(), "Request failed: {}", err);
    } else {
        debug!(code = err.code(), "Request rejected: {}", err);
    }

    let mut response = json_response(
        status,
        json!({
            "code": err.code(),
            "message": err.to_string(),
        }),
    );

    if status == StatusCode::UNAUTHORIZED {
        response.headers_mut().insert(
            hyper::header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"ksdb\""),
        );
    }

    response
}

fn parse_query(query: Option<&str>) -> Result<HashMap<String, String>, LedgerError> {
    serde_urlencoded::from_str(query.unwrap_or_default())
        .map_err(|e| LedgerError::InvalidArgument(format!("Invalid query string: {e}")))
}

/// `async` is on for any non-empty value other than `0` or `false`
fn is_truthy(value: Option<&String>) -> bool {
    match value.map(|v| v.trim()) {
        None | Some("") | Some("0") => false,
        Some(v) => !v.eq_ignore_ascii_case("false"),
    }
}

fn accept(headers: &HeaderMap) -> Accept {
    Accept::new(
        headers
            .get(hyper::header::ACCEPT)
            .and_then(|v| v.to_str().ok()),
    )
}

fn sign_status(outcome: SignOutcome) -> (StatusCode, &'static str) {
    match outcome {
        SignOutcome::AlreadySigned => (StatusCode::OK, "already_signed"),
        SignOutcome::Created => (StatusCode::CREATED, "created"),
        SignOutcome::Accepted => (StatusCode::ACCEPTED, "accepted"),
    }
}

/// POST /sign/{hash}
pub async fn handle_sign(
    state: &AppState,
    hash: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    peer: SocketAddr,
) -> Response<Full<Bytes>> {
    let credentials = Credentials::from_request(headers, &state.args.trusted_proxy_header, peer);
    let identity = match state.gate.authenticate(&credentials).await {
        Ok(identity) => identity,
        Err(e) => return error_response(&e),
    };

    let params = match parse_query(query) {
        Ok(params) => params,
        Err(e) => return error_response(&e),
    };

    let request = SignRequest {
        hash: hash.to_string(),
        algorithm: params.get("algorithm").cloned(),
        async_mode: is_truthy(params.get("async")),
        params,
    };

    match state.ledger.sign(request, &identity).await {
        Ok(outcome) => {
            let (status, label) = sign_status(outcome);
            json_response(
                status,
                json!({
                    "status": label,
                    "message": outcome.message(),
                }),
            )
        }
        Err(e) => error_response(&e),
    }
}

/// GET /verify/{hash}
pub async fn handle_verify(
    state: &AppState,
    hash: &str,
    query: Option<&str>,
    headers: &HeaderMap,
) -> Response<Full<Bytes>> {
    let params = match parse_query(query) {
        Ok(params) => params,
        Err(e) => return error_response(&e),
    };

    match state
        .ledger
        .verify(hash, params.get("algorithm").map(String::as_str), &accept(headers))
        .await
    {
        Ok(properties) => json_response(StatusCode::OK, json!(properties)),
        Err(e) => error_response(&e),
    }
}

fn attachment_response(
    token: Vec<u8>,
    registered_time: Option<String>,
    location_name: Option<String>,
) -> Response<Full<Bytes>> {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/octet-stream")
        .header(
            "Content-Disposition",
            format!("attachment; filename={TOKEN_FILENAME}"),
        )
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(token)))
        .unwrap();

    for (name, value) in [
        ("x-guardtime-at", registered_time),
        ("x-guardtime-id", location_name),
    ] {
        if let Some(value) = value.and_then(|v| HeaderValue::from_str(&v).ok()) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(name), value);
        }
    }

    response
}

/// GET /download/{hash}
pub async fn handle_download(
    state: &AppState,
    hash: &str,
    query: Option<&str>,
    headers: &HeaderMap,
) -> Response<Full<Bytes>> {
    let params = match parse_query(query) {
        Ok(params) => params,
        Err(e) => return error_response(&e),
    };

    match state
        .ledger
        .download(hash, params.get("algorithm").map(String::as_str), &accept(headers))
        .await
    {
        Ok(Download::Attachment { token, properties }) => attachment_response(
            token,
            properties.registered_time(),
            properties.location_name(),
        ),
        Ok(Download::Envelope { token, properties }) => json_response(
            StatusCode::OK,
            json!({
                "token": token,
                "properties": properties,
            }),
        ),
        Err(e) => error_response(&e),
    }
}

/// GET /params/{hash}
pub async fn handle_params(state: &AppState, hash: &str, headers: &HeaderMap) -> Response<Full<Bytes>> {
    match state.ledger.param(hash, &accept(headers)).await {
        Ok(projection) => json_response(StatusCode::OK, serde_json::Value::Object(projection)),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_state;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use http_body_util::BodyExt;

    fn peer() -> SocketAddr {
        "192.0.2.10:40000".parse().unwrap()
    }

    fn basic(user: &str, password: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!("Basic {}", STANDARD.encode(format!("{user}:{password}")));
        headers.insert(
            hyper::header::AUTHORIZATION,
            HeaderValue::from_str(&value).unwrap(),
        );
        headers
    }

    async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_is_truthy() {
        let v = |s: &str| Some(s.to_string());
        assert!(is_truthy(v("1").as_ref()));
        assert!(is_truthy(v("true").as_ref()));
        assert!(is_truthy(v("yes").as_ref()));
        assert!(!is_truthy(v("0").as_ref()));
        assert!(!is_truthy(v("FALSE").as_ref()));
        assert!(!is_truthy(v("").as_ref()));
        assert!(!is_truthy(None));
    }

    #[tokio::test]
    async fn test_sign_requires_authentication() {
        let state = test_state();
        let response = handle_sign(&state, "abc123", Some("tag=v1"), &HeaderMap::new(), peer()).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()["www-authenticate"],
            "Basic realm=\"ksdb\""
        );
        let body = body_json(response).await;
        assert_eq!(body["code"], "NotAuthorized");
    }

    #[tokio::test]
    async fn test_sign_statuses() {
        let state = test_state();
        let headers = basic("alice", "wonderland");

        let response = handle_sign(&state, "abc123", Some("tag=v1"), &headers, peer()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["status"], "created");

        let response = handle_sign(&state, "abc123", Some("tag=v1"), &headers, peer()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Already signed");

        let response =
            handle_sign(&state, "def456", Some("tag=v1&async=1"), &headers, peer()).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_sign_from_allowed_address() {
        let state = test_state();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.7"));

        let response = handle_sign(&state, "abc123", Some("tag=v1"), &headers, peer()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_sign_missing_parameter() {
        let state = test_state();
        let response =
            handle_sign(&state, "abc123", None, &basic("alice", "wonderland"), peer()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "InvalidArgument");
        assert_eq!(body["message"], "Missing parameter 'tag'");
    }

    #[tokio::test]
    async fn test_verify_and_params() {
        let state = test_state();
        let response = handle_verify(&state, "abc123", None, &HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "ResourceNotFound");

        let response =
            handle_sign(&state, "abc123", Some("tag=a.b"), &basic("alice", "wonderland"), peer()).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = handle_verify(&state, "abc123", Some("algorithm=sha256"), &HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["location_name"], "GT : EE : Tallinn");

        let response = handle_params(&state, "abc123", &HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["tag"], "a\u{ff0e}b");

        let mut binary = HeaderMap::new();
        binary.insert("accept", HeaderValue::from_static("application/octet-stream"));
        let response = handle_params(&state, "abc123", &binary).await;
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_download_content_negotiation() {
        let state = test_state();
        let response =
            handle_sign(&state, "abc123", Some("tag=v1"), &basic("alice", "wonderland"), peer()).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let mut binary = HeaderMap::new();
        binary.insert("accept", HeaderValue::from_static("application/octet-stream"));
        let response = handle_download(&state, "abc123", None, &binary).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=signaturetoken.gtts"
        );
        assert_eq!(response.headers()["x-guardtime-at"], "2024-05-01T12:00:00Z");
        assert_eq!(response.headers()["x-guardtime-id"], "GT : EE : Tallinn");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.starts_with(b"token:"));

        let response = handle_download(&state, "abc123", None, &HeaderMap::new()).await;
        assert_eq!(
            response.headers()["content-type"],
            "application/json"
        );
        let body = body_json(response).await;
        let token = STANDARD.decode(body["token"].as_str().unwrap()).unwrap();
        assert!(token.starts_with(b"token:"));
        assert_eq!(body["properties"]["registered_time"], "2024-05-01T12:00:00Z");
    }
}
