//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::AuthGate;
use crate::config::Args;
use crate::ledger::LedgerService;
use crate::routes;
use crate::types::{LedgerError, Result};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Response header carrying the id logged for the request
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub ledger: LedgerService,
    pub gate: AuthGate,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, ledger: LedgerService, gate: AuthGate) -> Self {
        Self {
            args,
            ledger,
            gate,
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "ksdb listening on {} (store: {})",
        state.args.listen,
        state.ledger.backend()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Percent-decoded hash segment following a route prefix
fn path_hash(path: &str, prefix: &str) -> Result<String> {
    let raw = &path[prefix.len()..];
    urlencoding::decode(raw)
        .map(|hash| hash.into_owned())
        .map_err(|_| LedgerError::InvalidArgument("Invalid hex 'hash'".into()))
}

/// Route incoming HTTP requests
///
/// Request bodies are never read; every route takes its input from the path,
/// query string, and headers.
pub(crate) async fn handle_request<B>(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<B>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let query = query.as_deref();
    let headers = req.headers();
    let request_id = uuid::Uuid::new_v4();

    info!(%request_id, "[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        (Method::OPTIONS, _) => preflight_response(),

        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(&state),

        (Method::GET, "/version") => routes::version_info(),

        (Method::POST, p) if p.starts_with("/sign/") => match path_hash(p, "/sign/") {
            Ok(hash) => routes::handle_sign(&state, &hash, query, headers, addr).await,
            Err(e) => routes::error_response(&e),
        },

        (Method::GET, p) if p.starts_with("/verify/") => match path_hash(p, "/verify/") {
            Ok(hash) => routes::handle_verify(&state, &hash, query, headers).await,
            Err(e) => routes::error_response(&e),
        },

        (Method::GET, p) if p.starts_with("/download/") => match path_hash(p, "/download/") {
            Ok(hash) => routes::handle_download(&state, &hash, query, headers).await,
            Err(e) => routes::error_response(&e),
        },

        (Method::GET, p) if p.starts_with("/params/") => match path_hash(p, "/params/") {
            Ok(hash) => routes::handle_params(&state, &hash, headers).await,
            Err(e) => routes::error_response(&e),
        },

        _ => not_found_response(&path),
    };

    let mut response = to_boxed(response);
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    Ok(response)
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "code": "ResourceNotFound",
        "message": format!("{path} does not exist"),
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_state;

    fn peer() -> SocketAddr {
        "10.0.0.7:52000".parse().unwrap()
    }

    async fn send(method: Method, uri: &str) -> Response<BoxBody> {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap();
        handle_request(Arc::new(test_state()), peer(), req)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_routing() {
        let response = send(Method::GET, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(Method::GET, "/version").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(Method::OPTIONS, "/sign/abc123").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            "GET, POST, OPTIONS"
        );

        let response = send(Method::GET, "/sign/abc123").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(Method::GET, "/verify/abc123").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_sign_route_uses_peer_address() {
        let state = Arc::new(test_state());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/sign/ABC123?tag=v1")
            .body(())
            .unwrap();
        let response = handle_request(Arc::clone(&state), peer(), req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let req = Request::builder()
            .method(Method::GET)
            .uri("/params/abc123")
            .body(())
            .unwrap();
        let response = handle_request(state, peer(), req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_and_malformed_hashes() {
        let response = send(Method::GET, "/params/").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(Method::GET, "/verify/%FF%FE").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
