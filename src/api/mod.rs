use crate::api::handlers::{admin::AdminState, health};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{
        header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::options,
    Extension, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;
use url::Url;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::{openapi, upload_body_limit, DEFAULT_ADMIN_PATH};

/// Request body ceiling for every route except the icon upload.
pub const GLOBAL_BODY_LIMIT: usize = 1024 * 1024;

/// Build the full application: documented routes, preflight `OPTIONS /health`,
/// tracing, request ids, CORS and response hardening headers.
///
/// # Errors
/// Returns an error if a CORS origin is not a valid absolute URL.
pub fn app(admin_state: Arc<AdminState>, cors_origins: &[String]) -> Result<Router> {
    let config = admin_state.config();
    let (router, _openapi) =
        openapi::api_router(config.base_path(), config.max_file_size()).split_for_parts();

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-csrf-token")])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::list(allowed_origins(cors_origins)?))
        .allow_credentials(true);

    Ok(router
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(SetResponseHeaderLayer::overriding(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(DefaultBodyLimit::max(GLOBAL_BODY_LIMIT))
                .layer(Extension(admin_state)),
        ))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, admin_state: Arc<AdminState>, cors_origins: &[String]) -> Result<()> {
    if let Err(err) = admin_state.store().load().await {
        warn!("Configuration document is not readable yet: {err}");
    }

    let app = app(admin_state, cors_origins)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("{} listening on [::]:{}", crate::APP_USER_AGENT, port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn allowed_origins(origins: &[String]) -> Result<Vec<HeaderValue>> {
    origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(origin_header)
        .collect()
}

fn origin_header(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid CORS origin: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build CORS origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_header_strips_path_and_keeps_port() -> Result<()> {
        assert_eq!(
            origin_header("http://localhost:8080/site/")?,
            HeaderValue::from_static("http://localhost:8080")
        );
        assert_eq!(
            origin_header("https://example.com")?,
            HeaderValue::from_static("https://example.com")
        );
        Ok(())
    }

    #[test]
    fn allowed_origins_skips_blanks_and_rejects_garbage() {
        let origins = vec![" http://a.test ".to_string(), String::new()];
        assert_eq!(allowed_origins(&origins).map(|o| o.len()).ok(), Some(1));
        assert!(allowed_origins(&["not a url".to_string()]).is_err());
    }
}
