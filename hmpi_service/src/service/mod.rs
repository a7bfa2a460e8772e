//! HTTP upload service.
//!
//! One endpoint, `POST /process-csv`, takes a multipart upload with a `file`
//! field and answers with the scored rows as JSON. Every response carries
//! permissive CORS headers so browser front-ends on other origins can call
//! it directly.
//!
//! Submodules:
//! - `upload` — the upload handler and its error responses.

pub mod upload;

use std::error::Error;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::middleware;
use axum::response::Response;
use axum::routing::post;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::ingest::InvalidValuePolicy;
use crate::logging::{self, Component};

/// Path of the upload endpoint.
pub const PROCESS_CSV_PATH: &str = "/process-csv";

/// Read-only state shared by all requests.
#[derive(Debug, Clone)]
pub struct AppState {
    pub policy: InvalidValuePolicy,
    /// Directory uploads are staged in. Must exist.
    pub upload_dir: PathBuf,
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type,Authorization"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    response
}

/// Builds the router. `max_upload_bytes` caps the request body.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(
            PROCESS_CSV_PATH,
            post(upload::process_csv).options(upload::preflight),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::map_response(add_cors_headers))
        .with_state(Arc::new(state))
}

/// Builds the router from configuration, creating the upload directory if
/// needed.
pub fn app_from_config(config: &ServiceConfig) -> std::io::Result<Router> {
    std::fs::create_dir_all(&config.server.upload_dir)?;
    let state = AppState {
        policy: config.ingest.invalid_value_policy,
        upload_dir: config.server.upload_dir.clone(),
    };
    Ok(router(state, config.server.max_upload_bytes))
}

/// Serves `app` on an already-bound listener until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Binds to the configured address and serves until Ctrl-C.
pub async fn run(config: &ServiceConfig) -> Result<(), Box<dyn Error>> {
    let app = app_from_config(config)?;
    let listener = TcpListener::bind(config.bind_address()).await?;

    logging::info(
        Component::Server,
        None,
        &format!(
            "Listening on http://{}{} (invalid values: {})",
            listener.local_addr()?,
            PROCESS_CSV_PATH,
            config.ingest.invalid_value_policy
        ),
    );

    serve_with_shutdown(listener, app, async {
        tokio::signal::ctrl_c().await.ok();
        logging::info(Component::Server, None, "Shutdown requested");
    })
    .await?;

    Ok(())
}
