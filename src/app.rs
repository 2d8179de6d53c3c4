use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Span;

use crate::{auth, error::AppError, state::AppState};

/// Every route lives under `/api`; anything else answers with the JSON error shape.
pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .route("/health", get(|| async { "ok" }));

    Router::new()
        .nest("/api", api)
        .fallback(|| async { AppError::NotFound("Route not found".into()) })
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(record_response),
        )
}

fn request_span(req: &Request<Body>) -> Span {
    tracing::info_span!(
        "http_request",
        method = %req.method(),
        uri = %req.uri(),
        status = tracing::field::Empty,
    )
}

fn record_response(res: &Response<Body>, latency: Duration, span: &Span) {
    let status = res.status();
    span.record("status", tracing::field::display(status));
    if status.is_server_error() {
        tracing::error!(%status, ?latency, "response");
    } else {
        tracing::info!(%status, ?latency, "response");
    }
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
