mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{ConnectInfo, DefaultBodyLimit, State, WebSocketUpgrade},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use cheetoh_api::uploads::{self, UPLOAD_ROUTE, UploadState};
use cheetoh_gateway::{Coordinator, connection};
use cheetoh_room::{Admission, Room};
use cheetoh_types::api::ErrorBody;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cheetoh=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let coordinator = Coordinator::new(Room::new());
    let upload_state = Arc::new(UploadState {
        dir: config.upload_dir.clone(),
        max_bytes: config.max_upload_bytes,
    });

    // Routes
    let ws_route = Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(coordinator);

    let upload_routes = Router::new()
        .route("/upload", post(uploads::upload_file))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(upload_state)
        .nest_service(
            UPLOAD_ROUTE,
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .service(ServeDir::new(&config.upload_dir)),
        );

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(ws_route)
        .merge(upload_routes)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    let addr = config.listen_addr()?;
    info!("Cheetoh chat listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// GET /ws: banned addresses are refused before the upgrade.
async fn ws_upgrade(
    State(coordinator): State<Coordinator>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let address = peer.ip().to_string();
    if let Admission::Reject { remaining_ms } = coordinator.admit(&address).await {
        info!("{} is banned for another {} ms", address, remaining_ms);
        let body = ErrorBody {
            remaining_ms: Some(remaining_ms),
            ..ErrorBody::new("banned")
        };
        return (StatusCode::FORBIDDEN, Json(body)).into_response();
    }

    ws.on_upgrade(move |socket| connection::handle_connection(socket, coordinator, address))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
