mod handlers;

pub use handlers::{Prediction, predict};

use std::{future, io, time::Instant};

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use log::{info, warn};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;

use crate::handle::ModelHandle;

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub model: ModelHandle,
}

/// Builds the service's routes around an already opened model.
///
/// Any origin may call the service, with credentials, any method and any header.
pub fn router(model: ModelHandle) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::very_permissive())
        .with_state(AppState { model })
}

/// Serves `router` on `listener` until ctrl-c is received.
///
/// # Errors
/// Only if the listener fails, handler errors become responses.
pub async fn serve(listener: TcpListener, router: Router) -> io::Result<()> {
    info!("listening at {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c, draining connections"),
        Err(e) => {
            warn!("failed to listen for ctrl-c: {e}");
            future::pending::<()>().await;
        }
    }
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let res = next.run(req).await;

    info!(
        status = res.status().as_u16();
        "{method} {path} -> {} in {:.1?}",
        res.status(),
        started.elapsed()
    );
    res
}
