pub mod handlers;
pub mod routes;
pub mod state;

pub use handlers::*;
pub use routes::*;
pub use state::*;

use aw_models::AwError;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

/// Serves the ingest API on `listener` until `shutdown` resolves.
pub async fn start_server(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AwError> {
    let app = build_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!("Ingest API listening on {}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
