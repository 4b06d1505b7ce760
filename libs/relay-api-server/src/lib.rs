mod http;

use std::sync::Arc;

use axum::routing::any;
use axum::Router;
use tokio_util::sync::CancellationToken;

use relay_engine::Relay;

#[derive(Clone)]
struct AppState {
    relay: Arc<Relay>,
}

/// HTTP API сервер relay: один endpoint, verb-машина внутри handler'а.
pub async fn run(
    port: u16,
    relay: Arc<Relay>,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(relay);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}

/// Router отдельно от run(): тесты гоняют его напрямую через
/// tower::ServiceExt::oneshot, без листенера.
///
/// Один `any()` route вместо method routing: total_requests должен
/// инкрементироваться ровно один раз на любой verb, включая
/// неподдерживаемые, до какого-либо ветвления.
pub fn router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/api/simulation-data", any(http::handle_simulation_data))
        .with_state(AppState { relay })
}
