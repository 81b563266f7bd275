use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::projects_base_path;
use crate::discovery::{self, to_slug};
use crate::engine::Engine;
use crate::error::{ApiError, ApiResult};
use crate::models::{ServiceDetail, ServiceSummary};

#[derive(Debug, Serialize)]
struct ServicesResponse {
    services: Vec<ServiceSummary>,
}

/// Latest poll snapshot.
async fn list_services(State(engine): State<Arc<Engine>>) -> Json<ServicesResponse> {
    let state = engine.state.read().await;
    Json(ServicesResponse { services: state.services.clone() })
}

/// Live evaluation of one service, including its pooled log entries and
/// tails. Unknown slugs are a 404, distinct from discovery failures.
async fn service_detail(
    State(engine): State<Arc<Engine>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ServiceDetail>> {
    let discovered =
        discovery::discover_services(&projects_base_path(), &engine.config.exclude)
            .await
            .map_err(|err| ApiError::Internal(format!("Failed to fetch services: {err:#}")))?;

    let svc = discovered
        .into_iter()
        .find(|s| to_slug(&s.dir_name) == slug)
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))?;

    Ok(Json(engine.service_detail(svc).await))
}

pub fn create_router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/api/services", get(list_services))
        .route("/api/services/{slug}", get(service_detail))
        .fallback_service(ServeDir::new("public"))
        .with_state(engine)
}

pub async fn start_server(port: u16, engine: Arc<Engine>) {
    let app = create_router(engine);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Dashboard: http://localhost:{}", addr.port());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind API port");
    axum::serve(listener, app).await.unwrap();
}
