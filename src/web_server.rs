// src/web_server.rs
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, State,
    },
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use axum::extract::Query;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{
    ApiMgr, PaginationQuery, INVALID_PAGINATION, INVALID_PARAMETERS, INVALID_POST_ID,
    INVALID_USER_ID,
};
use crate::error::ServiceError;

/// Builds the HTTP surface around a shared `ApiMgr`.
pub fn router(api_mgr: Arc<ApiMgr>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/users", get(list_users_handler))
        .route("/users/:user_id", get(get_user_handler))
        .route("/users/:user_id/posts", get(list_posts_handler))
        .route("/posts/:post_id", delete(delete_post_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(api_mgr)
}

/// Binds `0.0.0.0:port` and serves until the process is stopped.
pub async fn start_server(api_mgr: Arc<ApiMgr>, port: u16) -> std::io::Result<()> {
    let app = router(api_mgr);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Query service listening");

    axum::serve(listener, app.into_make_service()).await
}

/// Runs an `ApiMgr` call on the blocking pool; SQLite calls are synchronous.
async fn run_blocking<T, F>(api_mgr: Arc<ApiMgr>, op: F) -> Result<T, ServiceError>
where
    F: FnOnce(&ApiMgr) -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&api_mgr)).await?
}

async fn root_handler() -> &'static str {
    "Query service is running"
}

async fn list_users_handler(
    State(api_mgr): State<Arc<ApiMgr>>,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Ok(Query(query)) = query else {
        return Err(ServiceError::validation(INVALID_PAGINATION));
    };
    tracing::debug!(?query, "GET /users");
    let page = run_blocking(api_mgr, move |api| api.list_users(&query)).await?;
    Ok(Json(page))
}

async fn get_user_handler(
    State(api_mgr): State<Arc<ApiMgr>>,
    user_id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Ok(Path(user_id)) = user_id else {
        return Err(ServiceError::validation(INVALID_USER_ID));
    };
    tracing::debug!(%user_id, "GET /users/:user_id");
    let user = run_blocking(api_mgr, move |api| api.get_user(&user_id)).await?;
    Ok(Json(user))
}

async fn list_posts_handler(
    State(api_mgr): State<Arc<ApiMgr>>,
    user_id: Result<Path<String>, PathRejection>,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let (Ok(Path(user_id)), Ok(Query(query))) = (user_id, query) else {
        return Err(ServiceError::validation(INVALID_PARAMETERS));
    };
    tracing::debug!(%user_id, ?query, "GET /users/:user_id/posts");
    let page = run_blocking(api_mgr, move |api| api.list_posts(&user_id, &query)).await?;
    Ok(Json(page))
}

async fn delete_post_handler(
    State(api_mgr): State<Arc<ApiMgr>>,
    post_id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Ok(Path(post_id)) = post_id else {
        return Err(ServiceError::validation(INVALID_POST_ID));
    };
    tracing::debug!(%post_id, "DELETE /posts/:post_id");
    let outcome = run_blocking(api_mgr, move |api| api.delete_post(&post_id)).await?;
    Ok(Json(outcome))
}
