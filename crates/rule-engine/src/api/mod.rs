//! HTTP 适配层
//!
//! 把 [`RuleService`] 暴露为 REST API。

pub mod error;
pub mod handlers;
pub mod response;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use rules_shared::observability::middleware as obs_middleware;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::service::RuleService;

pub use error::ApiError;
pub use response::ApiResponse;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RuleService>,
}

impl AppState {
    pub fn new(service: Arc<RuleService>) -> Self {
        Self { service }
    }
}

/// 规则相关路由
fn rule_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/rules",
            get(handlers::list_rules).post(handlers::create_rule),
        )
        .route("/rules/validate", post(handlers::validate_rule))
        .route(
            "/rules/{id}",
            get(handlers::get_rule)
                .put(handlers::update_rule)
                .delete(handlers::delete_rule),
        )
        .route("/rules/{id}/evaluate", post(handlers::evaluate_rule))
        .route(
            "/entities/{entity_name}/evaluate",
            post(handlers::evaluate_entity),
        )
}

/// 构建完整的 HTTP 应用
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api", rule_routes())
        .route("/health", get(handlers::health_check))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // 可观测性中间件：请求追踪和指标收集
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
