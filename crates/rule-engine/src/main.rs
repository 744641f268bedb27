//! 实体规则引擎服务
//!
//! 提供规则管理、校验与评估的 REST API。

use std::sync::Arc;
use std::time::Duration;

use rule_engine::{
    ActionDispatcher, InMemoryRuleRepository, RuleEngine, RuleService, RuleValidator,
    ValidationLimits,
    action::InMemoryPlatform,
    api::{self, AppState},
};
use rules_shared::{config::AppConfig, observability};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 从 config/{service_name}.toml 与 RULES_* 环境变量加载配置
    let config = AppConfig::load("rule-engine").unwrap_or_default();

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting rule-engine on {}", config.server_addr());

    if config.is_production() {
        warn!("内存仓储与内存平台不持久化数据，重启后规则将丢失");
    }

    let limits = ValidationLimits::from(&config.engine);
    info!(?limits, "规则校验上限已加载");

    let platform = Arc::new(InMemoryPlatform::new());
    let executor = Arc::new(ActionDispatcher::with_defaults(platform));

    let service = Arc::new(RuleService::new(
        Arc::new(InMemoryRuleRepository::new()),
        RuleValidator::with_limits(limits),
        RuleEngine::new(executor),
    ));

    let app = api::router(
        AppState::new(service),
        Duration::from_secs(config.server.request_timeout_seconds),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
