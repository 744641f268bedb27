//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::observability::ObservabilityConfig;

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 单个 HTTP 请求的超时时间（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// 规则引擎配置
///
/// 校验器使用的基数上限，均可通过配置文件或 `RULES_ENGINE__*` 环境变量覆盖。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 单条规则允许的最大动作数
    pub max_actions_per_rule: usize,
    /// 单个组合条件允许的最大子条件数
    pub max_sub_conditions: usize,
    /// 元数据值的最大字符数
    pub max_metadata_value_len: usize,
    /// String 类型字段值的最大字符数
    pub max_string_value_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_actions_per_rule: 10,
            max_sub_conditions: 10,
            max_metadata_value_len: 1000,
            max_string_value_len: 4000,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（RULES_ 前缀，双下划线分隔层级，如 RULES_SERVER__PORT -> server.port）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("RULES_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(service_name, &env, Path::new(&config_dir))
    }

    /// 从指定目录和环境加载配置
    pub fn load_from(service_name: &str, env: &str, config_dir: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("RULES")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        // 可观测性配置沿用服务名，便于指标与日志的来源标识
        if config.observability.service_name.is_empty() {
            config.observability.service_name = config.service_name.clone();
        }

        Ok(config)
    }

    /// 获取服务地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.max_actions_per_rule, 10);
        assert_eq!(config.engine.max_sub_conditions, 10);
        assert_eq!(config.engine.max_metadata_value_len, 1000);
    }

    #[test]
    fn test_server_addr() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.server_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let dir = std::env::temp_dir().join(format!("rules-config-empty-{}", std::process::id()));
        let config = AppConfig::load_from("rule-engine", "test", &dir).unwrap();

        assert_eq!(config.service_name, "rule-engine");
        assert_eq!(config.environment, "test");
        assert_eq!(config.observability.service_name, "rule-engine");
        assert_eq!(config.engine.max_actions_per_rule, 10);
        assert!(!config.is_production());
    }

    #[test]
    fn test_load_service_file_overrides_default_file() {
        let dir = std::env::temp_dir().join(format!("rules-config-layered-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut default_file = std::fs::File::create(dir.join("default.toml")).unwrap();
        writeln!(default_file, "[server]\nhost = \"127.0.0.1\"\nport = 7000").unwrap();

        let mut service_file = std::fs::File::create(dir.join("rule-engine.toml")).unwrap();
        writeln!(
            service_file,
            "[server]\nhost = \"127.0.0.1\"\nport = 7100\n\n[engine]\nmax_actions_per_rule = 5"
        )
        .unwrap();

        let config = AppConfig::load_from("rule-engine", "test", &dir).unwrap();
        assert_eq!(config.server.port, 7100);
        assert_eq!(config.engine.max_actions_per_rule, 5);
        // 未覆盖的项保留默认值
        assert_eq!(config.engine.max_sub_conditions, 10);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
