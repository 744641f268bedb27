//! 规则引擎错误类型

use thiserror::Error;
use uuid::Uuid;

/// 规则仓储与服务层错误
///
/// 条件评估不会产生错误（缺失字段、无法解析的值均视为不匹配），
/// 编排器也总是返回评估结果，因此这里只包含调用方契约与存储相关的失败。
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则未找到: {0}")]
    RuleNotFound(Uuid),

    #[error("规则已存在: {0}")]
    RuleAlreadyExists(Uuid),

    #[error("规则校验失败: {}", .errors.join("; "))]
    InvalidRule { errors: Vec<String> },

    #[error("规则仓储错误: {0}")]
    Repository(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// 动作执行错误
///
/// 由动作执行器上报，编排器收到后停止执行后续动作。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("不支持的动作类型: {0}")]
    UnsupportedAction(String),

    #[error("缺少必需参数: {0}")]
    MissingParameter(String),

    #[error("动作参数无效: {0}")]
    InvalidParameters(String),

    #[error("实体数据缺少 id 字段")]
    MissingEntityId,

    #[error("无效的标识符 {field}: '{value}'")]
    InvalidIdentifier { field: String, value: String },

    #[error("平台调用失败: {0}")]
    Platform(String),
}

pub type Result<T> = std::result::Result<T, RuleError>;
