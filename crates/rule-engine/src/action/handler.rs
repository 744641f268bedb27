//! 动作处理器 Trait 定义

use async_trait::async_trait;
use uuid::Uuid;

use super::ActionType;
use crate::error::ActionError;
use crate::models::RuleAction;
use crate::value::EntityData;

/// 动作处理器
///
/// 每种动作类型实现一次，由 [`super::ActionDispatcher`] 按 `action_type()` 路由。
/// 分发器在调用 `execute` 之前先调用 `check`，参数不满足要求时不会产生副作用。
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// 此处理器负责的动作类型
    fn action_type(&self) -> ActionType;

    /// 执行前的参数检查
    ///
    /// 默认检查目标实体、必需参数与实体 ID，有额外要求的处理器可覆盖。
    fn check(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError> {
        check_requirements(&self.action_type(), action, entity)
    }

    /// 执行副作用
    async fn execute(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError>;

    /// 处理器描述（用于日志）
    fn description(&self) -> &'static str {
        "Generic Action Handler"
    }
}

/// 检查动作类型的通用要求
pub fn check_requirements(
    action_type: &ActionType,
    action: &RuleAction,
    entity: &EntityData,
) -> Result<(), ActionError> {
    if action.target_entity.trim().is_empty() {
        return Err(ActionError::MissingParameter("targetEntity".to_string()));
    }

    if action.parameters.is_none() {
        return Err(ActionError::InvalidParameters("参数映射不能为 null".to_string()));
    }

    for key in action_type.required_parameters() {
        if action.parameter(key).is_none_or(|v| v.is_blank()) {
            return Err(ActionError::MissingParameter((*key).to_string()));
        }
    }

    if action_type.requires_entity_id() && entity.id().is_none() {
        return Err(ActionError::MissingEntityId);
    }

    Ok(())
}

/// 读取实体记录 ID
pub fn entity_id(entity: &EntityData) -> Result<Uuid, ActionError> {
    let value = entity.id().ok_or(ActionError::MissingEntityId)?;
    value
        .as_identifier()
        .ok_or_else(|| ActionError::InvalidIdentifier {
            field: "id".to_string(),
            value: value.to_string(),
        })
}

/// 读取标识符类型的动作参数
pub fn identifier_param(action: &RuleAction, key: &str) -> Result<Uuid, ActionError> {
    let value = action
        .parameter(key)
        .ok_or_else(|| ActionError::MissingParameter(key.to_string()))?;
    value
        .as_identifier()
        .ok_or_else(|| ActionError::InvalidIdentifier {
            field: key.to_string(),
            value: value.to_string(),
        })
}
