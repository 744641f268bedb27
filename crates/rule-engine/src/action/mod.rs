//! 规则动作执行
//!
//! 编排器只依赖 [`ActionExecutor`] 能力，不关心副作用如何落地。
//! 默认实现 [`ActionDispatcher`] 按动作类型路由到各 [`ActionHandler`]，
//! 处理器再通过 [`RecordPlatform`] 调用外部记录平台。

mod dispatcher;
mod handler;
mod handlers;
mod platform;

pub use dispatcher::ActionDispatcher;
pub use handler::{ActionHandler, check_requirements, entity_id, identifier_param};
pub use handlers::{
    AssignRecordHandler, CreateRecordHandler, DeleteRecordHandler, SendEmailHandler,
    SetStatusHandler, ShareRecordHandler, StartWorkflowHandler, UpdateFieldHandler,
    UpdateRecordHandler, default_handlers,
};
pub use platform::{EntityReference, InMemoryPlatform, PlatformRequest, RecordFields, RecordPlatform};

#[cfg(test)]
pub use platform::MockRecordPlatform;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ActionError;
use crate::models::RuleAction;
use crate::value::EntityData;

/// 动作类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    UpdateField,
    CreateRecord,
    UpdateRecord,
    DeleteRecord,
    SendEmail,
    StartWorkflow,
    SetStatus,
    AssignRecord,
    ShareRecord,
    /// 无法识别（或为空）的动作类型名称
    Unknown(String),
}

/// 受支持的动作类型
pub const SUPPORTED_ACTION_TYPES: [ActionType; 9] = [
    ActionType::UpdateField,
    ActionType::CreateRecord,
    ActionType::UpdateRecord,
    ActionType::DeleteRecord,
    ActionType::SendEmail,
    ActionType::StartWorkflow,
    ActionType::SetStatus,
    ActionType::AssignRecord,
    ActionType::ShareRecord,
];

impl ActionType {
    /// 按名称解析（不区分大小写）
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "UPDATE_FIELD" => Self::UpdateField,
            "CREATE_RECORD" => Self::CreateRecord,
            "UPDATE_RECORD" => Self::UpdateRecord,
            "DELETE_RECORD" => Self::DeleteRecord,
            "SEND_EMAIL" => Self::SendEmail,
            "START_WORKFLOW" => Self::StartWorkflow,
            "SET_STATUS" => Self::SetStatus,
            "ASSIGN_RECORD" => Self::AssignRecord,
            "SHARE_RECORD" => Self::ShareRecord,
            _ => Self::Unknown(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::UpdateField => "UPDATE_FIELD",
            Self::CreateRecord => "CREATE_RECORD",
            Self::UpdateRecord => "UPDATE_RECORD",
            Self::DeleteRecord => "DELETE_RECORD",
            Self::SendEmail => "SEND_EMAIL",
            Self::StartWorkflow => "START_WORKFLOW",
            Self::SetStatus => "SET_STATUS",
            Self::AssignRecord => "ASSIGN_RECORD",
            Self::ShareRecord => "SHARE_RECORD",
            Self::Unknown(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// 该动作必须携带的参数
    pub fn required_parameters(&self) -> &'static [&'static str] {
        match self {
            Self::UpdateRecord | Self::DeleteRecord => &["recordId"],
            Self::SendEmail => &["to", "subject"],
            Self::StartWorkflow => &["workflowId"],
            Self::SetStatus => &["status"],
            Self::AssignRecord => &["assigneeId"],
            Self::ShareRecord => &["userId"],
            Self::UpdateField | Self::CreateRecord | Self::Unknown(_) => &[],
        }
    }

    /// 该动作是否作用于当前实体记录（需要实体数据中的 `id`）
    pub fn requires_entity_id(&self) -> bool {
        matches!(
            self,
            Self::UpdateField
                | Self::StartWorkflow
                | Self::SetStatus
                | Self::AssignRecord
                | Self::ShareRecord
        )
    }
}

impl Default for ActionType {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl From<String> for ActionType {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<ActionType> for String {
    fn from(action_type: ActionType) -> Self {
        match action_type {
            ActionType::Unknown(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 动作执行能力
///
/// 编排器按声明顺序逐个调用 `execute`，收到错误即停止后续动作。
/// `validate` 是执行器内部在产生副作用前的预检查，编排器不直接调用。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// 执行单个动作
    async fn execute(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError>;

    /// 预检查动作参数是否满足该动作类型的要求
    fn validate(&self, action: &RuleAction, entity: &EntityData) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_parse() {
        assert_eq!(ActionType::parse("send_email"), ActionType::SendEmail);
        assert_eq!(ActionType::parse("Share_Record"), ActionType::ShareRecord);
        assert_eq!(
            ActionType::parse("SEND_SMS"),
            ActionType::Unknown("SEND_SMS".into())
        );

        for action_type in &SUPPORTED_ACTION_TYPES {
            assert_eq!(&ActionType::parse(action_type.as_str()), action_type);
        }
    }

    #[test]
    fn test_required_parameters() {
        assert_eq!(ActionType::DeleteRecord.required_parameters(), &["recordId"]);
        assert_eq!(ActionType::SendEmail.required_parameters(), &["to", "subject"]);
        assert!(ActionType::CreateRecord.required_parameters().is_empty());
        assert!(ActionType::AssignRecord.requires_entity_id());
        assert!(!ActionType::DeleteRecord.requires_entity_id());
    }
}
