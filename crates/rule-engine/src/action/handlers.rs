//! 各动作类型的处理器实现
//!
//! 处理器只负责把动作参数翻译成平台调用，参数检查由 `check` 在执行前完成。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::handler::{ActionHandler, check_requirements, entity_id, identifier_param};
use super::platform::{EntityReference, PlatformRequest, RecordFields, RecordPlatform};
use super::ActionType;
use crate::error::ActionError;
use crate::models::RuleAction;
use crate::value::{EntityData, FieldValue};

/// 邮件主题缺省值
const DEFAULT_EMAIL_SUBJECT: &str = "Rule Engine Notification";

/// 除去指定键之外的全部参数
fn fields_except(action: &RuleAction, excluded: &str) -> RecordFields {
    action
        .parameters
        .iter()
        .flatten()
        .filter(|(key, _)| key.as_str() != excluded)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// 读取整数参数
fn integer_param(action: &RuleAction, key: &str) -> Result<Option<i64>, ActionError> {
    match action.parameter(key) {
        None => Ok(None),
        Some(value) => value.as_whole_number().map(Some).ok_or_else(|| {
            ActionError::InvalidParameters(format!("{} 必须是整数，实际为 '{}'", key, value))
        }),
    }
}

/// 更新当前实体的单个字段
pub struct UpdateFieldHandler {
    platform: Arc<dyn RecordPlatform>,
}

impl UpdateFieldHandler {
    pub fn new(platform: Arc<dyn RecordPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ActionHandler for UpdateFieldHandler {
    fn action_type(&self) -> ActionType {
        ActionType::UpdateField
    }

    fn check(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError> {
        check_requirements(&self.action_type(), action, entity)?;
        if action.target_field.trim().is_empty() {
            return Err(ActionError::MissingParameter("targetField".to_string()));
        }
        if action.value.as_ref().is_none_or(FieldValue::is_absent) {
            return Err(ActionError::MissingParameter("value".to_string()));
        }
        Ok(())
    }

    async fn execute(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError> {
        let id = entity_id(entity)?;
        let value = action.value.clone().unwrap_or_default();
        let fields = RecordFields::from([(action.target_field.clone(), value)]);

        self.platform.update(&action.target_entity, id, fields).await?;

        info!(
            entity_name = %action.target_entity,
            id = %id,
            field = %action.target_field,
            "字段已更新"
        );
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Field Update Handler"
    }
}

/// 以参数作为字段创建新记录
pub struct CreateRecordHandler {
    platform: Arc<dyn RecordPlatform>,
}

impl CreateRecordHandler {
    pub fn new(platform: Arc<dyn RecordPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ActionHandler for CreateRecordHandler {
    fn action_type(&self) -> ActionType {
        ActionType::CreateRecord
    }

    fn check(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError> {
        check_requirements(&self.action_type(), action, entity)?;
        if action.parameters.as_ref().is_none_or(|p| p.is_empty()) {
            return Err(ActionError::InvalidParameters(
                "CREATE_RECORD 至少需要一个字段参数".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, action: &RuleAction, _entity: &EntityData) -> Result<(), ActionError> {
        let fields = action.parameters.clone().unwrap_or_default();
        let id = self.platform.create(&action.target_entity, fields).await?;

        info!(entity_name = %action.target_entity, id = %id, "记录已创建");
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Record Create Handler"
    }
}

/// 按 recordId 更新记录，其余参数作为字段
pub struct UpdateRecordHandler {
    platform: Arc<dyn RecordPlatform>,
}

impl UpdateRecordHandler {
    pub fn new(platform: Arc<dyn RecordPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ActionHandler for UpdateRecordHandler {
    fn action_type(&self) -> ActionType {
        ActionType::UpdateRecord
    }

    async fn execute(&self, action: &RuleAction, _entity: &EntityData) -> Result<(), ActionError> {
        let id = identifier_param(action, "recordId")?;
        let fields = fields_except(action, "recordId");

        self.platform.update(&action.target_entity, id, fields).await?;

        info!(entity_name = %action.target_entity, id = %id, "记录已更新");
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Record Update Handler"
    }
}

/// 按 recordId 删除记录
pub struct DeleteRecordHandler {
    platform: Arc<dyn RecordPlatform>,
}

impl DeleteRecordHandler {
    pub fn new(platform: Arc<dyn RecordPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ActionHandler for DeleteRecordHandler {
    fn action_type(&self) -> ActionType {
        ActionType::DeleteRecord
    }

    async fn execute(&self, action: &RuleAction, _entity: &EntityData) -> Result<(), ActionError> {
        let id = identifier_param(action, "recordId")?;
        self.platform.delete(&action.target_entity, id).await?;

        info!(entity_name = %action.target_entity, id = %id, "记录已删除");
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Record Delete Handler"
    }
}

/// 创建邮件记录
pub struct SendEmailHandler {
    platform: Arc<dyn RecordPlatform>,
}

impl SendEmailHandler {
    pub fn new(platform: Arc<dyn RecordPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ActionHandler for SendEmailHandler {
    fn action_type(&self) -> ActionType {
        ActionType::SendEmail
    }

    async fn execute(&self, action: &RuleAction, _entity: &EntityData) -> Result<(), ActionError> {
        let param = |key: &str, default: &str| {
            action
                .parameter(key)
                .cloned()
                .unwrap_or_else(|| FieldValue::from(default))
        };

        let fields = RecordFields::from([
            ("subject".to_string(), param("subject", DEFAULT_EMAIL_SUBJECT)),
            ("body".to_string(), param("body", "")),
            ("to".to_string(), param("to", "")),
            ("from".to_string(), param("from", "")),
        ]);

        let id = self.platform.create("email", fields).await?;
        debug!(id = %id, to = %param("to", ""), "邮件已创建");
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Email Notification Handler"
    }
}

/// 对当前实体启动工作流
pub struct StartWorkflowHandler {
    platform: Arc<dyn RecordPlatform>,
}

impl StartWorkflowHandler {
    pub fn new(platform: Arc<dyn RecordPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ActionHandler for StartWorkflowHandler {
    fn action_type(&self) -> ActionType {
        ActionType::StartWorkflow
    }

    async fn execute(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError> {
        let workflow_id = identifier_param(action, "workflowId")?;
        let entity_id = entity_id(entity)?;

        self.platform
            .execute(PlatformRequest::StartWorkflow {
                workflow_id,
                entity_id,
            })
            .await?;

        info!(workflow_id = %workflow_id, entity_id = %entity_id, "工作流已启动");
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Workflow Trigger Handler"
    }
}

/// 设置当前实体的状态
pub struct SetStatusHandler {
    platform: Arc<dyn RecordPlatform>,
}

impl SetStatusHandler {
    pub fn new(platform: Arc<dyn RecordPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ActionHandler for SetStatusHandler {
    fn action_type(&self) -> ActionType {
        ActionType::SetStatus
    }

    async fn execute(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError> {
        let state = integer_param(action, "status")?
            .ok_or_else(|| ActionError::MissingParameter("status".to_string()))?;
        let status = integer_param(action, "statusCode")?;
        let target = EntityReference::new(&action.target_entity, entity_id(entity)?);

        info!(target = ?target, state, status, "设置记录状态");
        self.platform
            .execute(PlatformRequest::SetState {
                target,
                state,
                status,
            })
            .await
    }

    fn description(&self) -> &'static str {
        "Status Change Handler"
    }
}

/// 把当前实体分配给指定用户
pub struct AssignRecordHandler {
    platform: Arc<dyn RecordPlatform>,
}

impl AssignRecordHandler {
    pub fn new(platform: Arc<dyn RecordPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ActionHandler for AssignRecordHandler {
    fn action_type(&self) -> ActionType {
        ActionType::AssignRecord
    }

    async fn execute(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError> {
        let assignee = EntityReference::user(identifier_param(action, "assigneeId")?);
        let target = EntityReference::new(&action.target_entity, entity_id(entity)?);

        info!(target = ?target, assignee = %assignee.id, "分配记录");
        self.platform
            .execute(PlatformRequest::Assign { target, assignee })
            .await
    }

    fn description(&self) -> &'static str {
        "Record Assignment Handler"
    }
}

/// 向指定用户共享当前实体（只读）
pub struct ShareRecordHandler {
    platform: Arc<dyn RecordPlatform>,
}

impl ShareRecordHandler {
    pub fn new(platform: Arc<dyn RecordPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ActionHandler for ShareRecordHandler {
    fn action_type(&self) -> ActionType {
        ActionType::ShareRecord
    }

    async fn execute(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError> {
        let principal = EntityReference::user(identifier_param(action, "userId")?);
        let target = EntityReference::new(&action.target_entity, entity_id(entity)?);

        info!(target = ?target, principal = %principal.id, "共享记录");
        self.platform
            .execute(PlatformRequest::GrantAccess { target, principal })
            .await
    }

    fn description(&self) -> &'static str {
        "Record Sharing Handler"
    }
}

/// 全部默认处理器
pub fn default_handlers(platform: Arc<dyn RecordPlatform>) -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(UpdateFieldHandler::new(platform.clone())),
        Arc::new(CreateRecordHandler::new(platform.clone())),
        Arc::new(UpdateRecordHandler::new(platform.clone())),
        Arc::new(DeleteRecordHandler::new(platform.clone())),
        Arc::new(SendEmailHandler::new(platform.clone())),
        Arc::new(StartWorkflowHandler::new(platform.clone())),
        Arc::new(SetStatusHandler::new(platform.clone())),
        Arc::new(AssignRecordHandler::new(platform.clone())),
        Arc::new(ShareRecordHandler::new(platform)),
    ]
}
