//! 外部记录平台能力
//!
//! 动作处理器通过 [`RecordPlatform`] 读写业务记录、触发工作流等。
//! [`InMemoryPlatform`] 把所有调用记录在内存中，供演示服务与测试使用。

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::ActionError;
use crate::value::FieldValue;

/// 记录字段集合
pub type RecordFields = BTreeMap<String, FieldValue>;

/// 记录引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub logical_name: String,
    pub id: Uuid,
}

impl EntityReference {
    pub fn new(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            logical_name: logical_name.into(),
            id,
        }
    }

    /// 平台用户
    pub fn user(id: Uuid) -> Self {
        Self::new("systemuser", id)
    }
}

/// 非 CRUD 类的平台请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlatformRequest {
    StartWorkflow {
        workflow_id: Uuid,
        entity_id: Uuid,
    },
    SetState {
        target: EntityReference,
        state: i64,
        status: Option<i64>,
    },
    Assign {
        target: EntityReference,
        assignee: EntityReference,
    },
    /// 授予只读访问权限
    GrantAccess {
        target: EntityReference,
        principal: EntityReference,
    },
}

/// 记录平台接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordPlatform: Send + Sync {
    /// 创建记录，返回新记录 ID
    async fn create(&self, entity_name: &str, fields: RecordFields) -> Result<Uuid, ActionError>;

    /// 合并更新记录字段
    async fn update(
        &self,
        entity_name: &str,
        id: Uuid,
        fields: RecordFields,
    ) -> Result<(), ActionError>;

    async fn delete(&self, entity_name: &str, id: Uuid) -> Result<(), ActionError>;

    async fn execute(&self, request: PlatformRequest) -> Result<(), ActionError>;
}

/// 内存记录平台
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    records: DashMap<(String, Uuid), RecordFields>,
    requests: Mutex<Vec<PlatformRequest>>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置记录
    pub fn insert_record(&self, entity_name: &str, id: Uuid, fields: RecordFields) {
        self.records.insert((entity_name.to_string(), id), fields);
    }

    pub fn record(&self, entity_name: &str, id: Uuid) -> Option<RecordFields> {
        self.records
            .get(&(entity_name.to_string(), id))
            .map(|r| r.value().clone())
    }

    /// 指定实体类型的全部记录
    pub fn records(&self, entity_name: &str) -> Vec<(Uuid, RecordFields)> {
        self.records
            .iter()
            .filter(|r| r.key().0 == entity_name)
            .map(|r| (r.key().1, r.value().clone()))
            .collect()
    }

    /// 已执行的平台请求（按调用顺序）
    pub fn requests(&self) -> Vec<PlatformRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl RecordPlatform for InMemoryPlatform {
    async fn create(&self, entity_name: &str, fields: RecordFields) -> Result<Uuid, ActionError> {
        let id = Uuid::new_v4();
        debug!(entity_name = %entity_name, id = %id, "创建记录");
        self.records.insert((entity_name.to_string(), id), fields);
        Ok(id)
    }

    async fn update(
        &self,
        entity_name: &str,
        id: Uuid,
        fields: RecordFields,
    ) -> Result<(), ActionError> {
        let mut record = self
            .records
            .get_mut(&(entity_name.to_string(), id))
            .ok_or_else(|| ActionError::Platform(format!("记录不存在: {}({})", entity_name, id)))?;

        debug!(entity_name = %entity_name, id = %id, fields = fields.len(), "更新记录");
        record.extend(fields);
        Ok(())
    }

    async fn delete(&self, entity_name: &str, id: Uuid) -> Result<(), ActionError> {
        self.records
            .remove(&(entity_name.to_string(), id))
            .map(|_| debug!(entity_name = %entity_name, id = %id, "删除记录"))
            .ok_or_else(|| ActionError::Platform(format!("记录不存在: {}({})", entity_name, id)))
    }

    async fn execute(&self, request: PlatformRequest) -> Result<(), ActionError> {
        debug!(request = ?request, "执行平台请求");
        self.requests.lock().push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_update_delete() {
        let platform = InMemoryPlatform::new();

        let fields = RecordFields::from([("subject".to_string(), FieldValue::from("Follow up"))]);
        let id = platform.create("task", fields).await.unwrap();

        let update = RecordFields::from([("priority".to_string(), FieldValue::from(2))]);
        platform.update("task", id, update).await.unwrap();

        let record = platform.record("task", id).unwrap();
        assert_eq!(record.get("subject"), Some(&FieldValue::from("Follow up")));
        assert_eq!(record.get("priority"), Some(&FieldValue::Integer(2)));
        assert_eq!(platform.records("task").len(), 1);

        platform.delete("task", id).await.unwrap();
        assert!(platform.record("task", id).is_none());
    }

    #[tokio::test]
    async fn test_missing_record_is_error() {
        let platform = InMemoryPlatform::new();
        let id = Uuid::new_v4();

        assert!(matches!(
            platform.update("task", id, RecordFields::new()).await,
            Err(ActionError::Platform(_))
        ));
        assert!(matches!(
            platform.delete("task", id).await,
            Err(ActionError::Platform(_))
        ));
    }

    #[test]
    fn test_records_are_scoped_by_entity() {
        let platform = InMemoryPlatform::new();
        let id = Uuid::new_v4();
        platform.insert_record("account", id, RecordFields::new());

        let task_id = tokio_test::block_on(platform.create("task", RecordFields::new())).unwrap();

        assert_eq!(platform.records("account"), vec![(id, RecordFields::new())]);
        assert_eq!(platform.records("task").len(), 1);
        assert!(platform.record("account", task_id).is_none());
    }

    #[tokio::test]
    async fn test_requests_are_recorded_in_order() {
        let platform = InMemoryPlatform::new();
        let target = EntityReference::new("account", Uuid::new_v4());

        platform
            .execute(PlatformRequest::SetState {
                target: target.clone(),
                state: 1,
                status: None,
            })
            .await
            .unwrap();
        platform
            .execute(PlatformRequest::Assign {
                target,
                assignee: EntityReference::user(Uuid::new_v4()),
            })
            .await
            .unwrap();

        let requests = platform.requests();
        assert_eq!(requests.len(), 2);
        assert!(matches!(requests[0], PlatformRequest::SetState { state: 1, .. }));
        assert!(matches!(requests[1], PlatformRequest::Assign { .. }));
    }
}
