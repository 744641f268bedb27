//! 规则引擎领域模型

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::action::ActionType;
use crate::operators::{FieldType, Operator};
use crate::value::FieldValue;

/// 规则定义
///
/// 一个根条件加一组有序动作，作用于某一实体类型。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rule {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub entity_name: String,
    pub is_active: bool,
    pub version: u32,
    pub root_condition: Option<RuleCondition>,
    pub actions: Vec<RuleAction>,
    pub metadata: BTreeMap<String, String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub environment: String,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            description: String::new(),
            entity_name: String::new(),
            is_active: true,
            version: 1,
            root_condition: None,
            actions: Vec::new(),
            metadata: BTreeMap::new(),
            created_by: String::new(),
            created_at: Utc::now(),
            modified_at: None,
            modified_by: None,
            environment: String::new(),
        }
    }
}

impl Rule {
    pub fn new(name: impl Into<String>, entity_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_name: entity_name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.root_condition = Some(condition);
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// 条件树节点
///
/// 叶子节点与组合节点互斥。JSON 中携带非空 `subConditions` 的节点
/// 一律解析为组合节点，其 `fieldName`/`value` 被忽略；操作符为逻辑
/// 操作符且没有字段名的节点也解析为（空的）组合节点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCondition", into = "RawCondition")]
pub enum RuleCondition {
    Leaf(LeafCondition),
    Composite(CompositeCondition),
}

/// 叶子条件：字段比较
#[derive(Debug, Clone, PartialEq)]
pub struct LeafCondition {
    pub field_name: String,
    pub operator: Operator,
    pub field_type: FieldType,
    pub value: Option<FieldValue>,
    /// 字符串族操作符是否忽略大小写
    pub ignore_case: bool,
}

impl LeafCondition {
    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

/// 组合条件：逻辑组合
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeCondition {
    pub operator: Operator,
    pub sub_conditions: Vec<RuleCondition>,
}

impl RuleCondition {
    pub fn leaf(
        field_name: impl Into<String>,
        operator: Operator,
        field_type: FieldType,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self::Leaf(LeafCondition {
            field_name: field_name.into(),
            operator,
            field_type,
            value: Some(value.into()),
            ignore_case: false,
        })
    }

    /// 不需要比较值的叶子条件（如 IS_EMPTY、IS_TODAY）
    pub fn unary(field_name: impl Into<String>, operator: Operator, field_type: FieldType) -> Self {
        Self::Leaf(LeafCondition {
            field_name: field_name.into(),
            operator,
            field_type,
            value: None,
            ignore_case: false,
        })
    }

    pub fn composite(operator: Operator, sub_conditions: Vec<RuleCondition>) -> Self {
        Self::Composite(CompositeCondition {
            operator,
            sub_conditions,
        })
    }

    pub fn and(sub_conditions: Vec<RuleCondition>) -> Self {
        Self::composite(Operator::And, sub_conditions)
    }

    pub fn or(sub_conditions: Vec<RuleCondition>) -> Self {
        Self::composite(Operator::Or, sub_conditions)
    }

    pub fn not(condition: RuleCondition) -> Self {
        Self::composite(Operator::Not, vec![condition])
    }

    pub fn xor(sub_conditions: Vec<RuleCondition>) -> Self {
        Self::composite(Operator::Xor, sub_conditions)
    }

    pub fn operator(&self) -> &Operator {
        match self {
            Self::Leaf(leaf) => &leaf.operator,
            Self::Composite(composite) => &composite.operator,
        }
    }
}

/// 条件节点的 JSON 表示
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawCondition {
    #[serde(skip_serializing_if = "String::is_empty")]
    field_name: String,
    operator: Operator,
    #[serde(skip_serializing_if = "is_unset_field_type")]
    field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<FieldValue>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    ignore_case: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sub_conditions: Vec<RawCondition>,
}

fn is_unset_field_type(field_type: &FieldType) -> bool {
    matches!(field_type, FieldType::Unknown(name) if name.is_empty())
}

impl From<RawCondition> for RuleCondition {
    fn from(raw: RawCondition) -> Self {
        let composite = !raw.sub_conditions.is_empty()
            || (raw.operator.is_logical() && raw.field_name.is_empty());

        if composite {
            Self::Composite(CompositeCondition {
                operator: raw.operator,
                sub_conditions: raw.sub_conditions.into_iter().map(Self::from).collect(),
            })
        } else {
            Self::Leaf(LeafCondition {
                field_name: raw.field_name,
                operator: raw.operator,
                field_type: raw.field_type,
                value: raw.value,
                ignore_case: raw.ignore_case,
            })
        }
    }
}

impl From<RuleCondition> for RawCondition {
    fn from(condition: RuleCondition) -> Self {
        match condition {
            RuleCondition::Leaf(leaf) => Self {
                field_name: leaf.field_name,
                operator: leaf.operator,
                field_type: leaf.field_type,
                value: leaf.value,
                ignore_case: leaf.ignore_case,
                sub_conditions: Vec::new(),
            },
            RuleCondition::Composite(composite) => Self {
                operator: composite.operator,
                sub_conditions: composite
                    .sub_conditions
                    .into_iter()
                    .map(Self::from)
                    .collect(),
                ..Default::default()
            },
        }
    }
}

/// 规则动作
///
/// `parameters` 缺省为空映射；显式的 `null` 保留为 None，由校验器拒绝。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleAction {
    pub action_type: ActionType,
    pub target_entity: String,
    pub target_field: String,
    pub value: Option<FieldValue>,
    pub parameters: Option<BTreeMap<String, FieldValue>>,
}

impl Default for RuleAction {
    fn default() -> Self {
        Self {
            action_type: ActionType::default(),
            target_entity: String::new(),
            target_field: String::new(),
            value: None,
            parameters: Some(BTreeMap::new()),
        }
    }
}

impl RuleAction {
    pub fn new(action_type: ActionType, target_entity: impl Into<String>) -> Self {
        Self {
            action_type,
            target_entity: target_entity.into(),
            ..Default::default()
        }
    }

    pub fn with_target_field(mut self, field: impl Into<String>) -> Self {
        self.target_field = field.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.parameters
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// 读取参数，缺失或为 null 时返回 None
    pub fn parameter(&self, key: &str) -> Option<&FieldValue> {
        self.parameters
            .as_ref()?
            .get(key)
            .filter(|v| !v.is_absent())
    }
}

/// 规则校验结果
///
/// 初始为有效，追加任意错误后即变为无效，不会再恢复。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(error.into());
    }
}

/// 规则评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluationResult {
    pub is_success: bool,
    pub message: String,
    /// 动作失败或执行异常的原因
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// 实际执行成功的动作（`rule.actions` 的前缀）
    #[serde(default)]
    pub executed_actions: Vec<RuleAction>,
    #[serde(default)]
    pub execution_context: BTreeMap<String, Value>,
}

impl RuleEvaluationResult {
    pub fn new(is_success: bool, message: impl Into<String>) -> Self {
        Self {
            is_success,
            message: message.into(),
            error: None,
            executed_actions: Vec::new(),
            execution_context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.execution_context.insert(key.into(), value.into());
        self
    }
}
