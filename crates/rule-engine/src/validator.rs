//! 规则结构校验
//!
//! 持久化前检查规则的结构完整性。校验不依赖评估器，不做 I/O，
//! 遇到错误不会中止，所有问题都会累积到结果中。

use std::sync::LazyLock;

use regex::Regex;
use rules_shared::config::EngineConfig;

use crate::action::ActionType;
use crate::models::{CompositeCondition, LeafCondition, Rule, RuleAction, RuleCondition, ValidationResult};
use crate::operators::{FieldType, Operator, OperatorFamily};
use crate::value::{FieldValue, parse_bool};

/// 实体名与字段名格式
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// 校验上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_actions_per_rule: usize,
    pub max_sub_conditions: usize,
    pub max_metadata_value_len: usize,
    pub max_string_value_len: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_actions_per_rule: 10,
            max_sub_conditions: 10,
            max_metadata_value_len: 1000,
            max_string_value_len: 4000,
        }
    }
}

impl From<&EngineConfig> for ValidationLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_actions_per_rule: config.max_actions_per_rule,
            max_sub_conditions: config.max_sub_conditions,
            max_metadata_value_len: config.max_metadata_value_len,
            max_string_value_len: config.max_string_value_len,
        }
    }
}

/// 规则校验器
#[derive(Debug, Clone, Default)]
pub struct RuleValidator {
    limits: ValidationLimits,
}

impl RuleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// 校验规则，返回累积的全部错误
    pub fn validate_rule(&self, rule: &Rule) -> ValidationResult {
        let mut result = ValidationResult::new();

        if rule.name.trim().is_empty() {
            result.add_error("规则名称不能为空");
        }

        if rule.entity_name.trim().is_empty() {
            result.add_error("实体名称不能为空");
        } else if !IDENTIFIER.is_match(&rule.entity_name) {
            result.add_error(format!("实体名称格式无效: '{}'", rule.entity_name));
        }

        match &rule.root_condition {
            Some(condition) => self.validate_condition(condition, "root", &mut result),
            None => result.add_error("根条件不能为空"),
        }

        if rule.actions.len() > self.limits.max_actions_per_rule {
            result.add_error(format!(
                "动作数量 {} 超过上限 {}",
                rule.actions.len(),
                self.limits.max_actions_per_rule
            ));
        }

        for (i, action) in rule.actions.iter().enumerate() {
            self.validate_action(action, &format!("actions[{}]", i), &mut result);
        }

        for (key, value) in &rule.metadata {
            let len = value.chars().count();
            if len > self.limits.max_metadata_value_len {
                result.add_error(format!(
                    "元数据 '{}' 的值长度 {} 超过上限 {}",
                    key, len, self.limits.max_metadata_value_len
                ));
            }
        }

        result
    }

    fn validate_condition(&self, condition: &RuleCondition, path: &str, result: &mut ValidationResult) {
        match condition {
            RuleCondition::Composite(composite) => self.validate_composite(composite, path, result),
            RuleCondition::Leaf(leaf) => self.validate_leaf(leaf, path, result),
        }
    }

    fn validate_composite(
        &self,
        composite: &CompositeCondition,
        path: &str,
        result: &mut ValidationResult,
    ) {
        let op = &composite.operator;
        if !op.is_supported() {
            result.add_error(format!("{}: 不支持的操作符 '{}'", path, op));
        } else if !op.is_logical() {
            result.add_error(format!("{}: 组合条件必须使用逻辑操作符，实际为 '{}'", path, op));
        }

        let count = composite.sub_conditions.len();
        if count == 0 {
            result.add_error(format!("{}: 组合条件至少需要一个子条件", path));
        } else if *op == Operator::Not && count != 1 {
            result.add_error(format!("{}: NOT 操作符只能有一个子条件，实际为 {}", path, count));
        }

        if count > self.limits.max_sub_conditions {
            result.add_error(format!(
                "{}: 子条件数量 {} 超过上限 {}",
                path, count, self.limits.max_sub_conditions
            ));
        }

        for (i, sub) in composite.sub_conditions.iter().enumerate() {
            self.validate_condition(sub, &format!("{}.subConditions[{}]", path, i), result);
        }
    }

    fn validate_leaf(&self, leaf: &LeafCondition, path: &str, result: &mut ValidationResult) {
        if leaf.field_name.trim().is_empty() {
            result.add_error(format!("{}: 字段名不能为空", path));
        } else if !IDENTIFIER.is_match(&leaf.field_name) {
            result.add_error(format!("{}: 字段名格式无效: '{}'", path, leaf.field_name));
        }

        let op = &leaf.operator;
        match op.family() {
            None if op.as_str().trim().is_empty() => {
                result.add_error(format!("{}: 操作符不能为空", path));
            }
            None => result.add_error(format!("{}: 不支持的操作符 '{}'", path, op)),
            Some(OperatorFamily::Logical) => {
                result.add_error(format!("{}: 叶子条件不能使用逻辑操作符 '{}'", path, op));
            }
            Some(_) => {}
        }

        match &leaf.field_type {
            FieldType::Unknown(name) if name.trim().is_empty() => {
                result.add_error(format!("{}: 字段类型不能为空", path));
            }
            FieldType::Unknown(name) => {
                result.add_error(format!("{}: 不支持的字段类型 '{}'", path, name));
            }
            _ => {}
        }

        let Some(value) = leaf.value.as_ref().filter(|v| !v.is_absent()) else {
            result.add_error(format!("{}: 条件值不能为空", path));
            return;
        };

        self.validate_operand(leaf, value, path, result);
    }

    /// 按操作符检查比较值的形状，再按字段类型检查可解析性
    fn validate_operand(
        &self,
        leaf: &LeafCondition,
        value: &FieldValue,
        path: &str,
        result: &mut ValidationResult,
    ) {
        match leaf.operator {
            Operator::RegexMatch => {
                if let Err(e) = Regex::new(&value.to_string()) {
                    result.add_error(format!("{}: 无效的正则表达式 '{}': {}", path, value, e));
                }
            }
            Operator::IsWithinDays => {
                if !value.as_whole_number().is_some_and(|days| days >= 0) {
                    result.add_error(format!("{}: IS_WITHIN_DAYS 需要非负整数天数，实际为 '{}'", path, value));
                }
            }
            _ => {}
        }

        match leaf.operator.family() {
            Some(OperatorFamily::Comparison) => {
                if let Some(error) = self.check_field_value(&leaf.field_type, value) {
                    result.add_error(format!("{}: {}", path, error));
                }
            }
            Some(OperatorFamily::Collection) => match value.as_sequence() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        if let Some(error) = self.check_field_value(&leaf.field_type, item) {
                            result.add_error(format!("{}.value[{}]: {}", path, i, error));
                        }
                    }
                }
                None => result.add_error(format!(
                    "{}: {} 操作符需要集合类型的值",
                    path, leaf.operator
                )),
            },
            _ => {}
        }
    }

    fn check_field_value(&self, field_type: &FieldType, value: &FieldValue) -> Option<String> {
        let valid = match field_type {
            FieldType::String => {
                let len = value.to_string().chars().count();
                if len > self.limits.max_string_value_len {
                    return Some(format!(
                        "字符串长度 {} 超过上限 {}",
                        len, self.limits.max_string_value_len
                    ));
                }
                true
            }
            FieldType::Int | FieldType::OptionSet => value.as_whole_number().is_some(),
            FieldType::Decimal | FieldType::Money => match value {
                FieldValue::Integer(_) | FieldValue::Decimal(_) => true,
                FieldValue::String(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
                _ => false,
            },
            FieldType::Boolean => match value {
                FieldValue::Boolean(_) => true,
                FieldValue::String(s) => parse_bool(s).is_some(),
                _ => false,
            },
            FieldType::DateTime => value.as_timestamp().is_some(),
            FieldType::Guid | FieldType::Lookup => value.as_identifier().is_some(),
            // 未知类型已单独报告
            FieldType::Unknown(_) => true,
        };

        if valid {
            None
        } else {
            Some(format!("值 '{}' 不是有效的 {} 类型", value, field_type))
        }
    }

    fn validate_action(&self, action: &RuleAction, path: &str, result: &mut ValidationResult) {
        match &action.action_type {
            ActionType::Unknown(name) if name.trim().is_empty() => {
                result.add_error(format!("{}: 动作类型不能为空", path));
            }
            ActionType::Unknown(name) => {
                result.add_error(format!("{}: 不支持的动作类型 '{}'", path, name));
            }
            _ => {}
        }

        if action.target_entity.trim().is_empty() {
            result.add_error(format!("{}: 目标实体不能为空", path));
        }

        if action.parameters.is_none() {
            result.add_error(format!("{}: 动作参数不能为 null", path));
        }

        if action.action_type == ActionType::UpdateField {
            if action.target_field.trim().is_empty() {
                result.add_error(format!("{}: UPDATE_FIELD 需要目标字段", path));
            }
            if action.value.as_ref().is_none_or(FieldValue::is_absent) {
                result.add_error(format!("{}: UPDATE_FIELD 需要字段值", path));
            }
        }
    }
}
