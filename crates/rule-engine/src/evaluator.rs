//! 条件评估器
//!
//! 对条件树做深度优先递归评估。评估是纯函数：缺失字段、无法解析的值、
//! 未知操作符都归结为 `false`，不会产生错误。

use std::slice;

use chrono::{DateTime, TimeDelta, Utc};
use regex::RegexBuilder;

use crate::models::{CompositeCondition, LeafCondition, RuleCondition};
use crate::operators::Operator;
use crate::value::{EntityData, FieldValue};

/// 条件评估器
///
/// 只持有评估时钟，日期类操作符以它作为"当前时间"。
/// 未固定时钟时每次评估读取系统时间。
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator {
    now: Option<DateTime<Utc>>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 固定评估时钟
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Some(now) }
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// 评估条件，缺失的条件视为不满足
    pub fn evaluate(&self, condition: Option<&RuleCondition>, entity: &EntityData) -> bool {
        match condition {
            Some(condition) => self.evaluate_node(condition, entity),
            None => false,
        }
    }

    fn evaluate_node(&self, condition: &RuleCondition, entity: &EntityData) -> bool {
        match condition {
            RuleCondition::Composite(composite) => self.evaluate_composite(composite, entity),
            RuleCondition::Leaf(leaf) => self.evaluate_leaf(leaf, entity),
        }
    }

    fn evaluate_composite(&self, composite: &CompositeCondition, entity: &EntityData) -> bool {
        let subs = &composite.sub_conditions;
        if subs.is_empty() {
            return false;
        }

        match composite.operator {
            Operator::And => subs.iter().all(|c| self.evaluate_node(c, entity)),
            Operator::Or => subs.iter().any(|c| self.evaluate_node(c, entity)),
            // 多于一个子条件属于校验错误，运行时只取第一个
            Operator::Not => !self.evaluate_node(&subs[0], entity),
            // 所有分支都要评估后计数
            Operator::Xor => {
                subs.iter()
                    .filter(|c| self.evaluate_node(c, entity))
                    .count()
                    == 1
            }
            _ => false,
        }
    }

    fn evaluate_leaf(&self, leaf: &LeafCondition, entity: &EntityData) -> bool {
        let Some(field) = entity.get(&leaf.field_name) else {
            return false;
        };

        let field = field.coerce(&leaf.field_type);

        match leaf.operator {
            Operator::IsEmpty => return field.is_blank(),
            Operator::IsNotEmpty => return !field.is_blank(),
            _ => {}
        }

        if field.is_absent() {
            return false;
        }

        if !leaf.operator.requires_operand() {
            return self.evaluate_unary_date(&leaf.operator, &field);
        }

        let Some(operand) = leaf.value.as_ref().filter(|v| !v.is_absent()) else {
            return false;
        };
        let operand = operand.coerce(&leaf.field_type);

        match leaf.operator {
            Operator::Equals => field.loosely_equals(&operand),
            Operator::NotEquals => !field.loosely_equals(&operand),
            Operator::GreaterThan => field.compare(&operand).is_gt(),
            Operator::LessThan => field.compare(&operand).is_lt(),
            Operator::GreaterThanOrEquals => field.compare(&operand).is_ge(),
            Operator::LessThanOrEquals => field.compare(&operand).is_le(),

            Operator::Contains => contains(&field, &operand, leaf.ignore_case),
            Operator::NotContains => !contains(&field, &operand, leaf.ignore_case),
            Operator::StartsWith => {
                let (text, pattern) = texts(&field, &operand, leaf.ignore_case);
                text.starts_with(&pattern)
            }
            Operator::EndsWith => {
                let (text, pattern) = texts(&field, &operand, leaf.ignore_case);
                text.ends_with(&pattern)
            }
            Operator::RegexMatch => RegexBuilder::new(&operand.to_string())
                .case_insensitive(leaf.ignore_case)
                .build()
                .map(|re| re.is_match(&field.to_string()))
                .unwrap_or(false),

            Operator::In => match operand.as_sequence() {
                Some(items) => items.iter().any(|item| field.loosely_equals(item)),
                None => false,
            },
            Operator::NotIn => match operand.as_sequence() {
                Some(items) => !items.iter().any(|item| field.loosely_equals(item)),
                None => false,
            },
            Operator::ContainsAll => match operand.as_sequence() {
                Some(expected) => {
                    let actual = elements(&field);
                    expected
                        .iter()
                        .all(|e| actual.iter().any(|a| a.loosely_equals(e)))
                }
                None => false,
            },
            Operator::ContainsAny => match operand.as_sequence() {
                Some(expected) => {
                    let actual = elements(&field);
                    expected
                        .iter()
                        .any(|e| actual.iter().any(|a| a.loosely_equals(e)))
                }
                None => false,
            },

            Operator::IsWithinDays => self.is_within_days(&field, &operand),

            // 逻辑操作符出现在叶子上、未知操作符
            _ => false,
        }
    }

    fn evaluate_unary_date(&self, operator: &Operator, field: &FieldValue) -> bool {
        let Some(ts) = field.as_timestamp() else {
            return false;
        };
        let now = self.now();

        match operator {
            Operator::IsToday => ts.date_naive() == now.date_naive(),
            Operator::IsFuture => ts > now,
            Operator::IsPast => ts < now,
            _ => false,
        }
    }

    /// 时间戳与当前时间相差不超过 N 天（过去或将来）
    fn is_within_days(&self, field: &FieldValue, operand: &FieldValue) -> bool {
        let Some(ts) = field.as_timestamp() else {
            return false;
        };
        let Some(window) = operand
            .as_whole_number()
            .filter(|days| *days >= 0)
            .and_then(TimeDelta::try_days)
        else {
            return false;
        };

        let delta = ts - self.now();
        delta <= window && -delta <= window
    }
}

/// 集合操作中把标量字段视为单元素序列
fn elements(value: &FieldValue) -> &[FieldValue] {
    match value {
        FieldValue::Sequence(items) => items,
        other => slice::from_ref(other),
    }
}

fn texts(field: &FieldValue, operand: &FieldValue, ignore_case: bool) -> (String, String) {
    let (text, pattern) = (field.to_string(), operand.to_string());
    if ignore_case {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text, pattern)
    }
}

/// 序列字段按元素判断成员，其余按字符串子串判断
fn contains(field: &FieldValue, operand: &FieldValue, ignore_case: bool) -> bool {
    match field {
        FieldValue::Sequence(items) => items.iter().any(|item| {
            if ignore_case {
                item.to_string().to_lowercase() == operand.to_string().to_lowercase()
            } else {
                item.loosely_equals(operand)
            }
        }),
        _ => {
            let (text, pattern) = texts(field, operand, ignore_case);
            text.contains(&pattern)
        }
    }
}
