//! 实体字段值与实体快照
//!
//! 字段值是封闭的标签联合，比较与集合逻辑可以穷举匹配，
//! 无法按原生类型比较时显式回退到字符串表示比较。

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::operators::FieldType;

/// 动态类型的字段值
///
/// JSON 表示：null → `Absent`，整数 → `Integer`，其他数值 → `Decimal`，
/// 数组 → `Sequence`，字符串 → `String`。`Timestamp` 与 `Identifier`
/// 序列化为字符串，可通过 [`FieldValue::coerce`] 按字段类型从字符串还原。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FieldValue {
    #[default]
    Absent,
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Identifier(Uuid),
    Sequence(Vec<FieldValue>),
}

impl FieldValue {
    /// 值的类型名称（用于日志与错误信息）
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Boolean(_) => "boolean",
            Self::Timestamp(_) => "timestamp",
            Self::Identifier(_) => "identifier",
            Self::Sequence(_) => "sequence",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// 字符串表示为空或仅包含空白
    pub fn is_blank(&self) -> bool {
        self.to_string().trim().is_empty()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// 解析为整数：整数、无小数部分的小数或可解析的字符串
    pub fn as_whole_number(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Decimal(d) if d.fract() == 0.0 && d.is_finite() => Some(*d as i64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 原生数值（整数或小数）转为 f64，字符串不参与转换
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[FieldValue]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// 解析为时间戳：原生时间戳或可解析的字符串
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::String(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// 解析为标识符：原生标识符或可解析的 UUID 字符串
    pub fn as_identifier(&self) -> Option<Uuid> {
        match self {
            Self::Identifier(id) => Some(*id),
            Self::String(s) => Uuid::parse_str(s.trim()).ok(),
            _ => None,
        }
    }

    /// 按字段类型提示把字符串转换为原生类型
    ///
    /// 无法解析时保持原值不变，由调用方回退到字符串比较。
    /// 序列逐元素转换。
    pub fn coerce(&self, field_type: &FieldType) -> Cow<'_, FieldValue> {
        if !field_type.is_typed() {
            return Cow::Borrowed(self);
        }

        match self {
            Self::Sequence(items) => Cow::Owned(Self::Sequence(
                items
                    .iter()
                    .map(|item| item.coerce(field_type).into_owned())
                    .collect(),
            )),
            Self::String(s) => match parse_as(s, field_type) {
                Some(parsed) => Cow::Owned(parsed),
                None => Cow::Borrowed(self),
            },
            _ => Cow::Borrowed(self),
        }
    }

    /// 按原生类型排序
    ///
    /// 数值之间按数值、时间戳之间按时间比较；两侧类型不可比时返回 None。
    pub fn native_cmp(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Integer(_) | Self::Decimal(_), Self::Integer(_) | Self::Decimal(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Identifier(a), Self::Identifier(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.as_str().cmp(b.as_str())),
            _ => None,
        }
    }

    /// 排序比较：优先原生顺序，否则按字符串表示的字节序比较
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        self.native_cmp(other)
            .unwrap_or_else(|| self.to_string().cmp(&other.to_string()))
    }

    /// 宽松相等：优先原生比较，否则按字符串表示逐字比较（区分大小写）
    pub fn loosely_equals(&self, other: &FieldValue) -> bool {
        match self.native_cmp(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self.to_string() == other.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => Ok(()),
            Self::String(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Identifier(id) => write!(f, "{}", id),
            Self::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

/// 解析时间戳
///
/// 支持 RFC 3339、`YYYY-MM-DD HH:MM:SS`、`YYYY-MM-DDTHH:MM:SS`（按 UTC）与纯日期。
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// 解析布尔值（不区分大小写的 true/false）
pub fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_as(s: &str, field_type: &FieldType) -> Option<FieldValue> {
    let trimmed = s.trim();
    match field_type {
        FieldType::Int | FieldType::OptionSet => trimmed.parse().ok().map(FieldValue::Integer),
        FieldType::Decimal | FieldType::Money => trimmed
            .parse::<i64>()
            .map(FieldValue::Integer)
            .ok()
            .or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|d| d.is_finite())
                    .map(FieldValue::Decimal)
            }),
        FieldType::Boolean => parse_bool(trimmed).map(FieldValue::Boolean),
        FieldType::DateTime => parse_timestamp(trimmed).map(FieldValue::Timestamp),
        FieldType::Guid | FieldType::Lookup => {
            Uuid::parse_str(trimmed).ok().map(FieldValue::Identifier)
        }
        _ => None,
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map(Self::Decimal).unwrap_or(Self::Absent),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(_) => Self::String(value.to_string()),
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Absent => Value::Null,
            FieldValue::String(s) => Value::String(s),
            FieldValue::Integer(n) => Value::from(n),
            FieldValue::Decimal(d) => serde_json::Number::from_f64(d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(b),
            FieldValue::Timestamp(_) | FieldValue::Identifier(_) => Value::String(value.to_string()),
            FieldValue::Sequence(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        Self::Integer(n.into())
    }
}

impl From<f64> for FieldValue {
    fn from(d: f64) -> Self {
        Self::Decimal(d)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<Uuid> for FieldValue {
    fn from(id: Uuid) -> Self {
        Self::Identifier(id)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }
}

/// 实体快照：字段名到字段值的不可变映射
///
/// 每次评估调用时由调用方提供，引擎只读不改。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityData {
    fields: BTreeMap<String, FieldValue>,
}

impl EntityData {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加字段（构建器风格）
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// 实体记录 ID（`id` 字段）
    pub fn id(&self) -> Option<&FieldValue> {
        self.fields.get("id").filter(|v| !v.is_absent())
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for EntityData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
