//! 规则操作符与字段类型定义
//!
//! 操作符与字段类型都按名称（不区分大小写）解析，无法识别的名称保留在
//! `Unknown` 中：评估时按不匹配处理，校验时报告为非法值。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    // 逻辑组合
    And,
    Or,
    Not,
    Xor,

    // 比较
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,

    // 字符串
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    RegexMatch,
    IsEmpty,
    IsNotEmpty,

    // 集合
    In,
    NotIn,
    ContainsAll,
    ContainsAny,

    // 日期
    IsToday,
    IsFuture,
    IsPast,
    IsWithinDays,

    /// 无法识别的操作符名称
    Unknown(String),
}

/// 操作符族
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    Logical,
    Comparison,
    String,
    Collection,
    Date,
}

/// 受支持的操作符名称（校验白名单）
pub const SUPPORTED_OPERATORS: &[&str] = &[
    "AND",
    "OR",
    "NOT",
    "XOR",
    "EQUALS",
    "NOT_EQUALS",
    "GREATER_THAN",
    "LESS_THAN",
    "GREATER_THAN_OR_EQUALS",
    "LESS_THAN_OR_EQUALS",
    "CONTAINS",
    "NOT_CONTAINS",
    "STARTS_WITH",
    "ENDS_WITH",
    "REGEX_MATCH",
    "IS_EMPTY",
    "IS_NOT_EMPTY",
    "IN",
    "NOT_IN",
    "CONTAINS_ALL",
    "CONTAINS_ANY",
    "IS_TODAY",
    "IS_FUTURE",
    "IS_PAST",
    "IS_WITHIN_DAYS",
];

impl Operator {
    /// 按名称解析操作符，兼容旧版紧凑写法（如 `greaterthanorequal`）
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "AND" => Self::And,
            "OR" => Self::Or,
            "NOT" => Self::Not,
            "XOR" => Self::Xor,
            "EQUALS" => Self::Equals,
            "NOT_EQUALS" | "NOTEQUALS" => Self::NotEquals,
            "GREATER_THAN" | "GREATERTHAN" => Self::GreaterThan,
            "LESS_THAN" | "LESSTHAN" => Self::LessThan,
            "GREATER_THAN_OR_EQUALS" | "GREATERTHANOREQUAL" => Self::GreaterThanOrEquals,
            "LESS_THAN_OR_EQUALS" | "LESSTHANOREQUAL" => Self::LessThanOrEquals,
            "CONTAINS" => Self::Contains,
            "NOT_CONTAINS" => Self::NotContains,
            "STARTS_WITH" | "STARTSWITH" => Self::StartsWith,
            "ENDS_WITH" | "ENDSWITH" => Self::EndsWith,
            "REGEX_MATCH" => Self::RegexMatch,
            "IS_EMPTY" => Self::IsEmpty,
            "IS_NOT_EMPTY" => Self::IsNotEmpty,
            "IN" => Self::In,
            "NOT_IN" => Self::NotIn,
            "CONTAINS_ALL" => Self::ContainsAll,
            "CONTAINS_ANY" => Self::ContainsAny,
            "IS_TODAY" => Self::IsToday,
            "IS_FUTURE" => Self::IsFuture,
            "IS_PAST" => Self::IsPast,
            "IS_WITHIN_DAYS" => Self::IsWithinDays,
            _ => Self::Unknown(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Xor => "XOR",
            Self::Equals => "EQUALS",
            Self::NotEquals => "NOT_EQUALS",
            Self::GreaterThan => "GREATER_THAN",
            Self::LessThan => "LESS_THAN",
            Self::GreaterThanOrEquals => "GREATER_THAN_OR_EQUALS",
            Self::LessThanOrEquals => "LESS_THAN_OR_EQUALS",
            Self::Contains => "CONTAINS",
            Self::NotContains => "NOT_CONTAINS",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::RegexMatch => "REGEX_MATCH",
            Self::IsEmpty => "IS_EMPTY",
            Self::IsNotEmpty => "IS_NOT_EMPTY",
            Self::In => "IN",
            Self::NotIn => "NOT_IN",
            Self::ContainsAll => "CONTAINS_ALL",
            Self::ContainsAny => "CONTAINS_ANY",
            Self::IsToday => "IS_TODAY",
            Self::IsFuture => "IS_FUTURE",
            Self::IsPast => "IS_PAST",
            Self::IsWithinDays => "IS_WITHIN_DAYS",
            Self::Unknown(name) => name,
        }
    }

    /// 操作符所属族，未知操作符返回 None
    pub fn family(&self) -> Option<OperatorFamily> {
        let family = match self {
            Self::And | Self::Or | Self::Not | Self::Xor => OperatorFamily::Logical,
            Self::Equals
            | Self::NotEquals
            | Self::GreaterThan
            | Self::LessThan
            | Self::GreaterThanOrEquals
            | Self::LessThanOrEquals => OperatorFamily::Comparison,
            Self::Contains
            | Self::NotContains
            | Self::StartsWith
            | Self::EndsWith
            | Self::RegexMatch
            | Self::IsEmpty
            | Self::IsNotEmpty => OperatorFamily::String,
            Self::In | Self::NotIn | Self::ContainsAll | Self::ContainsAny => {
                OperatorFamily::Collection
            }
            Self::IsToday | Self::IsFuture | Self::IsPast | Self::IsWithinDays => {
                OperatorFamily::Date
            }
            Self::Unknown(_) => return None,
        };
        Some(family)
    }

    pub fn is_logical(&self) -> bool {
        self.family() == Some(OperatorFamily::Logical)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// 是否需要比较值（空值检查与部分日期操作不需要）
    pub fn requires_operand(&self) -> bool {
        !matches!(
            self,
            Self::IsEmpty | Self::IsNotEmpty | Self::IsToday | Self::IsFuture | Self::IsPast
        )
    }
}

impl Default for Operator {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<&str> for Operator {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Unknown(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 字段语义类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Int,
    Decimal,
    Boolean,
    DateTime,
    Guid,
    OptionSet,
    Money,
    Lookup,
    /// 无法识别（或为空）的类型名称
    Unknown(String),
}

/// 受支持的字段类型名称（校验白名单）
pub const SUPPORTED_FIELD_TYPES: &[&str] = &[
    "String", "Int", "Decimal", "Boolean", "DateTime", "Guid", "OptionSet", "Money", "Lookup",
];

impl FieldType {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "int" => Self::Int,
            "decimal" => Self::Decimal,
            "boolean" => Self::Boolean,
            "datetime" => Self::DateTime,
            "guid" => Self::Guid,
            "optionset" => Self::OptionSet,
            "money" => Self::Money,
            "lookup" => Self::Lookup,
            _ => Self::Unknown(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::Decimal => "Decimal",
            Self::Boolean => "Boolean",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::OptionSet => "OptionSet",
            Self::Money => "Money",
            Self::Lookup => "Lookup",
            Self::Unknown(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// 是否为带原生表示的类型（字符串值需要按类型解析）
    pub fn is_typed(&self) -> bool {
        !matches!(self, Self::String | Self::Unknown(_))
    }
}

impl Default for FieldType {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<&str> for FieldType {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Unknown(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
