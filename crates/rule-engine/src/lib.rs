//! 实体规则引擎
//!
//! 针对业务实体数据评估声明式规则：
//! - 条件树求值（逻辑、比较、字符串、集合、日期操作符）
//! - 规则定义校验
//! - 条件满足后按顺序执行动作
//! - 规则仓储与 HTTP 管理接口

pub mod action;
pub mod api;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod operators;
pub mod repository;
pub mod service;
pub mod validator;
pub mod value;

pub use action::{ActionDispatcher, ActionExecutor, ActionType};
pub use engine::RuleEngine;
pub use error::{ActionError, Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use models::{
    CompositeCondition, LeafCondition, Rule, RuleAction, RuleCondition, RuleEvaluationResult,
    ValidationResult,
};
pub use operators::{FieldType, Operator};
pub use repository::{InMemoryRuleRepository, RuleRepository};
pub use service::RuleService;
pub use validator::{RuleValidator, ValidationLimits};
pub use value::{EntityData, FieldValue};
