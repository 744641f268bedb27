//! 规则评估编排器
//!
//! 检查激活状态、评估根条件，条件满足时按声明顺序逐个执行动作，
//! 遇到第一个失败即停止。调用总是返回 [`RuleEvaluationResult`]，
//! 动作执行器的错误或 panic 都会折叠进结果中。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::FutureExt;
use rules_shared::observability::metrics;
use tracing::{debug, error, info, instrument, warn};

use crate::action::ActionExecutor;
use crate::evaluator::ConditionEvaluator;
use crate::models::{Rule, RuleEvaluationResult};
use crate::value::EntityData;

const MSG_INACTIVE: &str = "规则未激活";
const MSG_MATCHED: &str = "规则条件满足";
const MSG_NOT_MATCHED: &str = "规则条件不满足";

/// 评估结局（指标标签）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Inactive,
    NotMatched,
    Matched,
    ActionFailed,
    Faulted,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::NotMatched => "not_matched",
            Self::Matched => "matched",
            Self::ActionFailed => "action_failed",
            Self::Faulted => "faulted",
        }
    }
}

/// 规则引擎
///
/// 不持有跨调用状态，可在多个任务间共享并发评估。
#[derive(Clone)]
pub struct RuleEngine {
    executor: Arc<dyn ActionExecutor>,
}

impl RuleEngine {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }

    /// 以当前时间评估规则
    pub async fn evaluate_rule(&self, rule: &Rule, entity: &EntityData) -> RuleEvaluationResult {
        self.evaluate_rule_at(rule, entity, Utc::now()).await
    }

    /// 以指定时间作为日期类操作符的"当前时间"评估规则
    #[instrument(
        skip_all,
        fields(rule_id = %rule.id, rule_name = %rule.name, entity_name = %rule.entity_name)
    )]
    pub async fn evaluate_rule_at(
        &self,
        rule: &Rule,
        entity: &EntityData,
        now: DateTime<Utc>,
    ) -> RuleEvaluationResult {
        let start = Instant::now();

        let (mut result, outcome) = match AssertUnwindSafe(self.run(rule, entity, now))
            .catch_unwind()
            .await
        {
            Ok(evaluated) => evaluated,
            Err(payload) => {
                let cause = panic_message(payload.as_ref());
                error!(error = %cause, "规则评估异常");
                let mut result =
                    RuleEvaluationResult::new(false, format!("规则评估异常: {}", cause));
                result.error = Some(cause);
                (base_context(result, rule, now), Outcome::Faulted)
            }
        };

        let elapsed = start.elapsed();
        result
            .execution_context
            .insert("durationMs".to_string(), (elapsed.as_millis() as u64).into());

        metrics::record_rule_evaluation(outcome.as_str(), elapsed.as_secs_f64());
        debug!(
            outcome = outcome.as_str(),
            executed = result.executed_actions.len(),
            "规则评估完成"
        );

        result
    }

    async fn run(
        &self,
        rule: &Rule,
        entity: &EntityData,
        now: DateTime<Utc>,
    ) -> (RuleEvaluationResult, Outcome) {
        if !rule.is_active {
            info!("规则未激活，跳过评估");
            let result = RuleEvaluationResult::new(false, MSG_INACTIVE);
            return (base_context(result, rule, now), Outcome::Inactive);
        }

        let matched = ConditionEvaluator::at(now).evaluate(rule.root_condition.as_ref(), entity);
        let message = if matched { MSG_MATCHED } else { MSG_NOT_MATCHED };
        let mut result = base_context(RuleEvaluationResult::new(matched, message), rule, now)
            .with_context("conditionMatched", matched);

        let mut outcome = if matched {
            Outcome::Matched
        } else {
            Outcome::NotMatched
        };

        if matched {
            for (index, action) in rule.actions.iter().enumerate() {
                let action_type = action.action_type.as_str();
                // 在 async 块内调用，执行器同步 panic 也能在此捕获
                let attempt = AssertUnwindSafe(async { self.executor.execute(action, entity).await })
                    .catch_unwind()
                    .await;

                let (message, cause) = match attempt {
                    Ok(Ok(())) => {
                        metrics::record_rule_action(action_type, "success");
                        result.executed_actions.push(action.clone());
                        continue;
                    }
                    Ok(Err(e)) => {
                        metrics::record_rule_action(action_type, "failed");
                        (
                            format!("动作 actions[{}] ({}) 执行失败: {}", index, action_type, e),
                            e.to_string(),
                        )
                    }
                    Err(payload) => {
                        metrics::record_rule_action(action_type, "panicked");
                        let cause = panic_message(payload.as_ref());
                        (
                            format!("动作 actions[{}] ({}) 执行异常: {}", index, action_type, cause),
                            cause,
                        )
                    }
                };

                warn!(
                    action_index = index,
                    action_type = %action_type,
                    error = %cause,
                    "动作执行失败，停止后续动作"
                );

                result.message = message;
                result.error = Some(cause);
                result
                    .execution_context
                    .insert("failedActionIndex".to_string(), index.into());
                outcome = Outcome::ActionFailed;
                break;
            }
        }

        let executed = result.executed_actions.len();
        let result = result
            .with_context("actionsTotal", rule.actions.len())
            .with_context("actionsExecuted", executed);

        (result, outcome)
    }
}

fn base_context(result: RuleEvaluationResult, rule: &Rule, now: DateTime<Utc>) -> RuleEvaluationResult {
    result
        .with_context("ruleId", rule.id.to_string())
        .with_context("ruleVersion", rule.version)
        .with_context("entityName", rule.entity_name.clone())
        .with_context(
            "evaluatedAt",
            now.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知异常".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionType, MockActionExecutor};
    use crate::error::ActionError;
    use crate::models::{RuleAction, RuleCondition};
    use crate::operators::{FieldType, Operator};
    use serde_json::json;

    struct PanickingExecutor;

    #[async_trait::async_trait]
    impl ActionExecutor for PanickingExecutor {
        async fn execute(&self, _: &RuleAction, _: &EntityData) -> Result<(), ActionError> {
            panic!("executor exploded")
        }

        fn validate(&self, _: &RuleAction, _: &EntityData) -> bool {
            true
        }
    }

    fn rule_with_actions(targets: &[&str]) -> Rule {
        let mut rule = Rule::new("Test Rule", "account").with_condition(RuleCondition::leaf(
            "name",
            Operator::Equals,
            FieldType::String,
            "Test Account",
        ));
        for target in targets {
            rule = rule.with_action(
                RuleAction::new(ActionType::CreateRecord, *target).with_parameter("subject", "x"),
            );
        }
        rule
    }

    fn matching_entity() -> EntityData {
        EntityData::new().with("name", "Test Account")
    }

    #[tokio::test]
    async fn test_matching_rule_executes_all_actions() {
        let mut executor = MockActionExecutor::new();
        executor.expect_execute().times(2).returning(|_, _| Ok(()));
        executor.expect_validate().never();

        let rule = rule_with_actions(&["a1", "a2"]);
        let engine = RuleEngine::new(Arc::new(executor));
        let result = engine.evaluate_rule(&rule, &matching_entity()).await;

        assert!(result.is_success);
        assert_eq!(result.message, MSG_MATCHED);
        assert_eq!(result.error, None);
        assert_eq!(result.executed_actions, rule.actions);
        assert_eq!(result.execution_context["actionsExecuted"], json!(2));
        assert_eq!(result.execution_context["conditionMatched"], json!(true));
    }

    #[tokio::test]
    async fn test_not_matching_rule_runs_no_actions() {
        let mut executor = MockActionExecutor::new();
        executor.expect_execute().never();

        let rule = rule_with_actions(&["a1"]);
        let engine = RuleEngine::new(Arc::new(executor));
        let result = engine
            .evaluate_rule(&rule, &EntityData::new().with("name", "Other"))
            .await;

        assert!(!result.is_success);
        assert_eq!(result.message, MSG_NOT_MATCHED);
        assert!(result.executed_actions.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_rule_is_skipped() {
        let mut executor = MockActionExecutor::new();
        executor.expect_execute().never();

        let rule = rule_with_actions(&["a1"]).inactive();
        let engine = RuleEngine::new(Arc::new(executor));
        let result = engine.evaluate_rule(&rule, &matching_entity()).await;

        assert!(!result.is_success);
        assert_eq!(result.message, MSG_INACTIVE);
        assert!(result.executed_actions.is_empty());
        assert!(!result.execution_context.contains_key("conditionMatched"));
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let mut executor = MockActionExecutor::new();
        executor
            .expect_execute()
            .withf(|action, _| action.target_entity == "a1")
            .times(1)
            .returning(|_, _| Ok(()));
        executor
            .expect_execute()
            .withf(|action, _| action.target_entity == "a2")
            .times(1)
            .returning(|_, _| Err(ActionError::Platform("连接超时".into())));
        executor
            .expect_execute()
            .withf(|action, _| action.target_entity == "a3")
            .never();

        let rule = rule_with_actions(&["a1", "a2", "a3"]);
        let engine = RuleEngine::new(Arc::new(executor));
        let result = engine.evaluate_rule(&rule, &matching_entity()).await;

        assert_eq!(result.executed_actions, vec![rule.actions[0].clone()]);
        assert!(result.is_success);
        assert!(result.message.contains("actions[1]"));
        assert_eq!(result.error.as_deref(), Some("平台调用失败: 连接超时"));
        assert_eq!(result.execution_context["failedActionIndex"], json!(1));
        assert_eq!(result.execution_context["actionsExecuted"], json!(1));
    }

    #[tokio::test]
    async fn test_executor_panic_is_folded_into_result() {
        let rule = rule_with_actions(&["a1", "a2"]);
        let engine = RuleEngine::new(Arc::new(PanickingExecutor));
        let result = engine.evaluate_rule(&rule, &matching_entity()).await;

        assert!(result.executed_actions.is_empty());
        assert_eq!(result.error.as_deref(), Some("executor exploded"));
        assert!(result.message.contains("执行异常"));
        assert_eq!(result.execution_context["failedActionIndex"], json!(0));
    }

    #[tokio::test]
    async fn test_rule_without_condition_does_not_match() {
        let mut executor = MockActionExecutor::new();
        executor.expect_execute().never();

        let mut rule = rule_with_actions(&["a1"]);
        rule.root_condition = None;

        let engine = RuleEngine::new(Arc::new(executor));
        let result = engine.evaluate_rule(&rule, &matching_entity()).await;
        assert!(!result.is_success);
    }

    #[tokio::test]
    async fn test_execution_context() {
        let executor = MockActionExecutor::new();
        let rule = rule_with_actions(&[]);
        let now = Utc::now();

        let engine = RuleEngine::new(Arc::new(executor));
        let result = engine.evaluate_rule_at(&rule, &matching_entity(), now).await;

        let context = &result.execution_context;
        assert_eq!(context["ruleId"], json!(rule.id.to_string()));
        assert_eq!(context["ruleVersion"], json!(1));
        assert_eq!(context["entityName"], json!("account"));
        assert_eq!(context["actionsTotal"], json!(0));
        assert!(context.contains_key("durationMs"));
        assert!(context.contains_key("evaluatedAt"));
    }
}
