//! 规则服务
//!
//! 组合仓储、校验器与规则引擎：写入前先校验，评估前先按 ID 或实体类型取出规则。

use std::sync::Arc;

use futures::future::join_all;
use rules_shared::observability::metrics;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::engine::RuleEngine;
use crate::error::{Result, RuleError};
use crate::models::{Rule, RuleEvaluationResult, ValidationResult};
use crate::repository::RuleRepository;
use crate::validator::RuleValidator;
use crate::value::EntityData;

/// 规则服务
#[derive(Clone)]
pub struct RuleService {
    repository: Arc<dyn RuleRepository>,
    validator: RuleValidator,
    engine: RuleEngine,
}

impl RuleService {
    pub fn new(
        repository: Arc<dyn RuleRepository>,
        validator: RuleValidator,
        engine: RuleEngine,
    ) -> Self {
        Self {
            repository,
            validator,
            engine,
        }
    }

    /// 校验规则定义
    pub fn validate_rule(&self, rule: &Rule) -> ValidationResult {
        let result = self.validator.validate_rule(rule);
        metrics::record_rule_validation(result.is_valid);
        result
    }

    fn ensure_valid(&self, rule: &Rule) -> Result<()> {
        let result = self.validate_rule(rule);
        if result.is_valid {
            return Ok(());
        }

        warn!(errors = ?result.errors, "规则校验未通过");
        Err(RuleError::InvalidRule {
            errors: result.errors,
        })
    }

    #[instrument(skip(self, rule), fields(rule_id = %rule.id, rule_name = %rule.name))]
    pub async fn create_rule(&self, rule: Rule) -> Result<Rule> {
        self.ensure_valid(&rule)?;
        let created = self.repository.create(rule).await?;
        info!(entity_name = %created.entity_name, "规则创建成功");
        Ok(created)
    }

    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub async fn update_rule(&self, rule: Rule) -> Result<Rule> {
        self.ensure_valid(&rule)?;
        let updated = self.repository.update(rule).await?;
        info!(version = updated.version, "规则更新成功");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_rule(&self, id: Uuid) -> Result<()> {
        self.repository.delete(id).await
    }

    pub async fn get_rule(&self, id: Uuid) -> Result<Rule> {
        self.repository
            .get(id)
            .await?
            .ok_or(RuleError::RuleNotFound(id))
    }

    /// 列出规则，指定实体名时只返回该实体的规则
    pub async fn list_rules(&self, entity_name: Option<&str>) -> Result<Vec<Rule>> {
        match entity_name {
            Some(name) => self.repository.list_by_entity(name).await,
            None => self.repository.list_all().await,
        }
    }

    /// 按 ID 评估单条规则
    #[instrument(skip(self, entity))]
    pub async fn evaluate_rule(&self, id: Uuid, entity: &EntityData) -> Result<RuleEvaluationResult> {
        let rule = self.get_rule(id).await?;
        Ok(self.engine.evaluate_rule(&rule, entity).await)
    }

    /// 评估实体类型下的全部激活规则
    ///
    /// 各规则独立并发评估，结果按规则名称排序返回。
    #[instrument(skip(self, entity))]
    pub async fn evaluate_entity(
        &self,
        entity_name: &str,
        entity: &EntityData,
    ) -> Result<Vec<RuleEvaluationResult>> {
        let rules: Vec<Rule> = self
            .repository
            .list_by_entity(entity_name)
            .await?
            .into_iter()
            .filter(|rule| rule.is_active)
            .collect();

        info!(rule_count = rules.len(), "开始评估实体规则");

        let results = join_all(
            rules
                .iter()
                .map(|rule| self.engine.evaluate_rule(rule, entity)),
        )
        .await;

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionType, MockActionExecutor};
    use crate::models::{RuleAction, RuleCondition};
    use crate::operators::{FieldType, Operator};
    use crate::repository::{InMemoryRuleRepository, MockRuleRepository};

    fn valid_rule(name: &str) -> Rule {
        Rule::new(name, "account")
            .with_condition(RuleCondition::leaf(
                "revenue",
                Operator::GreaterThan,
                FieldType::Money,
                "1000",
            ))
            .with_action(
                RuleAction::new(ActionType::UpdateField, "account")
                    .with_target_field("tier")
                    .with_value("gold"),
            )
    }

    fn service_with(
        repository: Arc<dyn RuleRepository>,
        executor: MockActionExecutor,
    ) -> RuleService {
        RuleService::new(
            repository,
            RuleValidator::new(),
            RuleEngine::new(Arc::new(executor)),
        )
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_rule() {
        let mut repository = MockRuleRepository::new();
        repository.expect_create().never();

        let service = service_with(Arc::new(repository), MockActionExecutor::new());
        let result = service.create_rule(Rule::new("", "account")).await;

        match result {
            Err(RuleError::InvalidRule { errors }) => {
                assert!(errors.contains(&"规则名称不能为空".to_string()));
                assert!(errors.contains(&"根条件不能为空".to_string()));
            }
            other => panic!("expected InvalidRule, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_rule() {
        let mut repository = MockRuleRepository::new();
        repository.expect_update().never();

        let service = service_with(Arc::new(repository), MockActionExecutor::new());
        let mut rule = valid_rule("r");
        rule.entity_name = "bad name".to_string();

        assert!(matches!(
            service.update_rule(rule).await,
            Err(RuleError::InvalidRule { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_persists_valid_rule() {
        let mut repository = MockRuleRepository::new();
        repository
            .expect_create()
            .times(1)
            .returning(|rule| Ok(rule));

        let service = service_with(Arc::new(repository), MockActionExecutor::new());
        let created = service.create_rule(valid_rule("r")).await.unwrap();
        assert_eq!(created.name, "r");
    }

    #[tokio::test]
    async fn test_get_missing_rule() {
        let mut repository = MockRuleRepository::new();
        repository.expect_get().returning(|_| Ok(None));

        let service = service_with(Arc::new(repository), MockActionExecutor::new());
        let id = Uuid::new_v4();

        assert!(matches!(
            service.get_rule(id).await,
            Err(RuleError::RuleNotFound(missing)) if missing == id
        ));
        assert!(matches!(
            service.evaluate_rule(id, &EntityData::new()).await,
            Err(RuleError::RuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_rules_routes_by_filter() {
        let mut repository = MockRuleRepository::new();
        repository
            .expect_list_by_entity()
            .withf(|name| name == "account")
            .times(1)
            .returning(|_| Ok(vec![]));
        repository
            .expect_list_all()
            .times(1)
            .returning(|| Ok(vec![]));

        let service = service_with(Arc::new(repository), MockActionExecutor::new());
        service.list_rules(Some("account")).await.unwrap();
        service.list_rules(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_evaluate_rule_by_id() {
        let mut executor = MockActionExecutor::new();
        executor.expect_execute().times(1).returning(|_, _| Ok(()));

        let repository = Arc::new(InMemoryRuleRepository::new());
        let service = service_with(repository, executor);
        let created = service.create_rule(valid_rule("r")).await.unwrap();

        let result = service
            .evaluate_rule(created.id, &EntityData::new().with("revenue", 5000.0))
            .await
            .unwrap();

        assert!(result.is_success);
        assert_eq!(result.executed_actions.len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_entity_skips_inactive_and_keeps_name_order() {
        let mut executor = MockActionExecutor::new();
        executor.expect_execute().times(2).returning(|_, _| Ok(()));

        let repository = Arc::new(InMemoryRuleRepository::new());
        let service = service_with(repository, executor);

        service.create_rule(valid_rule("b")).await.unwrap();
        service.create_rule(valid_rule("a")).await.unwrap();
        service
            .create_rule(valid_rule("c").inactive())
            .await
            .unwrap();
        service
            .create_rule(Rule {
                entity_name: "contact".to_string(),
                ..valid_rule("d")
            })
            .await
            .unwrap();

        let results = service
            .evaluate_entity("account", &EntityData::new().with("revenue", 5000))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_success));

        let names: Vec<_> = results
            .iter()
            .map(|r| r.execution_context["ruleId"].clone())
            .collect();
        let listed = service.list_rules(Some("account")).await.unwrap();
        let expected: Vec<_> = listed
            .iter()
            .filter(|r| r.is_active)
            .map(|r| serde_json::Value::from(r.id.to_string()))
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_validate_rule() {
        let service = service_with(
            Arc::new(InMemoryRuleRepository::new()),
            MockActionExecutor::new(),
        );

        assert!(service.validate_rule(&valid_rule("r")).is_valid);
        assert!(!service.validate_rule(&Rule::default()).is_valid);
    }
}
