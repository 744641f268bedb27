//! 规则仓储
//!
//! 服务层只依赖 [`RuleRepository`] 抽象；[`InMemoryRuleRepository`] 基于 DashMap，
//! 负责规则生命周期中的版本号与时间戳维护。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, RuleError};
use crate::models::Rule;

/// 规则仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Rule>>;

    /// 全部规则，按名称排序
    async fn list_all(&self) -> Result<Vec<Rule>>;

    /// 指定实体类型的规则（实体名不区分大小写），按名称排序
    async fn list_by_entity(&self, entity_name: &str) -> Result<Vec<Rule>>;

    /// 创建规则，版本号重置为 1
    async fn create(&self, rule: Rule) -> Result<Rule>;

    /// 更新已有规则，版本号加 1 并记录修改时间
    async fn update(&self, rule: Rule) -> Result<Rule>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// 内存规则仓储
#[derive(Clone, Default)]
pub struct InMemoryRuleRepository {
    rules: Arc<DashMap<Uuid, Rule>>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn sorted(mut rules: Vec<Rule>) -> Vec<Rule> {
        rules.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        rules
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Rule>> {
        Ok(self.rules.get(&id).map(|r| r.value().clone()))
    }

    async fn list_all(&self) -> Result<Vec<Rule>> {
        Ok(Self::sorted(
            self.rules.iter().map(|r| r.value().clone()).collect(),
        ))
    }

    async fn list_by_entity(&self, entity_name: &str) -> Result<Vec<Rule>> {
        Ok(Self::sorted(
            self.rules
                .iter()
                .filter(|r| r.entity_name.eq_ignore_ascii_case(entity_name))
                .map(|r| r.value().clone())
                .collect(),
        ))
    }

    #[instrument(skip(self, rule), fields(rule_id = %rule.id, rule_name = %rule.name))]
    async fn create(&self, mut rule: Rule) -> Result<Rule> {
        match self.rules.entry(rule.id) {
            Entry::Occupied(_) => {
                warn!("创建已存在的规则");
                Err(RuleError::RuleAlreadyExists(rule.id))
            }
            Entry::Vacant(slot) => {
                rule.version = 1;
                rule.created_at = Utc::now();
                rule.modified_at = None;
                rule.modified_by = None;
                slot.insert(rule.clone());

                info!("规则已创建");
                Ok(rule)
            }
        }
    }

    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    async fn update(&self, mut rule: Rule) -> Result<Rule> {
        let Some(mut existing) = self.rules.get_mut(&rule.id) else {
            warn!("更新不存在的规则");
            return Err(RuleError::RuleNotFound(rule.id));
        };

        rule.version = existing.version + 1;
        rule.created_at = existing.created_at;
        rule.created_by = existing.created_by.clone();
        rule.modified_at = Some(Utc::now());
        *existing = rule.clone();

        info!(version = rule.version, "规则已更新");
        Ok(rule)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<()> {
        if self.rules.remove(&id).is_some() {
            info!("规则已删除");
            Ok(())
        } else {
            warn!("删除不存在的规则");
            Err(RuleError::RuleNotFound(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryRuleRepository::new();
        let mut rule = Rule::new("VIP", "account");
        rule.version = 7;

        let created = repo.create(rule).await.unwrap();
        assert_eq!(created.version, 1);

        let fetched = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_duplicate() {
        let repo = InMemoryRuleRepository::new();
        let rule = Rule::new("VIP", "account");
        repo.create(rule.clone()).await.unwrap();

        assert!(matches!(
            repo.create(rule).await,
            Err(RuleError::RuleAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_update_increments_version() {
        let repo = InMemoryRuleRepository::new();
        let mut rule = Rule::new("VIP", "account");
        rule.created_by = "alice".to_string();
        let created = repo.create(rule).await.unwrap();

        let mut changed = created.clone();
        changed.description = "changed".to_string();
        changed.created_by = "mallory".to_string();
        changed.version = 1;

        let updated = repo.update(changed.clone()).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.created_by, "alice");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.modified_at.is_some());

        let again = repo.update(changed).await.unwrap();
        assert_eq!(again.version, 3);
    }

    #[tokio::test]
    async fn test_update_missing() {
        let repo = InMemoryRuleRepository::new();
        assert!(matches!(
            repo.update(Rule::new("x", "account")).await,
            Err(RuleError::RuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryRuleRepository::new();
        let created = repo.create(Rule::new("x", "account")).await.unwrap();

        repo.delete(created.id).await.unwrap();
        assert!(repo.get(created.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(created.id).await,
            Err(RuleError::RuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_is_sorted_and_filtered() {
        let repo = InMemoryRuleRepository::new();
        repo.create(Rule::new("b-rule", "account")).await.unwrap();
        repo.create(Rule::new("a-rule", "Account")).await.unwrap();
        repo.create(Rule::new("c-rule", "contact")).await.unwrap();

        let names = |rules: Vec<Rule>| rules.into_iter().map(|r| r.name).collect::<Vec<_>>();

        assert_eq!(
            names(repo.list_all().await.unwrap()),
            vec!["a-rule", "b-rule", "c-rule"]
        );
        assert_eq!(
            names(repo.list_by_entity("account").await.unwrap()),
            vec!["a-rule", "b-rule"]
        );
        assert!(repo.list_by_entity("lead").await.unwrap().is_empty());
    }
}
