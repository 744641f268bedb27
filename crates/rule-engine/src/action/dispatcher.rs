//! 动作分发器
//!
//! 按动作类型索引 [`ActionHandler`]，实现 [`ActionExecutor`]：
//! 先做参数预检查，通过后再交给对应处理器执行。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::handler::ActionHandler;
use super::handlers::default_handlers;
use super::platform::RecordPlatform;
use super::{ActionExecutor, ActionType};
use crate::error::ActionError;
use crate::models::RuleAction;
use crate::value::EntityData;

/// 动作分发器
pub struct ActionDispatcher {
    handlers: HashMap<ActionType, Arc<dyn ActionHandler>>,
}

impl ActionDispatcher {
    /// 创建空的分发器
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// 注册处理器，同类型的已有处理器会被替换
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) -> &mut Self {
        let action_type = handler.action_type();
        debug!(
            action_type = %action_type,
            description = handler.description(),
            "注册动作处理器"
        );
        self.handlers.insert(action_type, handler);
        self
    }

    pub fn get(&self, action_type: &ActionType) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action_type).cloned()
    }

    pub fn contains(&self, action_type: &ActionType) -> bool {
        self.handlers.contains_key(action_type)
    }

    pub fn registered_types(&self) -> Vec<ActionType> {
        self.handlers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 注册全部默认处理器
    pub fn with_defaults(platform: Arc<dyn RecordPlatform>) -> Self {
        let mut dispatcher = Self::new();

        for handler in default_handlers(platform) {
            dispatcher.register(handler);
        }

        info!(handler_count = dispatcher.len(), "默认动作处理器初始化完成");

        dispatcher
    }

    fn handler_for(&self, action: &RuleAction) -> Result<Arc<dyn ActionHandler>, ActionError> {
        self.get(&action.action_type)
            .ok_or_else(|| ActionError::UnsupportedAction(action.action_type.to_string()))
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for ActionDispatcher {
    #[instrument(
        skip_all,
        fields(action_type = %action.action_type, target_entity = %action.target_entity)
    )]
    async fn execute(&self, action: &RuleAction, entity: &EntityData) -> Result<(), ActionError> {
        let handler = self.handler_for(action)?;

        if let Err(e) = handler.check(action, entity) {
            warn!(error = %e, "动作预检查未通过");
            return Err(e);
        }

        handler.execute(action, entity).await
    }

    fn validate(&self, action: &RuleAction, entity: &EntityData) -> bool {
        self.handler_for(action)
            .and_then(|handler| handler.check(action, entity))
            .is_ok()
    }
}
