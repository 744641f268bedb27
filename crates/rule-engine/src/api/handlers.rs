//! 规则管理与评估 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{ApiError, ApiResponse, AppState};
use crate::models::{Rule, RuleEvaluationResult, ValidationResult};
use crate::value::EntityData;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// 规则列表查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRulesQuery {
    pub entity_name: Option<String>,
}

/// 查询规则列表
///
/// GET /api/rules?entityName=
pub async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<ListRulesQuery>,
) -> ApiResult<Vec<Rule>> {
    let entity_name = query.entity_name.as_deref().filter(|s| !s.trim().is_empty());
    let rules = state.service.list_rules(entity_name).await?;
    Ok(Json(ApiResponse::success(rules)))
}

/// GET /api/rules/{id}
pub async fn get_rule(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Rule> {
    let rule = state.service.get_rule(id).await?;
    Ok(Json(ApiResponse::success(rule)))
}

/// 创建规则
///
/// POST /api/rules
pub async fn create_rule(
    State(state): State<AppState>,
    Json(rule): Json<Rule>,
) -> Result<(StatusCode, Json<ApiResponse<Rule>>), ApiError> {
    let created = state.service.create_rule(rule).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// 更新规则
///
/// PUT /api/rules/{id}，请求体中的 id 必须与路径一致
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(rule): Json<Rule>,
) -> ApiResult<Rule> {
    if rule.id != id {
        return Err(ApiError::BadRequest(format!(
            "路径 ID {} 与请求体 ID {} 不一致",
            id, rule.id
        )));
    }

    let updated = state.service.update_rule(rule).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/rules/{id}
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.service.delete_rule(id).await?;
    Ok(Json(ApiResponse::<()>::success_empty()))
}

/// 校验规则定义（不落库）
///
/// POST /api/rules/validate
pub async fn validate_rule(
    State(state): State<AppState>,
    Json(rule): Json<Rule>,
) -> ApiResult<ValidationResult> {
    Ok(Json(ApiResponse::success(state.service.validate_rule(&rule))))
}

/// 用实体数据评估单条规则
///
/// POST /api/rules/{id}/evaluate
pub async fn evaluate_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(entity): Json<EntityData>,
) -> ApiResult<RuleEvaluationResult> {
    let result = state.service.evaluate_rule(id, &entity).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// 评估实体类型下的全部激活规则
///
/// POST /api/entities/{entityName}/evaluate
pub async fn evaluate_entity(
    State(state): State<AppState>,
    Path(entity_name): Path<String>,
    Json(entity): Json<EntityData>,
) -> ApiResult<Vec<RuleEvaluationResult>> {
    let results = state.service.evaluate_entity(&entity_name, &entity).await?;
    Ok(Json(ApiResponse::success(results)))
}

/// 存活探针
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "rule-engine"
    }))
}
