//! HTTP 层错误
//!
//! 把服务层的 [`RuleError`] 映射为状态码与错误码。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::RuleError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Rule(e) => match e {
                RuleError::RuleNotFound(_) => StatusCode::NOT_FOUND,
                RuleError::RuleAlreadyExists(_) => StatusCode::CONFLICT,
                RuleError::InvalidRule { .. } => StatusCode::BAD_REQUEST,
                RuleError::Repository(_) | RuleError::JsonError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Rule(e) => match e {
                RuleError::RuleNotFound(_) => "RULE_NOT_FOUND",
                RuleError::RuleAlreadyExists(_) => "RULE_ALREADY_EXISTS",
                RuleError::InvalidRule { .. } => "VALIDATION_ERROR",
                RuleError::Repository(_) => "REPOSITORY_ERROR",
                RuleError::JsonError(_) => "INTERNAL_ERROR",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let (message, data) = match &self {
            Self::Rule(e @ (RuleError::Repository(_) | RuleError::JsonError(_))) => {
                tracing::error!(error = %e, "规则服务内部错误");
                ("服务内部错误，请稍后重试".to_string(), serde_json::Value::Null)
            }
            Self::Rule(RuleError::InvalidRule { errors }) => {
                (self.to_string(), json!({ "errors": errors }))
            }
            other => (other.to_string(), serde_json::Value::Null),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": data
        });

        (status, axum::Json(body)).into_response()
    }
}
