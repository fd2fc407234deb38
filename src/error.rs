//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::models::{geography::GeoLevel, role::Role};

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    // ===== 参考数据错误（ConfigurationFault） =====
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("No policy registered for role {0}")]
    MissingRolePolicy(Role),

    #[error("Invalid role policy table: {0}")]
    InvalidRolePolicy(String),

    #[error("{level} {id} references missing parent {parent_id}")]
    DanglingParent {
        level: GeoLevel,
        id: String,
        parent_id: String,
    },

    #[error("Actor assigned to unknown {level} {id}")]
    UnknownAssignment { level: GeoLevel, id: String },

    #[error("Invalid geography: {0}")]
    InvalidGeography(String),

    #[error("Resource {resource} has no location column for level {level}")]
    UnscopedResource { resource: String, level: GeoLevel },

    // ===== 访问结果 =====
    #[error("Authentication failed")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    // ===== 请求错误 =====
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::UnknownRole(_)
            | AppError::MissingRolePolicy(_)
            | AppError::InvalidRolePolicy(_)
            | AppError::DanglingParent { .. }
            | AppError::UnknownAssignment { .. }
            | AppError::InvalidGeography(_)
            | AppError::UnscopedResource { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 参考数据损坏，必须中止操作（fail closed）
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            AppError::Config(_)
                | AppError::UnknownRole(_)
                | AppError::MissingRolePolicy(_)
                | AppError::InvalidRolePolicy(_)
                | AppError::DanglingParent { .. }
                | AppError::UnknownAssignment { .. }
                | AppError::InvalidGeography(_)
                | AppError::UnscopedResource { .. }
        )
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized => "Authentication failed".to_string(),
            AppError::Forbidden => "Access denied".to_string(),
            AppError::NotFound(msg) => format!("Resource not found: {}", msg),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            _ => "Configuration error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn validation(msg: &str) -> Self {
        AppError::Validation(msg.to_string())
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.user_message(),
                request_id,
            },
        };

        // 拒绝访问是预期结果，不按错误记录
        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                configuration_fault = self.is_configuration_fault(),
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::debug!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Request rejected"
            );
        }

        (status, Json(error_response)).into_response()
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}
