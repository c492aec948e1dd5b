//! 统一的 API 错误类型与转换。

use axum::Json;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use crate::storage::StorageError;

/// 错误响应体，包含请求地址与错误描述。
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub url: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(ErrorInfo),
    Internal(ErrorInfo),
}

impl ApiError {
    pub fn bad_request(uri: &Uri, message: impl Into<String>) -> Self {
        ApiError::BadRequest(ErrorInfo {
            url: uri.to_string(),
            message: message.into(),
        })
    }

    pub fn internal(uri: &Uri, message: impl Into<String>) -> Self {
        ApiError::Internal(ErrorInfo {
            url: uri.to_string(),
            message: message.into(),
        })
    }

    /// 按存储错误类别映射为 400 或 500。
    pub fn storage(uri: &Uri, err: StorageError) -> Self {
        if err.is_client_error() {
            ApiError::bad_request(uri, err.to_string())
        } else {
            ApiError::internal(uri, err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(info) => {
                warn!(url = %info.url, message = %info.message, "request rejected");
                (StatusCode::BAD_REQUEST, Json(info)).into_response()
            }
            ApiError::Internal(info) => {
                error!(url = %info.url, message = %info.message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(info)).into_response()
            }
        }
    }
}
