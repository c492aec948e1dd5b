//! 文件列表与删除处理器。

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Extension, OriginalUri, Path, Query};
use axum::http::{StatusCode, Uri};
use axum::response::Json as JsonResponse;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::storage::{FileEntry, Storage};

#[derive(Deserialize, Default)]
pub(crate) struct ListQuery {
    recursive: Option<bool>,
}

/// 路由通配段不含前导 `/`，这里补齐为存储层约定的形式。
fn request_path(path: Option<String>) -> String {
    format!("/{}", path.unwrap_or_default())
}

/// 提取失败同样以 `{url, message}` 形式返回 400。
fn path_param(uri: &Uri, path: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    path.map(|Path(path)| request_path(Some(path)))
        .map_err(|rejection| ApiError::bad_request(uri, rejection.body_text()))
}

fn list_query(
    uri: &Uri,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<ListQuery, ApiError> {
    query
        .map(|Query(query)| query)
        .map_err(|rejection| ApiError::bad_request(uri, rejection.body_text()))
}

/// 列出路径下的文件，默认递归。
pub async fn list_files(
    OriginalUri(uri): OriginalUri,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<JsonResponse<Vec<FileEntry>>, ApiError> {
    let path = path_param(&uri, path)?;
    let query = list_query(&uri, query)?;
    list_at(path, query, uri, storage).await
}

/// 列出根目录下的文件。
pub async fn list_root(
    OriginalUri(uri): OriginalUri,
    query: Result<Query<ListQuery>, QueryRejection>,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<JsonResponse<Vec<FileEntry>>, ApiError> {
    let query = list_query(&uri, query)?;
    list_at(request_path(None), query, uri, storage).await
}

async fn list_at(
    path: String,
    query: ListQuery,
    uri: Uri,
    storage: Arc<Storage>,
) -> Result<JsonResponse<Vec<FileEntry>>, ApiError> {
    let recursive = query.recursive.unwrap_or(true);
    let entries = storage
        .list(&path, recursive)
        .await
        .map_err(|err| ApiError::storage(&uri, err))?;
    info!(path, recursive, count = entries.len(), "list files");
    Ok(JsonResponse(entries))
}

/// 删除文件或空目录树。
pub async fn delete_entry(
    OriginalUri(uri): OriginalUri,
    path: Result<Path<String>, PathRejection>,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<StatusCode, ApiError> {
    let path = path_param(&uri, path)?;
    storage
        .delete(&path)
        .await
        .map_err(|err| ApiError::storage(&uri, err))?;
    info!(path, "delete entry");
    Ok(StatusCode::OK)
}

pub async fn delete_root(
    OriginalUri(uri): OriginalUri,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<StatusCode, ApiError> {
    storage
        .delete("/")
        .await
        .map_err(|err| ApiError::storage(&uri, err))?;
    info!(path = "/", "delete entry");
    Ok(StatusCode::OK)
}

/// 强制递归删除。
pub async fn hard_delete_entry(
    OriginalUri(uri): OriginalUri,
    path: Result<Path<String>, PathRejection>,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<StatusCode, ApiError> {
    let path = path_param(&uri, path)?;
    storage
        .hard_delete(&path)
        .await
        .map_err(|err| ApiError::storage(&uri, err))?;
    info!(path, "hard delete entry");
    Ok(StatusCode::OK)
}

pub async fn hard_delete_root(
    OriginalUri(uri): OriginalUri,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<StatusCode, ApiError> {
    storage
        .hard_delete("/")
        .await
        .map_err(|err| ApiError::storage(&uri, err))?;
    info!(path = "/", "hard delete entry");
    Ok(StatusCode::OK)
}
