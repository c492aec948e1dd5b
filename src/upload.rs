//! multipart 上传处理器。

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Extension, Multipart, OriginalUri};
use axum::http::Uri;
use axum::response::Json as JsonResponse;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::storage::{Storage, UploadedPayload};

pub const FIELD_FILE: &str = "file";
pub const FIELD_DESTINATION_PATH: &str = "destinationFilePath";
pub const FIELD_DESTINATION_NAME: &str = "destinationFileName";

#[derive(Serialize)]
pub(crate) struct UploadResponse {
    path: String,
}

#[derive(Default)]
struct UploadForm {
    file: Option<Bytes>,
    destination_path: Option<String>,
    destination_name: Option<String>,
}

/// 接收上传文件并写入目标目录。
pub async fn upload_file(
    OriginalUri(uri): OriginalUri,
    Extension(storage): Extension<Arc<Storage>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<JsonResponse<UploadResponse>, ApiError> {
    let multipart =
        multipart.map_err(|rejection| ApiError::bad_request(&uri, rejection.body_text()))?;
    let form = read_form(&uri, multipart).await?;
    let file = form
        .file
        .ok_or_else(|| missing_field(&uri, FIELD_FILE))?;
    let destination_path = form
        .destination_path
        .ok_or_else(|| missing_field(&uri, FIELD_DESTINATION_PATH))?;
    let destination_name = form
        .destination_name
        .ok_or_else(|| missing_field(&uri, FIELD_DESTINATION_NAME))?;

    let payload = UploadedPayload::new(file);
    let path = storage
        .save(&payload, &destination_path, &destination_name)
        .await
        .map_err(|err| ApiError::storage(&uri, err))?;
    info!(path, size = payload.len(), "upload stored");
    Ok(JsonResponse(UploadResponse { path }))
}

async fn read_form(uri: &Uri, mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(uri, err.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(FIELD_FILE) => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(uri, err.body_text()))?;
                form.file = Some(data);
            }
            Some(FIELD_DESTINATION_PATH) => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ApiError::bad_request(uri, err.body_text()))?;
                form.destination_path = Some(value);
            }
            Some(FIELD_DESTINATION_NAME) => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ApiError::bad_request(uri, err.body_text()))?;
                form.destination_name = Some(value);
            }
            _ => continue,
        }
    }
    Ok(form)
}

fn missing_field(uri: &Uri, field: &str) -> ApiError {
    ApiError::bad_request(uri, format!("missing form field {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::routing::post;
    use http_body_util::BodyExt;
    use tempfile::tempdir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "rootbox-test-boundary";

    fn make_app() -> (tempfile::TempDir, Arc<Storage>, Router) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("storage");
        std::fs::create_dir_all(&root).expect("create storage root");
        let storage = Arc::new(Storage::open(root).expect("open storage"));
        let app = Router::new()
            .route("/upload", post(upload_file))
            .layer(Extension(storage.clone()));
        (temp, storage, app)
    }

    fn multipart_body(file: Option<&str>, fields: &[(&str, &str)]) -> String {
        let mut body = String::new();
        if let Some(contents) = file {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"test.txt\"\r\nContent-Type: text/plain\r\n\r\n{contents}\r\n"
            ));
        }
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn upload_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn upload_stores_file_under_destination() {
        let (_temp, storage, app) = make_app();
        let body = multipart_body(
            Some("Some file"),
            &[
                (FIELD_DESTINATION_PATH, "/111/112/"),
                (FIELD_DESTINATION_NAME, "uploaded.txt"),
            ],
        );

        let response = app.oneshot(upload_request(body)).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let value = json_body(response).await;
        assert_eq!(value["path"], "111/112/uploaded.txt");

        let stored = std::fs::read_to_string(storage.root_path().join("111/112/uploaded.txt"))
            .expect("read stored file");
        assert_eq!(stored, "Some file");
    }

    #[tokio::test]
    async fn upload_rejects_empty_file() {
        let (_temp, storage, app) = make_app();
        let body = multipart_body(
            Some(""),
            &[
                (FIELD_DESTINATION_PATH, "dir"),
                (FIELD_DESTINATION_NAME, "empty.txt"),
            ],
        );

        let response = app.oneshot(upload_request(body)).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = json_body(response).await;
        assert_eq!(value["url"], "/upload");
        assert_eq!(value["message"], "uploaded file is empty");
        assert!(!storage.root_path().join("dir").exists());
    }

    #[tokio::test]
    async fn upload_rejects_missing_fields() {
        let (_temp, _storage, app) = make_app();
        let body = multipart_body(Some("data"), &[(FIELD_DESTINATION_NAME, "a.txt")]);

        let response = app.oneshot(upload_request(body)).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = json_body(response).await;
        assert_eq!(value["message"], "missing form field destinationFilePath");
    }

    #[tokio::test]
    async fn upload_rejects_escaping_name() {
        let (temp, _storage, app) = make_app();
        let body = multipart_body(
            Some("data"),
            &[
                (FIELD_DESTINATION_PATH, "/"),
                (FIELD_DESTINATION_NAME, "../escape.txt"),
            ],
        );

        let response = app.oneshot(upload_request(body)).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn upload_without_multipart_body_returns_json_error() {
        let (_temp, _storage, app) = make_app();
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("not a form"))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = json_body(response).await;
        assert_eq!(value["url"], "/upload");
        assert!(value["message"].as_str().is_some_and(|m| !m.is_empty()));
    }
}
