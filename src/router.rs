//! 路由装配：文件接口、中间件与共享存储。

use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::Request;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info_span};

use crate::http::{add_security_headers, build_cors_layer, client_ip, enforce_request_timeout};
use crate::storage::Storage;
use crate::{files, upload, version};

/// Router-level settings that do not belong to the storage itself.
#[derive(Clone, Debug)]
pub struct RouterSettings {
    pub upload_max_size: usize,
    pub request_timeout: Duration,
    pub cors_origins: Option<String>,
}

pub fn build_router(storage: Arc<Storage>, settings: &RouterSettings) -> Router {
    let mut app = Router::new()
        .route("/list", get(files::list_root))
        .route("/list/", get(files::list_root))
        .route("/list/{*path}", get(files::list_files))
        .route("/files", get(files::list_root))
        .route("/files/", get(files::list_root))
        .route("/files/{*path}", get(files::list_files))
        .route(
            "/upload",
            post(upload::upload_file).layer(DefaultBodyLimit::max(settings.upload_max_size)),
        )
        .route("/delete", get(files::delete_root))
        .route("/delete/", get(files::delete_root))
        .route("/delete/{*path}", get(files::delete_entry))
        .route("/hardDelete", get(files::hard_delete_root))
        .route("/hardDelete/", get(files::hard_delete_root))
        .route("/hardDelete/{*path}", get(files::hard_delete_entry))
        .route("/api/version", get(version::get_version_info))
        .layer(middleware::from_fn_with_state(
            settings.request_timeout,
            enforce_request_timeout,
        ))
        .layer(middleware::from_fn(add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip = client_ip(request),
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(storage));

    if let Some(cors_layer) = build_cors_layer(settings.cors_origins.as_deref()) {
        app = app.layer(cors_layer);
    }
    app
}
