//! 传输端点
//!
//! 持有 HTTP(S) 监听器和全部路由。
//!
//! # 路由
//!
//! - `GET /` 上传页（内嵌 HTML，带 PWA manifest）
//! - `GET /healthz` 存活探针
//! - `POST /upload` multipart 上传，字段名 `file`（可重复）
//! - `GET|POST /share` Web Share Target：文件走 `/upload` 同一套逻辑，
//!   纯文本存成 `shared_text_<epoch>.txt`，完事重定向回 `/`
//!
//! # 响应约定
//!
//! 上传成功 `{"status":"success","files":[...]}`；客户端错误 4xx、
//! 持久化错误 500，都带机器可读的 `{"error": "..."}`。批次内部分
//! 成功不回滚：失败前保存的文件保持原样。

use log::{error, info, warn};

use crate::config::EndpointConfig;
use crate::notify::NotificationSink;
use crate::tls::CertificateProvider;
use crate::transfer::storage::{self, StorageError, StoredFile};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{
        DefaultBodyLimit, Form, FromRequest, Multipart, Request, State,
        multipart::{Field, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

const INDEX_HTML: &str = include_str!("../../static/index.html");
const MANIFEST_JSON: &str = include_str!("../../static/manifest.json");
const SERVICE_WORKER_JS: &str = include_str!("../../static/sw.js");

/// 跨请求共享的服务器状态
///
/// 上传目录的文件系统命名空间是并发上传之间唯一的共享可变状态，
/// 去重由 `storage` 的独占创建保证，这里不需要锁。
pub struct ServerState {
    upload_dir: PathBuf,
    read_timeout: Duration,
    notifier: Arc<dyn NotificationSink>,
}

/// 传输端点
///
/// 由 `EndpointConfig` 显式构造，自己拥有监听器和路由，
/// 不依赖任何进程级单例。
pub struct TransferEndpoint {
    config: EndpointConfig,
    notifier: Arc<dyn NotificationSink>,
}

impl TransferEndpoint {
    pub fn new(config: EndpointConfig, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { config, notifier }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// 构建路由（独立出来方便测试直接挂到任意监听器上）
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            upload_dir: self.config.upload_dir.clone(),
            read_timeout: self.config.read_timeout,
            notifier: self.notifier.clone(),
        });

        let body_limit = usize::try_from(self.config.max_body_bytes).unwrap_or(usize::MAX);

        Router::new()
            .route("/", get(index_handler))
            .route("/healthz", get(healthz_handler))
            .route("/upload", post(upload_handler))
            .route("/share", get(share_redirect_handler).post(share_handler))
            .route("/static/manifest.json", get(manifest_handler))
            .route("/static/sw.js", get(service_worker_handler))
            .layer(DefaultBodyLimit::max(body_limit))
            .with_state(state)
    }

    /// 绑定并一直服务到进程退出
    ///
    /// 绑定失败是终止性错误（不重试），带清晰的上下文向操作者报告。
    pub async fn serve(self) -> Result<()> {
        self.config.ensure_upload_dir()?;

        let addr = SocketAddr::new(self.config.bind_host, self.config.port);
        let provider = CertificateProvider::from_mode(&self.config.tls, &self.config.advertised_ip);
        let app = self.router();

        match provider.resolve().await? {
            Some(tls_config) => {
                info!("Listening on https://{}", addr);
                axum_server::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service())
                    .await
                    .with_context(|| format!("Failed to listen on {}", addr))?;
            }
            None => {
                info!("Listening on http://{}", addr);
                axum_server::bind(addr)
                    .serve(app.into_make_service())
                    .await
                    .with_context(|| format!("Failed to listen on {}", addr))?;
            }
        }

        Ok(())
    }
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz_handler() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn manifest_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/manifest+json")],
        MANIFEST_JSON,
    )
}

async fn service_worker_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript")], SERVICE_WORKER_JS)
}

async fn share_redirect_handler() -> Response {
    redirect_to_index()
}

/// 302 重定向（axum 的 `Redirect::to` 是 303，share-target 约定要 302）
fn redirect_to_index() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

/// 一个 multipart 批次的处理结果
#[derive(Default)]
struct Batch {
    /// 请求里出现过 `file` 字段（哪怕文件名为空）
    saw_file_field: bool,
    /// 至少一个 `file` 条目带非空文件名
    any_named: bool,
    /// 已保存的最终文件名，失败不回滚
    saved: Vec<String>,
    /// 非文件表单字段（share-target 的 text/url）
    fields: HashMap<String, String>,
    failure: Option<(StatusCode, String)>,
}

async fn upload_handler(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    // 非 multipart 请求等同于没有文件字段
    let Ok(multipart) = multipart else {
        return error_response(StatusCode::BAD_REQUEST, "No file part");
    };

    let batch = drain_multipart(&state, multipart).await;
    upload_response(batch)
}

async fn share_handler(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    // Share Target 带文件时 POST multipart，纯文本分享是普通表单
    let fields = if is_multipart {
        let Ok(multipart) = Multipart::from_request(request, &()).await else {
            return redirect_to_index();
        };
        let batch = drain_multipart(&state, multipart).await;
        if batch.saw_file_field {
            return upload_response(batch);
        }
        batch.fields
    } else {
        match Form::<HashMap<String, String>>::from_request(request, &()).await {
            Ok(Form(fields)) => fields,
            Err(_) => return redirect_to_index(),
        }
    };

    // 没有文件就看 text / url，结果如何都重定向回首页
    let shared = fields
        .get("text")
        .or_else(|| fields.get("url"))
        .filter(|s| !s.is_empty());

    if let Some(text) = shared {
        match storage::save_shared_text(&state.upload_dir, text).await {
            Ok(stored) => {
                info!("Saved shared text to {}", stored.final_name);
                state.notifier.notify("File Received", &stored.final_name);
            }
            Err(e) => {
                error!("Failed to save shared text: {}", e);
            }
        }
    }

    redirect_to_index()
}

/// 按序消费整个 multipart 流
///
/// 字段必须流式处理，不能先收集再分类。`file` 字段边读边落盘，
/// 其余字段按文本收进 `fields`。每一次读都套 `read_timeout`：
/// 静默死掉的对端不能一直占着连接。
async fn drain_multipart(state: &ServerState, mut multipart: Multipart) -> Batch {
    let mut batch = Batch::default();

    loop {
        let field = match timeout(state.read_timeout, multipart.next_field()).await {
            Ok(Ok(Some(field))) => field,
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                warn!("Multipart stream error: {}", e);
                batch.failure = Some((e.status(), e.body_text()));
                break;
            }
            Err(_) => {
                warn!("Multipart read timed out, dropping connection");
                batch.failure = Some((
                    StatusCode::REQUEST_TIMEOUT,
                    "Request body read timed out".to_string(),
                ));
                break;
            }
        };

        let field_name = field.name().unwrap_or_default().to_string();
        if field_name == "file" {
            batch.saw_file_field = true;

            let original = field.file_name().unwrap_or_default().to_string();
            if original.is_empty() {
                // 空文件名的条目跳过（浏览器提交空表单会产生这种）
                continue;
            }
            batch.any_named = true;

            match save_file_field(state, field, &original).await {
                Ok(stored) => {
                    state.notifier.notify("File Received", &stored.final_name);
                    batch.saved.push(stored.final_name);
                }
                Err(e) => {
                    // 本文件中止，批次里之前保存的保持原样
                    error!("Failed to save {}: {}", original, e);
                    batch.failure = Some(storage_failure(&e));
                    break;
                }
            }
        } else {
            match timeout(state.read_timeout, field.text()).await {
                Ok(Ok(value)) => {
                    batch.fields.insert(field_name, value);
                }
                Ok(Err(e)) => {
                    batch.failure = Some((e.status(), e.body_text()));
                    break;
                }
                Err(_) => {
                    batch.failure = Some((
                        StatusCode::REQUEST_TIMEOUT,
                        "Request body read timed out".to_string(),
                    ));
                    break;
                }
            }
        }
    }

    batch
}

/// 把一个 `file` 字段流式写入上传目录
///
/// 中途失败（磁盘错误、客户端掉线）时删掉写了一半的文件。
async fn save_file_field(
    state: &ServerState,
    mut field: Field<'_>,
    original: &str,
) -> Result<StoredFile, StorageError> {
    let safe_name = storage::sanitize_filename(original);
    let (mut file, stored) = storage::create_unique(&state.upload_dir, &safe_name).await?;

    loop {
        match timeout(state.read_timeout, field.chunk()).await {
            Ok(Ok(Some(chunk))) => {
                if let Err(e) = file.write_all(&chunk).await {
                    storage::discard_partial(&stored.path).await;
                    return Err(e.into());
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                storage::discard_partial(&stored.path).await;
                return Err(StorageError::Stream(e.body_text()));
            }
            Err(_) => {
                // 对端没掉线也没发数据，放弃并清掉半截文件
                storage::discard_partial(&stored.path).await;
                return Err(StorageError::TimedOut);
            }
        }
    }

    if let Err(e) = file.flush().await {
        storage::discard_partial(&stored.path).await;
        return Err(e.into());
    }

    info!("Saved {} to {}", stored.final_name, stored.path.display());
    Ok(stored)
}

fn storage_failure(e: &StorageError) -> (StatusCode, String) {
    match e {
        StorageError::Stream(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        StorageError::TimedOut => (StatusCode::REQUEST_TIMEOUT, e.to_string()),
        StorageError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn upload_response(batch: Batch) -> Response {
    if let Some((status, message)) = batch.failure {
        return error_response(status, &message);
    }
    if !batch.saw_file_field {
        return error_response(StatusCode::BAD_REQUEST, "No file part");
    }
    if !batch.any_named {
        return error_response(StatusCode::BAD_REQUEST, "No selected file");
    }

    Json(json!({"status": "success", "files": batch.saved})).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}
