//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::logic::{GenerateError, UploadError};
use crate::protocol::ErrorOut;
use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/curriculum", get(http::http_curriculum))
        .route("/api/v1/workspaces", post(http::http_create_workspace))
        .route("/api/v1/workspaces/:id", get(http::http_get_workspace))
        .route("/api/v1/workspaces/:id/config", put(http::http_put_config))
        .route("/api/v1/workspaces/:id/chapters", put(http::http_put_chapters))
        .route("/api/v1/workspaces/:id/topics", put(http::http_put_topics))
        .route(
            "/api/v1/workspaces/:id/file",
            post(http::http_upload_file).delete(http::http_remove_file),
        )
        .route("/api/v1/workspaces/:id/generate", post(http::http_generate))
        .route("/api/v1/workspaces/:id/exam", get(http::http_get_exam))
        .route("/api/v1/workspaces/:id/answers", put(http::http_put_answers))
        .route("/api/v1/workspaces/:id/print", get(http::http_print))
        .route("/api/v1/workspaces/:id/export", get(http::http_export))
        .route("/api/v1/workspaces/:id/chat", post(http::http_chat))
        .route("/api/v1/workspaces/:id/chat/reset", post(http::http_chat_reset))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

/// Errors surfaced by HTTP handlers, rendered as `{ "error": message }`.
#[derive(Debug)]
pub enum ApiError {
    UnknownWorkspace(String),
    Generate(GenerateError),
    Upload(UploadError),
    NothingToExport,
}

impl From<GenerateError> for ApiError {
    fn from(e: GenerateError) -> Self {
        ApiError::Generate(e)
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        ApiError::Upload(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::UnknownWorkspace(id) => (StatusCode::NOT_FOUND, format!("Không tìm thấy phiên làm việc: {id}")),
            ApiError::Generate(e @ GenerateError::InProgress) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Generate(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Upload(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::NothingToExport => (StatusCode::NOT_FOUND, "Chưa có đề thi để xuất.".to_string()),
        };
        (status, Json(ErrorOut { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::catalog::Catalog;
    use crate::config::{PaperMeta, Prompts};
    use crate::model::fake::FakeModel;
    use crate::model::ExamModel;

    const ONE_MC: &str = r#"[{"id":"1","type":"Trắc nghiệm nhiều lựa chọn","content":"$2+2$","options":["3","4","5","6"],"correctAnswer":"B","points":0.25}]"#;

    fn app(fake: FakeModel) -> Router {
        let model: Arc<dyn ExamModel> = Arc::new(fake);
        let state = AppState::with_parts(Catalog::builtin(), Prompts::default(), PaperMeta::default(), Some(model));
        build_router(Arc::new(state))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn call_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = call(app, method, uri, body).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn new_workspace(app: &Router) -> String {
        let (status, v) = call_json(app, Method::POST, "/api/v1/workspaces", None).await;
        assert_eq!(status, StatusCode::OK);
        v["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_model() {
        let app = app(FakeModel::default());
        let (status, v) = call_json(&app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["ok"], true);
        assert_eq!(v["model"], "fake");
    }

    #[tokio::test]
    async fn curriculum_lists_builtin_chapters() {
        let app = app(FakeModel::default());
        let (_, v) = call_json(&app, Method::GET, "/api/v1/curriculum", None).await;
        assert_eq!(v["chapters"].as_array().unwrap().len(), 10);
        assert_eq!(v["chapters"][0]["id"], "c1");
    }

    #[tokio::test]
    async fn unknown_workspace_is_404() {
        let app = app(FakeModel::default());
        let (status, v) = call_json(&app, Method::GET, "/api/v1/workspaces/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(v["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn generate_without_file_is_400() {
        let app = app(FakeModel::replying(ONE_MC));
        let id = new_workspace(&app).await;
        let (status, v) = call_json(&app, Method::POST, &format!("/api/v1/workspaces/{id}/generate"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(v["error"].as_str().unwrap().contains("PDF"));
    }

    #[tokio::test]
    async fn curriculum_flow_generates_and_exports() {
        let app = app(FakeModel::replying(ONE_MC));
        let id = new_workspace(&app).await;
        let base = format!("/api/v1/workspaces/{id}");

        let (status, v) = call_json(&app, Method::PUT, &format!("{base}/config"), Some(json!({"mode": "curriculum", "numMC": 1, "numTF": 0, "numShort": 0, "numEssay": 0}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["config"]["numMC"], 1);

        let (_, v) = call_json(&app, Method::PUT, &format!("{base}/chapters"), Some(json!({"chapterIds": ["c4"]}))).await;
        assert_eq!(v["config"]["selectedTopics"], json!(["c4_t1", "c4_t2"]));
        assert_eq!(v["availableTopics"].as_array().unwrap().len(), 2);

        let (status, v) = call_json(&app, Method::POST, &format!("{base}/generate"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["questions"].as_array().unwrap().len(), 1);
        assert!(v.get("alert").is_none());

        let (_, v) = call_json(&app, Method::GET, &format!("{base}/exam?answers=true"), None).await;
        assert_eq!(v["sections"][0]["items"][0]["number"], 1);
        assert_eq!(v["sections"][0]["items"][0]["answer"]["text"], "B");

        let (status, html) = call(&app, Method::GET, &format!("{base}/print"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(html).unwrap().contains("--- HẾT ---"));

        let res = app
            .clone()
            .oneshot(Request::builder().uri(format!("{base}/export")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/msword");
        assert!(res.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().contains("de_kiem_tra_toan_9.doc"));
    }

    #[tokio::test]
    async fn export_of_empty_exam_is_404() {
        let app = app(FakeModel::default());
        let id = new_workspace(&app).await;
        let (status, _) = call(&app, Method::GET, &format!("/api/v1/workspaces/{id}/export"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_rejects_non_pdf() {
        let app = app(FakeModel::default());
        let id = new_workspace(&app).await;
        let uri = format!("/api/v1/workspaces/{id}/file");
        let (status, _) = call_json(&app, Method::POST, &uri, Some(json!({"fileName": "a.png", "mimeType": "image/png", "dataBase64": "AAAA"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, v) = call_json(&app, Method::POST, &uri, Some(json!({"fileName": "a.pdf", "mimeType": "application/pdf", "dataBase64": "JVBERg=="}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["config"]["fileName"], "a.pdf");

        let (_, v) = call_json(&app, Method::DELETE, &uri, None).await;
        assert_eq!(v["config"]["fileName"], Value::Null);
    }

    #[tokio::test]
    async fn chat_returns_final_message_and_reset_clears() {
        let app = app(FakeModel::default().with_chat(vec![Ok("Gợi "), Ok("ý")]));
        let id = new_workspace(&app).await;
        let base = format!("/api/v1/workspaces/{id}");

        let (status, v) = call_json(&app, Method::POST, &format!("{base}/chat"), Some(json!({"text": "Câu 1?"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"]["text"], "Gợi ý");
        assert_eq!(v["message"]["isStreaming"], false);

        let (_, v) = call_json(&app, Method::POST, &format!("{base}/chat/reset"), None).await;
        assert_eq!(v["messages"].as_array().unwrap().len(), 1);
        assert_eq!(v["status"], "idle");
    }
}
