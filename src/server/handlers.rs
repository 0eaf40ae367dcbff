use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use tracing::info;

use super::models::{CreateImageRequest, ErrorResponse, TemplateQuery};
use crate::captioner::{Captioner, CreateImage};
use crate::error::is_input_error;
use crate::mcp::template_listing;

#[derive(Debug)]
struct ServerError {
    status: StatusCode,
    message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        let status = if is_input_error(&err) {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: format!("{:#}", err),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub fn build_router(captioner: Arc<Captioner>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/templates", get(list_templates))
        .route("/templates/:id", get(get_template))
        .route("/images", post(create_image))
        .with_state(captioner)
        .layer(axum::middleware::from_fn(cors_middleware))
}

pub async fn run_server(captioner: Arc<Captioner>, addr: String) -> Result<()> {
    let app = build_router(captioner);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address: {}", addr))?;
    info!("server: listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

async fn list_templates(
    State(captioner): State<Arc<Captioner>>,
    Query(query): Query<TemplateQuery>,
) -> Json<serde_json::Value> {
    Json(template_listing(&captioner, query.query.as_deref().unwrap_or("")))
}

async fn get_template(
    State(captioner): State<Arc<Captioner>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let record = captioner.catalog().get(&id)?;
    let mut value = serde_json::to_value(record).map_err(anyhow::Error::from)?;
    value["id"] = serde_json::Value::String(id);
    Ok(Json(value))
}

async fn create_image(
    State(captioner): State<Arc<Captioner>>,
    Json(payload): Json<CreateImageRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let image_bytes = match payload.image_base64.as_deref() {
        Some(encoded) => Some(BASE64.decode(encoded.trim()).map_err(|err| {
            ServerError::bad_request(format!("image_base64 is not valid base64: {}", err))
        })?),
        None => None,
    };
    let bytes = captioner
        .create_image(CreateImage {
            template: payload.template,
            texts: payload.texts,
            image_bytes,
        })
        .await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::template::{TemplateCatalog, TemplateRecord};
    use serde_json::json;
    use std::collections::BTreeMap;

    async fn spawn_server() -> String {
        let record: TemplateRecord = serde_json::from_value(json!({
            "name": "distracted-boyfriend",
            "filename": "distracted-boyfriend.jpg",
            "text_options": [
                {"position": {"left": 0, "top": 0, "width": 50, "height": 20}}
            ]
        }))
        .unwrap();
        let mut templates = BTreeMap::new();
        templates.insert("distracted-boyfriend".to_string(), record);
        let catalog =
            TemplateCatalog::from_records(templates, std::path::Path::new("/nonexistent"));
        let captioner = Arc::new(Captioner::with_catalog(Settings::default(), catalog).unwrap());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, build_router(captioner)).await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn health_and_template_lookup() {
        let base = spawn_server().await;
        let health = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert_eq!(health.status(), reqwest::StatusCode::OK);
        assert_eq!(health.headers()["access-control-allow-origin"], "*");

        let found = reqwest::get(format!("{}/templates/distracted-boyfriend", base))
            .await
            .unwrap();
        assert_eq!(found.status(), reqwest::StatusCode::OK);

        let missing = reqwest::get(format!("{}/templates/unknown", base))
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_image_payload_is_a_bad_request() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();
        let response = client
            .post(format!("{}/images", base))
            .header("content-type", "application/json")
            .body(
                json!({
                    "template": "distracted-boyfriend",
                    "texts": [{"id": "0", "text": "me"}],
                    "image_base64": "aGVsbG8="
                })
                .to_string(),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body = response.text().await.unwrap();
        assert!(body.contains("failed to decode template image"));
    }

    #[tokio::test]
    async fn create_image_returns_png_bytes() {
        if crate::test_util::system_face().is_none() {
            return;
        }
        let source = image::RgbaImage::from_pixel(80, 40, image::Rgba([120, 120, 120, 255]));
        let mut png = Vec::new();
        source
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let base = spawn_server().await;
        let response = reqwest::Client::new()
            .post(format!("{}/images", base))
            .header("content-type", "application/json")
            .body(
                json!({
                    "template": "distracted-boyfriend",
                    "texts": [{"id": "0", "text": "me"}],
                    "image_base64": BASE64.encode(&png)
                })
                .to_string(),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE.as_str()], "image/png");
        let body = response.bytes().await.unwrap();
        let decoded = image::load_from_memory(&body).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (80, 40));
        assert_ne!(decoded.to_rgba8(), source);
    }
}
