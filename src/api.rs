//! Capa HTTP: handlers finos sobre el núcleo de analítica.
//!
//! La autenticación es externa: el proxy de autenticación aguas arriba
//! instala la cabecera `X-User-Id` ya verificada, y aquí solo se lee.

use axum::{
    async_trait,
    extract::{Json, Path, State},
    http::{header, request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::{
    app_state::AppState,
    comparison,
    error::CoreError,
    export::{self, ExportFormat},
    models::{CommentDraft, TagEdit},
    retrieval,
    store::{CommentStore, TagStore},
};

// --- Payloads de la API ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdListPayload {
    ids: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByTagsPayload {
    tag_ids: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCommentPayload {
    comment: CommentDraft,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    comment_ids: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonPayload {
    first_tag_id: Option<i64>,
    second_tag_id: Option<i64>,
}

/// Identidad del usuario extraída de la cabecera `X-User-Id`.
pub struct RequestUser(pub i64);

#[async_trait]
impl<S> axum::extract::FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .map(RequestUser)
            .ok_or((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Falta la cabecera X-User-Id o no es válida."})),
            ))
    }
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/tags/all", get(tags_all_handler))
        .route("/api/tags/save", post(tags_save_handler))
        .route("/api/tags/delete", post(tags_delete_handler))
        .route("/api/comments/all", get(comments_all_handler))
        .route("/api/comments/by-tags", post(comments_by_tags_handler))
        .route("/api/comments/save", post(comments_save_handler))
        .route("/api/comments/delete", post(comments_delete_handler))
        .route("/api/export/:format", post(export_handler))
        .route("/api/stats/comparison", post(comparison_handler))
        .with_state(app_state)
}

/// Traduce la taxonomía de errores del núcleo a códigos HTTP.
fn core_error_response(err: CoreError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        CoreError::Forbidden => StatusCode::FORBIDDEN,
        CoreError::TagNotFound { .. } => StatusCode::BAD_REQUEST,
        CoreError::Serialization(_) | CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Error interno atendiendo la petición: {err}");
    }
    (status, Json(json!({"error": err.to_string()})))
}

// --- Handlers de tags ---

#[axum::debug_handler]
async fn tags_all_handler(
    State(state): State<AppState>,
    RequestUser(user_id): RequestUser,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let tags = state
        .store
        .as_ref()
        .get_tags_by_user(user_id)
        .await
        .map_err(|e| core_error_response(e.into()))?;
    if tags.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(json!({ "tags": tags })).into_response())
}

#[axum::debug_handler]
async fn tags_save_handler(
    State(state): State<AppState>,
    RequestUser(user_id): RequestUser,
    Json(edit): Json<TagEdit>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let tag = state
        .store
        .as_ref()
        .apply_tag_edit(user_id, &edit)
        .await
        .map_err(|e| core_error_response(e.into()))?;
    Ok(Json(json!({ "tag": tag })))
}

#[axum::debug_handler]
async fn tags_delete_handler(
    State(state): State<AppState>,
    RequestUser(user_id): RequestUser,
    Json(payload): Json<IdListPayload>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    state
        .store
        .as_ref()
        .delete_tags(user_id, &payload.ids)
        .await
        .map_err(|e| core_error_response(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Handlers de comentarios ---

#[axum::debug_handler]
async fn comments_all_handler(
    State(state): State<AppState>,
    RequestUser(user_id): RequestUser,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let comments = state
        .store
        .as_ref()
        .get_comments_by_user(user_id)
        .await
        .map_err(|e| core_error_response(e.into()))?;
    if comments.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(json!({ "comments": comments })).into_response())
}

#[axum::debug_handler]
async fn comments_by_tags_handler(
    State(state): State<AppState>,
    RequestUser(user_id): RequestUser,
    Json(payload): Json<ByTagsPayload>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let store = state.store.as_ref();
    let snapshot = store
        .get_tags_by_user(user_id)
        .await
        .map_err(|e| core_error_response(e.into()))?;
    let roots = payload.tag_ids.iter().copied().collect();

    let comments = retrieval::find_by_tags(store, &snapshot, &roots)
        .await
        .map_err(core_error_response)?;
    if comments.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(json!({ "comments": comments })).into_response())
}

#[axum::debug_handler]
async fn comments_save_handler(
    State(state): State<AppState>,
    RequestUser(user_id): RequestUser,
    Json(payload): Json<SaveCommentPayload>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let comment = state
        .store
        .as_ref()
        .save_comment(user_id, &payload.comment)
        .await
        .map_err(|e| core_error_response(e.into()))?;
    Ok(Json(json!({ "comment": comment })))
}

#[axum::debug_handler]
async fn comments_delete_handler(
    State(state): State<AppState>,
    RequestUser(user_id): RequestUser,
    Json(payload): Json<IdListPayload>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    state
        .store
        .as_ref()
        .delete_comments(user_id, &payload.ids)
        .await
        .map_err(|e| core_error_response(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Exportación y comparación ---

#[axum::debug_handler]
async fn export_handler(
    State(state): State<AppState>,
    RequestUser(user_id): RequestUser,
    Path(format): Path<String>,
    Json(payload): Json<ExportPayload>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let format = ExportFormat::from_str(&format).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": e.to_string()})),
        )
    })?;

    let store = state.store.as_ref();
    let (comments, tag_index) =
        retrieval::fetch_comments_for_export(store, store, &payload.comment_ids, user_id)
            .await
            .map_err(core_error_response)?;

    let bytes = export::serialize(&comments, &tag_index, format).map_err(core_error_response)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.filename()),
            ),
        ],
        bytes,
    ))
}

#[axum::debug_handler]
async fn comparison_handler(
    State(state): State<AppState>,
    RequestUser(user_id): RequestUser,
    Json(payload): Json<ComparisonPayload>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let (first_tag_id, second_tag_id) = match (payload.first_tag_id, payload.second_tag_id) {
        (Some(first), Some(second)) => (first, second),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Hay que indicar los IDs de los dos tags a comparar."})),
            ));
        }
    };

    let store = state.store.as_ref();
    let report = comparison::compare(store, store, user_id, first_tag_id, second_tag_id)
        .await
        .map_err(core_error_response)?;
    Ok(Json(report))
}
