use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{ReadingContent, UploadResponse},
    policy::{self, Action, Target},
    storage,
};

const FILE_FIELD: &str = "file";

/// True for `text/plain`, with or without parameters such as `charset`.
fn is_plain_text(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/plain"))
}

/// upload_reading
///
/// [Authenticated Route] Stores a plain-text reading as `{user_id}_{basename}`.
/// Expects a multipart form with one `file` field.
#[utoipa::path(
    post,
    path = "/api/protected/reading/upload",
    request_body(content_type = "multipart/form-data", description = "Form with a text/plain `file` field"),
    responses(
        (status = 201, description = "Stored", body = UploadResponse),
        (status = 422, description = "Missing file, wrong media type or not UTF-8")
    ),
    security(("bearer" = []))
)]
pub async fn upload_reading(
    user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let invalid_form = |e: axum::extract::multipart::MultipartError| {
        AppError::validation(FILE_FIELD, format!("malformed multipart body: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        if !is_plain_text(field.content_type()) {
            return Err(AppError::validation(
                FILE_FIELD,
                "Only text/plain files are supported",
            ));
        }

        let original = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation(FILE_FIELD, "file name is required"))?;
        let name = storage::stored_name(user.id, &original)
            .map_err(|_| AppError::validation(FILE_FIELD, "file name is not usable"))?;

        let bytes = field.bytes().await.map_err(invalid_form)?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|_| AppError::validation(FILE_FIELD, "file must be UTF-8 text"))?;

        state.storage.save(&name, &text).await?;
        tracing::info!(user_id = %user.id, file = %name, size = text.len(), "reading uploaded");

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                detail: "Uploaded successfully".to_string(),
                filename: name,
            }),
        ));
    }

    Err(AppError::validation(FILE_FIELD, "a `file` field is required"))
}

/// read_reading
///
/// Returns the text of a stored reading. Only administrators can open files
/// that do not carry the caller's own id prefix; everyone else gets 404.
#[utoipa::path(
    get,
    path = "/api/protected/reading/read/{filename}",
    params(("filename" = String, Path, description = "Stored file name as returned by upload")),
    responses(
        (status = 200, description = "Content", body = ReadingContent),
        (status = 404, description = "File not found")
    ),
    security(("bearer" = []))
)]
pub async fn read_reading(
    user: AuthUser,
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<ReadingContent>, AppError> {
    if !storage::is_plain_name(&filename) {
        return Err(AppError::NotFound("File not found"));
    }

    let owner = storage::stored_owner(&filename);
    policy::authorize(&user, Action::ReadUpload, Target::OwnedFile { owner }).into_result()?;

    let content = state
        .storage
        .read(&filename)
        .await?
        .ok_or(AppError::NotFound("File not found"))?;

    Ok(Json(ReadingContent { content }))
}
