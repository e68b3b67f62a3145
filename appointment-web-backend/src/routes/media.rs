use axum::{
    extract::{multipart::Field, rejection::FormRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::header,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde_json::json;

use super::{profile::photo_rows, require_login, PageContext};
use crate::{
    db::media,
    imaging::{dimensions_blocking, thumbnail_blocking},
    models::{
        media::{
            normalize_rotation, parse_flag, RemoveForm, RotateForm, SearchQuery, ShareForm,
            Upload,
        },
        CurrentUser, File, Photo,
    },
    types::{AppError, AppState},
};

/// Upper bound for a whole multipart request.
const MAX_REQUEST_BYTES: usize = 32 * 1024 * 1024;

pub fn media_router() -> Router<AppState> {
    let public = Router::new()
        .route("/upload/too-large", get(too_large))
        .route("/photo/:key", get(show_photo))
        .route("/photo/:key/full", get(full_photo))
        .route("/thumb/:key", get(thumb))
        .route("/file/:key", get(download_file));
    let signed_in = Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES)),
        )
        .route("/rotate/:key", post(rotate))
        .route("/share/:key", post(share))
        .route("/photo/remove", post(remove_photo))
        .route("/photo/search", get(search))
        .route("/file/remove", post(remove_file))
        .route_layer(middleware::from_fn(require_login));
    public.merge(signed_in)
}

fn visible_to(public: bool, owner: &str, viewer: Option<&CurrentUser>) -> bool {
    public || viewer.map_or(false, |v| v.owns(owner))
}

/// Private media is reported as missing to everyone but its owner.
async fn visible_photo(st: &AppState, page: &PageContext, key: String) -> Result<Photo, AppError> {
    let photo = media::get_photo(st.conn().await?, key).await?;
    if !visible_to(photo.public, &photo.user_email, page.user.as_ref()) {
        return Err(AppError::NotFound);
    }
    Ok(photo)
}

async fn visible_file(st: &AppState, page: &PageContext, key: String) -> Result<File, AppError> {
    let file = media::get_file(st.conn().await?, key).await?;
    if !visible_to(file.public, &file.user_email, page.user.as_ref()) {
        return Err(AppError::NotFound);
    }
    Ok(file)
}

fn check_owner(user: &CurrentUser, owner: &str) -> Result<(), AppError> {
    if user.owns(owner) {
        Ok(())
    } else {
        tracing::warn!("{} tried to modify media owned by {}", user.email, owner);
        Err(AppError::MethodNotAllowed)
    }
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    tracing::debug!("malformed upload: {:?}", e);
    AppError::BadRequestWithMessage(e.body_text())
}

/// Streams one `file` part into the blob store. Empty parts (no file chosen) yield `None`.
async fn store_part(
    st: &AppState,
    user: &CurrentUser,
    mut field: Field<'_>,
) -> Result<Option<Upload>, AppError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let mut writer = st.blobs().writer().await?;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                writer.abort().await;
                return Err(bad_multipart(e));
            }
        };
        if let Err(e) = writer.write(&chunk).await {
            writer.abort().await;
            return Err(e);
        }
    }
    if filename.is_empty() && writer.size() == 0 {
        writer.abort().await;
        return Ok(None);
    }
    let blob = writer.finish().await?;
    Ok(Some(Upload {
        user_email: user.email.clone(),
        blob_key: blob.key,
        content_type,
        filename,
        size: blob.size,
        comment: None,
        public: false,
    }))
}

/// Reads the multipart body in order: each `file` part opens a group that the
/// following `comment` and `public` fields belong to.
async fn read_uploads(
    st: &AppState,
    user: &CurrentUser,
    multipart: &mut Multipart,
    uploads: &mut Vec<Upload>,
) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if let Some(upload) = store_part(st, user, field).await? {
                    uploads.push(upload);
                }
            }
            "comment" => {
                let text = field.text().await.map_err(bad_multipart)?;
                if let Some(current) = uploads.last_mut() {
                    let text = text.trim();
                    current.comment = (!text.is_empty()).then(|| text.to_string());
                }
            }
            "public" => {
                let text = field.text().await.map_err(bad_multipart)?;
                if let Some(current) = uploads.last_mut() {
                    current.public = parse_flag(Some(&text));
                }
            }
            other => tracing::debug!("ignoring upload field {:?}", other),
        }
    }
    Ok(())
}

async fn discard(st: &AppState, uploads: &[Upload]) {
    for upload in uploads {
        if let Err(e) = st.blobs().delete(&upload.blob_key).await {
            tracing::error!("error discarding blob {}: {:?}", upload.blob_key, e);
        }
    }
}

async fn store_upload(st: &AppState, upload: Upload) -> Result<(), AppError> {
    if upload.is_image() {
        let photo = media::new_photo(st.conn().await?, upload.into_photo()).await?;
        tracing::info!("stored photo {} ({})", photo.id, photo.filename);
    } else {
        let file = media::new_file(st.conn().await?, upload.into_file()).await?;
        tracing::info!("stored file {} ({})", file.id, file.filename);
    }
    Ok(())
}

async fn upload(
    State(st): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut uploads = Vec::new();
    if let Err(e) = read_uploads(&st, &user, &mut multipart, &mut uploads).await {
        discard(&st, &uploads).await;
        return Err(e);
    }
    let max = st.settings().max_image_bytes;
    let (too_large, accepted): (Vec<Upload>, Vec<Upload>) = uploads
        .into_iter()
        .partition(|upload| upload.is_image() && upload.size > max);
    for upload in &too_large {
        tracing::warn!(
            "rejecting {} from {}: {} bytes",
            upload.filename,
            upload.user_email,
            upload.size
        );
    }
    discard(&st, &too_large).await;
    for (n, upload) in accepted.iter().enumerate() {
        if let Err(e) = store_upload(&st, upload.clone()).await {
            // nothing references the blobs from here on
            discard(&st, &accepted[n..]).await;
            return Err(e);
        }
    }
    if too_large.is_empty() {
        Ok(Redirect::to("/profile").into_response())
    } else {
        Ok(Redirect::to("/upload/too-large").into_response())
    }
}

async fn too_large(State(st): State<AppState>, page: PageContext) -> impl IntoResponse {
    let max_kib = st.settings().max_image_bytes / 1024;
    page.render(&st, "too_large", json!({ "max_kib": max_kib }))
}

async fn show_photo(
    State(st): State<AppState>,
    page: PageContext,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let photo = visible_photo(&st, &page, key).await?;
    let bytes = st.blobs().get(&photo.blob_key).await?;
    let (width, height) = match dimensions_blocking(bytes).await {
        Ok(dims) => dims,
        Err(e) => {
            tracing::warn!("no dimensions for photo {}: {}", photo.id, e);
            (0, 0)
        }
    };
    let own = page.user.as_ref().map_or(false, |u| u.owns(&photo.user_email));
    let row = photo_rows(std::slice::from_ref(&photo));
    Ok(page.render(
        &st,
        "photo",
        json!({
            "item": row.first(),
            "own": own,
            "width": width,
            "height": height,
        }),
    ))
}

async fn thumb(
    State(st): State<AppState>,
    page: PageContext,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let photo = visible_photo(&st, &page, key).await?;
    let bytes = st.blobs().get(&photo.blob_key).await?;
    let thumbnail = thumbnail_blocking(bytes, photo.rotation).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], thumbnail))
}

async fn full_photo(
    State(st): State<AppState>,
    page: PageContext,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let photo = visible_photo(&st, &page, key).await?;
    let bytes = st.blobs().get(&photo.blob_key).await?;
    Ok(([(header::CONTENT_TYPE, photo.content_type)], bytes))
}

fn attachment(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

async fn download_file(
    State(st): State<AppState>,
    page: PageContext,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let file = visible_file(&st, &page, key).await?;
    let bytes = st.blobs().get(&file.blob_key).await?;
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.clone()),
            (header::CONTENT_DISPOSITION, attachment(&file.filename)),
        ],
        bytes,
    ))
}

async fn rotate(
    State(st): State<AppState>,
    user: CurrentUser,
    Path(key): Path<String>,
    form: Result<Form<RotateForm>, FormRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Form(payload) = form.map_err(|e| AppError::BadRequestWithMessage(e.body_text()))?;
    let photo = media::get_photo(st.conn().await?, key).await?;
    check_owner(&user, &photo.user_email)?;
    let rotation = normalize_rotation(photo.rotation, payload.angle);
    media::set_photo_rotation(st.conn().await?, photo.id.clone(), rotation).await?;
    tracing::debug!("photo {} rotated to {}", photo.id, rotation);
    Ok(Redirect::to(&format!("/photo/{}", photo.id)))
}

/// Keys name a photo or, failing that, a file.
async fn share(
    State(st): State<AppState>,
    user: CurrentUser,
    Path(key): Path<String>,
    Form(payload): Form<ShareForm>,
) -> Result<impl IntoResponse, AppError> {
    let public = parse_flag(payload.public.as_deref());
    match media::get_photo(st.conn().await?, key.clone()).await {
        Ok(photo) => {
            check_owner(&user, &photo.user_email)?;
            media::set_photo_public(st.conn().await?, photo.id, public).await?;
        }
        Err(AppError::NotFound) => {
            let file = media::get_file(st.conn().await?, key).await?;
            check_owner(&user, &file.user_email)?;
            media::set_file_public(st.conn().await?, file.id, public).await?;
        }
        Err(e) => return Err(e),
    }
    Ok(Redirect::to("/profile"))
}

async fn remove_photo(
    State(st): State<AppState>,
    user: CurrentUser,
    Form(payload): Form<RemoveForm>,
) -> Result<impl IntoResponse, AppError> {
    let photo = media::get_photo(st.conn().await?, payload.key).await?;
    check_owner(&user, &photo.user_email)?;
    media::delete_photo(st.conn().await?, photo.id.clone()).await?;
    st.blobs().delete(&photo.blob_key).await?;
    tracing::info!("removed photo {}", photo.id);
    Ok(Redirect::to("/profile"))
}

async fn remove_file(
    State(st): State<AppState>,
    user: CurrentUser,
    Form(payload): Form<RemoveForm>,
) -> Result<impl IntoResponse, AppError> {
    let file = media::get_file(st.conn().await?, payload.key).await?;
    check_owner(&user, &file.user_email)?;
    media::delete_file(st.conn().await?, file.id.clone()).await?;
    st.blobs().delete(&file.blob_key).await?;
    tracing::info!("removed file {}", file.id);
    Ok(Redirect::to("/profile"))
}

async fn search(
    State(st): State<AppState>,
    page: PageContext,
    user: CurrentUser,
    Query(q): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let owner = q
        .user
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| user.email.clone());
    let own = user.owns(&owner);
    let found: Vec<Photo> = media::photos_for_user(st.conn().await?, owner.clone(), !own)
        .await?
        .into_iter()
        .filter(|photo| photo.matches(&q.q))
        .collect();
    tracing::debug!("search {:?} in photos of {}: {} hits", q.q, owner, found.len());
    Ok(page.render(
        &st,
        "search",
        json!({
            "q": q.q,
            "owner_email": owner,
            "photos": photo_rows(&found),
        }),
    ))
}
