use axum::{
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::{json, Value};

use super::{query_link, require_login, PageContext};
use crate::{
    db::{
        appointments::{appointments_invited_to, appointments_organized_by},
        media::{files_for_user, photos_for_user},
    },
    models::{AppointmentWithDates, CurrentUser, File, Photo},
    types::{AppError, AppState},
};

pub fn profile_router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(own_profile))
        .route("/profile/:email", get(user_profile))
        .route_layer(middleware::from_fn(require_login))
}

async fn own_profile(
    State(st): State<AppState>,
    page: PageContext,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let email = user.email.clone();
    profile(st, page, user, email).await
}

async fn user_profile(
    State(st): State<AppState>,
    page: PageContext,
    user: CurrentUser,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    profile(st, page, user, email).await
}

pub(crate) fn appointment_rows(appointments: &[AppointmentWithDates], viewer: &str) -> Vec<Value> {
    appointments
        .iter()
        .map(|appointment| {
            json!({
                "appointment": appointment,
                "latest": appointment.latest_date(),
                "url": query_link("/appointment", &[("key", appointment.id()), ("user", viewer)]),
            })
        })
        .collect()
}

pub(crate) fn photo_rows(photos: &[Photo]) -> Vec<Value> {
    photos
        .iter()
        .map(|photo| {
            json!({
                "photo": photo,
                "url": format!("/photo/{}", photo.id),
                "thumb_url": format!("/thumb/{}", photo.id),
                "full_url": format!("/photo/{}/full", photo.id),
            })
        })
        .collect()
}

fn file_rows(files: &[File]) -> Vec<Value> {
    files
        .iter()
        .map(|file| json!({ "file": file, "url": format!("/file/{}", file.id) }))
        .collect()
}

/// Appointments, photos and files of `email`. Other viewers only see public media.
async fn profile(
    st: AppState,
    page: PageContext,
    user: CurrentUser,
    email: String,
) -> Result<impl IntoResponse, AppError> {
    let own = user.owns(&email);
    let organized = appointments_organized_by(st.conn().await?, email.clone()).await?;
    let invited = appointments_invited_to(st.conn().await?, email.clone()).await?;
    let photos = photos_for_user(st.conn().await?, email.clone(), !own).await?;
    let files = files_for_user(st.conn().await?, email.clone(), !own).await?;
    tracing::debug!(
        "profile of {} for {}: {} photos, {} files",
        email,
        user.email,
        photos.len(),
        files.len()
    );
    Ok(page.render(
        &st,
        "profile",
        json!({
            "owner_email": email,
            "own": own,
            "organized": appointment_rows(&organized, &user.email),
            "invited": appointment_rows(&invited, &user.email),
            "photos": photo_rows(&photos),
            "files": file_rows(&files),
        }),
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        db::media::{new_file, new_photo},
        models::media::Upload,
        routes::{_test_utils::test_app, appointments::test::stored_appointment},
    };
    use http::{header, StatusCode};

    fn upload(owner: &str, filename: &str, content_type: &str, public: bool) -> Upload {
        Upload {
            user_email: owner.into(),
            blob_key: uuid::Uuid::new_v4().to_string(),
            content_type: content_type.into(),
            filename: filename.into(),
            size: 100,
            comment: None,
            public,
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_profile_not_logged_in() -> anyhow::Result<()> {
        let app = test_app(profile_router()).await?;
        let resp = app.server.get("/profile").await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header(header::LOCATION), "/login?continue=%2Fprofile");
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_own_profile_lists_everything() -> anyhow::Result<()> {
        let app = test_app(profile_router()).await?;
        let (_, bearer) = app.sign_in("olga@example.com").await?;
        stored_appointment(&app, "olga@example.com", &["a@x.com"], &["2024-01-01 10:00"]).await?;
        new_photo(
            app.conn().await?,
            upload("olga@example.com", "secret.png", "image/png", false).into_photo(),
        )
        .await?;
        new_file(
            app.conn().await?,
            upload("olga@example.com", "notes.pdf", "application/pdf", true).into_file(),
        )
        .await?;

        let resp = app
            .server
            .get("/profile")
            .add_header(header::AUTHORIZATION, bearer)
            .await;

        resp.assert_status_ok();
        let html = resp.text();
        assert!(html.contains("Team dinner"));
        assert!(html.contains("secret.png"));
        assert!(html.contains("notes.pdf"));
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_other_profile_hides_private_media() -> anyhow::Result<()> {
        let app = test_app(profile_router()).await?;
        let (_, bearer) = app.sign_in("a@x.com").await?;
        stored_appointment(&app, "olga@example.com", &["a@x.com"], &["2024-01-01 10:00"]).await?;
        new_photo(
            app.conn().await?,
            upload("olga@example.com", "secret.png", "image/png", false).into_photo(),
        )
        .await?;
        new_photo(
            app.conn().await?,
            upload("olga@example.com", "shared.png", "image/png", true).into_photo(),
        )
        .await?;

        let resp = app
            .server
            .get("/profile/olga@example.com")
            .add_header(header::AUTHORIZATION, bearer.clone())
            .await;
        resp.assert_status_ok();
        let html = resp.text();
        assert!(html.contains("shared.png"));
        assert!(!html.contains("secret.png"));

        let own = app
            .server
            .get("/profile")
            .add_header(header::AUTHORIZATION, bearer)
            .await;
        assert!(own.text().contains("Team dinner"));
        Ok(())
    }
}
