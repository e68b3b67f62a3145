use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use super::PageContext;
use crate::{
    auth::{
        decode_claims, hash_password, removal_cookie, session_cookie, session_token,
        verify_password,
    },
    db::{
        sessions::{delete_session, new_session},
        users::{get_user_by_email, new_user},
    },
    models::{
        user::{LoginForm, RegisterForm},
        NewUser, User,
    },
    types::{AppError, AppState, Claims},
};

pub fn accounts_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
        .route("/register", get(register_page).post(register))
}

#[derive(Debug, Deserialize)]
struct ContinueQuery {
    #[serde(rename = "continue", default)]
    next: Option<String>,
}

/// Only same-site paths are followed after login.
fn continue_target(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/".to_string(),
    }
}

async fn login_page(
    State(st): State<AppState>,
    page: PageContext,
    Query(q): Query<ContinueQuery>,
) -> impl IntoResponse {
    let next = continue_target(q.next.as_deref());
    page.render(&st, "login", json!({ "continue": next }))
}

async fn start_session(st: &AppState, jar: CookieJar, user: &User) -> Result<CookieJar, AppError> {
    let session = new_session(st.pool(), user.id.clone(), st.settings().session_hours).await?;
    let token = Claims::from_session(&session).to_token(st.encoding())?;
    tracing::info!("session {} started for {}", session.id, user.email);
    Ok(jar.add(session_cookie(token)))
}

async fn login(
    State(st): State<AppState>,
    jar: CookieJar,
    Form(payload): Form<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::MissingCredentials);
    }
    let user = get_user_by_email(st.conn().await?, payload.email.trim().to_string())
        .await?
        .filter(|user| verify_password(&payload.password, &user.password))
        .ok_or_else(|| {
            tracing::warn!("failed login for {}", payload.email);
            AppError::WrongCredentials
        })?;
    let jar = start_session(&st, jar, &user).await?;
    Ok((jar, Redirect::to(&continue_target(payload.next.as_deref()))))
}

async fn logout(
    State(st): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(claims) = session_token(&headers).and_then(|t| decode_claims(&t, st.decoding()).ok()) {
        let sess_id = claims.jti.clone();
        delete_session(st.conn().await?, claims.jti).await?;
        tracing::info!("session {} ended", sess_id);
    }
    Ok((jar.remove(removal_cookie()), Redirect::to("/")))
}

async fn register_page(State(st): State<AppState>, page: PageContext) -> impl IntoResponse {
    page.render(&st, "register", json!({}))
}

async fn register(
    State(st): State<AppState>,
    jar: CookieJar,
    Form(payload): Form<RegisterForm>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequestWithMessage("a valid email is required".into()));
    }
    if payload.password.len() < 8 {
        return Err(AppError::BadRequestWithMessage(
            "passwords need at least 8 characters".into(),
        ));
    }
    let name = match payload.name.trim() {
        "" => email.split('@').next().unwrap_or(email).to_string(),
        name => name.to_string(),
    };
    let user = new_user(
        st.conn().await?,
        NewUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            name,
            password: hash_password(&payload.password)?,
        },
    )
    .await?;
    tracing::info!("registered {}", user.email);
    let jar = start_session(&st, jar, &user).await?;
    Ok((jar, Redirect::to("/")))
}
