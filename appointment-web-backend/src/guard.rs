//! Request identity and capability checks.
//!
//! `identify` runs for every request and stores an [`Identity`] extension.
//! `require` is layered onto routers that need a signed-in user or an administrator.

use axum::{
    extract::{Request, State},
    http::{request::Parts, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    auth::{decode_claims, session_token},
    db::{sessions::session_from_claims, users::get_user},
    models::{user::Identity, CurrentUser},
    types::{AppError, AppState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Authenticated,
    Admin,
}

pub(crate) async fn identify(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    let user = resolve_user(&st, &parts).await?;
    if let Some(u) = &user {
        tracing::debug!("request by {}", u.email);
    }
    parts.extensions.insert(Identity(user));
    Ok(next.run(Request::from_parts(parts, body)).await)
}

async fn resolve_user(st: &AppState, parts: &Parts) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = session_token(&parts.headers) else {
        return Ok(None);
    };
    let claims = match decode_claims(&token, st.decoding()) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("ignoring session token: {}", e);
            return Ok(None);
        }
    };
    let session = match session_from_claims(st.conn().await?, claims).await {
        Ok(session) => session,
        Err(AppError::InvalidToken | AppError::ExpiredToken) => return Ok(None),
        Err(e) => return Err(e),
    };
    let user = match get_user(st.conn().await?, session.user_id).await {
        Ok(user) => user,
        Err(AppError::NotFound) => return Ok(None),
        Err(e) => return Err(e),
    };
    let admin = st.settings().is_admin(&user.email);
    Ok(Some(CurrentUser {
        id: user.id,
        email: user.email,
        name: user.name,
        admin,
    }))
}

/// Anonymous GETs are sent to the login page, other anonymous or under-privileged
/// requests get 403.
pub(crate) async fn require(capability: Capability, req: Request, next: Next) -> Response {
    let user = req
        .extensions()
        .get::<Identity>()
        .and_then(|identity| identity.0.as_ref());
    let denied = match (user, capability) {
        (None, _) if req.method() == Method::GET => {
            Some(Redirect::to(&login_url(req.uri())).into_response())
        }
        (None, _) => Some(AppError::Forbidden.into_response()),
        (Some(u), Capability::Admin) if !u.admin => {
            tracing::warn!("non-admin {} attempted admin access", u.email);
            Some(AppError::Forbidden.into_response())
        }
        _ => None,
    };
    match denied {
        Some(resp) => resp,
        None => next.run(req).await,
    }
}

pub fn login_url(continue_to: &Uri) -> String {
    let target = continue_to
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("continue", target)
        .finish();
    format!("/login?{}", query)
}
