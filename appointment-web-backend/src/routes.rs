pub mod accounts;
pub mod appointments;
pub mod availability;
pub mod home;
pub mod media;
pub mod profile;

#[cfg(test)]
pub(crate) mod _test_utils;

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, Request},
    http::{request::Parts, Uri},
    middleware::{self, Next},
    response::Response,
    Router,
};
use axum_template::RenderHtml;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    guard::{identify, login_url, require, Capability},
    models::{user::Identity, CurrentUser},
    templates::AppEngine,
    types::AppState,
};

pub fn make_app(st: AppState) -> Router {
    with_identity(
        Router::new()
            .merge(home::home_router())
            .merge(accounts::accounts_router())
            .merge(appointments::appointments_router())
            .merge(availability::availability_router())
            .merge(profile::profile_router())
            .merge(media::media_router())
            .fallback(home::not_found),
        st,
    )
}

pub(crate) fn with_identity(router: Router<AppState>, st: AppState) -> Router {
    router
        .layer(middleware::from_fn_with_state(st.clone(), identify))
        .with_state(st)
}

pub(crate) async fn require_login(req: Request, next: Next) -> Response {
    require(Capability::Authenticated, req, next).await
}

pub(crate) async fn require_admin(req: Request, next: Next) -> Response {
    require(Capability::Admin, req, next).await
}

/// `path?k=v&...` with every value form-encoded.
pub fn query_link(path: &str, pairs: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{}?{}", path, query)
}

#[derive(Debug, Deserialize)]
struct LangQuery {
    #[serde(default)]
    lang: Option<String>,
}

/// Per-request values shared by every rendered page.
#[derive(Debug, Clone)]
pub(crate) struct PageContext {
    pub locale: String,
    pub user: Option<CurrentUser>,
    pub uri: Uri,
}

#[async_trait]
impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let locale = Query::<LangQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.lang)
            .unwrap_or_default();
        let user = parts
            .extensions
            .get::<Identity>()
            .and_then(|identity| identity.0.clone());
        Ok(Self {
            locale,
            user,
            uri: parts.uri.clone(),
        })
    }
}

impl PageContext {
    /// Renders `template` with `data` layered over the common page values.
    pub fn render(
        &self,
        st: &AppState,
        template: &'static str,
        data: Value,
    ) -> RenderHtml<&'static str, AppEngine, Value> {
        let mut values = json!({
            "user": self.user,
            "login_url": login_url(&self.uri),
            "logout_url": "/logout",
            "locale": self.locale,
            "settings": st.settings().template_values(),
        });
        if let (Some(base), Value::Object(extra)) = (values.as_object_mut(), data) {
            base.extend(extra);
        }
        RenderHtml(template, st.engine(), values)
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.email.as_str())
    }
}
