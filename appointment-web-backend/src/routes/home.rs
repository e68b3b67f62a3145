use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde_json::json;

use super::PageContext;
use crate::types::AppState;

pub fn home_router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

async fn index(State(st): State<AppState>, page: PageContext) -> Response {
    if page.user.is_some() {
        return Redirect::to("/new").into_response();
    }
    page.render(&st, "index", json!({})).into_response()
}

pub(crate) async fn not_found(State(st): State<AppState>, page: PageContext) -> impl IntoResponse {
    tracing::debug!("no route for {}", page.uri);
    (StatusCode::NOT_FOUND, page.render(&st, "not_found", json!({})))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::routes::_test_utils::test_app;
    use http::header;

    fn router() -> Router<AppState> {
        home_router().fallback(not_found)
    }

    #[test_log::test(tokio::test)]
    async fn test_index_anonymous() -> anyhow::Result<()> {
        let app = test_app(router()).await?;
        let resp = app.server.get("/").await;
        resp.assert_status_ok();
        assert!(resp.text().contains("/login"));
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_index_signed_in_redirects() -> anyhow::Result<()> {
        let app = test_app(router()).await?;
        let (_, bearer) = app.sign_in("olga@example.com").await?;
        let resp = app
            .server
            .get("/")
            .add_header(header::AUTHORIZATION, bearer)
            .await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header(header::LOCATION), "/new");
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_path_is_not_found() -> anyhow::Result<()> {
        let app = test_app(router()).await?;
        let resp = app.server.get("/no/such/page").await;
        resp.assert_status_not_found();
        assert!(resp.text().contains("Page not found"));
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_not_found_page_is_translated() -> anyhow::Result<()> {
        let app = test_app(router()).await?;
        let german = app.server.get("/missing?lang=de").await;
        german.assert_status_not_found();
        assert!(german.text().contains("Seite nicht gefunden"));
        let unknown = app.server.get("/missing?lang=xx").await;
        assert!(unknown.text().contains("Page not found"));
        Ok(())
    }
}
