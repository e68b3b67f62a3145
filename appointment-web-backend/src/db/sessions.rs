use deadpool_diesel::sqlite::{Connection, Pool};
use diesel::prelude::*;
use tracing::error;

use super::util::get_conn;
use crate::{
    models::{NewSession, Session},
    schema::sessions::{self, dsl as sessions_dsl},
    types::{AppError, Claims},
};

/// Returns the user's live session, creating one when none exists.
pub async fn new_session(pool: Pool, user_id: String, hours: i64) -> Result<Session, AppError> {
    let conn = get_conn(pool.clone()).await?;
    let uid = user_id.clone();
    let existing = conn
        .interact(|conn| {
            sessions_dsl::sessions
                .filter(sessions_dsl::user_id.eq(uid))
                .order(sessions_dsl::expires.desc())
                .select(Session::as_select())
                .first(conn)
                .optional()
        })
        .await
        .map_err(|e| {
            error!("error retrieving session: {:?}", e);
            AppError::DBError
        })?
        .map_err(|e| {
            error!("error retrieving session: {:?}", e);
            AppError::DBError
        })?;
    if let Some(s) = existing.filter(|s| !s.is_expired()) {
        tracing::debug!("reusing session {}", s.id);
        return Ok(s);
    }
    let new_sess = NewSession::for_user(user_id, hours);
    let conn = get_conn(pool).await?;
    conn.interact(|conn| {
        let inserted = diesel::insert_into(sessions::table).values(&new_sess).execute(conn);
        inserted.map(|_| Session::from(new_sess))
    })
    .await
    .map_err(|e| {
        error!("error creating session: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        error!("error creating session: {:?}", e);
        AppError::DBError
    })
}

pub async fn delete_session(conn: Connection, session_id: String) -> Result<(), AppError> {
    use crate::schema::sessions::dsl::*;
    let deleted = conn
        .interact(|conn| diesel::delete(sessions.filter(id.eq(session_id))).execute(conn))
        .await
        .map_err(|e| {
            error!("error deleting session: {:?}", e);
            AppError::DBError
        })?
        .map_err(|e| {
            error!("error deleting session: {:?}", e);
            AppError::DBError
        })?;
    tracing::debug!("deleted {} session(s)", deleted);
    Ok(())
}

pub async fn session_from_claims(conn: Connection, claims: Claims) -> Result<Session, AppError> {
    use crate::schema::sessions::dsl::*;

    let resp: Option<Session> = conn
        .interact(|conn| {
            sessions
                .filter(id.eq(claims.jti))
                .filter(user_id.eq(claims.sub))
                .select(Session::as_select())
                .first(conn)
                .optional()
        })
        .await
        .map_err(|e| {
            error!("error retrieving session: {:?}", e);
            AppError::DBError
        })?
        .map_err(|e| {
            error!("error retrieving session: {:?}", e);
            AppError::DBError
        })?;
    if let Some(sess) = resp {
        if sess.is_expired() {
            Err(AppError::ExpiredToken)
        } else {
            Ok(sess)
        }
    } else {
        Err(AppError::InvalidToken)
    }
}

#[cfg(test)]
pub async fn get_session(conn: Connection, session_id: String) -> Result<Option<Session>, AppError> {
    conn.interact(|conn| {
        sessions_dsl::sessions
            .filter(sessions_dsl::id.eq(session_id))
            .select(Session::as_select())
            .first(conn)
            .optional()
    })
    .await
    .map_err(|e| {
        error!("error retrieving session: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        error!("error retrieving session: {:?}", e);
        AppError::DBError
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::routes::_test_utils::test_app;

    #[test_log::test(tokio::test)]
    async fn test_delete_session() -> anyhow::Result<()> {
        let app = test_app(axum::Router::new()).await?;
        let (user, _) = app.sign_in("olga@example.com").await?;
        let session = new_session(app.state.pool(), user.id, 1).await?;

        delete_session(app.conn().await?, session.id.clone()).await?;

        assert!(get_session(app.conn().await?, session.id).await?.is_none());
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_session_reports_failure() -> anyhow::Result<()> {
        let app = test_app(axum::Router::new()).await?;
        let (user, _) = app.sign_in("olga@example.com").await?;
        let session = new_session(app.state.pool(), user.id, 1).await?;
        app.conn()
            .await?
            .interact(|conn| diesel::sql_query("DROP TABLE sessions").execute(conn))
            .await
            .map_err(|e| anyhow::anyhow!("{:?}", e))??;

        let result = delete_session(app.conn().await?, session.id).await;

        assert_eq!(result, Err(AppError::DBError));
        Ok(())
    }
}
