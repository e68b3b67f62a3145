use deadpool_diesel::sqlite::{Connection, Pool};
use diesel::connection::SimpleConnection;
use diesel::result::{DatabaseErrorKind, Error as DE};

use crate::types::AppError;

// Pragmas are per connection in SQLite, so they are applied on every checkout.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

pub(crate) async fn get_conn(pool: Pool) -> Result<Connection, AppError> {
    let conn = pool.get().await.map_err(|e| {
        tracing::error!("db connection error {:?}", e);
        AppError::InternalServerError
    })?;
    conn.interact(|conn| conn.batch_execute(CONNECTION_PRAGMAS))
        .await
        .map_err(|e| {
            tracing::error!("db connection error {:?}", e);
            AppError::InternalServerError
        })?
        .map_err(|e| {
            tracing::error!("error applying connection pragmas: {:?}", e);
            AppError::DBError
        })?;
    Ok(conn)
}

pub fn err_is_not_found(err: &DE) -> bool {
    matches!(err, DE::NotFound)
}

pub fn err_is_unique_violation(err: &DE) -> bool {
    matches!(err, DE::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
}
