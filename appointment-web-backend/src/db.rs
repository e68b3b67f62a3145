pub mod appointments;
pub mod invites;
pub mod media;
pub mod sessions;
pub mod users;
pub mod util;

use deadpool_diesel::sqlite::{Manager, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::types::AppError;
use util::get_conn;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub(crate) fn make_pool(db_url: &str) -> Pool {
    let manager = Manager::new(db_url, deadpool_diesel::Runtime::Tokio1);
    Pool::builder(manager).build().unwrap()
}

pub(crate) async fn run_migrations(pool: &Pool) -> Result<(), AppError> {
    let conn = get_conn(pool.clone()).await?;
    conn.interact(|conn| {
        conn.run_pending_migrations(MIGRATIONS)
            .map(|applied| applied.len())
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| {
        tracing::error!("error running migrations: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error running migrations: {}", e);
        AppError::DBErrorWithMessage(e)
    })
    .map(|applied| tracing::info!("applied {} migrations", applied))
}
