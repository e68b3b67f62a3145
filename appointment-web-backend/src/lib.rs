mod auth;
mod blobs;
mod db;
mod guard;
mod i18n;
mod imaging;
mod mail;
mod models;
mod routes;
mod schema;
mod settings;
mod templates;
mod types;

pub use routes::make_app;
pub use types::AppState;
