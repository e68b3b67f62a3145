use crate::auth::encode_jwt;
use crate::blobs::BlobStore;
use crate::db::{make_pool, run_migrations, util::get_conn};
use crate::i18n::Catalog;
use crate::mail::{LogMailer, Mailer, SmtpMailer};
use crate::models::session::Session;
use crate::settings::Settings;
use crate::templates::{make_engine, AppEngine};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use deadpool_diesel::sqlite;
use dotenvy::dotenv;
use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pool: sqlite::Pool,
    keys: Keys,
    engine: AppEngine,
    mailer: Arc<dyn Mailer>,
    blobs: BlobStore,
    settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        pool: sqlite::Pool,
        catalog: Catalog,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, AppError> {
        let keys = Keys::new(settings.jwt_secret.as_bytes());
        let engine = make_engine(Arc::new(catalog)).map_err(|e| {
            tracing::error!("template registration error: {:?}", e);
            AppError::TemplateError
        })?;
        let blobs = BlobStore::new(settings.blob_dir.clone());
        Ok(Self {
            pool,
            keys,
            engine,
            mailer,
            blobs,
            settings: Arc::new(settings),
        })
    }

    pub async fn from_env() -> Self {
        // panics
        dotenv().ok();
        tracing::info!("loading env");
        let settings = Settings::from_env();
        let pool = make_pool(&settings.database_url);
        run_migrations(&pool).await.expect("failed to run migrations");
        let catalog = Catalog::load_dir(&settings.locale_dir);
        let mailer: Arc<dyn Mailer> = match &settings.smtp {
            Some(smtp) => Arc::new(
                SmtpMailer::new(smtp, &settings.sender_email).expect("invalid SMTP settings"),
            ),
            None => {
                tracing::warn!("SMTP_HOST not set, outgoing mail will only be logged");
                Arc::new(LogMailer)
            }
        };
        let st = Self::new(settings, pool, catalog, mailer).expect("failed to build app state");
        st.blobs.ensure_root().await.expect("blob directory not writable");
        st
    }

    pub fn encoding(&self) -> &EncodingKey {
        self.keys.encoding()
    }
    pub fn decoding(&self) -> &DecodingKey {
        self.keys.decoding()
    }
    pub fn pool(&self) -> sqlite::Pool {
        self.pool.clone()
    }
    pub async fn conn(&self) -> Result<sqlite::Connection, AppError> {
        get_conn(self.pool()).await
    }
    pub fn engine(&self) -> AppEngine {
        self.engine.clone()
    }
    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

#[derive(Clone)]
pub(crate) struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
    fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }
    fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub(crate) sub: String,
    pub(crate) jti: String,
    pub(crate) exp: i64,
}

impl Claims {
    pub fn from_session(session: &Session) -> Self {
        Self {
            sub: session.user_id.clone(),
            jti: session.id.clone(),
            exp: session.expires.and_utc().timestamp(),
        }
    }

    pub fn to_token(self, encoding_key: &EncodingKey) -> Result<String, AppError> {
        encode_jwt(self, encoding_key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    WrongCredentials,
    MissingCredentials,
    TokenCreation,
    InvalidToken,
    ExpiredToken,
    Forbidden,
    MethodNotAllowed,
    InternalServerError,
    DBError,
    NotFound,
    DBErrorWithMessage(String),
    BadRequestWithMessage(String),
    MailError,
    TemplateError,
    StorageError,
    ImageError,
}

impl AppError {
    fn to_status_message(&self) -> (StatusCode, String) {
        match self {
            AppError::WrongCredentials => (StatusCode::FORBIDDEN, "Wrong credentials".into()),
            AppError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Missing credentials".into())
            }
            AppError::TokenCreation => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Token creation error".into(),
            ),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token".into()),
            AppError::ExpiredToken => (StatusCode::UNAUTHORIZED, "Token Expired".into()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".into()),
            AppError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".into())
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".into(),
            ),
            AppError::DBError => (StatusCode::INTERNAL_SERVER_ERROR, "Database error".into()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".into()),
            // the message is for the logs, not the client
            AppError::DBErrorWithMessage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".into())
            }
            AppError::BadRequestWithMessage(msg) => {
                (StatusCode::BAD_REQUEST, format!("Invalid request: {}", msg))
            }
            AppError::MailError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Mail delivery error".into(),
            ),
            AppError::TemplateError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Template error".into(),
            ),
            AppError::StorageError => (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".into()),
            AppError::ImageError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Image processing error".into(),
            ),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (_, msg) = self.to_status_message();
        write!(f, "Application Error: {}", msg)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.to_status_message();
        (status, error_message).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn database_failures_are_server_errors() {
        let resp = AppError::DBErrorWithMessage("disk I/O error".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::DBErrorWithMessage("database is locked".into()).to_string(),
            "Application Error: Database error"
        );
    }

    #[test]
    fn rejected_input_is_a_client_error() {
        let resp = AppError::BadRequestWithMessage("email already registered".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::MethodNotAllowed.into_response().status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
