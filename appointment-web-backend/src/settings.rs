use serde_json::{json, Value};
use std::{env, path::PathBuf, str::FromStr};

pub const APP_NAME: &str = "Appointments";
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub sender_email: String,
    pub bind_addr: String,
    /// Base URL used for links inside outgoing mail.
    pub public_url: String,
    pub blob_dir: PathBuf,
    pub locale_dir: PathBuf,
    pub admin_emails: Vec<String>,
    /// Images strictly larger than this are rejected on upload.
    pub max_image_bytes: u64,
    pub session_hours: i64,
    pub smtp: Option<SmtpSettings>,
}

impl Settings {
    /// Reads settings from the process environment. Panics on missing or malformed values.
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL").expect("missing DATABASE_URL");
        let jwt_secret = env::var("JWT_SECRET").expect("missing JWT_SECRET");
        let sender_email = env::var("SENDER_EMAIL").expect("missing SENDER_EMAIL");
        let smtp = env::var("SMTP_HOST").ok().map(|host| SmtpSettings {
            host,
            port: parse_var("SMTP_PORT"),
            username: env::var("SMTP_USERNAME").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
        });
        Self {
            database_url,
            jwt_secret,
            sender_email,
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            public_url: var_or("PUBLIC_URL", "http://localhost:8080"),
            blob_dir: var_or("BLOB_DIR", "./blobs").into(),
            locale_dir: var_or("LOCALE_DIR", "./locale").into(),
            admin_emails: split_list(&var_or("ADMIN_EMAILS", "")),
            max_image_bytes: parse_var("MAX_IMAGE_BYTES").unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
            session_hours: parse_var("SESSION_HOURS").unwrap_or(72),
            smtp,
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }

    /// The `settings` value every template receives.
    pub fn template_values(&self) -> Value {
        json!({
            "app_name": APP_NAME,
            "public_url": self.public_url,
            "sender_email": self.sender_email,
            "max_image_bytes": self.max_image_bytes,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().map(|v| {
        v.trim()
            .parse()
            .unwrap_or_else(|_| panic!("invalid value for {}: {}", name, v))
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
impl Settings {
    pub(crate) fn for_tests(root: &std::path::Path) -> Self {
        Self {
            database_url: root.join("test.db").to_string_lossy().into_owned(),
            jwt_secret: "test-secret".into(),
            sender_email: "noreply@appointments.test".into(),
            bind_addr: "127.0.0.1:0".into(),
            public_url: "http://appointments.test".into(),
            blob_dir: root.join("blobs"),
            locale_dir: root.join("locale"),
            admin_emails: vec!["admin@appointments.test".into()],
            max_image_bytes: 64 * 1024,
            session_hours: 1,
            smtp: None,
        }
    }
}
