use chrono::NaiveDateTime;
use diesel::prelude::{Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Queryable, Selectable, Identifiable, Insertable, Serialize, PartialEq, Clone)]
#[diesel(table_name = crate::schema::photos)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Photo {
    pub id: String,
    pub user_email: String,
    pub blob_key: String,
    pub content_type: String,
    pub filename: String,
    pub size: i64,
    pub comment: Option<String>,
    pub public: bool,
    pub rotation: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Insertable, Serialize, PartialEq, Clone)]
#[diesel(table_name = crate::schema::files)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct File {
    pub id: String,
    pub user_email: String,
    pub blob_key: String,
    pub content_type: String,
    pub filename: String,
    pub size: i64,
    pub comment: Option<String>,
    pub public: bool,
    pub created_at: NaiveDateTime,
}

impl Photo {
    pub fn matches(&self, query: &str) -> bool {
        self.comment
            .as_deref()
            .map_or(false, |comment| comment.contains(query))
    }
}

/// Metadata for one uploaded blob, before it is classified as a photo or a file.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub user_email: String,
    pub blob_key: String,
    pub content_type: String,
    pub filename: String,
    pub size: u64,
    pub comment: Option<String>,
    pub public: bool,
}

impl Upload {
    pub fn is_image(&self) -> bool {
        is_image(&self.content_type)
    }

    pub fn into_photo(self) -> Photo {
        Photo {
            id: uuid::Uuid::new_v4().to_string(),
            user_email: self.user_email,
            blob_key: self.blob_key,
            content_type: self.content_type,
            filename: self.filename,
            size: self.size as i64,
            comment: self.comment,
            public: self.public,
            rotation: 0,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn into_file(self) -> File {
        File {
            id: uuid::Uuid::new_v4().to_string(),
            user_email: self.user_email,
            blob_key: self.blob_key,
            content_type: self.content_type,
            filename: self.filename,
            size: self.size as i64,
            comment: self.comment,
            public: self.public,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

pub fn is_image(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

/// Adds `delta` degrees to `current` and folds the result into [0, 360).
pub fn normalize_rotation(current: i32, delta: i64) -> i32 {
    (current as i64 + delta).rem_euclid(360) as i32
}

/// Interprets an HTML checkbox or boolean-ish form value.
pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("on" | "true" | "1" | "yes" | "public")
    )
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RotateForm {
    pub angle: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ShareForm {
    #[serde(default)]
    pub public: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RemoveForm {
    pub key: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub user: Option<String>,
}
