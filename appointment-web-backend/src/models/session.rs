use chrono::{Duration, NaiveDateTime, Utc};
use diesel::{associations::Identifiable, deserialize::Queryable, Insertable, Selectable};

#[derive(Debug, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expires: NaiveDateTime,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires < Utc::now().naive_utc()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::sessions)]
pub struct NewSession {
    pub id: String,
    pub user_id: String,
    pub expires: NaiveDateTime,
}

impl NewSession {
    pub fn for_user(user_id: String, hours: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            expires: (Utc::now() + Duration::hours(hours)).naive_utc(),
        }
    }
}

impl From<NewSession> for Session {
    fn from(s: NewSession) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            expires: s.expires,
        }
    }
}
