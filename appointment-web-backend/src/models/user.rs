use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use diesel::{associations::Identifiable, deserialize::Queryable, prelude::Insertable, Selectable};
use serde::{Deserialize, Serialize};

use crate::types::AppError;

#[derive(Debug, Queryable, Selectable, Identifiable, PartialEq, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password: String,
}

impl From<NewUser> for User {
    fn from(u: NewUser) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            password: u.password,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[cfg_attr(test, derive(fake::Dummy))]
pub struct RegisterForm {
    #[cfg_attr(test, dummy(faker = "fake::faker::internet::en::SafeEmail()"))]
    pub email: String,
    #[cfg_attr(test, dummy(faker = "fake::faker::name::en::Name()"))]
    pub name: String,
    #[cfg_attr(test, dummy(faker = "fake::faker::internet::en::Password(10..20)"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(rename = "continue", default)]
    pub next: Option<String>,
}

/// The signed-in user, as resolved from the session token for this request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub admin: bool,
}

impl CurrentUser {
    pub fn owns(&self, owner_email: &str) -> bool {
        self.email.eq_ignore_ascii_case(owner_email)
    }
}

/// Request extension carrying the resolved identity, `None` for anonymous requests.
#[derive(Debug, Clone, Default)]
pub struct Identity(pub Option<CurrentUser>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .and_then(|identity| identity.0.clone())
            .ok_or(AppError::Forbidden)
    }
}
