use super::util::{err_is_not_found, err_is_unique_violation};
use crate::{
    models::{NewUser, User},
    schema::users::{self, dsl as users_dsl},
    types::AppError,
};
use deadpool_diesel::sqlite::Connection;
use diesel::prelude::*;

pub async fn new_user(conn: Connection, user: NewUser) -> Result<User, AppError> {
    conn.interact(|conn| {
        let inserted = diesel::insert_into(users::table).values(&user).execute(conn);
        inserted.map(|_| User::from(user))
    })
    .await
    .map_err(|e| {
        tracing::error!("error creating user: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        if err_is_unique_violation(&e) {
            AppError::BadRequestWithMessage("email already registered".into())
        } else {
            tracing::error!("error creating user: {:?}", e);
            AppError::DBErrorWithMessage(e.to_string())
        }
    })
}

pub async fn get_user(conn: Connection, user_id: String) -> Result<User, AppError> {
    conn.interact(|conn| {
        users_dsl::users
            .filter(users_dsl::id.eq(user_id))
            .select(User::as_select())
            .first(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error retrieving user: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        if err_is_not_found(&e) {
            AppError::NotFound
        } else {
            tracing::error!("error retrieving user: {:?}", e);
            AppError::DBError
        }
    })
}

pub async fn get_user_by_email(conn: Connection, email: String) -> Result<Option<User>, AppError> {
    conn.interact(|conn| {
        users_dsl::users
            .filter(users_dsl::email.eq(email))
            .select(User::as_select())
            .first(conn)
            .optional()
    })
    .await
    .map_err(|e| {
        tracing::error!("error retrieving user: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error retrieving user: {:?}", e);
        AppError::DBError
    })
}
