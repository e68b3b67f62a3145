use chrono::NaiveDateTime;
use deadpool_diesel::sqlite::Connection;
use diesel::prelude::*;

use super::util::err_is_not_found;
use crate::{models::Invite, schema::invites::dsl as invites_dsl, types::AppError};

pub async fn invites_for_appointment(
    conn: Connection,
    appointment_id: String,
) -> Result<Vec<Invite>, AppError> {
    conn.interact(|conn| {
        invites_dsl::invites
            .filter(invites_dsl::appointment_id.eq(appointment_id))
            .order((invites_dsl::date.asc(), invites_dsl::email.asc()))
            .select(Invite::as_select())
            .load(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error retrieving invites: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error retrieving invites: {:?}", e);
        AppError::DBError
    })
}

pub async fn find_invite(
    conn: Connection,
    appointment_id: String,
    email: String,
    date: NaiveDateTime,
) -> Result<Invite, AppError> {
    conn.interact(move |conn| {
        invites_dsl::invites
            .filter(invites_dsl::appointment_id.eq(appointment_id))
            .filter(invites_dsl::email.eq(email))
            .filter(invites_dsl::date.eq(date))
            .select(Invite::as_select())
            .first(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error retrieving invite: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        if err_is_not_found(&e) {
            AppError::NotFound
        } else {
            tracing::error!("error retrieving invite: {:?}", e);
            AppError::DBError
        }
    })
}

/// Overwrites the status of the invite identified by (appointment, email, date).
pub async fn update_invite_status(
    conn: Connection,
    appointment_id: String,
    email: String,
    date: NaiveDateTime,
    status: String,
) -> Result<Invite, AppError> {
    conn.interact(move |conn| {
        conn.transaction(|conn| {
            let target = invites_dsl::invites
                .filter(invites_dsl::appointment_id.eq(appointment_id.as_str()))
                .filter(invites_dsl::email.eq(email.as_str()))
                .filter(invites_dsl::date.eq(date));
            let updated = diesel::update(target.clone())
                .set(invites_dsl::status.eq(status.as_str()))
                .execute(conn)?;
            if updated == 0 {
                return Err(diesel::result::Error::NotFound);
            }
            target.select(Invite::as_select()).first(conn)
        })
    })
    .await
    .map_err(|e| {
        tracing::error!("error updating invite: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        if err_is_not_found(&e) {
            AppError::NotFound
        } else {
            tracing::error!("error updating invite: {:?}", e);
            AppError::DBError
        }
    })
}
