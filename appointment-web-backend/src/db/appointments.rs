use deadpool_diesel::sqlite::Connection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::util::err_is_not_found;
use crate::{
    models::{
        appointment::{AppointmentDate, AppointmentInvitee},
        Appointment, AppointmentWithDates, Invite,
    },
    schema::{
        appointment_dates::{self, dsl as dates_dsl},
        appointment_invitees::{self, dsl as invitees_dsl},
        appointments::{self, dsl as appointments_dsl},
        invites::{self, dsl as invites_dsl},
    },
    types::AppError,
};

/// Writes the appointment, its lists and its initial invites in one transaction.
pub async fn new_appointment(
    conn: Connection,
    appointment: AppointmentWithDates,
    invites: Vec<Invite>,
) -> Result<AppointmentWithDates, AppError> {
    conn.interact(move |conn| {
        let written = conn.transaction(|conn| {
            diesel::insert_into(appointments::table)
                .values(&appointment.appointment)
                .execute(conn)?;
            diesel::insert_into(appointment_invitees::table)
                .values(appointment.invitee_rows())
                .execute(conn)?;
            diesel::insert_into(appointment_dates::table)
                .values(appointment.date_rows())
                .execute(conn)?;
            diesel::insert_into(invites::table)
                .values(&invites)
                .execute(conn)?;
            Ok::<_, diesel::result::Error>(())
        });
        written.map(|_| appointment)
    })
    .await
    .map_err(|e| {
        tracing::error!("error creating appointment: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error creating appointment: {:?}", e);
        AppError::DBErrorWithMessage(e.to_string())
    })
}

pub async fn get_appointment(
    conn: Connection,
    appointment_id: String,
) -> Result<AppointmentWithDates, AppError> {
    conn.interact(|conn| {
        let appointment = appointments_dsl::appointments
            .filter(appointments_dsl::id.eq(appointment_id))
            .select(Appointment::as_select())
            .first(conn)?;
        with_dates(conn, vec![appointment]).map(|mut found| found.remove(0))
    })
    .await
    .map_err(|e| {
        tracing::error!("error retrieving appointment: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        if err_is_not_found(&e) {
            AppError::NotFound
        } else {
            tracing::error!("error retrieving appointment: {:?}", e);
            AppError::DBError
        }
    })
}

/// All appointments, most recent candidate date first.
pub async fn list_appointments(conn: Connection) -> Result<Vec<AppointmentWithDates>, AppError> {
    let mut all = conn
        .interact(|conn| {
            let found = appointments_dsl::appointments
                .select(Appointment::as_select())
                .load(conn)?;
            with_dates(conn, found)
        })
        .await
        .map_err(|e| {
            tracing::error!("error listing appointments: {:?}", e);
            AppError::DBError
        })?
        .map_err(|e| {
            tracing::error!("error listing appointments: {:?}", e);
            AppError::DBError
        })?;
    sort_by_latest_date(&mut all);
    Ok(all)
}

pub async fn appointments_organized_by(
    conn: Connection,
    email: String,
) -> Result<Vec<AppointmentWithDates>, AppError> {
    let mut found = conn
        .interact(|conn| {
            let found = appointments_dsl::appointments
                .filter(appointments_dsl::email.eq(email))
                .select(Appointment::as_select())
                .load(conn)?;
            with_dates(conn, found)
        })
        .await
        .map_err(|e| {
            tracing::error!("error retrieving organized appointments: {:?}", e);
            AppError::DBError
        })?
        .map_err(|e| {
            tracing::error!("error retrieving organized appointments: {:?}", e);
            AppError::DBError
        })?;
    sort_by_latest_date(&mut found);
    Ok(found)
}

/// Appointments where `email` holds an invite but is not the organizer.
pub async fn appointments_invited_to(
    conn: Connection,
    email: String,
) -> Result<Vec<AppointmentWithDates>, AppError> {
    let mut found = conn
        .interact(|conn| {
            let ids: Vec<String> = invites_dsl::invites
                .filter(invites_dsl::email.eq(email.as_str()))
                .select(invites_dsl::appointment_id)
                .distinct()
                .load(conn)?;
            let found = appointments_dsl::appointments
                .filter(appointments_dsl::id.eq_any(ids))
                .filter(appointments_dsl::email.ne(email.as_str()))
                .select(Appointment::as_select())
                .load(conn)?;
            with_dates(conn, found)
        })
        .await
        .map_err(|e| {
            tracing::error!("error retrieving invitations: {:?}", e);
            AppError::DBError
        })?
        .map_err(|e| {
            tracing::error!("error retrieving invitations: {:?}", e);
            AppError::DBError
        })?;
    sort_by_latest_date(&mut found);
    Ok(found)
}

/// Removes the appointment together with its invites and lists. Returns the number of invites removed.
pub async fn delete_appointment(conn: Connection, appointment_id: String) -> Result<usize, AppError> {
    conn.interact(move |conn| {
        conn.transaction(|conn| {
            let removed = diesel::delete(
                invites_dsl::invites.filter(invites_dsl::appointment_id.eq(appointment_id.as_str())),
            )
            .execute(conn)?;
            diesel::delete(
                invitees_dsl::appointment_invitees
                    .filter(invitees_dsl::appointment_id.eq(appointment_id.as_str())),
            )
            .execute(conn)?;
            diesel::delete(
                dates_dsl::appointment_dates.filter(dates_dsl::appointment_id.eq(appointment_id.as_str())),
            )
            .execute(conn)?;
            let deleted = diesel::delete(
                appointments_dsl::appointments.filter(appointments_dsl::id.eq(appointment_id.as_str())),
            )
            .execute(conn)?;
            if deleted == 0 {
                return Err(diesel::result::Error::NotFound);
            }
            Ok(removed)
        })
    })
    .await
    .map_err(|e| {
        tracing::error!("error deleting appointment: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        if err_is_not_found(&e) {
            AppError::NotFound
        } else {
            tracing::error!("error deleting appointment: {:?}", e);
            AppError::DBError
        }
    })
}

fn with_dates(
    conn: &mut SqliteConnection,
    found: Vec<Appointment>,
) -> QueryResult<Vec<AppointmentWithDates>> {
    let invitees = AppointmentInvitee::belonging_to(&found)
        .select(AppointmentInvitee::as_select())
        .order(invitees_dsl::position.asc())
        .load(conn)?
        .grouped_by(&found);
    let dates = AppointmentDate::belonging_to(&found)
        .select(AppointmentDate::as_select())
        .order(dates_dsl::position.asc())
        .load(conn)?
        .grouped_by(&found);
    Ok(found
        .into_iter()
        .zip(invitees)
        .zip(dates)
        .map(|((appointment, invitees), dates)| AppointmentWithDates {
            appointment,
            invitee_list: invitees.into_iter().map(|i| i.email).collect(),
            date_list: dates.into_iter().map(|d| d.date).collect(),
        })
        .collect())
}

fn sort_by_latest_date(appointments: &mut [AppointmentWithDates]) {
    appointments.sort_by(|a, b| b.latest_date().cmp(&a.latest_date()));
}
