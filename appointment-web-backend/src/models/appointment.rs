use chrono::{NaiveDateTime, Utc};
use diesel::prelude::{Associations, Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use super::invite::{Invite, STATUS_MAYBE, STATUS_YES};
use crate::types::AppError;

/// Format used for candidate dates in forms, links and the availability endpoint.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Queryable, Selectable, Identifiable, Insertable, Serialize, PartialEq, Clone)]
#[diesel(table_name = crate::schema::appointments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Appointment {
    pub id: String,
    pub description: String,
    pub name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Associations, Insertable, PartialEq)]
#[diesel(belongs_to(Appointment))]
#[diesel(table_name = crate::schema::appointment_invitees)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AppointmentInvitee {
    pub appointment_id: String,
    pub position: i32,
    pub email: String,
}

#[derive(Debug, Queryable, Selectable, Associations, Insertable, PartialEq)]
#[diesel(belongs_to(Appointment))]
#[diesel(table_name = crate::schema::appointment_dates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AppointmentDate {
    pub appointment_id: String,
    pub position: i32,
    pub date: NaiveDateTime,
}

/// An appointment together with its invitee and candidate date lists, in creation order.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct AppointmentWithDates {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub invitee_list: Vec<String>,
    pub date_list: Vec<NaiveDateTime>,
}

impl AppointmentWithDates {
    pub fn new(
        description: String,
        name: String,
        email: String,
        invitee_list: Vec<String>,
        date_list: Vec<NaiveDateTime>,
    ) -> Self {
        Self {
            appointment: Appointment {
                id: uuid::Uuid::new_v4().to_string(),
                description,
                name,
                email,
                created_at: Utc::now().naive_utc(),
            },
            invitee_list,
            date_list,
        }
    }

    pub fn id(&self) -> &str {
        &self.appointment.id
    }

    pub fn latest_date(&self) -> Option<NaiveDateTime> {
        self.date_list.iter().max().copied()
    }

    pub fn invitee_rows(&self) -> Vec<AppointmentInvitee> {
        self.invitee_list
            .iter()
            .enumerate()
            .map(|(i, email)| AppointmentInvitee {
                appointment_id: self.appointment.id.clone(),
                position: i as i32,
                email: email.clone(),
            })
            .collect()
    }

    pub fn date_rows(&self) -> Vec<AppointmentDate> {
        self.date_list
            .iter()
            .enumerate()
            .map(|(i, date)| AppointmentDate {
                appointment_id: self.appointment.id.clone(),
                position: i as i32,
                date: *date,
            })
            .collect()
    }

    /// One "yes" row for the organizer and one "maybe" row per invitee, for every date.
    pub fn initial_invites(&self) -> Vec<Invite> {
        let mut invites =
            Vec::with_capacity((self.invitee_list.len() + 1) * self.date_list.len());
        for date in &self.date_list {
            invites.push(Invite::new(
                self.id(),
                &self.appointment.email,
                *date,
                STATUS_YES,
            ));
            for invitee in &self.invitee_list {
                invites.push(Invite::new(self.id(), invitee, *date, STATUS_MAYBE));
            }
        }
        invites
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NewAppointmentForm {
    pub description: String,
    pub invitees: String,
    #[serde(rename = "date[]", default)]
    pub dates: Vec<String>,
    #[serde(rename = "time[]", default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl NewAppointmentForm {
    /// Pairs each date with its time and parses the result; any failure rejects the whole list.
    pub fn date_list(&self) -> Result<Vec<NaiveDateTime>, AppError> {
        if self.dates.len() != self.times.len() {
            return Err(AppError::BadRequestWithMessage(
                "every date needs a time".into(),
            ));
        }
        let mut parsed: Vec<NaiveDateTime> = Vec::with_capacity(self.dates.len());
        for (d, t) in self.dates.iter().zip(&self.times) {
            let date = parse_datetime(&format!("{} {}", d.trim(), t.trim()))?;
            if !parsed.contains(&date) {
                parsed.push(date);
            }
        }
        if parsed.is_empty() {
            return Err(AppError::BadRequestWithMessage(
                "at least one date is required".into(),
            ));
        }
        Ok(parsed)
    }

    pub fn invitee_list(&self, organizer: &str) -> Result<Vec<String>, AppError> {
        let list = parse_invitee_list(&self.invitees, organizer);
        if list.is_empty() {
            return Err(AppError::BadRequestWithMessage(
                "at least one invitee is required".into(),
            ));
        }
        Ok(list)
    }

    pub fn organizer_name(&self, fallback: &str) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => fallback.to_string(),
        }
    }
}

pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT).map_err(|e| {
        tracing::debug!("unparseable date {:?}: {}", raw, e);
        AppError::BadRequestWithMessage(format!("invalid date {:?}", raw))
    })
}

pub fn format_datetime(date: &NaiveDateTime) -> String {
    date.format(DATETIME_FORMAT).to_string()
}

/// Splits a comma separated address list, dropping blanks, repeats and the organizer.
pub fn parse_invitee_list(raw: &str, organizer: &str) -> Vec<String> {
    let mut list: Vec<String> = Vec::new();
    for entry in raw.split(',').map(str::trim) {
        if entry.is_empty()
            || entry.eq_ignore_ascii_case(organizer)
            || list.iter().any(|e| e.eq_ignore_ascii_case(entry))
        {
            continue;
        }
        list.push(entry.to_string());
    }
    list
}
