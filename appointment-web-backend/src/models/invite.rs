use chrono::NaiveDateTime;
use diesel::prelude::{Associations, Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use super::appointment::Appointment;

pub const STATUS_YES: &str = "yes";
pub const STATUS_MAYBE: &str = "maybe";

/// Availability of one participant for one candidate date. The status is free text.
#[derive(
    Debug, Deserialize, Queryable, Selectable, Identifiable, Insertable, Associations, Serialize,
    PartialEq, Clone,
)]
#[diesel(belongs_to(Appointment))]
#[diesel(table_name = crate::schema::invites)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Invite {
    pub id: String,
    pub appointment_id: String,
    pub email: String,
    pub date: NaiveDateTime,
    pub status: String,
}

impl Invite {
    pub fn new(appointment_id: &str, email: &str, date: NaiveDateTime, status: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            appointment_id: appointment_id.to_string(),
            email: email.to_string(),
            date,
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AvailabilityQuery {
    pub key: String,
    pub email: String,
    pub date: String,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AvailabilityUpdate {
    pub key: String,
    pub date: String,
    pub availability: String,
    #[serde(default)]
    pub user: Option<String>,
}
