pub mod appointment;
pub mod invite;
pub mod media;
pub mod session;
pub mod user;

pub use appointment::{Appointment, AppointmentWithDates, NewAppointmentForm};
pub use invite::Invite;
pub use media::{File, Photo};
pub use session::{NewSession, Session};
pub use user::{CurrentUser, NewUser, User};
