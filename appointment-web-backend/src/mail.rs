use axum::async_trait;
use axum_template::TemplateEngine;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::json;

use crate::{
    models::{appointment::format_datetime, AppointmentWithDates},
    routes::query_link,
    settings::SmtpSettings,
    types::{AppError, AppState},
};

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpSettings, sender: &str) -> Result<Self, AppError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host).map_err(|e| {
            tracing::error!("invalid SMTP relay {}: {:?}", smtp.host, e);
            AppError::MailError
        })?;
        if let Some(port) = smtp.port {
            builder = builder.port(port);
        }
        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        let sender = sender.parse::<Mailbox>().map_err(|e| {
            tracing::error!("invalid sender address {}: {:?}", sender, e);
            AppError::MailError
        })?;
        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        let to = email.to.parse::<Mailbox>().map_err(|e| {
            tracing::error!("invalid recipient {}: {:?}", email.to, e);
            AppError::MailError
        })?;
        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)
            .map_err(|e| {
                tracing::error!("error building message: {:?}", e);
                AppError::MailError
            })?;
        self.transport.send(message).await.map_err(|e| {
            tracing::error!("error sending mail to {}: {:?}", email.to, e);
            AppError::MailError
        })?;
        Ok(())
    }
}

/// Logs outgoing mail instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        tracing::info!("mail to {}: {}", email.to, email.subject);
        tracing::debug!("{}", email.html);
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingMailer {
    sent: std::sync::Mutex<Vec<OutgoingEmail>>,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Sends the overview to the organizer and an invitation to every invitee.
/// Returns the number of messages sent.
pub async fn send_notifications(
    st: &AppState,
    appointment: &AppointmentWithDates,
    locale: &str,
) -> Result<usize, AppError> {
    let mut outgoing = Vec::with_capacity(appointment.invitee_list.len() + 1);
    outgoing.push(OutgoingEmail {
        to: appointment.appointment.email.clone(),
        subject: format!("Overview: {}", appointment.appointment.description),
        html: render_mail(st, "mail/overview", appointment, &appointment.appointment.email, locale)?,
    });
    for invitee in &appointment.invitee_list {
        outgoing.push(OutgoingEmail {
            to: invitee.clone(),
            subject: format!("Invitation: {}", appointment.appointment.description),
            html: render_mail(st, "mail/invitation", appointment, invitee, locale)?,
        });
    }
    let count = outgoing.len();
    for email in outgoing {
        st.mailer().send(email).await?;
    }
    tracing::info!(
        "sent {} notifications for appointment {}",
        count,
        appointment.id()
    );
    Ok(count)
}

fn render_mail(
    st: &AppState,
    template: &str,
    appointment: &AppointmentWithDates,
    recipient: &str,
    locale: &str,
) -> Result<String, AppError> {
    let base = st.settings().public_url.trim_end_matches('/');
    let appointment_url = format!(
        "{}{}",
        base,
        query_link("/appointment", &[("key", appointment.id()), ("user", recipient)])
    );
    let dates: Vec<_> = appointment
        .date_list
        .iter()
        .map(|date| {
            let date = format_datetime(date);
            let url = format!(
                "{}{}",
                base,
                query_link(
                    "/availability",
                    &[
                        ("key", appointment.id()),
                        ("email", recipient),
                        ("date", date.as_str()),
                        ("user", recipient),
                    ],
                )
            );
            json!({"date": date, "url": url})
        })
        .collect();
    let data = json!({
        "locale": locale,
        "settings": st.settings().template_values(),
        "appointment": appointment,
        "recipient": recipient,
        "appointment_url": appointment_url,
        "dates": dates,
    });
    st.engine().render(template, data).map_err(|e| {
        tracing::error!("error rendering {}: {:?}", template, e);
        AppError::TemplateError
    })
}
