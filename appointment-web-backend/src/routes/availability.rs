use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
    Form, Router,
};
use serde_json::json;

use super::{query_link, PageContext};
use crate::{
    db::{
        appointments::get_appointment,
        invites::{find_invite, update_invite_status},
    },
    models::{
        appointment::{format_datetime, parse_datetime},
        invite::{AvailabilityQuery, AvailabilityUpdate},
    },
    types::{AppError, AppState},
};

pub fn availability_router() -> Router<AppState> {
    Router::new().route("/availability", get(show).post(update))
}

/// Editable for the participant the invite belongs to, read-only for everybody else.
async fn show(
    State(st): State<AppState>,
    page: PageContext,
    Query(q): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, AppError> {
    let date = parse_datetime(&q.date)?;
    let appointment = get_appointment(st.conn().await?, q.key).await?;
    let invite = find_invite(st.conn().await?, appointment.id().to_string(), q.email, date).await?;
    let editable = q
        .user
        .as_deref()
        .map_or(false, |user| user.eq_ignore_ascii_case(&invite.email));
    let template = if editable { "setavailability" } else { "availability" };
    Ok(page.render(
        &st,
        template,
        json!({
            "appointment": appointment,
            "invite": invite,
            "date": format_datetime(&date),
            "viewer": q.user,
            "appointment_url": query_link(
                "/appointment",
                &[("key", appointment.id()), ("user", q.user.as_deref().unwrap_or(""))],
            ),
        }),
    ))
}

async fn update(
    State(st): State<AppState>,
    page: PageContext,
    Form(payload): Form<AvailabilityUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let participant = payload
        .user
        .filter(|u| !u.trim().is_empty())
        .or_else(|| page.email().map(String::from))
        .ok_or(AppError::Forbidden)?;
    let date = parse_datetime(&payload.date)?;
    let appointment = get_appointment(st.conn().await?, payload.key).await?;
    let invite = update_invite_status(
        st.conn().await?,
        appointment.id().to_string(),
        participant.trim().to_string(),
        date,
        payload.availability,
    )
    .await?;
    tracing::info!(
        "{} is {:?} on {} for appointment {}",
        invite.email,
        invite.status,
        format_datetime(&invite.date),
        appointment.id()
    );
    Ok(Redirect::to(&query_link(
        "/appointment",
        &[("key", appointment.id()), ("user", participant.as_str())],
    )))
}
