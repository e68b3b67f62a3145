use axum::{
    extract::{Query, State},
    middleware,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{query_link, require_admin, require_login, PageContext};
use crate::{
    db::{appointments, invites::invites_for_appointment},
    mail::send_notifications,
    models::{
        appointment::format_datetime, media::RemoveForm, AppointmentWithDates, CurrentUser,
        Invite, NewAppointmentForm,
    },
    types::{AppError, AppState},
};

pub fn appointments_router() -> Router<AppState> {
    let public = Router::new().route("/appointment", get(show));
    let signed_in = Router::new()
        .route("/new", get(new_form).post(create))
        .route("/appointment/remove", post(remove))
        .route("/confirm", get(confirm))
        .route_layer(middleware::from_fn(require_login));
    let admin = Router::new()
        .route("/appointments", get(list_all))
        .route_layer(middleware::from_fn(require_admin));
    public.merge(signed_in).merge(admin)
}

#[derive(Debug, Deserialize)]
struct KeyQuery {
    #[serde(default)]
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppointmentQuery {
    key: String,
    #[serde(default)]
    user: Option<String>,
}

/// Creation form, optionally pre-filled from an existing appointment.
async fn new_form(
    State(st): State<AppState>,
    page: PageContext,
    Query(q): Query<KeyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let copy = match q.key.filter(|k| !k.is_empty()) {
        Some(key) => {
            let appointment = appointments::get_appointment(st.conn().await?, key).await?;
            let dates: Vec<Value> = appointment
                .date_list
                .iter()
                .map(|d| {
                    json!({
                        "date": d.format("%Y-%m-%d").to_string(),
                        "time": d.format("%H:%M").to_string(),
                    })
                })
                .collect();
            json!({
                "description": appointment.appointment.description,
                "invitees": appointment.invitee_list.join(", "),
                "name": appointment.appointment.name,
                "dates": dates,
            })
        }
        None => Value::Null,
    };
    Ok(page.render(&st, "new", json!({ "copy": copy })))
}

async fn create(
    State(st): State<AppState>,
    page: PageContext,
    user: CurrentUser,
    axum_extra::extract::Form(payload): axum_extra::extract::Form<NewAppointmentForm>,
) -> Result<impl IntoResponse, AppError> {
    let date_list = payload.date_list()?;
    let invitee_list = payload.invitee_list(&user.email)?;
    let description = payload.description.trim().to_string();
    if description.is_empty() {
        return Err(AppError::BadRequestWithMessage("a description is required".into()));
    }
    let appointment = AppointmentWithDates::new(
        description,
        payload.organizer_name(&user.name),
        user.email.clone(),
        invitee_list,
        date_list,
    );
    let invites = appointment.initial_invites();
    tracing::info!(
        "creating appointment {} with {} invites",
        appointment.id(),
        invites.len()
    );
    let appointment = appointments::new_appointment(st.conn().await?, appointment, invites).await?;
    send_notifications(&st, &appointment, &page.locale).await?;
    Ok(Redirect::to(&query_link(
        "/appointment",
        &[("key", appointment.id()), ("user", user.email.as_str())],
    )))
}

/// Invites grouped per candidate date, in date order, each with its availability link.
fn invites_by_date(appointment: &AppointmentWithDates, invites: &[Invite], viewer: &str) -> Vec<Value> {
    appointment
        .date_list
        .iter()
        .map(|date| {
            let formatted = format_datetime(date);
            let rows: Vec<Value> = invites
                .iter()
                .filter(|invite| invite.date == *date)
                .map(|invite| {
                    json!({
                        "email": invite.email,
                        "status": invite.status,
                        "mine": invite.email.eq_ignore_ascii_case(viewer),
                        "url": query_link(
                            "/availability",
                            &[
                                ("key", appointment.id()),
                                ("email", invite.email.as_str()),
                                ("date", formatted.as_str()),
                                ("user", viewer),
                            ],
                        ),
                    })
                })
                .collect();
            json!({ "date": date, "label": formatted, "invites": rows })
        })
        .collect()
}

async fn show(
    State(st): State<AppState>,
    page: PageContext,
    Query(q): Query<AppointmentQuery>,
) -> Result<impl IntoResponse, AppError> {
    let appointment = appointments::get_appointment(st.conn().await?, q.key).await?;
    let invites = invites_for_appointment(st.conn().await?, appointment.id().to_string()).await?;
    let viewer = q
        .user
        .or_else(|| page.email().map(String::from))
        .unwrap_or_default();
    let organizer = page
        .user
        .as_ref()
        .map_or(false, |u| u.owns(&appointment.appointment.email));
    let dates = invites_by_date(&appointment, &invites, &viewer);
    Ok(page.render(
        &st,
        "appointment",
        json!({
            "appointment": appointment,
            "dates": dates,
            "viewer": viewer,
            "organizer": organizer,
            "copy_url": query_link("/new", &[("key", appointment.id())]),
            "confirm_url": query_link("/confirm", &[("key", appointment.id())]),
        }),
    ))
}

/// Loads an appointment the signed-in user organizes; anyone else gets 405.
async fn organized_appointment(
    st: &AppState,
    user: &CurrentUser,
    key: String,
) -> Result<AppointmentWithDates, AppError> {
    let appointment = appointments::get_appointment(st.conn().await?, key).await?;
    if !user.owns(&appointment.appointment.email) {
        tracing::warn!(
            "{} is not the organizer of appointment {}",
            user.email,
            appointment.id()
        );
        return Err(AppError::MethodNotAllowed);
    }
    Ok(appointment)
}

async fn remove(
    State(st): State<AppState>,
    user: CurrentUser,
    Form(payload): Form<RemoveForm>,
) -> Result<impl IntoResponse, AppError> {
    let appointment = organized_appointment(&st, &user, payload.key).await?;
    let removed = appointments::delete_appointment(st.conn().await?, appointment.id().to_string()).await?;
    tracing::info!(
        "deleted appointment {} and {} invites",
        appointment.id(),
        removed
    );
    Ok(Redirect::to("/profile"))
}

async fn confirm(
    State(st): State<AppState>,
    page: PageContext,
    user: CurrentUser,
    Query(q): Query<AppointmentQuery>,
) -> Result<impl IntoResponse, AppError> {
    let appointment = organized_appointment(&st, &user, q.key).await?;
    let sent = send_notifications(&st, &appointment, &page.locale).await?;
    Ok(page.render(
        &st,
        "confirm",
        json!({
            "appointment": appointment,
            "sent": sent,
            "appointment_url": query_link(
                "/appointment",
                &[("key", appointment.id()), ("user", user.email.as_str())],
            ),
        }),
    ))
}

async fn list_all(
    State(st): State<AppState>,
    page: PageContext,
) -> Result<impl IntoResponse, AppError> {
    let all = appointments::list_appointments(st.conn().await?).await?;
    let rows: Vec<Value> = all
        .iter()
        .map(|appointment| {
            json!({
                "appointment": appointment,
                "latest": appointment.latest_date(),
                "url": query_link("/appointment", &[("key", appointment.id())]),
            })
        })
        .collect();
    Ok(page.render(&st, "appointment_list", json!({ "appointments": rows })))
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{
        db::appointments::{appointments_organized_by, new_appointment},
        models::{appointment::parse_datetime, invite::STATUS_MAYBE, invite::STATUS_YES},
        routes::_test_utils::{test_app, TestApp},
    };
    use http::{header, HeaderValue, StatusCode};

    pub(crate) fn form_body(description: &str, invitees: &str, dates: &[(&str, &str)]) -> String {
        let mut body = url::form_urlencoded::Serializer::new(String::new());
        body.append_pair("description", description)
            .append_pair("invitees", invitees);
        for (date, time) in dates {
            body.append_pair("date[]", date).append_pair("time[]", time);
        }
        body.finish()
    }

    async fn post_new(app: &TestApp, bearer: &HeaderValue, body: String) -> axum_test::TestResponse {
        app.server
            .post("/new")
            .add_header(header::AUTHORIZATION, bearer.clone())
            .text(body)
            .content_type("application/x-www-form-urlencoded")
            .await
    }

    /// Stores an appointment directly, bypassing the form and mail.
    pub(crate) async fn stored_appointment(
        app: &TestApp,
        organizer: &str,
        invitees: &[&str],
        dates: &[&str],
    ) -> anyhow::Result<AppointmentWithDates> {
        let appointment = AppointmentWithDates::new(
            "Team dinner".into(),
            "Organizer".into(),
            organizer.into(),
            invitees.iter().map(|s| s.to_string()).collect(),
            dates
                .iter()
                .map(|d| parse_datetime(d))
                .collect::<Result<Vec<_>, _>>()?,
        );
        let invites = appointment.initial_invites();
        Ok(new_appointment(app.conn().await?, appointment, invites).await?)
    }

    #[test_log::test(tokio::test)]
    async fn test_create_appointment() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let (user, bearer) = app.sign_in("olga@example.com").await?;
        let body = form_body(
            "Dinner",
            "a@x.com, b@x.com",
            &[("2024-01-01", "10:00"), ("2024-01-02", "11:00")],
        );

        let resp = post_new(&app, &bearer, body).await;

        resp.assert_status(StatusCode::SEE_OTHER);
        let created = appointments_organized_by(app.conn().await?, user.email.clone()).await?;
        assert_eq!(created.len(), 1);
        let appointment = &created[0];
        assert_eq!(appointment.invitee_list, vec!["a@x.com", "b@x.com"]);
        assert_eq!(
            resp.header(header::LOCATION),
            query_link(
                "/appointment",
                &[("key", appointment.id()), ("user", "olga@example.com")]
            )
            .as_str()
        );

        let invites = invites_for_appointment(app.conn().await?, appointment.id().to_string()).await?;
        assert_eq!(invites.len(), 6);
        for date in &appointment.date_list {
            let for_date: Vec<_> = invites.iter().filter(|i| i.date == *date).collect();
            let yes: Vec<_> = for_date.iter().filter(|i| i.status == STATUS_YES).collect();
            assert_eq!(yes.len(), 1);
            assert_eq!(yes[0].email, "olga@example.com");
            assert_eq!(for_date.iter().filter(|i| i.status == STATUS_MAYBE).count(), 2);
        }

        let sent = app.mail.sent();
        assert_eq!(sent.len(), 3);
        let overviews: Vec<_> = sent
            .iter()
            .filter(|m| m.subject == "Overview: Dinner")
            .collect();
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].to, "olga@example.com");
        let mut invited: Vec<_> = sent
            .iter()
            .filter(|m| m.subject == "Invitation: Dinner")
            .map(|m| m.to.as_str())
            .collect();
        invited.sort();
        assert_eq!(invited, vec!["a@x.com", "b@x.com"]);
        assert!(overviews[0].html.contains(appointment.id()));
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_create_rejects_bad_dates() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let (user, bearer) = app.sign_in("olga@example.com").await?;
        let body = form_body(
            "Dinner",
            "a@x.com",
            &[("2024-01-01", "10:00"), ("next tuesday", "11:00")],
        );

        let resp = post_new(&app, &bearer, body).await;

        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(appointments_organized_by(app.conn().await?, user.email).await?.is_empty());
        assert!(app.mail.sent().is_empty());
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_create_requires_invitees() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let (_, bearer) = app.sign_in("olga@example.com").await?;
        let body = form_body("Dinner", " , olga@example.com", &[("2024-01-01", "10:00")]);
        let resp = post_new(&app, &bearer, body).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_create_not_logged_in() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let resp = app
            .server
            .post("/new")
            .text(form_body("Dinner", "a@x.com", &[("2024-01-01", "10:00")]))
            .content_type("application/x-www-form-urlencoded")
            .await;
        resp.assert_status(StatusCode::FORBIDDEN);
        assert!(app.mail.sent().is_empty());
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_new_form_redirects_to_login() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let resp = app.server.get("/new").await;
        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header(header::LOCATION), "/login?continue=%2Fnew");
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_new_form_copies_appointment() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let (_, bearer) = app.sign_in("olga@example.com").await?;
        let appointment =
            stored_appointment(&app, "olga@example.com", &["a@x.com"], &["2024-03-04 18:30"]).await?;
        let resp = app
            .server
            .get(&query_link("/new", &[("key", appointment.id())]))
            .add_header(header::AUTHORIZATION, bearer.clone())
            .await;
        resp.assert_status_ok();
        let html = resp.text();
        assert!(html.contains("Team dinner"));
        assert!(html.contains("2024-03-04"));
        assert!(html.contains("18:30"));

        let missing = app
            .server
            .get("/new?key=nope")
            .add_header(header::AUTHORIZATION, bearer)
            .await;
        missing.assert_status_not_found();
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_show_appointment() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let appointment = stored_appointment(
            &app,
            "olga@example.com",
            &["a@x.com", "b@x.com"],
            &["2024-01-01 10:00"],
        )
        .await?;
        let resp = app
            .server
            .get(&query_link("/appointment", &[("key", appointment.id()), ("user", "a@x.com")]))
            .await;
        resp.assert_status_ok();
        let html = resp.text();
        assert!(html.contains("Team dinner"));
        assert!(html.contains("b@x.com"));
        assert!(html.contains("maybe"));
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_show_unknown_key() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let resp = app.server.get("/appointment?key=does-not-exist").await;
        resp.assert_status_not_found();
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_remove_by_other_user() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let (_, bearer) = app.sign_in("mallory@example.com").await?;
        let appointment =
            stored_appointment(&app, "olga@example.com", &["a@x.com"], &["2024-01-01 10:00"]).await?;

        let resp = app
            .server
            .post("/appointment/remove")
            .add_header(header::AUTHORIZATION, bearer)
            .form(&RemoveForm {
                key: appointment.id().to_string(),
            })
            .await;

        resp.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        let still_there =
            appointments::get_appointment(app.conn().await?, appointment.id().to_string()).await?;
        assert_eq!(still_there, appointment);
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_remove_by_organizer() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let (_, bearer) = app.sign_in("olga@example.com").await?;
        let appointment = stored_appointment(
            &app,
            "olga@example.com",
            &["a@x.com"],
            &["2024-01-01 10:00", "2024-01-02 10:00"],
        )
        .await?;

        let resp = app
            .server
            .post("/appointment/remove")
            .add_header(header::AUTHORIZATION, bearer)
            .form(&RemoveForm {
                key: appointment.id().to_string(),
            })
            .await;

        resp.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(resp.header(header::LOCATION), "/profile");
        let gone = appointments::get_appointment(app.conn().await?, appointment.id().to_string()).await;
        assert_eq!(gone.unwrap_err(), AppError::NotFound);
        let invites = invites_for_appointment(app.conn().await?, appointment.id().to_string()).await?;
        assert!(invites.is_empty());
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_list_requires_admin() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        stored_appointment(&app, "olga@example.com", &["a@x.com"], &["2024-01-01 10:00"]).await?;

        let anonymous = app.server.get("/appointments").await;
        anonymous.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(
            anonymous.header(header::LOCATION),
            "/login?continue=%2Fappointments"
        );

        let (_, bearer) = app.sign_in("olga@example.com").await?;
        let regular = app
            .server
            .get("/appointments")
            .add_header(header::AUTHORIZATION, bearer)
            .await;
        regular.assert_status(StatusCode::FORBIDDEN);

        let (_, admin) = app.sign_in("admin@appointments.test").await?;
        let listed = app
            .server
            .get("/appointments")
            .add_header(header::AUTHORIZATION, admin)
            .await;
        listed.assert_status_ok();
        assert!(listed.text().contains("Team dinner"));
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_list_is_translated() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let (_, admin) = app.sign_in("admin@appointments.test").await?;
        let german = app
            .server
            .get("/appointments?lang=de")
            .add_header(header::AUTHORIZATION, admin.clone())
            .await;
        assert!(german.text().contains("Termine"));
        let english = app
            .server
            .get("/appointments?lang=en")
            .add_header(header::AUTHORIZATION, admin)
            .await;
        assert!(!english.text().contains("Termine"));
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_confirm_resends_batch() -> anyhow::Result<()> {
        let app = test_app(appointments_router()).await?;
        let (_, bearer) = app.sign_in("olga@example.com").await?;
        let appointment = stored_appointment(
            &app,
            "olga@example.com",
            &["a@x.com", "b@x.com"],
            &["2024-01-01 10:00"],
        )
        .await?;

        let resp = app
            .server
            .get(&query_link("/confirm", &[("key", appointment.id())]))
            .add_header(header::AUTHORIZATION, bearer)
            .await;

        resp.assert_status_ok();
        assert_eq!(app.mail.sent().len(), 3);

        let (_, other) = app.sign_in("a@x.com").await?;
        let denied = app
            .server
            .get(&query_link("/confirm", &[("key", appointment.id())]))
            .add_header(header::AUTHORIZATION, other)
            .await;
        denied.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(app.mail.sent().len(), 3);
        Ok(())
    }
}
