use std::sync::Arc;

use axum_template::engine::Engine;
use chrono::{
    format::{Item, StrftimeItems},
    NaiveDateTime,
};
use handlebars::{
    html_escape, Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
    TemplateError,
};

use crate::i18n::Catalog;

pub type AppEngine = Engine<Handlebars<'static>>;

const TEMPLATES: &[(&str, &str)] = &[
    ("header", include_str!("../templates/header.hbs")),
    ("footer", include_str!("../templates/footer.hbs")),
    ("index", include_str!("../templates/index.hbs")),
    ("not_found", include_str!("../templates/not_found.hbs")),
    ("login", include_str!("../templates/login.hbs")),
    ("register", include_str!("../templates/register.hbs")),
    ("new", include_str!("../templates/new.hbs")),
    ("appointment", include_str!("../templates/appointment.hbs")),
    ("appointment_list", include_str!("../templates/appointment_list.hbs")),
    ("availability", include_str!("../templates/availability.hbs")),
    ("setavailability", include_str!("../templates/setavailability.hbs")),
    ("confirm", include_str!("../templates/confirm.hbs")),
    ("profile", include_str!("../templates/profile.hbs")),
    ("photo", include_str!("../templates/photo.hbs")),
    ("search", include_str!("../templates/search.hbs")),
    ("too_large", include_str!("../templates/too_large.hbs")),
    ("mail/overview", include_str!("../templates/mail/overview.hbs")),
    ("mail/invitation", include_str!("../templates/mail/invitation.hbs")),
];

pub fn make_engine(catalog: Arc<Catalog>) -> Result<AppEngine, TemplateError> {
    let mut hbs = Handlebars::new();
    hbs.register_helper("t", Box::new(Translate { catalog }));
    hbs.register_helper("date_format", Box::new(DateFormat));
    for (name, source) in TEMPLATES {
        hbs.register_template_string(name, source)?;
    }
    Ok(Engine::from(hbs))
}

/// `{{t "text"}}`: translates `text` into the `locale` of the root render data.
struct Translate {
    catalog: Arc<Catalog>,
}

impl HelperDef for Translate {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = h.param(0).and_then(|p| p.value().as_str()).unwrap_or("");
        let locale = ctx
            .data()
            .get("locale")
            .and_then(|l| l.as_str())
            .unwrap_or("");
        out.write(&html_escape(self.catalog.gettext(locale, text)))?;
        Ok(())
    }
}

/// `{{date_format value "%d.%m.%Y"}}`: empty for a missing date, the raw value without a format.
struct DateFormat;

impl HelperDef for DateFormat {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let date = h.param(0).and_then(|p| p.value().as_str()).unwrap_or("");
        let format = h.param(1).and_then(|p| p.value().as_str());
        out.write(&html_escape(&format_date(date, format)))?;
        Ok(())
    }
}

fn format_date(date: &str, format: Option<&str>) -> String {
    if date.is_empty() {
        return String::new();
    }
    let Some(format) = format.filter(|f| !f.is_empty()) else {
        return date.to_string();
    };
    let Ok(parsed) = date.parse::<NaiveDateTime>() else {
        return date.to_string();
    };
    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        tracing::warn!("invalid date format in template: {:?}", format);
        return date.to_string();
    }
    parsed.format_with_items(items.into_iter()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_template::TemplateEngine;
    use serde_json::json;
    use std::collections::HashMap;

    fn engine() -> AppEngine {
        let mut catalog = Catalog::default();
        catalog.insert(
            "de",
            HashMap::from([("Appointments".to_string(), "Termine".to_string())]),
        );
        make_engine(Arc::new(catalog)).unwrap()
    }

    #[test]
    fn date_format_variants() {
        assert_eq!(format_date("", Some("%Y")), "");
        assert_eq!(format_date("2024-01-02T10:30:00", None), "2024-01-02T10:30:00");
        assert_eq!(
            format_date("2024-01-02T10:30:00", Some("%d.%m.%Y %H:%M")),
            "02.01.2024 10:30"
        );
        assert_eq!(format_date("yesterday", Some("%Y")), "yesterday");
        assert_eq!(format_date("2024-01-02T10:30:00", Some("%Q")), "2024-01-02T10:30:00");
    }

    #[test]
    fn every_template_registers() {
        let engine = engine();
        let html = engine
            .render("not_found", json!({"locale": "", "settings": {"app_name": "x"}}))
            .unwrap();
        assert!(html.contains("Page not found"));
    }

    #[test]
    fn translation_follows_render_locale() {
        let engine = engine();
        let data = |locale: &str| {
            json!({
                "locale": locale,
                "appointments": [],
                "settings": {"app_name": "x"},
            })
        };
        let german = engine.render("appointment_list", data("de")).unwrap();
        let english = engine.render("appointment_list", data("en")).unwrap();
        assert!(german.contains("Termine"));
        assert!(english.contains("Appointments"));
        assert!(!english.contains("Termine"));
    }
}
