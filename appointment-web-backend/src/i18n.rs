//! Message catalogs keyed by locale.
//!
//! The locale is always passed in by the caller; nothing here holds a "current" language.
//! Unknown locales and missing messages translate to the message itself.

use std::{collections::HashMap, fs, path::Path};

type Messages = HashMap<String, String>;

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    locales: HashMap<String, Messages>,
}

impl Catalog {
    /// Loads every `<locale>.json` file in `dir`. Files that fail to load are skipped.
    pub fn load_dir(dir: &Path) -> Self {
        let mut catalog = Self::default();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("no message catalogs loaded from {:?}: {}", dir, e);
                return catalog;
            }
        };
        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(locale) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let loaded = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str::<Messages>(&raw).map_err(|e| e.to_string()));
            match loaded {
                Ok(messages) => {
                    tracing::info!("loaded {} messages for locale {}", messages.len(), locale);
                    catalog.insert(locale, messages);
                }
                Err(e) => tracing::warn!("skipping catalog {:?}: {}", path, e),
            }
        }
        catalog
    }

    pub fn insert(&mut self, locale: &str, messages: Messages) {
        self.locales.insert(normalize(locale), messages);
    }

    pub fn gettext<'a>(&'a self, locale: &str, text: &'a str) -> &'a str {
        self.messages_for(locale)
            .and_then(|messages| messages.get(text))
            .map(String::as_str)
            .unwrap_or(text)
    }

    /// Exact match first (`pt_br`), then the primary language (`pt`).
    fn messages_for(&self, locale: &str) -> Option<&Messages> {
        if locale.trim().is_empty() {
            return None;
        }
        let locale = normalize(locale);
        self.locales.get(&locale).or_else(|| {
            locale
                .split('_')
                .next()
                .and_then(|primary| self.locales.get(primary))
        })
    }
}

fn normalize(locale: &str) -> String {
    locale.trim().replace('-', "_").to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn german() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.insert(
            "de",
            HashMap::from([("Invitation".to_string(), "Einladung".to_string())]),
        );
        catalog
    }

    #[test]
    fn translates_known_messages() {
        let catalog = german();
        assert_eq!(catalog.gettext("de", "Invitation"), "Einladung");
        assert_eq!(catalog.gettext("de-AT", "Invitation"), "Einladung");
        assert_eq!(catalog.gettext("DE", "Invitation"), "Einladung");
    }

    #[test]
    fn falls_back_to_identity() {
        let catalog = german();
        assert_eq!(catalog.gettext("fr", "Invitation"), "Invitation");
        assert_eq!(catalog.gettext("", "Invitation"), "Invitation");
        assert_eq!(catalog.gettext("de", "Overview"), "Overview");
    }

    #[test]
    fn missing_directory_gives_empty_catalog() {
        let catalog = Catalog::load_dir(Path::new("/nonexistent/locale/dir"));
        assert_eq!(catalog.gettext("de", "Invitation"), "Invitation");
    }

    #[test]
    fn loads_json_catalogs_and_skips_broken_ones() {
        let dir = std::env::temp_dir().join(format!("catalogs-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("de.json"), r#"{"Invitation": "Einladung"}"#).unwrap();
        fs::write(dir.join("fr.json"), "not json").unwrap();
        let catalog = Catalog::load_dir(&dir);
        assert_eq!(catalog.gettext("de", "Invitation"), "Einladung");
        assert_eq!(catalog.gettext("fr", "Invitation"), "Invitation");
        fs::remove_dir_all(&dir).ok();
    }
}
