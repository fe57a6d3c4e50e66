//! Localized strings for channel names and separator messages.

use std::collections::HashMap;

use anyhow::Context as _;

/// Translation table embedded at build time, keyed by language then string id.
static TABLE_JSON: &str = include_str!("../i18n.json");

/// Fallback language for unknown channel languages and missing entries.
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone)]
pub struct I18n {
    table: HashMap<String, HashMap<String, String>>,
}

impl I18n {
    pub fn load() -> anyhow::Result<Self> {
        let table = serde_json::from_str(TABLE_JSON).context("failed to parse i18n table")?;
        Ok(Self { table })
    }

    /// Look up a string, falling back to English and finally to the key
    /// itself so a gap in the table never breaks a message.
    pub fn get<'a>(&'a self, key: &'a str, language: &str) -> &'a str {
        self.table
            .get(language)
            .and_then(|entries| entries.get(key))
            .or_else(|| {
                self.table
                    .get(DEFAULT_LANGUAGE)
                    .and_then(|entries| entries.get(key))
            })
            .map(String::as_str)
            .unwrap_or(key)
    }

    /// Languages with a translation table, sorted for stable command choices.
    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.table.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_language_resolves_directly() {
        let i18n = I18n::load().unwrap();
        assert_eq!(i18n.get("weapons", "fr"), "armes");
        assert_eq!(i18n.get("source", "es"), "Fuente");
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let i18n = I18n::load().unwrap();
        assert_eq!(i18n.get("heroes", "pt"), "heroes");
    }

    #[test]
    fn unknown_key_comes_back_verbatim() {
        let i18n = I18n::load().unwrap();
        assert_eq!(i18n.get("gadgets", "en"), "gadgets");
    }

    #[test]
    fn all_languages_present() {
        let i18n = I18n::load().unwrap();
        assert_eq!(i18n.languages(), vec!["de", "en", "es", "fr", "ro"]);
    }
}
