//! English/French name pairs used by every lookup table.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl Language {
    /// Pick a language from an `Accept-Language` header value.
    ///
    /// Only the primary tag of the first entry is considered.
    pub fn from_accept_language(header: &str) -> Language {
        let first = header.split(',').next().unwrap_or_default().trim();
        let primary = first.split(['-', ';']).next().unwrap_or_default();
        if primary.eq_ignore_ascii_case("fr") {
            Language::Fr
        } else {
            Language::En
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub en: String,
    pub fr: String,
}

impl Translation {
    pub fn new(en: impl Into<String>, fr: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            fr: fr.into(),
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::En => &self.en,
            Language::Fr => &self.fr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_language() {
        assert_eq!(Language::from_accept_language("fr-CA,fr;q=0.9"), Language::Fr);
        assert_eq!(Language::from_accept_language("en-US"), Language::En);
        assert_eq!(Language::from_accept_language(""), Language::En);
        assert_eq!(Language::from_accept_language("FR"), Language::Fr);
    }

    #[test]
    fn picks_translation() {
        let name = Translation::new("Balsam Fir", "Sapin baumier");
        assert_eq!(name.get(Language::Fr), "Sapin baumier");
        assert_eq!(name.get(Language::En), "Balsam Fir");
    }
}
