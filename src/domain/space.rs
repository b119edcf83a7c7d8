//! Spaces and their locales.

use serde::Deserialize;

use super::metadata::Metadata;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Locale {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone)]
pub struct Space {
    pub metadata: Metadata,
    pub name: Option<String>,
    pub locales: Vec<Locale>,
    default_locale: Option<usize>,
}

impl Space {
    /// Build a space; the default locale is the flagged one, else the first.
    pub fn new(metadata: Metadata, name: Option<String>, locales: Vec<Locale>) -> Self {
        let default_locale = locales
            .iter()
            .position(|locale| locale.default)
            .or_else(|| (!locales.is_empty()).then_some(0));
        Self {
            metadata,
            name,
            locales,
            default_locale,
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn default_locale(&self) -> Option<&Locale> {
        self.default_locale.and_then(|index| self.locales.get(index))
    }

    pub fn locale(&self, code: &str) -> Option<&Locale> {
        self.locales.iter().find(|locale| locale.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ResourceKind;

    fn locale(code: &str, default: bool) -> Locale {
        Locale {
            code: code.into(),
            name: code.into(),
            default,
        }
    }

    #[test]
    fn flagged_locale_is_default() {
        let space = Space::new(
            Metadata::new("s", ResourceKind::Space),
            Some("Site".into()),
            vec![locale("de-DE", false), locale("en-US", true)],
        );
        assert_eq!(space.default_locale().map(|l| l.code.as_str()), Some("en-US"));
    }

    #[test]
    fn first_locale_is_default_when_none_flagged() {
        let space = Space::new(
            Metadata::new("s", ResourceKind::Space),
            None,
            vec![locale("de-DE", false), locale("en-US", false)],
        );
        assert_eq!(space.default_locale().map(|l| l.code.as_str()), Some("de-DE"));
        assert!(space.locale("en-US").is_some());
    }

    #[test]
    fn no_locales_means_no_default() {
        let space = Space::new(Metadata::new("s", ResourceKind::Space), None, Vec::new());
        assert!(space.default_locale().is_none());
    }
}
