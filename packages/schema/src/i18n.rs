//! Translation table: locale → key → template string.
//!
//! Missing locale or key yields an empty string, never an error.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct TranslationTable {
    locale: String,
    messages: BTreeMap<String, BTreeMap<String, String>>,
}

impl TranslationTable {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            messages: BTreeMap::new(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    pub fn insert(
        &mut self,
        locale: impl Into<String>,
        key: impl Into<String>,
        template: impl Into<String>,
    ) {
        self.messages
            .entry(locale.into())
            .or_default()
            .insert(key.into(), template.into());
    }

    /// Look up `key` in the active locale.
    pub fn translate(&self, key: &str) -> String {
        self.messages
            .get(&self.locale)
            .and_then(|table| table.get(key))
            .cloned()
            .unwrap_or_default()
    }
}
