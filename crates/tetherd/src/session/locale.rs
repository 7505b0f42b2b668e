//! Locale-derived formatting helpers.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Errors raised while deriving a locale from session entries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocaleError {
    #[error("no language found in session")]
    MissingLanguage,
}

/// Language and optional country.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    language: String,
    country: Option<String>,
}

impl Locale {
    /// Normalises the language to lower case and the country to upper case.
    #[must_use]
    pub fn new(language: &str, country: Option<&str>) -> Self {
        Self {
            language: language.trim().to_ascii_lowercase(),
            country: country
                .map(str::trim)
                .filter(|country| !country.is_empty())
                .map(str::to_ascii_uppercase),
        }
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.country {
            Some(country) => write!(formatter, "{}_{country}", self.language),
            None => formatter.write_str(&self.language),
        }
    }
}

/// Decimal and grouping separators for a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    decimal: char,
    grouping: char,
}

impl NumberFormat {
    #[must_use]
    pub fn for_locale(locale: &Locale) -> Self {
        let (decimal, grouping) = match (locale.language(), locale.country()) {
            ("de" | "it", Some("CH")) => ('.', '\''),
            ("de" | "es" | "it" | "nl" | "pt" | "da" | "id" | "tr" | "el", _) => (',', '.'),
            ("fr" | "ru" | "pl" | "cs" | "sk" | "sv" | "nb" | "fi" | "uk" | "hu", _) => {
                (',', '\u{a0}')
            }
            _ => ('.', ','),
        };
        Self { decimal, grouping }
    }

    #[must_use]
    pub fn decimal_separator(&self) -> char {
        self.decimal
    }

    #[must_use]
    pub fn grouping_separator(&self) -> char {
        self.grouping
    }

    /// Formats with grouped thousands and a fixed number of fraction digits.
    #[must_use]
    pub fn format(&self, value: f64, fraction_digits: usize) -> String {
        let rendered = format!("{:.*}", fraction_digits, value.abs());
        let (integer, fraction) = match rendered.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (rendered.as_str(), None),
        };

        let mut out = String::with_capacity(rendered.len() + integer.len() / 3 + 1);
        if value.is_sign_negative() && rendered.bytes().any(|byte| matches!(byte, b'1'..=b'9')) {
            out.push('-');
        }
        for (index, digit) in integer.chars().enumerate() {
            if index > 0 && (integer.len() - index) % 3 == 0 {
                out.push(self.grouping);
            }
            out.push(digit);
        }
        if let Some(fraction) = fraction {
            out.push(self.decimal);
            out.push_str(fraction);
        }
        out
    }
}

/// Case- and accent-insensitive string ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collator {
    locale: Locale,
}

impl Collator {
    #[must_use]
    pub fn for_locale(locale: &Locale) -> Self {
        Self {
            locale: locale.clone(),
        }
    }

    #[must_use]
    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Key with compatibility decomposition applied, combining marks removed
    /// and letters lower-cased.
    #[must_use]
    pub fn sort_key(&self, text: &str) -> String {
        text.nfkd()
            .filter(|ch| !is_combining_mark(*ch))
            .flat_map(char::to_lowercase)
            .collect()
    }

    #[must_use]
    pub fn compare(&self, left: &str, right: &str) -> Ordering {
        self.sort_key(left).cmp(&self.sort_key(right))
    }

    #[must_use]
    pub fn equals(&self, left: &str, right: &str) -> bool {
        self.compare(left, right) == Ordering::Equal
    }
}
