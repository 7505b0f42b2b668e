use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::{Collator, Locale, LocaleError, NumberFormat, Session};

const LANGUAGE_KEY: &str = "lang";
const COUNTRY_KEY: &str = "country";

#[derive(Debug)]
struct LocaleCache {
    locale: Locale,
    number_format: Option<NumberFormat>,
    collator: Option<Collator>,
}

/// Session view handed to jobs.
///
/// The locale is derived from the `lang` and `country` entries. Formatting
/// helpers are built on first use and rebuilt after either entry changes.
#[derive(Debug)]
pub struct SessionAdapter {
    session: Arc<dyn Session>,
    cache: Mutex<Option<LocaleCache>>,
}

impl SessionAdapter {
    #[must_use]
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self {
            session,
            cache: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.session.id()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.session.get(key)
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.session.set(key, value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.session.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.session.contains(key)
    }

    pub fn touch(&self) {
        self.session.touch();
    }

    /// # Errors
    ///
    /// Returns [`LocaleError::MissingLanguage`] when no `lang` entry exists.
    pub fn locale(&self) -> Result<Locale, LocaleError> {
        self.with_cache(|cache| cache.locale.clone())
    }

    /// # Errors
    ///
    /// As for [`SessionAdapter::locale`].
    pub fn number_format(&self) -> Result<NumberFormat, LocaleError> {
        self.with_cache(|cache| {
            *cache
                .number_format
                .get_or_insert_with(|| NumberFormat::for_locale(&cache.locale))
        })
    }

    /// # Errors
    ///
    /// As for [`SessionAdapter::locale`].
    pub fn collator(&self) -> Result<Collator, LocaleError> {
        self.with_cache(|cache| {
            cache
                .collator
                .get_or_insert_with(|| Collator::for_locale(&cache.locale))
                .clone()
        })
    }

    /// `{"id", "accesstime", "data"}` snapshot of the session.
    #[must_use]
    pub fn render(&self) -> Map<String, Value> {
        let data: Map<String, Value> = self.session.entries().into_iter().collect();
        let rendered = json!({
            "id": self.session.id(),
            "accesstime": format_time(self.session.last_accessed()),
            "data": data,
        });
        match rendered {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn current_locale(&self) -> Result<Locale, LocaleError> {
        let language = self
            .session
            .get(LANGUAGE_KEY)
            .and_then(|value| value.as_str().map(str::to_owned))
            .filter(|language| !language.trim().is_empty())
            .ok_or(LocaleError::MissingLanguage)?;
        let country = self
            .session
            .get(COUNTRY_KEY)
            .and_then(|value| value.as_str().map(str::to_owned));
        Ok(Locale::new(&language, country.as_deref()))
    }

    fn with_cache<R>(&self, f: impl FnOnce(&mut LocaleCache) -> R) -> Result<R, LocaleError> {
        let locale = self.current_locale()?;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.as_ref().is_none_or(|cached| cached.locale != locale) {
            *cache = Some(LocaleCache {
                locale,
                number_format: None,
                collator: None,
            });
        }
        match cache.as_mut() {
            Some(cached) => Ok(f(cached)),
            None => Err(LocaleError::MissingLanguage),
        }
    }
}

fn format_time(at: SystemTime) -> Value {
    OffsetDateTime::from(at)
        .format(&Rfc3339)
        .map_or(Value::Null, Value::String)
}
