//! Structured argument view shared by OPEN, DATA and JSON calls.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::CallError;

/// Key/value arguments decoded from a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Map<String, Value>,
}

impl Arguments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object. Empty or blank content yields no arguments.
    pub(crate) fn parse(content: &[u8]) -> Result<Self, serde_json::Error> {
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        serde_json::from_slice::<Map<String, Value>>(content).map(Self::from)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String form of a scalar argument. Arrays, objects and `null` yield
    /// `None`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.values.get(key)? {
            Value::String(text) => Some(Cow::Borrowed(text.as_str())),
            Value::Number(number) => Some(Cow::Owned(number.to_string())),
            Value::Bool(flag) => Some(Cow::Owned(flag.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Fails on the first key that is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::MissingArgument`] naming the missing key.
    pub fn require(&self, keys: &[&str]) -> Result<(), CallError> {
        match keys.iter().find(|key| !self.values.contains_key(**key)) {
            Some(key) => Err(CallError::missing(*key)),
            None => Ok(()),
        }
    }

    /// Inserts or replaces an argument, returning the previous value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    /// Every value rendered as text; `null` stays `None`.
    #[must_use]
    pub fn stringed(&self) -> BTreeMap<String, Option<String>> {
        self.values
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::Null => None,
                    Value::String(text) => Some(text.clone()),
                    other => Some(other.to_string()),
                };
                (key.clone(), text)
            })
            .collect()
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    #[fixture]
    fn arguments() -> Arguments {
        Arguments::parse(br#"{"name":"x","count":3,"flag":true,"none":null,"tags":["a"]}"#)
            .expect("arguments")
    }

    #[rstest]
    #[case("name", Some("x"))]
    #[case("count", Some("3"))]
    #[case("flag", Some("true"))]
    #[case("none", None)]
    #[case("tags", None)]
    #[case("absent", None)]
    fn scalar_values_coerce_to_strings(
        arguments: Arguments,
        #[case] key: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(arguments.get_str(key).as_deref(), expected);
    }

    #[rstest]
    fn require_names_the_first_missing_key(arguments: Arguments) {
        assert_eq!(arguments.require(&["name", "count"]), Ok(()));
        assert_eq!(
            arguments.require(&["name", "page", "size"]),
            Err(CallError::missing("page"))
        );
    }

    #[rstest]
    fn stringed_values_keep_nulls(arguments: Arguments) {
        let stringed = arguments.stringed();
        assert_eq!(stringed.get("count"), Some(&Some("3".to_owned())));
        assert_eq!(stringed.get("none"), Some(&None));
        assert_eq!(stringed.get("tags"), Some(&Some(r#"["a"]"#.to_owned())));
    }

    #[test]
    fn blank_content_has_no_arguments() {
        assert!(Arguments::parse(b"  ").expect("blank").is_empty());
    }

    #[test]
    fn non_object_documents_are_rejected() {
        assert!(Arguments::parse(b"[1,2]").is_err());
    }

    #[rstest]
    fn put_replaces_values(mut arguments: Arguments) {
        let previous = arguments.put("name", "y");
        assert_eq!(previous, Some(json!("x")));
        assert_eq!(arguments.get("name"), Some(&json!("y")));
    }
}
