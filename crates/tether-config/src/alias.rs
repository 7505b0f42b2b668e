use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix rewrite applied to aliased command names before resolution.
///
/// A name starting with `prefix` has that prefix replaced by `replacement`.
/// Directives are consulted in declaration order and the first match wins.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AliasDirective {
    /// Leading text that selects the directive.
    pub prefix: String,
    /// Text substituted for the prefix.
    #[serde(default)]
    pub replacement: String,
}

impl AliasDirective {
    /// Creates a new directive.
    #[must_use]
    pub fn new(prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            replacement: replacement.into(),
        }
    }
}

impl fmt::Display for AliasDirective {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}={}", self.prefix, self.replacement)
    }
}

/// Errors produced when parsing [`AliasDirective`] values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AliasDirectiveParseError {
    /// The `=` separating prefix and replacement was missing.
    #[error("alias '{0}' is missing the '=' separator")]
    MissingSeparator(String),
    /// The prefix was empty, which would match every name.
    #[error("alias '{0}' has an empty prefix")]
    EmptyPrefix(String),
}

impl FromStr for AliasDirective {
    type Err = AliasDirectiveParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (prefix, replacement) = input
            .split_once('=')
            .ok_or_else(|| AliasDirectiveParseError::MissingSeparator(input.to_owned()))?;
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(AliasDirectiveParseError::EmptyPrefix(input.to_owned()));
        }
        Ok(Self::new(prefix, replacement.trim()))
    }
}
