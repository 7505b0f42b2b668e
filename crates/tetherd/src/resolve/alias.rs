//! Prefix-based name rewriting.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tether_config::AliasDirective;

type Rewrite = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Rewrites names that start with a prefix.
#[derive(Clone)]
pub struct Alias {
    prefix: String,
    rewrite: Rewrite,
}

impl Alias {
    /// Alias applying `rewrite` to the full name of every match.
    pub fn new(
        prefix: impl Into<String>,
        rewrite: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            rewrite: Arc::new(rewrite),
        }
    }

    /// Alias replacing the prefix with `replacement`.
    pub fn replace_prefix(prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let replacement = replacement.into();
        let stripped = prefix.clone();
        Self::new(prefix, move |name| {
            let rest = name.strip_prefix(stripped.as_str()).unwrap_or(name);
            format!("{replacement}{rest}")
        })
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }

    /// Rewritten name, or `None` when the prefix does not match.
    #[must_use]
    pub fn apply(&self, name: &str) -> Option<String> {
        self.matches(name).then(|| (self.rewrite)(name))
    }
}

impl fmt::Debug for Alias {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Alias")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl From<&AliasDirective> for Alias {
    fn from(directive: &AliasDirective) -> Self {
        Self::replace_prefix(directive.prefix.clone(), directive.replacement.clone())
    }
}

/// Aliases in registration order; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct AliasSet {
    aliases: Vec<Alias>,
}

impl AliasSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alias: Alias) -> &mut Self {
        self.aliases.push(alias);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Applies the first matching alias; unmatched names pass through.
    #[must_use]
    pub fn unalias<'a>(&self, name: &'a str) -> Cow<'a, str> {
        self.aliases
            .iter()
            .find_map(|alias| alias.apply(name))
            .map_or(Cow::Borrowed(name), Cow::Owned)
    }
}

impl<'a> FromIterator<&'a AliasDirective> for AliasSet {
    fn from_iter<I: IntoIterator<Item = &'a AliasDirective>>(iter: I) -> Self {
        Self {
            aliases: iter.into_iter().map(Alias::from).collect(),
        }
    }
}
