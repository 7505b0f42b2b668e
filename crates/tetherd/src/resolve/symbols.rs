//! Startup-populated registry of executable targets.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::conventions::{DeprecatedCommand, Job, TypedCommand};

use super::{LookupError, ResolveError};

/// Execution convention of a registered symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    TypedCommand,
    Job,
    DeprecatedCommand,
    /// Known name without an execution convention.
    Opaque,
}

impl TargetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TypedCommand => "typed command",
            Self::Job => "job",
            Self::DeprecatedCommand => "deprecated command",
            Self::Opaque => "opaque",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Lookup result for one name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    name: Arc<str>,
    kind: TargetKind,
    superseded_by: Option<Arc<str>>,
}

impl Symbol {
    #[must_use]
    pub fn new(name: &str, kind: TargetKind) -> Self {
        Self {
            name: Arc::from(name),
            kind,
            superseded_by: None,
        }
    }

    /// Declares the symbol replacing this one.
    #[must_use]
    pub fn superseded_by(mut self, name: &str) -> Self {
        self.superseded_by = Some(Arc::from(name));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    #[must_use]
    pub fn replacement(&self) -> Option<&str> {
        self.superseded_by.as_deref()
    }
}

/// Instantiated target ready for dispatch.
#[derive(Clone)]
pub enum Target {
    TypedCommand(Arc<dyn TypedCommand>),
    Job(Arc<dyn Job>),
    DeprecatedCommand(Arc<dyn DeprecatedCommand>),
    Opaque,
}

impl Target {
    #[must_use]
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::TypedCommand(_) => TargetKind::TypedCommand,
            Self::Job(_) => TargetKind::Job,
            Self::DeprecatedCommand(_) => TargetKind::DeprecatedCommand,
            Self::Opaque => TargetKind::Opaque,
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("Target").field(&self.kind()).finish()
    }
}

/// Maps a name to its symbol. Lookups may be expensive.
pub trait SymbolLookup: Send + Sync {
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] for unknown names.
    fn lookup(&self, name: &str) -> Result<Symbol, LookupError>;
}

/// Supplies the executable instance behind a symbol.
pub trait InstanceProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ResolveError::Instantiation`] when no instance is available.
    fn instantiate(&self, symbol: &Symbol) -> Result<Target, ResolveError>;
}

struct Registration {
    kind: TargetKind,
    factory: Arc<dyn Fn() -> Target + Send + Sync>,
    superseded_by: Option<Arc<str>>,
}

/// Registry of executable targets, populated before the bridge starts.
#[derive(Default)]
pub struct SymbolTable {
    entries: HashMap<String, Registration>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a target kind with a factory producing its instance.
    pub fn register_with(
        &mut self,
        name: impl Into<String>,
        kind: TargetKind,
        factory: impl Fn() -> Target + Send + Sync + 'static,
    ) -> &mut Self {
        let name = name.into();
        let superseded_by = self
            .entries
            .get(&name)
            .and_then(|existing| existing.superseded_by.clone());
        self.entries.insert(
            name,
            Registration {
                kind,
                factory: Arc::new(factory),
                superseded_by,
            },
        );
        self
    }

    pub fn register_typed_command(
        &mut self,
        name: impl Into<String>,
        command: impl TypedCommand + 'static,
    ) -> &mut Self {
        let command: Arc<dyn TypedCommand> = Arc::new(command);
        self.register_with(name, TargetKind::TypedCommand, move || {
            Target::TypedCommand(Arc::clone(&command))
        })
    }

    pub fn register_job(&mut self, name: impl Into<String>, job: impl Job + 'static) -> &mut Self {
        let job: Arc<dyn Job> = Arc::new(job);
        self.register_with(name, TargetKind::Job, move || Target::Job(Arc::clone(&job)))
    }

    pub fn register_deprecated(
        &mut self,
        name: impl Into<String>,
        command: impl DeprecatedCommand + 'static,
    ) -> &mut Self {
        let command: Arc<dyn DeprecatedCommand> = Arc::new(command);
        self.register_with(name, TargetKind::DeprecatedCommand, move || {
            Target::DeprecatedCommand(Arc::clone(&command))
        })
    }

    /// Registers a name that resolves but cannot be executed.
    pub fn register_opaque(&mut self, name: impl Into<String>) -> &mut Self {
        self.register_with(name, TargetKind::Opaque, || Target::Opaque)
    }

    /// Declares that `old` is replaced by `new`. An unregistered `old` is
    /// added as an opaque forwarding name.
    pub fn supersede(&mut self, old: impl Into<String>, new: &str) -> &mut Self {
        let old = old.into();
        if !self.entries.contains_key(&old) {
            self.register_opaque(old.clone());
        }
        if let Some(entry) = self.entries.get_mut(&old) {
            entry.superseded_by = Some(Arc::from(new));
        }
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        formatter
            .debug_struct("SymbolTable")
            .field("names", &names)
            .finish()
    }
}

impl SymbolLookup for SymbolTable {
    fn lookup(&self, name: &str) -> Result<Symbol, LookupError> {
        let entry = self.entries.get(name).ok_or_else(|| LookupError::NotFound {
            name: name.to_owned(),
        })?;
        Ok(Symbol {
            name: Arc::from(name),
            kind: entry.kind,
            superseded_by: entry.superseded_by.clone(),
        })
    }
}

impl InstanceProvider for SymbolTable {
    fn instantiate(&self, symbol: &Symbol) -> Result<Target, ResolveError> {
        let entry = self
            .entries
            .get(symbol.name())
            .ok_or_else(|| ResolveError::instantiation(symbol.name(), "symbol is not registered"))?;
        Ok((entry.factory)())
    }
}
