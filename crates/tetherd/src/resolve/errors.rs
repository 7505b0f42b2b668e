use thiserror::Error;

/// Failure of the symbol lookup collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no symbol named '{name}' is registered")]
    NotFound { name: String },
}

/// Errors raised while resolving a command name.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The lookup collaborator did not know the name.
    #[error("invalid argument: cannot resolve '{name}'")]
    UnknownSymbol {
        name: String,
        #[source]
        source: LookupError,
    },
    /// Following supersession revisited a symbol.
    #[error("supersession cycle: {}", .chain.join(" -> "))]
    SupersessionCycle { chain: Vec<String> },
    /// The instance provider could not supply the target.
    #[error("cannot instantiate '{name}': {message}")]
    Instantiation { name: String, message: String },
}

impl ResolveError {
    pub fn unknown(name: impl Into<String>, source: LookupError) -> Self {
        Self::UnknownSymbol {
            name: name.into(),
            source,
        }
    }

    pub fn instantiation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Instantiation {
            name: name.into(),
            message: message.into(),
        }
    }
}
