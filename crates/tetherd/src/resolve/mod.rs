//! Command name resolution.
//!
//! A name goes through alias rewriting, a cached symbol lookup, and then
//! supersession: while the symbol names a replacement, the replacement is
//! resolved instead. The final symbol is instantiated through an
//! [`InstanceProvider`].

mod alias;
mod cache;
mod errors;
mod symbols;

use std::borrow::Cow;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, info};

use self::cache::SymbolCache;

pub use self::alias::{Alias, AliasSet};
pub use self::errors::{LookupError, ResolveError};
pub use self::symbols::{
    InstanceProvider, Symbol, SymbolLookup, SymbolTable, Target, TargetKind,
};

const RESOLVE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::resolve");

/// A fully resolved name.
#[derive(Debug, Clone)]
pub struct Resolved {
    symbol: Symbol,
    target: Target,
}

impl Resolved {
    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    #[must_use]
    pub fn into_parts(self) -> (Symbol, Target) {
        (self.symbol, self.target)
    }
}

/// Resolves aliased command names to executable targets.
///
/// Shared by every connection; the cache is the only mutable state.
pub struct CommandResolver {
    aliases: AliasSet,
    cache: SymbolCache,
    lookup: Arc<dyn SymbolLookup>,
    instances: Arc<dyn InstanceProvider>,
}

impl CommandResolver {
    #[must_use]
    pub fn new(
        aliases: AliasSet,
        lookup: Arc<dyn SymbolLookup>,
        instances: Arc<dyn InstanceProvider>,
        cache_capacity: NonZeroUsize,
    ) -> Self {
        Self {
            aliases,
            cache: SymbolCache::new(cache_capacity),
            lookup,
            instances,
        }
    }

    /// Resolver whose lookups and instances both come from `table`.
    #[must_use]
    pub fn from_table(aliases: AliasSet, table: Arc<SymbolTable>, cache_capacity: NonZeroUsize) -> Self {
        let lookup: Arc<dyn SymbolLookup> = Arc::clone(&table) as Arc<dyn SymbolLookup>;
        Self::new(aliases, lookup, table, cache_capacity)
    }

    #[must_use]
    pub fn unalias<'a>(&self, aliased_name: &'a str) -> Cow<'a, str> {
        self.aliases.unalias(aliased_name)
    }

    /// Resolves the name to the final symbol of its supersession chain.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownSymbol`] when any name in the chain is
    /// unknown and [`ResolveError::SupersessionCycle`] when the chain loops.
    pub fn resolve_symbol(&self, aliased_name: &str) -> Result<Symbol, ResolveError> {
        let name = self.unalias(aliased_name);
        let mut symbol = self.lookup_cached(&name)?;
        let mut chain = vec![symbol.name().to_owned()];
        let mut visited: HashSet<String> = chain.iter().cloned().collect();

        while let Some(replacement) = symbol.replacement() {
            let replacement = replacement.to_owned();
            chain.push(replacement.clone());
            if !visited.insert(replacement.clone()) {
                return Err(ResolveError::SupersessionCycle { chain });
            }
            info!(
                target: RESOLVE_TARGET,
                superseded = symbol.name(),
                replacement = %replacement,
                "substituting superseded command"
            );
            symbol = self.lookup_cached(&replacement)?;
        }
        Ok(symbol)
    }

    /// Resolves the name and instantiates its target.
    ///
    /// # Errors
    ///
    /// As for [`CommandResolver::resolve_symbol`], plus
    /// [`ResolveError::Instantiation`] from the instance provider.
    pub fn resolve(&self, aliased_name: &str) -> Result<Resolved, ResolveError> {
        let symbol = self.resolve_symbol(aliased_name)?;
        let target = self.instances.instantiate(&symbol)?;
        Ok(Resolved { symbol, target })
    }

    /// Number of cached names.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached symbol.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn lookup_cached(&self, name: &str) -> Result<Symbol, ResolveError> {
        if let Some(symbol) = self.cache.get(name) {
            return Ok(symbol);
        }
        debug!(target: RESOLVE_TARGET, name, "symbol cache miss");
        let symbol = self
            .lookup
            .lookup(name)
            .map_err(|source| ResolveError::unknown(name, source))?;
        self.cache.insert(name, symbol.clone());
        Ok(symbol)
    }
}

impl std::fmt::Debug for CommandResolver {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CommandResolver")
            .field("aliases", &self.aliases)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
