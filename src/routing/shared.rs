//! Hot-reloadable resolver handle.
//!
//! Readers load the current snapshot without locking; a reload publishes a
//! fully compiled `Resolver` in one atomic store. An evaluation that already
//! loaded a snapshot finishes against it.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::loader::ConfigError;
use crate::config::schema::RouterConfig;
use crate::routing::resolver::{RequestContext, Resolver, ResolverOutcome};

pub struct SharedResolver {
    inner: ArcSwap<Resolver>,
}

impl SharedResolver {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            inner: ArcSwap::new(Arc::new(resolver)),
        }
    }

    pub fn from_config(config: &RouterConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(Resolver::from_config(config)?))
    }

    /// Evaluate a request against the current snapshot.
    pub fn evaluate(&self, req: &RequestContext<'_>) -> ResolverOutcome {
        self.inner.load().evaluate(req)
    }

    /// Current snapshot, owned.
    pub fn load_full(&self) -> Arc<Resolver> {
        self.inner.load_full()
    }

    /// Atomically replace the resolver.
    pub fn update(&self, resolver: Resolver) {
        self.inner.store(Arc::new(resolver));
    }

    /// Compile `config` and publish it; the current snapshot is kept on error.
    pub fn reload(&self, config: &RouterConfig) -> Result<usize, ConfigError> {
        let resolver = Resolver::from_config(config)?;
        let rules = resolver.rules().rule_count();
        self.update(resolver);
        Ok(rules)
    }
}

impl std::fmt::Debug for SharedResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResolver")
            .field("inner", &*self.inner.load())
            .finish()
    }
}
