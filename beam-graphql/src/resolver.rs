use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use async_graphql::dynamic::{Field, SubscriptionField, Type};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;

use crate::error::BoxError;
use crate::injector::Injector;
use crate::pubsub::PubSub;

pub type LoadResult = Result<Option<Arc<dyn Resolver>>, BoxError>;
type Loader = Arc<dyn Fn() -> BoxFuture<'static, LoadResult> + Send + Sync>;

/// A unit of schema: contributes root fields and types when the schema is built.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;

    async fn register(
        &self,
        parts: &mut SchemaParts,
        injector: &Injector,
    ) -> Result<(), BoxError>;
}

/// Root fields and types collected from resolvers before the schema is sealed.
#[derive(Default)]
pub struct SchemaParts {
    pub query: Vec<Field>,
    pub mutation: Vec<Field>,
    pub subscription: Vec<SubscriptionField>,
    pub types: Vec<Type>,
    pubsub: Option<PubSub>,
}

impl SchemaParts {
    pub fn new(pubsub: Option<PubSub>) -> Self {
        Self {
            pubsub,
            ..Default::default()
        }
    }

    pub fn query(&mut self, field: Field) -> &mut Self {
        self.query.push(field);
        self
    }

    pub fn mutation(&mut self, field: Field) -> &mut Self {
        self.mutation.push(field);
        self
    }

    pub fn subscription(&mut self, field: SubscriptionField) -> &mut Self {
        self.subscription.push(field);
        self
    }

    pub fn register(&mut self, ty: impl Into<Type>) -> &mut Self {
        self.types.push(ty.into());
        self
    }

    /// Topic broker of the server, present only when pub/sub is configured.
    pub fn pubsub(&self) -> Option<&PubSub> {
        self.pubsub.as_ref()
    }
}

/// Deferred reference to a resolver, loaded once when the schema is built.
///
/// A reference that loads to `None` contributes nothing.
#[derive(Clone)]
pub struct ResolverRef {
    label: Arc<str>,
    load: Loader,
}

impl ResolverRef {
    /// Reference to an already constructed resolver.
    pub fn new(resolver: impl Resolver + 'static) -> Self {
        let label: Arc<str> = resolver.name().into();
        let resolver: Arc<dyn Resolver> = Arc::new(resolver);
        Self {
            label,
            load: Arc::new(move || {
                let resolver = resolver.clone();
                async move { Ok(Some(resolver)) }.boxed()
            }),
        }
    }

    pub fn lazy<F, Fut>(label: impl Into<Arc<str>>, load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult> + Send + 'static,
    {
        Self {
            label: label.into(),
            load: Arc::new(move || load().boxed()),
        }
    }

    /// Reference to a discovered file, resolved through the catalog by file stem.
    pub fn from_file(path: &Path, catalog: Arc<ResolverCatalog>) -> Self {
        let key = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let label: Arc<str> = path.display().to_string().into();

        Self::lazy(label.clone(), move || {
            let loader = catalog.loader(&key);
            let key = key.clone();
            let label = label.clone();
            async move {
                match loader {
                    Some(load) => load().await,
                    None => {
                        tracing::debug!(file = %label, key = %key, "No catalog entry for resolver file");
                        Ok(None)
                    }
                }
            }
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn load(&self) -> LoadResult {
        (self.load)().await
    }
}

impl fmt::Debug for ResolverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResolverRef").field(&self.label).finish()
    }
}

/// Host registry mapping resolver module keys to factories.
///
/// Discovered files are matched to entries by their file stem.
#[derive(Default)]
pub struct ResolverCatalog {
    entries: RwLock<HashMap<String, Loader>>,
}

impl ResolverCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F, Fut>(&self, key: impl Into<String>, factory: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult> + Send + 'static,
    {
        self.entries
            .write()
            .insert(key.into(), Arc::new(move || factory().boxed()));
    }

    /// Register a resolver constructed with `Default` on every load.
    pub fn with<R>(self, key: impl Into<String>) -> Self
    where
        R: Resolver + Default + 'static,
    {
        self.insert(key, || async {
            let resolver: Arc<dyn Resolver> = Arc::new(R::default());
            Ok(Some(resolver))
        });
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn loader(&self, key: &str) -> Option<Loader> {
        self.entries.read().get(key).cloned()
    }
}

impl fmt::Debug for ResolverCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.read().keys()).finish()
    }
}
