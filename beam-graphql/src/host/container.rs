use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use tokio::sync::OnceCell;

use crate::error::BoxError;
use crate::injector::{ContainerError, Instance, Resolve};

type Factory = Arc<dyn Fn(Container) -> BoxFuture<'static, Result<Instance, BoxError>> + Send + Sync>;

struct Binding {
    type_name: &'static str,
    factory: Option<Factory>,
    instance: OnceCell<Instance>,
}

/// Type-keyed service container.
///
/// Singletons are built on first `make` and shared afterwards.
#[derive(Clone, Default)]
pub struct Container {
    bindings: Arc<RwLock<HashMap<TypeId, Arc<Binding>>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a lazily constructed singleton. Rebinding replaces the previous entry.
    pub fn singleton<T, F, Fut>(&self, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        let factory: Factory = Arc::new(move |container| {
            factory(container)
                .map(|built| built.map(|value| Arc::new(value) as Instance))
                .boxed()
        });
        self.bind::<T>(Binding {
            type_name: type_name::<T>(),
            factory: Some(factory),
            instance: OnceCell::new(),
        });
    }

    /// Bind an already constructed value.
    pub fn instance<T: Any + Send + Sync>(&self, value: T) {
        let instance: Instance = Arc::new(value);
        self.bind::<T>(Binding {
            type_name: type_name::<T>(),
            factory: None,
            instance: OnceCell::new_with(Some(instance)),
        });
    }

    fn bind<T: Any>(&self, binding: Binding) {
        self.bindings
            .write()
            .insert(TypeId::of::<T>(), Arc::new(binding));
    }

    pub fn is_bound<T: Any>(&self) -> bool {
        self.bindings.read().contains_key(&TypeId::of::<T>())
    }

    /// Whether the binding for `T` has been constructed yet.
    pub fn is_resolved<T: Any>(&self) -> bool {
        self.bindings
            .read()
            .get(&TypeId::of::<T>())
            .is_some_and(|binding| binding.instance.initialized())
    }

    pub async fn make<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ContainerError> {
        let instance = self.resolve(TypeId::of::<T>(), type_name::<T>()).await?;
        instance
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch(type_name::<T>()))
    }
}

#[async_trait::async_trait]
impl Resolve for Container {
    async fn resolve(
        &self,
        token: TypeId,
        type_name: &'static str,
    ) -> Result<Instance, ContainerError> {
        let binding = self
            .bindings
            .read()
            .get(&token)
            .cloned()
            .ok_or(ContainerError::NotBound(type_name))?;

        let instance = binding
            .instance
            .get_or_try_init(|| async {
                let Some(factory) = binding.factory.as_ref() else {
                    return Err(ContainerError::NotBound(binding.type_name));
                };
                tracing::debug!(binding = binding.type_name, "Constructing singleton");
                factory(self.clone())
                    .await
                    .map_err(|source| ContainerError::Factory {
                        type_name: binding.type_name,
                        source,
                    })
            })
            .await?;

        Ok(instance.clone())
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bindings = self.bindings.read();
        f.debug_list()
            .entries(bindings.values().map(|binding| binding.type_name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::injector::Injector;

    #[derive(Debug)]
    struct Mailer {
        from: String,
    }

    #[tokio::test]
    async fn test_singleton_is_built_once_on_first_make() {
        let container = Container::new();
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        container.singleton(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Ok(Mailer {
                    from: "noreply@example.com".to_string(),
                })
            }
        });

        assert!(container.is_bound::<Mailer>());
        assert!(!container.is_resolved::<Mailer>());
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        let first = container.make::<Mailer>().await.unwrap();
        let second = container.make::<Mailer>().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(container.is_resolved::<Mailer>());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_factory_is_retried_on_next_make() {
        let container = Container::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        container.singleton(move |_| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err("smtp offline".into())
                } else {
                    Ok(Mailer {
                        from: "retry@example.com".to_string(),
                    })
                }
            }
        });

        let err = container.make::<Mailer>().await.unwrap_err();
        assert!(matches!(err, ContainerError::Factory { .. }));

        let mailer = container.make::<Mailer>().await.unwrap();
        assert_eq!(mailer.from, "retry@example.com");
    }

    #[tokio::test]
    async fn test_unbound_type_is_an_error() {
        let container = Container::new();
        let err = container.make::<Mailer>().await.unwrap_err();
        assert!(matches!(err, ContainerError::NotBound(_)));
    }

    #[tokio::test]
    async fn test_injector_forwards_to_container() {
        let container = Container::new();
        container.instance(Mailer {
            from: "team@example.com".to_string(),
        });

        let injector = Injector::new(container);
        let mailer = injector.get::<Mailer>().await.unwrap();

        assert_eq!(mailer.from, "team@example.com");
    }
}
