use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::BoxError;

pub type Instance = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("No binding registered for {0}")]
    NotBound(&'static str),
    #[error("Binding for {0} produced a value of another type")]
    TypeMismatch(&'static str),
    #[error("Factory for {type_name} failed: {source}")]
    Factory {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },
}

/// Resolves instances by type token.
///
/// This is the only view of the host container the schema layer gets.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(
        &self,
        token: TypeId,
        type_name: &'static str,
    ) -> Result<Instance, ContainerError>;
}

/// DI adapter handed to resolvers at registration time and stored in the
/// schema data so field resolvers can pull services on demand.
#[derive(Clone)]
pub struct Injector(Arc<dyn Resolve>);

impl Injector {
    pub fn new(resolver: impl Resolve + 'static) -> Self {
        Self(Arc::new(resolver))
    }

    pub async fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ContainerError> {
        let instance = self.0.resolve(TypeId::of::<T>(), type_name::<T>()).await?;
        instance
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch(type_name::<T>()))
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Injector")
    }
}
