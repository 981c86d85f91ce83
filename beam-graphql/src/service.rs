use std::sync::{Arc, OnceLock};

use crate::error::Error;
use crate::manager::GraphQLServersManager;
use crate::resolver::ResolverRef;
use crate::server::GraphQLServer;

/// Application-wide entry point to the GraphQL servers.
///
/// Bound in the container at register time; usable once the provider has booted.
#[derive(Debug, Default)]
pub struct GraphQLService {
    manager: OnceLock<Arc<GraphQLServersManager>>,
}

impl GraphQLService {
    pub fn set_manager(&self, manager: Arc<GraphQLServersManager>) {
        if self.manager.set(manager).is_err() {
            tracing::warn!("GraphQL manager already set on service, ignoring");
        }
    }

    pub fn manager(&self) -> Result<&Arc<GraphQLServersManager>, Error> {
        self.manager.get().ok_or(Error::NotInitialized)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<GraphQLServer>, Error> {
        self.manager()?.lookup(name)
    }

    pub fn schema(&self, name: &str) -> Result<SchemaHandle<'_>, Error> {
        Ok(SchemaHandle {
            manager: self.manager()?,
            name: name.to_string(),
        })
    }
}

/// Per-schema view returned by [`GraphQLService::schema`].
pub struct SchemaHandle<'a> {
    manager: &'a GraphQLServersManager,
    name: String,
}

impl SchemaHandle<'_> {
    pub fn resolvers(&self, refs: impl IntoIterator<Item = ResolverRef>) -> Result<(), Error> {
        self.manager.attach_resolvers(&self.name, refs)
    }

    pub fn get_server(&self) -> Result<Arc<GraphQLServer>, Error> {
        self.manager.lookup(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GraphQLConfig, ServerConfig};
    use crate::host::Container;
    use crate::injector::Injector;
    use crate::resolver::ResolverCatalog;

    async fn service() -> GraphQLService {
        let config =
            GraphQLConfig::default().with_server("main", ServerConfig::new("/graphql"));
        let mut manager = GraphQLServersManager::new(
            config,
            Injector::new(Container::new()),
            Arc::new(ResolverCatalog::new()),
            ".",
        );
        manager.initialize().await.unwrap();

        let service = GraphQLService::default();
        service.set_manager(Arc::new(manager));
        service
    }

    #[test]
    fn test_unbooted_service_is_not_initialized() {
        let service = GraphQLService::default();
        assert!(matches!(service.lookup("main"), Err(Error::NotInitialized)));
    }

    #[tokio::test]
    async fn test_schema_handle_delegates_to_manager() {
        let service = service().await;
        let manager = service.manager().unwrap().clone();

        let handle = service.schema("main").unwrap();
        handle
            .resolvers([ResolverRef::lazy("empty", || async { Ok(None) })])
            .unwrap();

        let server = handle.get_server().unwrap();
        assert!(Arc::ptr_eq(&server, &manager.lookup("main").unwrap()));
        assert_eq!(server.resolver_count(), 1);
        assert_eq!(manager.attached_count("main"), 1);
    }

    #[tokio::test]
    async fn test_unknown_schema_is_not_found() {
        let service = service().await;
        assert!(matches!(
            service.lookup("admin"),
            Err(Error::ServerNotFound(_))
        ));
        let handle = service.schema("admin").unwrap();
        assert!(matches!(handle.get_server(), Err(Error::ServerNotFound(_))));
    }
}
