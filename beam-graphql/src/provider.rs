use std::path::PathBuf;
use std::sync::Arc;

use crate::config::GraphQLConfig;
use crate::error::{BoxError, Error};
use crate::host::{Application, Container, Environment, Provider};
use crate::injector::Injector;
use crate::manager::GraphQLServersManager;
use crate::resolver::ResolverCatalog;
use crate::service::GraphQLService;

async fn build_manager(
    container: Container,
    config: Option<GraphQLConfig>,
    config_path: PathBuf,
    app_root: PathBuf,
) -> Result<GraphQLServersManager, BoxError> {
    let Some(config) = config else {
        tracing::error!(
            path = %config_path.display(),
            "Invalid GraphQL configuration. Missing GraphQL config file"
        );
        return Err(Error::MissingConfig(config_path).into());
    };

    let catalog = match container.make::<ResolverCatalog>().await {
        Ok(catalog) => catalog,
        Err(err) => {
            tracing::warn!(
                error = %err,
                "No resolver catalog bound, discovered files will not load"
            );
            Arc::new(ResolverCatalog::new())
        }
    };

    let mut manager =
        GraphQLServersManager::new(config, Injector::new(container), catalog, app_root);
    manager.initialize().await?;
    Ok(manager)
}

/// Wires the GraphQL servers into the application lifecycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphQLProvider;

#[async_trait::async_trait]
impl Provider for GraphQLProvider {
    fn name(&self) -> &str {
        "graphql"
    }

    /// Bind the manager singleton and the service. Nothing is constructed yet.
    async fn register(&self, app: &Application) -> Result<(), Error> {
        let config = app.graphql_config().cloned();
        let config_path = app.graphql_config_path().to_path_buf();
        let app_root = app.app_root().to_path_buf();

        app.container().singleton(move |container| {
            build_manager(
                container,
                config.clone(),
                config_path.clone(),
                app_root.clone(),
            )
        });

        app.container().instance(GraphQLService::default());
        Ok(())
    }

    async fn boot(&self, app: &Application) -> Result<(), Error> {
        let manager = app.container().make::<GraphQLServersManager>().await?;
        manager.register_routes(app.router());

        let service = app.container().make::<GraphQLService>().await?;
        service.set_manager(manager);
        Ok(())
    }

    /// Start every server once the HTTP listener is bound. Web processes only.
    async fn ready(&self, app: &Application) -> Result<(), Error> {
        if app.environment() != Environment::Web {
            tracing::debug!(environment = ?app.environment(), "Skipping GraphQL start");
            return Ok(());
        }

        let http = app.http_server().ok_or(Error::ListenerUnavailable)?;
        let manager = app.container().make::<GraphQLServersManager>().await?;
        manager.start(http).await
    }
}
