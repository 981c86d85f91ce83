use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::config::{AppConfig, GraphQLConfig};
use crate::error::Error;
use crate::host::{Container, Environment, HttpRouter, HttpServer};

/// Lifecycle hooks a feature uses to plug into the application.
///
/// `register` only binds, `boot` may resolve bindings and add routes, and
/// `ready` runs once the HTTP listener is bound.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn register(&self, app: &Application) -> Result<(), Error>;

    async fn boot(&self, _app: &Application) -> Result<(), Error> {
        Ok(())
    }

    async fn ready(&self, _app: &Application) -> Result<(), Error> {
        Ok(())
    }
}

pub struct Application {
    container: Container,
    environment: Environment,
    app_root: PathBuf,
    graphql_config_path: PathBuf,
    graphql: Option<GraphQLConfig>,
    router: HttpRouter,
    server: OnceLock<HttpServer>,
    providers: Vec<Arc<dyn Provider>>,
}

impl Application {
    pub fn new(environment: Environment, app_root: impl Into<PathBuf>) -> Self {
        Self {
            container: Container::new(),
            environment,
            app_root: app_root.into(),
            graphql_config_path: PathBuf::new(),
            graphql: None,
            router: HttpRouter::new(),
            server: OnceLock::new(),
            providers: Vec::new(),
        }
    }

    /// Build from process config. A missing GraphQL registry file is not an
    /// error here; the GraphQL provider reports it when it needs the config.
    pub fn from_config(config: &AppConfig) -> Result<Self, confique::Error> {
        let path = config.app_root.join(&config.graphql_config);
        let graphql = if path.is_file() {
            Some(GraphQLConfig::load(&path)?)
        } else {
            None
        };

        let mut app = Self::new(config.environment, &config.app_root);
        app.graphql_config_path = path;
        app.graphql = graphql;
        Ok(app)
    }

    pub fn with_graphql_config(mut self, config: GraphQLConfig) -> Self {
        self.graphql = Some(config);
        self
    }

    pub fn with_provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    pub fn graphql_config(&self) -> Option<&GraphQLConfig> {
        self.graphql.as_ref()
    }

    pub fn graphql_config_path(&self) -> &Path {
        &self.graphql_config_path
    }

    pub fn router(&self) -> &HttpRouter {
        &self.router
    }

    /// The bound HTTP server, once the listener is up.
    pub fn http_server(&self) -> Option<&HttpServer> {
        self.server.get()
    }

    pub fn bind_server(&self, server: HttpServer) {
        if self.server.set(server).is_err() {
            tracing::warn!("HTTP server already bound, ignoring");
        }
    }

    pub async fn register(&self) -> Result<(), Error> {
        for provider in &self.providers {
            tracing::debug!(provider = provider.name(), "Registering provider");
            provider.register(self).await?;
        }
        Ok(())
    }

    pub async fn boot(&self) -> Result<(), Error> {
        for provider in &self.providers {
            tracing::debug!(provider = provider.name(), "Booting provider");
            provider.boot(self).await?;
        }
        Ok(())
    }

    pub async fn ready(&self) -> Result<(), Error> {
        for provider in &self.providers {
            tracing::debug!(provider = provider.name(), "Provider ready");
            provider.ready(self).await?;
        }
        Ok(())
    }
}
