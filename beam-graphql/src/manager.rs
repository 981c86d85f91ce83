use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::config::GraphQLConfig;
use crate::discovery::discover;
use crate::error::Error;
use crate::host::{HttpRouter, HttpServer};
use crate::injector::Injector;
use crate::resolver::{ResolverCatalog, ResolverRef};
use crate::server::GraphQLServer;

/// Owns every configured GraphQL server, keyed by name.
pub struct GraphQLServersManager {
    config: GraphQLConfig,
    injector: Injector,
    catalog: Arc<ResolverCatalog>,
    app_root: PathBuf,
    servers: IndexMap<String, Arc<GraphQLServer>>,
    /// Every reference attached per server, including ones attached before
    /// `initialize` created the server.
    resolvers: Mutex<IndexMap<String, Vec<ResolverRef>>>,
}

impl GraphQLServersManager {
    pub fn new(
        config: GraphQLConfig,
        injector: Injector,
        catalog: Arc<ResolverCatalog>,
        app_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            injector,
            catalog,
            app_root: app_root.into(),
            servers: IndexMap::new(),
            resolvers: Mutex::new(IndexMap::new()),
        }
    }

    /// Create one server per registry entry and attach its discovered resolvers.
    pub async fn initialize(&mut self) -> Result<(), Error> {
        for (name, server_config) in &self.config.servers {
            let server = Arc::new(GraphQLServer::new(
                name.clone(),
                server_config.clone(),
                self.injector.clone(),
            ));

            let mut discovered = Vec::new();
            for pattern in server_config.patterns() {
                match discover(&self.app_root, pattern).await {
                    Ok(files) => discovered.extend(
                        files
                            .iter()
                            .map(|file| ResolverRef::from_file(file, self.catalog.clone())),
                    ),
                    Err(err) => {
                        tracing::error!(
                            server = %name,
                            pattern = %pattern,
                            error = %err,
                            "Failed to discover resolvers"
                        );
                    }
                }
            }

            if discovered.is_empty() {
                tracing::warn!(
                    server = %name,
                    patterns = ?server_config.patterns(),
                    "No resolver files found for GraphQL server"
                );
            }
            tracing::debug!(server = %name, files = discovered.len(), "Discovered resolvers");

            let pending = {
                let mut mirror = self.resolvers.lock();
                let entry = mirror.entry(name.clone()).or_default();
                let pending = std::mem::take(entry);
                entry.extend(discovered.iter().cloned());
                entry.extend(pending.iter().cloned());
                pending
            };

            server.attach_resolvers(discovered)?;
            server.attach_resolvers(pending)?;
            self.servers.insert(name.clone(), server);
        }

        tracing::info!(servers = self.servers.len(), "GraphQL servers initialized");
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<GraphQLServer>, Error> {
        self.servers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ServerNotFound(name.to_string()))
    }

    pub fn servers(&self) -> impl Iterator<Item = &Arc<GraphQLServer>> {
        self.servers.values()
    }

    /// Attach resolvers to a configured server. Before `initialize` they are
    /// held and flushed once the server exists.
    pub fn attach_resolvers(
        &self,
        name: &str,
        refs: impl IntoIterator<Item = ResolverRef>,
    ) -> Result<(), Error> {
        if !self.config.servers.contains_key(name) {
            return Err(Error::ServerNotFound(name.to_string()));
        }

        let refs: Vec<ResolverRef> = refs.into_iter().collect();
        if let Some(server) = self.servers.get(name) {
            server.attach_resolvers(refs.iter().cloned())?;
        }
        self.resolvers
            .lock()
            .entry(name.to_string())
            .or_default()
            .extend(refs);
        Ok(())
    }

    pub fn attached_count(&self, name: &str) -> usize {
        self.resolvers.lock().get(name).map_or(0, Vec::len)
    }

    /// Start every server in registry order. The first failure aborts startup.
    pub async fn start(&self, http: &HttpServer) -> Result<(), Error> {
        for (name, server) in &self.servers {
            server.start(http).await.map_err(|source| {
                tracing::error!(server = %name, error = %source, "Failed to start GraphQL server");
                Error::Start {
                    server: name.clone(),
                    source: Box::new(source),
                }
            })?;
        }
        Ok(())
    }

    pub fn register_routes(&self, router: &HttpRouter) {
        for server in self.servers.values() {
            server.register_route(router);
        }
    }
}

impl std::fmt::Debug for GraphQLServersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLServersManager")
            .field("app_root", &self.app_root)
            .field("servers", &self.servers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod manager_tests;
