use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_graphql::dynamic::{Object, Schema, Subscription};
use parking_lot::Mutex;
use salvo::http::Method;
use salvo::prelude::*;

use crate::adapter::{from_engine_response, to_engine_request};
use crate::auth::AuthHook;
use crate::config::{EnginePlugin, ServerConfig};
use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::Error;
use crate::host::{HttpRouter, HttpServer};
use crate::injector::Injector;
use crate::pubsub::PubSub;
use crate::resolver::{Resolver, ResolverRef, SchemaParts};
use crate::scalars::{base_scalars, merge};
use crate::subscriptions::SubscriptionTransport;

/// Methods the GraphQL route answers on, whatever the engine does with them.
pub const ROUTE_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
];

/// One GraphQL endpoint: resolvers, schema, engine and optional
/// subscription transport.
pub struct GraphQLServer {
    name: String,
    config: ServerConfig,
    injector: Injector,
    resolvers: Mutex<Vec<ResolverRef>>,
    sealed: AtomicBool,
    failed: AtomicBool,
    engine: OnceLock<Engine>,
    pubsub: Option<PubSub>,
    transport: OnceLock<Arc<SubscriptionTransport>>,
}

impl GraphQLServer {
    pub fn new(name: impl Into<String>, config: ServerConfig, injector: Injector) -> Self {
        let pubsub = config.pub_sub.as_ref().map(PubSub::new);
        Self {
            name: name.into(),
            config,
            injector,
            resolvers: Mutex::new(Vec::new()),
            sealed: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            engine: OnceLock::new(),
            pubsub,
            transport: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn pubsub(&self) -> Option<&PubSub> {
        self.pubsub.as_ref()
    }

    /// Append resolver references for the next build.
    ///
    /// Rejected once `start` has begun; the built schema is never rebuilt.
    pub fn attach_resolvers(&self, refs: impl IntoIterator<Item = ResolverRef>) -> Result<(), Error> {
        if self.sealed.load(Ordering::Acquire) {
            tracing::warn!(server = %self.name, "Resolvers attached after the schema was built");
            return Err(Error::SchemaSealed(self.name.clone()));
        }
        self.resolvers.lock().extend(refs);
        Ok(())
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.lock().len()
    }

    pub fn is_started(&self) -> bool {
        self.engine.get().is_some()
    }

    /// True once a `start` attempt has failed. The server stays down.
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn has_subscriptions(&self) -> bool {
        self.transport.get().is_some()
    }

    pub fn engine(&self) -> Result<&Engine, Error> {
        self.engine
            .get()
            .ok_or_else(|| Error::EngineNotStarted(self.name.clone()))
    }

    /// Build the schema, start the engine and attach the subscription
    /// transport to `http` when pub/sub is configured.
    pub async fn start(&self, http: &HttpServer) -> Result<(), Error> {
        if self.sealed.swap(true, Ordering::AcqRel) {
            tracing::warn!(server = %self.name, "GraphQL server already started");
            return Ok(());
        }

        let result = self.launch(http).await;
        if result.is_err() {
            self.failed.store(true, Ordering::Release);
        }
        result
    }

    async fn launch(&self, http: &HttpServer) -> Result<(), Error> {
        let refs = self.resolvers.lock().clone();
        let mut resolvers: Vec<Arc<dyn Resolver>> = Vec::with_capacity(refs.len());
        for reference in &refs {
            let loaded = reference.load().await.map_err(|source| Error::ResolverLoad {
                label: reference.label().to_string(),
                source,
            })?;
            if let Some(resolver) = loaded {
                resolvers.push(resolver);
            }
        }

        if resolvers.is_empty() {
            return Err(Error::NoResolvers {
                server: self.name.clone(),
                patterns: self.config.patterns().to_vec(),
            });
        }

        let builder = self.build_schema(&resolvers).await?;
        tracing::info!(
            server = %self.name,
            resolvers = resolvers.len(),
            "GraphQL schema built"
        );

        let mut plugins = self.config.engine.plugins.clone();
        if !self.config.engine.playground {
            plugins.push(EnginePlugin::LandingPageDisabled);
        }
        let engine = Engine::start(builder, &self.config.engine, plugins, &self.config.path)?;

        if let Some(path) = &self.config.schema.emit_schema_file {
            tokio::fs::write(path, engine.sdl())
                .await
                .map_err(|source| Error::EmitSchema {
                    path: path.clone(),
                    source,
                })?;
            tracing::debug!(server = %self.name, path = %path.display(), "Wrote schema file");
        }

        let schema = engine.schema().clone();
        let _ = self.engine.set(engine);

        if self.pubsub.is_some() {
            let transport = Arc::new(SubscriptionTransport::new(self.name.clone(), schema));
            if http.attach_upgrade(&self.config.path, transport.clone()) {
                let _ = self.transport.set(transport);
                tracing::info!(
                    server = %self.name,
                    path = %self.config.path,
                    "GraphQL subscriptions attached"
                );
            }
        }

        tracing::info!(server = %self.name, path = %self.config.path, "GraphQL server started");
        Ok(())
    }

    async fn build_schema(
        &self,
        resolvers: &[Arc<dyn Resolver>],
    ) -> Result<async_graphql::dynamic::SchemaBuilder, Error> {
        let options = &self.config.schema;

        let mut parts = SchemaParts::new(self.pubsub.clone());
        for resolver in resolvers {
            resolver
                .register(&mut parts, &self.injector)
                .await
                .map_err(|source| Error::ResolverRegister {
                    resolver: resolver.name().to_string(),
                    source,
                })?;
        }

        let SchemaParts {
            query,
            mutation,
            subscription,
            types,
            ..
        } = parts;

        let mutation_type = (!mutation.is_empty()).then_some(options.mutation_type.as_str());
        let subscription_type =
            (!subscription.is_empty()).then_some(options.subscription_type.as_str());

        let mut builder = Schema::build(&options.query_type, mutation_type, subscription_type);
        builder = builder.register(query.into_iter().fold(
            Object::new(&options.query_type),
            Object::field,
        ));
        if !mutation.is_empty() {
            builder = builder.register(
                mutation
                    .into_iter()
                    .fold(Object::new(&options.mutation_type), Object::field),
            );
        }
        if !subscription.is_empty() {
            builder = builder.register(
                subscription
                    .into_iter()
                    .fold(Subscription::new(&options.subscription_type), Subscription::field),
            );
        }

        for ty in types {
            builder = builder.register(ty);
        }
        for scalar in merge(base_scalars(), options.scalars.iter().cloned()) {
            builder = builder.register(scalar.into_scalar());
        }
        if !options.suggestions {
            builder = builder.disable_suggestions();
        }

        let hook = options
            .auth_checker
            .clone()
            .map(AuthHook::new)
            .unwrap_or_default();
        builder = builder.data(self.injector.clone()).data(hook);
        if let Some(pubsub) = &self.pubsub {
            builder = builder.data(pubsub.clone());
        }

        Ok(builder)
    }

    /// Serve one HTTP request. Before the engine is started the request gets
    /// an empty `204`; after a failed start it is an `EngineNotStarted` error.
    pub async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
    ) -> Result<(), Error> {
        let Some(engine) = self.engine.get() else {
            if self.is_failed() {
                tracing::error!(
                    server = %self.name,
                    "GraphQL request received but the server failed to start"
                );
                return Err(Error::EngineNotStarted(self.name.clone()));
            }
            tracing::warn!(
                server = %self.name,
                "GraphQL request received before the server started"
            );
            res.status_code(StatusCode::NO_CONTENT);
            return Ok(());
        };

        let ctx = RequestContext::from_request(req, depot);
        if let Some(auth) = ctx.auth() {
            auth.check().await.map_err(Error::Collaborator)?;
        }

        let engine_req = to_engine_request(req, self.config.engine.max_body_size).await?;
        let engine_res = engine.execute(engine_req, ctx).await;
        from_engine_response(res, engine_res)?;
        Ok(())
    }

    /// Mount the route for this server. Works before the engine is started.
    pub fn register_route(self: &Arc<Self>, router: &HttpRouter) {
        router.route(
            &self.config.path,
            &ROUTE_METHODS,
            GraphQLEndpoint {
                server: self.clone(),
            },
        );
    }
}

impl std::fmt::Debug for GraphQLServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLServer")
            .field("name", &self.name)
            .field("path", &self.config.path)
            .field("resolvers", &self.resolver_count())
            .field("started", &self.is_started())
            .finish()
    }
}

/// Route handler bound to one server.
#[derive(Clone)]
pub struct GraphQLEndpoint {
    server: Arc<GraphQLServer>,
}

#[handler]
impl GraphQLEndpoint {
    async fn handle(&self, req: &mut Request, depot: &mut Depot, res: &mut Response) {
        if let Err(err) = self.server.handle(req, depot, res).await {
            tracing::error!(server = %self.server.name, error = %err, "GraphQL request failed");
            err.render(res);
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
