use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::{
    Field, FieldFuture, InputValue, SubscriptionField, SubscriptionFieldFuture, TypeRef,
};
use eyre::{Result, eyre};
use futures_util::StreamExt;
use http::Method;
use parking_lot::RwLock;
use salvo::cors::Cors;
use salvo::prelude::*;
use tracing::info;

use beam_graphql::auth::{Authenticator, authorized};
use beam_graphql::config::AppConfig;
use beam_graphql::host::{Application, HttpServer};
use beam_graphql::injector::Injector;
use beam_graphql::pubsub::PubSub;
use beam_graphql::resolver::{Resolver, ResolverCatalog, ResolverRef, SchemaParts};
use beam_graphql::{BoxError, GraphQLProvider, GraphQLService};

#[handler]
async fn health_check(res: &mut Response) {
    res.status_code(StatusCode::OK);
    res.render(Text::Plain("OK"));
}

/// Treats any bearer token as an authenticated session.
#[derive(Debug)]
struct BearerAuthenticator {
    token: Option<String>,
}

#[async_trait::async_trait]
impl Authenticator for BearerAuthenticator {
    async fn check(&self) -> Result<bool, BoxError> {
        Ok(self.token.as_deref().is_some_and(|token| !token.is_empty()))
    }
}

#[handler]
async fn authenticate(req: &mut Request, depot: &mut Depot) {
    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").map(str::to_string));
    let auth: Arc<dyn Authenticator> = Arc::new(BearerAuthenticator { token });
    depot.inject(auth);
}

/// In-memory post store shared by the demo resolvers.
#[derive(Debug, Default)]
struct PostStore(RwLock<Vec<String>>);

#[derive(Default)]
struct PostsResolver;

#[async_trait::async_trait]
impl Resolver for PostsResolver {
    fn name(&self) -> &str {
        "PostsResolver"
    }

    async fn register(&self, parts: &mut SchemaParts, injector: &Injector) -> Result<(), BoxError> {
        let store = injector.get::<PostStore>().await?;

        let posts = store.clone();
        parts.query(Field::new(
            "posts",
            TypeRef::named_nn_list_nn(TypeRef::STRING),
            move |_| {
                let titles: Vec<Value> = posts.0.read().iter().cloned().map(Value::from).collect();
                FieldFuture::new(async move { Ok::<_, async_graphql::Error>(Some(Value::List(titles))) })
            },
        ));

        let pubsub = parts.pubsub().cloned();
        parts.mutation(
            Field::new(
                "createPost",
                TypeRef::named_nn(TypeRef::STRING),
                authorized([], move |ctx| {
                    let store = store.clone();
                    let pubsub = pubsub.clone();
                    FieldFuture::new(async move {
                        let title = ctx.args.try_get("title")?.string()?.to_string();
                        store.0.write().push(title.clone());
                        if let Some(pubsub) = &pubsub {
                            pubsub.publish("posts", Value::from(title.clone()));
                        }
                        Ok::<_, async_graphql::Error>(Some(Value::from(title)))
                    })
                }),
            )
            .argument(InputValue::new("title", TypeRef::named_nn(TypeRef::STRING))),
        );

        if parts.pubsub().is_some() {
            parts.subscription(SubscriptionField::new(
                "postCreated",
                TypeRef::named_nn(TypeRef::STRING),
                |ctx| {
                    SubscriptionFieldFuture::new(async move {
                        let pubsub = ctx.data::<PubSub>()?;
                        Ok::<_, async_graphql::Error>(
                            pubsub
                                .subscribe("posts")
                                .map(Ok::<_, async_graphql::Error>),
                        )
                    })
                },
            ));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    beam_graphql::logging::init_tracing();

    info!("Starting beam-graphql...");

    // Load configuration
    let config = AppConfig::load_and_validate().map_err(|e| eyre!(e))?;

    info!("Configuration loaded: {:?}", config);

    let app = Application::from_config(&config)
        .map_err(|e| eyre!("Failed to load GraphQL config: {}", e))?
        .with_provider(GraphQLProvider);

    // Host services resolvers can reach through the injector
    app.container().instance(PostStore::default());
    app.container()
        .instance(ResolverCatalog::new().with::<PostsResolver>("posts"));

    app.register().await?;
    app.boot().await?;

    // Resolvers can also be attached by hand between boot and ready
    let graphql = app.container().make::<GraphQLService>().await?;
    let names: Vec<String> = graphql
        .manager()?
        .servers()
        .map(|server| server.name().to_string())
        .collect();
    for name in names {
        let schema = graphql.schema(&name)?;
        if schema.get_server()?.resolver_count() == 0 {
            info!(server = %name, "No discovered resolvers, attaching demo posts resolver");
            schema.resolvers([ResolverRef::new(PostsResolver)])?;
        }
    }

    // Build CORS handler
    let cors = Cors::new()
        .allow_origin(salvo::cors::AllowOrigin::mirror_request())
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(vec![
            "authorization",
            "content-type",
            "accept",
            "x-requested-with",
        ])
        .allow_credentials(true)
        .max_age(3600)
        .into_handler();

    info!("Binding to address: {}", &config.bind_address);
    let acceptor = TcpListener::new(config.bind_address.clone()).bind().await;
    let http = HttpServer::new(config.bind_address.clone());
    app.bind_server(http.clone());

    app.ready().await?;

    let router = Router::new()
        .push(Router::with_path("health").get(health_check))
        .push(app.router().into_router());

    let service = Service::new(router)
        .hoop(cors)
        .hoop(authenticate)
        .hoop(http.upgrade_hoop());

    info!("Server listening on {}", config.bind_address);

    Server::new(acceptor).serve(service).await;

    Ok(())
}
